use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::returns::ListOrder;
use crate::models::{
    return_entity::{self, Column, Entity as Returns},
    return_item_entity::{self, Entity as ReturnItems},
    ReturnFilter, ReturnItem, ReturnRecord, ReturnStatus,
};

use super::{NewReturn, ReturnDetail, ReturnStore};

/// `sea-orm` backed return store.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    db: Arc<DatabaseConnection>,
}

impl ReturnRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReturnStore for ReturnRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<ReturnRecord>, ServiceError> {
        Ok(Returns::find_by_id(id).one(&*self.db).await?)
    }

    async fn insert_submission(&self, submission: NewReturn) -> Result<ReturnDetail, ServiceError> {
        let txn = self.db.begin().await?;

        let record = return_entity::ActiveModel {
            id: NotSet,
            rep_name: Set(submission.rep_name),
            date_submitted: Set(submission.date_submitted),
            order_number: Set(submission.order_number),
            customer_name: Set(submission.customer_name),
            date_shipped: Set(submission.date_shipped),
            return_type: Set(submission.return_type),
            advised_customer: Set(submission.advised_customer),
            additional_notes: Set(submission.additional_notes),
            status: Set(ReturnStatus::Pending),
            created_by: Set(submission.created_by),
            date_created: Set(submission.date_created),
            wh_approved_by: Set(None),
            wh_approved_at: Set(None),
            mgr_approved_by: Set(None),
            mgr_approved_at: Set(None),
            approved_by: Set(None),
            approved_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(submission.items.len());
        for item in submission.items {
            let saved = return_item_entity::ActiveModel {
                id: NotSet,
                return_id: Set(record.id),
                product_code: Set(item.product_code),
                product_desc: Set(item.product_desc),
                price_per_unit: Set(item.price_per_unit),
                quantity: Set(item.quantity),
                credit_amount: Set(item.credit_amount),
                product_returning: Set(item.product_returning),
                reason_for_return: Set(item.reason_for_return),
                follow_up_action: Set(item.follow_up_action),
                supplier_credit: Set(item.supplier_credit),
            }
            .insert(&txn)
            .await?;
            items.push(saved.with_money_scale());
        }

        txn.commit().await?;
        debug!(return_id = record.id, items = items.len(), "return persisted");
        Ok(ReturnDetail { record, items })
    }

    async fn save_transition(
        &self,
        updated: &ReturnRecord,
        expected: ReturnStatus,
    ) -> Result<bool, ServiceError> {
        let changes = return_entity::ActiveModel {
            status: Set(updated.status),
            wh_approved_by: Set(updated.wh_approved_by),
            wh_approved_at: Set(updated.wh_approved_at),
            mgr_approved_by: Set(updated.mgr_approved_by),
            mgr_approved_at: Set(updated.mgr_approved_at),
            approved_by: Set(updated.approved_by),
            approved_at: Set(updated.approved_at),
            ..Default::default()
        };

        // Single conditional UPDATE: the status check and the write cannot interleave.
        let result = Returns::update_many()
            .set(changes)
            .filter(Column::Id.eq(updated.id))
            .filter(Column::Status.eq(expected))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn list_filtered(&self, filter: &ReturnFilter) -> Result<Vec<ReturnRecord>, ServiceError> {
        let mut query = Returns::find();

        if let Some(statuses) = &filter.statuses {
            query = query.filter(Column::Status.is_in(statuses.iter().copied()));
        }
        if let Some(from) = filter.submitted_from {
            query = query.filter(Column::DateSubmitted.gte(from));
        }
        if let Some(to) = filter.submitted_to {
            query = query.filter(Column::DateSubmitted.lte(to));
        }
        if let Some(owner) = filter.created_by {
            query = query.filter(Column::CreatedBy.eq(owner));
        }

        query = match filter.order {
            ListOrder::NewestFirst => query
                .order_by_desc(Column::DateSubmitted)
                .order_by_desc(Column::Id),
            ListOrder::OldestFirst => query
                .order_by_asc(Column::DateSubmitted)
                .order_by_asc(Column::Id),
        };

        Ok(query.all(&*self.db).await?)
    }

    async fn items_for(&self, return_id: i64) -> Result<Vec<ReturnItem>, ServiceError> {
        let items = ReturnItems::find()
            .filter(return_item_entity::Column::ReturnId.eq(return_id))
            .order_by_asc(return_item_entity::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(items.into_iter().map(ReturnItem::with_money_scale).collect())
    }

    async fn export_rows(&self) -> Result<Vec<ReturnDetail>, ServiceError> {
        let rows = Returns::find()
            .order_by_asc(Column::Id)
            .find_with_related(ReturnItems)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(record, items)| {
                let mut items: Vec<ReturnItem> =
                    items.into_iter().map(ReturnItem::with_money_scale).collect();
                items.sort_by_key(|item| item.id);
                ReturnDetail { record, items }
            })
            .collect())
    }
}
