//! In-process stores with the same guarded-transition semantics as the database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::auth::{user, Role};
use crate::errors::ServiceError;
use crate::models::returns::ListOrder;
use crate::models::{ReturnFilter, ReturnItem, ReturnRecord, ReturnStatus};

use super::{NewReturn, NewUser, ReturnDetail, ReturnStore, UserDirectory, UserUpdate};

#[derive(Default)]
struct ReturnTables {
    next_return_id: i64,
    next_item_id: i64,
    returns: BTreeMap<i64, ReturnRecord>,
    items: Vec<ReturnItem>,
}

#[derive(Default)]
pub struct InMemoryReturnStore {
    tables: Mutex<ReturnTables>,
}

impl InMemoryReturnStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReturnStore for InMemoryReturnStore {
    async fn get_by_id(&self, id: i64) -> Result<Option<ReturnRecord>, ServiceError> {
        Ok(self.tables.lock().await.returns.get(&id).cloned())
    }

    async fn insert_submission(&self, submission: NewReturn) -> Result<ReturnDetail, ServiceError> {
        let mut tables = self.tables.lock().await;
        tables.next_return_id += 1;
        let id = tables.next_return_id;

        let record = ReturnRecord {
            id,
            rep_name: submission.rep_name,
            date_submitted: submission.date_submitted,
            order_number: submission.order_number,
            customer_name: submission.customer_name,
            date_shipped: submission.date_shipped,
            return_type: submission.return_type,
            advised_customer: submission.advised_customer,
            additional_notes: submission.additional_notes,
            status: ReturnStatus::Pending,
            created_by: submission.created_by,
            date_created: submission.date_created,
            wh_approved_by: None,
            wh_approved_at: None,
            mgr_approved_by: None,
            mgr_approved_at: None,
            approved_by: None,
            approved_at: None,
        };

        let mut items = Vec::with_capacity(submission.items.len());
        for item in submission.items {
            tables.next_item_id += 1;
            items.push(ReturnItem {
                id: tables.next_item_id,
                return_id: id,
                product_code: item.product_code,
                product_desc: item.product_desc,
                price_per_unit: item.price_per_unit,
                quantity: item.quantity,
                credit_amount: item.credit_amount,
                product_returning: item.product_returning,
                reason_for_return: item.reason_for_return,
                follow_up_action: item.follow_up_action,
                supplier_credit: item.supplier_credit,
            });
        }

        tables.returns.insert(id, record.clone());
        tables.items.extend(items.iter().cloned());
        Ok(ReturnDetail { record, items })
    }

    async fn save_transition(
        &self,
        updated: &ReturnRecord,
        expected: ReturnStatus,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.tables.lock().await;
        match tables.returns.get_mut(&updated.id) {
            Some(stored) if stored.status == expected => {
                stored.status = updated.status;
                stored.wh_approved_by = updated.wh_approved_by;
                stored.wh_approved_at = updated.wh_approved_at;
                stored.mgr_approved_by = updated.mgr_approved_by;
                stored.mgr_approved_at = updated.mgr_approved_at;
                stored.approved_by = updated.approved_by;
                stored.approved_at = updated.approved_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_filtered(&self, filter: &ReturnFilter) -> Result<Vec<ReturnRecord>, ServiceError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<ReturnRecord> = tables
            .returns
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();

        rows.sort_by_key(|record| (record.date_submitted, record.id));
        if filter.order == ListOrder::NewestFirst {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn items_for(&self, return_id: i64) -> Result<Vec<ReturnItem>, ServiceError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .items
            .iter()
            .filter(|item| item.return_id == return_id)
            .cloned()
            .collect())
    }

    async fn export_rows(&self) -> Result<Vec<ReturnDetail>, ServiceError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .returns
            .values()
            .map(|record| ReturnDetail {
                record: record.clone(),
                items: tables
                    .items
                    .iter()
                    .filter(|item| item.return_id == record.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }
}

#[derive(Default)]
struct UserTable {
    next_id: i64,
    users: BTreeMap<i64, user::Model>,
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    table: Mutex<UserTable>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn username_taken(username: &str) -> ServiceError {
    ServiceError::Conflict(format!("Username '{username}' is already taken"))
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: i64) -> Result<Option<user::Model>, ServiceError> {
        Ok(self.table.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError> {
        let table = self.table.lock().await;
        Ok(table
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn users_with_role(
        &self,
        role: Role,
        active_only: bool,
    ) -> Result<Vec<user::Model>, ServiceError> {
        let table = self.table.lock().await;
        Ok(table
            .users
            .values()
            .filter(|user| user.role == role && (!active_only || user.is_active))
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        let table = self.table.lock().await;
        let mut users: Vec<user::Model> = table.users.values().cloned().collect();
        users.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<user::Model, ServiceError> {
        let mut table = self.table.lock().await;
        if table
            .users
            .values()
            .any(|user| user.username == new_user.username)
        {
            return Err(username_taken(&new_user.username));
        }

        table.next_id += 1;
        let user = user::Model {
            id: table.next_id,
            username: new_user.username,
            name: new_user.name,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_active: new_user.is_active,
            joined_at: Utc::now(),
        };
        table.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: UserUpdate) -> Result<user::Model, ServiceError> {
        let mut table = self.table.lock().await;
        if let Some(username) = &update.username {
            if table
                .users
                .values()
                .any(|user| user.id != id && &user.username == username)
            {
                return Err(username_taken(username));
            }
        }

        let user = table
            .users
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("User {id}")))?;
        if let Some(value) = update.username {
            user.username = value;
        }
        if let Some(value) = update.name {
            user.name = value;
        }
        if let Some(value) = update.role {
            user.role = value;
        }
        if let Some(value) = update.password_hash {
            user.password_hash = value;
        }
        Ok(user.clone())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<user::Model, ServiceError> {
        let mut table = self.table.lock().await;
        let user = table
            .users
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("User {id}")))?;
        user.is_active = active;
        Ok(user.clone())
    }
}
