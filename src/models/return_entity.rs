use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::returns::ReturnStatus;

/// A customer return request and its approval trail.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "returns")]
#[schema(as = ReturnRecord)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub rep_name: String,
    pub date_submitted: NaiveDate,
    pub order_number: String,
    pub customer_name: String,
    pub date_shipped: Option<NaiveDate>,
    pub return_type: String,
    pub advised_customer: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub additional_notes: Option<String>,
    pub status: ReturnStatus,
    pub created_by: i64,
    pub date_created: DateTime<Utc>,
    pub wh_approved_by: Option<i64>,
    pub wh_approved_at: Option<DateTime<Utc>>,
    pub mgr_approved_by: Option<i64>,
    pub mgr_approved_at: Option<DateTime<Utc>>,
    /// Set when the return is rejected.
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::return_item_entity::Entity")]
    Items,
    #[sea_orm(
        belongs_to = "crate::auth::user::Entity",
        from = "Column::CreatedBy",
        to = "crate::auth::user::Column::Id"
    )]
    Submitter,
}

impl Related<super::return_item_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<crate::auth::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
