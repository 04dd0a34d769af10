//! Persistence seams. The workflow only sees these traits; `sea-orm` and
//! in-memory implementations live beside them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::auth::{user, Role};
use crate::errors::ServiceError;
use crate::models::{ReturnFilter, ReturnItem, ReturnRecord, ReturnStatus};

pub mod memory;
pub mod return_repository;
pub mod user_repository;

pub use memory::{InMemoryReturnStore, InMemoryUserDirectory};
pub use return_repository::ReturnRepository;
pub use user_repository::UserRepository;

/// A validated submission ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReturn {
    pub rep_name: String,
    pub date_submitted: NaiveDate,
    pub order_number: String,
    pub customer_name: String,
    pub date_shipped: Option<NaiveDate>,
    pub return_type: String,
    pub advised_customer: Option<String>,
    pub additional_notes: Option<String>,
    pub created_by: i64,
    pub date_created: DateTime<Utc>,
    pub items: Vec<NewReturnItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReturnItem {
    pub product_code: String,
    pub product_desc: String,
    pub price_per_unit: Decimal,
    pub quantity: Decimal,
    pub credit_amount: Decimal,
    pub product_returning: String,
    pub reason_for_return: String,
    pub follow_up_action: Option<String>,
    pub supplier_credit: bool,
}

/// A return together with its items, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnDetail {
    pub record: ReturnRecord,
    pub items: Vec<ReturnItem>,
}

#[async_trait]
pub trait ReturnStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<ReturnRecord>, ServiceError>;

    /// Writes the return and all its items atomically.
    async fn insert_submission(&self, submission: NewReturn) -> Result<ReturnDetail, ServiceError>;

    /// Persists `updated` only if the stored status still equals `expected`.
    /// Returns `false` when another writer moved the status first.
    async fn save_transition(
        &self,
        updated: &ReturnRecord,
        expected: ReturnStatus,
    ) -> Result<bool, ServiceError>;

    async fn list_filtered(&self, filter: &ReturnFilter) -> Result<Vec<ReturnRecord>, ServiceError>;

    async fn items_for(&self, return_id: i64) -> Result<Vec<ReturnItem>, ServiceError>;

    /// Every return with its items, ordered by id.
    async fn export_rows(&self) -> Result<Vec<ReturnDetail>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Fields an administrator may change. `None` leaves the value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<user::Model>, ServiceError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError>;

    async fn users_with_role(
        &self,
        role: Role,
        active_only: bool,
    ) -> Result<Vec<user::Model>, ServiceError>;

    /// Newest accounts first.
    async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError>;

    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<user::Model, ServiceError>;

    async fn update_user(&self, id: i64, update: UserUpdate) -> Result<user::Model, ServiceError>;

    async fn set_active(&self, id: i64, active: bool) -> Result<user::Model, ServiceError>;
}
