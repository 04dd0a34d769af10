pub mod return_entity;
pub mod return_item_entity;
pub mod returns;

pub use return_entity::Model as ReturnRecord;
pub use return_item_entity::Model as ReturnItem;
pub use returns::{ReturnFilter, ReturnStatus, StatusBucket, WorkflowAction};
