pub mod analytics;
pub mod export;
pub mod returns;
pub mod users;
