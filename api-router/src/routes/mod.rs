pub mod embedding_status;
pub mod health;
pub mod query;
pub mod store_health;
