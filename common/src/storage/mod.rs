pub mod http;
pub mod memory;
pub mod store;
pub mod types;
