pub mod loader;
pub mod rebuild;
pub mod sync;
