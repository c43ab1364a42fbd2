//! Storage backends implementing [`UrlRepository`].

pub mod memory;
pub mod mysql;

pub use keyhole_core::error::StorageError;
pub use keyhole_core::repository::{Result, UrlRecord, UrlRepository};
pub use memory::InMemoryUrlRepository;
pub use mysql::MySqlUrlRepository;
