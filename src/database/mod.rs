pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;
pub mod repository;
pub mod service;
pub mod storage;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStorage;
pub use postgres::PgStorage;
pub use query_builder::{PreparedQuery, QueryBuilder};
pub use repository::Repository;
pub use service::Database;
pub use storage::Storage;
