/// Database model definitions.
pub mod models;
/// Session, player and match log persistence.
pub mod record_store;
/// Storage abstraction layer for database operations.
pub mod storage;
