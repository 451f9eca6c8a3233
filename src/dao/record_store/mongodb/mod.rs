mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoRecordStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateKey { what } => StorageError::conflict(what),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
