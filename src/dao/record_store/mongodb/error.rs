use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("{what}")]
    DuplicateKey { what: String },
    #[error("failed to write {collection} document `{id}`")]
    Write {
        collection: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete from {collection} for `{id}`")]
    Delete {
        collection: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query {collection}")]
    Query {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}

impl MongoDaoError {
    /// Classify an insert failure, turning unique index violations into [`MongoDaoError::DuplicateKey`].
    pub fn from_insert(
        collection: &'static str,
        id: Uuid,
        what: impl FnOnce() -> String,
        source: MongoError,
    ) -> Self {
        if is_duplicate_key(&source) {
            MongoDaoError::DuplicateKey { what: what() }
        } else {
            MongoDaoError::Write {
                collection,
                id,
                source,
            }
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY_CODE
    )
}
