mod config;
mod connection;
mod error;
mod models;
/// [`SessionStore`](crate::dao::session_store::SessionStore) backed by MongoDB collections.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Duplicate { message } => StorageError::conflict(message),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
