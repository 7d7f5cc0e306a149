//! Backend-agnostic storage errors.
use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed to answer.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the store was doing when it failed.
        message: String,
        /// Driver error behind the failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A write collided with a unique key already present in the store.
    #[error("conflicting write: {message}")]
    Conflict {
        /// Which key collided.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a unique-key conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        StorageError::Conflict {
            message: message.into(),
        }
    }
}

/// Narrow a backend count to the `u32` the engine works with, saturating on overflow.
pub fn saturating_count<T: TryInto<u32>>(count: T) -> u32 {
    count.try_into().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_saturate_instead_of_wrapping() {
        assert_eq!(saturating_count(3_usize), 3);
        assert_eq!(saturating_count(u64::from(u32::MAX) + 1), u32::MAX);
        assert_eq!(saturating_count(usize::MAX), u32::MAX);
    }
}
