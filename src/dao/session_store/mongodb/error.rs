//! Errors raised by the MongoDB adapter before they are folded into storage errors.
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Result alias for MongoDB adapter operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failure of a MongoDB adapter operation.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection holding the index.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A session write failed.
    #[error("failed to write session `{id}`")]
    WriteSession {
        /// Session join code.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A session read failed.
    #[error("failed to load session data for `{id}`")]
    LoadSession {
        /// Session join code.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A team read or write failed.
    #[error("failed to write team data for `{id}`")]
    WriteTeam {
        /// Team or session identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Questions of a quiz could not be read.
    #[error("failed to load questions of quiz `{quiz_id}`")]
    LoadQuestions {
        /// Quiz identifier.
        quiz_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An answer could not be recorded.
    #[error("failed to record answer for session `{session_id}`")]
    WriteAnswer {
        /// Session join code.
        session_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Answers of a session could not be read.
    #[error("failed to load answers of session `{session_id}`")]
    LoadAnswers {
        /// Session join code.
        session_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored document does not match the expected shape.
    #[error("stored document is malformed: {reason}")]
    MalformedDocument {
        /// What was wrong with the document.
        reason: String,
    },
    /// A unique key already holds a value.
    #[error("{message}")]
    Duplicate {
        /// Which key collided.
        message: String,
    },
}

/// Whether a driver error is a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}
