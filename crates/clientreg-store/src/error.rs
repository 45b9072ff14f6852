//! Error types for the clientreg-store crate.
//!
//! All store and registry operations return [`StoreError`] via
//! [`StoreResult`]. Errors are never retried or swallowed inside the crate;
//! they propagate to the immediate caller unchanged.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the store or the client registry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening or closing the underlying connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A query was issued while the store had no open connection.
    #[error("store is not open")]
    Closed,

    /// A statement failed to prepare, bind, or execute.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Creating the `users` table or its unique index failed.
    #[error("schema setup failed: {0}")]
    Schema(String),

    /// The requested record was not found.
    ///
    /// The registry reports absence through this variant rather than a
    /// `false` result, so callers must read it as "could not confirm".
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The identifier is already present in the registry.
    #[error("client already registered: {id}")]
    AlreadyRegistered { id: String },

    /// The insert went through but the follow-up read could not see the row.
    #[error("registration of {id} could not be confirmed")]
    Unconfirmed { id: String },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// Whether this error reports an absent record rather than a failure
    /// to execute the lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error came from the connection lifecycle.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Closed)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
