//! Error types for the OCI driver
//!
//! Errors fall into three groups: configuration errors raised while parsing a
//! connection string, allocation errors raised before an error handle exists,
//! and native diagnostics read back from the OCI error handle.

use std::time::Duration;

use thiserror::Error;

use crate::native::{HandleType, Status};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the OCI driver
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Malformed connection string
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// A recognized query parameter carried an unusable value
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    // =========================================================================
    // Allocation Errors
    // =========================================================================
    /// The OCI environment could not be created. No error handle exists yet,
    /// so there is no native diagnostic to report.
    #[error("cannot create environment")]
    EnvironmentCreate,

    /// A handle allocation failed
    #[error("cannot allocate {0} handle")]
    HandleAlloc(HandleType),

    // =========================================================================
    // Native Errors
    // =========================================================================
    /// Oracle database error read from the error handle
    #[error("ORA-{code:05}: {message}")]
    Oracle { code: i32, message: String },

    /// A native call failed with a status that carries no diagnostic record
    #[error("native call failed: {0}")]
    Native(Status),

    /// The OCI client library could not be loaded
    #[error("cannot load OCI library {path}: {source}")]
    LibraryLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Connection attempt did not finish in time
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(Duration),

    /// Operation on a connection that was already closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Oracle database error
    pub fn oracle(code: i32, message: impl Into<String>) -> Self {
        Error::Oracle {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.into(),
        }
    }

    /// The ORA- code, if this error came from the database
    pub fn oracle_code(&self) -> Option<i32> {
        match self {
            Error::Oracle { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error was raised while parsing a connection string
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConnectionString(_) | Error::InvalidParameter { .. }
        )
    }

    /// Check if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::EnvironmentCreate
                | Error::HandleAlloc(_)
                | Error::ConnectionTimeout(_)
                | Error::ConnectionClosed
        )
    }
}
