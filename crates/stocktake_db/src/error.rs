//! Error types for the stocktake store layer.

use crate::lock::LockError;
use crate::types::ScanId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Store operation result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coarse error category, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Duplicate,
    NotFound,
    Validation,
    Storage,
}

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Login or branch authorization failed
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    /// Barcode is already present in the ledger
    #[error("Duplicate barcode: {barcode}")]
    Duplicate { barcode: String },

    /// Delete target does not exist
    #[error("Scan not found: {0}")]
    NotFound(ScanId),

    /// Candidate record is malformed
    #[error("Invalid scan: {0}")]
    Validation(String),

    /// Backing storage is unreadable, unwritable or busy
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// Create a duplicate barcode error.
    pub fn duplicate(barcode: impl Into<String>) -> Self {
        Self::Duplicate {
            barcode: barcode.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Auth(_) => ErrorKind::Auth,
            StoreError::Duplicate { .. } => ErrorKind::Duplicate,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Reasons a login or branch check is refused.
#[derive(Error, Debug)]
pub enum AuthFailure {
    #[error("user store missing: {}", .0.display())]
    StoreMissing(PathBuf),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("branch {branch} is not assigned to {username}")]
    BranchNotAssigned { username: String, branch: String },

    #[error("no branches assigned to {0}")]
    NoBranches(String),

    /// The user store exists but could not be read
    #[error("user store unreadable: {0}")]
    Unreadable(String),
}

/// Low-level storage failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Scan id space exhausted in {}", path.display())]
    IdsExhausted { path: PathBuf },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}
