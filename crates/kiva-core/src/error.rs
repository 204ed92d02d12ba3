use std::fmt;

use kiva_store::StoreError;

#[derive(Debug)]
pub enum DbError {
    NotFound { id: String },
    AlreadyExists { id: String },
    Validation { path: String, message: String },
    FinalField { field: String },
    RevisionMismatch { id: String },
    Hook(String),
    Closed,
    Encryption(String),
    Io(StoreError),
    Migration { version: u32, message: String },
    AlreadyOpen { name: String },
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::NotFound { id } => write!(f, "document not found: {id}"),
            DbError::AlreadyExists { id } => write!(f, "already exists: {id}"),
            DbError::Validation { path, message } => {
                write!(f, "validation failed at {path}: {message}")
            }
            DbError::FinalField { field } => write!(f, "field is immutable: {field}"),
            DbError::RevisionMismatch { id } => {
                write!(f, "revision mismatch on concurrent update: {id}")
            }
            DbError::Hook(message) => write!(f, "hook failed: {message}"),
            DbError::Closed => write!(f, "operation attempted on a closed collection or database"),
            DbError::Encryption(message) => write!(f, "encryption failed: {message}"),
            DbError::Io(e) => write!(f, "storage error: {e}"),
            DbError::Migration { version, message } => {
                write!(f, "migration to version {version} failed: {message}")
            }
            DbError::AlreadyOpen { name } => write!(f, "database already open: {name}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        DbError::Io(e)
    }
}
