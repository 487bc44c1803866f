use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BbuError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error), // Converts io::Error into BbuError automatically

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid serial number: '{0}'")]
    InvalidSerial(String),

    #[error("Invalid threshold '{0}': must be an integer")]
    InvalidThreshold(String),

    #[error("Invalid date '{0}': expected MM/DD/YYYY")]
    InvalidDate(String),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}

impl BbuError {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BbuError::InvalidSerial(_)
                | BbuError::InvalidThreshold(_)
                | BbuError::InvalidDate(_)
                | BbuError::JsonError(_)
        )
    }
}
