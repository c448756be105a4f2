//! Error types for the cloudkeep application.
//!
//! This module defines custom error types that categorize different failures
//! that can occur while talking to the backend services and rendering notes.

use std::{io, path::PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The main error type for the cloudkeep application.
#[derive(Error, Debug)]
pub enum CkError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A non-empty color name that is not part of the fixed palette.
    #[error("Unknown color name: {name}")]
    UnknownColorName { name: String },

    /// An operation that needs a signed-in user was attempted without one.
    #[error("No user is signed in")]
    NotSignedIn,

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// A note failed validation (e.g. empty text on save).
    #[error("Invalid note: {message}")]
    InvalidNote { message: String },

    /// Config fetch was throttled; no new values until the window passes.
    #[error("Config fetch throttled until {throttle_end}")]
    FetchThrottled { throttle_end: DateTime<Utc> },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },

    /// Launching or running the external text editor failed.
    #[error("{message}")]
    EditorError { message: String },
}
