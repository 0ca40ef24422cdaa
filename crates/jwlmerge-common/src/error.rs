//! Common error types used throughout jwlmerge.
//!
//! This module provides a unified error type covering the failure cases of a
//! merge run: missing inputs, unreadable source databases, database errors,
//! archive and manifest problems, and I/O failures.

/// Common error type for jwlmerge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A supplied path does not exist or too few archives were supplied.
    #[error("Input missing: {0}")]
    InputMissing(String),

    /// A source database could not be opened or introspected.
    #[error("Source database unreadable: {0}")]
    SourceUnreadable(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An archive could not be read or written.
    #[error("Archive error: {0}")]
    Archive(String),

    /// A manifest could not be parsed or rewritten.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new InputMissing error.
    pub fn input_missing<S: Into<String>>(msg: S) -> Self {
        Self::InputMissing(msg.into())
    }

    /// Create a new SourceUnreadable error.
    pub fn source_unreadable<S: Into<String>>(msg: S) -> Self {
        Self::SourceUnreadable(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Archive error.
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a new Manifest error.
    pub fn manifest<S: Into<String>>(msg: S) -> Self {
        Self::Manifest(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
