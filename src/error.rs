// Copyright (c) 2024 Mike Tsao

//! Errors returned at the engine's API boundary.
//!
//! Stale or invalid voice handles aren't errors.
//! Voices end on their own between the moment a caller obtains a handle and
//! the moment it uses one, so operations on dead handles quietly do nothing
//! (or return a documented default) instead of failing.

use thiserror::Error;

/// Things that can go wrong when configuring the engine or its sources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A parameter was outside the range the operation accepts. Shared state
    /// is left untouched.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation isn't supported by this instance, for example rewinding
    /// a stream that can't rewind.
    #[error("Operation not supported")]
    NotImplemented,

    /// A [Queue](crate::orchestration::Queue) has no room for another sound.
    #[error("Queue is full")]
    QueueFull,

    /// Sample data couldn't be loaded.
    #[error("Failed to load audio: {0}")]
    Load(String),
}

/// Result type for engine operations.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        log::debug!("rejected parameter: {message}");
        Self::InvalidParameter(message)
    }
}
