//! Custom error types for the roll tracker.
//!
//! This module provides a centralized error handling system with specific error types
//! for different parts of the application.

use std::fmt;

use crate::cooldown::RejectReason;

/// Main error type for roll tracker operations.
#[derive(Debug)]
pub enum RollTrackerError {
    /// Configuration errors (missing env vars, invalid values)
    Config(String),
    /// Storage failures. Every operation that hits this is aborted without partial writes.
    Database(String),
    /// A roll was refused while committing (suspended or already on cooldown)
    RollRejected(RejectReason),
    /// The selected item is not part of the catalog
    UnknownItem(String),
    /// No user record exists for the given id
    NotFound(u64),
    /// A reminder or broadcast could not be delivered
    Delivery(String),
    /// Discord gateway/HTTP errors
    Discord(String),
    /// Generic I/O errors
    Io(std::io::Error),
    /// Invalid input errors
    InvalidInput(String),
}

impl fmt::Display for RollTrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Database(msg) => write!(f, "Database error: {}", msg),
            Self::RollRejected(reason) => write!(f, "Roll rejected: {}", reason),
            Self::UnknownItem(name) => write!(f, "Unknown item: {}", name),
            Self::NotFound(user_id) => write!(f, "No record for user {}", user_id),
            Self::Delivery(msg) => write!(f, "Delivery failed: {}", msg),
            Self::Discord(msg) => write!(f, "Discord error: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for RollTrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RollTrackerError::Io(err) => Some(err),
            _ => None,
        }
    }
}

// Implement From traits for automatic error conversion
impl From<std::io::Error> for RollTrackerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<rusqlite::Error> for RollTrackerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<poise::serenity_prelude::Error> for RollTrackerError {
    fn from(err: poise::serenity_prelude::Error) -> Self {
        Self::Discord(err.to_string())
    }
}

impl From<std::env::VarError> for RollTrackerError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RollTrackerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Database(format!("Task join error: {}", err))
    }
}

/// Result type alias for roll tracker operations.
pub type Result<T> = std::result::Result<T, RollTrackerError>;
