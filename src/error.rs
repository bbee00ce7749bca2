//! Error types for the relay server
//!
//! Defines application-level errors, outbound send errors and
//! user-directory errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::UserId;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Relay or logout attempted before a join
    #[error("Connection has not joined")]
    NotIdentified,

    /// Join with an empty user id
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
}

/// Message send errors
///
/// Occurs when an outbound event cannot be queued for a connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection is not draining its outbound queue
    #[error("Channel full")]
    ChannelFull,
}

/// User-directory errors
///
/// Only ever logged; never reaches a client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Backing store unreachable or rejected the write
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    /// The directory has no record of the user
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An override could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
