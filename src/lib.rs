//! Presence & Relay Server Library
//!
//! Real-time presence tracking and 1:1 message relay over WebSocket,
//! built with tokio-tungstenite using the Actor pattern for state management.
//!
//! # Features
//! - Join as a user, announced online to every other connection
//! - Point-to-point relay of arbitrary JSON payloads
//! - Explicit logout that closes the connection
//! - Disconnect handling with offline notification
//! - Best-effort persistence of online status to a user directory
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RelayHub` is the central actor owning the presence registry
//! - Each connection has a `handler` task communicating with the hub
//! - `PresenceWriter` applies directory updates off the relay path
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use presence_relay::{serve, Config, InMemoryDirectory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     serve(listener, config, Arc::new(InMemoryDirectory::new())).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod topics;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ConnectionState};
pub use config::Config;
pub use directory::{InMemoryDirectory, PresenceWriter, UserDirectory};
pub use error::{AppError, ConfigError, DirectoryError, SendError};
pub use handler::{handle_connection, serve, spawn_hub};
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use registry::PresenceRegistry;
pub use server::{HubCommand, RelayHub};
pub use topics::TopicTable;
pub use types::{ClientId, UserId};
