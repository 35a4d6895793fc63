//! Client error types

use crate::config::ConfigError;
use nostr::Nip19Error;
use thiserror::Error;

/// Client error type
///
/// Relay failures never show up here: sessions absorb them and contribute
/// zero events. Only caller input and local setup fail loudly.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Malformed or wrong-prefix identifier, rejected before any network I/O
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] Nip19Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
