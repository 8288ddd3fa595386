//! Error types for Huntsync Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Relay unreachable after {attempts} attempts")]
    RelayUnreachable { attempts: u32 },

    #[error("Relay protocol version mismatch: expected {expected}, relay reports {found}")]
    VersionMismatch { expected: u32, found: String },

    #[error("Relay did not report a protocol version: {0}")]
    VersionUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
