use crate::codec::{DecodeError, EncodeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Solana RPC error: {0}")]
    SolanaRpcError(String),

    #[error("Ethereum RPC error: {0}")]
    EthereumRpcError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("Encode error: {0}")]
    EncodeError(#[from] EncodeError),

    #[error("Helper script failed: {0}")]
    HelperError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout error: operation timed out")]
    TimeoutError,

    #[error("Relay cycle aborted: {0}")]
    CycleAborted(String),
}

pub type Result<T> = std::result::Result<T, RelayerError>;
