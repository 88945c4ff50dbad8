//! Relays cross-chain swap transfers from EVM source chains to Solana.

pub mod codec;
pub mod config;
pub mod cursor;
pub mod destination;
pub mod dispatch;
pub mod error;
pub mod fetcher;
pub mod gas_log;
pub mod ledger;
pub mod node_helper;
pub mod pending;
pub mod quote;
pub mod solana;
pub mod supervisor;
pub mod types;
pub mod vaa;

pub use error::{RelayerError, Result};
