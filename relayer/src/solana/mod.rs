//! Solana destination: account derivation, instruction encoding and submission.

pub mod accounts;
pub mod instructions;
pub mod submitter;

pub use accounts::ProgramIds;
pub use submitter::SolanaDestination;

use crate::config::SolanaConfig;
use crate::error::{RelayerError, Result};
use rand::seq::SliceRandom;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// RPC client on one of the configured endpoints.
pub fn connect(config: &SolanaConfig) -> Result<Arc<RpcClient>> {
    let url = config
        .rpc_urls
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| RelayerError::ConfigError("No Solana RPC endpoint configured".to_string()))?;
    let commitment = CommitmentConfig::from_str(&config.commitment)
        .map_err(|e| RelayerError::ConfigError(format!("Invalid commitment: {}", e)))?;

    info!("Connecting to Solana RPC {}", url);
    Ok(Arc::new(RpcClient::new_with_commitment(url.clone(), commitment)))
}
