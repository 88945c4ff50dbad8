//! Whirlpool swap quotes for transfers carrying a single swap step.

use crate::destination::RouteQuoter;
use crate::error::{RelayerError, Result};
use crate::node_helper::NodeHelper;
use crate::vaa::ParsedTransfer;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Bridge amounts carry at most this many decimals.
pub const MAX_BRIDGE_DECIMALS: u8 = 8;

/// Accounts and amounts for one whirlpool swap, as printed by the quote script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WhirlpoolRoute {
    pub whirlpool_program: String,
    pub whirlpool: String,
    pub token_mint_a: String,
    pub token_mint_b: String,
    pub token_owner_account_a: String,
    pub token_owner_account_b: String,
    pub token_vault_a: String,
    pub token_vault_b: String,
    pub tick_array_0: String,
    pub tick_array_1: String,
    pub tick_array_2: String,
    pub oracle: String,
    pub is_a_to_b: bool,
    #[serde(deserialize_with = "amount")]
    pub amount_in: u64,
    #[serde(deserialize_with = "amount")]
    pub estimated_amount_out: u64,
    #[serde(deserialize_with = "amount")]
    pub min_amount_out: u64,
}

impl WhirlpoolRoute {
    /// Parse the JSON object out of the script's stdout.
    pub fn from_output(output: &str) -> Result<Self> {
        let start = output.find('{').ok_or_else(|| {
            RelayerError::HelperError(format!("no quote in output: {}", output.trim()))
        })?;
        Ok(serde_json::from_str(output[start..].trim())?)
    }
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Render a bridge-normalised amount in the token's display units.
pub fn ui_amount(normalized: u64, decimals: u8) -> String {
    let scale = decimals.min(MAX_BRIDGE_DECIMALS) as u32;
    if scale == 0 {
        return normalized.to_string();
    }
    let divisor = 10u64.pow(scale);
    let whole = normalized / divisor;
    let frac = normalized % divisor;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = scale as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[derive(Debug, Default)]
pub struct DecimalCache {
    decimals: HashMap<Pubkey, u8>,
}

impl DecimalCache {
    pub fn get(&self, mint: &Pubkey) -> Option<u8> {
        self.decimals.get(mint).copied()
    }

    pub fn insert(&mut self, mint: Pubkey, decimals: u8) {
        self.decimals.insert(mint, decimals);
    }
}

/// The pool and input mint named by a transfer's single swap step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub pool: Pubkey,
    pub mint_in: Pubkey,
    pub normalized_amount: u64,
}

impl SwapRequest {
    pub fn from_transfer(transfer: &ParsedTransfer) -> Result<Self> {
        let steps = &transfer.payload.swap_steps;
        if steps.len() != 1 {
            return Err(RelayerError::ParseError(format!(
                "expected one swap step, got {}",
                steps.len()
            )));
        }
        let step = &steps[0];

        let pool = std::str::from_utf8(&step.call_target)
            .map_err(|e| RelayerError::ParseError(format!("pool address: {}", e)))
            .and_then(|s| {
                Pubkey::from_str(s)
                    .map_err(|e| RelayerError::ParseError(format!("pool address {}: {}", s, e)))
            })?;
        let mint_in = Pubkey::try_from(step.sending_asset_id.as_slice())
            .map_err(|_| RelayerError::ParseError("swap input mint is not 32 bytes".to_string()))?;
        let normalized_amount = transfer
            .transfer
            .amount_u64()
            .ok_or_else(|| RelayerError::ParseError("amount exceeds u64".to_string()))?;

        Ok(Self {
            pool,
            mint_in,
            normalized_amount,
        })
    }

    pub fn script_args(&self, decimals: u8) -> Vec<String> {
        vec![
            self.pool.to_string(),
            self.mint_in.to_string(),
            ui_amount(self.normalized_amount, decimals),
        ]
    }
}

/// Quotes through the whirlpool helper script, caching mint decimals.
pub struct CommandRouteQuoter {
    helper: NodeHelper,
    script: PathBuf,
    rpc: Arc<RpcClient>,
    cache: Mutex<DecimalCache>,
}

impl CommandRouteQuoter {
    pub fn new(helper: NodeHelper, script: PathBuf, rpc: Arc<RpcClient>) -> Self {
        Self {
            helper,
            script,
            rpc,
            cache: Mutex::new(DecimalCache::default()),
        }
    }

    async fn decimals(&self, mint: &Pubkey) -> Result<u8> {
        if let Some(decimals) = self.cache.lock().await.get(mint) {
            return Ok(decimals);
        }
        let supply = self
            .rpc
            .get_token_supply(mint)
            .await
            .map_err(|e| RelayerError::SolanaRpcError(format!("token supply of {}: {}", mint, e)))?;
        debug!("Mint {} has {} decimals", mint, supply.decimals);
        self.cache.lock().await.insert(*mint, supply.decimals);
        Ok(supply.decimals)
    }
}

#[async_trait]
impl RouteQuoter for CommandRouteQuoter {
    async fn quote(&self, transfer: &ParsedTransfer) -> Result<WhirlpoolRoute> {
        let request = SwapRequest::from_transfer(transfer)?;
        let decimals = self.decimals(&request.mint_in).await?;
        let output = self
            .helper
            .run(&self.script, &request.script_args(decimals))
            .await?;
        let route = WhirlpoolRoute::from_output(&output)?;
        info!(
            "Quote for pool {}: in {} out {} min {}",
            route.whirlpool, route.amount_in, route.estimated_amount_out, route.min_amount_out
        );
        Ok(route)
    }
}
