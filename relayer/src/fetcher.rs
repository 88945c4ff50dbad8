use crate::config::ChainConfig;
use crate::error::{RelayerError, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Source of guardian-signed messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// `None` means "not available yet", whatever the underlying cause.
    async fn fetch(&self, sequence: u64, emitter_chain: u16) -> Option<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedVaaResponse {
    vaa_bytes: String,
}

/// Fetches signed messages from one of several redundant guardian API
/// endpoints, picked at random per call.
pub struct WormholeFetcher {
    client: reqwest::Client,
    endpoints: Vec<String>,
    emitters: HashMap<u16, String>,
}

/// Strip `0x` and left-pad to 64 hex characters.
pub fn format_emitter_address(addr: &str) -> String {
    let addr = addr.trim_start_matches("0x");
    format!("{:0>64}", addr)
}

impl WormholeFetcher {
    pub fn new(endpoints: Vec<String>, chains: &[ChainConfig]) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(RelayerError::ConfigError(
                "At least one signed message endpoint is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let emitters = chains
            .iter()
            .map(|c| (c.wormhole_chain_id, format_emitter_address(&c.emitter)))
            .collect();

        Ok(Self {
            client,
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            emitters,
        })
    }

    pub fn url(&self, endpoint: &str, sequence: u64, emitter_chain: u16) -> Option<String> {
        let emitter = self.emitters.get(&emitter_chain)?;
        Some(format!(
            "{}/v1/signed_vaa/{}/{}/{}",
            endpoint, emitter_chain, emitter, sequence
        ))
    }

    async fn fetch_from(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: SignedVaaResponse = response.json().await?;
        base64::decode(body.vaa_bytes.trim())
            .map_err(|e| RelayerError::ParseError(format!("Invalid vaaBytes: {}", e)))
    }
}

#[async_trait]
impl MessageSource for WormholeFetcher {
    async fn fetch(&self, sequence: u64, emitter_chain: u16) -> Option<Vec<u8>> {
        let endpoint = {
            let mut rng = rand::thread_rng();
            self.endpoints.choose(&mut rng)?.clone()
        };

        let Some(url) = self.url(&endpoint, sequence, emitter_chain) else {
            debug!("No emitter configured for chain {}", emitter_chain);
            return None;
        };

        match self.fetch_from(&url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("Signed message not available from {}: {}", url, e);
                None
            }
        }
    }
}
