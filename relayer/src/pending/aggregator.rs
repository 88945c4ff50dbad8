use super::{select_for_destination, PendingSource};
use crate::error::Result;
use crate::types::PendingTransfer;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Pending transfers reported by the cross-swap aggregation service.
pub struct AggregatorSource {
    client: reqwest::Client,
    url: String,
}

impl AggregatorSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch_records(&self) -> Result<Vec<PendingTransfer>> {
        let body: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let records = match body.get("record").and_then(|r| r.as_array()) {
            Some(records) => records,
            None => {
                debug!("Aggregator response has no record array");
                return Ok(Vec::new());
            }
        };

        Ok(records
            .iter()
            .filter_map(|raw| match serde_json::from_value(raw.clone()) {
                Ok(transfer) => Some(transfer),
                Err(e) => {
                    warn!("Skipping malformed pending record {}: {}", raw, e);
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl PendingSource for AggregatorSource {
    async fn list_pending(&mut self, destination_chain_id: u16) -> Vec<PendingTransfer> {
        match self.fetch_records().await {
            Ok(records) => select_for_destination(records, destination_chain_id),
            Err(e) => {
                warn!("Get pending data error: {}", e);
                Vec::new()
            }
        }
    }

    async fn note_waiting(&mut self, _transfer: &PendingTransfer) {}
}
