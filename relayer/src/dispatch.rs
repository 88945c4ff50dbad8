//! The relay state machine: one pending transfer in, one `RelayOutcome` out.

use crate::codec::PayloadCodec;
use crate::config::RelayerConfig;
use crate::destination::{Completion, Destination, MessagePoster, RouteQuoter, SubmitError};
use crate::error::Result;
use crate::fetcher::MessageSource;
use crate::gas_log::GasLog;
use crate::ledger::{AttemptDecision, RelayState};
use crate::pending::PendingSource;
use crate::types::{PendingTransfer, RelayOutcome, TransferKey};
use crate::vaa::ParsedTransfer;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// Checks a decoded transfer must pass before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub expected_gas_price: u64,
    pub expected_contract: [u8; 32],
    pub destination_chain_id: u16,
    /// Complete every transfer without a swap, telling the program to skip
    /// its payload checks.
    pub force_without_swap: bool,
}

impl DispatchPolicy {
    pub fn from_config(config: &RelayerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            expected_gas_price: config.expected_gas_price,
            expected_contract: config.expected_contract_bytes()?,
            destination_chain_id: config.destination_chain_id,
            force_without_swap: config.force_without_swap,
        })
    }

    /// `Err` carries the reason the transfer is rejected.
    pub fn validate(&self, parsed: &ParsedTransfer) -> std::result::Result<(), String> {
        let payload = &parsed.payload;
        let transfer = &parsed.transfer;

        if payload.dst_max_gas_price != self.expected_gas_price {
            return Err(format!(
                "dst max gas price {} != {}",
                payload.dst_max_gas_price, self.expected_gas_price
            ));
        }
        if transfer.to != self.expected_contract {
            return Err(format!(
                "transfer to 0x{} is not 0x{}",
                hex::encode(transfer.to),
                hex::encode(self.expected_contract)
            ));
        }
        if transfer.to_chain != self.destination_chain_id {
            return Err(format!(
                "transfer to chain {} is not {}",
                transfer.to_chain, self.destination_chain_id
            ));
        }
        if payload.receiver.is_empty() {
            return Err("empty receiver".to_string());
        }
        Ok(())
    }
}

pub struct Dispatcher {
    fetcher: Box<dyn MessageSource>,
    destination: Box<dyn Destination>,
    poster: Box<dyn MessagePoster>,
    quoter: Box<dyn RouteQuoter>,
    codec: PayloadCodec,
    policy: DispatchPolicy,
    gas_log: GasLog,
}

impl Dispatcher {
    pub fn new(
        fetcher: Box<dyn MessageSource>,
        destination: Box<dyn Destination>,
        poster: Box<dyn MessagePoster>,
        quoter: Box<dyn RouteQuoter>,
        codec: PayloadCodec,
        policy: DispatchPolicy,
        gas_log: GasLog,
    ) -> Self {
        Self {
            fetcher,
            destination,
            poster,
            quoter,
            codec,
            policy,
            gas_log,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// List pending transfers and relay each in sequence order.
    pub async fn run_cycle(
        &self,
        state: &mut RelayState,
        source: &mut dyn PendingSource,
    ) -> Result<Vec<(TransferKey, RelayOutcome)>> {
        let pending = source.list_pending(self.policy.destination_chain_id).await;
        debug!("{} pending transfers", pending.len());

        let mut outcomes = Vec::with_capacity(pending.len());
        for transfer in pending {
            let outcome = self.relay_at(state, &transfer, Utc::now()).await;
            if outcome == RelayOutcome::Waiting {
                source.note_waiting(&transfer).await;
            }
            log_outcome(&transfer, &outcome);
            outcomes.push((transfer.key(), outcome));
        }
        Ok(outcomes)
    }

    pub async fn relay(&self, state: &mut RelayState, transfer: &PendingTransfer) -> RelayOutcome {
        self.relay_at(state, transfer, Utc::now()).await
    }

    pub async fn relay_at(
        &self,
        state: &mut RelayState,
        transfer: &PendingTransfer,
        now: DateTime<Utc>,
    ) -> RelayOutcome {
        let key = transfer.key();
        if state.rejected.contains(&key) {
            return RelayOutcome::Rejected("rejected earlier".to_string());
        }

        let Some(bytes) = self
            .fetcher
            .fetch(transfer.sequence, transfer.source_chain_id)
            .await
        else {
            return RelayOutcome::Waiting;
        };

        match state.ledger.try_begin(key, now) {
            AttemptDecision::Proceed => {}
            AttemptDecision::Backoff => return RelayOutcome::PendingBackoff,
            AttemptDecision::Refused => return RelayOutcome::Refused,
        }

        let parsed = match ParsedTransfer::parse(&bytes, &self.codec) {
            Ok(parsed) => parsed,
            Err(e) => return reject(state, key, format!("decode: {}", e)),
        };
        if let Err(reason) = self.policy.validate(&parsed) {
            return reject(state, key, reason);
        }

        if !state.posted.contains(&key) {
            match self.poster.post_message(&bytes).await {
                Ok(()) => {
                    state.posted.insert(key);
                }
                Err(e) => warn!(
                    emitter_chain = transfer.source_chain_id,
                    sequence = transfer.sequence,
                    "PostVaaSolana failed: {}",
                    e
                ),
            }
        }

        let outcome = self.submit(state, key, &parsed).await;
        if let RelayOutcome::Completed { signature } = &outcome {
            if let Err(e) = self.gas_log.record(&transfer.source_transaction_hash, signature) {
                error!("Failed to record gas for {}: {}", key, e);
            }
        }
        outcome
    }

    async fn submit(
        &self,
        state: &mut RelayState,
        key: TransferKey,
        parsed: &ParsedTransfer,
    ) -> RelayOutcome {
        let steps = parsed.payload.swap_steps.len();
        let without_swap = Completion::WithoutSwap {
            skip_verify: self.policy.force_without_swap,
        };

        if steps > 1 && !self.policy.force_without_swap {
            return RelayOutcome::Unsupported(steps);
        }

        let asset = match self.destination.asset_representation(parsed).await {
            Ok(asset) => asset,
            Err(e) => return RelayOutcome::Failed(e.to_string()),
        };

        let result = if steps == 0 || self.policy.force_without_swap {
            self.destination.complete(parsed, asset, &without_swap).await
        } else {
            let route = match self.quoter.quote(parsed).await {
                Ok(route) => route,
                Err(e) => return RelayOutcome::Failed(format!("quote: {}", e)),
            };
            let with_swap = Completion::WithSwap { route };
            match self.destination.complete(parsed, asset, &with_swap).await {
                Err(SubmitError::SlippageExceeded(reason)) => {
                    warn!(
                        "{} for {} below minimum output, completing without swap: {}",
                        with_swap.name(asset),
                        key,
                        reason
                    );
                    self.destination.complete(parsed, asset, &without_swap).await
                }
                other => other,
            }
        };

        match result {
            Ok(signature) => RelayOutcome::Completed { signature },
            Err(e) => {
                if let SubmitError::MessageNotVerified(_) = e {
                    state.posted.remove(&key);
                }
                RelayOutcome::Failed(e.to_string())
            }
        }
    }
}

fn reject(state: &mut RelayState, key: TransferKey, reason: String) -> RelayOutcome {
    state.rejected.insert(key);
    RelayOutcome::Rejected(reason)
}

fn log_outcome(transfer: &PendingTransfer, outcome: &RelayOutcome) {
    let emitter_chain = transfer.source_chain_id;
    let sequence = transfer.sequence;
    match outcome {
        RelayOutcome::Completed { signature } => {
            info!(emitter_chain, sequence, "Relay success: {}", signature)
        }
        RelayOutcome::Waiting => debug!(emitter_chain, sequence, "Signed message not ready"),
        RelayOutcome::PendingBackoff => debug!(emitter_chain, sequence, "Waiting for cool-down"),
        RelayOutcome::Refused => debug!(emitter_chain, sequence, "Retry ceiling reached"),
        RelayOutcome::Rejected(reason) => warn!(emitter_chain, sequence, "Rejected: {}", reason),
        RelayOutcome::Failed(reason) => warn!(emitter_chain, sequence, "Relay failed: {}", reason),
        RelayOutcome::Unsupported(steps) => {
            warn!(emitter_chain, sequence, "Unsupported payload with {} swap steps", steps)
        }
    }
}
