use serde::{Deserialize, Serialize};

/// Deduplication key of a transfer: a sequence is unique per emitter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferKey {
    pub sequence: u64,
    pub source_chain_id: u16,
}

impl std::fmt::Display for TransferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.sequence, self.source_chain_id)
    }
}

/// A transfer reported by a pending source, awaiting relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransfer {
    pub chain_name: String,
    #[serde(rename = "extrinsicHash")]
    pub source_transaction_hash: String,
    #[serde(rename = "srcWormholeChainId")]
    pub source_chain_id: u16,
    #[serde(rename = "dstWormholeChainId")]
    pub destination_chain_id: u16,
    pub sequence: u64,
    #[serde(default)]
    pub block_timestamp: u64,
    /// Block the transfer was found in, set by log-scanning sources.
    #[serde(rename = "fromBlock", default, skip_serializing_if = "Option::is_none")]
    pub origin_block: Option<u64>,
}

impl PendingTransfer {
    pub fn key(&self) -> TransferKey {
        TransferKey {
            sequence: self.sequence,
            source_chain_id: self.source_chain_id,
        }
    }
}

/// How the bridged asset is represented on the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetRepresentation {
    /// Held in token bridge custody and released.
    Native,
    /// Minted by the token bridge.
    Wrapped,
}

impl std::fmt::Display for AssetRepresentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetRepresentation::Native => write!(f, "Native"),
            AssetRepresentation::Wrapped => write!(f, "Wrapped"),
        }
    }
}

/// Result of one pass of the dispatch engine over a single transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Signed message not available yet.
    Waiting,
    /// Attempted recently, inside the cool-down window.
    PendingBackoff,
    /// Retry ceiling reached.
    Refused,
    /// Payload failed decoding or validation.
    Rejected(String),
    Completed { signature: String },
    /// Every submission path failed; retried after the cool-down.
    Failed(String),
    /// More swap steps than the destination supports.
    Unsupported(usize),
}

impl RelayOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RelayOutcome::Completed { .. }
                | RelayOutcome::Rejected(_)
                | RelayOutcome::Refused
                | RelayOutcome::Unsupported(_)
        )
    }
}

impl std::fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayOutcome::Waiting => write!(f, "Waiting"),
            RelayOutcome::PendingBackoff => write!(f, "PendingBackoff"),
            RelayOutcome::Refused => write!(f, "Refused"),
            RelayOutcome::Rejected(reason) => write!(f, "Rejected({})", reason),
            RelayOutcome::Completed { signature } => write!(f, "Completed({})", signature),
            RelayOutcome::Failed(reason) => write!(f, "Failed({})", reason),
            RelayOutcome::Unsupported(steps) => write!(f, "Unsupported({} swap steps)", steps),
        }
    }
}
