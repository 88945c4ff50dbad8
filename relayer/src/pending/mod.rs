//! Sources of transfers awaiting relay.

pub mod aggregator;
pub mod evm;

use crate::types::PendingTransfer;
use async_trait::async_trait;

pub use aggregator::AggregatorSource;
pub use evm::{AlloyLogReader, BlockLogReader, EvmLogSource, RelayLog};

#[async_trait]
pub trait PendingSource: Send {
    /// Transfers bound for `destination_chain_id`, ascending by sequence.
    /// Network failures yield an empty list.
    async fn list_pending(&mut self, destination_chain_id: u16) -> Vec<PendingTransfer>;

    /// The signed message for `transfer` is not available yet; offer it
    /// again on a later listing.
    async fn note_waiting(&mut self, transfer: &PendingTransfer);
}

/// Keep transfers for one destination, ordered by sequence.
pub fn select_for_destination(
    mut transfers: Vec<PendingTransfer>,
    destination_chain_id: u16,
) -> Vec<PendingTransfer> {
    transfers.retain(|t| t.destination_chain_id == destination_chain_id);
    transfers.sort_by_key(|t| t.sequence);
    transfers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(sequence: u64, dst: u16) -> PendingTransfer {
        PendingTransfer {
            chain_name: "bsc-main".to_string(),
            source_transaction_hash: format!("0x{:02x}", sequence),
            source_chain_id: 4,
            destination_chain_id: dst,
            sequence,
            block_timestamp: 0,
            origin_block: None,
        }
    }

    #[test]
    fn test_select_filters_and_sorts() {
        let selected = select_for_destination(
            vec![transfer(9, 1), transfer(3, 21), transfer(2, 1), transfer(5, 1)],
            1,
        );
        let sequences: Vec<u64> = selected.iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![2, 5, 9]);
    }
}
