use super::PendingSource;
use crate::config::ChainConfig;
use crate::cursor::CursorStore;
use crate::error::{RelayerError, Result};
use crate::types::PendingTransfer;
use alloy::{
    primitives::{b256, Address, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::Filter,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Emitted by the relay contract for every cross-chain swap it sends.
pub const RELAY_EVENT_TOPIC: B256 =
    b256!("0f0fd0ad174232a46f92a8d76b425830f45436483106ee965bbe91d3b7d1cd26");

/// `LogMessagePublished(address,uint64,uint32,bytes,uint8)` of the core bridge.
pub const LOG_MESSAGE_PUBLISHED_TOPIC: B256 =
    b256!("6eb224fb001ed210e379b335e35efe88672a8ce935d981a6896b27ffdf52a3b2");

/// ABI offset of the message payload inside `LogMessagePublished` data.
const PUBLISHED_PAYLOAD_OFFSET: usize = 160;

/// One relay event resolved to its core bridge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayLog {
    pub tx_hash: String,
    pub sequence: u64,
    pub to_chain: u16,
}

/// Read `(sequence, toChain)` out of `LogMessagePublished` data whose payload
/// is a token transfer.
pub fn parse_published_message(data: &[u8]) -> Option<(u64, u16)> {
    let to_chain_at = PUBLISHED_PAYLOAD_OFFSET + 99;
    if data.len() < to_chain_at + 2 {
        return None;
    }
    let mut seq = [0u8; 8];
    seq.copy_from_slice(&data[24..32]);
    let to_chain = u16::from_be_bytes([data[to_chain_at], data[to_chain_at + 1]]);
    Some((u64::from_be_bytes(seq), to_chain))
}

#[async_trait]
pub trait BlockLogReader: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Relay events in `[from, to]`, inclusive.
    async fn relay_logs(&self, from: u64, to: u64) -> Result<Vec<RelayLog>>;
}

pub struct AlloyLogReader {
    provider: RootProvider<Http<Client>>,
    relay_contract: Address,
}

impl AlloyLogReader {
    pub fn new(rpc_url: &str, relay_contract: &str) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| RelayerError::ConfigError(format!("Invalid RPC URL: {:?}", e)))?,
        );

        let relay_contract = Address::from_str(relay_contract).map_err(|e| {
            RelayerError::ConfigError(format!("Invalid relay contract address: {}", e))
        })?;

        Ok(Self {
            provider,
            relay_contract,
        })
    }

    pub fn from_chain(chain: &ChainConfig) -> Result<Self> {
        let rpc_url = chain.rpc_urls.first().ok_or_else(|| {
            RelayerError::ConfigError(format!("No RPC URL for chain {}", chain.name))
        })?;
        let contract = chain.relay_contract.as_deref().ok_or_else(|| {
            RelayerError::ConfigError(format!("No relay contract for chain {}", chain.name))
        })?;
        Self::new(rpc_url, contract)
    }
}

#[async_trait]
impl BlockLogReader for AlloyLogReader {
    async fn latest_block(&self) -> Result<u64> {
        self.provider.get_block_number().await.map_err(|e| {
            RelayerError::EthereumRpcError(format!("Failed to get block number: {}", e))
        })
    }

    async fn relay_logs(&self, from: u64, to: u64) -> Result<Vec<RelayLog>> {
        let filter = Filter::new()
            .address(self.relay_contract)
            .event_signature(RELAY_EVENT_TOPIC)
            .from_block(from)
            .to_block(to);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| RelayerError::EthereumRpcError(format!("Failed to get logs: {}", e)))?;

        let mut out = Vec::new();
        for log in logs {
            let tx_hash = log
                .transaction_hash
                .ok_or_else(|| RelayerError::ParseError("Missing transaction hash".to_string()))?;

            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| {
                    RelayerError::EthereumRpcError(format!("Failed to get receipt: {}", e))
                })?
                .ok_or_else(|| {
                    RelayerError::EthereumRpcError(format!("No receipt for {}", tx_hash))
                })?;

            let published = receipt
                .inner
                .logs()
                .iter()
                .find(|l| l.topic0() == Some(&LOG_MESSAGE_PUBLISHED_TOPIC));

            let Some(published) = published else {
                warn!("Relay transaction {} published no core bridge message", tx_hash);
                continue;
            };

            match parse_published_message(&published.data().data) {
                Some((sequence, to_chain)) => out.push(RelayLog {
                    tx_hash: format!("{:?}", tx_hash),
                    sequence,
                    to_chain,
                }),
                None => warn!("Short LogMessagePublished data in {}", tx_hash),
            }
        }

        Ok(out)
    }
}

/// Scans a source chain's relay contract in fixed block windows, starting at
/// the persisted cursor and stopping at the first window with results.
pub struct EvmLogSource<R> {
    reader: R,
    cursor: CursorStore,
    chain_name: String,
    chain_id: u16,
    default_from_block: u64,
    window: u64,
    waiting: BTreeMap<u64, PendingTransfer>,
}

impl<R: BlockLogReader> EvmLogSource<R> {
    /// Transfers left unresolved by a previous run are offered again.
    pub fn new(reader: R, cursor: CursorStore, chain: &ChainConfig, window: u64) -> Self {
        let waiting: BTreeMap<_, _> = cursor
            .unresolved(&chain.name)
            .into_iter()
            .map(|transfer| (transfer.sequence, transfer))
            .collect();
        if !waiting.is_empty() {
            info!("Resuming {} unresolved transfers on {}", waiting.len(), chain.name);
        }

        Self {
            reader,
            cursor,
            chain_name: chain.name.clone(),
            chain_id: chain.wormhole_chain_id,
            default_from_block: chain.default_from_block.unwrap_or(0),
            window: window.max(1),
            waiting,
        }
    }

    pub fn cursor(&self) -> &CursorStore {
        &self.cursor
    }

    fn persist(&mut self, unresolved: &[PendingTransfer]) {
        if let Err(e) = self.cursor.set_unresolved(&self.chain_name, unresolved) {
            warn!("Failed to persist unresolved transfers for {}: {}", self.chain_name, e);
        }
    }

    async fn scan(&mut self, destination_chain_id: u16) -> Result<Vec<PendingTransfer>> {
        let mut from = self.cursor.get(&self.chain_name, self.default_from_block)?;
        let latest = self.reader.latest_block().await?;
        let mut found = Vec::new();

        while from <= latest {
            let to = (from + self.window - 1).min(latest);
            info!(
                "Query log fromBlock:{} toBlock:{} latestBlock:{}",
                from, to, latest
            );

            let logs = self.reader.relay_logs(from, to).await?;
            self.cursor.set(&self.chain_name, to + 1)?;

            for log in logs {
                if log.to_chain != destination_chain_id {
                    debug!("Skipping sequence {} bound for chain {}", log.sequence, log.to_chain);
                    continue;
                }
                found.push(PendingTransfer {
                    chain_name: self.chain_name.clone(),
                    source_transaction_hash: log.tx_hash,
                    source_chain_id: self.chain_id,
                    destination_chain_id,
                    sequence: log.sequence,
                    block_timestamp: 0,
                    origin_block: Some(from),
                });
            }

            if !found.is_empty() {
                break;
            }
            from = to + 1;
        }

        Ok(found)
    }
}

#[async_trait]
impl<R: BlockLogReader> PendingSource for EvmLogSource<R> {
    async fn list_pending(&mut self, destination_chain_id: u16) -> Vec<PendingTransfer> {
        let mut by_sequence = std::mem::take(&mut self.waiting);

        match self.scan(destination_chain_id).await {
            Ok(found) => {
                for transfer in found {
                    by_sequence.insert(transfer.sequence, transfer);
                }
            }
            Err(e) => warn!("Scan of {} failed: {}", self.chain_name, e),
        }

        // Offered transfers stay on disk until a later listing drops them.
        let offered: Vec<_> = by_sequence.into_values().collect();
        self.persist(&offered);
        offered
    }

    async fn note_waiting(&mut self, transfer: &PendingTransfer) {
        self.waiting.insert(transfer.sequence, transfer.clone());
        let waiting: Vec<_> = self.waiting.values().cloned().collect();
        self.persist(&waiting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeReader {
        latest: u64,
        logs: Vec<(u64, RelayLog)>,
        queried: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl BlockLogReader for FakeReader {
        async fn latest_block(&self) -> Result<u64> {
            Ok(self.latest)
        }

        async fn relay_logs(&self, from: u64, to: u64) -> Result<Vec<RelayLog>> {
            self.queried.lock().unwrap().push((from, to));
            Ok(self
                .logs
                .iter()
                .filter(|(block, _)| *block >= from && *block <= to)
                .map(|(_, log)| log.clone())
                .collect())
        }
    }

    fn chain() -> ChainConfig {
        ChainConfig {
            name: "bsc-test".to_string(),
            wormhole_chain_id: 4,
            emitter: "0x9dcF9D205C9De35334D646BeE44b2D2859712A09".to_string(),
            rpc_urls: vec![],
            relay_contract: None,
            default_from_block: Some(1000),
        }
    }

    fn cursor_path(name: &str) -> std::path::PathBuf {
        let dir =
            std::env::temp_dir().join(format!("omniswap-evm-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("latestFromBlock.json")
    }

    fn cursor(name: &str) -> CursorStore {
        CursorStore::open(cursor_path(name)).unwrap()
    }

    fn reader(latest: u64, logs: Vec<(u64, RelayLog)>) -> FakeReader {
        FakeReader {
            latest,
            logs,
            queried: Mutex::new(Vec::new()),
        }
    }

    fn log(sequence: u64, to_chain: u16) -> RelayLog {
        RelayLog {
            tx_hash: format!("0x{:064x}", sequence),
            sequence,
            to_chain,
        }
    }

    #[test]
    fn test_parse_published_message() {
        let mut data = vec![0u8; 160 + 133];
        data[24..32].copy_from_slice(&4971u64.to_be_bytes());
        data[160] = 3;
        data[160 + 99..160 + 101].copy_from_slice(&1u16.to_be_bytes());
        assert_eq!(parse_published_message(&data), Some((4971, 1)));
        assert_eq!(parse_published_message(&data[..200]), None);
    }

    #[tokio::test]
    async fn test_scan_stops_at_first_window_with_results() {
        let reader = FakeReader {
            latest: 5000,
            logs: vec![(2500, log(7, 1)), (2600, log(8, 21)), (4000, log(9, 1))],
            queried: Mutex::new(Vec::new()),
        };
        let mut source = EvmLogSource::new(reader, cursor("windows"), &chain(), 1000);

        let first = source.list_pending(1).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].sequence, 7);
        assert_eq!(first[0].origin_block, Some(2000));
        assert_eq!(source.cursor().peek("bsc-test"), Some(3000));
        assert_eq!(
            *source.reader.queried.lock().unwrap(),
            vec![(1000, 1999), (2000, 2999)]
        );

        let second = source.list_pending(1).await;
        assert_eq!(second.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![9]);
        assert_eq!(source.cursor().peek("bsc-test"), Some(4000 + 1000));
    }

    #[tokio::test]
    async fn test_cursor_advances_without_results() {
        let reader = FakeReader {
            latest: 3500,
            logs: vec![],
            queried: Mutex::new(Vec::new()),
        };
        let mut source = EvmLogSource::new(reader, cursor("empty"), &chain(), 1000);
        assert!(source.list_pending(1).await.is_empty());
        assert_eq!(source.cursor().peek("bsc-test"), Some(3501));
    }

    #[tokio::test]
    async fn test_waiting_transfer_is_offered_again() {
        let reader = FakeReader {
            latest: 1500,
            logs: vec![(1200, log(3, 1))],
            queried: Mutex::new(Vec::new()),
        };
        let mut source = EvmLogSource::new(reader, cursor("waiting"), &chain(), 1000);

        let first = source.list_pending(1).await;
        assert_eq!(first.len(), 1);
        source.note_waiting(&first[0]).await;

        let again = source.list_pending(1).await;
        assert_eq!(again, first);
        assert_eq!(source.cursor().peek("bsc-test"), Some(1501));

        let drained = source.list_pending(1).await;
        assert!(drained.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_transfer_survives_restart() {
        let path = cursor_path("restart");
        {
            let cursor = CursorStore::open(&path).unwrap();
            let reader = reader(1500, vec![(1200, log(3, 1))]);
            let mut source = EvmLogSource::new(reader, cursor, &chain(), 1000);
            let first = source.list_pending(1).await;
            assert_eq!(first.len(), 1);
            source.note_waiting(&first[0]).await;
        }

        let cursor = CursorStore::open(&path).unwrap();
        assert_eq!(cursor.peek("bsc-test"), Some(1501));
        let mut source = EvmLogSource::new(reader(1500, vec![]), cursor, &chain(), 1000);
        let resumed = source.list_pending(1).await;
        assert_eq!(resumed.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_offered_transfer_survives_crash_mid_cycle() {
        let path = cursor_path("crash");
        {
            let cursor = CursorStore::open(&path).unwrap();
            let reader = reader(1500, vec![(1200, log(5, 1))]);
            let mut source = EvmLogSource::new(reader, cursor, &chain(), 1000);
            assert_eq!(source.list_pending(1).await.len(), 1);
        }

        let cursor = CursorStore::open(&path).unwrap();
        let mut source = EvmLogSource::new(reader(1500, vec![]), cursor, &chain(), 1000);
        let resumed = source.list_pending(1).await;
        assert_eq!(resumed.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![5]);
    }

    #[tokio::test]
    async fn test_resolved_transfer_is_not_resumed() {
        let path = cursor_path("resolved");
        {
            let cursor = CursorStore::open(&path).unwrap();
            let reader = reader(1500, vec![(1200, log(6, 1))]);
            let mut source = EvmLogSource::new(reader, cursor, &chain(), 1000);
            assert_eq!(source.list_pending(1).await.len(), 1);
            assert!(source.list_pending(1).await.is_empty());
        }

        let cursor = CursorStore::open(&path).unwrap();
        assert!(cursor.unresolved("bsc-test").is_empty());
        let mut source = EvmLogSource::new(reader(1500, vec![]), cursor, &chain(), 1000);
        assert!(source.list_pending(1).await.is_empty());
    }
}
