mod common;

use async_trait::async_trait;
use omniswap_relayer::codec::PayloadCodec;
use omniswap_relayer::destination::{
    Completion, Destination, MessagePoster, RouteQuoter, SubmitError,
};
use omniswap_relayer::dispatch::{DispatchPolicy, Dispatcher};
use omniswap_relayer::fetcher::MessageSource;
use omniswap_relayer::gas_log::GasLog;
use omniswap_relayer::ledger::{RelayState, RetryLedger};
use omniswap_relayer::pending::PendingSource;
use omniswap_relayer::quote::WhirlpoolRoute;
use omniswap_relayer::supervisor::{RestartBackoff, Supervisor};
use omniswap_relayer::types::{AssetRepresentation, PendingTransfer};
use omniswap_relayer::vaa::ParsedTransfer;
use omniswap_relayer::{RelayerError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;

/// Serves a fixed list once, then only what was reported as waiting.
struct ListSource {
    first: Option<Vec<PendingTransfer>>,
    waiting: Vec<PendingTransfer>,
    noted: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl PendingSource for ListSource {
    async fn list_pending(&mut self, _destination_chain_id: u16) -> Vec<PendingTransfer> {
        let mut out = self.first.take().unwrap_or_default();
        out.append(&mut self.waiting);
        out
    }

    async fn note_waiting(&mut self, transfer: &PendingTransfer) {
        self.noted.lock().unwrap().push(transfer.sequence);
        self.waiting.push(transfer.clone());
    }
}

/// Panics on the first listing, then serves its list once.
struct PanicOnceSource {
    panicked: bool,
    list: Option<Vec<PendingTransfer>>,
}

#[async_trait]
impl PendingSource for PanicOnceSource {
    async fn list_pending(&mut self, _destination_chain_id: u16) -> Vec<PendingTransfer> {
        if !self.panicked {
            self.panicked = true;
            panic!("pending source blew up");
        }
        self.list.take().unwrap_or_default()
    }

    async fn note_waiting(&mut self, _transfer: &PendingTransfer) {}
}

struct MapFetcher(Arc<Mutex<HashMap<u64, Vec<u8>>>>);

#[async_trait]
impl MessageSource for MapFetcher {
    async fn fetch(&self, sequence: u64, _emitter_chain: u16) -> Option<Vec<u8>> {
        self.0.lock().unwrap().get(&sequence).cloned()
    }
}

#[derive(Default)]
struct Calls {
    posted: usize,
    quoted: usize,
    completions: Vec<(u64, String)>,
}

struct FakePoster(Arc<Mutex<Calls>>);

#[async_trait]
impl MessagePoster for FakePoster {
    async fn post_message(&self, _vaa: &[u8]) -> Result<()> {
        self.0.lock().unwrap().posted += 1;
        Ok(())
    }
}

struct FakeQuoter(Arc<Mutex<Calls>>);

#[async_trait]
impl RouteQuoter for FakeQuoter {
    async fn quote(&self, _transfer: &ParsedTransfer) -> Result<WhirlpoolRoute> {
        self.0.lock().unwrap().quoted += 1;
        WhirlpoolRoute::from_output(common::SAMPLE_QUOTE)
    }
}

/// Every swap misses its minimum output; plain completions succeed.
struct FakeDestination(Arc<Mutex<Calls>>);

#[async_trait]
impl Destination for FakeDestination {
    async fn asset_representation(
        &self,
        transfer: &ParsedTransfer,
    ) -> std::result::Result<AssetRepresentation, SubmitError> {
        Ok(if transfer.transfer.token_chain == 1 {
            AssetRepresentation::Native
        } else {
            AssetRepresentation::Wrapped
        })
    }

    async fn complete(
        &self,
        transfer: &ParsedTransfer,
        asset: AssetRepresentation,
        completion: &Completion,
    ) -> std::result::Result<String, SubmitError> {
        let sequence = transfer.vaa.sequence;
        self.0
            .lock()
            .unwrap()
            .completions
            .push((sequence, completion.name(asset).to_string()));
        match completion {
            Completion::WithSwap { .. } => Err(SubmitError::classify(
                "Program log: AnchorError occurred. Error Code: AmountOutBelowMinimum.",
            )),
            Completion::WithoutSwap { .. } => Ok(format!("sig{}", sequence)),
        }
    }
}

fn policy() -> DispatchPolicy {
    let mut expected_contract = [0u8; 32];
    expected_contract.copy_from_slice(&hex::decode(common::SAMPLE_CONTRACT).unwrap());
    DispatchPolicy {
        expected_gas_price: 1,
        expected_contract,
        destination_chain_id: 1,
        force_without_swap: false,
    }
}

fn supervisor(
    messages: Arc<Mutex<HashMap<u64, Vec<u8>>>>,
    source: impl PendingSource + 'static,
    calls: Arc<Mutex<Calls>>,
    log: &std::path::Path,
) -> Supervisor {
    let dispatcher = Dispatcher::new(
        Box::new(MapFetcher(messages)),
        Box::new(FakeDestination(calls.clone())),
        Box::new(FakePoster(calls.clone())),
        Box::new(FakeQuoter(calls)),
        PayloadCodec::default(),
        policy(),
        GasLog::new(log),
    );
    let state = RelayState::new(RetryLedger::new(
        Duration::from_secs(180),
        5,
        Duration::from_secs(86_400),
    ));
    Supervisor::new(
        dispatcher,
        Box::new(source),
        state,
        Duration::from_millis(10),
        RestartBackoff::new(Duration::from_millis(10), Duration::from_millis(100)),
    )
}

#[tokio::test]
async fn test_zero_swap_transfer_is_completed_without_quoting() {
    let messages = Arc::new(Mutex::new(HashMap::from([(4971, common::sample_bytes())])));
    let calls = Arc::new(Mutex::new(Calls::default()));
    let noted = Arc::new(Mutex::new(Vec::new()));
    let log = common::temp_path("zero-swap.csv");

    let source = ListSource {
        first: Some(vec![common::pending(4971)]),
        waiting: Vec::new(),
        noted: noted.clone(),
    };
    let mut supervisor = supervisor(messages, source, calls.clone(), &log);

    assert_eq!(supervisor.cycle().await.unwrap(), 1);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.quoted, 0);
    assert_eq!(calls.posted, 1);
    assert_eq!(calls.completions, vec![(4971, "RedeemNativeWithoutSwap".to_string())]);
    assert!(noted.lock().unwrap().is_empty());

    let csv = std::fs::read_to_string(&log).unwrap();
    assert_eq!(csv, "\"srcTx\",\"dstTx\"\n\"0x136b\",\"sig4971\"\n");
}

#[tokio::test]
async fn test_slippage_falls_back_to_plain_completion() {
    let messages = Arc::new(Mutex::new(HashMap::from([(4971, common::sample_with_steps(1))])));
    let calls = Arc::new(Mutex::new(Calls::default()));
    let log = common::temp_path("slippage.csv");

    let source = ListSource {
        first: Some(vec![common::pending(4971)]),
        waiting: Vec::new(),
        noted: Arc::new(Mutex::new(Vec::new())),
    };
    let mut supervisor = supervisor(messages, source, calls.clone(), &log);
    assert_ok!(supervisor.cycle().await);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.quoted, 1);
    assert_eq!(
        calls.completions,
        vec![
            (4971, "RedeemNativeWithSwap".to_string()),
            (4971, "RedeemNativeWithoutSwap".to_string()),
        ]
    );
    assert!(std::fs::read_to_string(&log).unwrap().contains("\"sig4971\""));
}

#[tokio::test]
async fn test_waiting_transfer_is_offered_again_and_completed_once_signed() {
    let messages = Arc::new(Mutex::new(HashMap::new()));
    let calls = Arc::new(Mutex::new(Calls::default()));
    let noted = Arc::new(Mutex::new(Vec::new()));
    let log = common::temp_path("waiting.csv");

    let source = ListSource {
        first: Some(vec![common::pending(4971)]),
        waiting: Vec::new(),
        noted: noted.clone(),
    };
    let mut supervisor = supervisor(messages.clone(), source, calls.clone(), &log);

    supervisor.cycle().await.unwrap();
    assert_eq!(*noted.lock().unwrap(), vec![4971]);
    assert!(supervisor.state().await.ledger.is_empty());
    assert!(calls.lock().unwrap().completions.is_empty());

    messages.lock().unwrap().insert(4971, common::sample_bytes());
    supervisor.cycle().await.unwrap();

    assert_eq!(calls.lock().unwrap().completions.len(), 1);
    assert_eq!(noted.lock().unwrap().len(), 1);
    assert!(supervisor.state().await.posted.contains(&common::pending(4971).key()));
}

#[tokio::test]
async fn test_panicking_cycle_is_reported_and_the_next_one_runs() {
    let messages = Arc::new(Mutex::new(HashMap::from([(4971, common::sample_bytes())])));
    let calls = Arc::new(Mutex::new(Calls::default()));
    let log = common::temp_path("panic-cycle.csv");

    let source = PanicOnceSource {
        panicked: false,
        list: Some(vec![common::pending(4971)]),
    };
    let mut supervisor = supervisor(messages, source, calls.clone(), &log);

    let err = supervisor.cycle().await.unwrap_err();
    assert!(matches!(err, RelayerError::CycleAborted(_)));

    assert_eq!(supervisor.cycle().await.unwrap(), 1);
    assert_eq!(calls.lock().unwrap().completions.len(), 1);
    assert!(supervisor.state().await.posted.contains(&common::pending(4971).key()));
}

#[tokio::test]
async fn test_run_restarts_after_a_panicking_cycle() {
    let messages = Arc::new(Mutex::new(HashMap::from([(4971, common::sample_bytes())])));
    let calls = Arc::new(Mutex::new(Calls::default()));
    let log = common::temp_path("panic-run.csv");

    let source = PanicOnceSource {
        panicked: false,
        list: Some(vec![common::pending(4971)]),
    };
    let mut supervisor = supervisor(messages, source, calls.clone(), &log);

    let stopped = tokio::time::timeout(Duration::from_millis(500), supervisor.run()).await;
    assert!(stopped.is_err(), "run() must keep looping");
    assert_eq!(
        calls.lock().unwrap().completions,
        vec![(4971, "RedeemNativeWithoutSwap".to_string())]
    );
}
