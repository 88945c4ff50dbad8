mod common;

use mockito::{Matcher, Server};
use omniswap_relayer::config::ChainConfig;
use omniswap_relayer::fetcher::{MessageSource, WormholeFetcher};
use omniswap_relayer::pending::{AggregatorSource, PendingSource};

fn bsc() -> ChainConfig {
    ChainConfig {
        name: "bsc-test".to_string(),
        wormhole_chain_id: 4,
        emitter: "0x9dcF9D205C9De35334D646BeE44b2D2859712A09".to_string(),
        rpc_urls: vec![],
        relay_contract: None,
        default_from_block: None,
    }
}

const SIGNED_PATH: &str =
    "/v1/signed_vaa/4/0000000000000000000000009dcF9D205C9De35334D646BeE44b2D2859712A09/4971";

#[tokio::test]
async fn test_fetch_survives_failing_endpoints() {
    let mut good = Server::new_async().await;
    let mut bad_a = Server::new_async().await;
    let mut bad_b = Server::new_async().await;

    let body = serde_json::json!({ "vaaBytes": base64::encode(common::sample_bytes()) });
    let ok = good
        .mock("GET", SIGNED_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect_at_least(1)
        .create_async()
        .await;
    bad_a
        .mock("GET", Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    bad_b
        .mock("GET", Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let fetcher =
        WormholeFetcher::new(vec![bad_a.url(), good.url(), bad_b.url()], &[bsc()]).unwrap();

    let mut fetched = None;
    for _ in 0..200 {
        fetched = fetcher.fetch(4971, 4).await;
        if fetched.is_some() {
            break;
        }
    }

    assert_eq!(fetched, Some(common::sample_bytes()));
    ok.assert_async().await;
}

#[tokio::test]
async fn test_fetch_not_found_and_unknown_chain_are_none() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Any)
        .with_status(404)
        .with_body(r#"{"code":5,"message":"requested VAA not found in store"}"#)
        .create_async()
        .await;

    let fetcher = WormholeFetcher::new(vec![server.url()], &[bsc()]).unwrap();
    assert_eq!(fetcher.fetch(4971, 4).await, None);
    assert_eq!(fetcher.fetch(4971, 6).await, None);
}

#[tokio::test]
async fn test_fetch_bad_body_is_none() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", SIGNED_PATH)
        .with_status(200)
        .with_body(r#"{"vaaBytes":"not base64!"}"#)
        .create_async()
        .await;

    let fetcher = WormholeFetcher::new(vec![format!("{}/", server.url())], &[bsc()]).unwrap();
    assert_eq!(fetcher.fetch(4971, 4).await, None);
}

#[tokio::test]
async fn test_aggregator_filters_and_orders() {
    let mut server = Server::new_async().await;
    let body = serde_json::json!({
        "record": [
            {"chainName": "bsc-main", "extrinsicHash": "0x03", "srcWormholeChainId": 4,
             "dstWormholeChainId": 1, "sequence": 3, "blockTimestamp": 1696731816},
            {"chainName": "polygon-main", "extrinsicHash": "0x01", "srcWormholeChainId": 5,
             "dstWormholeChainId": 21, "sequence": 1, "blockTimestamp": 1696731800},
            {"chainName": "bsc-main", "extrinsicHash": "0x02", "srcWormholeChainId": 4,
             "dstWormholeChainId": 1, "sequence": 2, "blockTimestamp": 1696731700},
            {"chainName": "bsc-main", "sequence": "garbage"}
        ]
    });
    server
        .mock("GET", "/v1/getUnSendTransferFromWormhole")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let url = format!("{}/v1/getUnSendTransferFromWormhole", server.url());
    let mut source = AggregatorSource::new(url).unwrap();
    let pending = source.list_pending(1).await;

    let sequences: Vec<u64> = pending.iter().map(|t| t.sequence).collect();
    assert_eq!(sequences, vec![2, 3]);
    assert_eq!(pending[0].source_transaction_hash, "0x02");
    assert_eq!(pending[0].source_chain_id, 4);
    assert_eq!(pending[0].origin_block, None);
}

#[tokio::test]
async fn test_aggregator_failure_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let mut source = AggregatorSource::new(server.url()).unwrap();
    assert!(source.list_pending(1).await.is_empty());
}

#[tokio::test]
async fn test_aggregator_without_record_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Any)
        .with_status(200)
        .with_body(r#"{"code":0}"#)
        .create_async()
        .await;

    let mut source = AggregatorSource::new(server.url()).unwrap();
    assert!(source.list_pending(1).await.is_empty());
}
