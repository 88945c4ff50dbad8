// Omniswap CLI
// Operator tools for inspecting relayed messages and the scan cursor

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use omniswap_relayer::codec::{
    CodecConfig, CrossChainPayload, IntegerMode, PayloadCodec, PayloadVersion,
};
use omniswap_relayer::config::{Config, Network};
use omniswap_relayer::cursor::CursorStore;
use omniswap_relayer::fetcher::{MessageSource, WormholeFetcher};
use omniswap_relayer::vaa::ParsedTransfer;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "omniswap")]
#[command(about = "Omniswap relayer operator tools", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Decode payloads with the 1-byte call data length prefix
    #[arg(long, global = true)]
    v1: bool,

    /// Read oversized integers by their first five bytes instead of failing
    #[arg(long, global = true)]
    compat5: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a signed message given as hex
    Decode { hex: String },

    /// Fetch a signed message from the guardian endpoints and decode it
    Fetch {
        #[arg(long)]
        chain: u16,

        #[arg(long)]
        sequence: u64,

        #[arg(long, default_value = "mainnet")]
        network: String,

        /// Attempts across the redundant endpoints
        #[arg(long, default_value_t = 5)]
        attempts: u32,
    },

    /// Inspect or move the source chain scan cursor
    Cursor {
        #[arg(long, default_value = "./cache/latestFromBlock.json")]
        path: PathBuf,

        #[command(subcommand)]
        action: CursorAction,
    },
}

#[derive(Subcommand)]
enum CursorAction {
    Show,
    Set { chain: String, block: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let codec = PayloadCodec::new(CodecConfig {
        version: if cli.v1 { PayloadVersion::V1 } else { PayloadVersion::V2 },
        integer_mode: if cli.compat5 { IntegerMode::Compat5 } else { IntegerMode::Strict },
        ..Default::default()
    });

    match cli.command {
        Commands::Decode { hex } => {
            let bytes = hex::decode(hex.trim().trim_start_matches("0x")).context("Invalid hex")?;
            print_transfer(&bytes, &codec)?;
        }
        Commands::Fetch {
            chain,
            sequence,
            network,
            attempts,
        } => {
            let network = match network.as_str() {
                "mainnet" => Network::Mainnet,
                "testnet" => Network::Testnet,
                other => bail!("Unknown network {}", other),
            };
            let config = Config::preset(network);
            let fetcher =
                WormholeFetcher::new(config.network.wormhole_urls, &config.network.chains)?;

            info!("Fetching sequence {} from chain {}...", sequence, chain);
            let mut bytes = None;
            for attempt in 1..=attempts.max(1) {
                bytes = fetcher.fetch(sequence, chain).await;
                if bytes.is_some() {
                    break;
                }
                warn!("Attempt {}/{}: sequence {} not signed yet", attempt, attempts, sequence);
            }
            let bytes = bytes.ok_or_else(|| anyhow!("Signed message not available"))?;
            println!("{}", hex::encode(&bytes));
            print_transfer(&bytes, &codec)?;
        }
        Commands::Cursor { path, action } => {
            let mut store = CursorStore::open(&path)?;
            match action {
                CursorAction::Show => {
                    println!("Cursor file: {}", store.path().display());
                    for (chain, block) in store.entries() {
                        println!("   {}: {}", chain, block);
                    }
                }
                CursorAction::Set { chain, block } => {
                    let previous = store.peek(&chain);
                    let kept = store.set(&chain, block)?;
                    println!("{}", describe_set(&chain, previous, block, kept));
                }
            }
        }
    }

    Ok(())
}

/// The cursor only moves forward, so report what was actually kept.
fn describe_set(chain: &str, previous: Option<u64>, requested: u64, kept: u64) -> String {
    match previous {
        Some(_) if kept != requested => format!(
            "{}: kept {} (cursor does not move backwards to {})",
            chain, kept, requested
        ),
        Some(previous) if previous == kept => format!("{}: {} (unchanged)", chain, kept),
        Some(previous) => format!("{}: {} -> {}", chain, previous, kept),
        None => format!("{}: {}", chain, kept),
    }
}

fn print_transfer(bytes: &[u8], codec: &PayloadCodec) -> Result<()> {
    let parsed = ParsedTransfer::parse(bytes, codec)?;
    let out = json!({
        "vaa": parsed.vaa,
        "transfer": parsed.transfer,
        "amount": parsed.transfer.amount_u64(),
        "payload": payload_json(&parsed.payload),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn payload_json(payload: &CrossChainPayload) -> serde_json::Value {
    let steps: Vec<_> = payload
        .swap_steps
        .iter()
        .map(|step| {
            json!({
                "callTarget": String::from_utf8_lossy(&step.call_target),
                "sendingAssetId": format!("0x{}", hex::encode(&step.sending_asset_id)),
                "receivingAssetId": format!("0x{}", hex::encode(&step.receiving_asset_id)),
                "callData": format!("0x{}", hex::encode(&step.call_data)),
            })
        })
        .collect();

    json!({
        "dstMaxGasPrice": payload.dst_max_gas_price,
        "dstMaxGas": payload.dst_max_gas,
        "sourceTransactionId": format!("0x{}", hex::encode(&payload.source_transaction_id)),
        "receiver": payload.receiver,
        "receivingAssetId": format!("0x{}", hex::encode(&payload.receiving_asset_id)),
        "swapSteps": steps,
    })
}
