use anyhow::{Context, Result};
use clap::Parser;
use omniswap_relayer::codec::PayloadCodec;
use omniswap_relayer::config::{Config, PendingMode};
use omniswap_relayer::cursor::CursorStore;
use omniswap_relayer::dispatch::{DispatchPolicy, Dispatcher};
use omniswap_relayer::fetcher::WormholeFetcher;
use omniswap_relayer::gas_log::GasLog;
use omniswap_relayer::ledger::{RelayState, RetryLedger};
use omniswap_relayer::node_helper::{NodeHelper, ScriptPoster};
use omniswap_relayer::pending::{AggregatorSource, AlloyLogReader, EvmLogSource, PendingSource};
use omniswap_relayer::quote::CommandRouteQuoter;
use omniswap_relayer::solana::{self, SolanaDestination};
use omniswap_relayer::supervisor::{RestartBackoff, Supervisor};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "omniswap-relayer")]
#[command(about = "Relays cross-chain swap transfers to Solana", long_about = None)]
struct Args {
    /// Environment file holding RELAYER_KEY and overrides, or a `.toml` config
    #[arg(default_value = ".env")]
    env_file: PathBuf,

    /// CSV file that pairs source and destination transactions
    gas_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("Relayer failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Omniswap relayer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from {}", args.env_file.display());
    let mut config = Config::load(&args.env_file)?;
    if let Some(path) = args.gas_log {
        config.storage.gas_log_path = path;
    }
    config.validate_for_relay()?;
    info!("Configuration loaded for {:?}", config.network.name);

    let relayer = &config.relayer;
    let state = RelayState::new(RetryLedger::new(
        relayer.cooldown(),
        relayer.max_attempts,
        relayer.ledger_retention(),
    ));

    let fetcher =
        WormholeFetcher::new(config.network.wormhole_urls.clone(), &config.network.chains)?;

    let client = solana::connect(&config.solana)?;
    let destination = SolanaDestination::new(
        client.clone(),
        &config.solana,
        relayer.destination_chain_id,
        config.codec.receiver_format,
    )?;

    let helper = NodeHelper::new(
        config.helpers.node.clone(),
        Duration::from_secs(config.helpers.timeout_secs),
    )
    .with_anchor_keypair(client.url().as_str(), &config.solana.relayer_key)?;

    let poster = ScriptPoster::new(
        helper.clone(),
        config.helpers.post_vaa_script.clone(),
        config.solana.core_bridge_program_id.clone(),
    );
    let quoter = CommandRouteQuoter::new(helper, config.helpers.quote_script.clone(), client);

    let source: Box<dyn PendingSource> = match config.pending.mode {
        PendingMode::Aggregator => {
            info!("Pending transfers from {}", config.pending.aggregator_url);
            Box::new(AggregatorSource::new(config.pending.aggregator_url.clone())?)
        }
        PendingMode::EvmLogs => {
            let chain = config
                .network
                .chain_by_name(&config.pending.evm_chain)
                .context("Unknown scan chain")?;
            info!("Pending transfers from {} relay logs", chain.name);
            let cursor = CursorStore::open(&config.storage.cursor_path)?;
            Box::new(EvmLogSource::new(
                AlloyLogReader::from_chain(chain)?,
                cursor,
                chain,
                config.pending.window,
            ))
        }
    };

    let dispatcher = Dispatcher::new(
        Box::new(fetcher),
        Box::new(destination),
        Box::new(poster),
        Box::new(quoter),
        PayloadCodec::new(config.codec),
        DispatchPolicy::from_config(relayer)?,
        GasLog::new(&config.storage.gas_log_path),
    );
    info!("Gas log: {}", config.storage.gas_log_path.display());

    let mut supervisor = Supervisor::new(
        dispatcher,
        source,
        state,
        relayer.poll_interval(),
        RestartBackoff::new(
            Duration::from_secs(relayer.restart_backoff_initial_secs),
            Duration::from_secs(relayer.restart_backoff_max_secs),
        ),
    );

    info!("Relayer is running! Press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received...");
        }
        _ = supervisor.run() => {}
    }

    info!("Relayer stopped gracefully");
    Ok(())
}
