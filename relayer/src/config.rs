use crate::codec::CodecConfig;
use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    pub pending: PendingConfig,
    pub solana: SolanaConfig,
    pub helpers: HelperConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: Network,
    /// Redundant signed-message endpoints.
    pub wormhole_urls: Vec<String>,
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub wormhole_chain_id: u16,
    /// Token bridge emitter, hex.
    pub emitter: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// Relay contract scanned for pending transfers.
    #[serde(default)]
    pub relay_contract: Option<String>,
    #[serde(default)]
    pub default_from_block: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    pub poll_interval_secs: u64,
    pub cooldown_secs: u64,
    pub max_attempts: u32,
    pub ledger_retention_secs: u64,
    pub restart_backoff_initial_secs: u64,
    pub restart_backoff_max_secs: u64,
    pub expected_gas_price: u64,
    /// Destination contract the transfer must be addressed to, hex.
    pub expected_contract: String,
    pub destination_chain_id: u16,
    #[serde(default)]
    pub force_without_swap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingMode {
    Aggregator,
    EvmLogs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    pub mode: PendingMode,
    pub aggregator_url: String,
    /// Source chain scanned in `evm_logs` mode.
    pub evm_chain: String,
    pub window: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    pub rpc_urls: Vec<String>,
    pub omniswap_program_id: String,
    pub token_bridge_program_id: String,
    pub core_bridge_program_id: String,
    pub beneficiary: String,
    pub lookup_table: String,
    pub compute_unit_limit: u32,
    pub commitment: String,
    #[serde(default, skip_serializing)]
    pub relayer_key: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    pub node: String,
    pub post_vaa_script: PathBuf,
    pub quote_script: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub cursor_path: PathBuf,
    pub gas_log_path: PathBuf,
}

impl RelayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn ledger_retention(&self) -> Duration {
        Duration::from_secs(self.ledger_retention_secs)
    }

    pub fn expected_contract_bytes(&self) -> Result<[u8; 32]> {
        let raw = hex::decode(self.expected_contract.trim_start_matches("0x"))
            .with_context(|| format!("Invalid expected contract {}", self.expected_contract))?;
        let mut out = [0u8; 32];
        if raw.len() > 32 {
            bail!("Expected contract longer than 32 bytes");
        }
        out[32 - raw.len()..].copy_from_slice(&raw);
        Ok(out)
    }
}

impl NetworkConfig {
    pub fn chain_by_id(&self, id: u16) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.wormhole_chain_id == id)
    }

    pub fn chain_by_name(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name)
    }
}

fn chain(
    name: &str,
    wormhole_chain_id: u16,
    emitter: &str,
    rpc_urls: &[&str],
    relay_contract: Option<&str>,
    default_from_block: Option<u64>,
) -> ChainConfig {
    ChainConfig {
        name: name.to_string(),
        wormhole_chain_id,
        emitter: emitter.to_string(),
        rpc_urls: rpc_urls.iter().map(|s| s.to_string()).collect(),
        relay_contract: relay_contract.map(str::to_string),
        default_from_block,
    }
}

/// A chain known only by its emitter: no scanning, no relay contract.
fn emitter_only(name: &str, wormhole_chain_id: u16, emitter: &str) -> ChainConfig {
    chain(name, wormhole_chain_id, emitter, &[], None, None)
}

fn mainnet_chains() -> Vec<ChainConfig> {
    vec![
        chain(
            "mainnet",
            2,
            "0x3ee18B2214AFF97000D974cf647E7C347E8fa585",
            &["https://eth.llamarpc.com"],
            Some(RELAY_CONTRACT),
            Some(18476135),
        ),
        chain(
            "bsc-main",
            4,
            "0xB6F6D86a8f9879A9c87f643768d9efc38c1Da6E7",
            &["https://bsc-dataseed1.ninicoin.io"],
            Some(RELAY_CONTRACT),
            Some(33108007),
        ),
        chain(
            "polygon-main",
            5,
            "0x5a58505a96D1dbf8dF91cB21B54419FC36e93fdE",
            &["https://polygon-rpc.com"],
            Some(RELAY_CONTRACT),
            Some(49407175),
        ),
        chain(
            "avax-main",
            6,
            "0x0e082F06FF657D94310cB8cE8B0D9a04541d8052",
            &["https://api.avax.network/ext/bc/C/rpc"],
            Some(RELAY_CONTRACT),
            Some(37191237),
        ),
        emitter_only("optimism-main", 24, "0x1D68124e65faFC907325e3EDbF8c4d84499DAa8b"),
        emitter_only("arbitrum-main", 23, "0x0b2402144Bb366A632D14B83F244D2e0e21bD39c"),
        emitter_only(
            "aptos-mainnet",
            22,
            "0x0000000000000000000000000000000000000000000000000000000000000002",
        ),
        emitter_only(
            "sui-mainnet",
            21,
            "0xccceeb29348f71bdd22ffef43a2a19c1f5b5e17c5cca5411529120182672ade5",
        ),
        emitter_only("base-main", 30, "0x8d2de8d2f73F1F4cAB472AC9A881C9b123C79627"),
        emitter_only(
            "solana-mainnet",
            1,
            "0xec7372995d5cc8732397fb0ad35c0121e0eaa90d26f828a534cab54391b3a4f5",
        ),
    ]
}

fn testnet_chains() -> Vec<ChainConfig> {
    vec![
        emitter_only("goerli", 2, "0xF890982f9310df57d00f659cf4fd87e65adEd8d7"),
        chain(
            "bsc-test",
            4,
            "0x9dcF9D205C9De35334D646BeE44b2D2859712A09",
            &["https://rpc.ankr.com/bsc_testnet_chapel"],
            Some("0x84B7cA95aC91f8903aCb08B27F5b41A4dE2Dc0fc"),
            Some(34075043),
        ),
        emitter_only("polygon-test", 5, "0x377D55a7928c046E18eEbb61977e714d2a76472a"),
        emitter_only("avax-test", 6, "0x61E44E506Ca5659E6c0bba9b678586fA2d729756"),
        emitter_only("optimism-test", 24, "0xC7A204bDBFe983FCD8d8E61D02b475D4073fF97e"),
        emitter_only("arbitrum-test", 23, "0x23908A62110e21C04F3A4e011d24F901F911744A"),
        emitter_only(
            "aptos-testnet",
            22,
            "0x0000000000000000000000000000000000000000000000000000000000000002",
        ),
        emitter_only(
            "sui-testnet",
            21,
            "0x6fb10cdb7aa299e9a4308752dadecb049ff55a892de92992a1edbd7912b3d6da",
        ),
        emitter_only(
            "solana-testnet",
            1,
            "0x3b26409f8aaded3f5ddca184695aa6a0fa829b0c85caf84856324896d214ca98",
        ),
    ]
}

const SO_DIAMOND: &str = "0x3636a3d9e02dccb121118909a4c7fcfbb292b61c774638ce0b093c2441bfa843";
const PENDING_URL: &str = "https://crossswap.coming.chat/v1/getUnSendTransferFromWormhole";
const OMNISWAP_PROGRAM_ID: &str = "4edLhT4MAausnqaxvB4ezcVG1adFnGw1QUMTvDMp4JVY";
const RELAY_CONTRACT: &str = "0x2967e7bb9daa5711ac332caf874bd47ef99b3820";

impl Config {
    /// Built-in values for a network, before environment overrides.
    pub fn preset(network: Network) -> Self {
        let relayer = RelayerConfig {
            poll_interval_secs: 30,
            cooldown_secs: 180,
            max_attempts: 5,
            ledger_retention_secs: 24 * 60 * 60,
            restart_backoff_initial_secs: 5,
            restart_backoff_max_secs: 300,
            expected_gas_price: 1,
            expected_contract: SO_DIAMOND.to_string(),
            destination_chain_id: 1,
            force_without_swap: false,
        };
        let helpers = HelperConfig {
            node: "node".to_string(),
            post_vaa_script: PathBuf::from("scripts/postvaa.js"),
            quote_script: PathBuf::from("scripts/get_whirlpool_quote_config.js"),
            timeout_secs: 120,
        };
        let storage = StorageConfig {
            cursor_path: PathBuf::from("./cache/latestFromBlock.json"),
            gas_log_path: PathBuf::from("solana.csv"),
        };

        match network {
            Network::Mainnet => Config {
                network: NetworkConfig {
                    name: network,
                    wormhole_urls: vec![
                        "https://api.wormholescan.io".to_string(),
                        "https://wormhole-v2-mainnet-api.mcf.rocks".to_string(),
                        "https://wormhole-v2-mainnet-api.chainlayer.network".to_string(),
                        "https://wormhole-v2-mainnet-api.staking.fund".to_string(),
                    ],
                    chains: mainnet_chains(),
                },
                relayer,
                codec: CodecConfig::default(),
                pending: PendingConfig {
                    mode: PendingMode::Aggregator,
                    aggregator_url: PENDING_URL.to_string(),
                    evm_chain: "bsc-main".to_string(),
                    window: 1000,
                },
                solana: SolanaConfig {
                    rpc_urls: vec!["https://api.mainnet-beta.solana.com".to_string()],
                    omniswap_program_id: OMNISWAP_PROGRAM_ID.to_string(),
                    token_bridge_program_id: "wormDTUJ6AWPNvk59vGQbDvGJmqbDTdgWgAqcLBCgUb"
                        .to_string(),
                    core_bridge_program_id: "worm2ZoG2kUd4vFXhvjh93UUH596ayRfgQ2MgjNMTth"
                        .to_string(),
                    beneficiary: "8LC49giae4hkSV6bS5dXP9G7jwvVAtShDsGQrKKycQc3".to_string(),
                    lookup_table: "8K1NLm2WvUT9inQGsRjF3vrq5wUMtRbPRcWgNpUNNBFC".to_string(),
                    compute_unit_limit: 1_200_000,
                    commitment: "confirmed".to_string(),
                    relayer_key: Vec::new(),
                },
                helpers,
                storage,
            },
            Network::Testnet => Config {
                network: NetworkConfig {
                    name: network,
                    wormhole_urls: vec!["https://wormhole-v2-testnet-api.certus.one".to_string()],
                    chains: testnet_chains(),
                },
                relayer,
                codec: CodecConfig::default(),
                pending: PendingConfig {
                    mode: PendingMode::EvmLogs,
                    aggregator_url: PENDING_URL.to_string(),
                    evm_chain: "bsc-test".to_string(),
                    window: 1000,
                },
                solana: SolanaConfig {
                    rpc_urls: vec!["https://api.devnet.solana.com".to_string()],
                    omniswap_program_id: OMNISWAP_PROGRAM_ID.to_string(),
                    token_bridge_program_id: "DZnkkTmCiFWfYTfT41X3Rd1kDgozqzxWaHqsw6W4x2oe"
                        .to_string(),
                    core_bridge_program_id: "3u8hJUVTA4jH1wYAyUur7FFZVQ8H635K3tSHHF4ssjQ5"
                        .to_string(),
                    beneficiary: "vQkE51MXJiwqtbwf562XWChNKZTgh6L2jHPpupoCKjS".to_string(),
                    lookup_table: "ESxWFjHVo2oes1eAQiwkAUHNTTUT9Xm5zsSrE7QStYX8".to_string(),
                    compute_unit_limit: 1_200_000,
                    commitment: "confirmed".to_string(),
                    relayer_key: Vec::new(),
                },
                helpers,
                storage,
            },
        }
    }

    /// Load an env file and build the config from the process environment.
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv::from_path(path.as_ref())
            .with_context(|| format!("{} format error", path.as_ref().display()))?;
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let network: Network = parse_enum(&env_or("NETWORK", "mainnet"))?;
        let mut config = Self::preset(network);

        if let Some(urls) = env_list("WORMHOLE_URLS") {
            config.network.wormhole_urls = urls;
        }

        let relayer = &mut config.relayer;
        relayer.poll_interval_secs = env_parse("POLL_INTERVAL_SECS", relayer.poll_interval_secs)?;
        relayer.cooldown_secs = env_parse("COOLDOWN_SECS", relayer.cooldown_secs)?;
        relayer.max_attempts = env_parse("MAX_ATTEMPTS", relayer.max_attempts)?;
        relayer.ledger_retention_secs =
            env_parse("LEDGER_RETENTION_SECS", relayer.ledger_retention_secs)?;
        relayer.restart_backoff_initial_secs =
            env_parse("RESTART_BACKOFF_SECS", relayer.restart_backoff_initial_secs)?;
        relayer.restart_backoff_max_secs =
            env_parse("RESTART_BACKOFF_MAX_SECS", relayer.restart_backoff_max_secs)?;
        relayer.expected_gas_price = env_parse("EXPECTED_GAS_PRICE", relayer.expected_gas_price)?;
        relayer.expected_contract = env_or("SODIAMOND", &relayer.expected_contract);
        relayer.destination_chain_id =
            env_parse("DST_WORMHOLE_CHAIN_ID", relayer.destination_chain_id)?;
        relayer.force_without_swap = env_parse("FORCE_WITHOUT_SWAP", relayer.force_without_swap)?;

        if let Ok(raw) = std::env::var("PAYLOAD_VERSION") {
            config.codec.version = parse_enum(&raw)?;
        }
        if let Ok(raw) = std::env::var("INTEGER_MODE") {
            config.codec.integer_mode = parse_enum(&raw)?;
        }
        if let Ok(raw) = std::env::var("RECEIVER_FORMAT") {
            config.codec.receiver_format = parse_enum(&raw)?;
        }

        let pending = &mut config.pending;
        if let Ok(raw) = std::env::var("PENDING_MODE") {
            pending.mode = parse_enum(&raw)?;
        }
        pending.aggregator_url = env_or("PENDING_URL", &pending.aggregator_url);
        pending.evm_chain = env_or("PENDING_CHAIN", &pending.evm_chain);
        pending.window = env_parse("SCAN_WINDOW", pending.window)?;

        let solana = &mut config.solana;
        if let Some(urls) = env_list("SOLANA_RPC_URLS") {
            solana.rpc_urls = urls;
        }
        solana.omniswap_program_id = env_or("OMNISWAP_PROGRAM_ID", &solana.omniswap_program_id);
        solana.token_bridge_program_id =
            env_or("TOKEN_BRIDGE_PROGRAM_ID", &solana.token_bridge_program_id);
        solana.core_bridge_program_id =
            env_or("CORE_BRIDGE_PROGRAM_ID", &solana.core_bridge_program_id);
        solana.beneficiary = env_or("BENEFICIARY", &solana.beneficiary);
        solana.lookup_table = env_or("LOOKUP_TABLE_KEY", &solana.lookup_table);
        solana.compute_unit_limit = env_parse("COMPUTE_UNIT_LIMIT", solana.compute_unit_limit)?;
        solana.commitment = env_or("SOLANA_COMMITMENT", &solana.commitment);
        if let Ok(raw) = std::env::var("RELAYER_KEY") {
            solana.relayer_key =
                serde_json::from_str(&raw).context("RELAYER_KEY must be a JSON byte array")?;
        }

        let helpers = &mut config.helpers;
        helpers.node = env_or("NODE_BIN", &helpers.node);
        if let Ok(raw) = std::env::var("POST_VAA_SCRIPT") {
            helpers.post_vaa_script = PathBuf::from(raw);
        }
        if let Ok(raw) = std::env::var("QUOTE_SCRIPT") {
            helpers.quote_script = PathBuf::from(raw);
        }
        helpers.timeout_secs = env_parse("HELPER_TIMEOUT_SECS", helpers.timeout_secs)?;

        if let Ok(raw) = std::env::var("CURSOR_PATH") {
            config.storage.cursor_path = PathBuf::from(raw);
        }
        if let Ok(raw) = std::env::var("GAS_LOG_PATH") {
            config.storage.gas_log_path = PathBuf::from(raw);
        }

        Ok(config)
    }

    /// Load a full TOML config. `RELAYER_KEY` in the environment fills in a
    /// missing `solana.relayer_key`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("{} format error", path.display()))?;
        if config.solana.relayer_key.is_empty() {
            if let Ok(raw) = std::env::var("RELAYER_KEY") {
                config.solana.relayer_key =
                    serde_json::from_str(&raw).context("RELAYER_KEY must be a JSON byte array")?;
            }
        }
        Ok(config)
    }

    /// `.toml` paths are full config files; anything else is an env file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_file(path)
        } else {
            Self::from_env_file(path)
        }
    }

    /// Checks that must hold before the relay loop can submit anything.
    pub fn validate_for_relay(&self) -> Result<()> {
        if self.solana.relayer_key.is_empty() {
            bail!("RELAYER_KEY not found");
        }
        if self.network.wormhole_urls.is_empty() {
            bail!("No signed message endpoints configured");
        }
        if self.solana.rpc_urls.is_empty() {
            bail!("No Solana RPC endpoints configured");
        }
        if self.relayer.max_attempts == 0 {
            bail!("MAX_ATTEMPTS must be at least 1");
        }
        self.relayer.expected_contract_bytes()?;
        if self.pending.mode == PendingMode::EvmLogs {
            let chain = self
                .network
                .chain_by_name(&self.pending.evm_chain)
                .ok_or_else(|| anyhow!("Unknown scan chain {}", self.pending.evm_chain))?;
            if chain.rpc_urls.is_empty() || chain.relay_contract.is_none() {
                bail!("Chain {} has no RPC or relay contract to scan", chain.name);
            }
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn parse_enum<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .map_err(|e| anyhow!("Invalid value {}: {}", raw, e))
}
