//! Runs the node helper scripts that wrap the bridge and DEX SDKs.

use crate::destination::MessagePoster;
use crate::error::{RelayerError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct NodeHelper {
    node: String,
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl NodeHelper {
    pub fn new(node: impl Into<String>, timeout: Duration) -> Self {
        Self {
            node: node.into(),
            timeout,
            env: Vec::new(),
        }
    }

    /// Provider URL and wallet the scripts sign with. The scripts parse
    /// `ANCHOR_WALLET` as the keypair's JSON byte array.
    pub fn with_anchor_env(mut self, provider_url: &str, wallet_json: &str) -> Self {
        self.env
            .push(("ANCHOR_PROVIDER_URL".to_string(), provider_url.to_string()));
        self.env
            .push(("ANCHOR_WALLET".to_string(), wallet_json.to_string()));
        self
    }

    pub fn with_anchor_keypair(self, provider_url: &str, keypair: &[u8]) -> Result<Self> {
        let wallet_json = serde_json::to_string(keypair)?;
        Ok(self.with_anchor_env(provider_url, &wallet_json))
    }

    /// Run `script` with `args`, returning stdout on a zero exit.
    pub async fn run(&self, script: &Path, args: &[String]) -> Result<String> {
        debug!("Running {} {} {:?}", self.node, script.display(), args);

        let mut command = Command::new(&self.node);
        command
            .arg(script)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RelayerError::TimeoutError)??;

        if !output.status.success() {
            return Err(RelayerError::HelperError(format!(
                "{} exited with {}: {}",
                script.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Posts signed messages through the core bridge helper script.
pub struct ScriptPoster {
    helper: NodeHelper,
    script: PathBuf,
    core_bridge_program: String,
}

impl ScriptPoster {
    pub fn new(helper: NodeHelper, script: PathBuf, core_bridge_program: String) -> Self {
        Self {
            helper,
            script,
            core_bridge_program,
        }
    }
}

#[async_trait]
impl MessagePoster for ScriptPoster {
    async fn post_message(&self, vaa: &[u8]) -> Result<()> {
        let output = self
            .helper
            .run(
                &self.script,
                &[self.core_bridge_program.clone(), hex::encode(vaa)],
            )
            .await?;
        info!("PostVaaSolana finished: {}", output.trim());
        Ok(())
    }
}
