use crate::error::Result;
use crate::types::PendingTransfer;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Last scanned source-chain block per chain name, kept in a JSON file that
/// is rewritten in full on every change.
///
/// Transfers found behind the cursor but not yet relayed live in a sidecar
/// file (`<name>.pending.json`), so a restart offers them again.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    blocks: BTreeMap<String, u64>,
    unresolved: BTreeMap<String, Vec<PendingTransfer>>,
}

impl CursorStore {
    /// Read the file if present. An unreadable or corrupt file starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let blocks = read_json(&path);
        let unresolved = read_json(&unresolved_path(&path));

        Ok(Self {
            path,
            blocks,
            unresolved,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current block for `chain`, persisting `default` the first time a chain
    /// is asked for.
    pub fn get(&mut self, chain: &str, default: u64) -> Result<u64> {
        if let Some(block) = self.blocks.get(chain) {
            return Ok(*block);
        }
        self.blocks.insert(chain.to_string(), default);
        self.save()?;
        Ok(default)
    }

    pub fn peek(&self, chain: &str) -> Option<u64> {
        self.blocks.get(chain).copied()
    }

    /// Advance the cursor. Moving backwards is ignored.
    pub fn set(&mut self, chain: &str, block: u64) -> Result<u64> {
        let current = self.blocks.get(chain).copied();
        if let Some(current) = current {
            if block <= current {
                return Ok(current);
            }
        }
        debug!("Cursor {} -> {}", chain, block);
        self.blocks.insert(chain.to_string(), block);
        self.save()?;
        Ok(block)
    }

    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.blocks
    }

    /// Transfers of `chain` that were handed out but not confirmed relayed.
    pub fn unresolved(&self, chain: &str) -> Vec<PendingTransfer> {
        self.unresolved.get(chain).cloned().unwrap_or_default()
    }

    /// Replace the unresolved set of `chain`.
    pub fn set_unresolved(&mut self, chain: &str, transfers: &[PendingTransfer]) -> Result<()> {
        let current = self.unresolved.get(chain).map(Vec::as_slice).unwrap_or_default();
        if current == transfers {
            return Ok(());
        }
        if transfers.is_empty() {
            self.unresolved.remove(chain);
        } else {
            self.unresolved.insert(chain.to_string(), transfers.to_vec());
        }
        write_atomic(&unresolved_path(&self.path), &self.unresolved)
    }

    fn save(&self) -> Result<()> {
        write_atomic(&self.path, &self.blocks)
    }
}

fn unresolved_path(path: &Path) -> PathBuf {
    path.with_extension("pending.json")
}

fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring corrupt cursor file {}: {}", path.display(), e);
            T::default()
        }),
        Err(_) => T::default(),
    }
}

fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
