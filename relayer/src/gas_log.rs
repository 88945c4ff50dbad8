use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only CSV of `(source tx, destination tx)` for completed relays.
#[derive(Debug, Clone)]
pub struct GasLog {
    path: PathBuf,
}

impl GasLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, src_tx: &str, dst_tx: &str) -> Result<()> {
        let exists = self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut buf = String::new();
        if !exists {
            buf.push_str(&row(&["srcTx", "dstTx"]));
        }
        buf.push_str(&row(&[src_tx, dst_tx]));
        file.write_all(buf.as_bytes())?;
        Ok(())
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn row(fields: &[&str]) -> String {
    let mut line = fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}
