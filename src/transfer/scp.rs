use std::path::Path;

use anyhow::bail;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::client::FileTransfer;

/// [`FileTransfer`] backed by the system `scp` binary.
pub struct ScpTransfer {
    program: String,
}

impl ScpTransfer {
    pub fn new() -> Self {
        Self {
            program: "scp".to_string(),
        }
    }

    /// Uses another scp-compatible binary (`program REMOTE LOCAL`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ScpTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileTransfer for ScpTransfer {
    async fn fetch(&self, remote: &str, local: &Path) -> anyhow::Result<()> {
        debug!(program = %self.program, remote, local = %local.display(), "Starting copy");
        let status = Command::new(&self.program)
            .arg(remote)
            .arg(local)
            .status()
            .await?;

        if !status.success() {
            bail!("{} {} exited with {}", self.program, remote, status);
        }
        Ok(())
    }
}
