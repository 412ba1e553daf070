use std::path::Path;

use async_trait::async_trait;

/// Copies a file from a remote host to the local filesystem.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn fetch(&self, remote: &str, local: &Path) -> anyhow::Result<()>;
}
