//! Retrieval of raw captures from the AP.
//!
//! `loopback_test` leaves its capture in the home directory of the login
//! user on the AP. [`fetch_capture`] copies it next to the host's other
//! results and prefixes it with the capture date so earlier runs are kept.

mod client;
mod scp;

pub use client::FileTransfer;
pub use scp::ScpTransfer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::capture::{CaptureName, capture_date};
use crate::command::TestType;
use crate::parser::read_table;

/// Where a campaign's capture lives on the AP.
#[derive(Debug, Clone)]
pub struct RemoteCapture {
    pub host: String,
    pub user: String,
    pub test: TestType,
    pub size: u32,
    pub iterations: u32,
}

impl RemoteCapture {
    pub fn file_name(&self) -> String {
        CaptureName::undated_file(self.test.as_str(), self.size, self.iterations)
    }

    /// `user@host:~user/test_size_iterations.csv`
    pub fn url(&self) -> String {
        format!("{}@{}:~{}/{}", self.user, self.host, self.user, self.file_name())
    }
}

/// Copies the capture into `dest_dir` and renames it `{date}_{test}_{size}_{iterations}.csv`.
#[tracing::instrument(skip(transfer), fields(url = %remote.url()))]
pub async fn fetch_capture<T: FileTransfer + ?Sized>(
    transfer: &T,
    remote: &RemoteCapture,
    dest_dir: &Path,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    let undated = dest_dir.join(remote.file_name());
    transfer
        .fetch(&remote.url(), &undated)
        .await
        .with_context(|| format!("copying {}", remote.url()))?;

    let table = read_table(&undated)?;
    let first_date = table.get(1).and_then(|row| row.first()).map(String::as_str);

    let name = CaptureName {
        date: capture_date(first_date),
        test: remote.test.to_string(),
        size: remote.size,
        iterations: remote.iterations,
    };
    let dated = name.raw_file(dest_dir);
    tokio::fs::rename(&undated, &dated)
        .await
        .with_context(|| format!("renaming {} to {}", undated.display(), dated.display()))?;

    info!(path = %dated.display(), "Measurement data retrieved");
    Ok(dated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes fixed content instead of copying anything.
    struct FakeTransfer {
        content: String,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FileTransfer for FakeTransfer {
        async fn fetch(&self, remote: &str, local: &Path) -> anyhow::Result<()> {
            self.requested.lock().unwrap().push(remote.to_string());
            tokio::fs::write(local, &self.content).await?;
            Ok(())
        }
    }

    fn remote() -> RemoteCapture {
        RemoteCapture {
            host: "192.168.3.2".to_string(),
            user: "root".to_string(),
            test: TestType::Sink,
            size: 512,
            iterations: 100,
        }
    }

    #[test]
    fn test_url() {
        assert_eq!(remote().url(), "root@192.168.3.2:~root/sink_512_100.csv");
    }

    #[tokio::test]
    async fn test_fetch_capture_renames_with_date() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer {
            content: "date,description\n2016-01-20 10:11:12,PWM-G1 - 1 lane\n".to_string(),
            requested: Mutex::new(Vec::new()),
        };

        let path = fetch_capture(&transfer, &remote(), dir.path()).await.unwrap();

        assert_eq!(path, dir.path().join("20160120-101112_sink_512_100.csv"));
        assert!(path.exists());
        assert!(!dir.path().join("sink_512_100.csv").exists());
        assert_eq!(
            transfer.requested.lock().unwrap().as_slice(),
            ["root@192.168.3.2:~root/sink_512_100.csv".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_capture_without_rows_uses_default_date() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer {
            content: "date,description\n".to_string(),
            requested: Mutex::new(Vec::new()),
        };

        let path = fetch_capture(&transfer, &remote(), dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("19700101-000000_sink_512_100.csv"));
    }

    #[tokio::test]
    async fn test_scp_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = ScpTransfer::with_program("false");
        let err = fetch_capture(&transfer, &remote(), dir.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("copying"));
    }
}
