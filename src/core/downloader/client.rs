use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

/// A single file to download with optional SHA-1 for validation.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

/// Callback invoked after each finished file: (done, total).
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Concurrent, SHA-1 validated downloader.
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, optionally validating SHA-1.
    ///
    /// Creates parent directories as needed. Drops the file handle
    /// immediately after writing to avoid Windows OS Error 5.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        // Validate SHA-1 before writing (compute on the in-memory buffer)
        if let Some(expected) = sha1_expected {
            let mut hasher = Sha1::new();
            hasher.update(&bytes);
            let actual = hex::encode(hasher.finalize());
            if actual != expected {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        // Write to file inside a block to ensure the handle is dropped immediately
        {
            let mut file =
                tokio::fs::File::create(dest)
                    .await
                    .map_err(|e| LauncherError::Io {
                        path: dest.to_path_buf(),
                        source: e,
                    })?;
            file.write_all(&bytes)
                .await
                .map_err(|e| LauncherError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            file.flush().await.map_err(|e| LauncherError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            // file is dropped here — critical on Windows
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// The cancel flag is a cooperative checkpoint: files already in flight
    /// finish, files not yet started are skipped. Returns the first error
    /// (`Cancelled` wins over per-file failures so a user stop does not read
    /// as a download fault).
    pub async fn download_batch(
        &self,
        entries: Vec<DownloadEntry>,
        cancel: Option<&AtomicBool>,
        on_progress: Option<ProgressFn<'_>>,
    ) -> LauncherResult<()> {
        let total = entries.len();
        if total == 0 {
            return Ok(());
        }

        info!(
            "Starting batch download: {} files, concurrency={}",
            total, self.concurrency
        );

        let done = AtomicUsize::new(0);
        let results: Vec<LauncherResult<()>> = stream::iter(entries)
            .map(|entry| {
                let done = &done;
                async move {
                    if let Some(flag) = cancel {
                        if flag.load(Ordering::Relaxed) {
                            return Err(LauncherError::Cancelled);
                        }
                    }
                    self.download_file(&entry.url, &entry.dest, entry.sha1.as_deref())
                        .await?;
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(report) = on_progress {
                        report(finished, total);
                    }
                    Ok(())
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut first_failure = None;
        for result in results {
            match result {
                Ok(()) => {}
                Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Validate an existing file's SHA-1.
    pub async fn validate_sha1(path: &Path, expected: &str) -> LauncherResult<bool> {
        let bytes = tokio::fs::read(path).await.map_err(|e| LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        Ok(actual == expected)
    }

    /// Validate an existing file's SHA-512 (platform resources publish
    /// sha512 alongside sha1).
    pub async fn validate_sha512(path: &Path, expected: &str) -> LauncherResult<bool> {
        use sha2::Sha512;
        let bytes = tokio::fs::read(path).await.map_err(|e| LauncherError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut hasher = Sha512::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        Ok(actual == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_batch_skips_pending_files() {
        let client = reqwest::Client::new();
        let downloader = Downloader::new(client);
        let flag = AtomicBool::new(true);

        let entries = vec![DownloadEntry {
            url: "http://127.0.0.1:9/unreachable".into(),
            dest: std::env::temp_dir().join("vesta-test-never-written"),
            sha1: None,
            size: None,
        }];

        let result = downloader
            .download_batch(entries, Some(&flag), None)
            .await;
        assert!(matches!(result, Err(LauncherError::Cancelled)));
    }

    #[tokio::test]
    async fn validate_sha1_detects_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        tokio::fs::write(&path, b"hello").await.unwrap();
        // sha1("hello")
        let ok = Downloader::validate_sha1(&path, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
            .await
            .unwrap();
        assert!(ok);
        let bad = Downloader::validate_sha1(&path, "0000000000000000000000000000000000000000")
            .await
            .unwrap();
        assert!(!bad);
    }
}
