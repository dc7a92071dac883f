//! HTTP fetch of grant archives into the staging area.
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use grantdb_core::config::DownloadSettings;

use crate::error::IngestError;
use crate::link_guard::link_hash;

pub struct Downloader {
    client: Client,
    staging_dir: PathBuf,
}

impl Downloader {
    pub fn new(settings: &DownloadSettings, staging_dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client, staging_dir: staging_dir.into() })
    }

    /// `<staging>/downloads/<link hash>/<last path segment>`.
    pub fn target_path(&self, url: &str) -> Result<PathBuf, IngestError> {
        let parsed = Url::parse(url).map_err(|_| IngestError::InvalidUrl(url.to_string()))?;
        let name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .unwrap_or("download");
        Ok(self.staging_dir.join("downloads").join(link_hash(url)).join(name))
    }

    /// Cheap reachability check; any non-2xx answer counts as unreachable.
    pub async fn probe(&self, url: &str) -> Result<(), IngestError> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status { url: url.to_string(), status: status.as_u16() });
        }
        Ok(())
    }

    /// Stream `url` to disk and return the local path.
    ///
    /// The body lands in a `.part` file that is renamed once complete, so a
    /// cancelled or failed transfer never leaves a file at the final path.
    /// The `.part` file is also removed if the returned future is dropped.
    pub async fn fetch(&self, cancel: &CancellationToken, url: &str) -> Result<PathBuf, IngestError> {
        let dest = self.target_path(url)?;
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(IngestError::io(dir))?;
        }
        let partial = PartialFile::new(dest.with_extension(part_extension(&dest)));

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(IngestError::Cancelled),
            sent = self.client.get(url).send() => sent?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status { url: url.to_string(), status: status.as_u16() });
        }
        debug!(url, content_length = ?response.content_length(), "download started");

        let written = stream_body(cancel, response, partial.path()).await?;
        tokio::fs::rename(partial.path(), &dest).await.map_err(IngestError::io(&dest))?;
        partial.keep();
        info!(url, path = %dest.display(), bytes = written, "download finished");
        Ok(dest)
    }
}

/// Deletes the in-progress download on drop unless `keep` was called.
struct PartialFile {
    path: PathBuf,
    kept: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, kept: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "partial download removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "could not remove partial download"),
        }
    }
}

fn part_extension(dest: &Path) -> String {
    match dest.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    }
}

async fn stream_body(cancel: &CancellationToken, response: reqwest::Response, partial: &Path) -> Result<u64, IngestError> {
    let mut file = tokio::fs::File::create(partial).await.map_err(IngestError::io(partial))?;
    let mut body = response.bytes_stream();
    let mut written = 0u64;
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return Err(IngestError::Cancelled),
            next = body.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(IngestError::io(partial))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(IngestError::io(partial))?;
    Ok(written)
}
