use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::error::{ResolveError, Result};

/// The subset of yt-dlp's `--dump-json` output the resolver uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    /// Direct URL of the selected audio format.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Length in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Turns a URL or a search term into media metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Metadata of the media behind `url`.
    async fn extract(&self, url: &str) -> Result<MediaInfo>;

    /// Metadata of the first search hit for `query`.
    async fn search_first(&self, query: &str) -> Result<MediaInfo>;
}

/// [`MediaExtractor`] running the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: String,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Checks that the binary runs and logs its version.
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| ResolveError::Extraction(format!("{} is not available: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ResolveError::Extraction(format!(
                "{} --version exited with {}",
                self.program, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("✅ yt-dlp version: {}", version);
        Ok(version)
    }

    async fn dump_json(&self, target: &str) -> Result<Option<MediaInfo>> {
        debug!("📊 yt-dlp lookup: {}", target);

        let mut command = Command::new(&self.program);
        command
            .args([
                "--dump-json",
                "--no-playlist",
                "--no-warnings",
                "--format",
                "bestaudio/best",
                target,
            ])
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout))?
            .map_err(|e| ResolveError::Extraction(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extraction(stderr.trim().to_string()));
        }

        parse_first_entry(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses the first JSON line yt-dlp printed, `None` when it printed nothing.
pub fn parse_first_entry(stdout: &str) -> Result<Option<MediaInfo>> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(ResolveError::from))
        .transpose()
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(&self, url: &str) -> Result<MediaInfo> {
        self.dump_json(url)
            .await?
            .ok_or(ResolveError::NoAudioUrl)
    }

    async fn search_first(&self, query: &str) -> Result<MediaInfo> {
        self.dump_json(&format!("ytsearch1:{}", query))
            .await?
            .ok_or_else(|| ResolveError::NoResults(query.to_string()))
    }
}
