use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::MediaFetcher;
use crate::error::AcquisitionError;
use crate::utils::ExternalTool;

/// Remote video fetcher using yt-dlp
pub struct YtDlpFetcher {
    yt_dlp_path: String,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: path.into(),
        }
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, reference: &str, destination: &Path) -> Result<(), AcquisitionError> {
        let template = destination
            .join("%(id)s_%(title).200B.%(ext)s")
            .to_string_lossy()
            .into_owned();
        tracing::debug!("Downloading {} into {}", reference, destination.display());

        let output = Command::new(&self.yt_dlp_path)
            .args([
                // Prefer resolution, then mp4/m4a containers
                "-S",
                "res,ext:mp4:m4a",
                // Best video + best audio, or the best combined stream
                "-f",
                "bv*+ba/b",
                "--no-playlist",
                "-o",
                template.as_str(),
                reference,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AcquisitionError::ToolUnavailable {
                        tool: ExternalTool::YtDlp.command(),
                        hint: ExternalTool::YtDlp.install_hint(),
                    }
                } else {
                    AcquisitionError::Io(e)
                }
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::FetchFailed {
                reference: reference.to_string(),
                status: output.status.code(),
                stderr: error.trim().to_string(),
            });
        }

        tracing::info!("Download completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = YtDlpFetcher::with_binary("yt-dlp-does-not-exist-here");

        let err = fetcher
            .fetch("https://example.com/watch?v=1", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::ToolUnavailable { tool: "yt-dlp", .. }));
    }
}
