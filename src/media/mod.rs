use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod acquire;
pub mod ffmpeg;
pub mod reference;
pub mod ytdlp;

pub use acquire::acquire;
pub use ffmpeg::FfmpegTranscoder;
pub use reference::VideoReference;
pub use ytdlp::YtDlpFetcher;

use crate::error::{AcquisitionError, TranscodeError};

/// Container extensions searched after a download, in preference order
pub const FETCHED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];

/// Metadata recorded for the acquired video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// The reference string the run was started with
    pub source: String,

    /// File name of the video inside the run directory
    pub filename: String,
}

/// A video that is available locally for the rest of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredMedia {
    pub path: PathBuf,
    pub metadata: MediaMetadata,
}

/// Audio container produced by the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Downloads remote videos
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download `reference` into `destination`, selecting the best combined
    /// audio and video streams
    async fn fetch(&self, reference: &str, destination: &Path) -> Result<(), AcquisitionError>;
}

/// Demuxes and re-encodes local media
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Extract the audio track into `destination`, returning the audio path
    async fn extract_audio(&self, video: &Path, destination: &Path) -> Result<PathBuf, TranscodeError>;

    /// Sample one frame every `interval_seconds`; the returned list is ordered
    /// and never empty
    async fn sample_frames(
        &self,
        video: &Path,
        destination: &Path,
        interval_seconds: u32,
    ) -> Result<Vec<PathBuf>, TranscodeError>;

    /// Split audio into `chunk_seconds` segments; the returned list may be empty
    async fn segment_audio(
        &self,
        audio: &Path,
        destination: &Path,
        chunk_seconds: u32,
    ) -> Result<Vec<PathBuf>, TranscodeError>;
}

/// List files in `dir` named `<prefix>*.<extension>`, sorted by name
pub(crate) async fn list_numbered_files(
    dir: &Path,
    prefix: &str,
    extension: &str,
) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let name_matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        let ext_matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if name_matches && ext_matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("a/part_00001.m4a")), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_path(Path::new("talk.AAC")), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_path(Path::new("talk.mp4")), None);
        assert_eq!(AudioFormat::M4a.mime_type(), "audio/mp4");
    }

    #[tokio::test]
    async fn test_list_numbered_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_000002.jpg", "frame_000001.jpg", "other.jpg", "frame_000003.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = list_numbered_files(dir.path(), "frame_", "jpg").await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_000001.jpg", "frame_000002.jpg"]);
    }
}
