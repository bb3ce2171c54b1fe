use std::path::{Path, PathBuf};
use url::Url;

/// Video container extensions accepted without a warning
pub const KNOWN_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "wmv", "flv", "m4v"];

/// Check if a string is a URL, i.e. it has both a scheme and a host
pub fn is_url(input: &str) -> bool {
    Url::parse(input)
        .map(|url| !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Check if a path carries one of the known video extensions
pub fn has_known_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            KNOWN_VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(input: &str) -> PathBuf {
    if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Format a second offset as `MM:SS` (minutes are not wrapped into hours)
pub fn format_timestamp(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// External tools the CLI shells out to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalTool {
    Ffmpeg,
    YtDlp,
}

impl ExternalTool {
    pub fn command(&self) -> &'static str {
        match self {
            ExternalTool::Ffmpeg => "ffmpeg",
            ExternalTool::YtDlp => "yt-dlp",
        }
    }

    fn version_flag(&self) -> &'static str {
        match self {
            ExternalTool::Ffmpeg => "-version",
            ExternalTool::YtDlp => "--version",
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            ExternalTool::Ffmpeg => "install ffmpeg and make sure it is on PATH",
            ExternalTool::YtDlp => "install yt-dlp: https://github.com/yt-dlp/yt-dlp",
        }
    }
}

/// Check which of the required tools are missing from the environment
pub async fn check_dependencies(tools: &[ExternalTool]) -> Vec<ExternalTool> {
    let mut missing = Vec::new();

    for tool in tools {
        if !check_command_available(*tool).await {
            missing.push(*tool);
        }
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(tool: ExternalTool) -> bool {
    use tokio::process::Command;

    Command::new(tool.command())
        .arg(tool.version_flag())
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00");
        assert_eq!(format_timestamp(90), "01:30");
        assert_eq!(format_timestamp(6000), "100:00");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://www.youtube.com/watch?v=123"));
        assert!(is_url("http://example.com/video.mp4"));
        assert!(!is_url("video.mp4"));
        assert!(!is_url("/home/user/video.mp4"));
        assert!(!is_url("C:\\videos\\talk.mp4"));
        assert!(!is_url("file:///tmp/video.mp4"));
    }

    #[test]
    fn test_known_video_extension() {
        assert!(has_known_video_extension(Path::new("talk.MP4")));
        assert!(has_known_video_extension(Path::new("clip.webm")));
        assert!(!has_known_video_extension(Path::new("notes.txt")));
        assert!(!has_known_video_extension(Path::new("noext")));
    }

    #[test]
    fn test_expand_tilde_keeps_plain_paths() {
        assert_eq!(expand_tilde("videos/a.mp4"), PathBuf::from("videos/a.mp4"));
        assert_eq!(expand_tilde("/abs/a.mp4"), PathBuf::from("/abs/a.mp4"));
    }
}
