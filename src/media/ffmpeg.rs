use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{list_numbered_files, AudioFormat, MediaTranscoder};
use crate::error::TranscodeError;
use crate::utils::format_file_size;

const TOOL: &str = "ffmpeg";

/// Audio container written by `extract_audio` and `segment_audio`
pub const AUDIO_FORMAT: AudioFormat = AudioFormat::M4a;

/// Media transcoder backed by the ffmpeg binary
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: TOOL.to_string(),
        }
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    /// Run ffmpeg to completion, mapping a non-zero exit to `ToolFailed`
    async fn run(&self, args: Vec<OsString>) -> Result<(), TranscodeError> {
        tracing::debug!(
            "Running ffmpeg command: {} {}",
            self.ffmpeg_path,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn { tool: TOOL, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::ToolFailed {
                tool: TOOL,
                status: output.status.code(),
                stderr: last_lines(&stderr, 20),
            });
        }

        Ok(())
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn extract_audio(&self, video: &Path, destination: &Path) -> Result<PathBuf, TranscodeError> {
        tokio::fs::create_dir_all(destination).await?;

        let stem = video
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| OsString::from("audio"));
        let mut file_name = stem;
        file_name.push(".");
        file_name.push(AUDIO_FORMAT.as_str());
        let out = destination.join(file_name);

        tracing::info!("Extracting audio from {} to {}", video.display(), out.display());

        self.run(vec![
            "-y".into(),
            "-i".into(),
            video.into(),
            "-vn".into(),
            "-acodec".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            out.clone().into(),
        ])
        .await?;

        match tokio::fs::metadata(&out).await {
            Ok(metadata) if metadata.len() > 0 => {
                tracing::info!("Audio file size: {}", format_file_size(metadata.len()));
                Ok(out)
            }
            _ => Err(TranscodeError::MissingOutput(out)),
        }
    }

    async fn sample_frames(
        &self,
        video: &Path,
        destination: &Path,
        interval_seconds: u32,
    ) -> Result<Vec<PathBuf>, TranscodeError> {
        tokio::fs::create_dir_all(destination).await?;
        tracing::info!("Sampling frames every {} seconds from {}", interval_seconds, video.display());

        // fps=1/<interval> emits one frame per interval, starting at 0s
        self.run(vec![
            "-y".into(),
            "-i".into(),
            video.into(),
            "-vf".into(),
            format!("fps=1/{}", interval_seconds).into(),
            "-q:v".into(),
            "2".into(),
            destination.join("frame_%06d.jpg").into(),
        ])
        .await?;

        let frames = list_numbered_files(destination, "frame_", "jpg").await?;
        tracing::info!("Extracted {} frames", frames.len());

        if frames.is_empty() {
            return Err(TranscodeError::NoFrames(destination.to_path_buf()));
        }

        Ok(frames)
    }

    async fn segment_audio(
        &self,
        audio: &Path,
        destination: &Path,
        chunk_seconds: u32,
    ) -> Result<Vec<PathBuf>, TranscodeError> {
        tokio::fs::create_dir_all(destination).await?;
        tracing::info!("Segmenting audio into {}-second chunks", chunk_seconds);

        let extension = AudioFormat::from_path(audio).unwrap_or(AUDIO_FORMAT);
        let pattern = destination.join(format!("part_%05d.{}", extension.as_str()));

        self.run(vec![
            "-y".into(),
            "-i".into(),
            audio.into(),
            "-f".into(),
            "segment".into(),
            "-segment_time".into(),
            chunk_seconds.to_string().into(),
            "-c".into(),
            "copy".into(),
            pattern.into(),
        ])
        .await?;

        let parts = list_numbered_files(destination, "part_", extension.as_str()).await?;
        tracing::info!("Created {} audio chunks", parts.len());
        Ok(parts)
    }
}

/// Keep the tail of noisy tool output, where ffmpeg puts the actual error
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_lines_keeps_tail() {
        let text = "a\nb\nc\nd\n";
        assert_eq!(last_lines(text, 2), "c\nd");
        assert_eq!(last_lines(text, 10), "a\nb\nc\nd");
        assert_eq!(last_lines("", 3), "");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::with_binary("ffmpeg-does-not-exist-here");

        let err = transcoder
            .extract_audio(&dir.path().join("in.mp4"), &dir.path().join("audio"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Spawn { tool: "ffmpeg", .. }));
    }

    /// A stand-in ffmpeg that records its arguments one per line and then
    /// runs `body` with `$last` (the output pattern) and `$out_dir` set
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> FfmpegTranscoder {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg.sh");
        let contents = format!(
            "#!/bin/sh\nfor last; do :; done\nout_dir=$(dirname \"$last\")\nprintf '%s\\n' \"$@\" > '{}'\n{}\n",
            dir.join("args.txt").display(),
            body
        );
        std::fs::write(&script, contents).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        FfmpegTranscoder::with_binary(script.to_string_lossy().into_owned())
    }

    #[cfg(unix)]
    fn recorded_args(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("args.txt"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_audio_args_and_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "echo data > \"$last\"");

        let audio = transcoder
            .extract_audio(&dir.path().join("talk.mp4"), &dir.path().join("audio"))
            .await
            .unwrap();
        assert_eq!(audio, dir.path().join("audio").join("talk.m4a"));

        let args = recorded_args(dir.path());
        assert_eq!(args[0], "-y");
        assert!(args.iter().any(|a| a == "-vn"));
        assert!(has_pair(&args, "-acodec", "aac"));
        assert!(has_pair(&args, "-b:a", "192k"));
        assert!(args.last().unwrap().ends_with("talk.m4a"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_audio_output_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), ": > \"$last\"");

        let err = transcoder
            .extract_audio(&dir.path().join("talk.mp4"), &dir.path().join("audio"))
            .await
            .unwrap_err();
        match err {
            TranscodeError::MissingOutput(path) => {
                assert_eq!(path, dir.path().join("audio").join("talk.m4a"))
            }
            other => panic!("expected MissingOutput, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_absent_audio_output_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "exit 0");

        let err = transcoder
            .extract_audio(&dir.path().join("talk.mp4"), &dir.path().join("audio"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::MissingOutput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_keeps_status_and_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(
            dir.path(),
            "echo 'ffmpeg version 6.1' >&2\necho 'Invalid data found when processing input' >&2\nexit 3",
        );

        let err = transcoder
            .sample_frames(&dir.path().join("talk.mp4"), &dir.path().join("frames"), 30)
            .await
            .unwrap_err();
        match err {
            TranscodeError::ToolFailed { tool, status, stderr } => {
                assert_eq!(tool, "ffmpeg");
                assert_eq!(status, Some(3));
                assert!(stderr.ends_with("Invalid data found when processing input"));
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sample_frames_args_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(
            dir.path(),
            "touch \"$out_dir/frame_000002.jpg\" \"$out_dir/frame_000001.jpg\" \"$out_dir/notes.txt\"",
        );
        let frames_dir = dir.path().join("frames");

        let frames = transcoder
            .sample_frames(&dir.path().join("talk.mp4"), &frames_dir, 30)
            .await
            .unwrap();
        assert_eq!(
            frames,
            vec![frames_dir.join("frame_000001.jpg"), frames_dir.join("frame_000002.jpg")]
        );

        let args = recorded_args(dir.path());
        assert!(has_pair(&args, "-vf", "fps=1/30"));
        assert!(has_pair(&args, "-q:v", "2"));
        assert!(args.last().unwrap().ends_with("frame_%06d.jpg"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_sampled_frames_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "exit 0");

        let err = transcoder
            .sample_frames(&dir.path().join("talk.mp4"), &dir.path().join("frames"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::NoFrames(path) if path == dir.path().join("frames")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_segment_audio_args_and_parts() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(
            dir.path(),
            "touch \"$out_dir/part_00001.m4a\" \"$out_dir/part_00000.m4a\"",
        );
        let split = dir.path().join("split");

        let parts = transcoder
            .segment_audio(&dir.path().join("talk.m4a"), &split, 300)
            .await
            .unwrap();
        assert_eq!(parts, vec![split.join("part_00000.m4a"), split.join("part_00001.m4a")]);

        let args = recorded_args(dir.path());
        assert!(has_pair(&args, "-f", "segment"));
        assert!(has_pair(&args, "-segment_time", "300"));
        assert!(has_pair(&args, "-c", "copy"));
        assert!(args.last().unwrap().ends_with("part_%05d.m4a"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_segment_audio_may_produce_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "exit 0");

        let parts = transcoder
            .segment_audio(&dir.path().join("talk.m4a"), &dir.path().join("split"), 60)
            .await
            .unwrap();
        assert!(parts.is_empty());
    }
}
