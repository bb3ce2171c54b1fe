//! The analysis pipeline: acquire, extract, sample, describe, transcribe,
//! report, clean up

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

pub mod events;
pub mod frames;
pub mod parallel;
pub mod transcription;

use crate::error::{InferenceError, PipelineError};
use crate::inference::InferenceClient;
use crate::media::{acquire, MediaFetcher, MediaTranscoder, VideoReference};
use crate::report::{self, AnalysisReport, ReportPaths};
use events::{EventSink, PipelineEvent, Stage};
use frames::{samples_from_files, FrameAnalysisStage};
use transcription::{TranscriptionStage, SPLIT_DIR_NAME};

pub const DEFAULT_FRAME_PROMPT: &str = "You are analyzing a single still frame from a video.
Return 3 concise bullets:
- What's happening (speaker/scene/action)?
- Any on-screen text, charts, or key visual cues?
- The likely \"topic or claim\" being made at this moment.

Avoid speculation beyond the image. Keep each bullet to ~20 words.";

pub const DEFAULT_AUDIO_PROMPT: &str = "Use these hints to bias names/terms that may appear: YouTube, creator, product names, tech jargon.
Prefer correct casing. If audio is unclear, mark [inaudible].";

pub const DEFAULT_FRAME_INTERVAL: u32 = 30;
pub const DEFAULT_MAX_FRAMES: usize = 120;
pub const DEFAULT_AUDIO_CHUNK_SECONDS: u32 = 300;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one per-item inference call as stored in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Text(String),
    Error(String),
}

impl ItemOutcome {
    /// Keeps successful text verbatim; callers decide whether to trim
    pub fn from_result(result: Result<String, InferenceError>) -> Self {
        match result {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Error(e.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Error(_) => None,
        }
    }
}

/// Bound a single capability call
pub(crate) async fn call_with_timeout<F>(limit: Duration, call: F) -> Result<String, InferenceError>
where
    F: Future<Output = Result<String, InferenceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(InferenceError::Timeout(limit)),
    }
}

/// Per-run settings
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Run directory; intermediates and reports live under it
    pub output_dir: PathBuf,
    pub frame_interval: u32,
    /// `0` disables the cap
    pub max_frames: usize,
    pub audio_chunk_seconds: u32,
    pub vision_model: String,
    pub transcribe_model: String,
    /// Treat the input as a local path even when it looks like a URL
    pub skip_download: bool,
    pub keep_media: bool,
    pub frame_prompt: String,
    pub audio_prompt: Option<String>,
    pub concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            output_dir: timestamped_run_dir(Path::new("runs")),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            max_frames: DEFAULT_MAX_FRAMES,
            audio_chunk_seconds: DEFAULT_AUDIO_CHUNK_SECONDS,
            vision_model: "gpt-4o".to_string(),
            transcribe_model: "gpt-4o-mini-transcribe".to_string(),
            skip_download: false,
            keep_media: false,
            frame_prompt: DEFAULT_FRAME_PROMPT.to_string(),
            audio_prompt: Some(DEFAULT_AUDIO_PROMPT.to_string()),
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl AnalysisOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidOptions(msg.to_string()));

        if self.frame_interval == 0 {
            return invalid("frame interval must be at least 1 second");
        }
        if self.audio_chunk_seconds == 0 {
            return invalid("audio chunk duration must be at least 1 second");
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1");
        }
        if self.call_timeout.is_zero() {
            return invalid("call timeout must be greater than zero");
        }
        Ok(())
    }
}

/// `<runs_dir>/<YYYYmmdd-HHMMSS>`
pub fn timestamped_run_dir(runs_dir: &Path) -> PathBuf {
    runs_dir.join(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string())
}

/// Directory layout of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub root: PathBuf,
    pub video: PathBuf,
    pub audio: PathBuf,
    pub split: PathBuf,
    pub frames: PathBuf,
}

impl RunLayout {
    pub fn new(root: &Path) -> Self {
        let audio = root.join("audio");
        Self {
            root: root.to_path_buf(),
            video: root.join("video"),
            split: audio.join(SPLIT_DIR_NAME),
            audio,
            frames: root.join("frames"),
        }
    }

    async fn create(&self) -> Result<(), PipelineError> {
        for dir in [&self.video, &self.audio, &self.split, &self.frames] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| PipelineError::RunDirectory {
                    path: dir.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub run_id: Uuid,
    pub run_dir: PathBuf,
    pub report: AnalysisReport,
    pub paths: ReportPaths,
}

pub struct AnalysisPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    transcoder: Arc<dyn MediaTranscoder>,
    inference: Arc<dyn InferenceClient>,
    events: Arc<dyn EventSink>,
}

impl AnalysisPipeline {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn MediaTranscoder>,
        inference: Arc<dyn InferenceClient>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            inference,
            events,
        }
    }

    /// Analyze the video named by `input`
    pub async fn run(&self, input: &str, options: &AnalysisOptions) -> Result<AnalysisOutcome, PipelineError> {
        options.validate()?;

        let run_id = Uuid::new_v4();
        let layout = RunLayout::new(&options.output_dir);
        layout.create().await?;

        let reference = VideoReference::classify(input, options.skip_download);
        self.events.emit(PipelineEvent::RunStarted {
            run_id,
            reference: reference.raw().to_string(),
            run_dir: layout.root.clone(),
        });

        let media = self
            .sequential(Stage::Acquire, async {
                acquire(&reference, &layout.video, self.fetcher.as_ref())
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

        let audio = self
            .sequential(Stage::ExtractAudio, async {
                self.transcoder
                    .extract_audio(&media.path, &layout.audio)
                    .await
                    .map_err(|e| PipelineError::transcode(Stage::ExtractAudio, e))
            })
            .await?;

        let frame_files = self
            .sequential(Stage::SampleFrames, async {
                self.transcoder
                    .sample_frames(&media.path, &layout.frames, options.frame_interval)
                    .await
                    .map_err(|e| PipelineError::transcode(Stage::SampleFrames, e))
            })
            .await?;

        let sampled = frame_files.len();
        let samples = samples_from_files(frame_files, options.frame_interval, options.max_frames);
        if samples.len() < sampled {
            self.events.emit(PipelineEvent::FramesCapped {
                sampled,
                kept: samples.len(),
            });
        }

        let frames = FrameAnalysisStage::new(self.inference.clone(), self.events.clone(), options)
            .analyze(samples)
            .await;

        let transcript =
            TranscriptionStage::new(self.transcoder.clone(), self.inference.clone(), self.events.clone(), options)
                .transcribe(&audio)
                .await;

        let report = AnalysisReport::assemble(&media.metadata, options.frame_interval, frames, &transcript);
        let paths = self
            .sequential(Stage::Report, async {
                report::persist(&report, &layout.root).map_err(PipelineError::from)
            })
            .await?;

        if !options.keep_media {
            let started = Instant::now();
            self.events.emit(PipelineEvent::StageStarted {
                stage: Stage::Cleanup,
                items: None,
            });
            cleanup_intermediates(&layout, &audio, self.events.as_ref()).await;
            self.events.emit(PipelineEvent::StageCompleted {
                stage: Stage::Cleanup,
                elapsed: started.elapsed(),
            });
        }

        self.events.emit(PipelineEvent::RunCompleted {
            run_id,
            json_path: paths.json.clone(),
            markdown_path: paths.markdown.clone(),
        });

        Ok(AnalysisOutcome {
            run_id,
            run_dir: layout.root,
            report,
            paths,
        })
    }

    async fn sequential<T, F>(&self, stage: Stage, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let started = Instant::now();
        self.events.emit(PipelineEvent::StageStarted { stage, items: None });

        let value = work.await?;

        self.events.emit(PipelineEvent::StageCompleted {
            stage,
            elapsed: started.elapsed(),
        });
        Ok(value)
    }
}

/// Remove sampled frames, audio chunks and the extracted audio
///
/// Missing paths are not failures, so calling this twice is harmless. Other
/// errors go to the sink and are otherwise ignored.
pub async fn cleanup_intermediates(layout: &RunLayout, audio: &Path, events: &dyn EventSink) {
    let targets = [
        (layout.frames.as_path(), true),
        (layout.split.as_path(), true),
        (audio, false),
    ];

    for (path, is_dir) in targets {
        let result = if is_dir {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };

        match result {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => events.emit(PipelineEvent::CleanupFailed {
                path: path.to_path_buf(),
                error: e.to_string(),
            }),
        }
    }
}
