//! Video Insight - analyze videos with vision and speech-to-text models
//!
//! This library downloads or copies a video, samples frames and describes them
//! with a vision model, transcribes the audio track in chunks, and writes a
//! JSON and Markdown report. Reports can be turned into blog posts.

pub mod blog;
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use blog::{BlogGenerator, BlogOutputs, BlogRequest};
pub use cli::{BlogStyle, Cli, Commands};
pub use config::Config;
pub use error::{AcquisitionError, InferenceError, PipelineError, ReportWriteError, TranscodeError};
pub use inference::{InferenceClient, OpenAiClient};
pub use media::{FfmpegTranscoder, MediaFetcher, MediaTranscoder, YtDlpFetcher};
pub use pipeline::{AnalysisOptions, AnalysisOutcome, AnalysisPipeline};
pub use report::AnalysisReport;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
