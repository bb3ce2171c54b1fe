use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::events::Stage;

/// Failures while getting the source video into the run directory
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Download failed for {reference} ({}): {stderr}", describe_exit(.status))]
    FetchFailed {
        reference: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Download succeeded but no media file found in {dir}")]
    NoMediaFound { dir: PathBuf },

    #[error("Local file not found: {0}")]
    NotFound(PathBuf),

    #[error("Path is not a file: {0}")]
    NotAFile(PathBuf),

    #[error("{tool} is not available: {hint}")]
    ToolUnavailable { tool: &'static str, hint: &'static str },

    #[error("Failed to copy {from} to {to}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the media transcoder
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("{tool} failed ({}): {stderr}", describe_exit(.status))]
    ToolFailed {
        tool: &'static str,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Output file is missing or empty: {0}")]
    MissingOutput(PathBuf),

    #[error("No frames were extracted into {0}")]
    NoFrames(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single remote inference call failed
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while persisting or loading report renderings
#[derive(Error, Debug)]
pub enum ReportWriteError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run-level error returned by the analysis pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Acquisition stage failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("{stage} stage failed: {source}")]
    Transcode {
        stage: Stage,
        #[source]
        source: TranscodeError,
    },

    #[error("Report stage failed: {0}")]
    ReportWrite(#[from] ReportWriteError),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingCredential { env_var: String },

    #[error("Capability unavailable: {capability} ({hint})")]
    CapabilityUnavailable {
        capability: &'static str,
        hint: &'static str,
    },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Failed to prepare run directory {path}: {source}")]
    RunDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `exit status N`, or the signal case where the process has no code
fn describe_exit(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl PipelineError {
    pub(crate) fn transcode(stage: Stage, source: TranscodeError) -> Self {
        Self::Transcode { stage, source }
    }

    /// The stage the error originated from, when it belongs to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Acquisition(_) => Some(Stage::Acquire),
            Self::Transcode { stage, .. } => Some(*stage),
            Self::ReportWrite(_) => Some(Stage::Report),
            _ => None,
        }
    }
}
