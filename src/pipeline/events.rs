//! Structured pipeline events and the sinks that consume them
//!
//! The pipeline never logs through global state directly: it reports what it
//! is doing to the `EventSink` it was constructed with. `TracingSink` is the
//! default and forwards everything to `tracing`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

/// Sequential phases of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Acquire,
    ExtractAudio,
    SampleFrames,
    AnalyzeFrames,
    SegmentAudio,
    Transcribe,
    Report,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquire => "Acquisition",
            Stage::ExtractAudio => "Audio extraction",
            Stage::SampleFrames => "Frame sampling",
            Stage::AnalyzeFrames => "Frame analysis",
            Stage::SegmentAudio => "Audio segmentation",
            Stage::Transcribe => "Transcription",
            Stage::Report => "Report",
            Stage::Cleanup => "Cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the pipeline reports while it runs
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        reference: String,
        run_dir: PathBuf,
    },
    StageStarted {
        stage: Stage,
        /// Number of independent items, for stages that have them
        items: Option<usize>,
    },
    StageCompleted {
        stage: Stage,
        elapsed: Duration,
    },
    ItemFinished {
        stage: Stage,
        index: usize,
        elapsed: Duration,
    },
    ItemFailed {
        stage: Stage,
        index: usize,
        error: String,
    },
    FramesCapped {
        sampled: usize,
        kept: usize,
    },
    SegmentationFallback {
        reason: String,
    },
    CleanupFailed {
        path: PathBuf,
        error: String,
    },
    RunCompleted {
        run_id: Uuid,
        json_path: PathBuf,
        markdown_path: PathBuf,
    },
}

/// Receives pipeline events; implementations must tolerate concurrent emits
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to `tracing` with structured fields
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                run_id,
                reference,
                run_dir,
            } => {
                tracing::info!(%run_id, %reference, run_dir = %run_dir.display(), "Starting video analysis");
            }
            PipelineEvent::StageStarted { stage, items } => match items {
                Some(items) => tracing::info!(%stage, items, "Stage started"),
                None => tracing::info!(%stage, "Stage started"),
            },
            PipelineEvent::StageCompleted { stage, elapsed } => {
                tracing::info!(%stage, elapsed_secs = elapsed.as_secs_f64(), "Stage completed");
            }
            PipelineEvent::ItemFinished {
                stage,
                index,
                elapsed,
            } => {
                tracing::debug!(%stage, index, elapsed_secs = elapsed.as_secs_f64(), "Item finished");
            }
            PipelineEvent::ItemFailed {
                stage,
                index,
                error,
            } => {
                tracing::error!(%stage, index, %error, "Item failed, recorded placeholder");
            }
            PipelineEvent::FramesCapped { sampled, kept } => {
                tracing::info!(sampled, kept, "Capped frames");
            }
            PipelineEvent::SegmentationFallback { reason } => {
                tracing::warn!(%reason, "Using the original audio file as a single chunk");
            }
            PipelineEvent::CleanupFailed { path, error } => {
                tracing::warn!(path = %path.display(), %error, "Cleanup failed");
            }
            PipelineEvent::RunCompleted {
                run_id,
                json_path,
                markdown_path,
            } => {
                tracing::info!(
                    %run_id,
                    json = %json_path.display(),
                    markdown = %markdown_path.display(),
                    "Analysis complete"
                );
            }
        }
    }
}

/// Keeps every event in memory, in emit order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(PipelineEvent::StageStarted {
            stage: Stage::Acquire,
            items: None,
        });
        sink.emit(PipelineEvent::FramesCapped { sampled: 5, kept: 2 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            PipelineEvent::StageStarted {
                stage: Stage::Acquire,
                ..
            }
        ));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::SampleFrames.to_string(), "Frame sampling");
        assert_eq!(Stage::Transcribe.to_string(), "Transcription");
    }
}
