use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::events::{EventSink, PipelineEvent, Stage};
use super::parallel::map_indexed;
use super::{call_with_timeout, AnalysisOptions, ItemOutcome};
use crate::error::InferenceError;
use crate::inference::{ImageRequest, InferenceClient};

pub const FRAME_SYSTEM_PROMPT: &str =
    "You are a precise video scene analyst. Be specific, concise, and avoid hallucinations.";

pub const FRAME_TEMPERATURE: f32 = 0.2;

/// One sampled still frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSample {
    pub index: usize,
    pub timestamp_seconds: u64,
    pub file_path: PathBuf,
}

/// Turn the ordered sampler output into frame samples, keeping at most
/// `max_frames` of the earliest ones (`0` keeps all)
pub fn samples_from_files(files: Vec<PathBuf>, interval_seconds: u32, max_frames: usize) -> Vec<FrameSample> {
    let keep = if max_frames == 0 { files.len() } else { max_frames };

    files
        .into_iter()
        .take(keep)
        .enumerate()
        .map(|(index, file_path)| FrameSample {
            index,
            timestamp_seconds: index as u64 * u64::from(interval_seconds),
            file_path,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAnalysisResult {
    pub index: usize,
    pub timestamp_s: u64,
    pub frame_path: PathBuf,
    pub analysis: ItemOutcome,
}

impl FrameAnalysisResult {
    /// Text shown in the timeline for this frame
    pub fn display_text(&self) -> String {
        match &self.analysis {
            ItemOutcome::Text(text) => text.clone(),
            ItemOutcome::Error(message) => format!("ERROR: {}", message),
        }
    }
}

/// Describes every sampled frame with the vision model
pub struct FrameAnalysisStage {
    inference: Arc<dyn InferenceClient>,
    events: Arc<dyn EventSink>,
    model: String,
    prompt: String,
    concurrency: usize,
    call_timeout: Duration,
}

impl FrameAnalysisStage {
    pub fn new(inference: Arc<dyn InferenceClient>, events: Arc<dyn EventSink>, options: &AnalysisOptions) -> Self {
        Self {
            inference,
            events,
            model: options.vision_model.clone(),
            prompt: options.frame_prompt.clone(),
            concurrency: options.concurrency,
            call_timeout: options.call_timeout,
        }
    }

    /// One result per frame, in frame order, whatever failed
    pub async fn analyze(&self, frames: Vec<FrameSample>) -> Vec<FrameAnalysisResult> {
        let started = Instant::now();
        self.events.emit(PipelineEvent::StageStarted {
            stage: Stage::AnalyzeFrames,
            items: Some(frames.len()),
        });

        let results = map_indexed(frames, self.concurrency, |_, frame| self.analyze_one(frame)).await;

        self.events.emit(PipelineEvent::StageCompleted {
            stage: Stage::AnalyzeFrames,
            elapsed: started.elapsed(),
        });
        results
    }

    async fn analyze_one(&self, frame: FrameSample) -> FrameAnalysisResult {
        let started = Instant::now();
        let result = self.describe(&frame).await;

        match &result {
            Ok(_) => self.events.emit(PipelineEvent::ItemFinished {
                stage: Stage::AnalyzeFrames,
                index: frame.index,
                elapsed: started.elapsed(),
            }),
            Err(e) => self.events.emit(PipelineEvent::ItemFailed {
                stage: Stage::AnalyzeFrames,
                index: frame.index,
                error: e.to_string(),
            }),
        }

        FrameAnalysisResult {
            index: frame.index,
            timestamp_s: frame.timestamp_seconds,
            frame_path: frame.file_path,
            analysis: ItemOutcome::from_result(result.map(|text| text.trim().to_string())),
        }
    }

    async fn describe(&self, frame: &FrameSample) -> Result<String, InferenceError> {
        let image = tokio::fs::read(&frame.file_path)
            .await
            .map_err(|source| InferenceError::ReadInput {
                path: frame.file_path.clone(),
                source,
            })?;

        let request = ImageRequest {
            image,
            system: FRAME_SYSTEM_PROMPT.to_string(),
            prompt: self.prompt.clone(),
            timestamp_seconds: frame.timestamp_seconds,
            model: self.model.clone(),
            temperature: FRAME_TEMPERATURE,
        };

        call_with_timeout(self.call_timeout, self.inference.describe_image(request)).await
    }
}
