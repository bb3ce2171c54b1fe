use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::events::{EventSink, PipelineEvent, Stage};
use super::parallel::map_indexed;
use super::{call_with_timeout, AnalysisOptions, ItemOutcome};
use crate::error::InferenceError;
use crate::inference::{AudioRequest, InferenceClient};
use crate::media::{AudioFormat, MediaTranscoder};

pub const SPLIT_DIR_NAME: &str = "split";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// One piece of the extracted audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub chunk_index: usize,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub chunk_index: usize,
    pub file: PathBuf,
    pub outcome: ItemOutcome,
}

impl TranscriptSegment {
    /// Failed chunks show up inline so the transcript stays in order
    pub fn display_text(&self) -> String {
        match &self.outcome {
            ItemOutcome::Text(text) => text.clone(),
            ItemOutcome::Error(message) => {
                format!("[Error transcribing chunk {}: {}]", self.chunk_index + 1, message)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn from_segments(segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(TranscriptSegment::display_text)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        Self { text, segments }
    }

    pub fn failed_chunks(&self) -> usize {
        self.segments.iter().filter(|s| s.outcome.is_error()).count()
    }
}

/// Segments the extracted audio and transcribes every chunk
pub struct TranscriptionStage {
    transcoder: Arc<dyn MediaTranscoder>,
    inference: Arc<dyn InferenceClient>,
    events: Arc<dyn EventSink>,
    model: String,
    vocabulary_hint: Option<String>,
    chunk_seconds: u32,
    concurrency: usize,
    call_timeout: Duration,
}

impl TranscriptionStage {
    pub fn new(
        transcoder: Arc<dyn MediaTranscoder>,
        inference: Arc<dyn InferenceClient>,
        events: Arc<dyn EventSink>,
        options: &AnalysisOptions,
    ) -> Self {
        Self {
            transcoder,
            inference,
            events,
            model: options.transcribe_model.clone(),
            vocabulary_hint: options.audio_prompt.clone(),
            chunk_seconds: options.audio_chunk_seconds,
            concurrency: options.concurrency,
            call_timeout: options.call_timeout,
        }
    }

    pub async fn transcribe(&self, audio: &Path) -> Transcript {
        let chunks = self.split(audio).await;

        let started = Instant::now();
        self.events.emit(PipelineEvent::StageStarted {
            stage: Stage::Transcribe,
            items: Some(chunks.len()),
        });

        let segments = map_indexed(chunks, self.concurrency, |_, chunk| self.transcribe_one(chunk)).await;

        self.events.emit(PipelineEvent::StageCompleted {
            stage: Stage::Transcribe,
            elapsed: started.elapsed(),
        });
        Transcript::from_segments(segments)
    }

    /// Segment into `<audio_dir>/split`; the whole file is one chunk when
    /// segmentation fails or yields nothing
    async fn split(&self, audio: &Path) -> Vec<AudioChunk> {
        let started = Instant::now();
        self.events.emit(PipelineEvent::StageStarted {
            stage: Stage::SegmentAudio,
            items: None,
        });

        let split_dir = audio
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SPLIT_DIR_NAME);

        let files = match self
            .transcoder
            .segment_audio(audio, &split_dir, self.chunk_seconds)
            .await
        {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                self.events.emit(PipelineEvent::SegmentationFallback {
                    reason: "segmentation produced no chunks".to_string(),
                });
                vec![audio.to_path_buf()]
            }
            Err(e) => {
                self.events.emit(PipelineEvent::SegmentationFallback { reason: e.to_string() });
                vec![audio.to_path_buf()]
            }
        };

        self.events.emit(PipelineEvent::StageCompleted {
            stage: Stage::SegmentAudio,
            elapsed: started.elapsed(),
        });

        files
            .into_iter()
            .enumerate()
            .map(|(chunk_index, file_path)| AudioChunk { chunk_index, file_path })
            .collect()
    }

    async fn transcribe_one(&self, chunk: AudioChunk) -> TranscriptSegment {
        let started = Instant::now();
        let result = self.request(&chunk).await;

        match &result {
            Ok(_) => self.events.emit(PipelineEvent::ItemFinished {
                stage: Stage::Transcribe,
                index: chunk.chunk_index,
                elapsed: started.elapsed(),
            }),
            Err(e) => self.events.emit(PipelineEvent::ItemFailed {
                stage: Stage::Transcribe,
                index: chunk.chunk_index,
                error: e.to_string(),
            }),
        }

        TranscriptSegment {
            chunk_index: chunk.chunk_index,
            file: chunk.file_path,
            outcome: ItemOutcome::from_result(result),
        }
    }

    async fn request(&self, chunk: &AudioChunk) -> Result<String, InferenceError> {
        let audio = tokio::fs::read(&chunk.file_path)
            .await
            .map_err(|source| InferenceError::ReadInput {
                path: chunk.file_path.clone(),
                source,
            })?;

        let file_name = chunk
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let mime_type = AudioFormat::from_path(&chunk.file_path)
            .map(|format| format.mime_type())
            .unwrap_or(FALLBACK_MIME_TYPE);

        let request = AudioRequest {
            audio,
            file_name,
            mime_type: mime_type.to_string(),
            vocabulary_hint: self.vocabulary_hint.clone(),
            model: self.model.clone(),
        };

        call_with_timeout(self.call_timeout, self.inference.transcribe(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscodeError;
    use crate::inference::MockInferenceClient;
    use crate::pipeline::events::MemorySink;
    use async_trait::async_trait;

    /// Segmenter that writes a fixed number of parts, or fails
    struct FakeSegmenter {
        parts: usize,
        fail: bool,
    }

    #[async_trait]
    impl MediaTranscoder for FakeSegmenter {
        async fn extract_audio(&self, _video: &Path, _destination: &Path) -> Result<PathBuf, TranscodeError> {
            unreachable!()
        }

        async fn sample_frames(
            &self,
            _video: &Path,
            _destination: &Path,
            _interval_seconds: u32,
        ) -> Result<Vec<PathBuf>, TranscodeError> {
            unreachable!()
        }

        async fn segment_audio(
            &self,
            _audio: &Path,
            destination: &Path,
            _chunk_seconds: u32,
        ) -> Result<Vec<PathBuf>, TranscodeError> {
            if self.fail {
                return Err(TranscodeError::ToolFailed {
                    tool: "ffmpeg",
                    status: Some(1),
                    stderr: "segment muxer unavailable".to_string(),
                });
            }
            std::fs::create_dir_all(destination)?;
            Ok((0..self.parts)
                .map(|i| {
                    let path = destination.join(format!("part_{:05}.m4a", i));
                    std::fs::write(&path, b"aac").unwrap();
                    path
                })
                .collect())
        }
    }

    fn audio_file(dir: &Path) -> PathBuf {
        let audio = dir.join("talk.m4a");
        std::fs::write(&audio, b"whole-audio").unwrap();
        audio
    }

    fn stage(parts: usize, fail: bool, inference: MockInferenceClient, sink: Arc<MemorySink>) -> TranscriptionStage {
        TranscriptionStage::new(
            Arc::new(FakeSegmenter { parts, fail }),
            Arc::new(inference),
            sink,
            &AnalysisOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_two_chunks_join_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let audio = audio_file(dir.path());

        let mut inference = MockInferenceClient::new();
        inference.expect_transcribe().times(2).returning(|request| {
            assert_eq!(request.mime_type, "audio/mp4");
            assert!(request.vocabulary_hint.is_some());
            Ok(match request.file_name.as_str() {
                "part_00000.m4a" => "first part".to_string(),
                _ => "second part".to_string(),
            })
        });

        let transcript = stage(2, false, inference, Arc::new(MemorySink::new()))
            .transcribe(&audio)
            .await;

        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.text, "first part\nsecond part");
        assert_eq!(
            transcript.segments[1].file,
            dir.path().join("split").join("part_00001.m4a")
        );
    }

    #[tokio::test]
    async fn test_no_chunks_falls_back_to_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = audio_file(dir.path());

        let mut inference = MockInferenceClient::new();
        inference
            .expect_transcribe()
            .times(1)
            .withf(|request| request.file_name == "talk.m4a" && request.audio == b"whole-audio")
            .returning(|_| Ok(" everything ".to_string()));

        let sink = Arc::new(MemorySink::new());
        let transcript = stage(0, false, inference, sink.clone()).transcribe(&audio).await;

        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].file, audio);
        // Chunk text is kept as returned; only the joined transcript is trimmed
        assert_eq!(transcript.segments[0].outcome, ItemOutcome::Text(" everything ".to_string()));
        assert_eq!(transcript.text, "everything");
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::SegmentationFallback { .. })));
    }

    #[tokio::test]
    async fn test_segmentation_error_falls_back_to_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = audio_file(dir.path());

        let mut inference = MockInferenceClient::new();
        inference
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok("fallback text".to_string()));

        let sink = Arc::new(MemorySink::new());
        let transcript = stage(0, true, inference, sink.clone()).transcribe(&audio).await;

        assert_eq!(transcript.text, "fallback text");
        let reason = sink.events().into_iter().find_map(|e| match e {
            PipelineEvent::SegmentationFallback { reason } => Some(reason),
            _ => None,
        });
        assert!(reason.unwrap().contains("segment muxer unavailable"));
    }

    #[tokio::test]
    async fn test_failed_chunk_leaves_inline_marker() {
        let dir = tempfile::tempdir().unwrap();
        let audio = audio_file(dir.path());

        let mut inference = MockInferenceClient::new();
        inference.expect_transcribe().times(3).returning(|request| {
            if request.file_name == "part_00001.m4a" {
                Err(InferenceError::Api {
                    status: 429,
                    body: "rate limited".to_string(),
                })
            } else {
                Ok(String::new())
            }
        });

        let transcript = stage(3, false, inference, Arc::new(MemorySink::new()))
            .transcribe(&audio)
            .await;

        assert_eq!(transcript.segments.len(), 3);
        assert_eq!(transcript.failed_chunks(), 1);
        assert_eq!(
            transcript.text,
            "[Error transcribing chunk 2: API returned 429: rate limited]"
        );
    }
}
