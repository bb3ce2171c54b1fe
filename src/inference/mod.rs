//! Remote inference capabilities: image description, speech-to-text and
//! text generation
//!
//! Every call is a single attempt; callers decide what a failure means.

use async_trait::async_trait;

pub mod openai;

pub use openai::OpenAiClient;

use crate::error::InferenceError;

/// Describe one still image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// JPEG bytes
    pub image: Vec<u8>,
    pub system: String,
    pub prompt: String,
    pub timestamp_seconds: u64,
    pub model: String,
    pub temperature: f32,
}

/// Transcribe one audio file to plain text
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    pub audio: Vec<u8>,
    /// Used by the service to detect the container
    pub file_name: String,
    pub mime_type: String,
    /// Biases vocabulary, names and casing
    pub vocabulary_hint: Option<String>,
    pub model: String,
}

/// Free-form text generation
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn describe_image(&self, request: ImageRequest) -> Result<String, InferenceError>;

    async fn transcribe(&self, request: AudioRequest) -> Result<String, InferenceError>;

    async fn generate_text(&self, request: TextRequest) -> Result<String, InferenceError>;
}
