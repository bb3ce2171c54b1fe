use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{AudioRequest, ImageRequest, InferenceClient, TextRequest};
use crate::error::InferenceError;

/// Client for OpenAI-compatible chat completion and transcription endpoints
pub struct OpenAiClient {
    http: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn chat(&self, body: serde_json::Value) -> Result<String, InferenceError> {
        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        first_choice_content(parsed)
    }
}

#[async_trait]
impl InferenceClient for OpenAiClient {
    async fn describe_image(&self, request: ImageRequest) -> Result<String, InferenceError> {
        let data_uri = format!("data:image/jpeg;base64,{}", base64_encode(&request.image));

        // Chat completions with a multimodal user message
        let body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": format!("{}\n\nTIMESTAMP (sec): {}", request.prompt, request.timestamp_seconds),
                        },
                        { "type": "image_url", "image_url": { "url": data_uri } },
                    ],
                },
            ],
            "temperature": request.temperature,
        });

        self.chat(body).await
    }

    async fn transcribe(&self, request: AudioRequest) -> Result<String, InferenceError> {
        let file = Part::bytes(request.audio)
            .file_name(request.file_name)
            .mime_str(&request.mime_type)?;

        // Plain text output works with every transcription model
        let mut form = Form::new()
            .text("model", request.model)
            .text("response_format", "text")
            .part("file", file);
        if let Some(hint) = request.vocabulary_hint {
            form = form.text("prompt", hint);
        }

        let response = self
            .http
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    async fn generate_text(&self, request: TextRequest) -> Result<String, InferenceError> {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        self.chat(body).await
    }
}

fn first_choice_content(response: ChatResponse) -> Result<String, InferenceError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| InferenceError::MalformedResponse("response has no message content".to_string()))
}

/// Base64 encode bytes (standard alphabet, padded)
fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0] as usize;
        let b1 = chunk.get(1).copied().unwrap_or(0) as usize;
        let b2 = chunk.get(2).copied().unwrap_or(0) as usize;

        let combined = (b0 << 16) | (b1 << 8) | b2;

        result.push(ALPHABET[(combined >> 18) & 0x3F] as char);
        result.push(ALPHABET[(combined >> 12) & 0x3F] as char);
        result.push(if chunk.len() > 1 {
            ALPHABET[(combined >> 6) & 0x3F] as char
        } else {
            '='
        });
        result.push(if chunk.len() > 2 {
            ALPHABET[combined & 0x3F] as char
        } else {
            '='
        });
    }

    result
}
