use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PipelineError;
use crate::pipeline::{
    timestamped_run_dir, AnalysisOptions, DEFAULT_AUDIO_CHUNK_SECONDS, DEFAULT_AUDIO_PROMPT, DEFAULT_FRAME_INTERVAL,
    DEFAULT_FRAME_PROMPT, DEFAULT_MAX_FRAMES,
};

const LOCAL_CONFIG_FILE: &str = "config.yaml";
const APP_DIR_NAME: &str = "video-insight";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inference service settings
    pub inference: InferenceConfig,

    /// Defaults for `analyze`
    pub analysis: AnalysisDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub vision_model: String,
    pub transcribe_model: String,

    /// Model for blog content
    pub text_model: String,

    /// Model for blog titles
    pub title_model: String,

    pub request_timeout_secs: u64,

    /// Maximum in-flight calls per stage
    pub max_concurrency: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            vision_model: "gpt-4o".to_string(),
            transcribe_model: "gpt-4o-mini-transcribe".to_string(),
            text_model: "gpt-4o".to_string(),
            title_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 120,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    /// Parent of timestamped run directories
    pub runs_dir: PathBuf,
    pub frame_interval: u32,
    pub max_frames: usize,
    pub audio_chunk_seconds: u32,
    pub keep_media: bool,
    pub frame_prompt: Option<String>,
    pub audio_prompt: Option<String>,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("runs"),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            max_frames: DEFAULT_MAX_FRAMES,
            audio_chunk_seconds: DEFAULT_AUDIO_CHUNK_SECONDS,
            keep_media: false,
            frame_prompt: None,
            audio_prompt: None,
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise `./config.yaml`, then the user
    /// config directory, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().ok().filter(|path| path.exists()),
        };

        let Some(path) = path else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = fs_err::read_to_string(&path).context("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // Current directory wins, for per-project settings
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(APP_DIR_NAME).join(LOCAL_CONFIG_FILE))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.inference.api_base.trim().is_empty() {
            anyhow::bail!("inference.api_base must not be empty");
        }
        if self.inference.api_key_env.trim().is_empty() {
            anyhow::bail!("inference.api_key_env must not be empty");
        }
        if self.inference.request_timeout_secs == 0 {
            anyhow::bail!("inference.request_timeout_secs must be greater than zero");
        }
        if self.inference.max_concurrency == 0 {
            anyhow::bail!("inference.max_concurrency must be greater than zero");
        }
        if self.analysis.frame_interval == 0 {
            anyhow::bail!("analysis.frame_interval must be greater than zero");
        }
        if self.analysis.audio_chunk_seconds == 0 {
            anyhow::bail!("analysis.audio_chunk_seconds must be greater than zero");
        }

        Ok(())
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, PipelineError> {
        let env_var = &self.inference.api_key_env;
        match std::env::var(env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(PipelineError::MissingCredential {
                env_var: env_var.clone(),
            }),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.request_timeout_secs)
    }

    /// Analysis options before command-line overrides
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            output_dir: timestamped_run_dir(&self.analysis.runs_dir),
            frame_interval: self.analysis.frame_interval,
            max_frames: self.analysis.max_frames,
            audio_chunk_seconds: self.analysis.audio_chunk_seconds,
            vision_model: self.inference.vision_model.clone(),
            transcribe_model: self.inference.transcribe_model.clone(),
            skip_download: false,
            keep_media: self.analysis.keep_media,
            frame_prompt: self
                .analysis
                .frame_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_FRAME_PROMPT.to_string()),
            audio_prompt: Some(
                self.analysis
                    .audio_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AUDIO_PROMPT.to_string()),
            ),
            concurrency: self.inference.max_concurrency,
            call_timeout: self.request_timeout(),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API Base: {}", self.inference.api_base);
        println!("  API Key Variable: {}", self.inference.api_key_env);
        println!("  Vision Model: {}", self.inference.vision_model);
        println!("  Transcription Model: {}", self.inference.transcribe_model);
        println!("  Text Model: {}", self.inference.text_model);
        println!("  Title Model: {}", self.inference.title_model);
        println!("  Request Timeout: {}s", self.inference.request_timeout_secs);
        println!("  Max Concurrency: {}", self.inference.max_concurrency);
        println!("  Runs Directory: {}", self.analysis.runs_dir.display());
        println!("  Frame Interval: {}s", self.analysis.frame_interval);
        println!("  Max Frames: {}", self.analysis.max_frames);
        println!("  Audio Chunk: {}s", self.analysis.audio_chunk_seconds);
        println!("  Keep Media: {}", self.analysis.keep_media);
    }
}
