use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::AnalysisOptions;

#[derive(Parser)]
#[command(
    name = "video-insight",
    about = "Video Insight - Turn videos into timestamped frame analyses, transcripts and blog posts",
    version,
    long_about = "A CLI tool that downloads or copies a video, samples frames and describes them with a vision model, transcribes the audio, and writes report.json and report.md. Reports can then be turned into Medium, newsletter and WordPress articles."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(long, global = true, value_name = "FILE", env = "VIDEO_INSIGHT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Analysis flags shared by `analyze` and `full-pipeline`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Run directory (defaults to <runs_dir>/<YYYYmmdd-HHMMSS>)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Seconds between sampled frames
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u32>,

    /// Maximum number of frames to analyze (0 for no limit)
    #[arg(long, value_name = "COUNT")]
    pub max_frames: Option<usize>,

    /// Length of each transcription chunk
    #[arg(long, value_name = "SECONDS")]
    pub audio_chunk_seconds: Option<u32>,

    /// Vision model for frame analysis
    #[arg(long, value_name = "MODEL")]
    pub vision_model: Option<String>,

    /// Speech-to-text model
    #[arg(long, value_name = "MODEL")]
    pub transcribe_model: Option<String>,

    /// Treat the input as a local file even if it looks like a URL
    #[arg(long)]
    pub skip_download: bool,

    /// Keep frames and audio after the run
    #[arg(long)]
    pub keep_media: bool,

    /// Custom prompt for frame analysis
    #[arg(long, value_name = "TEXT")]
    pub frame_prompt: Option<String>,

    /// Vocabulary hints for transcription
    #[arg(long, value_name = "TEXT")]
    pub audio_prompt: Option<String>,

    /// Maximum concurrent inference calls per stage
    #[arg(long, value_name = "COUNT")]
    pub concurrency: Option<usize>,
}

impl AnalyzeArgs {
    /// Override configured options with the flags that were given
    pub fn apply_to(&self, options: &mut AnalysisOptions) {
        if let Some(output) = &self.output {
            options.output_dir = output.clone();
        }
        if let Some(interval) = self.interval {
            options.frame_interval = interval;
        }
        if let Some(max_frames) = self.max_frames {
            options.max_frames = max_frames;
        }
        if let Some(seconds) = self.audio_chunk_seconds {
            options.audio_chunk_seconds = seconds;
        }
        if let Some(model) = &self.vision_model {
            options.vision_model = model.clone();
        }
        if let Some(model) = &self.transcribe_model {
            options.transcribe_model = model.clone();
        }
        if let Some(prompt) = &self.frame_prompt {
            options.frame_prompt = prompt.clone();
        }
        if let Some(prompt) = &self.audio_prompt {
            options.audio_prompt = Some(prompt.clone());
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        options.skip_download |= self.skip_download;
        options.keep_media |= self.keep_media;
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a video from a URL or local file
    Analyze {
        /// Video URL or local file path
        #[arg(value_name = "URL_OR_FILE")]
        input: String,

        #[command(flatten)]
        args: AnalyzeArgs,
    },

    /// Generate blog posts from an analysis report
    GenerateBlog {
        /// report.md, or the run directory that contains it
        #[arg(value_name = "REPORT")]
        report: PathBuf,

        /// Output directory for the blog package
        #[arg(short, long, value_name = "DIR", default_value = "blog_output")]
        output: PathBuf,

        /// Blog title (generated if not specified)
        #[arg(long)]
        title: Option<String>,

        /// Author name
        #[arg(long)]
        author: Option<String>,

        /// Primary platform the content is written for
        #[arg(long, value_enum, default_value = "medium")]
        style: BlogStyle,
    },

    /// Analyze a video, then generate blog posts from the report
    FullPipeline {
        /// Video URL or local file path
        #[arg(value_name = "URL_OR_FILE")]
        input: String,

        /// Run directory (defaults to <runs_dir>/<YYYYmmdd-HHMMSS>)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Seconds between sampled frames
        #[arg(long, value_name = "SECONDS", default_value = "30")]
        interval: u32,

        /// Maximum number of frames to analyze
        #[arg(long, value_name = "COUNT", default_value = "20")]
        max_frames: usize,

        /// Blog title (generated if not specified)
        #[arg(long)]
        blog_title: Option<String>,

        /// Blog author name
        #[arg(long)]
        blog_author: Option<String>,
    },

    /// Create or show the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlogStyle {
    /// Medium-style Markdown article
    #[default]
    Medium,
    /// HTML email newsletter
    Newsletter,
    /// WordPress-ready Markdown
    Wordpress,
}

impl BlogStyle {
    /// Key used for this variant in generated content
    pub fn key(&self) -> &'static str {
        match self {
            BlogStyle::Medium => "medium",
            BlogStyle::Newsletter => "newsletter",
            BlogStyle::Wordpress => "wordpress",
        }
    }
}

impl std::fmt::Display for BlogStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
