use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_insight::cli::{AnalyzeArgs, BlogStyle, Cli, Commands};
use video_insight::config::Config;
use video_insight::output::{self, ProgressSink};
use video_insight::pipeline::{AnalysisOptions, AnalysisOutcome, AnalysisPipeline};
use video_insight::utils::{self, ExternalTool};
use video_insight::{BlogGenerator, BlogRequest, FfmpegTranscoder, OpenAiClient, PipelineError, Result, YtDlpFetcher};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.debug { "video_insight=debug" } else { "video_insight=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&error_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Creating the file must work before it exists
    if let Commands::Config { show: false } = cli.command {
        return init_config(cli.config);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { input, args } => {
            let mut options = config.analysis_options();
            args.apply_to(&mut options);

            let outcome = analyze(&config, &input, &options, cli.quiet).await?;
            print_outcome(&outcome);
        }
        Commands::GenerateBlog {
            report,
            output,
            title,
            author,
            style,
        } => {
            let mut request = BlogRequest::from_input(&report, output, style);
            request.title = title;
            request.author = author;
            generate_blog(&config, &request).await?;
        }
        Commands::FullPipeline {
            input,
            output,
            interval,
            max_frames,
            blog_title,
            blog_author,
        } => {
            let mut options = config.analysis_options();
            AnalyzeArgs {
                output,
                interval: Some(interval),
                max_frames: Some(max_frames),
                keep_media: true,
                ..AnalyzeArgs::default()
            }
            .apply_to(&mut options);

            let outcome = analyze(&config, &input, &options, cli.quiet).await?;
            print_outcome(&outcome);

            let mut request = BlogRequest::from_input(&outcome.run_dir, blog_dir(&outcome.run_dir), BlogStyle::Medium);
            request.title = blog_title;
            request.author = blog_author;
            generate_blog(&config, &request).await?;
        }
        Commands::Config { .. } => config.display(),
    }

    Ok(())
}

fn init_config(explicit: Option<PathBuf>) -> Result<()> {
    let path = match explicit {
        Some(path) => path,
        None => Config::config_path()?,
    };

    if path.exists() {
        println!("Configuration file: {}", path.display());
    } else {
        Config::default().save(&path)?;
        output::print_success(&format!("Created default configuration at {}", path.display()));
    }
    println!("Edit this file to change models, prompts and defaults.");
    Ok(())
}

async fn analyze(config: &Config, input: &str, options: &AnalysisOptions, quiet: bool) -> Result<AnalysisOutcome> {
    let api_key = config.api_key()?;

    if !utils::check_dependencies(&[ExternalTool::Ffmpeg]).await.is_empty() {
        return Err(PipelineError::CapabilityUnavailable {
            capability: ExternalTool::Ffmpeg.command(),
            hint: ExternalTool::Ffmpeg.install_hint(),
        }
        .into());
    }

    let inference = OpenAiClient::new(&config.inference.api_base, api_key, config.request_timeout())?;
    let pipeline = AnalysisPipeline::new(
        Arc::new(YtDlpFetcher::new()),
        Arc::new(FfmpegTranscoder::new()),
        Arc::new(inference),
        Arc::new(ProgressSink::new(quiet)),
    );

    tracing::info!("Starting analysis for: {}", input);
    Ok(pipeline.run(input, options).await?)
}

async fn generate_blog(config: &Config, request: &BlogRequest) -> Result<()> {
    let api_key = config.api_key()?;
    let inference = OpenAiClient::new(&config.inference.api_base, api_key, config.request_timeout())?;
    let generator = BlogGenerator::new(
        Arc::new(inference),
        &config.inference.text_model,
        &config.inference.title_model,
        config.request_timeout(),
    );

    let outputs = generator.generate(request).await?;

    output::print_success(&format!("Blog package written to {}", request.output_dir.display()));
    println!("  Medium: {}", outputs.medium.display());
    println!("  Newsletter: {}", outputs.newsletter.display());
    println!("  WordPress: {}", outputs.wordpress.display());
    println!("  Images: {}", outputs.images.len());
    Ok(())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let report = &outcome.report;
    let failed = report.failed_frames();
    output::print_success(&format!("Analyzed {} frames of {}", report.frames.len(), report.filename));
    if failed > 0 {
        output::print_warning(&format!("{} frame analyses failed and were recorded as errors", failed));
    }
    output::print_report_paths(&outcome.paths.json, &outcome.paths.markdown);
}

/// The error chain, skipping causes already spelled out by their parent
fn error_message(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    for cause in error.chain().skip(1) {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message = format!("{}: {}", message, cause);
        }
    }
    message
}

/// `<run_dir>_blog`
fn blog_dir(run_dir: &Path) -> PathBuf {
    let mut dir = run_dir.as_os_str().to_os_string();
    dir.push("_blog");
    PathBuf::from(dir)
}
