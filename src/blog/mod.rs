//! Turn a persisted analysis report into publishable articles

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod templates;

use crate::cli::BlogStyle;
use crate::inference::{InferenceClient, TextRequest};
use crate::pipeline::call_with_timeout;
use crate::report::{self, AnalysisReport, JSON_FILE_NAME, MARKDOWN_FILE_NAME};
use crate::utils::format_timestamp;
use templates::{fallback_content, missing_variant, package_readme, DEFAULT_AUTHOR, FALLBACK_TITLE};

const CONTENT_SYSTEM_PROMPT: &str =
    "You are an expert content creator who writes engaging blog posts and newsletters. Always return valid JSON.";
const TITLE_SYSTEM_PROMPT: &str = "You are an expert copywriter who creates compelling headlines.";

const CONTENT_TEMPERATURE: f32 = 0.7;
const CONTENT_MAX_TOKENS: u32 = 4000;
const TITLE_TEMPERATURE: f32 = 0.8;
const TITLE_MAX_TOKENS: u32 = 100;

const FRAME_CONTEXT_LIMIT: usize = 5;
const TRANSCRIPT_EXCERPT_CHARS: usize = 500;

const VARIANT_KEYS: [&str; 3] = ["medium", "newsletter", "wordpress"];

/// The three article variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogContent {
    pub medium: String,
    pub newsletter: String,
    pub wordpress: String,
}

/// Files written by one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogOutputs {
    pub medium: PathBuf,
    pub newsletter: PathBuf,
    pub wordpress: PathBuf,
    pub readme: PathBuf,
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BlogRequest {
    /// The Markdown report
    pub report: PathBuf,
    pub frames_dir: PathBuf,
    pub output_dir: PathBuf,
    pub style: BlogStyle,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl BlogRequest {
    /// Accept either a report file or the run directory holding `report.md`;
    /// frames are read from the `frames/` directory next to the report
    pub fn from_input(input: &Path, output_dir: PathBuf, style: BlogStyle) -> Self {
        let report = if input.is_dir() {
            input.join(MARKDOWN_FILE_NAME)
        } else {
            input.to_path_buf()
        };
        let frames_dir = report
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("frames");

        Self {
            report,
            frames_dir,
            output_dir,
            style,
            title: None,
            author: None,
        }
    }
}

pub struct BlogGenerator {
    inference: Arc<dyn InferenceClient>,
    text_model: String,
    title_model: String,
    call_timeout: Duration,
}

impl BlogGenerator {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        text_model: impl Into<String>,
        title_model: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            inference,
            text_model: text_model.into(),
            title_model: title_model.into(),
            call_timeout,
        }
    }

    pub async fn generate(&self, request: &BlogRequest) -> Result<BlogOutputs> {
        if !request.report.is_file() {
            anyhow::bail!("Report file not found: {}", request.report.display());
        }
        tracing::info!("Generating blog post from report: {}", request.report.display());

        let report_md = fs_err::read_to_string(&request.report).context("Failed to read report")?;
        let report_data = load_structured_report(&request.report);
        let frames = collect_frames(&request.frames_dir)?;
        tracing::info!("Found {} frame images", frames.len());

        let source = report_data
            .as_ref()
            .map(|r| r.source.clone())
            .unwrap_or_else(|| "Unknown video".to_string());
        let descriptions = report_data.as_ref().map(frame_descriptions).unwrap_or_default();

        let title = match &request.title {
            Some(title) => title.clone(),
            None => {
                let transcript = report_data.as_ref().map(|r| r.transcript_text.as_str()).unwrap_or("");
                self.generate_title(&source, transcript).await
            }
        };
        let author = request.author.clone().unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
        tracing::info!("Generating blog post with title: '{}'", title);

        let content = self
            .generate_content(&report_md, &source, &descriptions, request.style, &title, &author)
            .await;

        let images_dir = request.output_dir.join("images");
        fs_err::create_dir_all(&images_dir)?;

        let mut images = Vec::with_capacity(frames.len());
        for frame in &frames {
            if let Some(name) = frame.file_name() {
                let dest = images_dir.join(name);
                fs_err::copy(frame, &dest)?;
                images.push(dest);
            }
        }
        tracing::info!("Copied {} images to {}", images.len(), images_dir.display());

        let outputs = BlogOutputs {
            medium: request.output_dir.join("blog_post_medium.md"),
            newsletter: request.output_dir.join("newsletter.html"),
            wordpress: request.output_dir.join("blog_post_wordpress.md"),
            readme: request.output_dir.join("README.md"),
            images,
        };

        fs_err::write(&outputs.medium, &content.medium)?;
        fs_err::write(&outputs.newsletter, &content.newsletter)?;
        fs_err::write(&outputs.wordpress, &content.wordpress)?;

        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        fs_err::write(&outputs.readme, package_readme(&generated_at, &outputs.images))?;

        tracing::info!("Blog post generated successfully in {}", request.output_dir.display());
        Ok(outputs)
    }

    async fn generate_title(&self, source: &str, transcript: &str) -> String {
        let excerpt: String = transcript.chars().take(TRANSCRIPT_EXCERPT_CHARS).collect();
        let prompt = format!(
            "Generate a compelling, clickable blog post title based on this video content.

VIDEO SOURCE: {source}
TRANSCRIPT EXCERPT: {excerpt}...

Make it:
- Engaging and clickable
- 50-70 characters
- Descriptive of the main topic
- Include keywords that would perform well

Return only the title, nothing else."
        );

        let request = TextRequest {
            system: TITLE_SYSTEM_PROMPT.to_string(),
            prompt,
            model: self.title_model.clone(),
            temperature: TITLE_TEMPERATURE,
            max_tokens: Some(TITLE_MAX_TOKENS),
        };

        match call_with_timeout(self.call_timeout, self.inference.generate_text(request)).await {
            Ok(title) => {
                let title = title.trim().trim_matches('"').trim();
                if title.is_empty() {
                    FALLBACK_TITLE.to_string()
                } else {
                    title.to_string()
                }
            }
            Err(e) => {
                tracing::error!("Error generating title: {}", e);
                FALLBACK_TITLE.to_string()
            }
        }
    }

    async fn generate_content(
        &self,
        report_md: &str,
        source: &str,
        descriptions: &[String],
        style: BlogStyle,
        title: &str,
        author: &str,
    ) -> BlogContent {
        let frames = descriptions.join("\n");
        let primary = style.key().to_uppercase();
        let prompt = format!(
            "Create an engaging blog post based on this video analysis report.

VIDEO SOURCE: {source}
TITLE: {title}
AUTHOR: {author}
PRIMARY PLATFORM: {primary}

ORIGINAL REPORT:
{report_md}

FRAME DESCRIPTIONS:
{frames}

Create three versions:
1. MEDIUM: A Medium.com style article with engaging headings, subheadings, and image placeholders
2. NEWSLETTER: An HTML newsletter format with inline styles
3. WORDPRESS: A WordPress/Ghost compatible markdown with proper image embedding

Guidelines:
- Write the {primary} version first and give it the most care
- Make it engaging and readable
- Include key insights from the video
- Add relevant quotes from the transcript
- Use the frame analyses to create compelling visual descriptions
- Include image placeholders: ![Image Description](images/frame_XXXXXX.jpg)
- Add call-to-action at the end
- Keep paragraphs short for readability
- Use bullet points and numbered lists where appropriate

Format your response as JSON with keys: \"medium\", \"newsletter\", \"wordpress\""
        );

        let request = TextRequest {
            system: CONTENT_SYSTEM_PROMPT.to_string(),
            prompt,
            model: self.text_model.clone(),
            temperature: CONTENT_TEMPERATURE,
            max_tokens: Some(CONTENT_MAX_TOKENS),
        };

        let fallback = || {
            let date = chrono::Local::now().format("%B %d, %Y").to_string();
            fallback_content(title, author, &date, report_md, descriptions)
        };

        match call_with_timeout(self.call_timeout, self.inference.generate_text(request)).await {
            Ok(raw) => parse_content(&raw, title).unwrap_or_else(|| {
                tracing::warn!("Generated content was not valid JSON, using templated content");
                fallback()
            }),
            Err(e) => {
                tracing::error!("Error generating blog content: {}", e);
                fallback()
            }
        }
    }
}

/// Parse the model's JSON answer, filling any variant it left out
///
/// Returns `None` when the answer is not a JSON object.
pub fn parse_content(raw: &str, title: &str) -> Option<BlogContent> {
    let body = strip_code_fences(raw);
    let Value::Object(map) = serde_json::from_str::<Value>(body).ok()? else {
        return None;
    };

    let [medium, newsletter, wordpress] = VARIANT_KEYS.map(|key| match map.get(key) {
        Some(Value::String(text)) => text.clone(),
        _ => missing_variant(title, key),
    });

    Some(BlogContent {
        medium,
        newsletter,
        wordpress,
    })
}

/// Drop a surrounding Markdown code fence, with or without a language tag
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the info string on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let rest = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    rest.trim()
}

/// `Frame at MM:SS: <text>` for the first few frames
fn frame_descriptions(report: &AnalysisReport) -> Vec<String> {
    report
        .frames
        .iter()
        .take(FRAME_CONTEXT_LIMIT)
        .map(|frame| format!("Frame at {}: {}", format_timestamp(frame.timestamp_s), frame.display_text()))
        .collect()
}

fn load_structured_report(report_md: &Path) -> Option<AnalysisReport> {
    let json_path = report_md.with_file_name(JSON_FILE_NAME);
    if !json_path.exists() {
        return None;
    }

    match report::load(&json_path) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", json_path.display(), e);
            None
        }
    }
}

fn collect_frames(frames_dir: &Path) -> Result<Vec<PathBuf>> {
    if !frames_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut frames: Vec<PathBuf> = fs_err::read_dir(frames_dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::inference::MockInferenceClient;
    use crate::pipeline::frames::FrameAnalysisResult;
    use crate::pipeline::ItemOutcome;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 2} "), "{\"a\": 2}");
    }

    #[test]
    fn test_parse_fenced_content_fills_missing_keys() {
        let raw = "```json\n{\"medium\": \"# Post\", \"wordpress\": \"# WP\"}\n```";

        let content = parse_content(raw, "Title").unwrap();

        assert_eq!(content.medium, "# Post");
        assert_eq!(content.wordpress, "# WP");
        assert_eq!(
            content.newsletter,
            "# Title\n\nContent generation failed for newsletter format."
        );
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_content("Sure! Here is your post:", "T").is_none());
        assert!(parse_content("[1, 2]", "T").is_none());
    }

    fn write_run(dir: &Path) -> PathBuf {
        let report = AnalysisReport {
            source: "https://youtu.be/demo".to_string(),
            filename: "demo.mp4".to_string(),
            frame_interval_s: 30,
            frames: (0..7)
                .map(|i| FrameAnalysisResult {
                    index: i,
                    timestamp_s: i as u64 * 30,
                    frame_path: dir.join(format!("frames/frame_{:06}.jpg", i + 1)),
                    analysis: ItemOutcome::Text(format!("scene {}", i)),
                })
                .collect(),
            transcript_text: "Welcome to the demo.".to_string(),
        };
        report::persist(&report, dir).unwrap();

        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        std::fs::write(frames.join("frame_000002.jpg"), b"jpeg2").unwrap();
        std::fs::write(frames.join("frame_000001.jpg"), b"jpeg1").unwrap();
        std::fs::write(frames.join("notes.txt"), b"skip").unwrap();
        dir.join(MARKDOWN_FILE_NAME)
    }

    #[tokio::test]
    async fn test_generate_writes_package() {
        let run = tempfile::tempdir().unwrap();
        write_run(run.path());
        let out = tempfile::tempdir().unwrap();

        let mut inference = MockInferenceClient::new();
        inference
            .expect_generate_text()
            .withf(|request| request.model == "title-model")
            .times(1)
            .returning(|request| {
                assert!(request.prompt.contains("TRANSCRIPT EXCERPT: Welcome to the demo."));
                Ok("\"Demo Day Recap\"".to_string())
            });
        inference
            .expect_generate_text()
            .withf(|request| request.model == "text-model")
            .times(1)
            .returning(|request| {
                assert!(request.prompt.contains("TITLE: Demo Day Recap"));
                assert!(request.prompt.contains("PRIMARY PLATFORM: NEWSLETTER"));
                // Only the first five frames are summarised; the full report lists all seven
                let frames = request.prompt.split("FRAME DESCRIPTIONS:").nth(1).unwrap();
                assert!(frames.contains("Frame at 02:00: scene 4"));
                assert!(!frames.contains("Frame at 02:30"));
                assert!(request.prompt.contains("**[03:00]** — scene 6"));
                Ok("```json\n{\"medium\": \"# M\", \"newsletter\": \"<p>N</p>\", \"wordpress\": \"# W\"}\n```".to_string())
            });

        let generator = BlogGenerator::new(Arc::new(inference), "text-model", "title-model", Duration::from_secs(5));
        let request = BlogRequest::from_input(run.path(), out.path().to_path_buf(), BlogStyle::Newsletter);

        let outputs = generator.generate(&request).await.unwrap();

        assert_eq!(std::fs::read_to_string(&outputs.medium).unwrap(), "# M");
        assert_eq!(std::fs::read_to_string(&outputs.newsletter).unwrap(), "<p>N</p>");
        assert_eq!(std::fs::read_to_string(&outputs.wordpress).unwrap(), "# W");
        assert_eq!(
            outputs.images,
            vec![
                out.path().join("images/frame_000001.jpg"),
                out.path().join("images/frame_000002.jpg")
            ]
        );
        let readme = std::fs::read_to_string(&outputs.readme).unwrap();
        assert!(readme.contains("- frame_000001.jpg\n- frame_000002.jpg"));
    }

    #[tokio::test]
    async fn test_failed_generation_uses_templates() {
        let run = tempfile::tempdir().unwrap();
        let report_md = write_run(run.path());
        let out = tempfile::tempdir().unwrap();

        let mut inference = MockInferenceClient::new();
        inference.expect_generate_text().times(2).returning(|_| {
            Err(InferenceError::Api {
                status: 503,
                body: "overloaded".to_string(),
            })
        });

        let generator = BlogGenerator::new(Arc::new(inference), "text-model", "title-model", Duration::from_secs(5));
        let mut request = BlogRequest::from_input(&report_md, out.path().to_path_buf(), BlogStyle::Medium);
        request.author = Some("Grace".to_string());

        let outputs = generator.generate(&request).await.unwrap();

        let medium = std::fs::read_to_string(&outputs.medium).unwrap();
        assert!(medium.starts_with("# Video Analysis: Key Insights and Takeaways\n\n*By Grace"));
        assert!(medium.contains("• Frame at 00:00: scene 0"));
        assert_eq!(std::fs::read_to_string(&outputs.wordpress).unwrap(), medium);
        assert!(std::fs::read_to_string(&outputs.newsletter)
            .unwrap()
            .starts_with("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_provided_title_skips_title_call() {
        let run = tempfile::tempdir().unwrap();
        write_run(run.path());
        let out = tempfile::tempdir().unwrap();

        let mut inference = MockInferenceClient::new();
        inference
            .expect_generate_text()
            .times(1)
            .returning(|_| Ok("not json at all".to_string()));

        let generator = BlogGenerator::new(Arc::new(inference), "text-model", "title-model", Duration::from_secs(5));
        let mut request = BlogRequest::from_input(run.path(), out.path().to_path_buf(), BlogStyle::Wordpress);
        request.title = Some("Given Title".to_string());

        let outputs = generator.generate(&request).await.unwrap();
        let medium = std::fs::read_to_string(&outputs.medium).unwrap();
        assert!(medium.starts_with("# Given Title\n\n*By AI Video Analyst"));
    }

    #[tokio::test]
    async fn test_missing_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let generator = BlogGenerator::new(
            Arc::new(MockInferenceClient::new()),
            "text-model",
            "title-model",
            Duration::from_secs(5),
        );
        let request = BlogRequest::from_input(&dir.path().join("nope.md"), dir.path().join("out"), BlogStyle::Medium);

        let err = generator.generate(&request).await.unwrap_err();
        assert!(err.to_string().contains("Report file not found"));
    }
}
