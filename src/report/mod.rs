//! Report assembly and persistence
//!
//! `report.json` and `report.md` are always rendered from the same
//! `AnalysisReport` value and written in one step.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod markdown;

pub use markdown::render_markdown;

use crate::error::ReportWriteError;
use crate::media::MediaMetadata;
use crate::pipeline::frames::FrameAnalysisResult;
use crate::pipeline::transcription::Transcript;

pub const JSON_FILE_NAME: &str = "report.json";
pub const MARKDOWN_FILE_NAME: &str = "report.md";

/// The terminal artifact of an analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub source: String,
    pub filename: String,
    pub frame_interval_s: u32,
    pub frames: Vec<FrameAnalysisResult>,
    pub transcript_text: String,
}

impl AnalysisReport {
    /// Merge stage outputs into the canonical record
    pub fn assemble(
        metadata: &MediaMetadata,
        frame_interval_s: u32,
        frames: Vec<FrameAnalysisResult>,
        transcript: &Transcript,
    ) -> Self {
        Self {
            source: metadata.source.clone(),
            filename: metadata.filename.clone(),
            frame_interval_s,
            frames,
            transcript_text: transcript.text.trim().to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportWriteError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        render_markdown(self)
    }

    /// Number of frames whose analysis failed
    pub fn failed_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.analysis.is_error()).count()
    }
}

/// Paths of the two persisted renderings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Write both renderings into `dir`
///
/// Both documents are rendered before anything touches the filesystem, then
/// written to temporary siblings and renamed into place.
pub fn persist(report: &AnalysisReport, dir: &Path) -> Result<ReportPaths, ReportWriteError> {
    let json = report.to_json()?;
    let markdown = report.to_markdown();

    let paths = ReportPaths {
        json: dir.join(JSON_FILE_NAME),
        markdown: dir.join(MARKDOWN_FILE_NAME),
    };
    let staged = [
        (paths.json.with_extension("json.tmp"), json, &paths.json),
        (paths.markdown.with_extension("md.tmp"), markdown, &paths.markdown),
    ];

    let result = write_staged(&staged);
    if result.is_err() {
        for (tmp, _, _) in &staged {
            let _ = fs_err::remove_file(tmp);
        }
    }
    drop(staged);
    result?;

    tracing::info!(
        "Wrote {} and {}",
        paths.json.display(),
        paths.markdown.display()
    );
    Ok(paths)
}

fn write_staged(staged: &[(PathBuf, String, &PathBuf); 2]) -> Result<(), ReportWriteError> {
    for (tmp, content, _) in staged {
        fs_err::write(tmp, content).map_err(|source| ReportWriteError::Write {
            path: tmp.clone(),
            source,
        })?;
    }
    for (position, (tmp, _, target)) in staged.iter().enumerate() {
        if let Err(source) = fs_err::rename(tmp, target) {
            // Never leave one rendering without the other
            for (_, _, placed) in &staged[..position] {
                let _ = fs_err::remove_file(placed);
            }
            return Err(ReportWriteError::Write {
                path: (*target).clone(),
                source,
            });
        }
    }
    Ok(())
}

/// Read a persisted structured rendering back
pub fn load(path: &Path) -> anyhow::Result<AnalysisReport> {
    let content = fs_err::read_to_string(path)?;
    let report = serde_json::from_str(&content)?;
    Ok(report)
}
