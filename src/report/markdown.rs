use std::fmt::Write;

use super::AnalysisReport;
use crate::utils::format_timestamp;

pub const EMPTY_TRANSCRIPT_MARKER: &str = "_(empty)_";

/// Render the human-readable report document
pub fn render_markdown(report: &AnalysisReport) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "# Video Insight Report\n");
    let _ = writeln!(out, "- **Source:** {}", report.source);
    let _ = writeln!(out, "- **File:** {}", report.filename);
    let _ = writeln!(out, "- **Frame interval:** {}s\n", report.frame_interval_s);

    let _ = writeln!(out, "## Timeline (frame analyses)");
    for frame in &report.frames {
        let _ = writeln!(
            out,
            "**[{}]** — {}\n",
            format_timestamp(frame.timestamp_s),
            frame.display_text()
        );
    }

    let _ = writeln!(out, "## Transcript (raw)\n");
    if report.transcript_text.trim().is_empty() {
        out.push_str(EMPTY_TRANSCRIPT_MARKER);
    } else {
        out.push_str(&report.transcript_text);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frames::FrameAnalysisResult;
    use crate::pipeline::ItemOutcome;
    use std::path::PathBuf;

    fn report(frames: Vec<FrameAnalysisResult>, transcript: &str) -> AnalysisReport {
        AnalysisReport {
            source: "/videos/talk.mp4".to_string(),
            filename: "talk.mp4".to_string(),
            frame_interval_s: 30,
            frames,
            transcript_text: transcript.to_string(),
        }
    }

    #[test]
    fn test_render_full_document() {
        let frames = vec![
            FrameAnalysisResult {
                index: 0,
                timestamp_s: 0,
                frame_path: PathBuf::from("f1.jpg"),
                analysis: ItemOutcome::Text("Opening slide".to_string()),
            },
            FrameAnalysisResult {
                index: 3,
                timestamp_s: 90,
                frame_path: PathBuf::from("f4.jpg"),
                analysis: ItemOutcome::Error("Call timed out after 5s".to_string()),
            },
        ];

        let rendered = render_markdown(&report(frames, "Welcome everyone."));

        let expected = "# Video Insight Report\n\n\
- **Source:** /videos/talk.mp4\n\
- **File:** talk.mp4\n\
- **Frame interval:** 30s\n\n\
## Timeline (frame analyses)\n\
**[00:00]** — Opening slide\n\n\
**[01:30]** — ERROR: Call timed out after 5s\n\n\
## Transcript (raw)\n\n\
Welcome everyone.";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_blank_transcript_uses_marker() {
        let rendered = render_markdown(&report(vec![], "   "));
        assert!(rendered.ends_with("## Transcript (raw)\n\n_(empty)_"));
    }
}
