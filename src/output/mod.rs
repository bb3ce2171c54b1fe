//! Console presentation: styled status lines and progress bars

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::pipeline::events::{EventSink, PipelineEvent, Stage, TracingSink};
use crate::utils::format_duration;

pub fn print_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), style(message).red());
}

/// Print where a run put its reports
pub fn print_report_paths(json: &Path, markdown: &Path) {
    println!("{} {}", style("JSON:").bold(), json.display());
    println!("{} {}", style("Markdown:").bold(), markdown.display());
}

fn item_label(stage: Stage) -> &'static str {
    match stage {
        Stage::AnalyzeFrames => "Vision frames",
        Stage::Transcribe => "Transcribe chunks",
        other => other.as_str(),
    }
}

/// Event sink for the CLI: logs through `tracing` and draws progress
pub struct ProgressSink {
    tracing: TracingSink,
    multi: MultiProgress,
    bars: Mutex<HashMap<Stage, ProgressBar>>,
}

impl ProgressSink {
    pub fn new(quiet: bool) -> Self {
        let target = if quiet {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };

        Self {
            tracing: TracingSink,
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn start(&self, stage: Stage, items: Option<usize>) {
        let bar = match items {
            Some(len) => {
                let bar = self.multi.add(ProgressBar::new(len as u64));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            }
        };
        bar.set_message(item_label(stage));

        if let Ok(mut bars) = self.bars.lock() {
            if let Some(previous) = bars.insert(stage, bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn advance(&self, stage: Stage) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(&stage) {
                bar.inc(1);
            }
        }
    }

    fn finish(&self, stage: Stage, elapsed: Duration) {
        let bar = self.bars.lock().ok().and_then(|mut bars| bars.remove(&stage));
        if let Some(bar) = bar {
            bar.finish_and_clear();
            if !self.multi.is_hidden() {
                let _ = self.multi.println(format!(
                    "{} {} ({})",
                    style("✓").green(),
                    stage,
                    format_duration(elapsed.as_secs_f64())
                ));
            }
        }
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::StageStarted { stage, items } => self.start(*stage, *items),
            PipelineEvent::StageCompleted { stage, elapsed } => self.finish(*stage, *elapsed),
            PipelineEvent::ItemFinished { stage, .. } | PipelineEvent::ItemFailed { stage, .. } => {
                self.advance(*stage)
            }
            _ => {}
        }

        self.tracing.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_sink_tracks_bars_without_drawing() {
        let sink = ProgressSink::new(true);
        sink.emit(PipelineEvent::StageStarted {
            stage: Stage::AnalyzeFrames,
            items: Some(3),
        });
        sink.emit(PipelineEvent::ItemFinished {
            stage: Stage::AnalyzeFrames,
            index: 0,
            elapsed: Duration::from_millis(5),
        });
        sink.emit(PipelineEvent::ItemFailed {
            stage: Stage::AnalyzeFrames,
            index: 1,
            error: "boom".to_string(),
        });

        {
            let bars = sink.bars.lock().unwrap();
            assert_eq!(bars[&Stage::AnalyzeFrames].position(), 2);
            assert_eq!(bars[&Stage::AnalyzeFrames].length(), Some(3));
        }

        sink.emit(PipelineEvent::StageCompleted {
            stage: Stage::AnalyzeFrames,
            elapsed: Duration::from_secs(1),
        });
        assert!(sink.bars.lock().unwrap().is_empty());
    }

    #[test]
    fn test_item_labels() {
        assert_eq!(item_label(Stage::AnalyzeFrames), "Vision frames");
        assert_eq!(item_label(Stage::Transcribe), "Transcribe chunks");
        assert_eq!(item_label(Stage::Acquire), "Acquisition");
    }
}
