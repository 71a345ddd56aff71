use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use swapover_core::{JobOutcome, ProgressEvent};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
    Json,
}

pub(crate) fn resolve_output_style(
    requested: Option<OutputStyle>,
    stdout_is_terminal: bool,
    no_color: bool,
) -> OutputStyle {
    if let Some(style) = requested {
        return style;
    }
    if no_color || !stdout_is_terminal {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum JsonLine<'a> {
    Progress { percent: u8, message: &'a str },
    Finished {
        outcome: &'a str,
        reason: Option<&'a str>,
    },
}

pub(crate) fn render_json_progress(event: &ProgressEvent) -> String {
    json_line(&JsonLine::Progress {
        percent: event.percent,
        message: &event.message,
    })
}

pub(crate) fn render_json_finished(outcome: Option<&JobOutcome>) -> String {
    json_line(&JsonLine::Finished {
        outcome: outcome.map(JobOutcome::as_str).unwrap_or("skipped"),
        reason: outcome.and_then(JobOutcome::failure_reason),
    })
}

fn json_line(line: &JsonLine<'_>) -> String {
    serde_json::to_string(line).unwrap_or_else(|err| {
        format!("{{\"event\":\"error\",\"message\":\"{err}\"}}")
    })
}

pub(crate) fn render_plain_progress(event: &ProgressEvent) -> String {
    format!("[{:>3}%] {}", event.percent, event.message)
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    if style != OutputStyle::Rich {
        return message.to_string();
    }

    let badge = match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    };
    format!("{badge} {message}")
}

pub(crate) fn outcome_status(outcome: Option<&JobOutcome>) -> (&'static str, String) {
    match outcome {
        None => ("info", "no update task supplied; nothing to do".to_string()),
        Some(JobOutcome::Completed) => ("ok", "update applied".to_string()),
        Some(JobOutcome::Cancelled) => ("warn", "update cancelled".to_string()),
        Some(JobOutcome::Failed(reason)) => ("err", format!("update failed: {reason}")),
    }
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    current: u8,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalProgress {
    pub(crate) fn start(style: OutputStyle) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(100);
            if let Ok(bar_style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} [{bar:24.cyan/blue}] {pos:>3}% {wide_msg}",
            ) {
                progress_bar.set_style(bar_style.tick_chars(".:;* ").progress_chars("=>-"));
            }
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        Self {
            style,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn update(&mut self, event: &ProgressEvent) {
        self.current = event.percent.max(self.current);
        match (&self.progress_bar, self.style) {
            (Some(progress_bar), _) => {
                progress_bar.set_position(u64::from(self.current));
                progress_bar.set_message(event.message.clone());
            }
            (None, OutputStyle::Json) => println!("{}", render_json_progress(event)),
            (None, _) => println!("{}", render_plain_progress(event)),
        }
    }

    /// Runs `interaction` with the bar hidden so prompts are not overdrawn.
    pub(crate) fn suspend<T>(&self, interaction: impl FnOnce() -> T) -> T {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.suspend(interaction),
            None => interaction(),
        }
    }

    pub(crate) fn finish(mut self, outcome: Option<&JobOutcome>) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
            if matches!(outcome, Some(JobOutcome::Completed)) {
                println!(
                    "{}",
                    render_progress_line(self.current, Some(self.started_at.elapsed()))
                );
            }
        }

        if self.style == OutputStyle::Json {
            println!("{}", render_json_finished(outcome));
            return;
        }
        let (status, message) = outcome_status(outcome);
        println!("{}", render_status_line(self.style, status, &message));
    }
}

pub(crate) fn render_progress_line(percent: u8, elapsed: Option<Duration>) -> String {
    let width = 18_usize;
    let bounded = usize::from(percent.min(100));
    let filled = (bounded * width) / 100;
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    format!(
        "{} [{}] {:>3}%{}",
        colorize(progress_label_style(), "update"),
        colorize(progress_bar_style(), &bar),
        bounded,
        suffix
    )
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
