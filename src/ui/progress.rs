use crate::stream::StreamState;
use crate::ui::icons::{CHECK, CROSS, ROTATE, SCROLL};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

/// Terminal UI for `mission-control logs`.
///
/// Log text goes to stdout unmodified; the spinner lives on stderr so piping
/// the output to a file captures only the log itself.
pub struct StreamUI {
    spinner: ProgressBar,
    target: String,
    bytes: u64,
}

impl StreamUI {
    /// Start the spinner for a stream of `target`. `hidden` suppresses it
    /// entirely (non-interactive use).
    pub fn new(target: &str, hidden: bool) -> Self {
        let spinner = if hidden {
            ProgressBar::hidden()
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} {prefix:.bold.dim} {msg}")
                    .expect("progress bar template is a valid static string"),
            );
            spinner
        };
        spinner.set_prefix(format!("{}Streaming", SCROLL));
        spinner.set_message(style(target).cyan().to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner,
            target: target.to_string(),
            bytes: 0,
        }
    }

    /// Print one chunk of log text without tearing the spinner line.
    pub fn print_chunk(&mut self, text: &str) {
        self.bytes += text.len() as u64;
        self.spinner.suspend(|| {
            let mut stdout = std::io::stdout().lock();
            // A closed stdout (e.g. `| head`) is not worth failing the stream over
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        });
        self.spinner.set_message(format!(
            "{} {}",
            style(&self.target).cyan(),
            style(format!("({})", format_bytes(self.bytes))).dim()
        ));
    }

    pub fn show_rotate_hint(&self, cols: u16) {
        self.spinner.suspend(|| {
            eprintln!(
                "{}{}",
                ROTATE,
                style(format!(
                    "Terminal is {} columns wide; widen it or rotate your device for readable logs",
                    cols
                ))
                .yellow()
            );
        });
    }

    /// Stop the spinner with the session's final state.
    pub fn finish(&self, state: &StreamState) {
        match state {
            StreamState::Success => self.spinner.finish_with_message(format!(
                "{}{} {}",
                CHECK,
                style("Stream complete").green(),
                style(format!("({})", format_bytes(self.bytes))).dim()
            )),
            StreamState::Error { message } => self
                .spinner
                .finish_with_message(format!("{}{}", CROSS, style(message).red().bold())),
            StreamState::Idle | StreamState::Loading => self.spinner.finish_and_clear(),
        }
    }
}

/// Human-readable byte count, e.g. `512 B`, `1.5 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
