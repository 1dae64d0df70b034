use colored::Colorize;
use craftfleet_cloud::{ProgressOutcome, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Terminal spinner for long-running cloud operations
#[derive(Default)]
pub struct SpinnerSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut bar) = self.bar.lock() {
            f(&mut bar);
        }
    }
}

impl ProgressSink for SpinnerSink {
    fn start(&self, message: &str) {
        self.with_bar(|bar| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb.set_message(message.to_string());
            *bar = Some(pb);
        });
    }

    fn update(&self, message: &str) {
        self.with_bar(|bar| match bar {
            Some(pb) => pb.set_message(message.to_string()),
            None => eprintln!("{}", message.dimmed()),
        });
    }

    fn stop(&self, outcome: &ProgressOutcome) {
        self.with_bar(|bar| {
            let line = match outcome {
                ProgressOutcome::Success(m) => format!("{} {}", "✓".green(), m),
                ProgressOutcome::Failure(m) => format!("{} {}", "✗".red(), m.red()),
            };
            match bar.take() {
                Some(pb) => pb.finish_with_message(line),
                None => eprintln!("{}", line),
            }
        });
    }
}
