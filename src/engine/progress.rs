use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::models::run_config::Termination;

/// 终端进度条，关闭时使用隐藏的进度条
pub struct RunProgress {
    bar: ProgressBar,
    termination: Termination,
    start: Instant,
}

impl RunProgress {
    pub fn new(termination: Termination, enabled: bool) -> Self {
        let bar = if !enabled {
            ProgressBar::hidden()
        } else {
            match termination {
                Termination::Counted { expected } => {
                    let bar = ProgressBar::new(expected);
                    set_template(&bar, "{elapsed_precise} [{bar:40}] {pos}/{len} requests");
                    bar
                }
                Termination::Timed(limit) => {
                    let bar = ProgressBar::new(limit.as_secs().max(1));
                    set_template(&bar, "{elapsed_precise} [{bar:40}] {pos}/{len}s");
                    bar
                }
                Termination::Unbounded => {
                    let bar = ProgressBar::new_spinner();
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar
                }
            }
        };
        RunProgress {
            bar,
            termination,
            start: Instant::now(),
        }
    }

    pub fn hidden() -> Self {
        RunProgress::new(Termination::Unbounded, false)
    }

    pub fn on_result(&self, total: u64) {
        match self.termination {
            Termination::Counted { .. } => self.bar.set_position(total),
            Termination::Unbounded => self.bar.set_message(format!("{} requests", total)),
            Termination::Timed(_) => {}
        }
    }

    pub fn on_tick(&self) {
        if let Termination::Timed(_) = self.termination {
            self.bar.set_position(self.start.elapsed().as_secs());
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn set_template(bar: &ProgressBar, template: &str) {
    match ProgressStyle::with_template(template) {
        Ok(style) => bar.set_style(style.progress_chars("=>-")),
        Err(e) => tracing::debug!(error = %e, "invalid progress template"),
    }
}
