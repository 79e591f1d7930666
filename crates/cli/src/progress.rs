use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use restsum_dispatch::ProgressFn;
use restsum_protocol::{SummaryResult, SummaryStatus};
use std::sync::Arc;

/// Progress bar on stderr; hidden in quiet mode.
pub(crate) struct SummaryProgress {
    bar: ProgressBar,
}

impl SummaryProgress {
    pub(crate) fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr())
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message("summarizing");
        Self { bar }
    }

    /// Callback advancing the bar once per finished endpoint.
    pub(crate) fn callback(&self) -> ProgressFn {
        let bar = self.bar.clone();
        Arc::new(move |result: &SummaryResult| {
            if result.status == SummaryStatus::Failed {
                bar.set_message("summarizing (with failures)");
            }
            bar.inc(1);
        })
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
