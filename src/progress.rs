//! Progress bar for batch runs.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use paperfetch_core::download::{DownloadResult, ProgressHook};

/// Whether a progress bar should be drawn.
pub(crate) fn should_show_progress(stderr_is_terminal: bool, quiet: bool) -> bool {
    stderr_is_terminal && !quiet && std::env::var("TERM").map_or(true, |term| term != "dumb")
}

/// Bar sized to the batch; hidden when `visible` is false.
pub(crate) fn batch_progress(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn progress_message(result: &DownloadResult) -> String {
    match &result.provider {
        Some(provider) => format!("{} via {provider}", result.doi),
        None => format!("{} failed", result.doi),
    }
}

/// Engine hook that advances `bar` once per finished DOI.
pub(crate) fn progress_hook(bar: ProgressBar) -> ProgressHook {
    Arc::new(move |result: &DownloadResult| {
        bar.set_message(progress_message(result));
        bar.inc(1);
    })
}
