//! Terminal progress for long-running pipeline runs.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use modforge::hash::ProgressCallback;
use modforge::pipeline::StateCallback;
use modforge::ModState;

const TEMPLATE: &str =
    "  {spinner:.blue} {wide_msg} [{bar:30.white/dim}] {bytes}/{total_bytes} {bytes_per_sec}";

/// One bar reused for every mod: transfers and hashing move it, state
/// changes relabel it.
pub struct PipelineProgress {
    bar: ProgressBar,
}

impl PipelineProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    pub fn bytes(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Arc::new(move |done: u64, total: u64| {
            if bar.length() != Some(total) {
                bar.set_length(total);
            }
            bar.set_position(done);
        })
    }

    pub fn states(&self) -> StateCallback {
        let bar = self.bar.clone();
        Box::new(move |name: &str, state: ModState| match state {
            ModState::Bound => {
                bar.reset();
                bar.set_message(name.to_string());
            }
            ModState::Failed => bar.println(format!("  failed: {}", name)),
            _ => bar.set_message(format!("{} ({})", name, state.name().to_lowercase())),
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
