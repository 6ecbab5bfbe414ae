use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use mcengine::engine::progress::{Progress, ProgressCallback, SamplerSnapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders workflow progress as a spinner during setup and as a step bar with
/// live sampler observables during the Monte Carlo phases.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

/// Bar message for a sampler snapshot, e.g. `N = 48 | U/N = -3.214 | acc = 0.42`.
pub fn snapshot_message(snapshot: &SamplerSnapshot) -> String {
    let mut parts = vec![format!("N = {}", snapshot.particles)];
    if let Some(u) = snapshot.energy_per_particle() {
        parts.push(format!("U/N = {:.3}", u));
    }
    if let Some(acceptance) = snapshot.acceptance {
        parts.push(format!("acc = {:.2}", acceptance));
    }
    parts.join(" | ")
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        pb.finish_and_clear();
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb = Arc::clone(&self.pb);
        Box::new(move |progress: Progress| match pb.lock() {
            Ok(pb) => apply(&pb, progress),
            Err(_) => warn!("Progress bar mutex was poisoned. Cannot update progress."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(pb: &ProgressBar, progress: Progress) {
    match progress {
        Progress::PhaseStart { name } => {
            pb.reset();
            pb.set_length(0);
            pb.set_style(spinner_style());
            pb.set_prefix(name);
            pb.set_message(name);
            pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        }
        Progress::TaskStart { total_steps } => {
            pb.disable_steady_tick();
            pb.reset();
            pb.set_length(total_steps);
            pb.set_message("");
            pb.set_style(steps_style());
        }
        Progress::TaskAdvance(steps) => pb.inc(steps),
        Progress::Snapshot(snapshot) => pb.set_message(snapshot_message(&snapshot)),
        Progress::TaskFinish => {
            if let Some(len) = pb.length() {
                pb.set_position(len);
            }
            pb.finish();
        }
        Progress::PhaseFinish => {
            pb.disable_steady_tick();
            let phase = pb.prefix();
            pb.finish_with_message(format!("✓ {} done", phase));
        }
        Progress::Message(msg) => pb.println(format!("  {}", msg)),
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn steps_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<13} [{bar:32.cyan/blue}] {human_pos}/{human_len} MC steps | {msg} ({per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ")
}
