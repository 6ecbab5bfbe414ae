/// Sampler state at a progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSnapshot {
    /// Particles summed over all boxes.
    pub particles: usize,
    /// Bookkeeping energy summed over all boxes.
    pub energy: f64,
    /// Fraction of resolved trials accepted since the previous report.
    pub acceptance: Option<f64>,
}

impl SamplerSnapshot {
    pub fn energy_per_particle(&self) -> Option<f64> {
        (self.particles > 0).then(|| self.energy / self.particles as f64)
    }
}

/// Coarse-grained progress notifications emitted by long-running workflows.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    /// The given number of Monte Carlo steps were completed.
    TaskAdvance(u64),
    /// Reported right after each `TaskAdvance`.
    Snapshot(SamplerSnapshot),
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
