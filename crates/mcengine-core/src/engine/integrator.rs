use super::SimRng;
use super::config::{ConfigError, MoveConfig};
use super::error::EngineError;
use super::events::{TrialEvent, TrialEventBus, TrialEventKind, TrialListener};
use super::manager::MoveManager;
use super::moves::{Commit, Move};
use super::progress::{Progress, ProgressReporter, SamplerSnapshot};
use crate::core::models::ids::MoveId;
use crate::core::models::system::System;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

/// Steps between two progress reports in [`IntegratorMc::run`].
pub const PROGRESS_INTERVAL: u64 = 1_000;

/// Work performed by the integrator every `interval()` steps.
pub trait StepAction: fmt::Debug {
    fn name(&self) -> &str;

    fn interval(&self) -> u64;

    fn perform(
        &mut self,
        step: u64,
        system: &System,
        manager: &mut MoveManager,
    ) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The selected move had nothing legal to propose.
    Failed,
    Accepted,
    Rejected,
    /// The Metropolis test accepted, but the move refused to commit.
    ForcedReject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepTally {
    pub accepted: u64,
    pub rejected: u64,
    pub forced_rejects: u64,
    pub failed: u64,
}

impl StepTally {
    pub fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Failed => self.failed += 1,
            StepOutcome::Accepted => self.accepted += 1,
            StepOutcome::Rejected => self.rejected += 1,
            StepOutcome::ForcedReject => self.forced_rejects += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.accepted + self.rejected + self.forced_rejects + self.failed
    }
}

/// `min(1, a * exp(b / temperature))`.
///
/// Zero when `a` is zero or `b` is negative infinity, whatever the other factor.
/// A NaN product is returned unchanged so the caller can see it.
pub fn acceptance_probability(a: f64, b: f64, temperature: f64) -> f64 {
    if a == 0.0 || b == f64::NEG_INFINITY {
        return 0.0;
    }
    let chi = a * (b / temperature).exp();
    if chi >= 1.0 { 1.0 } else { chi }
}

/// Synchronous Metropolis Monte Carlo driver.
///
/// Each step selects one move, resolves its trial completely and notifies
/// listeners before the next step begins. Step actions run after the step
/// whose count is a multiple of their interval.
pub struct IntegratorMc {
    system: System,
    manager: MoveManager,
    rng: SimRng,
    temperature: f64,
    events: TrialEventBus,
    actions: Vec<Box<dyn StepAction>>,
    step_count: u64,
    nan_rejections: u64,
}

impl IntegratorMc {
    pub fn new(
        system: System,
        manager: MoveManager,
        temperature: f64,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "temperature",
                reason: format!("must be finite and positive, got {}", temperature),
            });
        }
        Ok(Self {
            system,
            manager,
            rng: SimRng::seed_from_u64(seed),
            temperature,
            events: TrialEventBus::new(),
            actions: Vec::new(),
            step_count: 0,
            nan_rejections: 0,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    pub fn manager(&self) -> &MoveManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut MoveManager {
        &mut self.manager
    }

    /// Registers a move with the manager, using the integrator's system for the
    /// per-particle weight.
    pub fn add_move(&mut self, mv: impl Move + 'static, config: MoveConfig) -> MoveId {
        self.manager.add_move(mv, config, &self.system)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Trials rejected because their acceptance probability was NaN.
    pub fn nan_rejections(&self) -> u64 {
        self.nan_rejections
    }

    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn TrialListener>>) {
        self.events.subscribe(listener);
    }

    pub fn add_action(&mut self, action: impl StepAction + 'static) {
        self.actions.push(Box::new(action));
    }

    pub fn set_equilibrating(&mut self, equilibrating: bool) {
        self.manager.set_equilibrating(equilibrating);
    }

    /// Runs one Monte Carlo step.
    ///
    /// # Errors
    ///
    /// Propagates selection errors, move errors (including fatal inconsistencies
    /// of multi-box moves) and step-action errors. The step counter is not
    /// advanced when an error interrupts the trial.
    pub fn do_step(&mut self) -> Result<StepOutcome, EngineError> {
        let move_id = self.manager.select_move(&self.system, &mut self.rng)?;
        let temperature = self.temperature;
        let mv = self
            .manager
            .get_mut(move_id)
            .ok_or(EngineError::MoveNotFound(move_id))?;

        if !mv.do_trial(&mut self.system, &mut self.rng)? {
            self.events.publish(&TrialEvent {
                move_id,
                mcmove: &*mv,
                system: &self.system,
                temperature,
                kind: TrialEventKind::Failed,
            });
            trace!(mcmove = mv.name(), "Trial failed");
            self.finish_step()?;
            return Ok(StepOutcome::Failed);
        }

        let b = mv.b(&self.system)?;
        let a = mv.a();
        self.events.publish(&TrialEvent {
            move_id,
            mcmove: &*mv,
            system: &self.system,
            temperature,
            kind: TrialEventKind::Initiated { a, b },
        });

        let chi = acceptance_probability(a, b, temperature);
        let accepted = if chi.is_nan() {
            self.nan_rejections += 1;
            if self.nan_rejections == 1 {
                warn!(
                    mcmove = mv.name(),
                    a,
                    b,
                    "NaN acceptance probability; rejecting trial (repeats are logged at debug level)"
                );
            } else {
                debug!(mcmove = mv.name(), a, b, count = self.nan_rejections, "NaN acceptance probability");
            }
            false
        } else {
            chi >= 1.0 || self.rng.r#gen::<f64>() < chi
        };
        mv.tracker_mut()
            .update_counts(accepted, if chi.is_nan() { 0.0 } else { chi });

        let outcome = if accepted {
            match mv.accept_notify(&mut self.system)? {
                Commit::Applied => StepOutcome::Accepted,
                Commit::ForcedReject => StepOutcome::ForcedReject,
            }
        } else {
            mv.reject_notify(&mut self.system)?;
            StepOutcome::Rejected
        };

        self.events.publish(&TrialEvent {
            move_id,
            mcmove: &*mv,
            system: &self.system,
            temperature,
            kind: TrialEventKind::Completed {
                accepted: outcome == StepOutcome::Accepted,
            },
        });
        trace!(mcmove = mv.name(), chi, ?outcome, "Trial resolved");

        self.finish_step()?;
        Ok(outcome)
    }

    fn finish_step(&mut self) -> Result<(), EngineError> {
        self.step_count += 1;
        for action in &mut self.actions {
            let interval = action.interval();
            if interval > 0 && self.step_count % interval == 0 {
                trace!(action = action.name(), step = self.step_count, "Running step action");
                action.perform(self.step_count, &self.system, &mut self.manager)?;
            }
        }
        Ok(())
    }

    /// Runs `steps` steps, calling `observe` after each one.
    #[instrument(skip_all, name = "mc_run", fields(steps = steps))]
    pub fn run(
        &mut self,
        steps: u64,
        reporter: &ProgressReporter,
        mut observe: impl FnMut(StepOutcome, &System),
    ) -> Result<StepTally, EngineError> {
        reporter.report(Progress::TaskStart { total_steps: steps });
        let mut tally = StepTally::default();
        let mut reported = tally;
        for done in 1..=steps {
            let outcome = self.do_step()?;
            tally.record(outcome);
            observe(outcome, &self.system);
            if done % PROGRESS_INTERVAL == 0 {
                self.report_advance(reporter, PROGRESS_INTERVAL, &reported, &tally);
                reported = tally;
            }
        }
        let remainder = steps % PROGRESS_INTERVAL;
        if remainder > 0 {
            self.report_advance(reporter, remainder, &reported, &tally);
        }
        reporter.report(Progress::TaskFinish);
        Ok(tally)
    }

    fn report_advance(
        &self,
        reporter: &ProgressReporter,
        steps: u64,
        since: &StepTally,
        now: &StepTally,
    ) {
        reporter.report(Progress::TaskAdvance(steps));
        let accepted = now.accepted - since.accepted;
        let resolved = accepted + (now.rejected - since.rejected)
            + (now.forced_rejects - since.forced_rejects);
        let (particles, energy) = self
            .system
            .boxes_iter()
            .fold((0, 0.0), |(n, u), (_, sim_box)| (n + sim_box.len(), u + sim_box.energy()));
        reporter.report(Progress::Snapshot(SamplerSnapshot {
            particles,
            energy,
            acceptance: (resolved > 0).then(|| accepted as f64 / resolved as f64),
        }));
    }
}

impl fmt::Debug for IntegratorMc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegratorMc")
            .field("temperature", &self.temperature)
            .field("step_count", &self.step_count)
            .field("nan_rejections", &self.nan_rejections)
            .field("moves", &self.manager.len())
            .field("listeners", &self.events.len())
            .field("actions", &self.actions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::{EnergyTarget, IdealGas, LennardJones};
    use crate::engine::config::{ParticleWindow, StepSizeConfig};
    use crate::engine::moves::biased::BiasedInsertDeleteMove;
    use crate::engine::moves::displacement::DisplacementMove;
    use crate::engine::moves::insert_delete::InsertDeleteMove;
    use crate::engine::moves::testing::lattice_system;

    #[test]
    fn acceptance_probability_handles_degenerate_factors() {
        assert_eq!(acceptance_probability(0.0, f64::INFINITY, 1.0), 0.0);
        assert_eq!(acceptance_probability(f64::INFINITY, f64::NEG_INFINITY, 1.0), 0.0);
        assert_eq!(acceptance_probability(2.0, 0.0, 1.0), 1.0);
        assert!((acceptance_probability(0.5, -1.0, 2.0) - 0.5 * (-0.5f64).exp()).abs() < 1e-15);
        assert!(acceptance_probability(f64::NAN, 0.0, 1.0).is_nan());
    }

    #[test]
    fn every_step_is_published_and_counted() {
        let (system, box_id) = lattice_system(LennardJones::new(1.0, 1.0, 2.5), 20, 6.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, 7).unwrap();
        let id = integrator.add_move(InsertDeleteMove::new(box_id, -1.0), MoveConfig::new(1));

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        integrator.subscribe(Rc::new(RefCell::new(move |event: &TrialEvent<'_>| {
            sink.borrow_mut().push(event.kind);
        })));

        let tally = integrator.run(500, &ProgressReporter::new(), |_, _| {}).unwrap();
        assert_eq!(tally.total(), 500);
        assert_eq!(integrator.step_count(), 500);

        let events = events.borrow();
        let initiated = events
            .iter()
            .filter(|k| matches!(k, TrialEventKind::Initiated { .. }))
            .count() as u64;
        let completed = events
            .iter()
            .filter(|k| matches!(k, TrialEventKind::Completed { .. }))
            .count() as u64;
        let failed = events
            .iter()
            .filter(|k| matches!(k, TrialEventKind::Failed))
            .count() as u64;
        assert_eq!(initiated, completed);
        assert_eq!(failed, tally.failed);
        let tracker = integrator.manager().get(id).unwrap().tracker();
        assert_eq!(tracker.n_trials(), initiated);
        assert_eq!(tracker.n_accept(), tally.accepted);
    }

    #[test]
    fn bookkeeping_energy_tracks_exact_energy() {
        let (system, box_id) = lattice_system(LennardJones::new(1.0, 1.0, 2.5), 30, 6.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.5, 11).unwrap();
        integrator.add_move(
            DisplacementMove::new(box_id, &StepSizeConfig::bounded(0.3, 0.0, 2.0)).unwrap(),
            MoveConfig::per_particle(1),
        );
        integrator.add_move(InsertDeleteMove::new(box_id, -2.0), MoveConfig::new(20));
        integrator.run(2_000, &ProgressReporter::new(), |_, _| {}).unwrap();

        let system = integrator.system();
        let exact = system.scalar_energy(box_id, EnergyTarget::All).unwrap();
        let bookkept = system.sim_box(box_id).unwrap().energy();
        assert!((exact - bookkept).abs() < 1e-6 * exact.abs().max(1.0));
    }

    #[test]
    fn biased_walk_never_leaves_window() {
        let (system, box_id) = lattice_system(IdealGas, 50, 10.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, 13).unwrap();
        let window = ParticleWindow::new(50, 5);
        integrator.add_move(
            BiasedInsertDeleteMove::new(box_id, -2.0, 1.0, window),
            MoveConfig::new(1),
        );

        let mut forced = 0;
        let tally = integrator
            .run(10_000, &ProgressReporter::new(), |outcome, system| {
                let n = system.sim_box(box_id).unwrap().len();
                assert!((45..=55).contains(&n), "particle count {n} left the window");
                if outcome == StepOutcome::ForcedReject {
                    forced += 1;
                }
            })
            .unwrap();
        assert_eq!(tally.forced_rejects, forced);
    }

    #[test]
    fn forced_rejection_counts_as_accepted_but_publishes_rejection() {
        let (system, box_id) = lattice_system(IdealGas, 5, 5.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, 17).unwrap();
        // Both neighbours of N = 5 carry a huge bias, so every trial passes the Metropolis test.
        let mut mv = BiasedInsertDeleteMove::new(box_id, 0.0, 1.0, ParticleWindow::new(5, 0));
        mv.set_ln_bias(6, 50.0);
        mv.set_ln_bias(4, 50.0);
        assert_eq!(mv.ln_bias(5), 0.0);
        let id = integrator.add_move(mv, MoveConfig::new(1));

        let completions = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&completions);
        integrator.subscribe(Rc::new(RefCell::new(move |event: &TrialEvent<'_>| {
            if let TrialEventKind::Completed { accepted } = event.kind {
                sink.borrow_mut().push(accepted);
            }
        })));

        for _ in 0..20 {
            assert_eq!(integrator.do_step().unwrap(), StepOutcome::ForcedReject);
        }
        assert!(completions.borrow().iter().all(|&accepted| !accepted));
        let tracker = integrator.manager().get(id).unwrap().tracker();
        assert_eq!(tracker.n_accept(), 20);
        assert_eq!(integrator.system().sim_box(box_id).unwrap().len(), 5);
    }

    #[test]
    fn nan_acceptance_rejects_and_is_counted() {
        let (system, box_id) = lattice_system(IdealGas, 5, 5.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, 29).unwrap();
        let mut mv = BiasedInsertDeleteMove::new(box_id, 0.0, 1.0, ParticleWindow::new(5, 3));
        mv.set_ln_bias(6, f64::NAN);
        integrator.add_move(mv, MoveConfig::new(1));

        let nan_trials = Rc::new(RefCell::new(0u64));
        let sink = Rc::clone(&nan_trials);
        integrator.subscribe(Rc::new(RefCell::new(move |event: &TrialEvent<'_>| {
            if let TrialEventKind::Initiated { a, .. } = event.kind {
                if a.is_nan() {
                    *sink.borrow_mut() += 1;
                }
            }
        })));

        integrator.run(200, &ProgressReporter::new(), |_, _| {}).unwrap();
        assert!(*nan_trials.borrow() > 0);
        assert_eq!(integrator.nan_rejections(), *nan_trials.borrow());
        assert!(integrator.system().sim_box(box_id).unwrap().len() <= 5);
    }

    #[test]
    fn progress_snapshots_follow_each_advance() {
        use std::sync::{Arc, Mutex};

        let (system, box_id) = lattice_system(IdealGas, 8, 5.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, 31).unwrap();
        integrator.add_move(InsertDeleteMove::new(box_id, 0.0), MoveConfig::new(1));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));
        integrator.run(2_500, &reporter, |_, _| {}).unwrap();

        let events = events.lock().unwrap();
        let snapshots: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Progress::Snapshot(snapshot) => Some(*snapshot),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 3);
        for pair in events.windows(2) {
            if let Progress::Snapshot(_) = pair[1] {
                assert!(matches!(pair[0], Progress::TaskAdvance(_)));
            }
        }
        let last = snapshots[2];
        assert_eq!(last.particles, integrator.system().sim_box(box_id).unwrap().len());
        assert_eq!(last.energy, 0.0);
        let acceptance = last.acceptance.unwrap();
        assert!((0.0..=1.0).contains(&acceptance));
    }

    #[derive(Debug, Default)]
    struct CountingAction {
        steps: Rc<RefCell<Vec<u64>>>,
    }

    impl StepAction for CountingAction {
        fn name(&self) -> &str {
            "counting"
        }

        fn interval(&self) -> u64 {
            25
        }

        fn perform(
            &mut self,
            step: u64,
            _system: &System,
            _manager: &mut MoveManager,
        ) -> Result<(), EngineError> {
            self.steps.borrow_mut().push(step);
            Ok(())
        }
    }

    #[test]
    fn step_actions_run_on_their_interval() {
        let (system, box_id) = lattice_system(IdealGas, 5, 5.0);
        let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, 19).unwrap();
        integrator.add_move(InsertDeleteMove::new(box_id, 0.0), MoveConfig::new(1));
        let action = CountingAction::default();
        let steps = Rc::clone(&action.steps);
        integrator.add_action(action);
        integrator.run(100, &ProgressReporter::new(), |_, _| {}).unwrap();
        assert_eq!(*steps.borrow(), vec![25, 50, 75, 100]);
    }

    #[test]
    fn non_positive_temperature_is_rejected() {
        let (system, _) = lattice_system(IdealGas, 1, 5.0);
        assert!(IntegratorMc::new(system, MoveManager::new(), 0.0, 1).is_err());
    }

    #[test]
    fn fixed_seed_reproduces_the_trajectory() {
        let trajectory = |seed| {
            let (system, box_id) = lattice_system(LennardJones::new(1.0, 1.0, 2.5), 10, 5.0);
            let mut integrator = IntegratorMc::new(system, MoveManager::new(), 1.0, seed).unwrap();
            integrator.add_move(
                DisplacementMove::new(box_id, &StepSizeConfig::bounded(0.4, 0.0, 2.0)).unwrap(),
                MoveConfig::new(3),
            );
            integrator.add_move(InsertDeleteMove::new(box_id, -1.0), MoveConfig::new(1));
            integrator.run(300, &ProgressReporter::new(), |_, _| {}).unwrap();
            integrator.system().sim_box(box_id).unwrap().snapshot()
        };
        assert_eq!(trajectory(23), trajectory(23));
    }
}
