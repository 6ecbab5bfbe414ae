use super::moves::Move;
use crate::core::models::ids::MoveId;
use crate::core::models::system::System;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

/// Stage of a trial's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialEventKind {
    /// The trial was proposed and evaluated; the acceptance test has not run yet.
    Initiated { a: f64, b: f64 },
    /// `do_trial` found nothing legal to propose.
    Failed,
    /// The trial was resolved. `accepted` is `false` for forced rejections.
    Completed { accepted: bool },
}

/// A lifecycle notification, borrowed from the integrator for the duration of
/// the callback.
#[derive(Debug, Clone, Copy)]
pub struct TrialEvent<'a> {
    pub move_id: MoveId,
    pub mcmove: &'a dyn Move,
    pub system: &'a System,
    pub temperature: f64,
    pub kind: TrialEventKind,
}

pub trait TrialListener {
    fn on_trial(&mut self, event: &TrialEvent<'_>);
}

impl<F> TrialListener for F
where
    F: FnMut(&TrialEvent<'_>),
{
    fn on_trial(&mut self, event: &TrialEvent<'_>) {
        self(event)
    }
}

/// Synchronous fan-out of trial events to registered listeners.
///
/// Listeners are shared handles so their owner can read accumulated state (for
/// example the overlap estimator) between steps. Delivery happens in
/// subscription order, inside the call that resolved the trial.
#[derive(Default)]
pub struct TrialEventBus {
    listeners: Vec<Rc<RefCell<dyn TrialListener>>>,
}

impl TrialEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn TrialListener>>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn publish(&self, event: &TrialEvent<'_>) {
        for listener in &self.listeners {
            match listener.try_borrow_mut() {
                Ok(mut listener) => listener.on_trial(event),
                Err(_) => warn!(
                    mcmove = event.mcmove.name(),
                    "Skipping a trial listener that is already borrowed"
                ),
            }
        }
    }
}

impl std::fmt::Debug for TrialEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialEventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
