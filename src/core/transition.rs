//! The runtime transition value handed to actions.

use super::state::{State, Trigger};
use std::fmt;
use std::sync::Arc;

/// A resolved transition, built once per fire and never stored.
///
/// For a stay transition `source` and `destination` are the same state.
/// Arguments are shared so that cloning a transition into an async action
/// is cheap.
pub struct Transition<S, T, A> {
    /// The state the machine was in when the trigger fired
    pub source: S,
    /// The state the machine ends up in
    pub destination: S,
    /// The trigger that caused the transition
    pub trigger: T,
    /// Arguments supplied with the trigger
    pub args: Arc<A>,
    reentry: bool,
}

impl<S: State, T: Trigger, A> Transition<S, T, A> {
    pub(crate) fn new(source: S, destination: S, trigger: T, args: Arc<A>, reentry: bool) -> Self {
        Self {
            source,
            destination,
            trigger,
            args,
            reentry,
        }
    }

    /// True when the transition came from a reentry or internal permit.
    pub fn is_reentry(&self) -> bool {
        self.reentry
    }

    /// True when the machine stays in the same state.
    pub fn is_stay(&self) -> bool {
        self.source == self.destination
    }
}

impl<S: Clone, T: Clone, A> Clone for Transition<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            destination: self.destination.clone(),
            trigger: self.trigger.clone(),
            args: Arc::clone(&self.args),
            reentry: self.reentry,
        }
    }
}

impl<S: fmt::Debug, T: fmt::Debug, A> fmt::Debug for Transition<S, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("trigger", &self.trigger)
            .field("reentry", &self.reentry)
            .finish_non_exhaustive()
    }
}
