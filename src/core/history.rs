//! State transition history tracking.
//!
//! Every transition that completes its action chain is appended to the
//! machine's history, giving an auditable, ordered log per instance.

use super::state::{State, Trigger};
use super::transition::Transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single completed transition.
///
/// # Example
///
/// ```rust
/// use statecraft::core::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     source: "Idle",
///     destination: "Running",
///     trigger: "start",
///     timestamp: Utc::now(),
///     reentry: false,
/// };
/// assert!(!record.is_stay());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord<S, T> {
    /// The state being transitioned from
    pub source: S,
    /// The state being transitioned to
    pub destination: S,
    /// The trigger that was fired
    pub trigger: T,
    /// When the action chain completed
    pub timestamp: DateTime<Utc>,
    /// Whether the transition came from a reentry permit
    pub reentry: bool,
}

impl<S: State, T: Trigger> TransitionRecord<S, T> {
    pub(crate) fn completed<A>(transition: &Transition<S, T, A>) -> Self {
        Self {
            source: transition.source.clone(),
            destination: transition.destination.clone(),
            trigger: transition.trigger.clone(),
            timestamp: Utc::now(),
            reentry: transition.is_reentry(),
        }
    }

    pub fn is_stay(&self) -> bool {
        self.source == self.destination
    }
}

/// Ordered history of completed transitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory<S, T> {
    transitions: Vec<TransitionRecord<S, T>>,
}

impl<S, T> Default for StateHistory<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T> StateHistory<S, T> {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Append a record.
    pub fn record(&mut self, transition: TransitionRecord<S, T>) {
        self.transitions.push(transition);
    }

    /// Get the path of states traversed.
    ///
    /// Returns references to states in order: the first source state, then
    /// the destination of each transition.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statecraft::core::{StateHistory, TransitionRecord};
    /// use chrono::Utc;
    ///
    /// let mut history = StateHistory::new();
    /// for (source, destination) in [("One", "Two"), ("Two", "Three")] {
    ///     history.record(TransitionRecord {
    ///         source,
    ///         destination,
    ///         trigger: "next",
    ///         timestamp: Utc::now(),
    ///         reentry: false,
    ///     });
    /// }
    ///
    /// assert_eq!(history.get_path(), vec![&"One", &"Two", &"Three"]);
    /// ```
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.source);
        }
        for transition in &self.transitions {
            path.push(&transition.destination);
        }
        path
    }

    /// Calculate total duration from first to last transition.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn transitions(&self) -> &[TransitionRecord<S, T>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
