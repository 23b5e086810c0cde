//! Guard predicates for controlling state transitions.
//!
//! Guards are boolean functions over the trigger arguments that determine
//! whether a permit can be taken. Each guard carries a description that is
//! reported when the guard blocks a trigger.

use crate::error::{panic_error, BoxError};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type GuardPredicate<A> = Arc<dyn Fn(&A) -> Result<bool, BoxError> + Send + Sync>;

/// Predicate that determines if a permit can be taken.
///
/// Guards are expected to be free of side effects; the machine may evaluate
/// them more than once per fire (for example from [`can_fire`]). They run
/// while the machine's configuration is locked for reading, so a guard must
/// not reconfigure the machine it guards. Once the machine has started,
/// such a call fails with `MachineStarted`.
///
/// [`can_fire`]: crate::StateMachine::can_fire
///
/// # Example
///
/// ```rust
/// use statecraft::core::Guard;
///
/// let has_budget = Guard::new("has budget", |amount: &u32| *amount <= 100);
///
/// assert!(has_budget.check(&40).unwrap());
/// assert!(!has_budget.check(&400).unwrap());
/// assert_eq!(has_budget.description(), "has budget");
/// ```
pub struct Guard<A> {
    description: String,
    predicate: GuardPredicate<A>,
}

impl<A> Guard<A> {
    /// Create a guard from an infallible predicate.
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(move |args| Ok(predicate(args))),
        }
    }

    /// Create a guard whose predicate can fail.
    ///
    /// An error aborts the fire with an action failure instead of being
    /// treated as an unmet guard.
    pub fn fallible<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&A) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the predicate against the trigger arguments. A panicking
    /// predicate is reported as an error.
    pub fn check(&self, args: &A) -> Result<bool, BoxError> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.predicate)(args)))
            .unwrap_or_else(|payload| Err(panic_error(payload)))
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl<A> Clone for Guard<A> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<A> fmt::Debug for Guard<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
