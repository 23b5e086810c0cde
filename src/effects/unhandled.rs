//! Terminal hook for triggers the resolver could not handle.

use super::action::contain_panics;
use crate::core::{State, Trigger};
use crate::error::BoxError;
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type UnhandledFuture = BoxFuture<'static, Result<(), BoxError>>;

type UnhandledFn<S, T> = Arc<dyn Fn(&S, &T, &[String]) -> UnhandledFuture + Send + Sync>;

/// Replaces the default "invalid transition" failure.
///
/// The handler receives the current state, the trigger and the descriptions
/// of every guard that blocked it. Returning `Ok` makes the fire succeed
/// without a transition; returning an error fails the fire with an action
/// failure in the unhandled-trigger phase. The handler is invoked once per
/// unresolved fire and never retried.
///
/// # Example
///
/// ```rust
/// use statecraft::effects::UnhandledTriggerAction;
///
/// let ignore: UnhandledTriggerAction<&str, &str> =
///     UnhandledTriggerAction::new("log and ignore", |state, trigger, unmet| {
///         eprintln!("{trigger} ignored in {state} ({} unmet guards)", unmet.len());
///     });
/// assert_eq!(ignore.description(), "log and ignore");
/// ```
pub struct UnhandledTriggerAction<S, T> {
    description: String,
    action: UnhandledFn<S, T>,
}

impl<S: State, T: Trigger> UnhandledTriggerAction<S, T> {
    pub fn new<F>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&S, &T, &[String]) + Send + Sync + 'static,
    {
        Self::fallible(description, move |state, trigger, unmet| {
            action(state, trigger, unmet);
            Ok(())
        })
    }

    pub fn fallible<F>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&S, &T, &[String]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            action: Arc::new(move |state: &S, trigger: &T, unmet: &[String]| {
                future::ready(action(state, trigger, unmet)).boxed()
            }),
        }
    }

    pub fn from_async<F, Fut>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&S, &T, &[String]) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            description: description.into(),
            action: Arc::new(move |state: &S, trigger: &T, unmet: &[String]| {
                action(state, trigger, unmet).boxed()
            }),
        }
    }
}

impl<S, T> UnhandledTriggerAction<S, T> {
    /// Invoke the handler. Panics surface as errors of the returned future.
    pub fn execute(&self, state: &S, trigger: &T, unmet_guards: &[String]) -> UnhandledFuture {
        contain_panics(|| (self.action)(state, trigger, unmet_guards))
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl<S, T> Clone for UnhandledTriggerAction<S, T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

impl<S, T> fmt::Debug for UnhandledTriggerAction<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnhandledTriggerAction")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
