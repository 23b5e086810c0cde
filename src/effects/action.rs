//! Entry, exit and transition action bindings.
//!
//! Every callback is stored behind one capability: invoke it with the
//! transition and await the returned future. Synchronous callbacks are
//! wrapped in an already-completed future, so the executor never needs to
//! know which kind it is running.

use crate::core::{State, Transition, Trigger};
use crate::error::{panic_error, BoxError};
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Future returned by every action binding.
pub type ActionFuture = BoxFuture<'static, Result<(), BoxError>>;

type ActionFn<S, T, A> = Arc<dyn Fn(&Transition<S, T, A>) -> ActionFuture + Send + Sync>;

/// A described callback run while entering or leaving states.
///
/// # Example
///
/// ```rust
/// use statecraft::effects::ActionBehaviour;
///
/// let log_exit: ActionBehaviour<&str, &str> =
///     ActionBehaviour::new("log exit", |t| println!("leaving {:?}", t.source));
///
/// let notify: ActionBehaviour<&str, &str> =
///     ActionBehaviour::from_async("notify", |t| {
///         let destination = t.destination;
///         async move {
///             println!("arrived in {destination}");
///             Ok(())
///         }
///     });
///
/// assert_eq!(log_exit.description(), "log exit");
/// assert_eq!(notify.description(), "notify");
/// ```
pub struct ActionBehaviour<S, T, A = ()> {
    description: String,
    action: ActionFn<S, T, A>,
}

impl<S: State, T: Trigger, A: Send + Sync + 'static> ActionBehaviour<S, T, A> {
    /// Wrap a synchronous callback that cannot fail.
    pub fn new<F>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Transition<S, T, A>) + Send + Sync + 'static,
    {
        Self::fallible(description, move |transition| {
            action(transition);
            Ok(())
        })
    }

    /// Wrap a synchronous callback that may fail.
    pub fn fallible<F>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Transition<S, T, A>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            action: Arc::new(move |transition: &Transition<S, T, A>| {
                future::ready(action(transition)).boxed()
            }),
        }
    }

    /// Wrap a callback returning a future.
    ///
    /// The closure receives a borrowed transition; clone what the future
    /// needs before moving it into the async block.
    pub fn from_async<F, Fut>(description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Transition<S, T, A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            description: description.into(),
            action: Arc::new(move |transition: &Transition<S, T, A>| action(transition).boxed()),
        }
    }
}

impl<S, T, A> ActionBehaviour<S, T, A> {
    /// Invoke the callback. The returned future must be awaited before the
    /// next binding in the chain starts.
    ///
    /// A panic, whether raised while starting the callback or while polling
    /// its future, is reported as an error of the returned future.
    pub fn execute(&self, transition: &Transition<S, T, A>) -> ActionFuture {
        contain_panics(|| (self.action)(transition))
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl<S, T, A> Clone for ActionBehaviour<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

impl<S, T, A> fmt::Debug for ActionBehaviour<S, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBehaviour")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Start a callback future, turning panics into errors.
pub(crate) fn contain_panics<F>(start: F) -> BoxFuture<'static, Result<(), BoxError>>
where
    F: FnOnce() -> BoxFuture<'static, Result<(), BoxError>>,
{
    match panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(running) => AssertUnwindSafe(running)
            .catch_unwind()
            .map(|outcome| outcome.unwrap_or_else(|payload| Err(panic_error(payload))))
            .boxed(),
        Err(payload) => future::ready(Err(panic_error(payload))).boxed(),
    }
}

/// An entry binding, optionally restricted to a single trigger.
pub(crate) struct EntryAction<S, T, A> {
    pub(crate) behaviour: ActionBehaviour<S, T, A>,
    pub(crate) trigger: Option<T>,
}

impl<S, T: PartialEq, A> EntryAction<S, T, A> {
    pub(crate) fn applies_to(&self, trigger: &T) -> bool {
        match &self.trigger {
            Some(filter) => filter == trigger,
            None => true,
        }
    }
}

impl<S, T: Clone, A> Clone for EntryAction<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            behaviour: self.behaviour.clone(),
            trigger: self.trigger.clone(),
        }
    }
}
