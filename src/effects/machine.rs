//! The shared state machine handle.

use super::executor::TransitionPlan;
use super::queue::{DrainGuard, FireQueue, FireRequest};
use super::resolver::{self, Resolution};
use super::unhandled::UnhandledTriggerAction;
use crate::builder::{ConfigurationError, StateConfiguration};
use crate::core::{State, StateHistory, Transition, TransitionRecord, Trigger};
use crate::error::{ActionPhase, StateMachineError};
use crate::graph::StateGraph;
use crate::reflection::StateMachineInfo;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

tokio::task_local! {
    /// Machines whose drain task is running this code, directly or through
    /// a drain it started.
    static DRIVING: Vec<Uuid>;
}

type TransitionObserver<S, T, A> = Arc<dyn Fn(&Transition<S, T, A>) + Send + Sync>;

struct MachineInner<S, T, A> {
    id: Uuid,
    initial: S,
    current: Mutex<S>,
    graph: RwLock<StateGraph<S, T, A>>,
    unhandled: RwLock<Option<UnhandledTriggerAction<S, T>>>,
    observers: RwLock<Vec<TransitionObserver<S, T, A>>>,
    history: Mutex<StateHistory<S, T>>,
    queue: FireQueue<T, A>,
}

enum Step<S, T, A> {
    Run(TransitionPlan<S, T, A>),
    Ignored,
    Unhandled {
        state: S,
        trigger: T,
        unmet_guards: Vec<String>,
    },
}

/// A hierarchical state machine instance.
///
/// The handle is cheap to clone; clones share the same graph, current state
/// and fire queue. Configure states first, then fire triggers. The first
/// fire seals the graph.
///
/// # Example
///
/// ```rust
/// use statecraft::StateMachine;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let machine: StateMachine<&str, &str> = StateMachine::new("Idle");
/// machine.configure("Idle", |s| s.permit("start", "Running")).unwrap();
/// machine.configure("Running", |s| s.permit("stop", "Idle")).unwrap();
///
/// machine.fire("start").await.unwrap();
/// assert_eq!(machine.state(), "Running");
/// assert!(machine.fire("start").await.is_err());
/// # }
/// ```
pub struct StateMachine<S, T, A = ()> {
    inner: Arc<MachineInner<S, T, A>>,
}

impl<S, T, A> Clone for StateMachine<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State, T: Trigger, A: Send + Sync + 'static> StateMachine<S, T, A> {
    /// Create an unconfigured machine sitting in `initial`.
    pub fn new(initial: S) -> Self {
        Self::from_parts(StateGraph::with_state(initial.clone()), initial, None)
    }

    pub(crate) fn from_parts(
        graph: StateGraph<S, T, A>,
        initial: S,
        unhandled: Option<UnhandledTriggerAction<S, T>>,
    ) -> Self {
        Self {
            inner: Arc::new(MachineInner {
                id: Uuid::new_v4(),
                current: Mutex::new(initial.clone()),
                initial,
                graph: RwLock::new(graph),
                unhandled: RwLock::new(unhandled),
                observers: RwLock::new(Vec::new()),
                history: Mutex::new(StateHistory::new()),
                queue: FireQueue::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Declare behaviour for `state`.
    ///
    /// The declarations are applied all-or-nothing: if any of them is
    /// rejected the graph is left exactly as it was.
    pub fn configure<F>(&self, state: S, configure: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(StateConfiguration<S, T, A>) -> StateConfiguration<S, T, A>,
    {
        // Guards run under the read lock; refuse them before asking to write.
        if self.inner.graph.read().is_sealed() {
            return Err(ConfigurationError::MachineStarted);
        }
        let configuration = configure(StateConfiguration::new(state));

        let mut graph = self.inner.graph.write();
        if graph.is_sealed() {
            return Err(ConfigurationError::MachineStarted);
        }
        let mut staged = graph.clone();
        configuration.apply(&mut staged)?;
        *graph = staged;
        Ok(())
    }

    /// Replace the default failure for unresolved triggers.
    pub fn on_unhandled_trigger(
        &self,
        handler: UnhandledTriggerAction<S, T>,
    ) -> Result<(), ConfigurationError> {
        let graph = self.inner.graph.read();
        if graph.is_sealed() {
            return Err(ConfigurationError::MachineStarted);
        }
        *self.inner.unhandled.write() = Some(handler);
        Ok(())
    }

    /// Called after every transition whose action chain completed.
    pub fn on_transitioned<F>(&self, observer: F)
    where
        F: Fn(&Transition<S, T, A>) + Send + Sync + 'static,
    {
        self.inner.observers.write().push(Arc::new(observer));
    }

    pub fn state(&self) -> S {
        self.inner.current.lock().clone()
    }

    pub fn initial_state(&self) -> &S {
        &self.inner.initial
    }

    /// True when the current state is `state` or one of its substates.
    pub fn is_in_state(&self, state: &S) -> bool {
        let current = self.state();
        self.inner.graph.read().is_in_state(&current, state)
    }

    pub fn can_fire_with(&self, trigger: &T, args: &A) -> bool {
        let current = self.state();
        let graph = self.inner.graph.read();
        matches!(
            resolver::resolve(&graph, &current, trigger, args),
            Ok(Resolution::Handled { .. })
        )
    }

    pub fn permitted_triggers_with(&self, args: &A) -> Vec<T> {
        let current = self.state();
        resolver::permitted_triggers(&self.inner.graph.read(), &current, args)
    }

    /// Snapshot of every completed transition so far.
    pub fn history(&self) -> StateHistory<S, T> {
        self.inner.history.lock().clone()
    }

    /// True while a fire request is being processed.
    pub fn is_firing(&self) -> bool {
        self.inner.queue.is_firing()
    }

    /// Describe the configured graph and the current state.
    pub fn info(&self) -> StateMachineInfo {
        let current = self.state();
        StateMachineInfo::capture(&self.inner.graph.read(), &self.inner.initial, &current)
    }

    pub fn downgrade(&self) -> WeakStateMachine<S, T, A> {
        WeakStateMachine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Fire `trigger` with `args`.
    ///
    /// Requests are processed one at a time in arrival order by a task
    /// spawned onto the current Tokio runtime, so this must be called from
    /// within one. Dropping the returned future only stops waiting for the
    /// reply: an admitted request still runs its whole action chain, and
    /// requests queued behind it are unaffected.
    ///
    /// Called from inside one of this machine's own actions, the request is
    /// queued behind the running chain and this returns `Ok(())` straight
    /// away. That `Ok` means the request was queued, not that it completed:
    /// its transition shows up in [`history`](Self::history) once it runs,
    /// and a failure is only reported as a `warn!` event.
    pub async fn fire_with(&self, trigger: T, args: A) -> Result<(), StateMachineError> {
        self.start();

        let driving = DRIVING.try_with(Clone::clone).unwrap_or_default();
        if driving.contains(&self.inner.id) {
            debug!(
                machine = %self.inner.id,
                trigger = %trigger.label(),
                queued = self.inner.queue.len(),
                "fire queued from inside an action"
            );
            self.submit(
                FireRequest {
                    trigger,
                    args,
                    reply: None,
                },
                driving,
            );
            return Ok(());
        }

        let (reply, receiver) = oneshot::channel();
        self.submit(
            FireRequest {
                trigger,
                args,
                reply: Some(reply),
            },
            driving,
        );
        // The drain task replies to every request it takes; the channel only
        // closes unanswered when the runtime drops that task.
        receiver.await.unwrap_or_else(|closed| {
            Err(StateMachineError::ActionFailure {
                phase: ActionPhase::Transition,
                state: self.state().name(),
                description: "fire queue".to_string(),
                source: Box::new(closed),
            })
        })
    }

    fn start(&self) {
        if self.inner.graph.read().is_sealed() {
            return;
        }
        let mut graph = self.inner.graph.write();
        if !graph.is_sealed() {
            graph.seal();
            debug!(machine = %self.inner.id, states = graph.len(), "machine started");
        }
    }

    /// Queue `request`, starting a drain task if the machine was idle.
    ///
    /// The new task inherits the caller's `DRIVING` marks, so machines that
    /// fire into each other from their actions queue instead of waiting on
    /// one another.
    fn submit(&self, request: FireRequest<T, A>, mut driving: Vec<Uuid>) {
        if self.inner.queue.admit(request) {
            driving.push(self.inner.id);
            let machine = self.clone();
            tokio::spawn(async move { machine.drain(driving).await });
        }
    }

    async fn drain(self, driving: Vec<Uuid>) {
        let guard = DrainGuard::new(&self.inner.queue);

        DRIVING
            .scope(driving, async {
                let mut next = self.inner.queue.next();
                while let Some(FireRequest {
                    trigger,
                    args,
                    reply,
                }) = next
                {
                    let span = info_span!(
                        "fire",
                        machine = %self.inner.id,
                        trigger = %trigger.label()
                    );
                    let result = self.process(trigger, args).instrument(span).await;

                    // Take the next request first, so the machine already
                    // reads as idle when the last caller wakes up.
                    next = self.inner.queue.next();
                    match reply {
                        // The caller may have stopped waiting.
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(error) = result {
                                warn!(machine = %self.inner.id, %error, "queued fire failed");
                            }
                        }
                    }
                }
            })
            .await;

        guard.finish();
    }

    async fn process(&self, trigger: T, args: A) -> Result<(), StateMachineError> {
        match self.prepare(trigger, args)? {
            Step::Ignored => {
                debug!("trigger ignored");
                Ok(())
            }
            Step::Unhandled {
                state,
                trigger,
                unmet_guards,
            } => self.unhandled(state, trigger, unmet_guards).await,
            Step::Run(plan) => {
                if let Err(error) = plan.execute(&self.inner.current).await {
                    warn!(%error, "transition aborted");
                    return Err(error);
                }
                let transition = &plan.transition;
                info!(
                    source = %transition.source.name(),
                    destination = %transition.destination.name(),
                    "transition completed"
                );

                self.inner
                    .history
                    .lock()
                    .record(TransitionRecord::completed(transition));
                let observers = self.inner.observers.read().clone();
                for observer in observers {
                    if panic::catch_unwind(AssertUnwindSafe(|| observer(transition))).is_err() {
                        warn!("transition observer panicked");
                    }
                }
                Ok(())
            }
        }
    }

    /// Resolve and plan under the read lock; nothing here awaits.
    fn prepare(&self, trigger: T, args: A) -> Result<Step<S, T, A>, StateMachineError> {
        let graph = self.inner.graph.read();
        let current = self.state();

        match resolver::resolve(&graph, &current, &trigger, &args)? {
            Resolution::Handled {
                source,
                owner,
                permit,
            } => {
                let permit = &graph.record(owner).permits[permit];
                let plan =
                    TransitionPlan::build(&graph, source, owner, permit, trigger, Arc::new(args))?;
                Ok(plan.map_or(Step::Ignored, Step::Run))
            }
            Resolution::Unhandled { unmet_guards } => Ok(Step::Unhandled {
                state: current,
                trigger,
                unmet_guards,
            }),
        }
    }

    async fn unhandled(
        &self,
        state: S,
        trigger: T,
        unmet_guards: Vec<String>,
    ) -> Result<(), StateMachineError> {
        warn!(
            state = %state.name(),
            unmet_guards = ?unmet_guards,
            "trigger not handled"
        );
        let handler = self.inner.unhandled.read().clone();
        let Some(handler) = handler else {
            return Err(StateMachineError::InvalidTransition {
                state: state.name(),
                trigger: trigger.label(),
                unmet_guards,
            });
        };

        handler
            .execute(&state, &trigger, &unmet_guards)
            .await
            .map_err(|source| StateMachineError::ActionFailure {
                phase: ActionPhase::UnhandledTrigger,
                state: state.name(),
                description: handler.description().to_string(),
                source,
            })
    }
}

impl<S: State, T: Trigger, A: Default + Send + Sync + 'static> StateMachine<S, T, A> {
    /// Fire `trigger` with default arguments.
    pub async fn fire(&self, trigger: T) -> Result<(), StateMachineError> {
        self.fire_with(trigger, A::default()).await
    }

    pub fn can_fire(&self, trigger: &T) -> bool {
        self.can_fire_with(trigger, &A::default())
    }

    pub fn permitted_triggers(&self) -> Vec<T> {
        self.permitted_triggers_with(&A::default())
    }
}

impl<S: State, T, A> fmt::Debug for StateMachine<S, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.inner.id)
            .field("state", &*self.inner.current.lock())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle, for actions that need to fire back into their own
/// machine without keeping it alive.
pub struct WeakStateMachine<S, T, A = ()> {
    inner: Weak<MachineInner<S, T, A>>,
}

impl<S, T, A> Clone for WeakStateMachine<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, T, A> WeakStateMachine<S, T, A> {
    pub fn upgrade(&self) -> Option<StateMachine<S, T, A>> {
        self.inner.upgrade().map(|inner| StateMachine { inner })
    }
}
