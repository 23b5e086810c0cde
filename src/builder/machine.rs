//! Builder for constructing state machines.

use crate::builder::configuration::StateConfiguration;
use crate::builder::error::ConfigurationError;
use crate::core::{State, Trigger};
use crate::effects::{StateMachine, UnhandledTriggerAction};
use crate::graph::StateGraph;

/// Builder for constructing state machines with a fluent API.
///
/// Unlike [`StateMachine::configure`], which reports each call's error
/// immediately, the builder collects every declaration and reports the
/// first problem from [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use statecraft::StateMachineBuilder;
///
/// let machine = StateMachineBuilder::<&str, &str>::new()
///     .initial("Idle")
///     .state("Idle", |s| s.permit("start", "Active"))
///     .state("Active", |s| s.substate_of("Running").permit("pause", "Paused"))
///     .state("Paused", |s| s.substate_of("Running").permit("resume", "Active"))
///     .state("Running", |s| s.permit("stop", "Idle"))
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.state(), "Idle");
/// ```
pub struct StateMachineBuilder<S, T, A = ()> {
    initial: Option<S>,
    states: Vec<StateConfiguration<S, T, A>>,
    unhandled: Option<UnhandledTriggerAction<S, T>>,
}

impl<S: State, T: Trigger, A: Send + Sync + 'static> StateMachineBuilder<S, T, A> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            unhandled: None,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Declare behaviour for `state`. May be called more than once for the
    /// same state; declarations accumulate.
    pub fn state<F>(mut self, state: S, configure: F) -> Self
    where
        F: FnOnce(StateConfiguration<S, T, A>) -> StateConfiguration<S, T, A>,
    {
        self.states.push(configure(StateConfiguration::new(state)));
        self
    }

    pub fn on_unhandled_trigger(mut self, handler: UnhandledTriggerAction<S, T>) -> Self {
        self.unhandled = Some(handler);
        self
    }

    /// Build the state machine.
    /// Returns an error if the initial state is missing or any declaration
    /// is rejected.
    pub fn build(self) -> Result<StateMachine<S, T, A>, ConfigurationError> {
        let initial = self.initial.ok_or(ConfigurationError::MissingInitialState)?;

        let mut graph = StateGraph::with_state(initial.clone());
        for configuration in self.states {
            configuration.apply(&mut graph)?;
        }

        Ok(StateMachine::from_parts(graph, initial, self.unhandled))
    }
}

impl<S: State, T: Trigger, A: Send + Sync + 'static> Default for StateMachineBuilder<S, T, A> {
    fn default() -> Self {
        Self::new()
    }
}
