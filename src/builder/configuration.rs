//! Fluent declarations for a single state.

use crate::builder::error::ConfigurationError;
use crate::core::{Guard, State, Trigger};
use crate::effects::{ActionBehaviour, EntryAction};
use crate::graph::{DestinationSelector, Permit, PermitKind, StateGraph};
use std::sync::Arc;

enum Target<S, A> {
    State(S),
    Dynamic {
        description: String,
        selector: DestinationSelector<S, A>,
    },
    Reentry { execute_entry_exit: bool },
    Ignore,
}

struct PermitDeclaration<S, T, A> {
    trigger: T,
    target: Target<S, A>,
    guards: Vec<Guard<A>>,
    action: Option<ActionBehaviour<S, T, A>>,
}

enum Declaration<S, T, A> {
    Superstate(S),
    Permit(PermitDeclaration<S, T, A>),
    Entry(EntryAction<S, T, A>),
    Exit(ActionBehaviour<S, T, A>),
}

/// Declarations for one state, applied in the order they were made.
///
/// Methods consume and return the configuration so calls chain. Mistakes
/// that can be spotted while chaining are remembered and reported when the
/// configuration is applied.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Guard;
/// use statecraft::effects::ActionBehaviour;
/// use statecraft::StateMachine;
///
/// let machine: StateMachine<&str, &str, u32> = StateMachine::new("Idle");
/// machine
///     .configure("Idle", |s| {
///         s.permit_if("start", "Running", [Guard::new("has fuel", |fuel: &u32| *fuel > 0)])
///             .with_action(ActionBehaviour::new("ignite", |_| {}))
///             .ignore("stop")
///     })
///     .unwrap();
/// ```
pub struct StateConfiguration<S, T, A = ()> {
    state: S,
    declarations: Vec<Declaration<S, T, A>>,
    error: Option<ConfigurationError>,
}

impl<S: State, T: Trigger, A> StateConfiguration<S, T, A> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            declarations: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Nest this state under `superstate`.
    pub fn substate_of(mut self, superstate: S) -> Self {
        self.declarations.push(Declaration::Superstate(superstate));
        self
    }

    /// Move to `destination` on `trigger`.
    pub fn permit(self, trigger: T, destination: S) -> Self {
        self.permit_if(trigger, destination, [])
    }

    /// Move to `destination` on `trigger` when every guard passes.
    pub fn permit_if(
        self,
        trigger: T,
        destination: S,
        guards: impl IntoIterator<Item = Guard<A>>,
    ) -> Self {
        self.push_permit(trigger, Target::State(destination), guards, None)
    }

    /// Move on `trigger` to the state `selector` picks from the trigger
    /// arguments.
    ///
    /// The destination is computed each time the trigger fires, so it is
    /// only checked then: a state this machine does not know fails the fire
    /// with a configuration error. Selecting this state leaves and
    /// re-enters it.
    pub fn permit_dynamic<F>(self, trigger: T, description: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&A) -> S + Send + Sync + 'static,
    {
        self.permit_dynamic_if(trigger, description, selector, [])
    }

    pub fn permit_dynamic_if<F>(
        self,
        trigger: T,
        description: impl Into<String>,
        selector: F,
        guards: impl IntoIterator<Item = Guard<A>>,
    ) -> Self
    where
        F: Fn(&A) -> S + Send + Sync + 'static,
    {
        let target = Target::Dynamic {
            description: description.into(),
            selector: Arc::new(selector),
        };
        self.push_permit(trigger, target, guards, None)
    }

    /// Leave and re-enter this state on `trigger`.
    pub fn permit_reentry(self, trigger: T) -> Self {
        self.permit_reentry_if(trigger, [])
    }

    pub fn permit_reentry_if(self, trigger: T, guards: impl IntoIterator<Item = Guard<A>>) -> Self {
        self.push_permit(
            trigger,
            Target::Reentry {
                execute_entry_exit: true,
            },
            guards,
            None,
        )
    }

    /// Run `action` on `trigger` without leaving the state.
    pub fn internal_transition(self, trigger: T, action: ActionBehaviour<S, T, A>) -> Self {
        self.internal_transition_if(trigger, [], action)
    }

    pub fn internal_transition_if(
        self,
        trigger: T,
        guards: impl IntoIterator<Item = Guard<A>>,
        action: ActionBehaviour<S, T, A>,
    ) -> Self {
        self.push_permit(
            trigger,
            Target::Reentry {
                execute_entry_exit: false,
            },
            guards,
            Some(action),
        )
    }

    /// Accept `trigger` and do nothing.
    pub fn ignore(self, trigger: T) -> Self {
        self.ignore_if(trigger, [])
    }

    pub fn ignore_if(self, trigger: T, guards: impl IntoIterator<Item = Guard<A>>) -> Self {
        self.push_permit(trigger, Target::Ignore, guards, None)
    }

    /// Attach a transition action to the most recently declared permit.
    pub fn with_action(mut self, action: ActionBehaviour<S, T, A>) -> Self {
        let last = self
            .declarations
            .iter_mut()
            .rev()
            .find_map(|declaration| match declaration {
                Declaration::Permit(permit) => Some(permit),
                _ => None,
            });

        let reason = match last {
            None => Some("with_action needs a preceding permit"),
            Some(PermitDeclaration {
                target: Target::Ignore,
                ..
            }) => Some("ignored triggers cannot run actions"),
            Some(PermitDeclaration {
                action: Some(_), ..
            }) => Some("permit already has a transition action"),
            Some(permit) => {
                permit.action = Some(action);
                None
            }
        };
        if let Some(reason) = reason {
            self.defer(reason);
        }
        self
    }

    pub fn on_entry(self, action: ActionBehaviour<S, T, A>) -> Self {
        self.push_entry(action, None)
    }

    /// Entry action that only runs when the state is entered via `trigger`.
    pub fn on_entry_from(self, trigger: T, action: ActionBehaviour<S, T, A>) -> Self {
        self.push_entry(action, Some(trigger))
    }

    pub fn on_exit(mut self, action: ActionBehaviour<S, T, A>) -> Self {
        self.declarations.push(Declaration::Exit(action));
        self
    }

    /// Write every declaration into `graph`, stopping at the first error.
    pub(crate) fn apply(self, graph: &mut StateGraph<S, T, A>) -> Result<(), ConfigurationError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let id = graph.ensure(self.state.clone())?;
        for declaration in self.declarations {
            match declaration {
                Declaration::Superstate(parent) => {
                    graph.add_state(self.state.clone(), Some(parent))?;
                }
                Declaration::Permit(permit) => {
                    let kind = match permit.target {
                        Target::State(destination) if destination == self.state => {
                            return Err(ConfigurationError::SelfTransition {
                                state: self.state.name(),
                                trigger: permit.trigger.label(),
                            });
                        }
                        Target::State(destination) => PermitKind::Transition {
                            destination: graph.ensure(destination)?,
                        },
                        Target::Dynamic {
                            description,
                            selector,
                        } => PermitKind::Dynamic {
                            description,
                            selector,
                        },
                        Target::Reentry { execute_entry_exit } => {
                            PermitKind::Reentry { execute_entry_exit }
                        }
                        Target::Ignore => PermitKind::Ignore,
                    };
                    graph.add_permit(
                        id,
                        Permit {
                            trigger: permit.trigger,
                            guards: permit.guards,
                            kind,
                            action: permit.action,
                        },
                    )?;
                }
                Declaration::Entry(entry) => graph.add_entry_action(id, entry)?,
                Declaration::Exit(exit) => graph.add_exit_action(id, exit)?,
            }
        }
        Ok(())
    }

    fn push_permit(
        mut self,
        trigger: T,
        target: Target<S, A>,
        guards: impl IntoIterator<Item = Guard<A>>,
        action: Option<ActionBehaviour<S, T, A>>,
    ) -> Self {
        self.declarations
            .push(Declaration::Permit(PermitDeclaration {
                trigger,
                target,
                guards: guards.into_iter().collect(),
                action,
            }));
        self
    }

    fn push_entry(mut self, behaviour: ActionBehaviour<S, T, A>, trigger: Option<T>) -> Self {
        self.declarations
            .push(Declaration::Entry(EntryAction { behaviour, trigger }));
        self
    }

    /// Keep the first error only.
    fn defer(&mut self, reason: &str) {
        if self.error.is_none() {
            self.error = Some(ConfigurationError::InvalidDeclaration {
                state: self.state.name(),
                reason: reason.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Door {
        Open,
        Closed,
        Locked,
    }

    type Config = StateConfiguration<Door, &'static str>;
    type Graph = StateGraph<Door, &'static str>;

    fn noop(description: &'static str) -> ActionBehaviour<Door, &'static str> {
        ActionBehaviour::new(description, |_| {})
    }

    #[test]
    fn declarations_land_on_the_state() {
        let mut graph = Graph::new();
        Config::new(Door::Closed)
            .permit("open", Door::Open)
            .permit("lock", Door::Locked)
            .on_entry(noop("latch"))
            .on_entry_from("close", noop("slam"))
            .on_exit(noop("unlatch"))
            .apply(&mut graph)
            .unwrap();

        let closed = graph.id_of(&Door::Closed).unwrap();
        let record = graph.record(closed);
        assert_eq!(record.permits.len(), 2);
        assert_eq!(record.entry_actions.len(), 2);
        assert_eq!(record.entry_actions[1].trigger, Some("close"));
        assert_eq!(record.exit_actions.len(), 1);
        assert!(graph.contains(&Door::Open));
        assert!(graph.contains(&Door::Locked));
    }

    #[test]
    fn substate_of_attaches_parent() {
        let mut graph = Graph::new();
        Config::new(Door::Locked)
            .substate_of(Door::Closed)
            .apply(&mut graph)
            .unwrap();

        assert_eq!(graph.parent_of(&Door::Locked), Some(&Door::Closed));
    }

    #[test]
    fn permit_to_same_state_is_rejected() {
        let mut graph = Graph::new();
        let error = Config::new(Door::Open)
            .permit("open", Door::Open)
            .apply(&mut graph)
            .unwrap_err();

        assert_eq!(
            error,
            ConfigurationError::SelfTransition {
                state: "Open".to_string(),
                trigger: "\"open\"".to_string()
            }
        );
    }

    #[test]
    fn second_permit_after_unconditional_is_rejected() {
        let mut graph = Graph::new();
        let error = Config::new(Door::Open)
            .permit("close", Door::Closed)
            .permit("close", Door::Locked)
            .apply(&mut graph)
            .unwrap_err();

        assert!(matches!(error, ConfigurationError::DuplicatePermit { .. }));
    }

    #[test]
    fn guarded_permits_may_share_a_trigger() {
        let mut graph: StateGraph<Door, &str, bool> = StateGraph::new();
        StateConfiguration::new(Door::Closed)
            .permit_if("push", Door::Open, [Guard::new("unlocked", |u: &bool| *u)])
            .permit("push", Door::Locked)
            .apply(&mut graph)
            .unwrap();

        let closed = graph.id_of(&Door::Closed).unwrap();
        assert_eq!(graph.record(closed).permits.len(), 2);
    }

    #[test]
    fn with_action_attaches_to_last_permit() {
        let mut graph = Graph::new();
        Config::new(Door::Closed)
            .permit("open", Door::Open)
            .permit("lock", Door::Locked)
            .with_action(noop("turn key"))
            .apply(&mut graph)
            .unwrap();

        let closed = graph.id_of(&Door::Closed).unwrap();
        let permits = &graph.record(closed).permits;
        assert!(permits[0].action.is_none());
        assert_eq!(
            permits[1].action.as_ref().map(|a| a.description()),
            Some("turn key")
        );
    }

    #[test]
    fn with_action_without_permit_is_deferred() {
        let mut graph = Graph::new();
        let error = Config::new(Door::Closed)
            .with_action(noop("orphan"))
            .permit("open", Door::Open)
            .apply(&mut graph)
            .unwrap_err();

        assert!(matches!(
            error,
            ConfigurationError::InvalidDeclaration { .. }
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn ignored_trigger_cannot_take_action() {
        let mut graph = Graph::new();
        let error = Config::new(Door::Closed)
            .ignore("knock")
            .with_action(noop("answer"))
            .apply(&mut graph)
            .unwrap_err();

        assert!(matches!(
            error,
            ConfigurationError::InvalidDeclaration { .. }
        ));
    }

    #[test]
    fn reentry_kinds() {
        let mut graph = Graph::new();
        Config::new(Door::Open)
            .permit_reentry("wedge")
            .internal_transition("creak", noop("oil hinge"))
            .ignore("knock")
            .apply(&mut graph)
            .unwrap();

        let open = graph.id_of(&Door::Open).unwrap();
        let permits = &graph.record(open).permits;
        assert!(matches!(
            permits[0].kind,
            PermitKind::Reentry {
                execute_entry_exit: true
            }
        ));
        assert!(matches!(
            permits[1].kind,
            PermitKind::Reentry {
                execute_entry_exit: false
            }
        ));
        assert!(matches!(permits[2].kind, PermitKind::Ignore));
    }

    #[test]
    fn dynamic_permit_keeps_selector_and_action() {
        let mut graph: StateGraph<Door, &str, bool> = StateGraph::new();
        StateConfiguration::new(Door::Closed)
            .permit_dynamic("turn", "lock if key", |key: &bool| {
                if *key {
                    Door::Locked
                } else {
                    Door::Open
                }
            })
            .with_action(ActionBehaviour::new("click", |_| {}))
            .apply(&mut graph)
            .unwrap();

        let closed = graph.id_of(&Door::Closed).unwrap();
        let permit = &graph.record(closed).permits[0];
        match &permit.kind {
            PermitKind::Dynamic {
                description,
                selector,
            } => {
                assert_eq!(description, "lock if key");
                assert_eq!(selector(&true), Door::Locked);
                assert_eq!(selector(&false), Door::Open);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(permit.action.is_some());
        assert!(!graph.contains(&Door::Locked));
    }
}
