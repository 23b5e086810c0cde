//! Permits: the configured transitions owned by a state.

use super::state_graph::StateId;
use crate::core::Guard;
use crate::effects::ActionBehaviour;
use std::fmt;
use std::sync::Arc;

/// Picks the destination of a dynamic permit from the trigger arguments.
pub(crate) type DestinationSelector<S, A> = Arc<dyn Fn(&A) -> S + Send + Sync>;

/// What taking a permit does.
pub(crate) enum PermitKind<S, A> {
    /// Move to another state.
    Transition { destination: StateId },
    /// Move to whichever state the selector returns when the trigger fires.
    Dynamic {
        description: String,
        selector: DestinationSelector<S, A>,
    },
    /// Stay in the owning state, optionally re-running exit/entry actions.
    Reentry { execute_entry_exit: bool },
    /// Accept the trigger and do nothing at all.
    Ignore,
}

impl<S, A> Clone for PermitKind<S, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Transition { destination } => Self::Transition {
                destination: *destination,
            },
            Self::Dynamic {
                description,
                selector,
            } => Self::Dynamic {
                description: description.clone(),
                selector: Arc::clone(selector),
            },
            Self::Reentry { execute_entry_exit } => Self::Reentry {
                execute_entry_exit: *execute_entry_exit,
            },
            Self::Ignore => Self::Ignore,
        }
    }
}

impl<S, A> fmt::Debug for PermitKind<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition { destination } => f
                .debug_struct("Transition")
                .field("destination", destination)
                .finish(),
            Self::Dynamic { description, .. } => f
                .debug_struct("Dynamic")
                .field("description", description)
                .finish_non_exhaustive(),
            Self::Reentry { execute_entry_exit } => f
                .debug_struct("Reentry")
                .field("execute_entry_exit", execute_entry_exit)
                .finish(),
            Self::Ignore => f.write_str("Ignore"),
        }
    }
}

pub(crate) struct Permit<S, T, A> {
    pub(crate) trigger: T,
    pub(crate) guards: Vec<Guard<A>>,
    pub(crate) kind: PermitKind<S, A>,
    pub(crate) action: Option<ActionBehaviour<S, T, A>>,
}

impl<S, T, A> Permit<S, T, A> {
    pub(crate) fn is_unconditional(&self) -> bool {
        self.guards.is_empty()
    }

    pub(crate) fn guard_descriptions(&self) -> Vec<String> {
        self.guards
            .iter()
            .map(|guard| guard.description().to_string())
            .collect()
    }
}

impl<S, T: Clone, A> Clone for Permit<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            trigger: self.trigger.clone(),
            guards: self.guards.clone(),
            kind: self.kind.clone(),
            action: self.action.clone(),
        }
    }
}
