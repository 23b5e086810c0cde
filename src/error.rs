//! Errors surfaced by `fire` and by configuration.

use crate::builder::ConfigurationError;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Error type produced by guards, actions and unhandled-trigger handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Phase of the action chain in which a callback failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    /// A guard predicate returned an error while resolving the trigger.
    Guard,
    /// An exit action of a state being left.
    Exit,
    /// The action attached to the permit itself.
    Transition,
    /// An entry action of a state being entered.
    Entry,
    /// The custom unhandled-trigger handler.
    UnhandledTrigger,
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Guard => "guard",
            Self::Exit => "exit",
            Self::Transition => "transition",
            Self::Entry => "entry",
            Self::UnhandledTrigger => "unhandled trigger",
        };
        f.write_str(name)
    }
}

/// Every failed `fire` settles with exactly one of these.
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error(
        "No valid leaving transitions are permitted from state '{state}' for trigger '{trigger}'{}",
        unmet_suffix(.unmet_guards)
    )]
    InvalidTransition {
        state: String,
        trigger: String,
        unmet_guards: Vec<String>,
    },

    #[error("{phase} action '{description}' failed in state '{state}': {source}")]
    ActionFailure {
        phase: ActionPhase,
        state: String,
        description: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl StateMachineError {
    /// Phase of the failing callback, for `ActionFailure` errors.
    pub fn phase(&self) -> Option<ActionPhase> {
        match self {
            Self::ActionFailure { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

/// Error reported for a callback that panicked instead of returning.
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> BoxError {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    };
    format!("callback panicked: {message}").into()
}

fn unmet_suffix(unmet_guards: &[String]) -> String {
    if unmet_guards.is_empty() {
        String::new()
    } else {
        format!(" (unmet guards: {})", unmet_guards.join(", "))
    }
}
