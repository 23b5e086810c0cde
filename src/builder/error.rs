//! Configuration errors for the state graph and builders.

use thiserror::Error;

/// Errors raised while declaring states, hierarchy and permits.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("State '{state}' cannot be its own superstate")]
    SelfParent { state: String },

    #[error("Making '{state}' a substate of '{parent}' would create a cycle")]
    HierarchyCycle { state: String, parent: String },

    #[error("State '{state}' is already a substate of '{existing}', cannot move it under '{requested}'")]
    Reparent {
        state: String,
        existing: String,
        requested: String,
    },

    #[error("State '{state}' already handles trigger '{trigger}' unconditionally")]
    DuplicatePermit { state: String, trigger: String },

    #[error(
        "Permit from '{state}' on '{trigger}' targets the same state; use permit_reentry or ignore"
    )]
    SelfTransition { state: String, trigger: String },

    #[error("Dynamic permit of '{state}' on '{trigger}' selected unknown state '{destination}'")]
    UnknownDestination {
        state: String,
        trigger: String,
        destination: String,
    },

    #[error("Invalid declaration on state '{state}': {reason}")]
    InvalidDeclaration { state: String, reason: String },

    #[error("Machine has already started firing; configuration is frozen")]
    MachineStarted,
}
