//! Core state machine types.
//!
//! This module contains the value types the rest of the crate is built on:
//! - State and trigger keys via the `State` and `Trigger` traits
//! - Guard predicates for permit eligibility
//! - The runtime `Transition` handed to actions
//! - Transition history records

mod guard;
mod history;
mod state;
mod transition;

pub use guard::Guard;
pub use history::{StateHistory, TransitionRecord};
pub use state::{State, Trigger};
pub use transition::Transition;
