//! The state graph: states, hierarchy and configured permits.
//!
//! States live in an arena indexed by [`StateId`]; parents and children are
//! indices rather than references, so the hierarchy carries no ownership
//! cycles.

mod permit;
mod state_graph;

pub(crate) use permit::{DestinationSelector, Permit, PermitKind};
pub use state_graph::{StateGraph, StateId};
