//! The imperative shell: actions, resolution, execution and firing.
//!
//! # Key Concepts
//!
//! - **Actions**: every callback is an [`ActionBehaviour`] returning a boxed
//!   future, so sync and async actions share one contract
//! - **Resolution**: the first state up the hierarchy that owns a permit for
//!   the trigger decides the outcome
//! - **Execution**: exits innermost first, then the transition action, then
//!   entries outermost first; the first failure aborts the chain
//! - **Firing**: one request in flight per machine, the rest queued FIFO

mod action;
mod executor;
mod machine;
mod queue;
mod resolver;
mod unhandled;

pub use action::{ActionBehaviour, ActionFuture};
pub(crate) use action::EntryAction;
pub use machine::{StateMachine, WeakStateMachine};
pub use unhandled::{UnhandledFuture, UnhandledTriggerAction};
