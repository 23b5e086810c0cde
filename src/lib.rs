//! Statecraft: hierarchical state machines with async actions
//!
//! States form a forest: a substate inherits every trigger its superstates
//! handle, and entering or leaving a nested state runs the entry and exit
//! actions of each level crossed. Triggers are fired asynchronously and
//! processed strictly one at a time per machine, including triggers fired
//! from inside the machine's own actions.
//!
//! # Core Concepts
//!
//! - **States and triggers**: any `Clone + Eq + Hash + Debug` type, usually
//!   plain enums
//! - **Permits**: what a state does with a trigger: move (to a fixed state or
//!   one picked from the trigger arguments), re-enter, run an internal action
//!   or ignore it, optionally behind guards
//! - **Actions**: entry, exit and transition callbacks returning futures
//! - **Reflection**: a serializable description of the graph, renderable as
//!   Graphviz DOT
//!
//! # Example
//!
//! ```rust
//! use statecraft::core::Guard;
//! use statecraft::effects::ActionBehaviour;
//! use statecraft::StateMachineBuilder;
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! enum Phase {
//!     Idle,
//!     Running,
//!     Active,
//!     Paused,
//! }
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! enum Command {
//!     Start,
//!     Pause,
//!     Resume,
//!     Stop,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let machine = StateMachineBuilder::<Phase, Command>::new()
//!     .initial(Phase::Idle)
//!     .state(Phase::Idle, |s| s.permit(Command::Start, Phase::Active))
//!     .state(Phase::Running, |s| {
//!         s.permit_if(Command::Stop, Phase::Idle, [Guard::new("always", |_: &()| true)])
//!             .on_entry(ActionBehaviour::new("power up", |_| {}))
//!     })
//!     .state(Phase::Active, |s| {
//!         s.substate_of(Phase::Running).permit(Command::Pause, Phase::Paused)
//!     })
//!     .state(Phase::Paused, |s| {
//!         s.substate_of(Phase::Running).permit(Command::Resume, Phase::Active)
//!     })
//!     .build()
//!     .unwrap();
//!
//! machine.fire(Command::Start).await.unwrap();
//! assert_eq!(machine.state(), Phase::Active);
//! assert!(machine.is_in_state(&Phase::Running));
//!
//! machine.fire(Command::Stop).await.unwrap();
//! assert_eq!(machine.state(), Phase::Idle);
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod effects;
pub mod error;
pub mod graph;
pub mod reflection;

// Re-export commonly used types
pub use builder::{ConfigurationError, StateConfiguration, StateMachineBuilder};
pub use core::{Guard, State, StateHistory, Transition, TransitionRecord, Trigger};
pub use effects::{ActionBehaviour, StateMachine, UnhandledTriggerAction, WeakStateMachine};
pub use error::{ActionPhase, BoxError, StateMachineError};
pub use reflection::{StateMachineInfo, UmlDotGraph};
