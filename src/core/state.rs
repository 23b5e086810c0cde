//! Key traits for states and triggers.
//!
//! States and triggers are opaque keys: the machine only ever compares,
//! hashes and clones them. Any type with the right bounds qualifies, so
//! plain enums work without extra boilerplate.

use std::fmt::Debug;
use std::hash::Hash;

/// Identity of a state in the machine.
///
/// # Required Traits
///
/// - `Clone`: States are copied into transitions and history records
/// - `Eq` + `Hash`: States index the state graph
/// - `Debug`: States are labelled in diagnostics and metadata
/// - `Send` + `Sync`: Machines may be fired from any task
///
/// # Example
///
/// ```rust
/// use statecraft::core::State;
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// enum Door {
///     Open,
///     Closed,
/// }
///
/// assert_eq!(Door::Open.name(), "Open");
/// ```
pub trait State: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Get the state's name for display/logging.
    fn name(&self) -> String {
        format!("{self:?}")
    }
}

impl<X> State for X where X: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Identity of a trigger. Triggers carry no behavior of their own.
pub trait Trigger: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Get the trigger's label for display/logging.
    fn label(&self) -> String {
        format!("{self:?}")
    }
}

impl<X> Trigger for X where X: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum TestState {
        Initial,
        Processing,
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum TestTrigger {
        Begin,
        Retry(u8),
    }

    #[test]
    fn state_name_uses_debug_representation() {
        assert_eq!(TestState::Initial.name(), "Initial");
        assert_eq!(TestState::Processing.name(), "Processing");
    }

    #[test]
    fn trigger_label_includes_payload() {
        assert_eq!(TestTrigger::Begin.label(), "Begin");
        assert_eq!(TestTrigger::Retry(2).label(), "Retry(2)");
    }

    #[test]
    fn string_keys_are_quoted() {
        assert_eq!("idle".to_string().name(), "\"idle\"");
    }
}
