//! Arena of state records and their hierarchy.

use super::permit::Permit;
use crate::builder::ConfigurationError;
use crate::core::{State, Trigger};
use crate::effects::{ActionBehaviour, EntryAction};
use std::collections::HashMap;

/// Stable index of a state inside one [`StateGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(usize);

pub(crate) struct StateRecord<S, T, A> {
    pub(crate) state: S,
    pub(crate) parent: Option<StateId>,
    pub(crate) children: Vec<StateId>,
    pub(crate) entry_actions: Vec<EntryAction<S, T, A>>,
    pub(crate) exit_actions: Vec<ActionBehaviour<S, T, A>>,
    pub(crate) permits: Vec<Permit<S, T, A>>,
}

impl<S, T, A> StateRecord<S, T, A> {
    fn new(state: S) -> Self {
        Self {
            state,
            parent: None,
            children: Vec::new(),
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
            permits: Vec::new(),
        }
    }
}

impl<S: Clone, T: Clone, A> Clone for StateRecord<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            parent: self.parent,
            children: self.children.clone(),
            entry_actions: self.entry_actions.clone(),
            exit_actions: self.exit_actions.clone(),
            permits: self.permits.clone(),
        }
    }
}

/// States, their parent/child relation and the permits they own.
///
/// The parent relation is a forest: each state has at most one parent and
/// cycles are rejected. Once sealed, every mutation fails with
/// [`ConfigurationError::MachineStarted`].
///
/// # Example
///
/// ```rust
/// use statecraft::graph::StateGraph;
///
/// let mut graph: StateGraph<&str, &str> = StateGraph::new();
/// graph.add_state("Running", None).unwrap();
/// graph.add_state("Active", Some("Running")).unwrap();
/// graph.add_state("Paused", Some("Running")).unwrap();
///
/// assert!(graph.is_in_state(&"Active", &"Running"));
/// assert!(!graph.is_in_state(&"Running", &"Active"));
/// assert_eq!(graph.common_ancestor(&"Active", &"Paused"), Some(&"Running"));
/// assert!(graph.add_state("Running", Some("Active")).is_err());
/// ```
pub struct StateGraph<S, T, A = ()> {
    records: Vec<StateRecord<S, T, A>>,
    index: HashMap<S, StateId>,
    sealed: bool,
}

impl<S: State, T: Trigger, A> Default for StateGraph<S, T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone, T: Clone, A> Clone for StateGraph<S, T, A> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            index: self.index.clone(),
            sealed: self.sealed,
        }
    }
}

impl<S: State, T: Trigger, A> StateGraph<S, T, A> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            sealed: false,
        }
    }

    /// Graph holding a single root state.
    pub fn with_state(state: S) -> Self {
        let mut index = HashMap::new();
        index.insert(state.clone(), StateId(0));
        Self {
            records: vec![StateRecord::new(state)],
            index,
            sealed: false,
        }
    }

    /// Register a state, optionally as a substate of `parent`.
    ///
    /// Registering an existing state again is a no-op unless a different
    /// parent is requested.
    pub fn add_state(&mut self, state: S, parent: Option<S>) -> Result<StateId, ConfigurationError> {
        let id = self.ensure(state)?;
        if let Some(parent) = parent {
            let parent_id = self.ensure(parent)?;
            self.attach(id, parent_id)?;
        }
        Ok(id)
    }

    pub fn contains(&self, state: &S) -> bool {
        self.index.contains_key(state)
    }

    pub fn id_of(&self, state: &S) -> Option<StateId> {
        self.index.get(state).copied()
    }

    pub fn parent_of(&self, state: &S) -> Option<&S> {
        let id = self.id_of(state)?;
        self.records[id.0]
            .parent
            .map(|parent| &self.records[parent.0].state)
    }

    pub fn substates_of(&self, state: &S) -> Vec<&S> {
        self.id_of(state)
            .map(|id| {
                self.records[id.0]
                    .children
                    .iter()
                    .map(|child| &self.records[child.0].state)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Chain from `state` up to its root, `state` first.
    pub fn ancestors(&self, state: &S) -> Vec<&S> {
        self.id_of(state)
            .map(|id| {
                self.ancestor_ids(id)
                    .into_iter()
                    .map(|ancestor| &self.records[ancestor.0].state)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when `current` is `candidate` or one of its substates.
    pub fn is_in_state(&self, current: &S, candidate: &S) -> bool {
        if current == candidate {
            return true;
        }
        match (self.id_of(current), self.id_of(candidate)) {
            (Some(current), Some(candidate)) => self.ancestor_ids(current).contains(&candidate),
            _ => false,
        }
    }

    /// Lowest state that both `a` and `b` are in, if they share a tree.
    pub fn common_ancestor(&self, a: &S, b: &S) -> Option<&S> {
        let a = self.id_of(a)?;
        let b = self.id_of(b)?;
        self.common_ancestor_id(a, b)
            .map(|id| &self.records[id.0].state)
    }

    /// States in registration order.
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.records.iter().map(|record| &record.state)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the graph. Called when the owning machine starts firing.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn ensure(&mut self, state: S) -> Result<StateId, ConfigurationError> {
        if let Some(id) = self.index.get(&state) {
            return Ok(*id);
        }
        self.check_open()?;

        let id = StateId(self.records.len());
        self.index.insert(state.clone(), id);
        self.records.push(StateRecord::new(state));
        Ok(id)
    }

    fn attach(&mut self, id: StateId, parent: StateId) -> Result<(), ConfigurationError> {
        if id == parent {
            return Err(ConfigurationError::SelfParent {
                state: self.label(id),
            });
        }
        match self.records[id.0].parent {
            Some(existing) if existing == parent => return Ok(()),
            Some(existing) => {
                return Err(ConfigurationError::Reparent {
                    state: self.label(id),
                    existing: self.label(existing),
                    requested: self.label(parent),
                })
            }
            None => {}
        }
        if self.ancestor_ids(parent).contains(&id) {
            return Err(ConfigurationError::HierarchyCycle {
                state: self.label(id),
                parent: self.label(parent),
            });
        }
        self.check_open()?;

        self.records[id.0].parent = Some(parent);
        self.records[parent.0].children.push(id);
        Ok(())
    }

    pub(crate) fn add_permit(
        &mut self,
        id: StateId,
        permit: Permit<S, T, A>,
    ) -> Result<(), ConfigurationError> {
        self.check_open()?;
        let record = &self.records[id.0];
        let shadowed = record
            .permits
            .iter()
            .any(|existing| existing.trigger == permit.trigger && existing.is_unconditional());
        if shadowed {
            return Err(ConfigurationError::DuplicatePermit {
                state: record.state.name(),
                trigger: permit.trigger.label(),
            });
        }
        self.records[id.0].permits.push(permit);
        Ok(())
    }

    pub(crate) fn add_entry_action(
        &mut self,
        id: StateId,
        action: EntryAction<S, T, A>,
    ) -> Result<(), ConfigurationError> {
        self.check_open()?;
        self.records[id.0].entry_actions.push(action);
        Ok(())
    }

    pub(crate) fn add_exit_action(
        &mut self,
        id: StateId,
        action: ActionBehaviour<S, T, A>,
    ) -> Result<(), ConfigurationError> {
        self.check_open()?;
        self.records[id.0].exit_actions.push(action);
        Ok(())
    }

    pub(crate) fn record(&self, id: StateId) -> &StateRecord<S, T, A> {
        &self.records[id.0]
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = (StateId, &StateRecord<S, T, A>)> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| (StateId(index), record))
    }

    pub(crate) fn label(&self, id: StateId) -> String {
        self.records[id.0].state.name()
    }

    /// `id` first, then each parent up to the root.
    pub(crate) fn ancestor_ids(&self, id: StateId) -> Vec<StateId> {
        let mut chain = vec![id];
        let mut cursor = self.records[id.0].parent;
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.records[parent.0].parent;
        }
        chain
    }

    pub(crate) fn common_ancestor_id(&self, a: StateId, b: StateId) -> Option<StateId> {
        let a_chain = self.ancestor_ids(a);
        self.ancestor_ids(b)
            .into_iter()
            .find(|candidate| a_chain.contains(candidate))
    }

    fn check_open(&self) -> Result<(), ConfigurationError> {
        if self.sealed {
            Err(ConfigurationError::MachineStarted)
        } else {
            Ok(())
        }
    }
}
