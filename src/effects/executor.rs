//! Ordered exit / transition / entry action chains.
//!
//! A plan is computed from the graph while the caller holds the graph lock,
//! then executed without any lock held. Every binding is awaited before the
//! next one starts and the first failure aborts the chain.

use super::action::ActionBehaviour;
use crate::builder::ConfigurationError;
use crate::core::{State, Transition, Trigger};
use crate::error::{ActionPhase, StateMachineError};
use crate::graph::{Permit, PermitKind, StateGraph, StateId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct ActionStep<S, T, A> {
    pub(crate) phase: ActionPhase,
    pub(crate) state: String,
    pub(crate) behaviour: ActionBehaviour<S, T, A>,
}

/// Everything needed to run one transition.
pub(crate) struct TransitionPlan<S, T, A> {
    pub(crate) transition: Transition<S, T, A>,
    pub(crate) exits: Vec<ActionStep<S, T, A>>,
    pub(crate) transition_action: Option<ActionStep<S, T, A>>,
    pub(crate) entries: Vec<ActionStep<S, T, A>>,
}

impl<S: State, T: Trigger, A> TransitionPlan<S, T, A> {
    /// Build the plan for taking `permit` (owned by `owner`) from `current`.
    ///
    /// Returns `None` for ignore permits, which run nothing at all. A dynamic
    /// permit whose selector names an unknown state is a configuration error.
    pub(crate) fn build(
        graph: &StateGraph<S, T, A>,
        current: StateId,
        owner: StateId,
        permit: &Permit<S, T, A>,
        trigger: T,
        args: Arc<A>,
    ) -> Result<Option<Self>, StateMachineError> {
        let source = graph.record(current).state.clone();
        let (destination, exit_ids, entry_ids, reentry) = match &permit.kind {
            PermitKind::Ignore => return Ok(None),
            PermitKind::Transition { destination } => transfer(graph, current, *destination),
            PermitKind::Dynamic { selector, .. } => {
                let selected = selector(args.as_ref());
                let Some(destination) = graph.id_of(&selected) else {
                    return Err(ConfigurationError::UnknownDestination {
                        state: graph.label(owner),
                        trigger: trigger.label(),
                        destination: selected.name(),
                    }
                    .into());
                };
                if destination == current || destination == owner {
                    reenter(graph, current, destination)
                } else {
                    transfer(graph, current, destination)
                }
            }
            PermitKind::Reentry {
                execute_entry_exit: true,
            } => reenter(graph, current, owner),
            PermitKind::Reentry {
                execute_entry_exit: false,
            } => (current, Vec::new(), Vec::new(), true),
        };

        let exits = exit_ids
            .into_iter()
            .flat_map(|id| {
                let record = graph.record(id);
                record.exit_actions.iter().map(move |behaviour| ActionStep {
                    phase: ActionPhase::Exit,
                    state: record.state.name(),
                    behaviour: behaviour.clone(),
                })
            })
            .collect();

        let entries = entry_ids
            .into_iter()
            .flat_map(|id| {
                let record = graph.record(id);
                let trigger = &trigger;
                record
                    .entry_actions
                    .iter()
                    .filter(move |entry| entry.applies_to(trigger))
                    .map(move |entry| ActionStep {
                        phase: ActionPhase::Entry,
                        state: record.state.name(),
                        behaviour: entry.behaviour.clone(),
                    })
            })
            .collect();

        let transition_action = permit.action.as_ref().map(|behaviour| ActionStep {
            phase: ActionPhase::Transition,
            state: graph.label(owner),
            behaviour: behaviour.clone(),
        });

        let destination = graph.record(destination).state.clone();
        Ok(Some(Self {
            transition: Transition::new(source, destination, trigger, args, reentry),
            exits,
            transition_action,
            entries,
        }))
    }

    /// Run the chain, moving `current` to the destination once the exit
    /// phase has completed.
    ///
    /// A failure after that point leaves the machine in the destination
    /// state with only part of the entry phase run.
    pub(crate) async fn execute(&self, current: &Mutex<S>) -> Result<(), StateMachineError> {
        for step in &self.exits {
            self.run_step(step).await?;
        }

        *current.lock() = self.transition.destination.clone();

        if let Some(step) = &self.transition_action {
            self.run_step(step).await?;
        }
        for step in &self.entries {
            self.run_step(step).await?;
        }
        Ok(())
    }

    async fn run_step(&self, step: &ActionStep<S, T, A>) -> Result<(), StateMachineError> {
        debug!(
            phase = %step.phase,
            state = %step.state,
            action = step.behaviour.description(),
            "running action"
        );
        step.behaviour
            .execute(&self.transition)
            .await
            .map_err(|source| StateMachineError::ActionFailure {
                phase: step.phase,
                state: step.state.clone(),
                description: step.behaviour.description().to_string(),
                source,
            })
    }
}

type Route = (StateId, Vec<StateId>, Vec<StateId>, bool);

/// Exit up to the common ancestor, then enter down to `destination`.
fn transfer<S: State, T: Trigger, A>(
    graph: &StateGraph<S, T, A>,
    current: StateId,
    destination: StateId,
) -> Route {
    let common = graph.common_ancestor_id(current, destination);
    let exits = path_below(graph, current, common);
    let mut entries = path_below(graph, destination, common);
    entries.reverse();
    (destination, exits, entries, false)
}

/// Leave everything up to and including `target`, then enter `target`
/// itself. `target` is `current` or one of its ancestors.
fn reenter<S: State, T: Trigger, A>(
    graph: &StateGraph<S, T, A>,
    current: StateId,
    target: StateId,
) -> Route {
    let above = graph.record(target).parent;
    let exits = path_below(graph, current, above);
    (target, exits, vec![target], true)
}

/// `from` and its ancestors strictly below `stop`, innermost first.
fn path_below<S: State, T: Trigger, A>(
    graph: &StateGraph<S, T, A>,
    from: StateId,
    stop: Option<StateId>,
) -> Vec<StateId> {
    graph
        .ancestor_ids(from)
        .into_iter()
        .take_while(|id| Some(*id) != stop)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Guard;
    use crate::effects::EntryAction;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Node {
        Grandparent,
        Parent,
        Child,
        Sibling,
        Outsider,
    }

    type Graph = StateGraph<Node, &'static str>;
    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, entry: &str) -> ActionBehaviour<Node, &'static str> {
        let log = Arc::clone(log);
        let entry = entry.to_string();
        ActionBehaviour::new(entry.clone(), move |_| log.lock().push(entry.clone()))
    }

    fn failing(description: &str) -> ActionBehaviour<Node, &'static str> {
        ActionBehaviour::fallible(description, |_| Err("refused".into()))
    }

    fn family(log: &Log) -> Graph {
        let mut graph = Graph::new();
        graph.add_state(Node::Parent, Some(Node::Grandparent)).unwrap();
        graph.add_state(Node::Child, Some(Node::Parent)).unwrap();
        graph.add_state(Node::Sibling, Some(Node::Grandparent)).unwrap();
        for node in [Node::Grandparent, Node::Parent, Node::Child, Node::Sibling] {
            let id = graph.id_of(&node).unwrap();
            graph
                .add_entry_action(
                    id,
                    EntryAction {
                        behaviour: recorder(log, &format!("{node:?}.entry")),
                        trigger: None,
                    },
                )
                .unwrap();
            graph
                .add_exit_action(id, recorder(log, &format!("{node:?}.exit")))
                .unwrap();
        }
        graph
    }

    fn transition_permit(graph: &Graph, destination: Node) -> Permit<Node, &'static str, ()> {
        Permit {
            trigger: "go",
            guards: Vec::new(),
            kind: PermitKind::Transition {
                destination: graph.id_of(&destination).unwrap(),
            },
            action: None,
        }
    }

    fn plan(
        graph: &Graph,
        from: Node,
        owner: Node,
        permit: &Permit<Node, &'static str, ()>,
    ) -> TransitionPlan<Node, &'static str, ()> {
        TransitionPlan::build(
            graph,
            graph.id_of(&from).unwrap(),
            graph.id_of(&owner).unwrap(),
            permit,
            "go",
            Arc::new(()),
        )
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn common_ancestor_actions_never_run() {
        let log = Log::default();
        let graph = family(&log);
        let permit = transition_permit(&graph, Node::Sibling);
        let current = Mutex::new(Node::Child);

        plan(&graph, Node::Child, Node::Child, &permit)
            .execute(&current)
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Child.exit", "Parent.exit", "Sibling.entry"]
        );
        assert_eq!(*current.lock(), Node::Sibling);
    }

    #[tokio::test]
    async fn entering_nested_state_runs_outermost_first() {
        let log = Log::default();
        let graph = family(&log);
        let permit = transition_permit(&graph, Node::Child);
        let current = Mutex::new(Node::Sibling);

        plan(&graph, Node::Sibling, Node::Sibling, &permit)
            .execute(&current)
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Sibling.exit", "Parent.entry", "Child.entry"]
        );
    }

    #[tokio::test]
    async fn transition_action_runs_between_phases() {
        let log = Log::default();
        let graph = family(&log);
        let mut permit = transition_permit(&graph, Node::Sibling);
        permit.action = Some(recorder(&log, "transition"));
        let current = Mutex::new(Node::Parent);

        plan(&graph, Node::Parent, Node::Parent, &permit)
            .execute(&current)
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Parent.exit", "transition", "Sibling.entry"]
        );
    }

    #[tokio::test]
    async fn reentry_with_actions_exits_and_enters_owner() {
        let log = Log::default();
        let graph = family(&log);
        let permit = Permit {
            trigger: "go",
            guards: Vec::new(),
            kind: PermitKind::Reentry {
                execute_entry_exit: true,
            },
            action: None,
        };
        let current = Mutex::new(Node::Child);

        let plan = plan(&graph, Node::Child, Node::Parent, &permit);
        assert!(plan.transition.is_reentry());
        plan.execute(&current).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Child.exit", "Parent.exit", "Parent.entry"]
        );
        assert_eq!(*current.lock(), Node::Parent);
    }

    #[tokio::test]
    async fn internal_reentry_skips_entry_and_exit() {
        let log = Log::default();
        let graph = family(&log);
        let permit = Permit {
            trigger: "go",
            guards: vec![Guard::new("always", |_: &()| true)],
            kind: PermitKind::Reentry {
                execute_entry_exit: false,
            },
            action: Some(recorder(&log, "internal")),
        };
        let current = Mutex::new(Node::Child);

        let plan = plan(&graph, Node::Child, Node::Parent, &permit);
        assert!(plan.transition.is_stay());
        plan.execute(&current).await.unwrap();

        assert_eq!(*log.lock(), vec!["internal"]);
        assert_eq!(*current.lock(), Node::Child);
    }

    #[test]
    fn ignore_permit_has_no_plan() {
        let log = Log::default();
        let graph = family(&log);
        let permit = Permit {
            trigger: "go",
            guards: Vec::new(),
            kind: PermitKind::Ignore,
            action: None,
        };
        let child = graph.id_of(&Node::Child).unwrap();

        let plan = TransitionPlan::build(&graph, child, child, &permit, "go", Arc::new(()));
        assert!(matches!(plan, Ok(None)));
    }

    #[tokio::test]
    async fn exit_failure_keeps_source_state() {
        let log = Log::default();
        let mut graph = family(&log);
        let parent = graph.id_of(&Node::Parent).unwrap();
        graph.add_exit_action(parent, failing("lock doors")).unwrap();
        let permit = transition_permit(&graph, Node::Sibling);
        let current = Mutex::new(Node::Child);

        let error = plan(&graph, Node::Child, Node::Child, &permit)
            .execute(&current)
            .await
            .unwrap_err();

        assert_eq!(error.phase(), Some(ActionPhase::Exit));
        assert_eq!(*current.lock(), Node::Child);
        assert_eq!(*log.lock(), vec!["Child.exit", "Parent.exit"]);
    }

    #[tokio::test]
    async fn entry_failure_leaves_destination_state() {
        let log = Log::default();
        let mut graph = family(&log);
        let sibling = graph.id_of(&Node::Sibling).unwrap();
        graph
            .add_entry_action(
                sibling,
                EntryAction {
                    behaviour: failing("warm up"),
                    trigger: None,
                },
            )
            .unwrap();
        graph
            .add_entry_action(
                sibling,
                EntryAction {
                    behaviour: recorder(&log, "never"),
                    trigger: None,
                },
            )
            .unwrap();
        let permit = transition_permit(&graph, Node::Sibling);
        let current = Mutex::new(Node::Parent);

        let error = plan(&graph, Node::Parent, Node::Parent, &permit)
            .execute(&current)
            .await
            .unwrap_err();

        assert_eq!(error.phase(), Some(ActionPhase::Entry));
        assert_eq!(*current.lock(), Node::Sibling);
        assert_eq!(*log.lock(), vec!["Parent.exit", "Sibling.entry"]);
    }

    #[tokio::test]
    async fn filtered_entry_only_runs_for_its_trigger() {
        let log = Log::default();
        let mut graph = family(&log);
        let sibling = graph.id_of(&Node::Sibling).unwrap();
        graph
            .add_entry_action(
                sibling,
                EntryAction {
                    behaviour: recorder(&log, "from go"),
                    trigger: Some("go"),
                },
            )
            .unwrap();
        graph
            .add_entry_action(
                sibling,
                EntryAction {
                    behaviour: recorder(&log, "from jump"),
                    trigger: Some("jump"),
                },
            )
            .unwrap();
        let permit = transition_permit(&graph, Node::Sibling);
        let current = Mutex::new(Node::Parent);

        plan(&graph, Node::Parent, Node::Parent, &permit)
            .execute(&current)
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Parent.exit", "Sibling.entry", "from go"]
        );
    }

    #[tokio::test]
    async fn moving_up_to_ancestor_leaves_ancestor_entered() {
        let log = Log::default();
        let graph = family(&log);
        let permit = transition_permit(&graph, Node::Parent);
        let current = Mutex::new(Node::Child);

        plan(&graph, Node::Child, Node::Child, &permit)
            .execute(&current)
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["Child.exit"]);
        assert_eq!(*current.lock(), Node::Parent);
    }

    #[tokio::test]
    async fn moving_down_to_substate_only_enters_it() {
        let log = Log::default();
        let graph = family(&log);
        let permit = transition_permit(&graph, Node::Child);
        let current = Mutex::new(Node::Parent);

        plan(&graph, Node::Parent, Node::Parent, &permit)
            .execute(&current)
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["Child.entry"]);
        assert_eq!(*current.lock(), Node::Child);
    }

    fn dynamic_permit(target: Node) -> Permit<Node, &'static str, ()> {
        Permit {
            trigger: "go",
            guards: Vec::new(),
            kind: PermitKind::Dynamic {
                description: "pick".to_string(),
                selector: Arc::new(move |_: &()| target.clone()),
            },
            action: None,
        }
    }

    #[tokio::test]
    async fn dynamic_permit_moves_to_selected_state() {
        let log = Log::default();
        let graph = family(&log);
        let current = Mutex::new(Node::Child);

        let plan = plan(&graph, Node::Child, Node::Child, &dynamic_permit(Node::Sibling));
        assert!(!plan.transition.is_reentry());
        plan.execute(&current).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Child.exit", "Parent.exit", "Sibling.entry"]
        );
        assert_eq!(*current.lock(), Node::Sibling);
    }

    #[tokio::test]
    async fn dynamic_permit_selecting_owner_reenters_it() {
        let log = Log::default();
        let graph = family(&log);
        let current = Mutex::new(Node::Child);

        let plan = plan(&graph, Node::Child, Node::Parent, &dynamic_permit(Node::Parent));
        assert!(plan.transition.is_reentry());
        plan.execute(&current).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Child.exit", "Parent.exit", "Parent.entry"]
        );
    }

    #[test]
    fn dynamic_permit_to_unknown_state_is_configuration_error() {
        let log = Log::default();
        let graph = family(&log);
        let child = graph.id_of(&Node::Child).unwrap();

        let error = TransitionPlan::build(
            &graph,
            child,
            child,
            &dynamic_permit(Node::Outsider),
            "go",
            Arc::new(()),
        )
        .err()
        .unwrap();

        match error {
            StateMachineError::Configuration(ConfigurationError::UnknownDestination {
                state,
                destination,
                ..
            }) => {
                assert_eq!(state, "Child");
                assert_eq!(destination, "Outsider");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
