//! Read-only description of a configured machine.
//!
//! [`StateMachineInfo`] is an owned snapshot: labels and descriptions only,
//! no callbacks. It serializes with serde and feeds the DOT renderer.

mod dot;

pub use dot::UmlDotGraph;

use crate::core::{State, Trigger};
use crate::graph::{PermitKind, StateGraph};
use serde::{Deserialize, Serialize};

/// Snapshot of a machine's graph and current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineInfo {
    pub initial_state: String,
    pub current_state: String,
    /// Every state, in registration order.
    pub states: Vec<StateInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    pub name: String,
    /// The current state is this state or one of its substates.
    pub is_active: bool,
    pub superstate: Option<String>,
    pub substates: Vec<String>,
    pub entry_actions: Vec<EntryActionInfo>,
    pub exit_actions: Vec<String>,
    pub transitions: Vec<TransitionInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryActionInfo {
    pub description: String,
    /// Set when the action only runs for one trigger.
    pub from_trigger: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Moves to another state.
    Fixed,
    /// Moves to a state chosen from the trigger arguments.
    Dynamic,
    /// Leaves and re-enters the owning state.
    Reentry,
    /// Stays put and only runs the transition action.
    Internal,
    /// Accepted and dropped.
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionInfo {
    pub kind: TransitionKind,
    pub source: String,
    /// Same as `source` for stays and ignores. For `Dynamic` permits this is
    /// the description of the destination selector.
    pub destination: String,
    pub trigger: String,
    pub guards: Vec<String>,
    pub actions: Vec<String>,
}

impl StateMachineInfo {
    pub(crate) fn capture<S: State, T: Trigger, A>(
        graph: &StateGraph<S, T, A>,
        initial: &S,
        current: &S,
    ) -> Self {
        let states = graph
            .records()
            .map(|(_, record)| {
                let name = record.state.name();
                let transitions = record
                    .permits
                    .iter()
                    .map(|permit| {
                        let (kind, destination) = match &permit.kind {
                            PermitKind::Transition { destination } => {
                                (TransitionKind::Fixed, graph.label(*destination))
                            }
                            PermitKind::Dynamic { description, .. } => {
                                (TransitionKind::Dynamic, description.clone())
                            }
                            PermitKind::Reentry {
                                execute_entry_exit: true,
                            } => (TransitionKind::Reentry, name.clone()),
                            PermitKind::Reentry {
                                execute_entry_exit: false,
                            } => (TransitionKind::Internal, name.clone()),
                            PermitKind::Ignore => (TransitionKind::Ignored, name.clone()),
                        };
                        TransitionInfo {
                            kind,
                            source: name.clone(),
                            destination,
                            trigger: permit.trigger.label(),
                            guards: permit.guard_descriptions(),
                            actions: permit
                                .action
                                .iter()
                                .map(|action| action.description().to_string())
                                .collect(),
                        }
                    })
                    .collect();

                StateInfo {
                    is_active: graph.is_in_state(current, &record.state),
                    superstate: record.parent.map(|parent| graph.label(parent)),
                    substates: record.children.iter().map(|child| graph.label(*child)).collect(),
                    entry_actions: record
                        .entry_actions
                        .iter()
                        .map(|entry| EntryActionInfo {
                            description: entry.behaviour.description().to_string(),
                            from_trigger: entry.trigger.as_ref().map(Trigger::label),
                        })
                        .collect(),
                    exit_actions: record
                        .exit_actions
                        .iter()
                        .map(|exit| exit.description().to_string())
                        .collect(),
                    transitions,
                    name,
                }
            })
            .collect();

        Self {
            initial_state: initial.name(),
            current_state: current.name(),
            states,
        }
    }

    pub fn state(&self, name: &str) -> Option<&StateInfo> {
        self.states.iter().find(|state| state.name == name)
    }

    /// States with no superstate.
    pub fn top_level_states(&self) -> impl Iterator<Item = &StateInfo> {
        self.states.iter().filter(|state| state.superstate.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Guard;
    use crate::effects::{ActionBehaviour, StateMachine};

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Player {
        Stopped,
        Playing,
        Paused,
        Active,
    }

    type Machine = StateMachine<Player, &'static str, bool>;

    fn noop(description: &'static str) -> ActionBehaviour<Player, &'static str, bool> {
        ActionBehaviour::new(description, |_| {})
    }

    fn player() -> Machine {
        let machine = Machine::new(Player::Stopped);
        machine
            .configure(Player::Stopped, |s| {
                s.permit_if("play", Player::Playing, [Guard::new("has media", |m: &bool| *m)])
                    .with_action(noop("spin up"))
                    .ignore("stop")
                    .permit_dynamic("resume", "last position", |_| Player::Paused)
            })
            .unwrap();
        machine
            .configure(Player::Playing, |s| {
                s.permit("stop", Player::Stopped)
                    .permit_reentry("restart")
                    .on_entry(noop("open stream"))
                    .on_exit(noop("close stream"))
            })
            .unwrap();
        machine
            .configure(Player::Paused, |s| {
                s.substate_of(Player::Playing)
                    .internal_transition("seek", noop("move head"))
                    .on_entry_from("pause", noop("freeze frame"))
            })
            .unwrap();
        machine
            .configure(Player::Active, |s| s.substate_of(Player::Playing))
            .unwrap();
        machine
    }

    #[test]
    fn info_lists_states_in_registration_order() {
        let info = player().info();
        let names: Vec<_> = info.states.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["Stopped", "Playing", "Paused", "Active"]);
        assert_eq!(info.initial_state, "Stopped");
        assert_eq!(info.current_state, "Stopped");
    }

    #[test]
    fn info_describes_hierarchy_and_actions() {
        let info = player().info();

        let playing = info.state("Playing").unwrap();
        assert_eq!(playing.substates, vec!["Paused", "Active"]);
        assert_eq!(playing.exit_actions, vec!["close stream"]);

        let paused = info.state("Paused").unwrap();
        assert_eq!(paused.superstate.as_deref(), Some("Playing"));
        assert_eq!(
            paused.entry_actions,
            vec![EntryActionInfo {
                description: "freeze frame".to_string(),
                from_trigger: Some("\"pause\"".to_string()),
            }]
        );

        let top: Vec<_> = info.top_level_states().map(|s| s.name.as_str()).collect();
        assert_eq!(top, vec!["Stopped", "Playing"]);
    }

    #[test]
    fn info_describes_permits() {
        let info = player().info();

        let stopped = info.state("Stopped").unwrap();
        assert_eq!(
            stopped.transitions[0],
            TransitionInfo {
                kind: TransitionKind::Fixed,
                source: "Stopped".to_string(),
                destination: "Playing".to_string(),
                trigger: "\"play\"".to_string(),
                guards: vec!["has media".to_string()],
                actions: vec!["spin up".to_string()],
            }
        );
        assert_eq!(stopped.transitions[1].kind, TransitionKind::Ignored);
        assert_eq!(stopped.transitions[2].kind, TransitionKind::Dynamic);
        assert_eq!(stopped.transitions[2].destination, "last position");

        let kinds: Vec<_> = info
            .state("Playing")
            .unwrap()
            .transitions
            .iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec![TransitionKind::Fixed, TransitionKind::Reentry]);
        assert_eq!(
            info.state("Paused").unwrap().transitions[0].kind,
            TransitionKind::Internal
        );
    }

    #[tokio::test]
    async fn active_flag_covers_superstates() {
        let machine = player();
        machine.configure(Player::Playing, |s| s.permit("pause", Player::Paused)).unwrap();
        machine.fire_with("play", true).await.unwrap();
        machine.fire_with("pause", true).await.unwrap();

        let info = machine.info();
        let active: Vec<_> = info
            .states
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(active, vec!["Playing", "Paused"]);
        assert_eq!(info.current_state, "Paused");
    }

    #[test]
    fn info_serializes_to_json() {
        let info = player().info();
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["initial_state"], "Stopped");
        assert_eq!(json["states"][0]["transitions"][1]["kind"], "ignored");

        let back: StateMachineInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);
    }
}
