//! Maps (state, trigger, args) to the permit that handles it.
//!
//! Resolution walks from the current state towards the root and stops at
//! the first state that owns any permit for the trigger. Within that state
//! permits are tried in declaration order and the first one whose guards all
//! pass wins. Unmet guard descriptions are accumulated for diagnostics.

use crate::core::{State, Trigger};
use crate::error::{ActionPhase, StateMachineError};
use crate::graph::{Permit, StateGraph, StateId};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::debug;

type GuardCheck = Validation<(), NonEmptyVec<String>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// `permit` indexes into the permits of `owner`, which is `source` or
    /// one of its ancestors.
    Handled {
        source: StateId,
        owner: StateId,
        permit: usize,
    },
    Unhandled { unmet_guards: Vec<String> },
}

pub(crate) fn resolve<S: State, T: Trigger, A>(
    graph: &StateGraph<S, T, A>,
    current: &S,
    trigger: &T,
    args: &A,
) -> Result<Resolution, StateMachineError> {
    let Some(current_id) = graph.id_of(current) else {
        return Ok(Resolution::Unhandled {
            unmet_guards: Vec::new(),
        });
    };

    for owner in graph.ancestor_ids(current_id) {
        let mut candidates = graph
            .record(owner)
            .permits
            .iter()
            .enumerate()
            .filter(|(_, permit)| &permit.trigger == trigger)
            .peekable();
        if candidates.peek().is_none() {
            continue;
        }

        let mut unmet_guards = Vec::new();
        for (index, permit) in candidates {
            match evaluate_guards(graph, owner, permit, args)? {
                Validation::Success(_) => {
                    debug!(
                        state = %graph.label(owner),
                        trigger = %trigger.label(),
                        permit = index,
                        "trigger resolved"
                    );
                    return Ok(Resolution::Handled {
                        source: current_id,
                        owner,
                        permit: index,
                    });
                }
                Validation::Failure(unmet) => unmet_guards.extend(unmet.iter().cloned()),
            }
        }
        return Ok(Resolution::Unhandled { unmet_guards });
    }

    Ok(Resolution::Unhandled {
        unmet_guards: Vec::new(),
    })
}

/// Triggers that would currently resolve to a permit, in discovery order.
pub(crate) fn permitted_triggers<S: State, T: Trigger, A>(
    graph: &StateGraph<S, T, A>,
    current: &S,
    args: &A,
) -> Vec<T> {
    let Some(current_id) = graph.id_of(current) else {
        return Vec::new();
    };

    let mut triggers: Vec<T> = Vec::new();
    for owner in graph.ancestor_ids(current_id) {
        for permit in &graph.record(owner).permits {
            if !triggers.contains(&permit.trigger) {
                triggers.push(permit.trigger.clone());
            }
        }
    }

    triggers
        .into_iter()
        .filter(|trigger| {
            matches!(
                resolve(graph, current, trigger, args),
                Ok(Resolution::Handled { .. })
            )
        })
        .collect()
}

/// Evaluate every guard of a permit so that all unmet descriptions are
/// reported, not just the first. A guard error aborts immediately.
fn evaluate_guards<S: State, T: Trigger, A>(
    graph: &StateGraph<S, T, A>,
    owner: StateId,
    permit: &Permit<S, T, A>,
    args: &A,
) -> Result<GuardCheck, StateMachineError> {
    if permit.is_unconditional() {
        return Ok(Validation::success(()));
    }

    let mut checks: Vec<GuardCheck> = Vec::with_capacity(permit.guards.len());
    for guard in &permit.guards {
        let passed = guard
            .check(args)
            .map_err(|source| StateMachineError::ActionFailure {
                phase: ActionPhase::Guard,
                state: graph.label(owner),
                description: guard.description().to_string(),
                source,
            })?;
        let check = if passed {
            Validation::success(())
        } else {
            Validation::fail(guard.description().to_string())
        };
        checks.push(check);
    }

    Ok(Validation::all_vec(checks).map(|_| ()))
}
