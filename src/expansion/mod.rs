//! Branch expansion: grows a linear world into a multi-ending graph.
//!
//! The canonical path is copied unchanged. A handful of interior states are
//! chosen as branch points; at each one the author proposes alternative
//! actions and deviation paths that converge on authored success or failure
//! endings. Expansion is strictly additive.

mod selection;


pub use selection::{linear_path_states, select_branch_indices};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authoring::TextAuthor;
use crate::error::{AppResult, AuthoringError, AuthoringResult};
use crate::world::{Action, DeviationType, Outcome, State, World};

/// Knobs for [`BranchExpander::expand_to_branching_world`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionParams {
    /// Target number of states in the expanded world.
    pub total_states: usize,
    /// Total number of endings; bounds the alternatives per branch point.
    pub num_endings: usize,
    /// Success endings to author.
    pub success_endings: usize,
    /// Failure endings to author.
    pub failure_endings: usize,
    /// Branch points to select on the canonical path.
    pub branching_points: usize,
    /// Upper bound on steps in a single deviation path.
    pub max_deviation_steps: usize,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self {
            total_states: 20,
            num_endings: 5,
            success_endings: 3,
            failure_endings: 2,
            branching_points: 3,
            max_deviation_steps: 5,
        }
    }
}

impl ExpansionParams {
    /// Set ending counts; `num_endings` becomes their sum
    pub fn with_endings(mut self, success: usize, failure: usize) -> Self {
        self.success_endings = success;
        self.failure_endings = failure;
        self.num_endings = success + failure;
        self
    }

    /// Set the number of branch points
    pub fn with_branching_points(mut self, branching_points: usize) -> Self {
        self.branching_points = branching_points;
        self
    }

    /// Set the target state count
    pub fn with_total_states(mut self, total_states: usize) -> Self {
        self.total_states = total_states;
        self
    }

    /// Set the maximum deviation length
    pub fn with_max_deviation_steps(mut self, max_deviation_steps: usize) -> Self {
        self.max_deviation_steps = max_deviation_steps;
        self
    }
}

/// A branch point whose deviations were dropped after an authoring failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonedBranch {
    pub state_id: String,
    pub reason: String,
}

/// What an expansion did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpansionReport {
    /// Selected branch point state ids, in canonical order.
    pub branch_points: Vec<String>,
    pub abandoned_branches: Vec<AbandonedBranch>,
    /// Ids of the authored endings added to the world.
    pub endings: Vec<String>,
    pub states: usize,
    pub transitions: usize,
    pub successful_paths: usize,
    pub failed_paths: usize,
}

/// Expanded world plus its report.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub world: World,
    pub report: ExpansionReport,
}

/// Grows linear worlds into branching worlds with an injected author.
#[derive(Clone)]
pub struct BranchExpander {
    author: Arc<dyn TextAuthor>,
}

type PendingTransition = (State, Action, State);

impl BranchExpander {
    /// Create an expander using `author` for all generated text
    pub fn new(author: Arc<dyn TextAuthor>) -> Self {
        Self { author }
    }

    /// Expand a linear world.
    ///
    /// Fails on structural problems in the input or when endings cannot be
    /// authored. An authoring failure at a branch point drops only that
    /// branch point and is listed in the report.
    pub async fn expand_to_branching_world(
        &self,
        linear: &World,
        params: &ExpansionParams,
    ) -> AppResult<Expansion> {
        let canonical: Vec<State> = linear_path_states(linear)?
            .into_iter()
            .cloned()
            .collect();
        let scenario = linear.name.as_str();

        let mut world = linear.clone();
        world.name = branching_name(&linear.name);

        let mut report = ExpansionReport::default();

        // The canonical terminal stays a goal.
        let Some(canonical_goal) = canonical.last().cloned() else {
            return Ok(Expansion { world, report });
        };
        world.add_goal_state(canonical_goal.clone());

        let candidates: &[State] = if canonical.len() > 2 {
            &canonical[1..canonical.len() - 1]
        } else {
            &[]
        };
        let branch_states: Vec<&State> =
            select_branch_indices(candidates.len(), params.branching_points)
                .into_iter()
                .map(|i| &candidates[i])
                .collect();
        report.branch_points = branch_states.iter().map(|s| s.state_id.clone()).collect();

        info!(
            world = %world.name,
            candidates = candidates.len(),
            branch_points = branch_states.len(),
            "Selected branch points"
        );

        let endings = self
            .author
            .author_endings(
                scenario,
                params.success_endings,
                params.failure_endings,
                &canonical_goal,
            )
            .await?;

        let success = register_endings(
            &mut world,
            endings.success,
            params.success_endings,
            Outcome::Success,
        );
        let failure = register_endings(
            &mut world,
            endings.failure,
            params.failure_endings,
            Outcome::Failure,
        );
        report.endings = success
            .iter()
            .chain(failure.iter())
            .map(|s| s.state_id.clone())
            .collect();

        let num_alternatives = if success.is_empty() && failure.is_empty() {
            0
        } else {
            params
                .num_endings
                .saturating_sub(success.len())
                .clamp(1, 2)
        };
        let branch_divisor = params.branching_points.max(1);

        for (i, branch) in branch_states.iter().enumerate() {
            let actions = linear.get_possible_actions(&branch.state_id);
            let Some(original_action) = actions.first().map(|a| (*a).clone()) else {
                continue;
            };

            let mut pending: Vec<PendingTransition> = Vec::new();
            let mut failed = None;

            for j in 0..num_alternatives {
                let target = match (j, success.is_empty()) {
                    (0, false) => &success[i % success.len()],
                    _ if !failure.is_empty() => &failure[j % failure.len()],
                    _ => {
                        debug!(branch = %branch.state_id, alternative = j, "No ending to target");
                        continue;
                    }
                };

                let new_states = pending
                    .iter()
                    .filter(|(_, _, end)| world.state(&end.state_id).is_none())
                    .count();
                let remaining = params
                    .total_states
                    .saturating_sub(world.state_count() + new_states);
                let max_steps = params
                    .max_deviation_steps
                    .min((remaining / branch_divisor).max(1));

                match self
                    .author_deviation(branch, &original_action, j, target, scenario, max_steps)
                    .await
                {
                    Ok(transitions) => pending.extend(transitions),
                    Err(e) => {
                        failed = Some(e);
                        break;
                    }
                }
            }

            if let Some(e) = failed {
                warn!(
                    branch = %branch.state_id,
                    error = %e,
                    "Abandoning branch point after authoring failure"
                );
                report.abandoned_branches.push(AbandonedBranch {
                    state_id: branch.state_id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            for (start, action, end) in pending {
                world.add_transition(start, action, end);
            }
        }

        report.states = world.state_count();
        report.transitions = world.transitions().len();
        report.successful_paths = world.get_successful_paths()?.len();
        report.failed_paths = world.get_failed_paths()?.len();

        info!(
            world = %world.name,
            states = report.states,
            transitions = report.transitions,
            successful_paths = report.successful_paths,
            failed_paths = report.failed_paths,
            abandoned = report.abandoned_branches.len(),
            "Branching world created"
        );

        Ok(Expansion { world, report })
    }

    /// Author one alternative and its deviation path as pending transitions
    async fn author_deviation(
        &self,
        branch: &State,
        original_action: &Action,
        alternative: usize,
        target: &State,
        scenario: &str,
        max_steps: usize,
    ) -> AuthoringResult<Vec<PendingTransition>> {
        let deviation_type = DeviationType::cycle(alternative);

        let mut alt_action = self
            .author
            .author_alternative_action(branch, original_action, deviation_type, scenario)
            .await?;
        alt_action.action_id = format!("{}_alt_{}", original_action.action_id, alternative);
        alt_action.metadata.deviation_type = Some(deviation_type);

        let mut steps = self
            .author
            .author_deviation_path(branch, &alt_action, target, scenario, max_steps)
            .await?;
        steps.truncate(max_steps);

        if steps.is_empty() {
            return Err(AuthoringError::InvalidOutput {
                message: format!("empty deviation path from {}", branch.state_id),
            });
        }

        let state_prefix = if alternative == 0 {
            format!("{}_alt", branch.state_id)
        } else {
            format!("{}_alt{}", branch.state_id, alternative)
        };

        let last = steps.len() - 1;
        let mut transitions = Vec::with_capacity(steps.len());
        let mut current = branch.clone();

        for (i, step) in steps.into_iter().enumerate() {
            let reaches_target = i == last || step.resulting_state == target.description;
            let next = if reaches_target {
                target.clone()
            } else {
                State::new(format!("{}_{}", state_prefix, i), step.resulting_state)
                    .with_progress(step.progress.unwrap_or(0.5))
            };

            let action = if i == 0 {
                alt_action.clone()
            } else {
                Action::new(format!("{}_{}", alt_action.action_id, i), step.action)
            };

            transitions.push((current, action, next.clone()));
            if reaches_target {
                break;
            }
            current = next;
        }

        debug!(
            branch = %branch.state_id,
            alternative,
            target = %target.state_id,
            steps = transitions.len(),
            "Authored deviation path"
        );
        Ok(transitions)
    }
}

/// `{name}` with `_linear` replaced by `_branching`, or suffixed when absent
fn branching_name(name: &str) -> String {
    if name.contains("_linear") {
        name.replace("_linear", "_branching")
    } else {
        format!("{}_branching", name)
    }
}

/// Add authored endings as terminals, keeping at most `limit` and making ids unique
fn register_endings(
    world: &mut World,
    endings: Vec<State>,
    limit: usize,
    outcome: Outcome,
) -> Vec<State> {
    let mut registered = Vec::new();
    for mut state in endings.into_iter().take(limit) {
        let base = state.state_id.clone();
        let mut suffix = 2;
        while world.state(&state.state_id).is_some() {
            state.state_id = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        state.metadata.outcome = Some(outcome);

        world.add_final_state(state.clone(), outcome == Outcome::Success);
        registered.push(state);
    }
    registered
}
