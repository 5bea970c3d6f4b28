//! Path analysis over a [`World`]: enumeration, terminal classification,
//! decision points and reachability.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::{Action, Outcome, State, Transition, World};
use crate::error::{StructuralError, StructuralResult};

/// An ordered list of transitions from the initial state to a final state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldPath {
    /// Transitions in walk order.
    pub transitions: Vec<Transition>,
}

impl WorldPath {
    /// Number of transitions on the path
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether the path has no transitions (single-state world)
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Action ids along the path
    pub fn action_ids(&self) -> Vec<&str> {
        self.transitions.iter().map(|t| t.action_id.as_str()).collect()
    }

    /// State ids along the path, starting with `initial_state_id`
    pub fn state_ids<'a>(&'a self, initial_state_id: &'a str) -> Vec<&'a str> {
        let mut ids = vec![initial_state_id];
        ids.extend(self.transitions.iter().map(|t| t.end_state_id.as_str()));
        ids
    }

    /// Id of the state the path ends at, if it has any transitions
    pub fn terminal_state_id(&self) -> Option<&str> {
        self.transitions.last().map(|t| t.end_state_id.as_str())
    }
}

/// A state with more than one outgoing transition.
#[derive(Debug, Clone)]
pub struct DecisionPoint<'a> {
    /// The branching state.
    pub state: &'a State,
    /// Outgoing actions in transition order.
    pub actions: Vec<&'a Action>,
}

/// Classification of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalClass {
    /// Success when the state is a goal.
    pub outcome: Outcome,
    /// Quality from metadata; `None` when absent.
    pub quality: Option<f64>,
}

/// One terminal in a [`PathReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub state_id: String,
    pub description: String,
    pub outcome: Outcome,
    pub quality: Option<f64>,
}

/// One decision point in a [`PathReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub state_id: String,
    pub action_ids: Vec<String>,
}

/// Summary of a world's path structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathReport {
    pub world: String,
    pub states: usize,
    pub transitions: usize,
    pub total_paths: usize,
    pub successful_paths: usize,
    pub failed_paths: usize,
    /// Action ids of every path, in enumeration order.
    pub paths: Vec<Vec<String>>,
    pub decision_points: Vec<DecisionSummary>,
    pub terminals: Vec<TerminalSummary>,
    /// States not reachable from the initial state.
    pub orphaned_states: Vec<String>,
}

impl std::fmt::Display for PathReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "World: {}", self.world)?;
        writeln!(f, "States: {}  Transitions: {}", self.states, self.transitions)?;
        writeln!(
            f,
            "Paths: {} ({} successful, {} failed)",
            self.total_paths, self.successful_paths, self.failed_paths
        )?;

        for (i, path) in self.paths.iter().enumerate() {
            let actions = if path.is_empty() {
                "(initial state is terminal)".to_string()
            } else {
                path.join(" -> ")
            };
            writeln!(f, "  Path {}: {}", i + 1, actions)?;
        }

        if !self.decision_points.is_empty() {
            writeln!(f, "Decision points:")?;
            for point in &self.decision_points {
                writeln!(f, "  {}: {}", point.state_id, point.action_ids.join(", "))?;
            }
        }

        writeln!(f, "Terminals:")?;
        for terminal in &self.terminals {
            match terminal.quality {
                Some(q) => writeln!(
                    f,
                    "  {} [{}, quality {:.2}]: {}",
                    terminal.state_id, terminal.outcome, q, terminal.description
                )?,
                None => writeln!(
                    f,
                    "  {} [{}]: {}",
                    terminal.state_id, terminal.outcome, terminal.description
                )?,
            }
        }

        if self.orphaned_states.is_empty() {
            write!(f, "Orphaned states: none")
        } else {
            write!(f, "Orphaned states: {}", self.orphaned_states.join(", "))
        }
    }
}

impl World {
    /// Every simple path from the initial state to a final state.
    ///
    /// Depth-first, following each state's outgoing transitions in
    /// transition-list order; the returned order is the discovery order.
    /// A state revisited on the current path is a [`StructuralError::Cycle`].
    pub fn get_all_paths(&self) -> StructuralResult<Vec<WorldPath>> {
        let initial = self.require_initial_state()?;

        let mut paths = Vec::new();
        let mut on_path = HashSet::new();
        let mut current = Vec::new();
        self.collect_paths(&initial.state_id, &mut on_path, &mut current, &mut paths)?;

        Ok(paths)
    }

    fn collect_paths<'a>(
        &'a self,
        state_id: &'a str,
        on_path: &mut HashSet<&'a str>,
        current: &mut Vec<Transition>,
        paths: &mut Vec<WorldPath>,
    ) -> StructuralResult<()> {
        if self.is_final_state(state_id) {
            paths.push(WorldPath {
                transitions: current.clone(),
            });
            return Ok(());
        }

        on_path.insert(state_id);

        for transition in self.outgoing(state_id) {
            let (_, _, end) = self.resolve(transition)?;
            if on_path.contains(end.state_id.as_str()) {
                return Err(StructuralError::Cycle {
                    state_id: end.state_id.clone(),
                });
            }

            current.push(transition.clone());
            self.collect_paths(&transition.end_state_id, on_path, current, paths)?;
            current.pop();
        }

        on_path.remove(state_id);
        Ok(())
    }

    /// Paths ending at a goal state
    pub fn get_successful_paths(&self) -> StructuralResult<Vec<WorldPath>> {
        let initial = self.require_initial_state()?;
        Ok(self
            .get_all_paths()?
            .into_iter()
            .filter(|p| self.is_goal_state(p.terminal_state_id().unwrap_or(&initial.state_id)))
            .collect())
    }

    /// Paths ending at a non-goal state
    pub fn get_failed_paths(&self) -> StructuralResult<Vec<WorldPath>> {
        let initial = self.require_initial_state()?;
        Ok(self
            .get_all_paths()?
            .into_iter()
            .filter(|p| !self.is_goal_state(p.terminal_state_id().unwrap_or(&initial.state_id)))
            .collect())
    }

    /// States with more than one outgoing transition, with their actions
    pub fn get_decision_points(&self) -> Vec<DecisionPoint<'_>> {
        self.states()
            .filter_map(|state| {
                let actions = self.get_possible_actions(&state.state_id);
                (actions.len() > 1).then_some(DecisionPoint { state, actions })
            })
            .collect()
    }

    /// Success when the state is a goal, failure otherwise.
    ///
    /// Quality is read from metadata and stays `None` when absent.
    pub fn classify_terminal(&self, state: &State) -> TerminalClass {
        TerminalClass {
            outcome: if self.is_goal_state(&state.state_id) {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            quality: state.metadata.quality,
        }
    }

    /// States reachable from the initial state, in breadth-first order
    pub fn reachable_states(&self) -> StructuralResult<Vec<&State>> {
        let initial = self.require_initial_state()?;

        let mut seen = HashSet::from([initial.state_id.as_str()]);
        let mut order = vec![initial];
        let mut queue = VecDeque::from([initial]);

        while let Some(state) = queue.pop_front() {
            for transition in self.outgoing(&state.state_id) {
                let (_, _, end) = self.resolve(transition)?;
                if seen.insert(end.state_id.as_str()) {
                    order.push(end);
                    queue.push_back(end);
                }
            }
        }

        Ok(order)
    }

    /// Summarize paths, terminals, decision points and orphaned states
    pub fn path_report(&self) -> StructuralResult<PathReport> {
        let initial = self.require_initial_state()?;
        let paths = self.get_all_paths()?;
        let successful = paths
            .iter()
            .filter(|p| self.is_goal_state(p.terminal_state_id().unwrap_or(&initial.state_id)))
            .count();

        let reachable: HashSet<&str> = self
            .reachable_states()?
            .into_iter()
            .map(|s| s.state_id.as_str())
            .collect();

        Ok(PathReport {
            world: self.name.clone(),
            states: self.state_count(),
            transitions: self.transitions().len(),
            total_paths: paths.len(),
            successful_paths: successful,
            failed_paths: paths.len() - successful,
            paths: paths
                .iter()
                .map(|p| p.action_ids().into_iter().map(String::from).collect())
                .collect(),
            decision_points: self
                .get_decision_points()
                .into_iter()
                .map(|d| DecisionSummary {
                    state_id: d.state.state_id.clone(),
                    action_ids: d.actions.iter().map(|a| a.action_id.clone()).collect(),
                })
                .collect(),
            terminals: self
                .get_final_states()
                .into_iter()
                .map(|s| {
                    let class = self.classify_terminal(s);
                    TerminalSummary {
                        state_id: s.state_id.clone(),
                        description: s.description.clone(),
                        outcome: class.outcome,
                        quality: class.quality,
                    }
                })
                .collect(),
            orphaned_states: self
                .states()
                .filter(|s| !reachable.contains(s.state_id.as_str()))
                .map(|s| s.state_id.clone())
                .collect(),
        })
    }
}
