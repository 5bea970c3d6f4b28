//! World graph model.
//!
//! A [`World`] is a directed graph of [`State`]s connected by [`Transition`]s
//! labelled with [`Action`]s. States and actions are held once in
//! insertion-ordered id maps; transitions reference them by id and keep
//! their insertion order, which downstream consumers treat as presentation
//! and traversal order.
//!
//! Validation is lazy: the model can be built incrementally and a missing
//! reference is reported as a [`StructuralError`] by the first operation
//! that needs it.

mod document;
mod paths;
mod types;

#[cfg(test)]
#[path = "world_tests.rs"]
mod world_tests;

pub use document::*;
pub use paths::*;
pub use types::*;
pub(crate) use types::lenient_f64;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{StructuralError, StructuralResult};

/// A scenario graph of states, actions and transitions.
#[derive(Debug, Clone, Default)]
pub struct World {
    /// Scenario name (e.g. "ikea_desk_linear").
    pub name: String,
    /// Free text description of the scenario.
    pub description: String,
    states: IndexMap<String, State>,
    actions: IndexMap<String, Action>,
    transitions: Vec<Transition>,
    initial_state: Option<String>,
    goal_states: IndexSet<String>,
    final_states: IndexSet<String>,
}

impl World {
    /// Create an empty world
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Register a state if its id is new. Returns `true` when inserted.
    ///
    /// The first registration of an id wins; later copies are ignored.
    pub fn add_state(&mut self, state: State) -> bool {
        if self.states.contains_key(&state.state_id) {
            return false;
        }
        self.states.insert(state.state_id.clone(), state);
        true
    }

    /// Register an action if its id is new. Returns `true` when inserted.
    pub fn add_action(&mut self, action: Action) -> bool {
        if self.actions.contains_key(&action.action_id) {
            return false;
        }
        self.actions.insert(action.action_id.clone(), action);
        true
    }

    /// Add a transition, registering its states and action if new.
    ///
    /// The transition is assigned the id `t_{index}`.
    pub fn add_transition(&mut self, start: State, action: Action, end: State) -> &Transition {
        let transition_id = format!("t_{}", self.transitions.len());
        self.add_transition_with_id(transition_id, start, action, end)
    }

    /// Add a transition with an explicit id, registering its states and action if new.
    pub fn add_transition_with_id(
        &mut self,
        transition_id: impl Into<String>,
        start: State,
        action: Action,
        end: State,
    ) -> &Transition {
        let transition = Transition::new(&start.state_id, &action.action_id, &end.state_id)
            .with_id(transition_id);

        self.add_state(start);
        self.add_state(end);
        self.add_action(action);

        self.transitions.push(transition);
        let index = self.transitions.len() - 1;
        &self.transitions[index]
    }

    /// Append a transition between already-registered states and action.
    pub fn push_transition(&mut self, transition: Transition) -> StructuralResult<()> {
        self.require_state(&transition.start_state_id)?;
        self.require_state(&transition.end_state_id)?;
        self.require_action(&transition.action_id)?;
        self.transitions.push(transition);
        Ok(())
    }

    /// Register a state and mark it as the initial state
    pub fn set_initial_state(&mut self, state: State) {
        self.initial_state = Some(state.state_id.clone());
        self.add_state(state);
    }

    /// Register a state and mark it as a goal (success terminal).
    ///
    /// Goal states are always final states too.
    pub fn add_goal_state(&mut self, state: State) {
        self.goal_states.insert(state.state_id.clone());
        self.final_states.insert(state.state_id.clone());
        self.add_state(state);
    }

    /// Register a state as a final state, optionally also a goal
    pub fn add_final_state(&mut self, state: State, is_goal: bool) {
        if is_goal {
            self.add_goal_state(state);
        } else {
            self.final_states.insert(state.state_id.clone());
            self.add_state(state);
        }
    }

    /// Mutable access to a state's metadata for annotation
    pub fn state_metadata_mut(&mut self, state_id: &str) -> StructuralResult<&mut StateMetadata> {
        self.states
            .get_mut(state_id)
            .map(|s| &mut s.metadata)
            .ok_or_else(|| StructuralError::UnknownState {
                state_id: state_id.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up a state by id
    pub fn state(&self, state_id: &str) -> Option<&State> {
        self.states.get(state_id)
    }

    /// Look up an action by id
    pub fn action(&self, action_id: &str) -> Option<&Action> {
        self.actions.get(action_id)
    }

    /// Look up a state by id, failing with a structural error
    pub fn require_state(&self, state_id: &str) -> StructuralResult<&State> {
        self.state(state_id)
            .ok_or_else(|| StructuralError::UnknownState {
                state_id: state_id.to_string(),
            })
    }

    /// Look up an action by id, failing with a structural error
    pub fn require_action(&self, action_id: &str) -> StructuralResult<&Action> {
        self.action(action_id)
            .ok_or_else(|| StructuralError::UnknownAction {
                action_id: action_id.to_string(),
            })
    }

    /// All states in registration order
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// All actions in registration order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    /// All transitions in insertion order
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Number of registered states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The initial state, if one was set and registered
    pub fn initial_state(&self) -> Option<&State> {
        self.initial_state.as_deref().and_then(|id| self.state(id))
    }

    /// The initial state, failing when unset or unregistered
    pub fn require_initial_state(&self) -> StructuralResult<&State> {
        let id = self
            .initial_state
            .as_deref()
            .ok_or(StructuralError::MissingInitialState)?;
        self.require_state(id)
    }

    /// Goal states in registration order
    pub fn goal_states(&self) -> impl Iterator<Item = &State> {
        self.goal_states.iter().filter_map(|id| self.state(id))
    }

    /// States explicitly registered as final (goals plus failure terminals)
    pub fn registered_final_states(&self) -> impl Iterator<Item = &State> {
        self.final_states.iter().filter_map(|id| self.state(id))
    }

    /// Whether any goal state is registered
    pub fn has_goal_states(&self) -> bool {
        !self.goal_states.is_empty()
    }

    /// Transitions leaving a state, in insertion order
    pub fn outgoing<'a>(&'a self, state_id: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions
            .iter()
            .filter(move |t| t.start_state_id == state_id)
    }

    /// Resolve the endpoints and action of a transition
    pub fn resolve(&self, transition: &Transition) -> StructuralResult<(&State, &Action, &State)> {
        let dangling = |state_id: &str| StructuralError::DanglingEndpoint {
            transition_id: transition.label(),
            state_id: state_id.to_string(),
        };
        let start = self
            .state(&transition.start_state_id)
            .ok_or_else(|| dangling(&transition.start_state_id))?;
        let end = self
            .state(&transition.end_state_id)
            .ok_or_else(|| dangling(&transition.end_state_id))?;
        let action = self.require_action(&transition.action_id)?;
        Ok((start, action, end))
    }

    // ------------------------------------------------------------------
    // Graph queries
    // ------------------------------------------------------------------

    /// Actions available at a state, in transition-insertion order
    pub fn get_possible_actions(&self, state_id: &str) -> Vec<&Action> {
        self.outgoing(state_id)
            .filter_map(|t| self.action(&t.action_id))
            .collect()
    }

    /// End states reachable from a state, optionally through one action.
    ///
    /// Normally a singleton; callers that need one outcome take the first.
    pub fn get_next_states(&self, state_id: &str, action_id: Option<&str>) -> Vec<&State> {
        self.outgoing(state_id)
            .filter(|t| action_id.map_or(true, |a| t.action_id == a))
            .filter_map(|t| self.state(&t.end_state_id))
            .collect()
    }

    /// Whether a state is registered as a goal
    pub fn is_goal_state(&self, state_id: &str) -> bool {
        self.goal_states.contains(state_id)
    }

    /// Whether a state has no outgoing transitions
    pub fn is_final_state(&self, state_id: &str) -> bool {
        self.outgoing(state_id).next().is_none()
    }

    /// All states without outgoing transitions, in registration order
    pub fn get_final_states(&self) -> Vec<&State> {
        self.states()
            .filter(|s| self.is_final_state(&s.state_id))
            .collect()
    }

    /// Run every structural check eagerly.
    ///
    /// Checks the initial state, every transition endpoint and action, the
    /// goal and final registrations, and that path enumeration terminates.
    pub fn validate(&self) -> StructuralResult<()> {
        self.require_initial_state()?;

        for transition in &self.transitions {
            self.resolve(transition)?;
        }

        for id in self.goal_states.iter().chain(self.final_states.iter()) {
            self.require_state(id)?;
        }

        let paths = self.get_all_paths()?;
        debug!(world = %self.name, paths = paths.len(), "World validated");
        Ok(())
    }
}
