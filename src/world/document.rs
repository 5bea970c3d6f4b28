//! JSON document form of a [`World`].
//!
//! On disk every transition embeds its full start state, action and end
//! state, and the initial/goal/final registrations embed full states. Older
//! files may carry bare state ids for those registrations or a single
//! `goal_state`; both are accepted on load.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Action, State, Transition, World};
use crate::error::{AppResult, PersistenceError, StructuralError, StructuralResult};
use crate::storage::{read_json, write_json};

/// Transition with embedded endpoint and action objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDocument {
    #[serde(default)]
    pub transition_id: Option<String>,
    pub start_state: State,
    pub action: Action,
    pub end_state: State,
}

/// A state registration: either the full object or just its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateRef {
    Embedded(State),
    Id(String),
}

impl StateRef {
    fn state_id(&self) -> &str {
        match self {
            StateRef::Embedded(state) => &state.state_id,
            StateRef::Id(id) => id,
        }
    }
}

/// Serialized world file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub states: Vec<State>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub transitions: Vec<TransitionDocument>,
    #[serde(default)]
    pub initial_state: Option<StateRef>,
    #[serde(default)]
    pub goal_states: Vec<StateRef>,
    #[serde(default)]
    pub final_states: Vec<StateRef>,
    /// Legacy single-goal field.
    #[serde(default, skip_serializing)]
    pub goal_state: Option<StateRef>,
}

impl WorldDocument {
    /// Capture a world, embedding full objects in every transition
    pub fn from_world(world: &World) -> StructuralResult<Self> {
        let transitions = world
            .transitions()
            .iter()
            .map(|t| {
                let (start, action, end) = world.resolve(t)?;
                Ok(TransitionDocument {
                    transition_id: t.transition_id.clone(),
                    start_state: start.clone(),
                    action: action.clone(),
                    end_state: end.clone(),
                })
            })
            .collect::<StructuralResult<Vec<_>>>()?;

        Ok(Self {
            name: world.name.clone(),
            description: world.description.clone(),
            states: world.states().cloned().collect(),
            actions: world.actions().cloned().collect(),
            transitions,
            initial_state: world.initial_state().cloned().map(StateRef::Embedded),
            goal_states: world
                .goal_states()
                .cloned()
                .map(StateRef::Embedded)
                .collect(),
            final_states: world
                .registered_final_states()
                .cloned()
                .map(StateRef::Embedded)
                .collect(),
            goal_state: None,
        })
    }

    /// Rebuild the in-memory world.
    ///
    /// States listed in `states` are registered first so their order and
    /// metadata win over copies embedded in transitions.
    pub fn into_world(self) -> StructuralResult<World> {
        let mut world = World::new(self.name, self.description);

        for state in self.states {
            world.add_state(state);
        }
        for action in self.actions {
            world.add_action(action);
        }

        for doc in self.transitions {
            let mut transition = Transition::new(
                &doc.start_state.state_id,
                &doc.action.action_id,
                &doc.end_state.state_id,
            );
            transition.transition_id = doc.transition_id;
            world.add_state(doc.start_state);
            world.add_state(doc.end_state);
            world.add_action(doc.action);
            world.push_transition(transition)?;
        }

        if let Some(initial) = self.initial_state {
            let state = resolve_ref(&mut world, initial)?;
            world.set_initial_state(state);
        }

        let goals = self.goal_states.into_iter().chain(self.goal_state);
        for goal in goals {
            let state = resolve_ref(&mut world, goal)?;
            world.add_goal_state(state);
        }

        for terminal in self.final_states {
            let is_goal = world.is_goal_state(terminal.state_id());
            let state = resolve_ref(&mut world, terminal)?;
            world.add_final_state(state, is_goal);
        }

        Ok(world)
    }
}

/// Resolve a registration against the world's states, registering embedded
/// states that were not listed elsewhere.
fn resolve_ref(world: &mut World, state_ref: StateRef) -> StructuralResult<State> {
    match state_ref {
        StateRef::Embedded(state) => {
            world.add_state(state.clone());
            Ok(world.require_state(&state.state_id)?.clone())
        }
        StateRef::Id(id) => world
            .state(&id)
            .cloned()
            .ok_or(StructuralError::UnknownState { state_id: id }),
    }
}

impl World {
    /// Serialize to a pretty-printed JSON document
    pub fn to_json(&self) -> AppResult<String> {
        let doc = WorldDocument::from_world(self)?;
        Ok(serde_json::to_string_pretty(&doc).map_err(PersistenceError::from)?)
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> AppResult<World> {
        let doc: WorldDocument =
            serde_json::from_str(json).map_err(PersistenceError::from)?;
        Ok(doc.into_world()?)
    }

    /// Write the world document to a file, creating parent directories
    pub async fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let doc = WorldDocument::from_world(self)?;
        write_json(path.as_ref(), &doc).await?;
        Ok(())
    }

    /// Load a world document from a file
    pub async fn load(path: impl AsRef<Path>) -> AppResult<World> {
        let doc: WorldDocument = read_json(path.as_ref()).await?;
        Ok(doc.into_world()?)
    }

    /// Build a linear world from authored states and steps.
    ///
    /// The world is named `{scenario}_linear`; `s0` (or the first state) is
    /// initial and the last state is the goal.
    pub fn from_linear_authoring(
        scenario: &str,
        description: &str,
        states: Vec<State>,
        steps: Vec<super::LinearStep>,
    ) -> StructuralResult<World> {
        let first = states
            .iter()
            .find(|s| s.state_id == "s0")
            .or_else(|| states.first())
            .cloned()
            .ok_or_else(|| StructuralError::InvalidLinearWorld {
                message: "no states authored".to_string(),
            })?;
        let last = states
            .last()
            .cloned()
            .ok_or_else(|| StructuralError::InvalidLinearWorld {
                message: "no states authored".to_string(),
            })?;

        let mut world = World::new(format!("{}_linear", scenario), description);
        for state in states {
            world.add_state(state);
        }

        for step in steps {
            let start = world.require_state(&step.from_state)?.clone();
            let end = world.require_state(&step.to_state)?.clone();
            world.add_transition(start, step.action, end);
        }

        world.set_initial_state(first);
        world.add_goal_state(last);
        Ok(world)
    }
}
