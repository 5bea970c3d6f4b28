use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::{info, warn};

use super::{
    image_world_name, GenerationMetadata, ImageState, ImageTransition, ImageWorld, ProgressSink,
    RenderStatus,
};
use crate::config::{CameraPerspective, RenderConfig};
use crate::error::{AppResult, RenderResult, StructuralError};
use crate::prompts::state_image_prompt;
use crate::render::{Artifact, ImageRenderer};
use crate::storage::{node_key, CheckpointStore};
use crate::world::{Action, State, World};

/// Which states of a world get images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStrategy {
    /// The first successful path only.
    CanonicalPath,
    /// Every state reachable from the initial state, breadth first.
    #[default]
    FullWorld,
}

impl fmt::Display for ImageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStrategy::CanonicalPath => write!(f, "canonical_path"),
            ImageStrategy::FullWorld => write!(f, "full_world"),
        }
    }
}

impl std::str::FromStr for ImageStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical_path" | "canonical" => Ok(ImageStrategy::CanonicalPath),
            "full_world" | "full" => Ok(ImageStrategy::FullWorld),
            _ => Err(format!("Unknown image strategy: {}", s)),
        }
    }
}

/// Render settings for the image layer.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub aspect_ratio: String,
    pub camera_perspective: CameraPerspective,
    /// Parent of the per-world output directory.
    pub output_dir: PathBuf,
}

impl From<&RenderConfig> for ImageSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            aspect_ratio: config.aspect_ratio.clone(),
            camera_perspective: config.camera_perspective,
            output_dir: config.output_dir.clone(),
        }
    }
}

/// Builds an [`ImageWorld`] from a text world.
pub struct ImageWorldGenerator {
    renderer: Arc<dyn ImageRenderer>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: ImageSettings,
    source: Option<String>,
    resume_from: Option<ImageWorld>,
    on_progress: Option<Arc<dyn ProgressSink<ImageWorld>>>,
}

/// Image world under construction.
struct Traversal {
    world: ImageWorld,
    dir: PathBuf,
    index: HashMap<String, usize>,
}

impl Traversal {
    fn rendered(&self, state_id: &str) -> Option<&ImageState> {
        self.index.get(state_id).map(|&i| &self.world.states[i])
    }

    fn push(&mut self, state: ImageState) {
        self.index
            .insert(state.state_id.clone(), self.world.states.len());
        self.world.states.push(state);
    }

    fn record_edge(&mut self, start: &State, action: &Action, end: &State) {
        self.world.transitions.push(ImageTransition {
            start_state_id: start.state_id.clone(),
            action_id: action.action_id.clone(),
            end_state_id: end.state_id.clone(),
            action_description: action.description.clone(),
            video_path: None,
            metadata: Map::new(),
        });
    }
}

impl ImageWorldGenerator {
    pub fn new(
        renderer: Arc<dyn ImageRenderer>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: ImageSettings,
    ) -> Self {
        Self {
            renderer,
            checkpoints,
            settings,
            source: None,
            resume_from: None,
            on_progress: None,
        }
    }

    /// Record `source` (usually the text world's file) as `text_world_source`
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Reuse images recorded by an earlier, interrupted run.
    ///
    /// Only nodes the checkpoint store lists as completed are reused; the
    /// earlier world's name and output directory are kept.
    pub fn with_resume_from(mut self, previous: ImageWorld) -> Self {
        self.resume_from = Some(previous);
        self
    }

    /// Persist the partial world after every node
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink<ImageWorld>>) -> Self {
        self.on_progress = Some(sink);
        self
    }

    /// Render a world's images with the given strategy.
    ///
    /// Render failures are recorded on the affected [`ImageState`] and the
    /// traversal continues. Structural and persistence errors abort.
    pub async fn generate(&self, world: &World, strategy: ImageStrategy) -> AppResult<ImageWorld> {
        let mut traversal = self.start(world, strategy);

        info!(
            world = %world.name,
            image_world = %traversal.world.name,
            strategy = %strategy,
            "Generating image world"
        );

        match strategy {
            ImageStrategy::CanonicalPath => self.canonical_path(world, &mut traversal).await?,
            ImageStrategy::FullWorld => self.full_world(world, &mut traversal).await?,
        }

        let summary = traversal.world.summary();
        info!(
            image_world = %traversal.world.name,
            states = traversal.world.states.len(),
            transitions = traversal.world.transitions.len(),
            failed = summary.failed,
            "Image world generated"
        );
        Ok(traversal.world)
    }

    /// Render a single state outside a traversal.
    ///
    /// With a parent, the image is conditioned on the parent's image in
    /// `image_world` when it has one. Checkpoints are not consulted.
    pub async fn generate_state_on_demand(
        &self,
        world: &World,
        image_world: &ImageWorld,
        state_id: &str,
        parent: Option<(&str, &str)>,
    ) -> AppResult<ImageState> {
        let state = world.require_state(state_id)?;
        let parent = match parent {
            Some((parent_id, action_id)) => Some((
                world.require_state(parent_id)?,
                world.require_action(action_id)?,
            )),
            None => None,
        };
        let reference = parent
            .and_then(|(p, _)| image_world.state(&p.state_id))
            .and_then(|s| s.image_path.clone());

        let output = self
            .settings
            .output_dir
            .join(&image_world.name)
            .join(image_file_name(state_id, image_world.states.len()));

        let (prompt, result) = self
            .render_image(state, parent.map(|(_, a)| a), reference.as_deref(), &output)
            .await;
        let artifact = result?;

        info!(state = %state_id, path = %artifact.path.display(), "Rendered state on demand");
        Ok(ImageState {
            state_id: state.state_id.clone(),
            text_description: state.description.clone(),
            image_path: Some(artifact.path),
            generation_prompt: prompt,
            parent_state_id: parent.map(|(p, _)| p.state_id.clone()),
            parent_action_id: parent.map(|(_, a)| a.action_id.clone()),
            reference_image: reference,
            metadata: state.metadata.clone(),
            status: RenderStatus::Completed,
            error: None,
        })
    }

    fn start(&self, world: &World, strategy: ImageStrategy) -> Traversal {
        let name = match &self.resume_from {
            Some(previous) => previous.name.clone(),
            None => image_world_name(&world.name, Utc::now()),
        };

        let mut metadata = GenerationMetadata::new(self.renderer.model_name(), strategy);
        metadata.aspect_ratio = Some(self.settings.aspect_ratio.clone());
        metadata.camera_perspective = Some(self.settings.camera_perspective.to_string());

        Traversal {
            dir: self.settings.output_dir.join(&name),
            world: ImageWorld {
                name,
                text_world_source: self.source.clone().unwrap_or_else(|| world.name.clone()),
                generation_metadata: metadata,
                states: Vec::new(),
                transitions: Vec::new(),
            },
            index: HashMap::new(),
        }
    }

    async fn canonical_path(&self, world: &World, traversal: &mut Traversal) -> AppResult<()> {
        if !world.has_goal_states() {
            return Err(StructuralError::NoGoalStates.into());
        }
        let path = world
            .get_successful_paths()?
            .into_iter()
            .next()
            .ok_or(StructuralError::NoSuccessfulPath)?;

        let initial = world.require_initial_state()?;
        self.render_node(traversal, initial, None).await?;

        for transition in &path.transitions {
            let (start, action, end) = world.resolve(transition)?;
            if traversal.rendered(&end.state_id).is_none() {
                self.render_node(traversal, end, Some((start, action)))
                    .await?;
            }
            traversal.record_edge(start, action, end);
        }
        Ok(())
    }

    async fn full_world(&self, world: &World, traversal: &mut Traversal) -> AppResult<()> {
        let initial = world.require_initial_state()?;
        self.render_node(traversal, initial, None).await?;

        let mut queue: VecDeque<_> = world.outgoing(&initial.state_id).collect();
        while let Some(transition) = queue.pop_front() {
            let (start, action, end) = world.resolve(transition)?;
            if traversal.rendered(&end.state_id).is_none() {
                self.render_node(traversal, end, Some((start, action)))
                    .await?;
                queue.extend(world.outgoing(&end.state_id));
            }
            traversal.record_edge(start, action, end);
        }
        Ok(())
    }

    /// Render one node, or reuse it from the resumed run, and record it
    async fn render_node(
        &self,
        traversal: &mut Traversal,
        state: &State,
        parent: Option<(&State, &Action)>,
    ) -> AppResult<()> {
        let key = node_key(&state.state_id);

        if self.checkpoints.has_completed(&key).await? {
            if let Some(previous) = self.resumed_state(&state.state_id) {
                info!(state = %state.state_id, "Reusing image from earlier run");
                traversal.push(previous.clone());
                return self.report_progress(&traversal.world).await;
            }
            warn!(
                state = %state.state_id,
                "Checkpoint lists state as complete but no earlier image is recorded; rendering again"
            );
        }

        let reference = parent
            .and_then(|(p, _)| traversal.rendered(&p.state_id))
            .and_then(|s| s.image_path.clone());
        let output = traversal
            .dir
            .join(image_file_name(&state.state_id, traversal.world.states.len()));

        let (prompt, result) = self
            .render_image(state, parent.map(|(_, a)| a), reference.as_deref(), &output)
            .await;

        let (image_path, status, error) = match result {
            Ok(artifact) => {
                self.checkpoints.mark_completed(&key).await?;
                info!(
                    state = %state.state_id,
                    path = %artifact.path.display(),
                    conditioned = reference.is_some(),
                    "State image rendered"
                );
                (Some(artifact.path), RenderStatus::Completed, None)
            }
            Err(e) => {
                self.checkpoints.mark_failed(&key).await?;
                warn!(state = %state.state_id, error = %e, "State image failed");
                (None, RenderStatus::Failed, Some(e.to_string()))
            }
        };

        traversal.push(ImageState {
            state_id: state.state_id.clone(),
            text_description: state.description.clone(),
            image_path,
            generation_prompt: prompt,
            parent_state_id: parent.map(|(p, _)| p.state_id.clone()),
            parent_action_id: parent.map(|(_, a)| a.action_id.clone()),
            reference_image: reference,
            metadata: state.metadata.clone(),
            status,
            error,
        });
        self.report_progress(&traversal.world).await
    }

    /// Build the prompt and render, conditioned when a reference image exists.
    ///
    /// Without a reference the state is described in full, so children of a
    /// failed node still get a self-contained prompt.
    async fn render_image(
        &self,
        state: &State,
        action: Option<&Action>,
        reference: Option<&Path>,
        output: &Path,
    ) -> (String, RenderResult<Artifact>) {
        let aspect_ratio = self.settings.aspect_ratio.as_str();
        let perspective = self.settings.camera_perspective;

        match reference {
            Some(base) => {
                let prompt = state_image_prompt(state, action, perspective);
                let result = self
                    .renderer
                    .render_conditioned(&prompt, base, aspect_ratio, output)
                    .await;
                (prompt, result)
            }
            None => {
                let prompt = state_image_prompt(state, None, perspective);
                let result = self
                    .renderer
                    .render_from_text(&prompt, aspect_ratio, output)
                    .await;
                (prompt, result)
            }
        }
    }

    fn resumed_state(&self, state_id: &str) -> Option<&ImageState> {
        self.resume_from
            .as_ref()?
            .state(state_id)
            .filter(|s| s.status == RenderStatus::Completed && s.image_path.is_some())
    }

    async fn report_progress(&self, world: &ImageWorld) -> AppResult<()> {
        if let Some(sink) = &self.on_progress {
            sink.record(world).await?;
        }
        Ok(())
    }
}

/// `{state_id}_{index:03}.png`
fn image_file_name(state_id: &str, index: usize) -> String {
    format!("{}_{:03}.png", state_id, index)
}
