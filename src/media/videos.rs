use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{
    video_world_name, GenerationMetadata, ImageTransition, ImageWorld, ProgressSink,
    RenderStatus, VideoTransition, VideoWorld,
};
use crate::config::RenderConfig;
use crate::error::{AppResult, RenderError, RenderResult, StructuralError};
use crate::prompts::transition_video_prompt;
use crate::render::{wait_for_job, JobState, PollPolicy, VideoRenderer};
use crate::storage::{edge_key, CheckpointStore};

/// Which edges of an image world get videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStrategy {
    /// Every image-world transition.
    #[default]
    AllTransitions,
    /// Only the edges that supplied conditioning to their end state's image.
    CanonicalOnly,
}

impl fmt::Display for VideoStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoStrategy::AllTransitions => write!(f, "all_transitions"),
            VideoStrategy::CanonicalOnly => write!(f, "canonical_only"),
        }
    }
}

impl std::str::FromStr for VideoStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all_transitions" | "all" => Ok(VideoStrategy::AllTransitions),
            "canonical_only" | "canonical" => Ok(VideoStrategy::CanonicalOnly),
            _ => Err(format!("Unknown video strategy: {}", s)),
        }
    }
}

/// Render settings for the video layer.
#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub resolution: String,
    /// Parent of the per-world output directory.
    pub output_dir: PathBuf,
    pub poll: PollPolicy,
}

impl From<&RenderConfig> for VideoSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            resolution: config.resolution.clone(),
            output_dir: config.output_dir.clone(),
            poll: PollPolicy::from(config),
        }
    }
}

/// Builds a [`VideoWorld`] from an image world.
pub struct VideoWorldGenerator {
    renderer: Arc<dyn VideoRenderer>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: VideoSettings,
    resume_from: Option<VideoWorld>,
    on_progress: Option<Arc<dyn ProgressSink<VideoWorld>>>,
}

impl VideoWorldGenerator {
    pub fn new(
        renderer: Arc<dyn VideoRenderer>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: VideoSettings,
    ) -> Self {
        Self {
            renderer,
            checkpoints,
            settings,
            resume_from: None,
            on_progress: None,
        }
    }

    /// Reuse clips recorded by an earlier, interrupted run
    pub fn with_resume_from(mut self, previous: VideoWorld) -> Self {
        self.resume_from = Some(previous);
        self
    }

    /// Persist the partial world after every edge
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink<VideoWorld>>) -> Self {
        self.on_progress = Some(sink);
        self
    }

    /// Render the connecting clips of an image world.
    ///
    /// Edges missing either image are recorded as skipped; failed jobs are
    /// recorded as failed. Neither stops the traversal.
    pub async fn generate(
        &self,
        image_world: &ImageWorld,
        strategy: VideoStrategy,
    ) -> AppResult<VideoWorld> {
        let name = match &self.resume_from {
            Some(previous) => previous.name.clone(),
            None => video_world_name(&image_world.name),
        };
        let dir = self.settings.output_dir.join(&name);

        let mut metadata = GenerationMetadata::new(self.renderer.model_name(), strategy);
        metadata.aspect_ratio = image_world.generation_metadata.aspect_ratio.clone();
        metadata.resolution = Some(self.settings.resolution.clone());

        let mut video_world = VideoWorld {
            name,
            image_world_source: image_world.name.clone(),
            generation_metadata: metadata,
            states: image_world.states.clone(),
            transitions: Vec::new(),
        };

        let edges = select_edges(image_world, strategy);
        info!(
            image_world = %image_world.name,
            video_world = %video_world.name,
            strategy = %strategy,
            edges = edges.len(),
            "Generating video world"
        );

        // Parallel edges share a ledger key.
        let mut rendered_keys = HashSet::new();
        for (index, transition) in edges.into_iter().enumerate() {
            let video = self
                .render_edge(image_world, transition, &dir, index, &mut rendered_keys)
                .await?;
            video_world.transitions.push(video);
            if let Some(sink) = &self.on_progress {
                sink.record(&video_world).await?;
            }
        }

        let summary = video_world.summary();
        info!(
            video_world = %video_world.name,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Video world generated"
        );
        Ok(video_world)
    }

    /// Render the clip for one image-world edge outside a traversal.
    ///
    /// Checkpoints are not consulted; any failure is returned as an error.
    pub async fn generate_transition_on_demand(
        &self,
        image_world: &ImageWorld,
        start_state_id: &str,
        end_state_id: &str,
    ) -> AppResult<VideoTransition> {
        let (index, transition) = image_world
            .transitions
            .iter()
            .enumerate()
            .find(|(_, t)| t.start_state_id == start_state_id && t.end_state_id == end_state_id)
            .ok_or_else(|| StructuralError::UnknownTransition {
                start_state_id: start_state_id.to_string(),
                end_state_id: end_state_id.to_string(),
            })?;

        let mut video = pending_transition(image_world, transition);
        let (start_image, end_image) = edge_images(image_world, transition)?;
        let output = self
            .settings
            .output_dir
            .join(video_world_name(&image_world.name))
            .join(video_file_name(start_state_id, end_state_id, index));

        self.render_clip(
            &video.generation_prompt,
            start_image,
            end_image,
            &output,
            &mut video.metadata,
        )
        .await?;

        video.video_path = Some(output);
        video
            .metadata
            .insert("status".to_string(), json!(JobState::Completed));
        info!(start = %start_state_id, end = %end_state_id, "Rendered transition on demand");
        Ok(video)
    }

    async fn render_edge(
        &self,
        image_world: &ImageWorld,
        transition: &ImageTransition,
        dir: &Path,
        index: usize,
        rendered_keys: &mut HashSet<String>,
    ) -> AppResult<VideoTransition> {
        let key = edge_key(&transition.start_state_id, &transition.end_state_id);
        let mut video = pending_transition(image_world, transition);

        let (start_image, end_image) = match edge_images(image_world, transition) {
            Ok(images) => images,
            Err(e) => {
                warn!(edge = %key, error = %e, "Skipping transition without both images");
                video.status = RenderStatus::Skipped;
                video.error = Some(e.to_string());
                return Ok(video);
            }
        };

        if self.checkpoints.has_completed(&key).await? {
            if let Some(previous) = self.resumed_transition(transition) {
                info!(edge = %key, "Reusing video from earlier run");
                rendered_keys.insert(key.clone());
                return Ok(previous.clone());
            }
            if !rendered_keys.contains(&key) {
                warn!(
                    edge = %key,
                    "Checkpoint lists edge as complete but no earlier video is recorded; rendering again"
                );
            }
        }

        let output = dir.join(video_file_name(
            &transition.start_state_id,
            &transition.end_state_id,
            index,
        ));

        let result = self
            .render_clip(
                &video.generation_prompt,
                start_image,
                end_image,
                &output,
                &mut video.metadata,
            )
            .await;

        match result {
            Ok(()) => {
                self.checkpoints.mark_completed(&key).await?;
                rendered_keys.insert(key.clone());
                info!(edge = %key, path = %output.display(), "Transition video rendered");
                video
                    .metadata
                    .insert("status".to_string(), json!(JobState::Completed));
                video.video_path = Some(output);
            }
            Err(e) => {
                self.checkpoints.mark_failed(&key).await?;
                warn!(edge = %key, error = %e, "Transition video failed");
                video
                    .metadata
                    .insert("status".to_string(), json!(JobState::Failed));
                video.status = RenderStatus::Failed;
                video.error = Some(e.to_string());
            }
        }
        Ok(video)
    }

    /// Submit a job, wait for it and download the clip, noting job details in `metadata`
    async fn render_clip(
        &self,
        prompt: &str,
        start_image: &Path,
        end_image: &Path,
        output: &Path,
        metadata: &mut Map<String, Value>,
    ) -> RenderResult<()> {
        let job = self
            .renderer
            .render_transition(prompt, start_image, end_image, &self.settings.resolution)
            .await?;
        metadata.insert("job_id".to_string(), json!(job.id));

        let status = wait_for_job(self.renderer.as_ref(), &job, self.settings.poll).await?;
        if let Some(result_id) = &status.result_id {
            metadata.insert("result_id".to_string(), json!(result_id));
        }

        self.renderer.download(&job, output).await
    }

    fn resumed_transition(&self, transition: &ImageTransition) -> Option<&VideoTransition> {
        self.resume_from
            .as_ref()?
            .transition_via(
                &transition.start_state_id,
                &transition.action_id,
                &transition.end_state_id,
            )
            .filter(|t| t.status == RenderStatus::Completed && t.video_path.is_some())
    }
}

/// Edges to render under a strategy, in image-world order
fn select_edges(image_world: &ImageWorld, strategy: VideoStrategy) -> Vec<&ImageTransition> {
    match strategy {
        VideoStrategy::AllTransitions => image_world.transitions.iter().collect(),
        VideoStrategy::CanonicalOnly => image_world
            .transitions
            .iter()
            .filter(|t| {
                image_world.state(&t.end_state_id).is_some_and(|end| {
                    end.parent_state_id.as_deref() == Some(t.start_state_id.as_str())
                        && end
                            .parent_action_id
                            .as_deref()
                            .map_or(true, |a| a == t.action_id)
                })
            })
            .collect(),
    }
}

fn state_image<'w>(image_world: &'w ImageWorld, state_id: &str) -> RenderResult<&'w Path> {
    image_world
        .state(state_id)
        .and_then(|s| s.image_path.as_deref())
        .ok_or_else(|| RenderError::MissingInput {
            state_id: state_id.to_string(),
        })
}

fn edge_images<'w>(
    image_world: &'w ImageWorld,
    transition: &ImageTransition,
) -> RenderResult<(&'w Path, &'w Path)> {
    Ok((
        state_image(image_world, &transition.start_state_id)?,
        state_image(image_world, &transition.end_state_id)?,
    ))
}

fn state_description<'w>(image_world: &'w ImageWorld, state_id: &str) -> &'w str {
    image_world
        .state(state_id)
        .map(|s| s.text_description.as_str())
        .unwrap_or_default()
}

/// A transition record with its prompt and inputs filled in, not yet rendered
fn pending_transition(image_world: &ImageWorld, transition: &ImageTransition) -> VideoTransition {
    let image_path = |state_id: &str| {
        image_world
            .state(state_id)
            .and_then(|s| s.image_path.clone())
    };

    VideoTransition {
        start_state_id: transition.start_state_id.clone(),
        action_id: transition.action_id.clone(),
        end_state_id: transition.end_state_id.clone(),
        action_description: transition.action_description.clone(),
        start_image_path: image_path(&transition.start_state_id),
        end_image_path: image_path(&transition.end_state_id),
        video_path: None,
        generation_prompt: transition_video_prompt(
            &transition.action_description,
            state_description(image_world, &transition.start_state_id),
            state_description(image_world, &transition.end_state_id),
        ),
        metadata: Map::new(),
        status: RenderStatus::Completed,
        error: None,
    }
}

/// `{start}_to_{end}_{index:03}.mp4`
fn video_file_name(start_state_id: &str, end_state_id: &str, index: usize) -> String {
    format!("{}_to_{}_{:03}.mp4", start_state_id, end_state_id, index)
}
