//! Media traversal engine.
//!
//! Walks a text [`World`](crate::world::World) and renders one image per
//! state ([`ImageWorldGenerator`]), then one video per edge of the resulting
//! image world ([`VideoWorldGenerator`]). Each child image is conditioned on
//! its graph parent's image, so a node rendered once is reused for every
//! outgoing edge. Work is strictly sequential and checkpointed per unit.

mod images;
mod videos;

pub use images::{ImageSettings, ImageStrategy, ImageWorldGenerator};
pub use videos::{VideoSettings, VideoStrategy, VideoWorldGenerator};

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::PersistenceResult;
use crate::storage::{read_json, write_json};
use crate::world::StateMetadata;

/// Outcome of rendering one node or edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    #[default]
    Completed,
    Failed,
    /// Not attempted because an input artifact was missing.
    Skipped,
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStatus::Completed => write!(f, "completed"),
            RenderStatus::Failed => write!(f, "failed"),
            RenderStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A state of the media graph with its rendered image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageState {
    pub state_id: String,
    pub text_description: String,
    /// `None` when the render failed.
    pub image_path: Option<PathBuf>,
    /// Exact prompt sent to the renderer.
    pub generation_prompt: String,
    #[serde(default)]
    pub parent_state_id: Option<String>,
    #[serde(default)]
    pub parent_action_id: Option<String>,
    /// Image this one was conditioned on; `None` when rendered from text.
    #[serde(default)]
    pub reference_image: Option<PathBuf>,
    #[serde(default)]
    pub metadata: StateMetadata,
    #[serde(default)]
    pub status: RenderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An edge of the image graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTransition {
    pub start_state_id: String,
    pub action_id: String,
    pub end_state_id: String,
    pub action_description: String,
    #[serde(default)]
    pub video_path: Option<PathBuf>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// An edge of the video graph with its rendered clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTransition {
    pub start_state_id: String,
    pub action_id: String,
    pub end_state_id: String,
    pub action_description: String,
    pub start_image_path: Option<PathBuf>,
    pub end_image_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub generation_prompt: String,
    /// Job details such as `result_id` and `status`.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub status: RenderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a media world was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub generation_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_perspective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub run_id: Uuid,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationMetadata {
    /// Metadata for a new run stamped with the current time
    pub fn new(model: impl Into<String>, generation_strategy: impl fmt::Display) -> Self {
        Self {
            model: model.into(),
            timestamp: Utc::now(),
            generation_strategy: generation_strategy.to_string(),
            aspect_ratio: None,
            camera_perspective: None,
            resolution: None,
            run_id: Uuid::new_v4(),
            extra: Map::new(),
        }
    }
}

/// Counts of node or edge outcomes in a media world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn from_statuses(statuses: impl Iterator<Item = RenderStatus>) -> Self {
        statuses.fold(Self::default(), |mut summary, status| {
            match status {
                RenderStatus::Completed => summary.completed += 1,
                RenderStatus::Failed => summary.failed += 1,
                RenderStatus::Skipped => summary.skipped += 1,
            }
            summary
        })
    }

    /// Whether any unit failed
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Image layer of a world: one image per rendered state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageWorld {
    pub name: String,
    /// Text world this was generated from.
    pub text_world_source: String,
    pub generation_metadata: GenerationMetadata,
    pub states: Vec<ImageState>,
    pub transitions: Vec<ImageTransition>,
}

impl ImageWorld {
    /// Look up a rendered state
    pub fn state(&self, state_id: &str) -> Option<&ImageState> {
        self.states.iter().find(|s| s.state_id == state_id)
    }

    /// Outcome counts over states
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_statuses(self.states.iter().map(|s| s.status))
    }

    /// Write as JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        write_json(path.as_ref(), self).await
    }

    /// Read from JSON
    pub async fn load(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        read_json(path.as_ref()).await
    }
}

/// Video layer of a world: the image states plus one clip per edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoWorld {
    pub name: String,
    /// Image world this was generated from.
    pub image_world_source: String,
    pub generation_metadata: GenerationMetadata,
    pub states: Vec<ImageState>,
    pub transitions: Vec<VideoTransition>,
}

impl VideoWorld {
    /// Look up a transition by its endpoints
    pub fn transition(&self, start_state_id: &str, end_state_id: &str) -> Option<&VideoTransition> {
        self.transitions
            .iter()
            .find(|t| t.start_state_id == start_state_id && t.end_state_id == end_state_id)
    }

    /// Look up the transition taking `action_id` between two states
    pub fn transition_via(
        &self,
        start_state_id: &str,
        action_id: &str,
        end_state_id: &str,
    ) -> Option<&VideoTransition> {
        self.transitions.iter().find(|t| {
            t.start_state_id == start_state_id
                && t.action_id == action_id
                && t.end_state_id == end_state_id
        })
    }

    /// Outcome counts over transitions
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_statuses(self.transitions.iter().map(|t| t.status))
    }

    /// Write as JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        write_json(path.as_ref(), self).await
    }

    /// Read from JSON
    pub async fn load(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        read_json(path.as_ref()).await
    }
}

/// Receives the partial media world after every unit of work.
#[async_trait]
pub trait ProgressSink<W: Sync>: Send + Sync {
    async fn record(&self, world: &W) -> PersistenceResult<()>;
}

/// Sink that rewrites a JSON snapshot of the partial world.
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl<W: Serialize + Sync> ProgressSink<W> for JsonSnapshot {
    async fn record(&self, world: &W) -> PersistenceResult<()> {
        write_json(&self.path, world).await
    }
}

/// `{text_world}_images_{YYYYmmdd_HHMMSS}`
pub fn image_world_name(text_world_name: &str, at: DateTime<Utc>) -> String {
    format!("{}_images_{}", text_world_name, at.format("%Y%m%d_%H%M%S"))
}

/// `{image_world}_videos`
pub fn video_world_name(image_world_name: &str) -> String {
    format!("{}_videos", image_world_name)
}
