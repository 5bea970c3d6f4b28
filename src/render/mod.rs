//! Render collaborators.
//!
//! [`ImageRenderer`] produces one still per state, optionally conditioned on
//! a parent image. [`VideoRenderer`] runs asynchronous jobs producing a clip
//! between two stills; [`wait_for_job`] polls a job to completion.

mod http;

pub use http::HttpRenderer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};

/// A rendered file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Local path of the artifact.
    pub path: PathBuf,
    /// Backend reference, when the backend keeps one.
    pub remote_uri: Option<String>,
}

impl Artifact {
    /// Artifact with no backend reference
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remote_uri: None,
        }
    }
}

/// Produces state images.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    /// Model identifier recorded in generation metadata
    fn model_name(&self) -> &str;

    /// Render an image from text alone
    async fn render_from_text(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        output: &Path,
    ) -> RenderResult<Artifact>;

    /// Render an image as a variation of `base`
    async fn render_conditioned(
        &self,
        prompt: &str,
        base: &Path,
        aspect_ratio: &str,
        output: &Path,
    ) -> RenderResult<Artifact>;
}

/// Handle to a submitted video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub id: String,
}

/// Lifecycle of a video job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    /// Whether the job will not change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" | "pending" => Ok(JobState::Queued),
            "running" | "processing" => Ok(JobState::Running),
            "completed" | "succeeded" | "done" => Ok(JobState::Completed),
            "failed" | "error" => Ok(JobState::Failed),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// Snapshot of a video job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    pub error: Option<String>,
    /// Backend identifier of the finished artifact.
    pub result_id: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            error: None,
            result_id: None,
        }
    }
}

/// Produces transition videos through asynchronous jobs.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Model identifier recorded in generation metadata
    fn model_name(&self) -> &str;

    /// Submit a job for a clip from `start` to `end`
    async fn render_transition(
        &self,
        prompt: &str,
        start: &Path,
        end: &Path,
        resolution: &str,
    ) -> RenderResult<RenderJob>;

    /// Current status of a job
    async fn poll(&self, job: &RenderJob) -> RenderResult<JobStatus>;

    /// Fetch a completed job's clip to `output`
    async fn download(&self, job: &RenderJob, output: &Path) -> RenderResult<()>;
}

/// How often and how long to poll a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

impl From<&RenderConfig> for PollPolicy {
    fn from(config: &RenderConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_millis(config.max_wait_ms),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

/// Poll `job` until it completes, fails, or `policy.max_wait` elapses.
///
/// Returns the completed status; a failed job becomes
/// [`RenderError::JobFailed`] and an expired wait [`RenderError::Timeout`].
pub async fn wait_for_job(
    renderer: &dyn VideoRenderer,
    job: &RenderJob,
    policy: PollPolicy,
) -> RenderResult<JobStatus> {
    let start = Instant::now();

    loop {
        let status = renderer.poll(job).await?;
        debug!(job = %job.id, state = %status.state, "Polled render job");

        match status.state {
            JobState::Completed => return Ok(status),
            JobState::Failed => {
                return Err(RenderError::JobFailed {
                    job_id: job.id.clone(),
                    message: status
                        .error
                        .unwrap_or_else(|| "no error message".to_string()),
                })
            }
            JobState::Queued | JobState::Running => {}
        }

        let waited = start.elapsed();
        if waited + policy.interval > policy.max_wait {
            return Err(RenderError::Timeout {
                job_id: job.id.clone(),
                waited_ms: waited.as_millis() as u64,
            });
        }
        tokio::time::sleep(policy.interval).await;
    }
}
