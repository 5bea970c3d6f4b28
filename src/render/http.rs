use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Artifact, ImageRenderer, JobState, JobStatus, RenderJob, VideoRenderer};
use crate::backend::{
    GenerationClient, ImageRequest, ImageResponse, JobStatusResponse, VideoJobRequest,
    VideoJobResponse,
};
use crate::error::{BackendError, RenderError, RenderResult};

/// Image and video renderer backed by the HTTP generation service.
#[derive(Clone)]
pub struct HttpRenderer {
    client: GenerationClient,
    image_model: String,
    video_model: String,
}

impl HttpRenderer {
    pub fn new(
        client: GenerationClient,
        image_model: impl Into<String>,
        video_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            image_model: image_model.into(),
            video_model: video_model.into(),
        }
    }

    /// Upload a local image, returning its backend reference
    async fn upload_image(&self, path: &Path) -> RenderResult<String> {
        let bytes = tokio::fs::read(path).await.map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let uri = self.client.upload(bytes, image_content_type(path)).await?;
        debug!(path = %path.display(), uri = %uri, "Uploaded reference image");
        Ok(uri)
    }

    async fn render_image(
        &self,
        prompt: &str,
        reference_uri: Option<String>,
        aspect_ratio: &str,
        output: &Path,
    ) -> RenderResult<Artifact> {
        let request = ImageRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
            reference_uri,
        };
        let response: ImageResponse = self.client.post_json("v1/images", &request).await?;
        let bytes = self.client.download(&response.artifact_url, output).await?;

        info!(
            path = %output.display(),
            bytes,
            conditioned = request.reference_uri.is_some(),
            "Image rendered"
        );
        Ok(Artifact {
            path: output.to_path_buf(),
            remote_uri: Some(response.artifact_url),
        })
    }
}

#[async_trait]
impl ImageRenderer for HttpRenderer {
    fn model_name(&self) -> &str {
        &self.image_model
    }

    async fn render_from_text(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        output: &Path,
    ) -> RenderResult<Artifact> {
        self.render_image(prompt, None, aspect_ratio, output).await
    }

    async fn render_conditioned(
        &self,
        prompt: &str,
        base: &Path,
        aspect_ratio: &str,
        output: &Path,
    ) -> RenderResult<Artifact> {
        let reference = self.upload_image(base).await?;
        self.render_image(prompt, Some(reference), aspect_ratio, output)
            .await
    }
}

#[async_trait]
impl VideoRenderer for HttpRenderer {
    fn model_name(&self) -> &str {
        &self.video_model
    }

    async fn render_transition(
        &self,
        prompt: &str,
        start: &Path,
        end: &Path,
        resolution: &str,
    ) -> RenderResult<RenderJob> {
        let start_image_uri = self.upload_image(start).await?;
        let end_image_uri = self.upload_image(end).await?;

        let request = VideoJobRequest {
            model: self.video_model.clone(),
            prompt: prompt.to_string(),
            start_image_uri,
            end_image_uri,
            resolution: resolution.to_string(),
        };
        let response: VideoJobResponse = self.client.post_json("v1/videos/jobs", &request).await?;

        info!(job = %response.job_id, "Video job submitted");
        Ok(RenderJob {
            id: response.job_id,
        })
    }

    async fn poll(&self, job: &RenderJob) -> RenderResult<JobStatus> {
        let response: JobStatusResponse = self
            .client
            .get_json(&format!("v1/videos/jobs/{}", job.id))
            .await?;

        let state = response
            .status
            .parse::<JobState>()
            .map_err(|message| BackendError::InvalidResponse { message })?;

        Ok(JobStatus {
            state,
            error: response.error,
            result_id: response.result_id,
        })
    }

    async fn download(&self, job: &RenderJob, output: &Path) -> RenderResult<()> {
        let bytes = self
            .client
            .download(&format!("v1/videos/jobs/{}/content", job.id), output)
            .await?;
        info!(job = %job.id, path = %output.display(), bytes, "Video downloaded");
        Ok(())
    }
}

fn image_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
