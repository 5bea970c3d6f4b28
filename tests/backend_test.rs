//! Integration tests for the generation backend client
//!
//! Tests the HTTP client, the HTTP renderer and the LLM author against a
//! wiremock server.

use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use world_bench_curator::authoring::{LlmAuthor, TextAuthor};
use world_bench_curator::backend::{CompletionRequest, GenerationClient, Message};
use world_bench_curator::config::{BackendConfig, RequestConfig};
use world_bench_curator::error::{AuthoringError, BackendError, RenderError};
use world_bench_curator::render::{
    wait_for_job, HttpRenderer, ImageRenderer, JobState, PollPolicy, VideoRenderer,
};
use world_bench_curator::world::State;

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> GenerationClient {
    let config = BackendConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        text_model: "text-default".to_string(),
        image_model: "image-default".to_string(),
        video_model: "video-default".to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 1,
    };

    GenerationClient::new(&config, request_config).expect("Failed to create client")
}

#[cfg(test)]
mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({"model": "text-default"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "completion": "A kettle on a counter.",
                "model": "text-default",
                "usage": {"prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let request = CompletionRequest::new("text-default", vec![Message::user("Describe")]);
        let response = client.complete(request).await.unwrap();

        assert_eq!(response.completion, "A kettle on a counter.");
        assert_eq!(response.usage.unwrap().total_tokens, Some(18));
    }

    #[tokio::test]
    async fn test_api_error_without_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client
            .complete(CompletionRequest::new("text-default", vec![]))
            .await;

        match result {
            Err(BackendError::Unavailable { message, retries }) => {
                assert!(message.contains("500"));
                assert!(message.contains("model overloaded"));
                assert_eq!(retries, 1);
            }
            other => panic!("Expected Unavailable, got {:?}", other.map(|r| r.completion)),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/videos/jobs/j1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/jobs/j1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"job_id": "j1", "status": "running"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let status: serde_json::Value = client.get_json("v1/videos/jobs/j1").await.unwrap();
        assert_eq!(status["status"], "running");
    }

    #[tokio::test]
    async fn test_upload_returns_reference() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .and(header("Content-Type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uri": "files/abc"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let uri = client.upload(vec![1, 2, 3], "image/png").await.unwrap();
        assert_eq!(uri, "files/abc");
    }

    #[tokio::test]
    async fn test_download_creates_parent_directories() {
        let mock_server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/artifacts/s0.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16]))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let destination = dir.path().join("world").join("s0_000.png");
        let written = client
            .download("artifacts/s0.png", &destination)
            .await
            .unwrap();

        assert_eq!(written, 16);
        assert_eq!(std::fs::read(&destination).unwrap(), vec![7u8; 16]);
    }
}

#[cfg(test)]
mod renderer_tests {
    use super::*;

    #[tokio::test]
    async fn test_conditioned_image_uploads_base_and_downloads_result() {
        let mock_server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("s0_000.png");
        std::fs::write(&base, b"base image").unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uri": "files/base-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/images"))
            .and(body_partial_json(json!({
                "model": "image-default",
                "aspect_ratio": "16:9",
                "reference_uri": "files/base-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artifact_url": format!("{}/artifacts/img-1.png", mock_server.uri())
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifacts/img-1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"rendered".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(
            create_test_client(&mock_server.uri(), 0),
            "image-default",
            "video-default",
        );
        let output = dir.path().join("s1_001.png");
        let artifact = renderer
            .render_conditioned("Lamp moved left", &base, "16:9", &output)
            .await
            .unwrap();

        assert_eq!(artifact.path, output);
        assert!(artifact.remote_uri.unwrap().ends_with("/artifacts/img-1.png"));
        assert_eq!(std::fs::read(&output).unwrap(), b"rendered");
    }

    #[tokio::test]
    async fn test_missing_base_image_is_io_error() {
        let mock_server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let renderer = HttpRenderer::new(
            create_test_client(&mock_server.uri(), 0),
            "image-default",
            "video-default",
        );
        let result = renderer
            .render_conditioned(
                "prompt",
                &dir.path().join("absent.png"),
                "16:9",
                &dir.path().join("out.png"),
            )
            .await;

        assert!(matches!(result, Err(RenderError::Io { .. })));
    }

    #[tokio::test]
    async fn test_video_job_flow() {
        let mock_server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let start = dir.path().join("s0_000.png");
        let end = dir.path().join("s1_001.png");
        std::fs::write(&start, b"start").unwrap();
        std::fs::write(&end, b"end").unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uri": "files/frame"})))
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/videos/jobs"))
            .and(body_partial_json(json!({
                "model": "video-default",
                "start_image_uri": "files/frame",
                "resolution": "720p"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "job-7"})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/jobs/job-7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"job_id": "job-7", "status": "processing"})),
            )
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/jobs/job-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": "job-7",
                "status": "succeeded",
                "result_id": "vid-42"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/jobs/job-7/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(
            create_test_client(&mock_server.uri(), 0),
            "image-default",
            "video-default",
        );
        let job = renderer
            .render_transition("Carry the lamp left", &start, &end, "720p")
            .await
            .unwrap();
        assert_eq!(job.id, "job-7");

        let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_secs(5));
        let status = wait_for_job(&renderer, &job, policy).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.result_id.as_deref(), Some("vid-42"));

        let output = dir.path().join("s0_to_s1_000.mp4");
        renderer.download(&job, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"mp4");
    }

    #[tokio::test]
    async fn test_unknown_job_status_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/videos/jobs/job-9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"job_id": "job-9", "status": "teleported"})),
            )
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(
            create_test_client(&mock_server.uri(), 0),
            "image-default",
            "video-default",
        );
        let job = world_bench_curator::render::RenderJob {
            id: "job-9".to_string(),
        };
        let result = renderer.poll(&job).await;

        assert!(matches!(
            result,
            Err(RenderError::Backend(BackendError::InvalidResponse { .. }))
        ));
    }
}

#[cfg(test)]
mod author_tests {
    use super::*;

    fn mount_completion(completion: &str) -> Mock {
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(body_partial_json(json!({"model": "text-default", "json_output": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "completion": completion
            })))
    }

    #[tokio::test]
    async fn test_endings_parsed_from_fenced_completion() {
        let mock_server = MockServer::start().await;
        mount_completion(
            "Here you go:\n```json\n{\"success_endings\": [{\"id\": \"success_0\", \"description\": \"Tea with honey\", \"quality\": 0.9}], \"failure_endings\": [{\"id\": \"failure_0\", \"description\": \"Cold tea\", \"quality\": \"0.2\", \"reason\": \"Water never boiled\"}]}\n```",
        )
        .expect(1)
        .mount(&mock_server)
        .await;

        let author = LlmAuthor::new(create_test_client(&mock_server.uri(), 0), "text-default");
        let goal = State::new("s4", "Tea steeping in a mug");
        let endings = author.author_endings("tea", 1, 1, &goal).await.unwrap();

        assert_eq!(endings.success[0].state_id, "success_0");
        assert_eq!(endings.success[0].metadata.quality, Some(0.9));
        assert_eq!(endings.failure[0].metadata.quality, Some(0.2));
        assert_eq!(
            endings.failure[0].metadata.reason.as_deref(),
            Some("Water never boiled")
        );
    }

    #[tokio::test]
    async fn test_prose_completion_is_invalid_output() {
        let mock_server = MockServer::start().await;
        mount_completion("I cannot help with that.")
            .mount(&mock_server)
            .await;

        let author = LlmAuthor::new(create_test_client(&mock_server.uri(), 0), "text-default");
        let result = author
            .author_linear_world("tea", "Kettle", "Tea", 3, "")
            .await;

        assert!(matches!(result, Err(AuthoringError::InvalidOutput { .. })));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_as_authoring_backend_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&mock_server)
            .await;

        let author = LlmAuthor::new(create_test_client(&mock_server.uri(), 0), "text-default");
        let result = author
            .author_deviation_path(
                &State::new("s1", "Kettle filled"),
                &world_bench_curator::world::Action::new("a1_alt_0", "Skip boiling"),
                &State::new("failure_0", "Cold tea"),
                "tea",
                3,
            )
            .await;

        assert!(matches!(result, Err(AuthoringError::Backend(_))));
    }
}
