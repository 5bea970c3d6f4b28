use serde::{Deserialize, Serialize};

/// Message in a completion conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Speaker role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model.
    System,
    /// Request content.
    User,
    /// Prior model output.
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Text completion request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model name.
    pub model: String,
    /// Conversation.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Ask the backend for a JSON-only completion.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_output: bool,
}

impl CompletionRequest {
    /// Create a completion request
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            json_output: false,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request JSON-only output
    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }
}

/// Text completion response
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    /// Completion text.
    pub completion: String,
    /// Model that served the request.
    #[serde(default)]
    pub model: Option<String>,
    /// Token accounting.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Result of uploading a file to the backend
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadResponse {
    /// Backend reference usable in later requests.
    pub uri: String,
}

/// Image generation request
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
    /// Uploaded base image to condition on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_uri: Option<String>,
}

/// Image generation response
#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    /// Absolute URL, or a path relative to the backend base URL.
    pub artifact_url: String,
}

/// Video generation job request
#[derive(Debug, Clone, Serialize)]
pub struct VideoJobRequest {
    pub model: String,
    pub prompt: String,
    pub start_image_uri: String,
    pub end_image_uri: String,
    pub resolution: String,
}

/// Video job submission response
#[derive(Debug, Clone, Deserialize)]
pub struct VideoJobResponse {
    pub job_id: String,
}

/// Video job status response
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    /// One of `queued`, `running`, `completed`, `failed`.
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    /// Backend identifier of the finished artifact.
    #[serde(default)]
    pub result_id: Option<String>,
}
