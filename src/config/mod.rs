use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub request: RequestConfig,
    pub render: RenderConfig,
    pub checkpoint: CheckpointConfig,
    pub logging: LoggingConfig,
}

/// Generation backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub video_model: String,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Media rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub aspect_ratio: String,
    pub resolution: String,
    pub camera_perspective: CameraPerspective,
    pub output_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub max_wait_ms: u64,
}

/// Checkpoint ledger configuration
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    pub path: PathBuf,
}

/// Where the resumable-progress ledger is kept
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointBackend {
    Json,
    Sqlite,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Camera viewpoint used when building state image prompts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraPerspective {
    #[default]
    FirstPersonEgo,
    ThirdPerson,
    Overhead,
}

impl std::fmt::Display for CameraPerspective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPerspective::FirstPersonEgo => write!(f, "first_person_ego"),
            CameraPerspective::ThirdPerson => write!(f, "third_person"),
            CameraPerspective::Overhead => write!(f, "overhead"),
        }
    }
}

impl std::str::FromStr for CameraPerspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_person_ego" | "first_person" | "ego" => Ok(CameraPerspective::FirstPersonEgo),
            "third_person" => Ok(CameraPerspective::ThirdPerson),
            "overhead" => Ok(CameraPerspective::Overhead),
            _ => Err(format!("Unknown camera perspective: {}", s)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Config {
            backend: BackendConfig::from_env()?,
            request: RequestConfig::from_env(),
            render: RenderConfig::from_env(),
            checkpoint: CheckpointConfig::from_env(),
            logging: LoggingConfig::from_env(),
        })
    }
}

impl BackendConfig {
    /// Read the generation backend settings; the API key is required
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            api_key: env::var("GENERATION_API_KEY").map_err(|_| AppError::Config {
                message: "GENERATION_API_KEY is required".to_string(),
            })?,
            base_url: env_or("GENERATION_BASE_URL", "http://localhost:8080"),
            text_model: env_or("TEXT_MODEL", "text-default"),
            image_model: env_or("IMAGE_MODEL", "image-default"),
            video_model: env_or("VIDEO_MODEL", "video-default"),
        })
    }
}

impl RequestConfig {
    /// Read request timeouts and retry policy
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", defaults.timeout_ms),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", defaults.retry_delay_ms),
        }
    }
}

impl RenderConfig {
    /// Read media rendering settings
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            aspect_ratio: env_or("RENDER_ASPECT_RATIO", &defaults.aspect_ratio),
            resolution: env_or("RENDER_RESOLUTION", &defaults.resolution),
            camera_perspective: env::var("CAMERA_PERSPECTIVE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            poll_interval_ms: env_parse("RENDER_POLL_INTERVAL_MS", defaults.poll_interval_ms),
            max_wait_ms: env_parse("RENDER_MAX_WAIT_MS", defaults.max_wait_ms),
        }
    }
}

impl CheckpointConfig {
    /// Read checkpoint ledger settings
    pub fn from_env() -> Self {
        let backend = match env_or("CHECKPOINT_BACKEND", "json").to_lowercase().as_str() {
            "sqlite" => CheckpointBackend::Sqlite,
            _ => CheckpointBackend::Json,
        };
        let default_path = match backend {
            CheckpointBackend::Json => "./data/progress.json",
            CheckpointBackend::Sqlite => "./data/progress.db",
        };
        Self {
            backend,
            path: PathBuf::from(env_or("CHECKPOINT_PATH", default_path)),
        }
    }
}

impl LoggingConfig {
    /// Read log level and output format
    pub fn from_env() -> Self {
        Self {
            level: env_or("LOG_LEVEL", "info"),
            format: match env_or("LOG_FORMAT", "pretty").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "16:9".to_string(),
            resolution: "720p".to_string(),
            camera_perspective: CameraPerspective::default(),
            output_dir: PathBuf::from("./generated"),
            poll_interval_ms: 20_000,
            max_wait_ms: 20 * 60 * 1000,
        }
    }
}
