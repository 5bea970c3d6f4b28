use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Authoring error: {0}")]
    Authoring(#[from] AuthoringError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Graph invariant violations. Always fatal to the operation that detects them.
#[derive(Debug, Error, PartialEq)]
pub enum StructuralError {
    #[error("World has no initial state")]
    MissingInitialState,

    #[error("Unknown state: {state_id}")]
    UnknownState { state_id: String },

    #[error("Unknown action: {action_id}")]
    UnknownAction { action_id: String },

    #[error("No transition from {start_state_id} to {end_state_id}")]
    UnknownTransition {
        start_state_id: String,
        end_state_id: String,
    },

    #[error("Transition {transition_id} references unregistered state {state_id}")]
    DanglingEndpoint {
        transition_id: String,
        state_id: String,
    },

    #[error("Cycle detected: state {state_id} revisited on the current path")]
    Cycle { state_id: String },

    #[error("World has no goal states")]
    NoGoalStates,

    #[error("World has no successful path from the initial state")]
    NoSuccessfulPath,

    #[error("Invalid linear world: {message}")]
    InvalidLinearWorld { message: String },
}

/// Errors raised while a text-authoring collaborator produces content
#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("Authoring backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid authored output: {message}")]
    InvalidOutput { message: String },

    #[error("Authored output missing field: {field}")]
    MissingField { field: String },
}

/// Errors raised by a render collaborator. Recorded per node/edge by the traversal engine.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("No image recorded for state {state_id}")]
    MissingInput { state_id: String },

    #[error("Render job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Render job {job_id} did not finish within {waited_ms}ms")]
    Timeout { job_id: String, waited_ms: u64 },

    #[error("Artifact I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reading or writing persisted worlds and checkpoint ledgers
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// HTTP generation backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Generation backend unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for graph operations
pub type StructuralResult<T> = Result<T, StructuralError>;

/// Result type alias for authoring operations
pub type AuthoringResult<T> = Result<T, AuthoringError>;

/// Result type alias for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type alias for generation backend operations
pub type BackendResult<T> = Result<T, BackendError>;
