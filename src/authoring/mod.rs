//! Text authoring collaborator.
//!
//! The [`TextAuthor`] trait is the seam between the graph engine and whatever
//! produces scenario text. [`LlmAuthor`] implements it over the generation
//! backend's completion endpoint.

mod llm;

pub use llm::LlmAuthor;

use async_trait::async_trait;

use crate::error::AuthoringResult;
use crate::world::{Action, DeviationType, LinearStep, State};

/// A linear scenario as authored: states in order plus the steps joining them.
#[derive(Debug, Clone, Default)]
pub struct LinearDraft {
    /// States `s0..sN`, in progress order.
    pub states: Vec<State>,
    /// Steps `a0..`, each naming its endpoints.
    pub steps: Vec<LinearStep>,
}

/// Authored terminal states.
#[derive(Debug, Clone, Default)]
pub struct Endings {
    /// Success endings, best quality first.
    pub success: Vec<State>,
    /// Failure endings.
    pub failure: Vec<State>,
}

/// One authored step of a deviation path.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviationStep {
    /// Description of the action taken.
    pub action: String,
    /// Description of the state the action leads to.
    pub resulting_state: String,
    /// Progress fraction, when the author supplied one.
    pub progress: Option<f64>,
}

/// Produces scenario text for world construction and branch expansion.
///
/// Implementations assign their own ids where they return full objects; the
/// branch expander re-keys alternative actions and deviation states.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextAuthor: Send + Sync {
    /// Author a linear scenario of `num_steps` intermediate steps.
    ///
    /// `context` is extra guidance for the author; empty means none.
    async fn author_linear_world(
        &self,
        scenario: &str,
        initial_description: &str,
        goal_description: &str,
        num_steps: usize,
        context: &str,
    ) -> AuthoringResult<LinearDraft>;

    /// Author an alternative to `original_action` at `state`
    async fn author_alternative_action(
        &self,
        state: &State,
        original_action: &Action,
        deviation_type: DeviationType,
        scenario: &str,
    ) -> AuthoringResult<Action>;

    /// Author terminal states. May return more than requested.
    async fn author_endings(
        &self,
        scenario: &str,
        num_success: usize,
        num_failure: usize,
        reference_goal: &State,
    ) -> AuthoringResult<Endings>;

    /// Author the steps leading from `branch_state` through `alt_action` to `target_ending`
    async fn author_deviation_path(
        &self,
        branch_state: &State,
        alt_action: &Action,
        target_ending: &State,
        scenario: &str,
        max_steps: usize,
    ) -> AuthoringResult<Vec<DeviationStep>>;
}

/// Extract the JSON payload from a free-form completion.
///
/// Accepts raw JSON, a fenced ```json block, a bare ``` block, or prose
/// followed by the first `{` or `[`.
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    // Fast path: raw JSON
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    if let Some(start) = trimmed.find(['{', '[']) {
        return Ok(&trimmed[start..]);
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}
