use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{extract_json_from_completion, DeviationStep, Endings, LinearDraft, TextAuthor};
use crate::backend::{CompletionRequest, GenerationClient, Message};
use crate::error::{AuthoringError, AuthoringResult};
use crate::prompts::{
    alternative_action_prompt, deviation_path_prompt, endings_prompt, linear_world_prompt,
    AUTHORING_SYSTEM_PROMPT,
};
use crate::world::{
    lenient_f64, Action, ActionMetadata, DeviationType, LinearStep, Outcome, State,
};

/// Text author backed by the generation backend's completion endpoint
#[derive(Clone)]
pub struct LlmAuthor {
    client: GenerationClient,
    model: String,
    temperature: f64,
}

impl LlmAuthor {
    /// Create an author using `model` for every request
    pub fn new(client: GenerationClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.7,
        }
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Send one prompt and parse the JSON payload of the completion
    async fn ask<T: DeserializeOwned>(&self, prompt: String) -> AuthoringResult<T> {
        let request = CompletionRequest::new(
            &self.model,
            vec![
                Message::system(AUTHORING_SYSTEM_PROMPT),
                Message::user(prompt),
            ],
        )
        .with_temperature(self.temperature)
        .with_json_output(true);

        let response = self.client.complete(request).await?;
        parse_completion(&response.completion)
    }
}

pub(crate) fn parse_completion<T: DeserializeOwned>(completion: &str) -> AuthoringResult<T> {
    let json = extract_json_from_completion(completion)
        .map_err(|message| AuthoringError::InvalidOutput { message })?;
    serde_json::from_str(json).map_err(|e| {
        debug!(
            error = %e,
            preview = %json.chars().take(200).collect::<String>(),
            "Completion did not match the expected shape"
        );
        AuthoringError::InvalidOutput {
            message: format!("Failed to parse authored JSON: {}", e),
        }
    })
}

// ----------------------------------------------------------------------------
// Completion payloads
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LinearWorldPayload {
    #[serde(default)]
    states: Vec<LinearStatePayload>,
    #[serde(default)]
    actions: Vec<LinearActionPayload>,
}

#[derive(Debug, Deserialize)]
struct LinearStatePayload {
    id: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    progress: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LinearActionPayload {
    id: Option<String>,
    description: Option<String>,
    from_state: Option<String>,
    to_state: Option<String>,
    action_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlternativeActionPayload {
    description: Option<String>,
    action_type: Option<String>,
    risk_level: Option<String>,
    likely_outcome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EndingsPayload {
    #[serde(default)]
    success_endings: Vec<EndingPayload>,
    #[serde(default)]
    failure_endings: Vec<EndingPayload>,
}

#[derive(Debug, Deserialize)]
struct EndingPayload {
    id: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    quality: Option<f64>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviationPathPayload {
    #[serde(default)]
    path: Vec<DeviationStepPayload>,
}

#[derive(Debug, Deserialize)]
struct DeviationStepPayload {
    action: Option<String>,
    resulting_state: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    progress: Option<f64>,
}

fn required(value: Option<String>, field: &str) -> AuthoringResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthoringError::MissingField {
            field: field.to_string(),
        })
}

impl LinearWorldPayload {
    fn into_draft(self) -> AuthoringResult<LinearDraft> {
        let states = self
            .states
            .into_iter()
            .map(|s| {
                let mut state = State::new(
                    required(s.id, "states[].id")?,
                    required(s.description, "states[].description")?,
                );
                state.metadata.progress = s.progress;
                Ok(state)
            })
            .collect::<AuthoringResult<Vec<_>>>()?;

        let steps = self
            .actions
            .into_iter()
            .map(|a| {
                let action = Action::new(
                    required(a.id, "actions[].id")?,
                    required(a.description, "actions[].description")?,
                )
                .with_type(a.action_type.unwrap_or_else(|| "action".to_string()));
                Ok(LinearStep {
                    action,
                    from_state: required(a.from_state, "actions[].from_state")?,
                    to_state: required(a.to_state, "actions[].to_state")?,
                })
            })
            .collect::<AuthoringResult<Vec<_>>>()?;

        if states.is_empty() {
            return Err(AuthoringError::MissingField {
                field: "states".to_string(),
            });
        }

        Ok(LinearDraft { states, steps })
    }
}

impl EndingPayload {
    fn into_state(self, outcome: Outcome) -> AuthoringResult<State> {
        let mut state = State::new(
            required(self.id, "endings[].id")?,
            required(self.description, "endings[].description")?,
        )
        .with_outcome(outcome)
        .with_reason(self.reason.unwrap_or_default());
        if let Some(quality) = self.quality {
            state = state.with_quality(quality);
        }
        Ok(state)
    }
}

#[async_trait]
impl TextAuthor for LlmAuthor {
    async fn author_linear_world(
        &self,
        scenario: &str,
        initial_description: &str,
        goal_description: &str,
        num_steps: usize,
        context: &str,
    ) -> AuthoringResult<LinearDraft> {
        info!(scenario, num_steps, "Authoring linear world");
        let prompt = linear_world_prompt(
            scenario,
            initial_description,
            goal_description,
            num_steps,
            context,
        );
        let payload: LinearWorldPayload = self.ask(prompt).await?;
        payload.into_draft()
    }

    async fn author_alternative_action(
        &self,
        state: &State,
        original_action: &Action,
        deviation_type: DeviationType,
        scenario: &str,
    ) -> AuthoringResult<Action> {
        let prompt = alternative_action_prompt(state, original_action, deviation_type, scenario);
        let payload: AlternativeActionPayload = self.ask(prompt).await?;

        let mut action = Action::new(
            format!("{}_{}", original_action.action_id, deviation_type),
            required(payload.description, "description")?,
        )
        .with_type(
            payload
                .action_type
                .unwrap_or_else(|| deviation_type.to_string()),
        );
        action.metadata = ActionMetadata {
            risk_level: Some(payload.risk_level.unwrap_or_else(|| "medium".to_string())),
            deviation_type: Some(deviation_type),
            likely_outcome: Some(payload.likely_outcome.unwrap_or_else(|| "unknown".to_string())),
            ..Default::default()
        };
        Ok(action)
    }

    async fn author_endings(
        &self,
        scenario: &str,
        num_success: usize,
        num_failure: usize,
        reference_goal: &State,
    ) -> AuthoringResult<Endings> {
        info!(scenario, num_success, num_failure, "Authoring endings");
        let prompt = endings_prompt(scenario, num_success, num_failure, reference_goal);
        let payload: EndingsPayload = self.ask(prompt).await?;

        Ok(Endings {
            success: payload
                .success_endings
                .into_iter()
                .map(|e| e.into_state(Outcome::Success))
                .collect::<AuthoringResult<_>>()?,
            failure: payload
                .failure_endings
                .into_iter()
                .map(|e| e.into_state(Outcome::Failure))
                .collect::<AuthoringResult<_>>()?,
        })
    }

    async fn author_deviation_path(
        &self,
        branch_state: &State,
        alt_action: &Action,
        target_ending: &State,
        scenario: &str,
        max_steps: usize,
    ) -> AuthoringResult<Vec<DeviationStep>> {
        let prompt =
            deviation_path_prompt(branch_state, alt_action, target_ending, scenario, max_steps);
        let payload: DeviationPathPayload = self.ask(prompt).await?;

        payload
            .path
            .into_iter()
            .map(|step| {
                Ok(DeviationStep {
                    action: required(step.action, "path[].action")?,
                    resulting_state: required(step.resulting_state, "path[].resulting_state")?,
                    progress: step.progress,
                })
            })
            .collect()
    }
}
