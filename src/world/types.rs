use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Terminal outcome carried in `metadata.outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The terminal is a goal state.
    Success,
    /// The terminal is not a goal state.
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            _ => Err(format!("Unknown outcome: {}", s)),
        }
    }
}

/// Kind of deviation an alternative action represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationType {
    /// A risky shortcut that might work but could cause problems.
    Risky,
    /// Skips steps to save time, possibly affecting quality.
    Shortcut,
    /// A common mistake leading to failure.
    Mistake,
}

impl DeviationType {
    /// Deviation type used for the `index`-th alternative at a branch point.
    pub fn cycle(index: usize) -> Self {
        match index % 3 {
            0 => DeviationType::Risky,
            1 => DeviationType::Shortcut,
            _ => DeviationType::Mistake,
        }
    }
}

impl std::fmt::Display for DeviationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviationType::Risky => write!(f, "risky"),
            DeviationType::Shortcut => write!(f, "shortcut"),
            DeviationType::Mistake => write!(f, "mistake"),
        }
    }
}

/// Metadata annotations on a [`State`].
///
/// Known fields are typed; anything else authored by a collaborator is kept
/// in `extra` and written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    /// Progress fraction along the scenario (0.0-1.0).
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<f64>,
    /// Quality score of a terminal (0.0-1.0). Absent means unknown, not zero.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub quality: Option<f64>,
    /// Terminal outcome tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Why a terminal outcome happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Forward-compatible bag for everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Metadata annotations on an [`Action`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionMetadata {
    /// Risk level reported by the author (low/medium/high).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    /// Set on alternative actions created during branch expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_type: Option<DeviationType>,
    /// Outcome the author expects this action to lead to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likely_outcome: Option<String>,
    /// Forward-compatible bag for everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A node of the world graph: a scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Unique identifier within a world.
    pub state_id: String,
    /// Free text scene description.
    pub description: String,
    /// Typed metadata annotations.
    #[serde(default)]
    pub metadata: StateMetadata,
}

/// An edge label: a textual action moving between states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier within a world.
    pub action_id: String,
    /// Free text action description.
    pub description: String,
    /// Free-form category tag (e.g. "assembly", "positioning").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Typed metadata annotations.
    #[serde(default)]
    pub metadata: ActionMetadata,
}

/// A directed edge `(start_state, action, end_state)`, stored by id.
///
/// States and actions are owned once by the [`World`](super::World); the
/// transition only references them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    /// Optional identifier, assigned as `t_{index}` when added without one.
    pub transition_id: Option<String>,
    /// Start state id.
    pub start_state_id: String,
    /// Action id.
    pub action_id: String,
    /// End state id.
    pub end_state_id: String,
}

impl State {
    /// Create a state with empty metadata
    pub fn new(state_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            state_id: state_id.into(),
            description: description.into(),
            metadata: StateMetadata::default(),
        }
    }

    /// Set the progress fraction
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.metadata.progress = Some(progress);
        self
    }

    /// Set the quality score, clamped to 0.0-1.0
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.metadata.quality = Some(quality.clamp(0.0, 1.0));
        self
    }

    /// Set the outcome tag
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.metadata.outcome = Some(outcome);
        self
    }

    /// Set the outcome reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.metadata.reason = Some(reason.into());
        self
    }

    /// Add an untyped metadata entry
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl Action {
    /// Create an action with no type and empty metadata
    pub fn new(action_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            description: description.into(),
            action_type: None,
            metadata: ActionMetadata::default(),
        }
    }

    /// Set the category tag
    pub fn with_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    /// Set the deviation type
    pub fn with_deviation(mut self, deviation_type: DeviationType) -> Self {
        self.metadata.deviation_type = Some(deviation_type);
        self
    }

    /// Set the risk level
    pub fn with_risk_level(mut self, risk_level: impl Into<String>) -> Self {
        self.metadata.risk_level = Some(risk_level.into());
        self
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl Transition {
    /// Create a transition between two state ids
    pub fn new(
        start_state_id: impl Into<String>,
        action_id: impl Into<String>,
        end_state_id: impl Into<String>,
    ) -> Self {
        Self {
            transition_id: None,
            start_state_id: start_state_id.into(),
            action_id: action_id.into(),
            end_state_id: end_state_id.into(),
        }
    }

    /// Set the transition id
    pub fn with_id(mut self, transition_id: impl Into<String>) -> Self {
        self.transition_id = Some(transition_id.into());
        self
    }

    /// Transition id, or `start->end` when none was assigned
    pub fn label(&self) -> String {
        self.transition_id
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.start_state_id, self.end_state_id))
    }
}

/// One authored step of a linear scenario: `from_state -action-> to_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearStep {
    pub action: Action,
    pub from_state: String,
    pub to_state: String,
}

/// Accept numbers and numeric strings; collaborators emit both.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_metadata_typed_and_extra_fields() {
        let state: State = serde_json::from_value(json!({
            "state_id": "s1",
            "description": "Box opened",
            "metadata": {
                "progress": 0.1,
                "components_visible": true
            }
        }))
        .unwrap();

        assert_eq!(state.metadata.progress, Some(0.1));
        assert_eq!(state.metadata.quality, None);
        assert_eq!(
            state.metadata.extra.get("components_visible"),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_state_metadata_accepts_string_numbers() {
        let metadata: StateMetadata =
            serde_json::from_value(json!({"progress": "0.5", "quality": "high"})).unwrap();
        assert_eq!(metadata.progress, Some(0.5));
        assert_eq!(metadata.quality, None);
    }

    #[test]
    fn test_state_serializes_without_absent_fields() {
        let state = State::new("s0", "Unopened box");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({"state_id": "s0", "description": "Unopened box", "metadata": {}})
        );
    }

    #[test]
    fn test_quality_is_clamped() {
        let state = State::new("end", "Done").with_quality(1.7);
        assert_eq!(state.metadata.quality, Some(1.0));
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!("SUCCESS".parse::<Outcome>().unwrap(), Outcome::Success);
        assert!("partial".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_deviation_type_cycles() {
        assert_eq!(DeviationType::cycle(0), DeviationType::Risky);
        assert_eq!(DeviationType::cycle(1), DeviationType::Shortcut);
        assert_eq!(DeviationType::cycle(2), DeviationType::Mistake);
        assert_eq!(DeviationType::cycle(3), DeviationType::Risky);
    }

    #[test]
    fn test_action_metadata_round_trip_keeps_extra() {
        let action: Action = serde_json::from_value(json!({
            "action_id": "a0",
            "description": "Open the box",
            "action_type": "unboxing",
            "metadata": {"deviation_type": "shortcut", "duration": "5 minutes"}
        }))
        .unwrap();

        assert_eq!(
            action.metadata.deviation_type,
            Some(DeviationType::Shortcut)
        );
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["metadata"]["duration"], json!("5 minutes"));
    }
}
