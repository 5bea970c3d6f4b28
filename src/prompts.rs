//! Centralized prompt definitions
//!
//! Text-authoring prompts for world construction and branch expansion, and
//! the render prompts used for state images and transition videos.

use crate::config::CameraPerspective;
use crate::world::{Action, DeviationType, State};

/// System prompt shared by every authoring request.
pub const AUTHORING_SYSTEM_PROMPT: &str = r#"You are a world model generator for an action-conditioned video benchmark. You write concrete, visual descriptions of scene states and of the actions that move between them.

Guidelines:
- Describe what a camera would see, not what a person thinks
- Keep causal links between an action and the state it produces
- Use the exact JSON shape requested

Always respond with valid JSON only, no other text."#;

/// Prompt for a linear scenario with `num_steps` intermediate steps
pub fn linear_world_prompt(
    scenario: &str,
    initial_description: &str,
    goal_description: &str,
    num_steps: usize,
    context: &str,
) -> String {
    let total = num_steps + 2;
    let mut prompt = format!(
        "Generate a linear sequence of states and actions for the following scenario.\n\n\
         Scenario: {scenario}\n\
         Initial State: {initial_description}\n\
         Goal State: {goal_description}\n\
         Number of intermediate steps: {num_steps}\n"
    );
    if !context.is_empty() {
        prompt.push_str(&format!("Additional Context: {context}\n"));
    }
    prompt.push_str(&format!(
        r#"
Produce exactly {total} states including the initial and goal states.

Each state has an id (s0, s1, ...), a detailed description and a progress value from 0.0 (initial) to 1.0 (goal).
Each action has an id (a0, a1, ...), a description, from_state, to_state and an action_type category.

Output JSON in this format:
{{
  "states": [{{"id": "s0", "description": "...", "progress": 0.0}}],
  "actions": [{{"id": "a0", "description": "...", "from_state": "s0", "to_state": "s1", "action_type": "..."}}]
}}"#
    ));
    prompt
}

/// Prompt for an alternative action of the given deviation type
pub fn alternative_action_prompt(
    state: &State,
    original_action: &Action,
    deviation_type: DeviationType,
    scenario: &str,
) -> String {
    format!(
        r#"Generate an alternative action for this state.

Scenario: {scenario}
Current State: {state}
Original Action (correct path): {original_action}

Generate an ALTERNATIVE action of type: {deviation_type}

- risky: a risky shortcut that might work but could cause problems
- shortcut: skips some steps to save time, might affect quality
- mistake: a common mistake that leads to failure

Output JSON:
{{
  "description": "Clear description of the alternative action",
  "action_type": "action type category",
  "risk_level": "low/medium/high",
  "likely_outcome": "success/partial_success/failure"
}}"#
    )
}

/// Prompt for success and failure endings
pub fn endings_prompt(
    scenario: &str,
    num_success: usize,
    num_failure: usize,
    reference_goal: &State,
) -> String {
    format!(
        r#"Generate ending states for scenario: {scenario}

Generate {num_success} success endings and {num_failure} failure endings.
Success endings differ in quality (1.0 perfect, 0.8 good, 0.6 acceptable).
Failure endings differ in reason (gave up halfway, critical damage, unusable result).

Reference goal state: {reference_goal}

Output JSON:
{{
  "success_endings": [{{"id": "s_perfect", "description": "...", "quality": 1.0, "reason": "..."}}],
  "failure_endings": [{{"id": "s_failure1", "description": "...", "quality": 0.2, "reason": "..."}}]
}}"#
    )
}

/// Prompt for a deviation path from a branch state to a target ending
pub fn deviation_path_prompt(
    branch_state: &State,
    alt_action: &Action,
    target_ending: &State,
    scenario: &str,
    max_steps: usize,
) -> String {
    format!(
        r#"Generate a path from a branching state to an ending state.

Scenario: {scenario}
Starting State: {branch_state}
First Action: {alt_action}
Target Ending: {target_ending}
Maximum Steps: {max_steps}

Generate {max_steps} or fewer steps that start with the given action and progress
logically towards the target ending. The last resulting_state should be the target ending.

Output JSON:
{{
  "path": [{{"action": "...", "resulting_state": "...", "progress": 0.5}}]
}}"#
    )
}

/// Camera framing prefix for a perspective
pub fn perspective_prefix(perspective: CameraPerspective) -> &'static str {
    match perspective {
        CameraPerspective::FirstPersonEgo => {
            "Single-person first-person egocentric view at eye level, showing what one person sees from their own eyes"
        }
        CameraPerspective::ThirdPerson => "Third-person view from behind and slightly above",
        CameraPerspective::Overhead => "Overhead bird's-eye view looking down",
    }
}

/// Image prompt for a state.
///
/// Without an action this is the full initial-scene prompt; with one it asks
/// for a variation of the conditioning image that makes the action visible.
pub fn state_image_prompt(
    state: &State,
    action: Option<&Action>,
    perspective: CameraPerspective,
) -> String {
    match action {
        None => format!(
            "{}. {}. Realistic style, clear lighting, detailed.",
            perspective_prefix(perspective),
            state.description
        ),
        Some(action) => format!(
            "Same camera angle and scene layout. HOWEVER, IMPORTANT VISIBLE CHANGE: {}. \
             The new state: {}. Make the change CLEARLY VISIBLE.",
            action.description, state.description
        ),
    }
}

/// Video prompt for a transition between two state descriptions
pub fn transition_video_prompt(
    action_description: &str,
    start_description: &str,
    end_description: &str,
) -> String {
    format!(
        "{}. Smooth transition showing the action in progress. Starting from: {}... Ending at: {}...",
        action_description,
        truncate_chars(start_description, 50),
        truncate_chars(end_description, 50)
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_prompt_uses_perspective() {
        let state = State::new("s0", "A flat-pack box on the floor");
        let prompt = state_image_prompt(&state, None, CameraPerspective::Overhead);
        assert_eq!(
            prompt,
            "Overhead bird's-eye view looking down. A flat-pack box on the floor. \
             Realistic style, clear lighting, detailed."
        );
    }

    #[test]
    fn test_variation_prompt_emphasizes_action() {
        let state = State::new("s1", "Box open, parts visible");
        let action = Action::new("a0", "Cut the tape and open the box");
        let prompt = state_image_prompt(&state, Some(&action), CameraPerspective::default());
        assert!(prompt.starts_with("Same camera angle and scene layout."));
        assert!(prompt.contains("IMPORTANT VISIBLE CHANGE: Cut the tape and open the box"));
        assert!(prompt.contains("The new state: Box open, parts visible"));
    }

    #[test]
    fn test_video_prompt_truncates_descriptions() {
        let long = "x".repeat(80);
        let prompt = transition_video_prompt("Lift the panel", &long, "short");
        assert!(prompt.starts_with("Lift the panel. Smooth transition"));
        assert!(prompt.contains(&format!("Starting from: {}...", "x".repeat(50))));
        assert!(prompt.ends_with("Ending at: short..."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }

    #[test]
    fn test_linear_prompt_includes_context_only_when_given() {
        let with = linear_world_prompt("tea", "kettle", "cup of tea", 3, "use a teapot");
        assert!(with.contains("Additional Context: use a teapot"));
        assert!(with.contains("exactly 5 states"));

        let without = linear_world_prompt("tea", "kettle", "cup of tea", 3, "");
        assert!(!without.contains("Additional Context"));
    }
}
