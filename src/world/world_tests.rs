use super::*;
use crate::error::StructuralError;
use pretty_assertions::assert_eq;
use serde_json::json;

fn linear_world() -> World {
    let s0 = State::new("s0", "Unopened box on the floor");
    let s1 = State::new("s1", "Parts laid out");
    let s2 = State::new("s2", "Desk assembled");

    let mut world = World::new("desk_linear", "Assemble a desk");
    world.set_initial_state(s0.clone());
    world.add_transition(s0, Action::new("a0", "Open the box"), s1.clone());
    world.add_transition(s1, Action::new("a1", "Assemble the parts"), s2.clone());
    world.add_goal_state(s2);
    world
}

fn diamond_world() -> World {
    let s0 = State::new("s0", "Start");
    let s1 = State::new("s1", "Left");
    let s2 = State::new("s2", "Right");
    let s3 = State::new("s3", "Joined");

    let mut world = World::new("diamond", "Two routes to one end");
    world.set_initial_state(s0.clone());
    world.add_transition(s0.clone(), Action::new("a", "Go left"), s1.clone());
    world.add_transition(s0, Action::new("b", "Go right"), s2.clone());
    world.add_transition(s1, Action::new("c", "Continue left"), s3.clone());
    world.add_transition(s2, Action::new("d", "Continue right"), s3.clone());
    world.add_goal_state(s3);
    world
}

#[test]
fn test_add_transition_assigns_sequential_ids() {
    let world = linear_world();
    let ids: Vec<_> = world
        .transitions()
        .iter()
        .map(|t| t.transition_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["t_0", "t_1"]);
}

#[test]
fn test_add_transition_dedups_states_and_actions() {
    let mut world = linear_world();
    let s0 = State::new("s0", "A different description");
    let s1 = world.state("s1").unwrap().clone();
    world.add_transition(s0, Action::new("a0", "Open again"), s1);

    assert_eq!(world.state_count(), 3);
    assert_eq!(world.actions().count(), 2);
    assert_eq!(
        world.state("s0").unwrap().description,
        "Unopened box on the floor"
    );
    assert_eq!(world.action("a0").unwrap().description, "Open the box");
}

#[test]
fn test_linear_world_paths() {
    let world = linear_world();
    let paths = world.get_all_paths().unwrap();

    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].action_ids(), vec!["a0", "a1"]);
    assert_eq!(paths[0].state_ids("s0"), vec!["s0", "s1", "s2"]);
    assert!(world.is_final_state("s2"));
    assert!(!world.is_final_state("s1"));
    assert_eq!(world.get_successful_paths().unwrap().len(), 1);
    assert!(world.get_failed_paths().unwrap().is_empty());
}

#[test]
fn test_get_next_states_with_and_without_action_filter() {
    let world = diamond_world();

    let all: Vec<_> = world
        .get_next_states("s0", None)
        .into_iter()
        .map(|s| s.state_id.as_str())
        .collect();
    assert_eq!(all, vec!["s1", "s2"]);

    let right: Vec<_> = world
        .get_next_states("s0", Some("b"))
        .into_iter()
        .map(|s| s.state_id.as_str())
        .collect();
    assert_eq!(right, vec!["s2"]);

    assert!(world.get_next_states("s3", None).is_empty());
}

#[test]
fn test_diamond_paths_in_discovery_order() {
    let world = diamond_world();
    let paths = world.get_all_paths().unwrap();
    let actions: Vec<Vec<&str>> = paths.iter().map(|p| p.action_ids()).collect();

    assert_eq!(actions, vec![vec!["a", "c"], vec!["b", "d"]]);
}

#[test]
fn test_decision_points() {
    let world = diamond_world();
    let points = world.get_decision_points();

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].state.state_id, "s0");
    let actions: Vec<_> = points[0].actions.iter().map(|a| a.action_id.as_str()).collect();
    assert_eq!(actions, vec!["a", "b"]);
}

#[test]
fn test_cycle_is_a_structural_error() {
    let s0 = State::new("s0", "A");
    let s1 = State::new("s1", "B");
    let mut world = World::new("loop", "");
    world.set_initial_state(s0.clone());
    world.add_transition(s0.clone(), Action::new("a", "forward"), s1.clone());
    world.add_transition(s1, Action::new("b", "back"), s0);

    let err = world.get_all_paths().unwrap_err();
    assert_eq!(
        err,
        StructuralError::Cycle {
            state_id: "s0".to_string()
        }
    );
    assert!(world.validate().is_err());
}

#[test]
fn test_missing_initial_state() {
    let world = World::new("empty", "");
    assert_eq!(
        world.get_all_paths().unwrap_err(),
        StructuralError::MissingInitialState
    );
}

#[test]
fn test_degenerate_world_has_one_empty_path() {
    let mut world = World::new("single", "");
    let only = State::new("s0", "Nothing happens");
    world.set_initial_state(only.clone());
    world.add_goal_state(only);

    let paths = world.get_all_paths().unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].is_empty());
    assert_eq!(world.get_successful_paths().unwrap().len(), 1);
}

#[test]
fn test_classify_terminal() {
    let mut world = linear_world();
    let broken = State::new("broken", "Desk collapsed").with_quality(0.1);
    let s1 = world.state("s1").unwrap().clone();
    world.add_transition(s1, Action::new("x", "Overtighten"), broken.clone());
    world.add_final_state(broken.clone(), false);

    let class = world.classify_terminal(&broken);
    assert_eq!(class.outcome, Outcome::Failure);
    assert_eq!(class.quality, Some(0.1));

    let goal = world.state("s2").unwrap();
    let class = world.classify_terminal(goal);
    assert_eq!(class.outcome, Outcome::Success);
    assert_eq!(class.quality, None);
}

#[test]
fn test_path_report_lists_orphans() {
    let mut world = linear_world();
    world.add_state(State::new("orphan", "Never reached"));

    let report = world.path_report().unwrap();
    assert_eq!(report.total_paths, 1);
    assert_eq!(report.successful_paths, 1);
    assert_eq!(report.failed_paths, 0);
    assert_eq!(report.orphaned_states, vec!["orphan".to_string()]);
    // The orphan has no outgoing transitions, so it is listed as a terminal too.
    assert_eq!(report.terminals.len(), 2);
}

#[test]
fn test_path_report_display_numbers_paths() {
    let report = diamond_world().path_report().unwrap();
    let text = report.to_string();

    assert!(text.contains("Paths: 2 (2 successful, 0 failed)"));
    assert!(text.contains("  Path 1: a -> c\n"));
    assert!(text.contains("  Path 2: b -> d\n"));
    assert!(text.contains("  s0: a, b\n"));
    assert!(text.contains("  s3 [success]: Joined"));
    assert!(text.ends_with("Orphaned states: none"));
}

#[test]
fn test_json_reload_preserves_ids_and_registrations() {
    let world = diamond_world();
    let json = world.to_json().unwrap();
    let reloaded = World::from_json(&json).unwrap();

    let ids = |w: &World| w.states().map(|s| s.state_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&reloaded), ids(&world));
    assert_eq!(reloaded.transitions(), world.transitions());
    assert_eq!(reloaded.initial_state().unwrap().state_id, "s0");
    assert!(reloaded.is_goal_state("s3"));
    assert_eq!(
        reloaded
            .registered_final_states()
            .map(|s| s.state_id.as_str())
            .collect::<Vec<_>>(),
        vec!["s3"]
    );
}

#[test]
fn test_document_embeds_full_objects() {
    let world = linear_world();
    let value: serde_json::Value = serde_json::from_str(&world.to_json().unwrap()).unwrap();

    assert_eq!(value["transitions"][0]["start_state"]["state_id"], json!("s0"));
    assert_eq!(value["transitions"][0]["action"]["description"], json!("Open the box"));
    assert_eq!(value["initial_state"]["state_id"], json!("s0"));
    assert!(value.get("goal_state").is_none());
}

#[test]
fn test_load_accepts_legacy_goal_state_and_id_refs() {
    let json = json!({
        "name": "legacy",
        "description": "",
        "states": [
            {"state_id": "s0", "description": "start", "metadata": {}},
            {"state_id": "s1", "description": "end", "metadata": {}}
        ],
        "actions": [{"action_id": "a0", "description": "go", "metadata": {}}],
        "transitions": [{
            "transition_id": "t_0",
            "start_state": {"state_id": "s0", "description": "start", "metadata": {}},
            "action": {"action_id": "a0", "description": "go", "metadata": {}},
            "end_state": {"state_id": "s1", "description": "end", "metadata": {}}
        }],
        "initial_state": "s0",
        "goal_state": {"state_id": "s1", "description": "end", "metadata": {}}
    });

    let world = World::from_json(&json.to_string()).unwrap();
    assert_eq!(world.initial_state().unwrap().state_id, "s0");
    assert!(world.is_goal_state("s1"));
    assert_eq!(world.get_successful_paths().unwrap().len(), 1);
}

#[test]
fn test_from_linear_authoring() {
    let states = vec![
        State::new("s0", "Seedling in a pot").with_progress(0.0),
        State::new("s1", "Watered seedling").with_progress(0.5),
        State::new("s2", "Healthy plant").with_progress(1.0),
    ];
    let steps = vec![
        LinearStep {
            action: Action::new("a0", "Water the plant"),
            from_state: "s0".to_string(),
            to_state: "s1".to_string(),
        },
        LinearStep {
            action: Action::new("a1", "Move it to sunlight"),
            from_state: "s1".to_string(),
            to_state: "s2".to_string(),
        },
    ];

    let world = World::from_linear_authoring("plant", "Grow a plant", states, steps).unwrap();
    assert_eq!(world.name, "plant_linear");
    assert_eq!(world.initial_state().unwrap().state_id, "s0");
    assert!(world.is_goal_state("s2"));
    assert_eq!(world.get_all_paths().unwrap()[0].len(), 2);
}

#[test]
fn test_from_linear_authoring_rejects_unknown_step_state() {
    let states = vec![State::new("s0", "start")];
    let steps = vec![LinearStep {
        action: Action::new("a0", "go"),
        from_state: "s0".to_string(),
        to_state: "s9".to_string(),
    }];

    let err = World::from_linear_authoring("x", "", states, steps).unwrap_err();
    assert!(matches!(err, StructuralError::UnknownState { .. }));
}
