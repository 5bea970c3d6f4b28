use std::collections::HashSet;

use crate::error::{StructuralError, StructuralResult};
use crate::world::{State, World};

/// Evenly spaced indices of `k` picks over `n` candidates.
///
/// Index `i` is `round(i * (n - 1) / (k - 1))`, rounding half away from zero.
/// Every candidate is picked when `k >= n`; `k == 1` picks the first.
pub fn select_branch_indices(n: usize, k: usize) -> Vec<usize> {
    if n == 0 || k == 0 {
        return Vec::new();
    }
    if k >= n {
        return (0..n).collect();
    }
    if k == 1 {
        return vec![0];
    }

    let step = (n - 1) as f64 / (k - 1) as f64;
    (0..k).map(|i| (i as f64 * step).round() as usize).collect()
}

/// States of a linear world from the initial state, following the first
/// outgoing transition of each state until a terminal.
pub fn linear_path_states(world: &World) -> StructuralResult<Vec<&State>> {
    let mut current = world.require_initial_state()?;
    let mut seen = HashSet::from([current.state_id.as_str()]);
    let mut path = vec![current];

    while let Some(next) = world.get_next_states(&current.state_id, None).first().copied() {
        if !seen.insert(next.state_id.as_str()) {
            return Err(StructuralError::Cycle {
                state_id: next.state_id.clone(),
            });
        }
        path.push(next);
        current = next;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Action;

    #[test]
    fn test_three_of_five_is_evenly_spaced() {
        assert_eq!(select_branch_indices(5, 3), vec![0, 2, 4]);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        // step = 1.5 -> 0, 1.5, 3.0 -> 0, 2, 3
        assert_eq!(select_branch_indices(4, 3), vec![0, 2, 3]);
        // step = 8/3 -> 0, 2.67, 5.33, 8 -> 0, 3, 5, 8
        assert_eq!(select_branch_indices(9, 4), vec![0, 3, 5, 8]);
    }

    #[test]
    fn test_degenerate_selections() {
        assert_eq!(select_branch_indices(3, 5), vec![0, 1, 2]);
        assert_eq!(select_branch_indices(3, 3), vec![0, 1, 2]);
        assert_eq!(select_branch_indices(6, 1), vec![0]);
        assert!(select_branch_indices(6, 0).is_empty());
        assert!(select_branch_indices(0, 2).is_empty());
    }

    #[test]
    fn test_selection_is_deterministic_and_distinct() {
        for n in 1..20 {
            for k in 1..20 {
                let first = select_branch_indices(n, k);
                assert_eq!(first, select_branch_indices(n, k));
                let unique: HashSet<_> = first.iter().collect();
                assert_eq!(unique.len(), first.len());
                assert!(first.iter().all(|&i| i < n));
            }
        }
    }

    #[test]
    fn test_linear_path_states_follows_first_transition() {
        let s0 = State::new("s0", "a");
        let s1 = State::new("s1", "b");
        let s2 = State::new("s2", "c");
        let mut world = World::new("w_linear", "");
        world.set_initial_state(s0.clone());
        world.add_transition(s0, Action::new("a0", "x"), s1.clone());
        world.add_transition(s1, Action::new("a1", "y"), s2);

        let ids: Vec<_> = linear_path_states(&world)
            .unwrap()
            .iter()
            .map(|s| s.state_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn test_linear_path_states_detects_cycle() {
        let s0 = State::new("s0", "a");
        let s1 = State::new("s1", "b");
        let mut world = World::new("w", "");
        world.set_initial_state(s0.clone());
        world.add_transition(s0.clone(), Action::new("a0", "x"), s1.clone());
        world.add_transition(s1, Action::new("a1", "y"), s0);

        assert!(matches!(
            linear_path_states(&world),
            Err(StructuralError::Cycle { .. })
        ));
    }
}
