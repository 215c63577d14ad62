//! Termination check, run after every committed agent turn

use crate::simulation::run::{Run, TerminationReason};

/// First matching reason, in priority order: everyone dead, nothing left to
/// collect, a winner, the optional turn cap.
pub fn check_termination(run: &Run, max_turns: Option<u64>) -> Option<TerminationReason> {
    if run.agents.iter().all(|a| !a.is_alive) {
        return Some(TerminationReason::AllAgentsDead);
    }

    if run.grid.remaining_resource_count() == 0 {
        if !run.agents.iter().any(|a| run.ruleset.agent_wins(a)) {
            tracing::warn!(
                run_id = %run.id,
                turn = run.turn,
                "All resources collected but no agent met the win conditions"
            );
        }
        return Some(TerminationReason::ResourcesExhausted);
    }

    if run.agents.iter().any(|a| run.ruleset.agent_wins(a)) {
        return Some(TerminationReason::WinConditionMet);
    }

    match max_turns {
        Some(max) if run.turn >= max => Some(TerminationReason::MaxTurnsReached),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Position;
    use crate::entity::agent::AgentSpec;
    use crate::rules::ruleset::{Ruleset, WinCondition, WinConditionKind};
    use crate::simulation::run::RunConfig;
    use crate::world::maze::MazeDefinition;

    fn run(rules: Ruleset) -> Run {
        let maze = MazeDefinition::new("t", "Test", &["######", "#S.CC#", "######"]);
        let mut run = Run::new(&RunConfig::new(
            maze,
            rules,
            vec![AgentSpec::named("a"), AgentSpec::named("b")],
        ))
        .unwrap();
        run.begin().unwrap();
        run
    }

    #[test]
    fn test_continues_by_default() {
        assert_eq!(check_termination(&run(Ruleset::default()), None), None);
    }

    #[test]
    fn test_all_dead_first() {
        let mut r = run(Ruleset::default());
        for a in &mut r.agents {
            a.is_alive = false;
        }
        r.grid.consume_resource(Position::new(3, 1));
        r.grid.consume_resource(Position::new(4, 1));
        assert_eq!(check_termination(&r, None), Some(TerminationReason::AllAgentsDead));
    }

    #[test]
    fn test_exhaustion_without_winner_still_completes() {
        let mut r = run(Ruleset::default());
        r.grid.consume_resource(Position::new(3, 1));
        r.grid.consume_resource(Position::new(4, 1));
        assert_eq!(check_termination(&r, None), Some(TerminationReason::ResourcesExhausted));
    }

    #[test]
    fn test_win_condition() {
        let rules = Ruleset::default()
            .with_win_condition(WinCondition::new(WinConditionKind::ResourceCount, 1));
        let mut r = run(rules);
        r.agents[1].resources_collected = 1;
        assert_eq!(check_termination(&r, None), Some(TerminationReason::WinConditionMet));

        // a dead agent cannot win
        r.agents[1].is_alive = false;
        assert_eq!(check_termination(&r, None), None);
    }

    #[test]
    fn test_max_turns() {
        let mut r = run(Ruleset::default());
        r.turn = 9;
        assert_eq!(check_termination(&r, Some(10)), None);
        r.turn = 10;
        assert_eq!(check_termination(&r, Some(10)), Some(TerminationReason::MaxTurnsReached));
    }
}
