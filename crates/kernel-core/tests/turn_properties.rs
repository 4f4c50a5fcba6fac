use contracts::{
    CellType, ConstraintViolation, GameConfig, MetricDelta, Metrics, Phase, METRIC_MAX,
    METRIC_MIN,
};
use kernel_core::approval::check_hard_constraints;
use kernel_core::rules::MAX_TURN_DELTA;
use kernel_core::{
    compute_diff, create_grid, CostPolicy, EngineError, Grid, OfflineCollaborator, TurnEngine,
};
use proptest::prelude::*;

fn cell_type_strategy() -> impl Strategy<Value = CellType> {
    prop::sample::select(CellType::ALL.to_vec())
}

fn grid_strategy(size: u32) -> impl Strategy<Value = Grid> {
    prop::collection::vec(cell_type_strategy(), (size * size) as usize)
        .prop_map(move |types| Grid::from_types(size, &types).expect("generated layout"))
}

fn edits_strategy() -> impl Strategy<Value = Vec<(u32, u32, CellType)>> {
    prop::collection::vec((0_u32..5, 0_u32..5, cell_type_strategy()), 0..12)
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Advance,
    Edit(u32, u32, CellType),
    Submit,
    Approve,
    Revise,
    Simulate,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Advance),
        (0_u32..5, 0_u32..5, cell_type_strategy()).prop_map(|(x, y, t)| Op::Edit(x, y, t)),
        Just(Op::Submit),
        Just(Op::Approve),
        Just(Op::Revise),
        Just(Op::Simulate),
    ]
}

fn legal_successors(phase: Phase) -> Vec<Phase> {
    Phase::ALL
        .into_iter()
        .filter(|next| phase.can_transition_to(*next))
        .collect()
}

proptest! {
    #[test]
    fn metrics_stay_clamped_for_any_delta_sequence(
        deltas in prop::collection::vec((-200_i32..200, -200_i32..200, -200_i32..200), 0..40),
    ) {
        let mut metrics = Metrics::default();
        for (satisfaction, economy, environment) in deltas {
            metrics.apply(&MetricDelta { satisfaction, economy, environment });
            prop_assert!(metrics.is_within_bounds());
            prop_assert!(metrics.satisfaction >= METRIC_MIN && metrics.satisfaction <= METRIC_MAX);
        }
    }

    #[test]
    fn per_turn_delta_is_bounded(
        before in grid_strategy(5),
        after in grid_strategy(5),
        strategy in "[a-z ]{0,40}",
    ) {
        let outcome = compute_diff(&before, &after, &strategy, &CostPolicy::default())
            .expect("same shape");
        for value in [
            outcome.metric_delta.satisfaction,
            outcome.metric_delta.economy,
            outcome.metric_delta.environment,
        ] {
            prop_assert!((-MAX_TURN_DELTA..=MAX_TURN_DELTA).contains(&value));
        }
    }

    #[test]
    fn diff_is_a_pure_function(
        before in grid_strategy(4),
        after in grid_strategy(4),
        strategy in "(noise|jobs|carbon|park|[a-z]{1,6})( (noise|jobs|carbon|park|[a-z]{1,6})){0,5}",
    ) {
        let policy = CostPolicy::default();
        let first = compute_diff(&before, &after, &strategy, &policy).expect("same shape");
        let second = compute_diff(&before, &after, &strategy, &policy).expect("same shape");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn budget_gate_never_passes_an_unaffordable_plan(
        budget in 0_i64..200,
        edits in edits_strategy(),
    ) {
        let config = GameConfig { initial_budget: budget, ..GameConfig::default() };
        let mut engine = TurnEngine::new(config).expect("valid config");
        engine.advance().expect("to proposal");
        for (x, y, cell_type) in edits {
            engine.edit_cell(&format!("{x}-{y}"), cell_type).expect("cell exists");
        }
        let report = check_hard_constraints(
            engine.grid(),
            engine.snapshot(),
            engine.budget(),
            &CostPolicy::default(),
        )
        .expect("same shape");
        let result = engine.submit_proposal("Balanced renewal with green infrastructure");
        if report.projected_cost > budget {
            let rejected_for_budget = matches!(
                &result,
                Err(EngineError::ConstraintViolations(violations))
                    if violations.iter().any(|v| matches!(v, ConstraintViolation::InsufficientBudget { .. }))
            );
            prop_assert!(rejected_for_budget);
            prop_assert_eq!(engine.phase(), Phase::Proposal);
        }
        if result.is_ok() {
            prop_assert!(report.projected_cost <= budget);
            prop_assert_eq!(engine.phase(), Phase::Approval);
        }
    }

    #[test]
    fn redline_never_passes_when_homes_are_lost(edits in edits_strategy()) {
        let mut engine = TurnEngine::new(GameConfig::default()).expect("valid config");
        engine.advance().expect("to proposal");
        for (x, y, cell_type) in edits {
            engine.edit_cell(&format!("{x}-{y}"), cell_type).expect("cell exists");
        }
        let lost_homes = engine.grid().count(CellType::Residential)
            < engine.snapshot().count(CellType::Residential);
        let result = engine.submit_proposal("Keep the neighbourhood liveable");
        if lost_homes {
            prop_assert!(result.is_err());
            prop_assert_eq!(engine.phase(), Phase::Proposal);
        }
    }

    #[test]
    fn only_listed_transitions_ever_happen(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut engine = TurnEngine::new(GameConfig { max_turns: 3, ..GameConfig::default() })
            .expect("valid config");
        let collaborator = OfflineCollaborator;
        for op in ops {
            let before = engine.phase();
            let turn_before = engine.turn();
            let _ = match op {
                Op::Advance => engine.advance().map(|_| ()),
                Op::Edit(x, y, cell_type) => engine.edit_cell(&format!("{x}-{y}"), cell_type).map(|_| ()),
                Op::Submit => engine.submit_proposal("Steady renewal plan").map(|_| ()),
                Op::Approve => engine.request_approval(None, &collaborator).map(|_| ()),
                Op::Revise => engine.revise().map(|_| ()),
                Op::Simulate => engine.run_simulation(&collaborator).map(|_| ()),
            };
            let after = engine.phase();
            if after != before {
                prop_assert!(legal_successors(before).contains(&after));
            }
            if before == Phase::Ended {
                prop_assert_eq!(after, Phase::Ended);
            }
            if engine.turn() != turn_before {
                prop_assert_eq!(before, Phase::Iteration);
                prop_assert_eq!(engine.turn(), turn_before + 1);
            }
            prop_assert!(engine.metrics().is_within_bounds());
        }
    }
}

#[test]
fn ended_is_terminal_in_the_transition_table() {
    assert!(legal_successors(Phase::Ended).is_empty());
    assert_eq!(
        legal_successors(Phase::Approval),
        vec![Phase::Proposal, Phase::Simulation]
    );
}

#[test]
fn initial_grid_is_identical_across_games() {
    assert_eq!(create_grid(5), create_grid(5));
    let a = TurnEngine::new(GameConfig::default()).expect("valid config");
    let b = TurnEngine::new(GameConfig::default()).expect("valid config");
    assert_eq!(a.grid(), b.grid());
}
