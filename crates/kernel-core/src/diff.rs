//! Grid diff, projected cost and per-turn metric deltas.
//!
//! Everything here is a pure function of `(before, after, strategy, policy)`: the same inputs
//! always produce the same outcome.

use contracts::{CellType, GameConfig, MetricDelta, MetricKind};
use serde::Serialize;

use crate::grid::{Grid, GridError};
use crate::rules::{weights, KEYWORD_BONUS, MAX_TURN_DELTA};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostPolicy {
    pub operating_cost: i64,
    pub demolition_cost: i64,
}

impl CostPolicy {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            operating_cost: config.operating_cost,
            demolition_cost: config.demolition_cost,
        }
    }
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub residential: i64,
    pub factory: i64,
    pub park: i64,
    pub commercial: i64,
    pub empty: i64,
}

impl TypeCounts {
    pub fn of(grid: &Grid) -> Self {
        let mut counts = Self::default();
        for cell in grid.cells() {
            *counts.slot(cell.cell_type) += 1;
        }
        counts
    }

    pub fn get(&self, cell_type: CellType) -> i64 {
        match cell_type {
            CellType::Residential => self.residential,
            CellType::Factory => self.factory,
            CellType::Park => self.park,
            CellType::Commercial => self.commercial,
            CellType::Empty => self.empty,
        }
    }

    fn slot(&mut self, cell_type: CellType) -> &mut i64 {
        match cell_type {
            CellType::Residential => &mut self.residential,
            CellType::Factory => &mut self.factory,
            CellType::Park => &mut self.park,
            CellType::Commercial => &mut self.commercial,
            CellType::Empty => &mut self.empty,
        }
    }

    /// `after - before` per type.
    pub fn minus(&self, before: &TypeCounts) -> TypeCounts {
        let mut deltas = TypeCounts::default();
        for cell_type in CellType::ALL {
            *deltas.slot(cell_type) = self.get(cell_type) - before.get(cell_type);
        }
        deltas
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordFamily {
    NoiseMitigation,
    ElderCare,
    AntiDisplacement,
    Jobs,
    Incubator,
    Investment,
    Carbon,
    HeatIsland,
    GreenInfrastructure,
    PermeablePaving,
}

impl KeywordFamily {
    pub const ALL: [KeywordFamily; 10] = [
        KeywordFamily::NoiseMitigation,
        KeywordFamily::ElderCare,
        KeywordFamily::AntiDisplacement,
        KeywordFamily::Jobs,
        KeywordFamily::Incubator,
        KeywordFamily::Investment,
        KeywordFamily::Carbon,
        KeywordFamily::HeatIsland,
        KeywordFamily::GreenInfrastructure,
        KeywordFamily::PermeablePaving,
    ];

    pub fn metric(self) -> MetricKind {
        match self {
            Self::NoiseMitigation | Self::ElderCare | Self::AntiDisplacement => {
                MetricKind::Satisfaction
            }
            Self::Jobs | Self::Incubator | Self::Investment => MetricKind::Economy,
            Self::Carbon | Self::HeatIsland | Self::GreenInfrastructure | Self::PermeablePaving => {
                MetricKind::Environment
            }
        }
    }

    /// Lowercase needles; a family matches when any of them occurs in the lowercased text.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::NoiseMitigation => &["noise", "噪", "扰民"],
            Self::ElderCare => &["elder", "senior", "accessib", "养老", "老年", "无障碍"],
            Self::AntiDisplacement => &[
                "displacement",
                "rehousing",
                "right to return",
                "回迁",
                "安置",
            ],
            Self::Jobs => &["jobs", "employment", "就业"],
            Self::Incubator => &["incubator", "startup", "创业", "孵化"],
            Self::Investment => &["investment", "roi", "招商", "投资"],
            Self::Carbon => &["carbon", "碳"],
            Self::HeatIsland => &["heat island", "heat-island", "热岛"],
            Self::GreenInfrastructure => &[
                "green infrastructure",
                "green space",
                "greenway",
                "绿地",
                "绿色基础设施",
            ],
            Self::PermeablePaving => &["permeable", "透水"],
        }
    }

    pub fn matches(self, lowered: &str) -> bool {
        self.keywords().iter().any(|needle| lowered.contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyBonus {
    pub delta: MetricDelta,
    pub matched: Vec<KeywordFamily>,
}

/// Order-independent: each family counts at most once no matter how often it is mentioned.
pub fn strategy_bonus(strategy: &str) -> StrategyBonus {
    let lowered = strategy.to_lowercase();
    let mut delta = MetricDelta::default();
    let mut matched = Vec::new();
    for family in KeywordFamily::ALL {
        if family.matches(&lowered) {
            delta.add(family.metric(), KEYWORD_BONUS);
            matched.push(family);
        }
    }
    StrategyBonus { delta, matched }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOutcome {
    pub before: TypeCounts,
    pub after: TypeCounts,
    pub deltas: TypeCounts,
    pub construction_delta: MetricDelta,
    pub bonus: StrategyBonus,
    /// Construction effects plus keyword bonus, before the per-turn clamp.
    pub unclamped_delta: MetricDelta,
    pub metric_delta: MetricDelta,
    /// Expense of the cell changes alone; negative when the diff refunds more than it costs.
    pub projected_cost: i64,
    pub operating_cost: i64,
    pub budget_delta: i64,
}

impl DiffOutcome {
    pub fn has_changes(&self) -> bool {
        CellType::ALL
            .into_iter()
            .any(|cell_type| self.deltas.get(cell_type) != 0)
    }
}

fn ensure_same_shape(before: &Grid, after: &Grid) -> Result<(), GridError> {
    if before.same_shape(after) {
        Ok(())
    } else {
        Err(GridError::ShapeMismatch {
            before: before.size(),
            after: after.size(),
        })
    }
}

fn construction_budget(deltas: &TypeCounts, policy: &CostPolicy) -> i64 {
    CellType::ALL
        .into_iter()
        .map(|cell_type| {
            let delta = deltas.get(cell_type);
            if delta > 0 {
                delta * weights(cell_type).budget
            } else {
                // Demolition is charged flat; it never refunds the build cost.
                delta * policy.demolition_cost
            }
        })
        .sum()
}

/// Budget-weight terms only: what the approval gate compares against the remaining budget.
pub fn projected_cost(before: &Grid, after: &Grid, policy: &CostPolicy) -> Result<i64, GridError> {
    ensure_same_shape(before, after)?;
    let deltas = TypeCounts::of(after).minus(&TypeCounts::of(before));
    Ok(-construction_budget(&deltas, policy))
}

pub fn compute_diff(
    before: &Grid,
    after: &Grid,
    strategy: &str,
    policy: &CostPolicy,
) -> Result<DiffOutcome, GridError> {
    ensure_same_shape(before, after)?;
    let before_counts = TypeCounts::of(before);
    let after_counts = TypeCounts::of(after);
    let deltas = after_counts.minus(&before_counts);

    // Removal is a negative count, so `delta * weight` reverses the construction effect.
    let mut construction_delta = MetricDelta::default();
    for cell_type in CellType::ALL {
        let delta = deltas.get(cell_type);
        if delta == 0 {
            continue;
        }
        let cell_weights = weights(cell_type);
        for kind in MetricKind::ALL {
            let effect = i32::try_from(delta)
                .unwrap_or(if delta > 0 { i32::MAX } else { i32::MIN })
                .saturating_mul(cell_weights.metric(kind));
            construction_delta.add(kind, effect);
        }
    }

    let bonus = strategy_bonus(strategy);
    let unclamped_delta = construction_delta.merged(&bonus.delta);
    let metric_delta = unclamped_delta.clamped(MAX_TURN_DELTA);
    let construction = construction_budget(&deltas, policy);

    Ok(DiffOutcome {
        before: before_counts,
        after: after_counts,
        deltas,
        construction_delta,
        bonus,
        unclamped_delta,
        metric_delta,
        projected_cost: -construction,
        operating_cost: policy.operating_cost,
        budget_delta: construction - policy.operating_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::create_grid;

    #[test]
    fn identical_grids_only_pay_operating_cost() {
        let grid = create_grid(5);
        let outcome = compute_diff(&grid, &grid, "", &CostPolicy::default()).expect("same shape");
        assert!(!outcome.has_changes());
        assert!(outcome.metric_delta.is_zero());
        assert_eq!(outcome.projected_cost, 0);
        assert_eq!(outcome.budget_delta, -10);
    }

    #[test]
    fn empty_to_commercial_costs_build_plus_demolition() {
        let before = create_grid(5);
        let after = before
            .set_cell_type("0-4", CellType::Commercial)
            .expect("known cell");
        let outcome = compute_diff(&before, &after, "", &CostPolicy::default()).expect("diff");
        assert_eq!(outcome.deltas.commercial, 1);
        assert_eq!(outcome.deltas.empty, -1);
        assert_eq!(outcome.projected_cost, 40);
        assert_eq!(outcome.budget_delta, -50);
        // commercial (-1, 4, -2) minus the empty lot's (-1, -1, 0)
        assert_eq!(
            outcome.metric_delta,
            MetricDelta {
                satisfaction: 0,
                economy: 5,
                environment: -2,
            }
        );
    }

    #[test]
    fn removing_factory_reverses_its_effect() {
        let before = create_grid(5);
        let after = before
            .set_cell_type("4-4", CellType::Empty)
            .expect("known cell");
        let outcome = compute_diff(&before, &after, "", &CostPolicy::default()).expect("diff");
        assert_eq!(outcome.construction_delta.satisfaction, 2 - 1);
        assert_eq!(outcome.construction_delta.economy, -3 - 1);
        assert_eq!(outcome.construction_delta.environment, 3);
        // 5 demolition charge, 5 refund for the new empty lot
        assert_eq!(outcome.projected_cost, 0);
    }

    #[test]
    fn per_turn_delta_is_clamped() {
        let before = Grid::from_types(4, &[CellType::Empty; 16]).expect("layout");
        let after = Grid::from_types(4, &[CellType::Park; 16]).expect("layout");
        let outcome = compute_diff(&before, &after, "", &CostPolicy::default()).expect("diff");
        assert_eq!(outcome.unclamped_delta.environment, 64);
        assert_eq!(outcome.metric_delta.environment, MAX_TURN_DELTA);
        assert_eq!(outcome.metric_delta.satisfaction, MAX_TURN_DELTA);
    }

    #[test]
    fn keyword_families_count_once_each() {
        let bonus = strategy_bonus("Noise barriers, more NOISE barriers, and a 创业 incubator");
        assert_eq!(
            bonus.matched,
            vec![KeywordFamily::NoiseMitigation, KeywordFamily::Incubator]
        );
        assert_eq!(bonus.delta.satisfaction, KEYWORD_BONUS);
        assert_eq!(bonus.delta.economy, KEYWORD_BONUS);
        assert_eq!(bonus.delta.environment, 0);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let small = create_grid(3);
        let large = create_grid(5);
        assert_eq!(
            projected_cost(&small, &large, &CostPolicy::default()),
            Err(GridError::ShapeMismatch {
                before: 3,
                after: 5
            })
        );
    }
}
