//! Per-cell-type scoring weights. Pure lookup.

use contracts::{CellType, MetricKind};
use serde::Serialize;

/// A single turn may move any metric by at most this much in either direction.
pub const MAX_TURN_DELTA: i32 = 15;

pub const KEYWORD_BONUS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellWeights {
    pub satisfaction: i32,
    pub economy: i32,
    pub environment: i32,
    /// Budget effect of building one cell; negative is a cost.
    pub budget: i64,
}

impl CellWeights {
    pub fn metric(&self, kind: MetricKind) -> i32 {
        match kind {
            MetricKind::Satisfaction => self.satisfaction,
            MetricKind::Economy => self.economy,
            MetricKind::Environment => self.environment,
        }
    }
}

pub const fn weights(cell_type: CellType) -> CellWeights {
    match cell_type {
        CellType::Residential => CellWeights {
            satisfaction: 2,
            economy: 0,
            environment: -1,
            budget: -15,
        },
        CellType::Factory => CellWeights {
            satisfaction: -2,
            economy: 3,
            environment: -3,
            budget: -25,
        },
        CellType::Park => CellWeights {
            satisfaction: 2,
            economy: 0,
            environment: 4,
            budget: -30,
        },
        CellType::Commercial => CellWeights {
            satisfaction: -1,
            economy: 4,
            environment: -2,
            budget: -35,
        },
        // Clearing a lot refunds a little.
        CellType::Empty => CellWeights {
            satisfaction: -1,
            economy: -1,
            environment: 0,
            budget: 5,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_refunds() {
        for cell_type in CellType::ALL {
            let budget = weights(cell_type).budget;
            if cell_type == CellType::Empty {
                assert!(budget > 0);
            } else {
                assert!(budget < 0, "{cell_type} should cost budget");
            }
        }
    }

    #[test]
    fn commercial_is_the_strongest_economy_lever() {
        let best = CellType::ALL
            .into_iter()
            .max_by_key(|cell_type| weights(*cell_type).metric(MetricKind::Economy));
        assert_eq!(best, Some(CellType::Commercial));
    }
}
