//! Pareto revenue tiering.
//!
//! Tiers only mean something over a complete comparison population: the
//! boundaries come from the running cumulative share at each rank position,
//! so ranking a subset yields different tiers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Ranking, Tier};
use crate::pipeline::derived::share_pct;

/// Cumulative-share ceilings (inclusive) for tiers A and B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub a_max_pct: Decimal,
    pub b_max_pct: Decimal,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { a_max_pct: Decimal::from(80), b_max_pct: Decimal::from(95) }
    }
}

impl TierThresholds {
    pub fn classify(&self, cumulative_pct: Decimal) -> Tier {
        if cumulative_pct <= self.a_max_pct {
            Tier::A
        } else if cumulative_pct <= self.b_max_pct {
            Tier::B
        } else {
            Tier::C
        }
    }
}

/// Ranks `revenues` descending and returns `(input_index, ranking)` pairs in
/// rank order. Ties keep their input order.
pub fn rank_by_revenue(revenues: &[Decimal], thresholds: &TierThresholds) -> Vec<(usize, Ranking)> {
    let mut order: Vec<usize> = (0..revenues.len()).collect();
    order.sort_by(|left, right| revenues[*right].cmp(&revenues[*left]));

    let total_revenue: Decimal = order.iter().map(|index| revenues[*index]).sum();
    let mut cumulative_revenue = Decimal::ZERO;

    order
        .into_iter()
        .enumerate()
        .map(|(position, index)| {
            cumulative_revenue += revenues[index];
            let cumulative_revenue_pct = share_pct(cumulative_revenue, total_revenue);
            let ranking = Ranking {
                rank: position + 1,
                total_revenue,
                cumulative_revenue,
                cumulative_revenue_pct,
                tier: thresholds.classify(cumulative_revenue_pct),
            };
            (index, ranking)
        })
        .collect()
}
