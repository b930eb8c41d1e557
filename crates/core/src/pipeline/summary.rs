use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::{DisplayTier, EntityReport, Severity, Summary};
use crate::pipeline::derived::{change_pct, decimal_change_pct, ecpm, share_pct};

/// Rolls a tiered population up into totals and per-tier figures.
///
/// eCPM here is blended from the summed totals, not averaged per entity.
/// Lost entities have no period-2 revenue, so their tier revenue is their
/// period-1 revenue, measured against the period-1 total.
pub fn summarize(rows: &[EntityReport]) -> Summary {
    let total_revenue_p1: Decimal = rows.iter().map(|row| row.p1.revenue).sum();
    let total_revenue_p2: Decimal = rows.iter().map(|row| row.p2.revenue).sum();
    let total_requests_p1: u64 = rows.iter().map(|row| row.p1.requests).sum();
    let total_requests_p2: u64 = rows.iter().map(|row| row.p2.requests).sum();

    let ecpm_p1 = ecpm(total_revenue_p1, total_requests_p1);
    let ecpm_p2 = ecpm(total_revenue_p2, total_requests_p2);

    let mut tier_counts: BTreeMap<DisplayTier, usize> =
        DisplayTier::ALL.into_iter().map(|tier| (tier, 0)).collect();
    let mut tier_revenue: BTreeMap<DisplayTier, Decimal> =
        DisplayTier::ALL.into_iter().map(|tier| (tier, Decimal::ZERO)).collect();
    let mut warning_counts: BTreeMap<Severity, usize> =
        Severity::ALL.into_iter().map(|severity| (severity, 0)).collect();

    for row in rows {
        *tier_counts.entry(row.display_tier).or_default() += 1;
        let revenue = match row.display_tier {
            DisplayTier::Lost => row.p1.revenue,
            _ => row.p2.revenue,
        };
        *tier_revenue.entry(row.display_tier).or_default() += revenue;
        *warning_counts.entry(row.warning.severity).or_default() += 1;
    }

    let tier_revenue_share_pct = tier_revenue
        .iter()
        .map(|(tier, revenue)| {
            let whole = match tier {
                DisplayTier::Lost => total_revenue_p1,
                _ => total_revenue_p2,
            };
            (*tier, share_pct(*revenue, whole).to_f64().unwrap_or(0.0))
        })
        .collect();

    Summary {
        total_items: rows.len(),
        total_revenue_p1,
        total_revenue_p2,
        revenue_change_pct: decimal_change_pct(total_revenue_p1, total_revenue_p2),
        total_requests_p1,
        total_requests_p2,
        requests_change_pct: change_pct(total_requests_p1 as f64, total_requests_p2 as f64),
        ecpm_p1,
        ecpm_p2,
        ecpm_change_pct: change_pct(ecpm_p1, ecpm_p2),
        tier_counts,
        tier_revenue,
        tier_revenue_share_pct,
        warning_counts,
    }
}
