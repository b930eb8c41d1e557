use rust_decimal::Decimal;

use crate::domain::{DisplayTier, LifecycleStatus, LostImpact, MonthlyRevenue, Tier};

pub fn classify(revenue_p1: Decimal, revenue_p2: Decimal) -> LifecycleStatus {
    let had_revenue = revenue_p1 > Decimal::ZERO;
    let has_revenue = revenue_p2 > Decimal::ZERO;
    match (had_revenue, has_revenue) {
        (false, true) => LifecycleStatus::New,
        (true, false) => LifecycleStatus::Lost,
        _ => LifecycleStatus::Existing,
    }
}

/// Presentation tier and tier group.
///
/// `tier_p2` comes from the period-2 ranking and `tier_p1` from the period-1
/// ranking; a lost entity is grouped by the period in which it still earned.
pub fn display_tier(status: LifecycleStatus, tier_p2: Tier, tier_p1: Tier) -> (DisplayTier, String) {
    match status {
        LifecycleStatus::Existing => (DisplayTier::from(tier_p2), tier_p2.label().to_string()),
        LifecycleStatus::New => (DisplayTier::New, format!("new_{}", tier_p2.label())),
        LifecycleStatus::Lost => (DisplayTier::Lost, format!("lost_{}", tier_p1.label())),
    }
}

/// Mean monthly revenue over the months that have data; `None` without history.
pub fn lost_impact(months: &[MonthlyRevenue]) -> Option<LostImpact> {
    if months.is_empty() {
        return None;
    }
    let total: Decimal = months.iter().map(|month| month.revenue).sum();
    let count = months.len() as u32;
    let avg_monthly_revenue = total.checked_div(Decimal::from(count))?.round_dp(2);
    Some(LostImpact { avg_monthly_revenue, months_with_data: count })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{classify, display_tier, lost_impact};
    use crate::domain::{DisplayTier, LifecycleStatus, MonthlyRevenue, Tier};

    #[test]
    fn classifies_by_revenue_presence() {
        let zero = Decimal::ZERO;
        let some = Decimal::from(500);

        assert_eq!(classify(zero, some), LifecycleStatus::New);
        assert_eq!(classify(some, zero), LifecycleStatus::Lost);
        assert_eq!(classify(some, some), LifecycleStatus::Existing);
        assert_eq!(classify(zero, zero), LifecycleStatus::Existing);
    }

    #[test]
    fn new_and_lost_keep_underlying_tier_in_group() {
        assert_eq!(
            display_tier(LifecycleStatus::New, Tier::A, Tier::C),
            (DisplayTier::New, "new_A".to_string())
        );
        assert_eq!(
            display_tier(LifecycleStatus::Lost, Tier::C, Tier::B),
            (DisplayTier::Lost, "lost_B".to_string())
        );
        assert_eq!(
            display_tier(LifecycleStatus::Existing, Tier::B, Tier::A),
            (DisplayTier::B, "B".to_string())
        );
    }

    #[test]
    fn lost_impact_averages_months_with_data() {
        let months = vec![
            MonthlyRevenue { year: 2025, month: 11, revenue: Decimal::from(100) },
            MonthlyRevenue { year: 2025, month: 12, revenue: Decimal::from(200) },
            MonthlyRevenue { year: 2026, month: 1, revenue: Decimal::from(600) },
        ];

        let impact = lost_impact(&months).expect("impact");
        assert_eq!(impact.avg_monthly_revenue, Decimal::from(300));
        assert_eq!(impact.months_with_data, 3);
    }

    #[test]
    fn lost_impact_is_absent_without_history() {
        assert_eq!(lost_impact(&[]), None);
    }
}
