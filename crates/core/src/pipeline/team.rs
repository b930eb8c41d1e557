//! Virtual team perspective.
//!
//! Teams are not a warehouse column. Account-owner rows are folded into
//! their groups; everything downstream treats the folded rows like any other
//! population.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::{AggregateRow, FilterClause, MembershipGroup, PeriodMetrics};
use crate::pipeline::derived::ecpm;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TeamFold {
    pub rows: Vec<AggregateRow>,
    /// Account owners that belong to no group; excluded from every team.
    pub unmapped: Vec<String>,
}

/// Keeps only the groups named by every team clause.
pub fn select_groups<'a>(
    groups: &'a [MembershipGroup],
    team_clauses: &[FilterClause],
) -> Vec<&'a MembershipGroup> {
    groups
        .iter()
        .filter(|group| team_clauses.iter().all(|clause| clause.matches(&group.group_id)))
        .collect()
}

/// Distinct member ids across `groups`, in first-seen order.
pub fn member_ids(groups: &[&MembershipGroup]) -> Vec<String> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .flat_map(|group| group.member_ids.iter())
        .filter(|member| seen.insert(member.as_str()))
        .cloned()
        .collect()
}

/// Sums member account-owner rows per selected group, in group order. Groups
/// without any matching member row are omitted rather than emitted as zeros.
/// An owner is unmapped only when no group in `membership` lists it.
pub fn fold_into_teams(
    owner_rows: &[AggregateRow],
    membership: &[MembershipGroup],
    selected: &[&MembershipGroup],
) -> TeamFold {
    let by_owner: HashMap<&str, &AggregateRow> =
        owner_rows.iter().map(|row| (row.id.as_str(), row)).collect();

    let rows = selected
        .iter()
        .filter_map(|group| {
            let members: BTreeSet<&str> = group.member_ids.iter().map(String::as_str).collect();
            let matched: Vec<&AggregateRow> =
                members.iter().filter_map(|member| by_owner.get(member).copied()).collect();
            if matched.is_empty() {
                return None;
            }

            Some(AggregateRow {
                id: group.group_id.clone(),
                name: group.group_name.clone(),
                parent_id: None,
                child_count: Some(matched.len() as u64),
                p1: sum_periods(matched.iter().map(|row| &row.p1)),
                p2: sum_periods(matched.iter().map(|row| &row.p2)),
            })
        })
        .collect();

    let mapped: HashSet<&str> = membership
        .iter()
        .flat_map(|group| group.member_ids.iter().map(String::as_str))
        .collect();
    let unmapped = owner_rows
        .iter()
        .filter(|row| !mapped.contains(row.id.as_str()))
        .map(|row| row.id.clone())
        .collect();

    TeamFold { rows, unmapped }
}

/// Sums counters; the unit price of a group is its blended eCPM, since
/// averaged member prices cannot be combined.
fn sum_periods<'a>(periods: impl Iterator<Item = &'a PeriodMetrics>) -> PeriodMetrics {
    let mut total = PeriodMetrics::default();
    for period in periods {
        total.requests += period.requests;
        total.revenue += period.revenue;
        total.paid += period.paid;
    }
    total.unit_price = (total.requests > 0).then(|| ecpm(total.revenue, total.requests));
    total
}
