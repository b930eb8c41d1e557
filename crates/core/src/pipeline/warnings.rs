//! Rule-based health warnings.
//!
//! Rules are plain data evaluated independently; the single highest-priority
//! match wins, and within a priority the first rule in table order wins.
//! Changes from a zero baseline are `0%` and therefore never trip a rule.

use std::collections::BTreeSet;

use crate::domain::{DerivedMetrics, LifecycleStatus, Metric, Severity, Warning};

/// The inputs every rule looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WarningSignals {
    pub requests_change_pct: f64,
    pub price_change_pct: f64,
    pub revenue_change_pct: f64,
    pub fill_rate_p2: f64,
    pub fill_rate_delta_pp: f64,
}

impl From<&DerivedMetrics> for WarningSignals {
    fn from(derived: &DerivedMetrics) -> Self {
        Self {
            requests_change_pct: derived.requests_change_pct,
            price_change_pct: derived.unit_price_change_pct,
            revenue_change_pct: derived.revenue_change_pct,
            fill_rate_p2: derived.fill_rate_p2,
            fill_rate_delta_pp: derived.fill_rate_delta_pp,
        }
    }
}

pub struct WarningRule {
    pub name: &'static str,
    /// 1 = critical, 2 = warning, 3 = info.
    pub priority: u8,
    pub severity: Severity,
    pub metrics: &'static [Metric],
    pub predicate: fn(&WarningSignals) -> bool,
    pub message: fn(&WarningSignals) -> String,
}

/// `value` in the half-open interval `(lower, upper]`.
fn within(value: f64, lower: f64, upper: f64) -> bool {
    value > lower && value <= upper
}

pub static WARNING_RULES: &[WarningRule] = &[
    WarningRule {
        name: "requests_collapse",
        priority: 1,
        severity: Severity::Critical,
        metrics: &[Metric::Requests],
        predicate: |s: &WarningSignals| s.requests_change_pct <= -40.0,
        message: |s: &WarningSignals| {
            format!("Requests dropped {:.1}%", -s.requests_change_pct)
        },
    },
    WarningRule {
        name: "price_collapse",
        priority: 1,
        severity: Severity::Critical,
        metrics: &[Metric::UnitPrice],
        predicate: |s: &WarningSignals| s.price_change_pct <= -40.0,
        message: |s: &WarningSignals| format!("Unit price dropped {:.1}%", -s.price_change_pct),
    },
    WarningRule {
        name: "requests_and_price_drop",
        priority: 1,
        severity: Severity::Critical,
        metrics: &[Metric::Requests, Metric::UnitPrice],
        predicate: |s: &WarningSignals| {
            s.requests_change_pct <= -25.0 && s.price_change_pct <= -25.0
        },
        message: |s: &WarningSignals| {
            format!(
                "Requests dropped {:.1}% and unit price dropped {:.1}%",
                -s.requests_change_pct, -s.price_change_pct
            )
        },
    },
    WarningRule {
        name: "fill_rate_collapse",
        priority: 1,
        severity: Severity::Critical,
        metrics: &[Metric::FillRate],
        predicate: |s: &WarningSignals| s.fill_rate_p2 < 50.0 && s.fill_rate_delta_pp <= -15.0,
        message: |s: &WarningSignals| {
            format!(
                "Fill rate fell {:.1}pp to {:.1}%",
                -s.fill_rate_delta_pp, s.fill_rate_p2
            )
        },
    },
    WarningRule {
        name: "requests_decline",
        priority: 2,
        severity: Severity::Warning,
        metrics: &[Metric::Requests],
        predicate: |s: &WarningSignals| within(s.requests_change_pct, -40.0, -25.0),
        message: |s: &WarningSignals| {
            format!("Requests declined {:.1}%", -s.requests_change_pct)
        },
    },
    WarningRule {
        name: "price_decline",
        priority: 2,
        severity: Severity::Warning,
        metrics: &[Metric::UnitPrice],
        predicate: |s: &WarningSignals| within(s.price_change_pct, -40.0, -25.0),
        message: |s: &WarningSignals| format!("Unit price declined {:.1}%", -s.price_change_pct),
    },
    WarningRule {
        name: "revenue_decline_from_volume",
        priority: 2,
        severity: Severity::Warning,
        metrics: &[Metric::Revenue, Metric::Requests],
        predicate: |s: &WarningSignals| {
            within(s.revenue_change_pct, -40.0, -25.0)
                && s.requests_change_pct <= -15.0
                && s.price_change_pct > -10.0
        },
        message: |s: &WarningSignals| {
            format!(
                "Revenue declined {:.1}%, driven by requests ({:.1}%)",
                -s.revenue_change_pct, s.requests_change_pct
            )
        },
    },
    WarningRule {
        name: "revenue_decline_from_price",
        priority: 2,
        severity: Severity::Warning,
        metrics: &[Metric::Revenue, Metric::UnitPrice],
        predicate: |s: &WarningSignals| {
            within(s.revenue_change_pct, -40.0, -25.0)
                && s.price_change_pct <= -15.0
                && s.requests_change_pct > -10.0
        },
        message: |s: &WarningSignals| {
            format!(
                "Revenue declined {:.1}%, driven by unit price ({:.1}%)",
                -s.revenue_change_pct, s.price_change_pct
            )
        },
    },
    WarningRule {
        name: "fill_rate_decline",
        priority: 2,
        severity: Severity::Warning,
        metrics: &[Metric::FillRate],
        predicate: |s: &WarningSignals| {
            within(s.fill_rate_delta_pp, -30.0, -15.0) && s.fill_rate_p2 >= 50.0
        },
        message: |s: &WarningSignals| {
            format!("Fill rate declined {:.1}pp to {:.1}%", -s.fill_rate_delta_pp, s.fill_rate_p2)
        },
    },
    WarningRule {
        name: "requests_softening",
        priority: 3,
        severity: Severity::Info,
        metrics: &[Metric::Requests],
        predicate: |s: &WarningSignals| within(s.requests_change_pct, -25.0, -15.0),
        message: |s: &WarningSignals| format!("Requests down {:.1}%", -s.requests_change_pct),
    },
    WarningRule {
        name: "price_softening",
        priority: 3,
        severity: Severity::Info,
        metrics: &[Metric::UnitPrice],
        predicate: |s: &WarningSignals| within(s.price_change_pct, -25.0, -15.0),
        message: |s: &WarningSignals| format!("Unit price down {:.1}%", -s.price_change_pct),
    },
    WarningRule {
        name: "fill_rate_softening",
        priority: 3,
        severity: Severity::Info,
        metrics: &[Metric::FillRate],
        predicate: |s: &WarningSignals| within(s.fill_rate_delta_pp, -15.0, -10.0),
        message: |s: &WarningSignals| format!("Fill rate down {:.1}pp", -s.fill_rate_delta_pp),
    },
];

/// All rules that match, in table order.
pub fn matching_rules(signals: &WarningSignals) -> Vec<&'static WarningRule> {
    WARNING_RULES.iter().filter(|rule| (rule.predicate)(signals)).collect()
}

/// The winning rule, if any.
pub fn select_rule(signals: &WarningSignals) -> Option<&'static WarningRule> {
    matching_rules(signals).into_iter().min_by_key(|rule| rule.priority)
}

/// Exactly one warning per entity. Only existing entities are evaluated.
pub fn evaluate(status: LifecycleStatus, derived: &DerivedMetrics) -> Warning {
    if status != LifecycleStatus::Existing {
        return Warning::healthy();
    }

    let signals = WarningSignals::from(derived);
    match select_rule(&signals) {
        Some(rule) => Warning {
            severity: rule.severity,
            message: Some((rule.message)(&signals)),
            metrics: rule.metrics.iter().copied().collect::<BTreeSet<_>>(),
        },
        None => Warning::healthy(),
    }
}
