//! Per-entity derived metrics.
//!
//! Every ratio with a zero denominator is reported as `0`, never NaN or
//! infinity. A change from a zero baseline is reported as `0%` no matter how
//! large the new value is.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::{DerivedMetrics, PeriodMetrics};

pub fn change_pct(v1: f64, v2: f64) -> f64 {
    if v1 == 0.0 || !v1.is_finite() || !v2.is_finite() {
        return 0.0;
    }
    finite_or_zero((v2 - v1) / v1 * 100.0)
}

pub fn decimal_change_pct(v1: Decimal, v2: Decimal) -> f64 {
    if v1.is_zero() {
        return 0.0;
    }
    ((v2 - v1) * Decimal::ONE_HUNDRED)
        .checked_div(v1)
        .and_then(|value| value.to_f64())
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

pub fn fill_rate(paid: u64, requests: u64) -> f64 {
    if requests == 0 {
        return 0.0;
    }
    paid as f64 / requests as f64 * 100.0
}

/// Revenue per thousand requests.
pub fn ecpm(revenue: Decimal, requests: u64) -> f64 {
    if requests == 0 {
        return 0.0;
    }
    (revenue * Decimal::ONE_THOUSAND)
        .checked_div(Decimal::from(requests))
        .and_then(|value| value.to_f64())
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

/// Share of `part` in `whole` as a percentage; `0` when `whole` is zero.
pub fn share_pct(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part * Decimal::ONE_HUNDRED).checked_div(whole).unwrap_or(Decimal::ZERO)
}

pub fn derive(p1: &PeriodMetrics, p2: &PeriodMetrics) -> DerivedMetrics {
    let fill_rate_p1 = fill_rate(p1.paid, p1.requests);
    let fill_rate_p2 = fill_rate(p2.paid, p2.requests);
    let ecpm_p1 = ecpm(p1.revenue, p1.requests);
    let ecpm_p2 = ecpm(p2.revenue, p2.requests);

    // A missing p1 price has no baseline; a missing p2 price counts as zero.
    let unit_price_change_pct = match p1.unit_price {
        Some(price) if price != 0.0 => change_pct(price, p2.unit_price.unwrap_or(0.0)),
        _ => 0.0,
    };

    DerivedMetrics {
        fill_rate_p1,
        fill_rate_p2,
        ecpm_p1,
        ecpm_p2,
        requests_change_pct: change_pct(p1.requests as f64, p2.requests as f64),
        revenue_change_pct: decimal_change_pct(p1.revenue, p2.revenue),
        unit_price_change_pct,
        ecpm_change_pct: change_pct(ecpm_p1, ecpm_p2),
        fill_rate_change_pct: change_pct(fill_rate_p1, fill_rate_p2),
        fill_rate_delta_pp: fill_rate_p2 - fill_rate_p1,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
