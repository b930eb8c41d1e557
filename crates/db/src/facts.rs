//! Daily fact rows and how each perspective maps onto them.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pubscope_core::domain::Perspective;

use crate::repositories::RepositoryError;

const MICROS_PER_UNIT: i64 = 1_000_000;

/// One zone's serving counters for one day and product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub stat_date: NaiveDate,
    pub account_owner: String,
    pub publisher_id: String,
    pub publisher_name: String,
    pub media_id: String,
    pub media_name: String,
    pub product: String,
    pub zone_id: String,
    pub zone_name: String,
    pub requests: u64,
    pub paid: u64,
    pub revenue: Decimal,
    pub unit_price: Option<f64>,
}

impl DailyStat {
    /// The id this row carries for `dimension`. The team dimension is not
    /// stored on facts.
    pub fn attribute(&self, dimension: Perspective) -> Option<&str> {
        match dimension {
            Perspective::Team => None,
            Perspective::AccountOwner => Some(&self.account_owner),
            Perspective::Publisher => Some(&self.publisher_id),
            Perspective::MediaProperty => Some(&self.media_id),
            Perspective::Product => Some(&self.product),
            Perspective::Zone => Some(&self.zone_id),
        }
    }

    pub fn display_name(&self, dimension: Perspective) -> Option<&str> {
        match dimension {
            Perspective::Team => None,
            Perspective::AccountOwner => Some(&self.account_owner),
            Perspective::Publisher => Some(&self.publisher_name),
            Perspective::MediaProperty => Some(&self.media_name),
            Perspective::Product => Some(&self.product),
            Perspective::Zone => Some(&self.zone_name),
        }
    }

    pub fn revenue_micros(&self) -> Result<i64, RepositoryError> {
        to_micros(self.revenue)
    }
}

/// Warehouse column holding the id for `dimension`.
pub(crate) fn id_column(dimension: Perspective) -> Result<&'static str, RepositoryError> {
    match dimension {
        Perspective::Team => Err(RepositoryError::Unsupported(
            "team is resolved from membership, not stored on facts".to_string(),
        )),
        Perspective::AccountOwner => Ok("account_owner"),
        Perspective::Publisher => Ok("publisher_id"),
        Perspective::MediaProperty => Ok("media_id"),
        Perspective::Product => Ok("product"),
        Perspective::Zone => Ok("zone_id"),
    }
}

pub(crate) fn name_column(dimension: Perspective) -> Result<&'static str, RepositoryError> {
    match dimension {
        Perspective::Publisher => Ok("publisher_name"),
        Perspective::MediaProperty => Ok("media_name"),
        Perspective::Zone => Ok("zone_name"),
        other => id_column(other),
    }
}

/// Stored parent of an entity. Zones report their media property; products
/// and account owners have no stored parent.
pub(crate) fn parent_dimension(perspective: Perspective) -> Option<Perspective> {
    match perspective {
        Perspective::Publisher => Some(Perspective::AccountOwner),
        Perspective::MediaProperty => Some(Perspective::Publisher),
        Perspective::Zone => Some(Perspective::MediaProperty),
        Perspective::Team | Perspective::AccountOwner | Perspective::Product => None,
    }
}

pub(crate) fn to_micros(amount: Decimal) -> Result<i64, RepositoryError> {
    if amount.is_sign_negative() {
        return Err(RepositoryError::Encode(format!("revenue must not be negative, got {amount}")));
    }
    (amount * Decimal::from(MICROS_PER_UNIT))
        .round()
        .to_i64()
        .ok_or_else(|| RepositoryError::Encode(format!("revenue {amount} does not fit in micros")))
}

pub(crate) fn from_micros(micros: i64) -> Decimal {
    Decimal::new(micros, 6).normalize()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use pubscope_core::domain::Perspective;

    use super::{from_micros, id_column, parent_dimension, to_micros};

    #[test]
    fn micros_preserve_cents_exactly() {
        let amount = Decimal::new(123_456, 2);
        let micros = to_micros(amount).expect("encode");
        assert_eq!(micros, 1_234_560_000);
        assert_eq!(from_micros(micros), amount);
    }

    #[test]
    fn negative_revenue_is_rejected() {
        assert!(to_micros(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn team_has_no_fact_column() {
        assert!(id_column(Perspective::Team).is_err());
        assert_eq!(parent_dimension(Perspective::Zone), Some(Perspective::MediaProperty));
        assert_eq!(parent_dimension(Perspective::Product), None);
    }
}
