use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// The entity type a comparison is run over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    Team,
    AccountOwner,
    Publisher,
    MediaProperty,
    Product,
    Zone,
}

impl Perspective {
    pub const ALL: [Perspective; 6] = [
        Self::Team,
        Self::AccountOwner,
        Self::Publisher,
        Self::MediaProperty,
        Self::Product,
        Self::Zone,
    ];

    /// Short code used on the wire and in filter keys.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::AccountOwner => "pic",
            Self::Publisher => "pid",
            Self::MediaProperty => "mid",
            Self::Product => "product",
            Self::Zone => "zid",
        }
    }

    /// Fixed drill-down hierarchy. `None` for the terminal zone level.
    pub fn child(&self) -> Option<Perspective> {
        match self {
            Self::Team => Some(Self::AccountOwner),
            Self::AccountOwner => Some(Self::Publisher),
            Self::Publisher => Some(Self::MediaProperty),
            Self::MediaProperty => Some(Self::Zone),
            Self::Product => Some(Self::Zone),
            Self::Zone => None,
        }
    }

    /// Team is synthesized from account-owner rows and has no warehouse column.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Team)
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Perspective {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "team" => Ok(Self::Team),
            "pic" | "account_owner" => Ok(Self::AccountOwner),
            "pid" | "publisher" => Ok(Self::Publisher),
            "mid" | "media_property" | "media" => Ok(Self::MediaProperty),
            "product" => Ok(Self::Product),
            "zid" | "zone" => Ok(Self::Zone),
            other => Err(EngineError::InvalidPerspective(other.to_string())),
        }
    }
}
