use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitorId(String);

impl CompetitorId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaceId(String);

impl RaceId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointDirection {
    LowPoint,
    HighPoint,
}

impl PointDirection {
    pub fn better(self, a: Decimal, b: Decimal) -> bool {
        match self {
            Self::LowPoint => a < b,
            Self::HighPoint => a > b,
        }
    }

    pub fn worse(self, a: Decimal, b: Decimal) -> bool {
        match self {
            Self::LowPoint => a > b,
            Self::HighPoint => a < b,
        }
    }
}
