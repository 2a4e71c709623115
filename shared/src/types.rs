//! Common types used across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Base dispensing unit of an item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaseUnit {
    #[default]
    Tablet,
    Capsule,
    Bottle,
    Tube,
    Vial,
    Ampoule,
    Sachet,
    Piece,
    Millilitre,
    Gram,
}

impl BaseUnit {
    pub fn code(&self) -> &'static str {
        match self {
            BaseUnit::Tablet => "tab",
            BaseUnit::Capsule => "cap",
            BaseUnit::Bottle => "btl",
            BaseUnit::Tube => "tube",
            BaseUnit::Vial => "vial",
            BaseUnit::Ampoule => "amp",
            BaseUnit::Sachet => "sach",
            BaseUnit::Piece => "pc",
            BaseUnit::Millilitre => "ml",
            BaseUnit::Gram => "g",
        }
    }

    pub fn from_code(code: &str) -> Option<BaseUnit> {
        match code {
            "tab" => Some(BaseUnit::Tablet),
            "cap" => Some(BaseUnit::Capsule),
            "btl" => Some(BaseUnit::Bottle),
            "tube" => Some(BaseUnit::Tube),
            "vial" => Some(BaseUnit::Vial),
            "amp" => Some(BaseUnit::Ampoule),
            "sach" => Some(BaseUnit::Sachet),
            "pc" => Some(BaseUnit::Piece),
            "ml" => Some(BaseUnit::Millilitre),
            "g" => Some(BaseUnit::Gram),
            _ => None,
        }
    }
}

impl std::fmt::Display for BaseUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Inclusive date range filter used by movement reports
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start_date {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if date > end {
                return false;
            }
        }
        true
    }
}
