//! Report categories and their tier presentation rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two report kinds tracked per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    /// Negative report: the user scammed someone.
    Scam,
    /// Positive report: someone vouches for the user.
    Vouch,
}

impl ReportCategory {
    /// Parse a category from its storage string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scam" => Some(Self::Scam),
            "vouch" => Some(Self::Vouch),
            _ => None,
        }
    }

    /// Storage string for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scam => "scam",
            Self::Vouch => "vouch",
        }
    }

    /// Name of the counter column tracking this category.
    pub fn counter_column(&self) -> &'static str {
        match self {
            Self::Scam => "scam_count",
            Self::Vouch => "vouch_count",
        }
    }

    /// Deterministic display name for the tier at a given threshold,
    /// e.g. `"Scams 3"` or `"Vouches 5"`.
    pub fn tier_name(&self, threshold: u32) -> String {
        match self {
            Self::Scam => format!("Scams {}", threshold),
            Self::Vouch => format!("Vouches {}", threshold),
        }
    }

    /// RGB color for the tier at a given threshold.
    ///
    /// Low thresholds get the base hue, higher thresholds progressively
    /// brighter ones. Bands: <=1, <=5, >5.
    pub fn tier_color(&self, threshold: u32) -> u32 {
        match self {
            Self::Scam => {
                if threshold <= 1 {
                    0xFF4444 // bright red
                } else if threshold <= 5 {
                    0xFF6600 // orange-red
                } else {
                    0xFF8800 // bright orange
                }
            }
            Self::Vouch => {
                if threshold <= 1 {
                    0x44FF44 // bright green
                } else if threshold <= 5 {
                    0x00FF88 // green-teal
                } else {
                    0x00FFAA // bright teal
                }
            }
        }
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
