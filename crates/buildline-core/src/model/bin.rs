use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::journey::{ParseEnumError, Stage};

/// Storage-purpose classification of a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    InwardZone,
    AssemblyZone,
    CompletionZone,
    QcZone,
    ReadyZone,
}

impl Zone {
    pub const ALL: [Self; 5] = [
        Self::InwardZone,
        Self::AssemblyZone,
        Self::CompletionZone,
        Self::QcZone,
        Self::ReadyZone,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::InwardZone => "inward_zone",
            Self::AssemblyZone => "assembly_zone",
            Self::CompletionZone => "completion_zone",
            Self::QcZone => "qc_zone",
            Self::ReadyZone => "ready_zone",
        }
    }

    /// The zone a journey belongs in while it sits in `stage`.
    #[must_use]
    pub const fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Inwarded => Self::InwardZone,
            Stage::Assigned | Stage::InProgress => Self::AssemblyZone,
            Stage::Completed => Self::CompletionZone,
            Stage::QcReview => Self::QcZone,
            Stage::ReadyForSale => Self::ReadyZone,
        }
    }
}

/// Operational state of a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinStatus {
    Active,
    Maintenance,
    Full,
    Inactive,
}

impl BinStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Maintenance => "maintenance",
            Self::Full => "full",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inward_zone" => Ok(Self::InwardZone),
            "assembly_zone" => Ok(Self::AssemblyZone),
            "completion_zone" => Ok(Self::CompletionZone),
            "qc_zone" => Ok(Self::QcZone),
            "ready_zone" => Ok(Self::ReadyZone),
            _ => Err(ParseEnumError {
                expected: "zone",
                got: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for BinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "maintenance" => Ok(Self::Maintenance),
            "full" => Ok(Self::Full),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ParseEnumError {
                expected: "bin status",
                got: s.to_string(),
            }),
        }
    }
}
