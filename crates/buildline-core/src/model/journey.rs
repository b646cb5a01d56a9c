use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The six lifecycle stages of an assembly journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inwarded,
    Assigned,
    InProgress,
    Completed,
    QcReview,
    ReadyForSale,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::Inwarded,
        Self::Assigned,
        Self::InProgress,
        Self::Completed,
        Self::QcReview,
        Self::ReadyForSale,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Inwarded => "inwarded",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::QcReview => "qc_review",
            Self::ReadyForSale => "ready_for_sale",
        }
    }

    /// Whether this stage has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ReadyForSale)
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `inwarded -> assigned`
    /// - `assigned -> in_progress`
    /// - `in_progress -> completed` (hand over to QC)
    /// - `in_progress -> ready_for_sale` (self-certified completion)
    /// - `completed -> qc_review`
    /// - `completed -> ready_for_sale` (QC pass without a review stage)
    /// - `completed -> in_progress` (QC fail, rework)
    /// - `qc_review -> ready_for_sale`
    /// - `qc_review -> in_progress` (QC fail, rework)
    pub fn can_transition_to(&self, target: Stage) -> Result<(), InvalidTransition> {
        if *self == target {
            return Err(InvalidTransition {
                from: *self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        let allowed = matches!(
            (*self, target),
            (Self::Inwarded, Stage::Assigned)
                | (Self::Assigned, Stage::InProgress)
                | (Self::InProgress, Stage::Completed)
                | (Self::InProgress, Stage::ReadyForSale)
                | (Self::Completed, Stage::QcReview)
                | (Self::Completed, Stage::ReadyForSale)
                | (Self::Completed, Stage::InProgress)
                | (Self::QcReview, Stage::ReadyForSale)
                | (Self::QcReview, Stage::InProgress)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: *self,
                to: target,
                reason: "transition not allowed by lifecycle rules",
            })
        }
    }
}

/// The fixed three-point assembly checklist.
///
/// Serde rejects payloads with missing or unknown keys, so a checklist
/// that reaches the engine always carries exactly `tyres`, `brakes`,
/// and `gears`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Checklist {
    pub tyres: bool,
    pub brakes: bool,
    pub gears: bool,
}

impl Checklist {
    /// All three flags checked.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        self.tyres && self.brakes && self.gears
    }

    /// Names of the unchecked flags, for denial messages.
    #[must_use]
    pub fn missing(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.tyres {
            out.push("tyres");
        }
        if !self.brakes {
            out.push("brakes");
        }
        if !self.gears {
            out.push("gears");
        }
        out
    }
}

/// Error returned when a stage transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: Stage,
    pub to: Stage,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid transition {} -> {}: {}", self.from, self.to, self.reason)
    }
}

impl std::error::Error for InvalidTransition {}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inwarded" => Ok(Self::Inwarded),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "qc_review" => Ok(Self::QcReview),
            "ready_for_sale" => Ok(Self::ReadyForSale),
            _ => Err(ParseEnumError {
                expected: "stage",
                got: s.to_string(),
            }),
        }
    }
}
