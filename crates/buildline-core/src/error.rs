use std::fmt;

/// Machine-readable error codes surfaced in operation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    JourneyNotFound,
    BinNotFound,
    DuplicateBarcode,
    WrongStage,
    NotAssignedTechnician,
    ChecklistIncomplete,
    InvalidQcVerdict,
    StaleJourney,
    BinCapacityExceeded,
    BinUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::JourneyNotFound => "E2001",
            Self::BinNotFound => "E2002",
            Self::DuplicateBarcode => "E2003",
            Self::WrongStage => "E3001",
            Self::NotAssignedTechnician => "E3002",
            Self::ChecklistIncomplete => "E3003",
            Self::InvalidQcVerdict => "E3004",
            Self::StaleJourney => "E3005",
            Self::BinCapacityExceeded => "E4001",
            Self::BinUnavailable => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and operation messages.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::JourneyNotFound => "Journey not found",
            Self::BinNotFound => "Bin not found",
            Self::DuplicateBarcode => "Barcode already inwarded",
            Self::WrongStage => "Journey is not in the required stage",
            Self::NotAssignedTechnician => "Technician is not assigned to this journey",
            Self::ChecklistIncomplete => "Assembly checklist is incomplete",
            Self::InvalidQcVerdict => "Invalid QC verdict",
            Self::StaleJourney => "Journey changed underneath this operation",
            Self::BinCapacityExceeded => "Bin is at capacity",
            Self::BinUnavailable => "Bin is not active",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in buildline.toml and retry."),
            Self::JourneyNotFound => Some("Check the barcode; the bike may not be inwarded yet."),
            Self::BinNotFound => None,
            Self::DuplicateBarcode => Some("Each barcode can be inwarded exactly once."),
            Self::WrongStage => {
                Some("Follow valid stages: inwarded -> assigned -> in_progress -> ready_for_sale.")
            }
            Self::NotAssignedTechnician => {
                Some("Only the assigned technician can work this journey; reassign first.")
            }
            Self::ChecklistIncomplete => {
                Some("Tyres, brakes, and gears must all be checked before completion.")
            }
            Self::InvalidQcVerdict => Some("Submit 'pass' or 'fail'."),
            Self::StaleJourney => Some("Reload the journey and retry against its current stage."),
            Self::BinCapacityExceeded => Some("Pick a bin with spare capacity."),
            Self::BinUnavailable => Some("Move the bin back to 'active' or pick another bin."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
