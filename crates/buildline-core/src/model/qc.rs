use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::journey::ParseEnumError;

/// Outcome of a QC attempt, and the coarse `qc_status` summary on a
/// journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QcVerdict {
    Pending,
    Pass,
    Fail,
}

impl QcVerdict {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    /// Whether this verdict closes a QC attempt.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for QcVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QcVerdict {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            _ => Err(ParseEnumError {
                expected: "qc verdict",
                got: s.to_string(),
            }),
        }
    }
}

/// One inspected subsystem on the detailed QC checklist.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubsystemCheck {
    pub ok: bool,
    pub notes: Option<String>,
}

/// Per-subsystem inspection detail submitted with a QC verdict.
///
/// Every field defaults to an unchecked subsystem, so a verdict can be
/// submitted with partial detail.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QcInspection {
    pub brake: SubsystemCheck,
    pub drivetrain: SubsystemCheck,
    pub alignment: SubsystemCheck,
    pub torque: SubsystemCheck,
    pub accessories: SubsystemCheck,
}

#[cfg(test)]
mod tests {
    use super::{QcInspection, QcVerdict, SubsystemCheck};
    use std::str::FromStr;

    #[test]
    fn verdict_json_roundtrips() {
        assert_eq!(serde_json::to_string(&QcVerdict::Pass).unwrap(), "\"pass\"");
        assert_eq!(
            serde_json::from_str::<QcVerdict>("\"fail\"").unwrap(),
            QcVerdict::Fail
        );
        assert!(serde_json::from_str::<QcVerdict>("\"maybe\"").is_err());
    }

    #[test]
    fn verdict_parse_and_finality() {
        assert_eq!(QcVerdict::from_str("PASS").unwrap(), QcVerdict::Pass);
        assert!(QcVerdict::from_str("approved").is_err());
        assert!(QcVerdict::Pass.is_final());
        assert!(QcVerdict::Fail.is_final());
        assert!(!QcVerdict::Pending.is_final());
    }

    #[test]
    fn inspection_defaults_to_unchecked() {
        let inspection: QcInspection = serde_json::from_str("{}").unwrap();
        assert!(!inspection.brake.ok);
        assert!(!inspection.accessories.ok);
        assert!(inspection.torque.notes.is_none());

        let partial: QcInspection = serde_json::from_str(
            r#"{"brake":{"ok":true,"notes":"pads replaced"},"torque":{"ok":true}}"#,
        )
        .unwrap();
        assert_eq!(
            partial.brake,
            SubsystemCheck {
                ok: true,
                notes: Some("pads replaced".to_string())
            }
        );
        assert!(partial.torque.ok);
        assert!(!partial.drivetrain.ok);
    }
}
