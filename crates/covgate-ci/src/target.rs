//! Built-in build targets.

use serde::{Deserialize, Serialize};

/// Named targets of the canonical build graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BuiltinTarget {
    #[serde(rename = "primarySuite")]
    PrimarySuite,
    #[serde(rename = "extendedSuite")]
    ExtendedSuite,
    #[serde(rename = "mergedReport")]
    MergedReport,
    #[serde(rename = "thresholdVerification")]
    ThresholdVerification,
    #[serde(rename = "check")]
    Check,
    #[serde(rename = "fullRun")]
    FullRun,
    #[serde(rename = "summary")]
    Summary,
    #[serde(rename = "dependencyScan")]
    DependencyScan,
}

impl BuiltinTarget {
    /// Registration order; breaks ties when planning.
    pub const ALL: [BuiltinTarget; 8] = [
        BuiltinTarget::PrimarySuite,
        BuiltinTarget::ExtendedSuite,
        BuiltinTarget::MergedReport,
        BuiltinTarget::ThresholdVerification,
        BuiltinTarget::Check,
        BuiltinTarget::FullRun,
        BuiltinTarget::Summary,
        BuiltinTarget::DependencyScan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTarget::PrimarySuite => "primarySuite",
            BuiltinTarget::ExtendedSuite => "extendedSuite",
            BuiltinTarget::MergedReport => "mergedReport",
            BuiltinTarget::ThresholdVerification => "thresholdVerification",
            BuiltinTarget::Check => "check",
            BuiltinTarget::FullRun => "fullRun",
            BuiltinTarget::Summary => "summary",
            BuiltinTarget::DependencyScan => "dependencyScan",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinTarget::PrimarySuite => "Runs the primary test suite.",
            BuiltinTarget::ExtendedSuite => "Runs the extended (functional) test suite.",
            BuiltinTarget::MergedReport => {
                "Generates the coverage report for both test suites."
            }
            BuiltinTarget::ThresholdVerification => "Verifies coverage metrics.",
            BuiltinTarget::Check => "Runs all checks.",
            BuiltinTarget::FullRun => "Runs all tests and generates the coverage report.",
            BuiltinTarget::Summary => "Displays report locations in the console.",
            BuiltinTarget::DependencyScan => "Lists stable dependency upgrades.",
        }
    }

    pub fn group(&self) -> &'static str {
        match self {
            BuiltinTarget::DependencyScan => "help",
            _ => "verification",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_target_names_round_trip() {
        for target in BuiltinTarget::ALL {
            assert_eq!(BuiltinTarget::from_name(target.name()), Some(target));
        }
        assert_eq!(BuiltinTarget::from_name("deploy"), None);
    }

    #[test]
    fn test_builtin_target_groups() {
        assert_eq!(BuiltinTarget::Check.group(), "verification");
        assert_eq!(BuiltinTarget::DependencyScan.group(), "help");
    }

    #[test]
    fn test_serde_uses_target_names() {
        let json = serde_json::to_string(&BuiltinTarget::ThresholdVerification).unwrap();
        assert_eq!(json, "\"thresholdVerification\"");
    }
}
