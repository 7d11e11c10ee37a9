//! Threshold verification of a merged coverage report.
//!
//! Evaluates a list of [`ThresholdRule`]s against a [`CoverageReport`] and
//! produces a [`VerificationResult`] listing every violated rule, so a single
//! run surfaces all gate failures at once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coverage::report::{Counter, CounterKind, Counters, CoverageReport};
use crate::error::{CovgateError, Result};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Scope a rule is checked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleElement {
    /// The whole report.
    #[default]
    Bundle,
    /// Every package individually.
    Package,
    /// Every class individually.
    Class,
}

impl RuleElement {
    pub fn name(&self) -> &'static str {
        match self {
            RuleElement::Bundle => "bundle",
            RuleElement::Package => "package",
            RuleElement::Class => "class",
        }
    }
}

/// Value derived from a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterValue {
    #[serde(rename = "COVEREDRATIO")]
    CoveredRatio,
    #[serde(rename = "MISSEDRATIO")]
    MissedRatio,
    #[serde(rename = "COVEREDCOUNT")]
    CoveredCount,
    #[serde(rename = "MISSEDCOUNT")]
    MissedCount,
    #[serde(rename = "TOTALCOUNT")]
    TotalCount,
}

impl CounterValue {
    pub fn of(&self, counter: Counter) -> f64 {
        match self {
            CounterValue::CoveredRatio => counter.covered_ratio(),
            CounterValue::MissedRatio => counter.missed_ratio(),
            CounterValue::CoveredCount => counter.covered as f64,
            CounterValue::MissedCount => counter.missed as f64,
            CounterValue::TotalCount => counter.total() as f64,
        }
    }

    pub fn is_ratio(&self) -> bool {
        matches!(self, CounterValue::CoveredRatio | CounterValue::MissedRatio)
    }

    fn label(&self) -> &'static str {
        match self {
            CounterValue::CoveredRatio => "covered ratio",
            CounterValue::MissedRatio => "missed ratio",
            CounterValue::CoveredCount => "covered count",
            CounterValue::MissedCount => "missed count",
            CounterValue::TotalCount => "total count",
        }
    }
}

/// A declarative pass/fail condition over one counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    #[serde(default)]
    pub element: RuleElement,
    pub counter: CounterKind,
    pub value: CounterValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl ThresholdRule {
    /// Bundle rule failing when the value drops below `bound`.
    pub fn minimum(counter: CounterKind, value: CounterValue, bound: f64) -> Self {
        Self {
            element: RuleElement::Bundle,
            counter,
            value,
            minimum: Some(bound),
            maximum: None,
        }
    }

    /// Bundle rule failing when the value exceeds `bound`.
    pub fn maximum(counter: CounterKind, value: CounterValue, bound: f64) -> Self {
        Self {
            element: RuleElement::Bundle,
            counter,
            value,
            minimum: None,
            maximum: Some(bound),
        }
    }

    /// Check the rule at a different element scope.
    pub fn per(mut self, element: RuleElement) -> Self {
        self.element = element;
        self
    }

    /// Reject rules that can never fail or that carry unusable bounds.
    pub fn validate(&self) -> Result<()> {
        if self.minimum.is_none() && self.maximum.is_none() {
            return Err(CovgateError::InvalidConfig(format!(
                "rule on {} {} needs a minimum or a maximum",
                self.counter,
                self.value.label()
            )));
        }
        for bound in [self.minimum, self.maximum].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(CovgateError::InvalidConfig(format!(
                    "rule on {} {} has invalid bound {}",
                    self.counter,
                    self.value.label(),
                    bound
                )));
            }
            if self.value.is_ratio() && bound > 1.0 {
                return Err(CovgateError::InvalidConfig(format!(
                    "ratio bound {} on {} exceeds 1.0",
                    bound, self.counter
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.minimum, self.maximum) {
            if min > max {
                return Err(CovgateError::InvalidConfig(format!(
                    "rule on {} {} can never pass: minimum {} exceeds maximum {}",
                    self.counter,
                    self.value.label(),
                    min,
                    max
                )));
            }
        }
        Ok(())
    }

    fn check(&self, element_name: &str, counters: &Counters) -> Vec<Violation> {
        let actual = self.value.of(counters.get(self.counter));
        let mut violations = Vec::new();
        if let Some(min) = self.minimum {
            if actual < min {
                violations.push(self.violation(element_name, actual, Bound::Minimum(min)));
            }
        }
        if let Some(max) = self.maximum {
            if actual > max {
                violations.push(self.violation(element_name, actual, Bound::Maximum(max)));
            }
        }
        violations
    }

    fn violation(&self, element_name: &str, actual: f64, bound: Bound) -> Violation {
        Violation {
            rule: self.clone(),
            element_name: element_name.to_string(),
            actual,
            bound,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The bound a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Minimum(f64),
    Maximum(f64),
}

/// One violated rule on one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub rule: ThresholdRule,
    /// Bundle, package or class name the rule was checked on.
    pub element_name: String,
    /// Measured value.
    pub actual: f64,
    pub bound: Bound,
}

impl Violation {
    pub fn counter(&self) -> CounterKind {
        self.rule.counter
    }
}

fn format_value(value: CounterValue, v: f64) -> String {
    if value.is_ratio() {
        format!("{v}")
    } else {
        format!("{}", v.round() as i64)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, bound) = match self.bound {
            Bound::Minimum(b) => ("minimum", b),
            Bound::Maximum(b) => ("maximum", b),
        };
        write!(
            f,
            "Rule violated for {} {}: {} {} is {}, but expected {} is {}",
            self.rule.element.name(),
            self.element_name,
            self.rule.counter,
            self.rule.value.label(),
            format_value(self.rule.value, self.actual),
            kind,
            format_value(self.rule.value, bound),
        )
    }
}

/// Outcome of checking every rule against one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl VerificationResult {
    /// `Ok(())` when passed, [`CovgateError::ThresholdViolation`] otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.passed {
            Ok(())
        } else {
            Err(CovgateError::ThresholdViolation {
                violations: self.violations,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate every rule against `report`. Never short-circuits.
pub fn verify(report: &CoverageReport, rules: &[ThresholdRule]) -> VerificationResult {
    let mut violations = Vec::new();

    for rule in rules {
        match rule.element {
            RuleElement::Bundle => {
                violations.extend(rule.check(&report.name, &report.totals()));
            }
            RuleElement::Package => {
                for package in report.packages() {
                    violations.extend(rule.check(package.name, &package.counters));
                }
            }
            RuleElement::Class => {
                for class in report.classes.values() {
                    violations.extend(rule.check(&class.name, &class.counters));
                }
            }
        }
    }

    VerificationResult {
        passed: violations.is_empty(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::model::{ClassDescriptor, ProbeInfo, ProbeSet};
    use crate::coverage::report::ClassCoverage;
    use std::sync::Arc;

    /// One class per entry, each with a single one-line probe.
    fn report_with_classes(hits: &[bool]) -> CoverageReport {
        let mut report = CoverageReport::new("bundle");
        for (i, hit) in hits.iter().enumerate() {
            report.insert(ClassCoverage::new(
                Arc::new(ClassDescriptor {
                    name: format!("pkg/C{i}"),
                    source_file: None,
                    probes: vec![ProbeInfo {
                        instructions: 1,
                        lines: vec![1],
                        branch: false,
                        method: None,
                    }],
                }),
                ProbeSet::from_bits(vec![*hit]),
                None,
            ));
        }
        report
    }

    #[test]
    fn test_covered_ratio_boundary_passes() {
        // 3 of 5 lines covered = 0.6 exactly.
        let report = report_with_classes(&[true, true, true, false, false]);
        let rule = ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 0.60);
        assert!(verify(&report, &[rule]).passed);
    }

    #[test]
    fn test_missed_count_maximum_boundary() {
        let rule = ThresholdRule::maximum(CounterKind::Class, CounterValue::MissedCount, 5.0);

        let at_bound = report_with_classes(&[true, false, false, false, false, false]);
        assert!(verify(&at_bound, &[rule.clone()]).passed);

        let over = report_with_classes(&[true, false, false, false, false, false, false]);
        let result = verify(&over, &[rule]);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].actual, 6.0);
        assert!(result.violations[0].to_string().contains("missed count is 6"));
    }

    #[test]
    fn test_every_violated_rule_is_reported() {
        let report = report_with_classes(&[false, false]);
        let rules = vec![
            ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 0.6),
            ThresholdRule::minimum(CounterKind::Instruction, CounterValue::CoveredRatio, 0.6),
            ThresholdRule::maximum(CounterKind::Class, CounterValue::MissedCount, 1.0),
        ];
        let result = verify(&report, &rules);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 3);
    }

    #[test]
    fn test_empty_counter_satisfies_minimum_ratio() {
        let report = report_with_classes(&[true]);
        let rule = ThresholdRule::minimum(CounterKind::Branch, CounterValue::CoveredRatio, 0.9);
        assert!(verify(&report, &[rule]).passed);
    }

    #[test]
    fn test_class_element_checks_each_class() {
        let report = report_with_classes(&[true, false, false]);
        let rule = ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 1.0)
            .per(RuleElement::Class);
        let result = verify(&report, &[rule]);
        let names: Vec<&str> = result
            .violations
            .iter()
            .map(|v| v.element_name.as_str())
            .collect();
        assert_eq!(names, vec!["pkg/C1", "pkg/C2"]);
    }

    #[test]
    fn test_verify_is_pure() {
        let report = report_with_classes(&[true, false]);
        let before = report.clone();
        let rules = [ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 0.9)];
        let first = verify(&report, &rules);
        let second = verify(&report, &rules);
        assert_eq!(first, second);
        assert_eq!(report, before);
    }

    #[test]
    fn test_into_result_carries_violations() {
        let report = report_with_classes(&[false]);
        let rules = [ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 0.5)];
        match verify(&report, &rules).into_result() {
            Err(CovgateError::ThresholdViolation { violations }) => {
                assert_eq!(violations.len(), 1)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rule_without_bound_is_invalid() {
        let rule = ThresholdRule {
            element: RuleElement::Bundle,
            counter: CounterKind::Line,
            value: CounterValue::CoveredRatio,
            minimum: None,
            maximum: None,
        };
        assert!(rule.validate().is_err());
        assert!(
            ThresholdRule::minimum(CounterKind::Line, CounterValue::CoveredRatio, 1.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_rule_with_minimum_above_maximum_is_invalid() {
        let mut rule = ThresholdRule::minimum(CounterKind::Line, CounterValue::MissedCount, 10.0);
        rule.maximum = Some(5.0);
        let err = rule.validate().unwrap_err();
        assert!(matches!(err, CovgateError::InvalidConfig(_)));
        assert!(err.to_string().contains("minimum 10 exceeds maximum 5"), "{err}");

        rule.maximum = Some(10.0);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_rule_toml_shape() {
        let rule: ThresholdRule = toml::from_str(
            r#"
counter = "CLASS"
value = "MISSEDCOUNT"
maximum = 5
"#,
        )
        .expect("parse rule");
        assert_eq!(rule.element, RuleElement::Bundle);
        assert_eq!(rule.maximum, Some(5.0));
    }
}
