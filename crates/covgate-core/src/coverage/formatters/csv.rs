//! Tabular CSV report, one row per class.

use std::fmt::Write;

use crate::coverage::report::{CounterKind, CoverageReport};

const HEADER: &str = "GROUP,PACKAGE,CLASS,INSTRUCTION_MISSED,INSTRUCTION_COVERED,\
BRANCH_MISSED,BRANCH_COVERED,LINE_MISSED,LINE_COVERED,METHOD_MISSED,METHOD_COVERED";

pub fn render_csv(report: &CoverageReport) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for package in report.packages() {
        let package_name = package.name.replace('/', ".");
        for class in &package.classes {
            let _ = write!(
                csv,
                "{},{},{}",
                field(&report.name),
                field(&package_name),
                field(class.simple_name())
            );
            for kind in [
                CounterKind::Instruction,
                CounterKind::Branch,
                CounterKind::Line,
                CounterKind::Method,
            ] {
                let counter = class.counters.get(kind);
                let _ = write!(csv, ",{},{}", counter.missed, counter.covered);
            }
            csv.push('\n');
        }
    }
    csv
}

fn field(raw: &str) -> String {
    if raw.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_for_empty_report() {
        let csv = render_csv(&CoverageReport::new("r"));
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("GROUP,PACKAGE,CLASS"));
    }

    #[test]
    fn test_field_quoting() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
