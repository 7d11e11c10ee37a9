//! Structured XML report.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <report name="app">
//!   <sessioninfo id="test"/>
//!   <package name="uk/tw/energy/service">
//!     <class name="uk/tw/energy/service/AccountService" sourcefilename="AccountService.java">
//!       <counter type="INSTRUCTION" missed="3" covered="12"/>
//!     </class>
//!     <counter type="INSTRUCTION" missed="3" covered="12"/>
//!   </package>
//!   <counter type="INSTRUCTION" missed="3" covered="12"/>
//! </report>
//! ```

use std::fmt::Write;

use crate::coverage::report::{CounterKind, Counters, CoverageReport};

/// Render `report` as XML. Output depends only on the report contents.
pub fn render_xml(report: &CoverageReport) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    let _ = writeln!(xml, r#"<report name="{}">"#, escape(&report.name));

    for session in &report.sessions {
        let _ = writeln!(xml, r#"  <sessioninfo id="{}"/>"#, escape(session));
    }

    for package in report.packages() {
        let _ = writeln!(xml, r#"  <package name="{}">"#, escape(package.name));
        for class in &package.classes {
            match &class.source_file {
                Some(file) => {
                    let _ = writeln!(
                        xml,
                        r#"    <class name="{}" sourcefilename="{}">"#,
                        escape(&class.name),
                        escape(file)
                    );
                }
                None => {
                    let _ = writeln!(xml, r#"    <class name="{}">"#, escape(&class.name));
                }
            }
            write_counters(&mut xml, &class.counters, "      ");
            xml.push_str("    </class>\n");
        }
        write_counters(&mut xml, &package.counters, "    ");
        xml.push_str("  </package>\n");
    }

    write_counters(&mut xml, &report.totals(), "  ");
    xml.push_str("</report>\n");
    xml
}

fn write_counters(xml: &mut String, counters: &Counters, indent: &str) {
    for kind in CounterKind::ALL {
        let counter = counters.get(kind);
        if counter.total() == 0 {
            continue;
        }
        let _ = writeln!(
            xml,
            r#"{indent}<counter type="{}" missed="{}" covered="{}"/>"#,
            kind.name(),
            counter.missed,
            counter.covered
        );
    }
}

pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
