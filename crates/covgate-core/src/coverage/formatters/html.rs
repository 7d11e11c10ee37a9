//! Human-readable HTML report (`html/index.html`).

use std::fmt::Write;

use super::xml::escape;
use crate::coverage::report::{Counter, CounterKind, Counters, CoverageReport};

const COLUMNS: [(CounterKind, &str); 5] = [
    (CounterKind::Instruction, "Instructions"),
    (CounterKind::Branch, "Branches"),
    (CounterKind::Line, "Lines"),
    (CounterKind::Method, "Methods"),
    (CounterKind::Class, "Classes"),
];

/// Render `report` as a single self-contained HTML page.
pub fn render_html(report: &CoverageReport) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape(&report.name));
    html.push_str(
        "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
         td,th{border:1px solid #ccc;padding:2px 8px;text-align:right}\
         td:first-child,th:first-child{text-align:left}tfoot{font-weight:bold}</style>\n",
    );
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{}</h1>", escape(&report.name));

    if !report.sessions.is_empty() {
        let sessions: Vec<String> = report.sessions.iter().map(|s| escape(s)).collect();
        let _ = writeln!(html, "<p>Sessions: {}</p>", sessions.join(", "));
    }

    for package in report.packages() {
        let label = if package.name.is_empty() {
            "(default package)".to_string()
        } else {
            package.name.replace('/', ".")
        };
        let _ = writeln!(html, "<h2>{}</h2>", escape(&label));
        html.push_str("<table>\n");
        write_header(&mut html, "Class");
        html.push_str("<tbody>\n");
        for class in &package.classes {
            write_row(&mut html, class.simple_name(), &class.counters);
        }
        html.push_str("</tbody>\n<tfoot>\n");
        write_row(&mut html, "Total", &package.counters);
        html.push_str("</tfoot>\n</table>\n");
    }

    html.push_str("<h2>Total</h2>\n<table>\n");
    write_header(&mut html, "Report");
    html.push_str("<tbody>\n");
    write_row(&mut html, &report.name, &report.totals());
    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}

fn write_header(html: &mut String, first: &str) {
    let _ = write!(html, "<thead><tr><th>{first}</th>");
    for (_, label) in COLUMNS {
        let _ = write!(html, "<th>{label}</th><th>Cov.</th>");
    }
    html.push_str("</tr></thead>\n");
}

fn write_row(html: &mut String, label: &str, counters: &Counters) {
    let _ = write!(html, "<tr><td>{}</td>", escape(label));
    for (kind, _) in COLUMNS {
        let counter = counters.get(kind);
        let _ = write!(
            html,
            "<td>{} of {}</td><td>{}</td>",
            counter.missed,
            counter.total(),
            percent(counter)
        );
    }
    html.push_str("</tr>\n");
}

fn percent(counter: Counter) -> String {
    if counter.total() == 0 {
        "n/a".to_string()
    } else {
        format!("{:.0}%", counter.covered_ratio() * 100.0)
    }
}
