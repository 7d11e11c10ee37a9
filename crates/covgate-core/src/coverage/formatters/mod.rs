//! Report renderers and the fixed output locations they write to.

pub mod csv;
pub mod html;
pub mod xml;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coverage::report::CoverageReport;

pub use csv::render_csv;
pub use html::render_html;
pub use xml::render_xml;

/// Which report renditions to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFormats {
    pub xml: bool,
    pub html: bool,
    pub csv: bool,
}

impl Default for ReportFormats {
    fn default() -> Self {
        Self {
            xml: true,
            html: true,
            csv: false,
        }
    }
}

/// Output locations for one report directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLocations {
    pub dir: PathBuf,
    pub xml: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

impl ReportLocations {
    pub fn new(dir: impl Into<PathBuf>, formats: ReportFormats) -> Self {
        let dir = dir.into();
        Self {
            xml: formats.xml.then(|| dir.join("report.xml")),
            html: formats.html.then(|| dir.join("html").join("index.html")),
            csv: formats.csv.then(|| dir.join("report.csv")),
            dir,
        }
    }

    /// Every enabled location, structured formats first.
    pub fn all(&self) -> Vec<&Path> {
        [&self.xml, &self.csv, &self.html]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// Render `report` into every enabled location.
pub fn write_reports(report: &CoverageReport, locations: &ReportLocations) -> Result<()> {
    if let Some(path) = &locations.xml {
        write_file(path, &render_xml(report))?;
    }
    if let Some(path) = &locations.csv {
        write_file(path, &render_csv(report))?;
    }
    if let Some(path) = &locations.html {
        write_file(path, &render_html(report))?;
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
