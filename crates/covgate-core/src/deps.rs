//! Advisory dependency upgrade scan.
//!
//! Candidates come from a [`CandidateSource`] (a JSON file or a command that
//! prints the same JSON). Proposals that are not stable releases are
//! rejected. Nothing here ever fails the build; callers log and move on.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::obs;
use crate::stability::is_non_stable;

/// A dependency together with the newest version a resolver proposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCandidate {
    pub group: String,
    pub name: String,
    pub current: String,
    pub proposed: String,
}

impl DependencyCandidate {
    /// `group:name`
    pub fn coordinates(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    pub fn is_upgrade(&self) -> bool {
        self.current != self.proposed
    }
}

/// Where upgrade candidates come from.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn describe(&self) -> String;

    async fn candidates(&self) -> Result<Vec<DependencyCandidate>>;
}

/// Reads a JSON array of candidates from a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CandidateSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn candidates(&self) -> Result<Vec<DependencyCandidate>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read {:?}", self.path))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {:?}", self.path))
    }
}

/// Runs a command whose stdout is a JSON array of candidates.
#[derive(Debug, Clone)]
pub struct CommandSource {
    command: Vec<String>,
}

impl CommandSource {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl CandidateSource for CommandSource {
    fn describe(&self) -> String {
        format!("command `{}`", self.command.join(" "))
    }

    async fn candidates(&self) -> Result<Vec<DependencyCandidate>> {
        let Some((exe, args)) = self.command.split_first() else {
            bail!("dependency scan command is empty");
        };
        let output = Command::new(exe)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("spawn {exe}"))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.describe(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse output of {}", self.describe()))
    }
}

/// Candidates split by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Already at the proposed version.
    pub current: Vec<DependencyCandidate>,
    /// Stable upgrades available.
    pub upgrades: Vec<DependencyCandidate>,
    /// Upgrades rejected because the proposal is a pre-release.
    pub rejected: Vec<DependencyCandidate>,
}

impl ScanReport {
    pub fn from_candidates(candidates: Vec<DependencyCandidate>) -> Self {
        let mut report = ScanReport::default();
        for candidate in candidates {
            if !candidate.is_upgrade() {
                report.current.push(candidate);
            } else if is_non_stable(&candidate.proposed) {
                report.rejected.push(candidate);
            } else {
                report.upgrades.push(candidate);
            }
        }
        report
    }
}

/// Fetch candidates and classify them, logging one advisory per upgrade.
pub async fn scan(source: &dyn CandidateSource) -> Result<ScanReport> {
    let candidates = source.candidates().await?;
    let report = ScanReport::from_candidates(candidates);
    for upgrade in &report.upgrades {
        obs::emit_dependency_advisory(&upgrade.coordinates(), &upgrade.current, &upgrade.proposed);
    }
    Ok(report)
}
