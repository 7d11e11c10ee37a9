//! Run identity.
//!
//! A [`RunSpec`] pins what a build run did: the targets requested, the tasks
//! the plan expanded them into and the resolved configuration. Two runs with
//! the same digest exercised the same graph against the same settings, so
//! their reports are comparable.

use covgate_core::{BuildConfig, ExecutionPlan};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters shown when a digest is printed for humans.
const SHORT_DIGEST_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSpec {
    /// Requested targets, in request order.
    pub targets: Vec<String>,

    /// Scheduled tasks, in plan order.
    pub tasks: Vec<String>,

    /// SHA-256 of the resolved configuration.
    pub config_digest: String,

    /// SHA-256 over targets, tasks and configuration.
    pub digest: String,
}

impl RunSpec {
    pub fn new(
        config: &BuildConfig,
        targets: &[String],
        plan: &ExecutionPlan,
    ) -> anyhow::Result<Self> {
        let tasks: Vec<String> = plan.names().into_iter().map(str::to_string).collect();
        let config_digest = config.digest()?;
        let digest = run_digest(targets, &tasks, &config_digest);
        Ok(Self {
            targets: targets.to_vec(),
            tasks,
            config_digest,
            digest,
        })
    }

    /// Leading characters of [`RunSpec::digest`].
    pub fn short_digest(&self) -> &str {
        self.digest.get(..SHORT_DIGEST_LEN).unwrap_or(&self.digest)
    }
}

/// Length-prefixed so `["ab", "c"]` and `["a", "bc"]` never collide.
fn run_digest(targets: &[String], tasks: &[String], config_digest: &str) -> String {
    let mut hasher = Sha256::new();
    for (section, names) in [("targets", targets), ("tasks", tasks)] {
        hasher.update(section.as_bytes());
        hasher.update((names.len() as u64).to_le_bytes());
        for name in names {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
        }
    }
    hasher.update(b"config");
    hasher.update(config_digest.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covgate_core::{NoopAction, TaskGraph, TaskNode};
    use std::sync::Arc;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn spec(config: &BuildConfig, requested: &[&str]) -> RunSpec {
        let mut graph = TaskGraph::new();
        for name in ["primarySuite", "extendedSuite", "check"] {
            graph
                .add_task(TaskNode::new(name, Arc::new(NoopAction)))
                .expect("add");
        }
        graph.depends_on("check", "primarySuite").expect("edge");
        graph.depends_on("check", "extendedSuite").expect("edge");
        let plan = graph.plan(requested).expect("plan");
        RunSpec::new(config, &targets(requested), &plan).expect("spec")
    }

    #[test]
    fn test_digest_is_deterministic() {
        let config = BuildConfig::default();
        let a = spec(&config, &["check"]);
        let b = spec(&config, &["check"]);
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert_eq!(a.short_digest().len(), SHORT_DIGEST_LEN);
        assert!(a.digest.starts_with(a.short_digest()));
    }

    #[test]
    fn test_digest_records_expanded_tasks() {
        let run = spec(&BuildConfig::default(), &["check"]);
        assert_eq!(run.tasks, vec!["primarySuite", "extendedSuite", "check"]);
        assert_ne!(run.digest, spec(&BuildConfig::default(), &["primarySuite"]).digest);
    }

    #[test]
    fn test_name_boundaries_do_not_collide() {
        let a = run_digest(&targets(&["ab", "c"]), &[], "cfg");
        let b = run_digest(&targets(&["a", "bc"]), &[], "cfg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_tracks_config() {
        let config = BuildConfig::default();
        let mut changed = config.clone();
        changed.rules.clear();

        let a = spec(&config, &["check"]);
        let b = spec(&changed, &["check"]);
        assert_eq!(a.tasks, b.tasks);
        assert_ne!(a.config_digest, b.config_digest);
        assert_ne!(a.digest, b.digest);
    }
}
