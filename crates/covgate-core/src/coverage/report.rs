//! Merged coverage report.
//!
//! Holds the OR-merged probe set of every analysed class together with the
//! counters derived from it. Counters are always recomputed from probes, so
//! merging two reports can never double count a probe.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coverage::model::{ClassDescriptor, ProbeSet};

/// Kind of coverage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterKind {
    Instruction,
    Branch,
    Line,
    Method,
    Class,
}

impl CounterKind {
    pub const ALL: [CounterKind; 5] = [
        CounterKind::Instruction,
        CounterKind::Branch,
        CounterKind::Line,
        CounterKind::Method,
        CounterKind::Class,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CounterKind::Instruction => "INSTRUCTION",
            CounterKind::Branch => "BRANCH",
            CounterKind::Line => "LINE",
            CounterKind::Method => "METHOD",
            CounterKind::Class => "CLASS",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Covered/missed tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub covered: u64,
    pub missed: u64,
}

impl Counter {
    pub fn new(covered: u64, missed: u64) -> Self {
        Self { covered, missed }
    }

    pub fn total(&self) -> u64 {
        self.covered + self.missed
    }

    /// `covered / total`, 1.0 for an empty counter.
    pub fn covered_ratio(&self) -> f64 {
        if self.total() == 0 {
            1.0
        } else {
            self.covered as f64 / self.total() as f64
        }
    }

    /// `missed / total`, 0.0 for an empty counter.
    pub fn missed_ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.missed as f64 / self.total() as f64
        }
    }

    fn tally(&mut self, hit: bool, amount: u64) {
        if hit {
            self.covered += amount;
        } else {
            self.missed += amount;
        }
    }
}

impl std::ops::Add for Counter {
    type Output = Counter;

    fn add(self, rhs: Counter) -> Counter {
        Counter::new(self.covered + rhs.covered, self.missed + rhs.missed)
    }
}

impl std::ops::AddAssign for Counter {
    fn add_assign(&mut self, rhs: Counter) {
        *self = *self + rhs;
    }
}

/// One counter per [`CounterKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub instruction: Counter,
    pub branch: Counter,
    pub line: Counter,
    pub method: Counter,
    pub class: Counter,
}

impl Counters {
    pub fn get(&self, kind: CounterKind) -> Counter {
        match kind {
            CounterKind::Instruction => self.instruction,
            CounterKind::Branch => self.branch,
            CounterKind::Line => self.line,
            CounterKind::Method => self.method,
            CounterKind::Class => self.class,
        }
    }

    /// Derive counters from a descriptor's probe table and merged hits.
    pub fn derive(descriptor: &ClassDescriptor, probes: &ProbeSet) -> Self {
        let mut counters = Counters::default();
        let mut lines: BTreeMap<u32, bool> = BTreeMap::new();
        let mut methods: BTreeMap<&str, bool> = BTreeMap::new();

        for (idx, probe) in descriptor.probes.iter().enumerate() {
            let hit = probes.is_hit(idx);
            counters.instruction.tally(hit, u64::from(probe.instructions));
            if probe.branch {
                counters.branch.tally(hit, 1);
            }
            for line in &probe.lines {
                *lines.entry(*line).or_insert(false) |= hit;
            }
            if let Some(method) = &probe.method {
                *methods.entry(method.as_str()).or_insert(false) |= hit;
            }
        }

        for hit in lines.values() {
            counters.line.tally(*hit, 1);
        }
        for hit in methods.values() {
            counters.method.tally(*hit, 1);
        }
        counters.class.tally(probes.any_hit(), 1);
        counters
    }
}

impl std::ops::AddAssign for Counters {
    fn add_assign(&mut self, rhs: Counters) {
        self.instruction += rhs.instruction;
        self.branch += rhs.branch;
        self.line += rhs.line;
        self.method += rhs.method;
        self.class += rhs.class;
    }
}

/// Coverage of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCoverage {
    pub name: String,
    pub source_file: Option<String>,
    /// Source file resolved against the configured source roots.
    pub source_path: Option<PathBuf>,
    pub counters: Counters,
    #[serde(skip)]
    pub(crate) descriptor: Arc<ClassDescriptor>,
    #[serde(skip)]
    pub(crate) probes: ProbeSet,
}

impl ClassCoverage {
    pub fn new(
        descriptor: Arc<ClassDescriptor>,
        probes: ProbeSet,
        source_path: Option<PathBuf>,
    ) -> Self {
        let counters = Counters::derive(&descriptor, &probes);
        Self {
            name: descriptor.name.clone(),
            source_file: descriptor.source_file.clone(),
            source_path,
            counters,
            descriptor,
            probes,
        }
    }

    pub fn package(&self) -> &str {
        self.descriptor.package()
    }

    pub fn simple_name(&self) -> &str {
        self.descriptor.simple_name()
    }

    pub fn probes(&self) -> &ProbeSet {
        &self.probes
    }

    fn merge(&mut self, other: &ClassCoverage) {
        self.probes.merge(&other.probes);
        self.counters = Counters::derive(&self.descriptor, &self.probes);
        if self.source_path.is_none() {
            self.source_path = other.source_path.clone();
        }
    }
}

/// Package roll-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageCoverage<'a> {
    pub name: &'a str,
    pub counters: Counters,
    pub classes: Vec<&'a ClassCoverage>,
}

/// Merged coverage over every analysed class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    /// Report title.
    pub name: String,
    /// Sessions (suite names) whose execution data contributed.
    pub sessions: BTreeSet<String>,
    pub classes: BTreeMap<String, ClassCoverage>,
}

impl CoverageReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sessions: BTreeSet::new(),
            classes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, class: ClassCoverage) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Bundle-level counters.
    pub fn totals(&self) -> Counters {
        let mut totals = Counters::default();
        for class in self.classes.values() {
            totals += class.counters;
        }
        totals
    }

    /// Classes grouped by package, packages in name order.
    pub fn packages(&self) -> Vec<PackageCoverage<'_>> {
        let mut grouped: BTreeMap<&str, Vec<&ClassCoverage>> = BTreeMap::new();
        for class in self.classes.values() {
            grouped.entry(class.package()).or_default().push(class);
        }
        grouped
            .into_iter()
            .map(|(name, classes)| {
                let mut counters = Counters::default();
                for class in &classes {
                    counters += class.counters;
                }
                PackageCoverage {
                    name,
                    counters,
                    classes,
                }
            })
            .collect()
    }

    /// OR-merge `other` into a copy of `self`.
    ///
    /// Classes present in only one report are carried over unchanged; classes
    /// present in both have their probe sets OR-ed and counters re-derived.
    pub fn merge(&self, other: &CoverageReport) -> CoverageReport {
        let mut merged = self.clone();
        merged.sessions.extend(other.sessions.iter().cloned());
        for (name, class) in &other.classes {
            match merged.classes.get_mut(name) {
                Some(existing) if existing.probes.len() == class.probes.len() => {
                    existing.merge(class)
                }
                Some(existing) => warn!(
                    class = %name,
                    probes = existing.probes.len(),
                    other_probes = class.probes.len(),
                    "Probe count mismatch, class left unmerged"
                ),
                None => {
                    merged.classes.insert(name.clone(), class.clone());
                }
            }
        }
        merged
    }
}
