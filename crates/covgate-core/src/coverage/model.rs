//! Class descriptors and execution data.
//!
//! A class descriptor is the compiled-class metadata the host build places
//! under a suite's output roots: for every instrumentation probe it records
//! how many instructions the probe guards, which source lines it touches,
//! whether it marks a branch edge, and the method it belongs to. Execution
//! data is the per-run hit record produced by the instrumented test run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Current execution data format version.
pub const EXECUTION_DATA_VERSION: u32 = 1;

/// Source mapping of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeInfo {
    /// Bytecode instructions guarded by this probe.
    #[serde(default)]
    pub instructions: u32,
    /// Source lines this probe's instructions map to.
    #[serde(default)]
    pub lines: Vec<u32>,
    /// Whether this probe records one branch edge.
    #[serde(default)]
    pub branch: bool,
    /// Method the probe belongs to.
    #[serde(default)]
    pub method: Option<String>,
}

/// Compiled-class metadata read from a `*.class` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// VM-style class name, e.g. `uk/tw/energy/service/AccountService`.
    pub name: String,
    /// Source file name within the class's package directory.
    #[serde(default)]
    pub source_file: Option<String>,
    /// Probe table, indexed by probe id.
    #[serde(default)]
    pub probes: Vec<ProbeInfo>,
}

impl ClassDescriptor {
    /// Package portion of the class name (`""` for the default package).
    pub fn package(&self) -> &str {
        self.name.rsplit_once('/').map(|(pkg, _)| pkg).unwrap_or("")
    }

    /// Unqualified class name.
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit_once('/')
            .map(|(_, simple)| simple)
            .unwrap_or(&self.name)
    }
}

/// Hit bits for one class, one entry per probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeSet(Vec<bool>);

impl ProbeSet {
    /// All-missed probe set of the given width.
    pub fn empty(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether probe `idx` was hit.
    pub fn is_hit(&self, idx: usize) -> bool {
        self.0.get(idx).copied().unwrap_or(false)
    }

    /// Whether any probe was hit.
    pub fn any_hit(&self) -> bool {
        self.0.iter().any(|&b| b)
    }

    /// Number of probes hit.
    pub fn hit_count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    /// OR `other` into `self`. Both sets must have the same width.
    pub fn merge(&mut self, other: &ProbeSet) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            *mine |= *theirs;
        }
    }

    pub fn bits(&self) -> &[bool] {
        &self.0
    }
}

/// Probe hits recorded by one suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionData {
    pub format_version: u32,
    /// Session label, normally the suite name.
    pub session: String,
    /// Class name to hit bits.
    pub classes: BTreeMap<String, ProbeSet>,
}

impl ExecutionData {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            format_version: EXECUTION_DATA_VERSION,
            session: session.into(),
            classes: BTreeMap::new(),
        }
    }

    /// Record hits for a class, OR-ing into anything already recorded.
    pub fn record(&mut self, class: impl Into<String>, probes: ProbeSet) {
        let class = class.into();
        match self.classes.get_mut(&class) {
            Some(existing) if existing.len() == probes.len() => existing.merge(&probes),
            Some(existing) => {
                warn!(
                    class = %class,
                    recorded = existing.len(),
                    incoming = probes.len(),
                    "Probe count changed within one session, keeping latest hits"
                );
                *existing = probes;
            }
            None => {
                self.classes.insert(class, probes);
            }
        }
    }
}
