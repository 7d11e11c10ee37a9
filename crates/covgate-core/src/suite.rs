//! Suite registry: named, isolated test execution contexts.
//!
//! Each suite owns its compiled-output roots, classpaths and one execution
//! data artifact keyed by its name, so suites can run concurrently without
//! ever writing to the same file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coverage::codec::ExecFormat;
use crate::error::{CovgateError, Result};

/// Extra classpath input for a suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteInput {
    /// Output roots of an already declared suite.
    Suite(String),
    /// A plain directory or archive.
    Path(PathBuf),
}

/// Everything needed to declare a suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteDeclaration {
    pub name: String,
    pub source_roots: Vec<PathBuf>,
    pub output_roots: Vec<PathBuf>,
    pub extra_compile_inputs: Vec<SuiteInput>,
    pub extra_runtime_inputs: Vec<SuiteInput>,
    /// Test command; the first element is the executable.
    pub command: Vec<String>,
    /// Extra environment for the test command.
    pub env: BTreeMap<String, String>,
}

/// A registered suite. Immutable once declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suite {
    pub name: String,
    pub source_roots: Vec<PathBuf>,
    pub output_roots: Vec<PathBuf>,
    pub compile_classpath: Vec<PathBuf>,
    pub runtime_classpath: Vec<PathBuf>,
    /// Isolated execution data artifact.
    pub exec_path: PathBuf,
    /// Directory receiving the suite's stdout/stderr logs.
    pub log_dir: PathBuf,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Registry of declared suites, in declaration order.
#[derive(Debug, Clone)]
pub struct SuiteRegistry {
    build_dir: PathBuf,
    exec_format: ExecFormat,
    suites: Vec<Suite>,
    index: HashMap<String, usize>,
}

impl SuiteRegistry {
    pub fn new(build_dir: impl Into<PathBuf>, exec_format: ExecFormat) -> Self {
        Self {
            build_dir: build_dir.into(),
            exec_format,
            suites: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn exec_format(&self) -> ExecFormat {
        self.exec_format
    }

    /// Declare a suite.
    ///
    /// The compile and runtime classpaths are the suite's own output roots
    /// followed by its extra inputs, de-duplicated in first-seen order. An
    /// input naming another suite expands to that suite's output roots.
    pub fn declare(&mut self, decl: SuiteDeclaration) -> Result<&Suite> {
        let name = decl.name.trim().to_string();
        if name.is_empty() {
            return Err(CovgateError::InvalidConfig(
                "suite name must not be empty".to_string(),
            ));
        }
        if self.index.contains_key(&name) {
            return Err(CovgateError::DuplicateSuite(name));
        }

        let compile_classpath = self.classpath(&decl.output_roots, &decl.extra_compile_inputs)?;
        let runtime_classpath = self.classpath(&decl.output_roots, &decl.extra_runtime_inputs)?;
        let exec_path = self
            .build_dir
            .join("coverage")
            .join(format!("{}.{}", name, self.exec_format.extension()));
        let log_dir = self.build_dir.join("test-results").join(&name);

        debug!(suite = %name, exec = %exec_path.display(), "Declared suite");

        let suite = Suite {
            name: name.clone(),
            source_roots: decl.source_roots,
            output_roots: decl.output_roots,
            compile_classpath,
            runtime_classpath,
            exec_path,
            log_dir,
            command: decl.command,
            env: decl.env,
        };
        self.index.insert(name, self.suites.len());
        self.suites.push(suite);
        Ok(&self.suites[self.suites.len() - 1])
    }

    pub fn get(&self, name: &str) -> Option<&Suite> {
        self.index.get(name).map(|&i| &self.suites[i])
    }

    /// Look up a suite, failing with [`CovgateError::UnknownSuite`].
    pub fn require(&self, name: &str) -> Result<&Suite> {
        self.get(name)
            .ok_or_else(|| CovgateError::UnknownSuite(name.to_string()))
    }

    pub fn suites(&self) -> impl Iterator<Item = &Suite> {
        self.suites.iter()
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Artifact paths of the named suites, in the given order.
    pub fn artifact_paths<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PathBuf>> {
        names
            .iter()
            .map(|n| self.require(n.as_ref()).map(|s| s.exec_path.clone()))
            .collect()
    }

    fn classpath(&self, own: &[PathBuf], extra: &[SuiteInput]) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut classpath = Vec::new();
        let mut push = |path: &PathBuf| {
            if seen.insert(path.clone()) {
                classpath.push(path.clone());
            }
        };

        own.iter().for_each(&mut push);
        for input in extra {
            match input {
                SuiteInput::Suite(name) => self.require(name)?.output_roots.iter().for_each(&mut push),
                SuiteInput::Path(path) => push(path),
            }
        }
        Ok(classpath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, output: &str) -> SuiteDeclaration {
        SuiteDeclaration {
            name: name.to_string(),
            source_roots: vec![PathBuf::from(format!("src/{name}/java"))],
            output_roots: vec![PathBuf::from(output)],
            command: vec!["true".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_artifact_path_is_keyed_by_suite_name() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Binary);
        let suite = registry.declare(decl("test", "build/classes/test")).unwrap();
        assert_eq!(suite.exec_path, PathBuf::from("build/coverage/test.exec"));
        assert_eq!(suite.log_dir, PathBuf::from("build/test-results/test"));
    }

    #[test]
    fn test_json_format_changes_artifact_extension() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Json);
        let suite = registry.declare(decl("test", "out")).unwrap();
        assert_eq!(suite.exec_path, PathBuf::from("build/coverage/test.exec.json"));
    }

    #[test]
    fn test_redeclaring_a_suite_is_rejected() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Binary);
        registry.declare(decl("test", "a")).unwrap();
        let err = registry.declare(decl("test", "b")).unwrap_err();
        assert!(matches!(err, CovgateError::DuplicateSuite(name) if name == "test"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Binary);
        assert!(registry.declare(decl("  ", "a")).is_err());
    }

    #[test]
    fn test_extended_suite_reuses_primary_outputs() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Binary);
        registry
            .declare(SuiteDeclaration {
                output_roots: vec![
                    PathBuf::from("build/classes/main"),
                    PathBuf::from("build/classes/test"),
                ],
                ..decl("test", "unused")
            })
            .unwrap();

        let extended = registry
            .declare(SuiteDeclaration {
                extra_compile_inputs: vec![SuiteInput::Suite("test".to_string())],
                extra_runtime_inputs: vec![
                    SuiteInput::Suite("test".to_string()),
                    SuiteInput::Path(PathBuf::from("build/classes/functionalTest")),
                    SuiteInput::Path(PathBuf::from("libs/wiremock.jar")),
                ],
                ..decl("functionalTest", "build/classes/functionalTest")
            })
            .unwrap();

        assert_eq!(
            extended.compile_classpath,
            vec![
                PathBuf::from("build/classes/functionalTest"),
                PathBuf::from("build/classes/main"),
                PathBuf::from("build/classes/test"),
            ]
        );
        assert_eq!(
            extended.runtime_classpath,
            vec![
                PathBuf::from("build/classes/functionalTest"),
                PathBuf::from("build/classes/main"),
                PathBuf::from("build/classes/test"),
                PathBuf::from("libs/wiremock.jar"),
            ]
        );
    }

    #[test]
    fn test_unknown_suite_input_is_rejected() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Binary);
        let err = registry
            .declare(SuiteDeclaration {
                extra_runtime_inputs: vec![SuiteInput::Suite("missing".to_string())],
                ..decl("functionalTest", "out")
            })
            .unwrap_err();
        assert!(matches!(err, CovgateError::UnknownSuite(_)));
    }

    #[test]
    fn test_artifact_paths_in_requested_order() {
        let mut registry = SuiteRegistry::new("build", ExecFormat::Binary);
        registry.declare(decl("test", "a")).unwrap();
        registry.declare(decl("functionalTest", "b")).unwrap();
        let paths = registry.artifact_paths(&["functionalTest", "test"]).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("build/coverage/functionalTest.exec"),
                PathBuf::from("build/coverage/test.exec"),
            ]
        );
    }
}
