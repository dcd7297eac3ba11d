//! Build strategies: how a project's build tool is invoked and how its
//! output is read back into a `CompileState` or `TestResult`.

use std::path::Path;
use std::str::FromStr;

use tested_trait::tested_trait;
use tracing::{debug, warn};

use crate::diff::DiffFile;
use crate::error::{Error, Result};
use crate::outcome::{CompileState, TestResult};
use crate::shell::{CommandLine, ProcessRunner};

mod gradle;
mod maven;

pub use gradle::GradleStrategy;
pub use maven::MavenStrategy;

/// Supporting another build tool means implementing the required methods
/// here. The graph and revision code only ever calls the provided ones.
#[tested_trait]
pub trait BuildStrategy {
    /// Files, relative to the worktree root, whose presence marks a buildable project.
    fn build_descriptors(&self) -> &[&'static str];

    /// Compiles main and test sources without running tests.
    fn build_command(&self) -> CommandLine;

    fn test_command(&self) -> CommandLine;

    fn single_test_command(&self, test: &str) -> CommandLine;

    /// `None` when no success or failure marker is present.
    fn classify_build_output(&self, output: &[String]) -> Option<CompileState>;

    fn parse_test_output(&self, output: &[String]) -> TestResult;

    fn is_test_file(&self, file: &DiffFile) -> bool;

    /// Whether `test` passed, given the parsed result and raw output of
    /// `single_test_command`.
    fn single_test_passed(&self, result: &TestResult, _output: &[String], test: &str) -> bool {
        result.passed(test)
    }

    fn has_build_descriptor(&self, worktree: &Path) -> bool {
        self.build_descriptors()
            .iter()
            .any(|descriptor| worktree.join(descriptor).is_file())
    }

    fn build(&self, runner: &dyn ProcessRunner, worktree: &Path) -> Result<CompileState> {
        if !self.has_build_descriptor(worktree) {
            debug!(worktree = %worktree.display(), "No build descriptor present");
            return Ok(CompileState::NoBuildFile);
        }

        let output = runner.run(&self.build_command(), worktree)?;

        match self.classify_build_output(&output.combined()) {
            Some(state) => Ok(state),
            None => {
                warn!(
                    worktree = %worktree.display(),
                    exit_code = ?output.exit_code,
                    "Build output matched no known marker"
                );
                Ok(CompileState::NoBuildFile)
            }
        }
    }

    fn run_test(&self, runner: &dyn ProcessRunner, worktree: &Path) -> Result<TestResult> {
        let output = runner.run(&self.test_command(), worktree)?;
        let result = self.parse_test_output(&output.combined());

        if result.is_empty() && !output.success() {
            warn!(
                worktree = %worktree.display(),
                exit_code = ?output.exit_code,
                "Test run failed without reporting any test"
            );
        }
        Ok(result)
    }

    fn run_single_test(
        &self,
        runner: &dyn ProcessRunner,
        worktree: &Path,
        test: &str,
    ) -> Result<bool> {
        let output = runner.run(&self.single_test_command(test), worktree)?.combined();
        let result = self.parse_test_output(&output);

        Ok(self.single_test_passed(&result, &output, test))
    }

    #[test]
    fn unrecognized_build_output_has_no_state() where Self: Default {
        let output = vec![
            "Downloading dependencies".to_string(),
            "something went sideways".to_string(),
        ];
        assert_eq!(Self::default().classify_build_output(&output), None);
        assert_eq!(Self::default().classify_build_output(&[]), None);
    }

    #[test]
    fn missing_descriptor_skips_the_build_tool() where Self: Default {
        let runner = crate::tests::fixtures::ScriptedRunner::default();
        let state = Self::default()
            .build(&runner, Path::new("/nonexistent/git-revgraph/worktree"))
            .unwrap();

        assert_eq!(state, CompileState::NoBuildFile);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn empty_test_output_is_an_empty_result() where Self: Default {
        let result = Self::default().parse_test_output(&[]);
        assert!(result.is_empty());
        assert_eq!(result.failure_count(), 0);
    }

    #[test]
    fn test_output_keeps_failures_within_executed_tests() where Self: Default {
        let output = vec![
            "FAILED".to_string(),
            "<<< FAILURE!".to_string(),
            " > STARTED".to_string(),
            "noise".to_string(),
        ];
        let result = Self::default().parse_test_output(&output);
        assert!(result.failed_tests().is_subset(result.all_tests()));
    }

    #[test]
    fn documentation_is_not_a_test_file() where Self: Default {
        use crate::diff::ChangeType;

        let strategy = Self::default();
        assert!(!strategy.is_test_file(&DiffFile::new(ChangeType::Modified, "README.md")));
        assert!(!strategy.is_test_file(&DiffFile::new(ChangeType::Added, "docs/testing.md")));
    }
}

/// Build tools selectable from the command line.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum StrategyKind {
    Gradle,
    Maven,
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gradle" => Ok(StrategyKind::Gradle),
            "maven" | "mvn" => Ok(StrategyKind::Maven),
            _ => Err(Error::UnknownStrategy(s.to_string())),
        }
    }
}

/// Strip a `[INFO] `-style log level prefix.
pub(crate) fn strip_level(line: &str) -> &str {
    let line = line.trim();
    match line.strip_prefix('[').and_then(|rest| rest.split_once("] ")) {
        Some((level, rest)) if level.chars().all(|c| c.is_ascii_uppercase()) => rest.trim(),
        _ => line,
    }
}

/// Java/Kotlin/Groovy source whose file stem ends in `Test` or `Tests`,
/// or anything under a `src/test/` tree.
pub(crate) fn is_jvm_test_source(path: &str) -> bool {
    if path.starts_with("src/test/") || path.contains("/src/test/") {
        return true;
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, "java" | "kt" | "groovy")) => stem.ends_with("Test") || stem.ends_with("Tests"),
        _ => false,
    }
}
