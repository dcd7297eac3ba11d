use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tested_trait::test_impl;

use super::{is_jvm_test_source, BuildStrategy};
use crate::diff::DiffFile;
use crate::outcome::{CompileState, TestResult};
use crate::shell::CommandLine;

const SUCCESS_MARKER: &str = "BUILD SUCCESSFUL";
const FAILURE_MARKER: &str = "BUILD FAILED";

/// `com.example.FooTest > testBar STARTED`, as printed with
/// `testLogging { events "started", "failed" }`.
fn test_event() -> &'static Regex {
    static TEST_EVENT: OnceLock<Regex> = OnceLock::new();
    TEST_EVENT.get_or_init(|| {
        Regex::new(r"^(?P<class>[\w.$]+) > (?P<method>.+?) (?P<event>STARTED|PASSED|FAILED|SKIPPED)$")
            .expect("test event pattern is valid")
    })
}

/// Gradle projects. Tests are named `<class>.<method>`, the form `--tests` accepts.
#[derive(Debug, Clone)]
pub struct GradleStrategy {
    program: String,
}

impl Default for GradleStrategy {
    fn default() -> Self {
        GradleStrategy {
            program: "gradle".to_string(),
        }
    }
}

impl GradleStrategy {
    /// Use another launcher, e.g. `./gradlew`.
    pub fn with_program(program: impl Into<String>) -> Self {
        GradleStrategy {
            program: program.into(),
        }
    }
}

#[test_impl]
impl BuildStrategy for GradleStrategy {
    fn build_descriptors(&self) -> &[&'static str] {
        &["build.gradle", "build.gradle.kts"]
    }

    fn build_command(&self) -> CommandLine {
        CommandLine::new(&self.program, ["assemble", "testClasses", "--console=plain"])
    }

    fn test_command(&self) -> CommandLine {
        CommandLine::new(&self.program, ["test", "--continue", "--console=plain"])
    }

    fn single_test_command(&self, test: &str) -> CommandLine {
        CommandLine::new(&self.program, ["test", "--console=plain", "--tests", test])
    }

    fn classify_build_output(&self, output: &[String]) -> Option<CompileState> {
        let mut state = None;
        for line in output.iter().map(|line| line.trim()) {
            if line.starts_with(FAILURE_MARKER) {
                return Some(CompileState::No);
            } else if line.starts_with(SUCCESS_MARKER) {
                state = Some(CompileState::Yes);
            }
        }
        state
    }

    fn parse_test_output(&self, output: &[String]) -> TestResult {
        let mut all_tests = BTreeSet::new();
        let mut failed_tests = BTreeSet::new();

        for line in output {
            let Some(caps) = test_event().captures(line.trim()) else {
                continue;
            };
            let method = caps["method"].trim_end_matches("()");
            let name = format!("{}.{}", &caps["class"], method);

            match &caps["event"] {
                "STARTED" | "PASSED" => {
                    all_tests.insert(name);
                }
                "FAILED" => {
                    failed_tests.insert(name);
                }
                _ => {}
            }
        }

        TestResult::new(all_tests, failed_tests)
    }

    /// Stock Gradle logging prints failures but no started or passed events.
    /// `--tests` fails the build when its filter matches nothing, so without
    /// an event for `test` a successful build means it ran and passed.
    fn single_test_passed(&self, result: &TestResult, output: &[String], test: &str) -> bool {
        if result.all_tests().contains(test) {
            return result.passed(test);
        }
        result.failed_tests().is_empty()
            && self.classify_build_output(output) == Some(CompileState::Yes)
    }

    fn is_test_file(&self, file: &DiffFile) -> bool {
        is_jvm_test_source(&file.path)
    }
}
