use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tested_trait::test_impl;

use super::{is_jvm_test_source, strip_level, BuildStrategy};
use crate::diff::DiffFile;
use crate::outcome::{CompileState, TestResult};
use crate::shell::CommandLine;

const SUCCESS_MARKER: &str = "BUILD SUCCESS";
const FAILURE_MARKER: &str = "BUILD FAILURE";

struct SurefirePatterns {
    running: Regex,
    /// `Tests run: 2, Failures: 1, ... <<< FAILURE! - in com.example.FooTest`
    class_summary: Regex,
    /// `testBar(com.example.FooTest)  Time elapsed: 0.01 sec  <<< ERROR!`
    junit4_case: Regex,
    /// `com.example.FooTest.testBar -- Time elapsed: 0.01 s <<< FAILURE!`
    qualified_case: Regex,
}

fn surefire() -> &'static SurefirePatterns {
    static PATTERNS: OnceLock<SurefirePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SurefirePatterns {
        running: Regex::new(r"^Running ([\w.$]+)$").expect("running pattern is valid"),
        class_summary: Regex::new(r"<<< (?:FAILURE|ERROR)!.*?-+ in ([\w.$]+)")
            .expect("class summary pattern is valid"),
        junit4_case: Regex::new(r"^[\w$\[\]]+\(([\w.$]+)\).*<<< (?:FAILURE|ERROR)!")
            .expect("junit4 case pattern is valid"),
        qualified_case: Regex::new(r"^([\w.$]+)\.[\w$]+(?:\(.*\))?\s.*<<< (?:FAILURE|ERROR)!")
            .expect("qualified case pattern is valid"),
    })
}

/// Maven projects run through surefire. Surefire reports which test classes
/// ran, so tests are tracked by fully-qualified class name.
#[derive(Debug, Clone)]
pub struct MavenStrategy {
    program: String,
}

impl Default for MavenStrategy {
    fn default() -> Self {
        MavenStrategy {
            program: "mvn".to_string(),
        }
    }
}

impl MavenStrategy {
    pub fn with_program(program: impl Into<String>) -> Self {
        MavenStrategy {
            program: program.into(),
        }
    }

    fn failed_class(line: &str) -> Option<String> {
        let patterns = surefire();
        if let Some(caps) = patterns.class_summary.captures(line) {
            return Some(caps[1].to_string());
        }
        if let Some(caps) = patterns.junit4_case.captures(line) {
            return Some(caps[1].to_string());
        }
        patterns
            .qualified_case
            .captures(line)
            .map(|caps| caps[1].to_string())
    }
}

#[test_impl]
impl BuildStrategy for MavenStrategy {
    fn build_descriptors(&self) -> &[&'static str] {
        &["pom.xml"]
    }

    fn build_command(&self) -> CommandLine {
        CommandLine::new(&self.program, ["-B", "test-compile"])
    }

    fn test_command(&self) -> CommandLine {
        CommandLine::new(&self.program, ["-B", "test", "-fae"])
    }

    fn single_test_command(&self, test: &str) -> CommandLine {
        CommandLine::new(
            &self.program,
            [
                "-B".to_string(),
                "test".to_string(),
                format!("-Dtest={test}"),
                "-Dsurefire.failIfNoSpecifiedTests=false".to_string(),
            ],
        )
    }

    fn classify_build_output(&self, output: &[String]) -> Option<CompileState> {
        let mut state = None;
        for line in output.iter().map(|line| strip_level(line)) {
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

        for line in output.iter().map(|line| strip_level(line)) {
            if let Some(caps) = surefire().running.captures(line) {
                all_tests.insert(caps[1].to_string());
            } else if let Some(class) = Self::failed_class(line) {
                failed_tests.insert(class);
            }
        }

        TestResult::new(all_tests, failed_tests)
    }

    /// Accepts `Class`, `Class#method` or `Class#method+other`; only the class is checked.
    fn single_test_passed(&self, result: &TestResult, _output: &[String], test: &str) -> bool {
        let class = test.split_once('#').map_or(test, |(class, _)| class);
        result.passed(class)
    }

    fn is_test_file(&self, file: &DiffFile) -> bool {
        is_jvm_test_source(&file.path)
    }
}
