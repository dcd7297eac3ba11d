use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Normalized outcome of building a checked-out revision.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default, Serialize, Deserialize)]
pub enum CompileState {
    Yes,
    No,
    /// The project's build descriptor is absent, or the tool said nothing
    /// recognizable. Not a build failure.
    NoBuildFile,
    #[default]
    Unknown,
}

/// Tests executed by a test run and the subset of them that failed.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestResult {
    all_tests: BTreeSet<String>,
    failed_tests: BTreeSet<String>,
}

impl TestResult {
    /// Failed tests are folded into the executed set, so a failure reported
    /// without a matching start marker still counts as executed.
    pub fn new(all_tests: BTreeSet<String>, failed_tests: BTreeSet<String>) -> Self {
        let mut all_tests = all_tests;
        all_tests.extend(failed_tests.iter().cloned());

        TestResult {
            all_tests,
            failed_tests,
        }
    }

    pub fn all_tests(&self) -> &BTreeSet<String> {
        &self.all_tests
    }

    pub fn failed_tests(&self) -> &BTreeSet<String> {
        &self.failed_tests
    }

    pub fn passed_tests(&self) -> impl Iterator<Item = &String> {
        self.all_tests.difference(&self.failed_tests)
    }

    /// True only for a test that ran and did not fail.
    pub fn passed(&self, test: &str) -> bool {
        self.all_tests.contains(test) && !self.failed_tests.contains(test)
    }

    pub fn failure_count(&self) -> usize {
        self.failed_tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_tests.is_empty()
    }
}
