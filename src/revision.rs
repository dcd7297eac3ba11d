use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::DiffFile;
use crate::error::Result;
use crate::outcome::{CompileState, TestResult};
use crate::repository::Repository;
use crate::shell::ProcessRunner;
use crate::strategy::BuildStrategy;
use crate::vcs::VcsClient;

/// Files changed between a revision and one of its parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentDiff {
    pub parent: String,
    pub files: Vec<DiffFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionKind {
    /// Mined from the log. `parents` follows the log's parent order and is
    /// empty for a root commit.
    Resolved { parents: Vec<ParentDiff> },
    /// Referenced as a parent but outside the requested window: ancestry
    /// known, content unknown.
    Placeholder,
}

/// A commit in a `HistoryGraph`, with lazily evaluated build and test outcomes.
#[derive(Debug, Serialize, Deserialize)]
pub struct Revision {
    id: String,
    repository: PathBuf,
    kind: RevisionKind,
    compile_state: Mutex<Option<CompileState>>,
    test_result: Mutex<Option<TestResult>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Revision {
    pub fn resolved(id: impl Into<String>, repository: &Path, parents: Vec<ParentDiff>) -> Self {
        Revision::with_kind(id.into(), repository, RevisionKind::Resolved { parents })
    }

    pub fn placeholder(id: impl Into<String>, repository: &Path) -> Self {
        Revision::with_kind(id.into(), repository, RevisionKind::Placeholder)
    }

    fn with_kind(id: String, repository: &Path, kind: RevisionKind) -> Self {
        Revision {
            id,
            repository: repository.to_path_buf(),
            kind,
            compile_state: Mutex::new(None),
            test_result: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    pub fn kind(&self) -> &RevisionKind {
        &self.kind
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, RevisionKind::Placeholder)
    }

    /// Parent diffs in log order. Empty for roots and placeholders.
    pub fn parent_diffs(&self) -> &[ParentDiff] {
        match &self.kind {
            RevisionKind::Resolved { parents } => parents,
            RevisionKind::Placeholder => &[],
        }
    }

    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.parent_diffs().iter().map(|diff| diff.parent.as_str())
    }

    pub fn diff_against(&self, parent: &str) -> Option<&[DiffFile]> {
        self.parent_diffs()
            .iter()
            .find(|diff| diff.parent == parent)
            .map(|diff| diff.files.as_slice())
    }

    /// Every path changed relative to any parent.
    pub fn changed_files(&self) -> BTreeSet<&str> {
        self.parent_diffs()
            .iter()
            .flat_map(|diff| diff.files.iter().map(|file| file.path.as_str()))
            .collect()
    }

    pub fn touches_tests<S: BuildStrategy>(&self, strategy: &S) -> bool {
        self.parent_diffs()
            .iter()
            .flat_map(|diff| &diff.files)
            .any(|file| strategy.is_test_file(file))
    }

    /// The cached compile state, `Unknown` until evaluated. Never runs a build.
    pub fn cached_compile_state(&self) -> CompileState {
        lock(&self.compile_state).unwrap_or_default()
    }

    pub fn cached_test_result(&self) -> Option<TestResult> {
        lock(&self.test_result).clone()
    }

    /// Check out this revision and build it, once. Later calls return the
    /// cached state; concurrent callers wait for the first evaluation.
    pub fn compile_state<V, S, R>(&self, repository: &Repository<V, S, R>) -> Result<CompileState>
    where
        V: VcsClient,
        S: BuildStrategy,
        R: ProcessRunner,
    {
        let mut cached = lock(&self.compile_state);
        if let Some(state) = *cached {
            return Ok(state);
        }

        let state = repository.evaluate(self, |strategy, runner, worktree| {
            strategy.build(runner, worktree)
        })?;
        debug!(commit = %self.id, ?state, "Evaluated compile state");

        *cached = Some(state);
        Ok(state)
    }

    /// Check out this revision and run its tests, once.
    pub fn test_result<V, S, R>(&self, repository: &Repository<V, S, R>) -> Result<TestResult>
    where
        V: VcsClient,
        S: BuildStrategy,
        R: ProcessRunner,
    {
        let mut cached = lock(&self.test_result);
        if let Some(result) = cached.as_ref() {
            return Ok(result.clone());
        }

        let result = repository.evaluate(self, |strategy, runner, worktree| {
            strategy.run_test(runner, worktree)
        })?;
        debug!(
            commit = %self.id,
            tests = result.all_tests().len(),
            failed = result.failure_count(),
            "Evaluated tests"
        );

        *cached = Some(result.clone());
        Ok(result)
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.repository == other.repository
    }
}

impl Eq for Revision {}

impl Hash for Revision {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.repository.hash(state);
    }
}
