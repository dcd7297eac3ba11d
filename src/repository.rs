use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::builder;
use crate::error::{Error, Result};
use crate::graph::HistoryGraph;
use crate::revision::{lock, Revision};
use crate::shell::{ProcessRunner, ShellRunner};
use crate::strategy::BuildStrategy;
use crate::vcs::{GitClient, VcsClient};

/// A working tree together with the collaborators needed to mine and evaluate it.
///
/// Every checkout and every tool invocation holds the worktree lock, so
/// evaluations of different revisions of the same clone never interleave.
#[derive(Debug)]
pub struct Repository<V, S, R = ShellRunner> {
    root: PathBuf,
    vcs: V,
    strategy: S,
    runner: R,
    worktree: Mutex<()>,
}

impl<S: BuildStrategy> Repository<GitClient<ShellRunner>, S, ShellRunner> {
    /// A git clone at `root`, driven through the git CLI.
    pub fn git(root: &Path, strategy: S, runner: ShellRunner, full_hashes: bool) -> Self {
        let vcs = GitClient::new(root, runner.clone()).full_hashes(full_hashes);
        Repository::new(root, vcs, strategy, runner)
    }
}

impl<V, S, R> Repository<V, S, R>
where
    V: VcsClient,
    S: BuildStrategy,
    R: ProcessRunner,
{
    pub fn new(root: &Path, vcs: V, strategy: S, runner: R) -> Self {
        Repository {
            root: root.to_path_buf(),
            vcs,
            strategy,
            runner,
            worktree: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Mine the history between `end` and `start`, inclusive, into a graph.
    ///
    /// Both bounds may be any revision expression the VCS accepts. Revisions
    /// are keyed by the ids the log reports, and the graph also answers to
    /// `start` and `end` as given. Fails before creating any revision if
    /// `start` cannot be checked out.
    pub fn build_history_graph(&self, start: &str, end: &str) -> Result<HistoryGraph> {
        info!(start, end, repository = %self.root.display(), "Building history graph");

        let _worktree = lock(&self.worktree);
        let Some(start_id) = self.vcs.resolve(start)? else {
            return Err(Error::CheckoutFailure {
                commit: start.to_string(),
            });
        };
        let end_id = match self.vcs.resolve(end)? {
            Some(id) => id,
            None => {
                warn!(end, "End commit names no commit");
                end.to_string()
            }
        };
        self.checkout(&start_id)?;

        let log = self.vcs.log(&start_id)?;
        let mut graph = builder::construct(log, &end_id, &self.root, |parent, child| {
            self.vcs.diff(parent, child)
        })?;
        graph.add_alias(start, &start_id);
        if graph.contains(&end_id) {
            graph.add_alias(end, &end_id);
        }

        info!(
            revisions = graph.resolution_order().len(),
            placeholders = graph.placeholders().count(),
            "Built history graph"
        );
        Ok(graph)
    }

    /// Run one named test at `revision`. Not cached.
    pub fn run_single_test(&self, revision: &Revision, test: &str) -> Result<bool> {
        self.evaluate(revision, |strategy, runner, worktree| {
            strategy.run_single_test(runner, worktree, test)
        })
    }

    /// Check out `revision` and run `task` against the worktree while holding it.
    pub(crate) fn evaluate<T, F>(&self, revision: &Revision, task: F) -> Result<T>
    where
        F: FnOnce(&S, &R, &Path) -> Result<T>,
    {
        if revision.repository() != self.root.as_path() {
            return Err(Error::ForeignRevision {
                commit: revision.id().to_string(),
                repository: self.root.clone(),
            });
        }

        let _worktree = lock(&self.worktree);
        self.checkout(revision.id())?;
        task(&self.strategy, &self.runner, &self.root)
    }

    fn checkout(&self, commit: &str) -> Result<()> {
        if self.vcs.checkout(commit)? {
            Ok(())
        } else {
            Err(Error::CheckoutFailure {
                commit: commit.to_string(),
            })
        }
    }
}
