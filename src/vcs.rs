//! Version-control collaborator: checkout, log and diff.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::diff::DiffFile;
use crate::error::{Error, Result};
use crate::shell::{CommandLine, ProcessOutput, ProcessRunner, ShellRunner};

/// One line of history: a commit and its parents, in the order git reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub parents: Vec<String>,
}

impl LogEntry {
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        parents: impl IntoIterator<Item = S>,
    ) -> Self {
        LogEntry {
            id: id.into(),
            parents: parents.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `<id> [<parent>...]`, as printed by `git log --format="%h %p"`.
    pub fn parse(line: &str) -> Option<LogEntry> {
        let mut ids = line.split_whitespace();
        let id = ids.next()?;
        Some(LogEntry::new(id, ids))
    }
}

pub trait VcsClient {
    /// The id `log` would report for `rev`, which may be any revision
    /// expression the VCS accepts. `Ok(None)` when it names no commit.
    fn resolve(&self, rev: &str) -> Result<Option<String>>;

    /// Check out `commit` in the working tree. `Ok(false)` when the VCS refused.
    fn checkout(&self, commit: &str) -> Result<bool>;

    /// History reachable from `from`, most recent first.
    fn log(&self, from: &str) -> Result<Vec<LogEntry>>;

    /// Files changed going from `old` to `new`.
    fn diff(&self, old: &str, new: &str) -> Result<Vec<DiffFile>>;
}

/// `VcsClient` backed by the git command line.
#[derive(Debug, Clone)]
pub struct GitClient<R = ShellRunner> {
    repo_path: PathBuf,
    runner: R,
    full_hashes: bool,
}

impl<R: ProcessRunner> GitClient<R> {
    pub fn new(repo_path: &Path, runner: R) -> Self {
        GitClient {
            repo_path: repo_path.to_path_buf(),
            runner,
            full_hashes: false,
        }
    }

    /// Report full 40-character ids instead of git's abbreviated ones.
    pub fn full_hashes(mut self, full_hashes: bool) -> Self {
        self.full_hashes = full_hashes;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn git<I: IntoIterator<Item = String>>(&self, args: I) -> CommandLine {
        let repo = self.repo_path.display().to_string();
        CommandLine::new("git", ["-C".to_string(), repo].into_iter().chain(args))
    }

    fn run_checked(&self, command: &CommandLine) -> Result<ProcessOutput> {
        let output = self.runner.run(command, &self.repo_path)?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::VcsFailure {
                command: command.to_string(),
                stderr: output.stderr.join("\n"),
            })
        }
    }
}

impl<R: ProcessRunner> VcsClient for GitClient<R> {
    fn resolve(&self, rev: &str) -> Result<Option<String>> {
        let mut args = vec![
            "rev-parse".to_string(),
            "--verify".to_string(),
            "--quiet".to_string(),
        ];
        if !self.full_hashes {
            args.push("--short".to_string());
        }
        args.push(format!("{rev}^{{commit}}"));

        let output = self.runner.run(&self.git(args), &self.repo_path)?;
        if !output.success() {
            debug!(rev, "git rev-parse found no commit");
            return Ok(None);
        }

        Ok(output
            .stdout
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
            .map(String::from))
    }

    fn checkout(&self, commit: &str) -> Result<bool> {
        let command = self.git([
            "checkout".to_string(),
            "--quiet".to_string(),
            commit.to_string(),
        ]);
        let output = self.runner.run(&command, &self.repo_path)?;

        if !output.success() {
            debug!(commit, stderr = ?output.stderr, "git checkout refused");
        }
        Ok(output.success())
    }

    fn log(&self, from: &str) -> Result<Vec<LogEntry>> {
        let format = if self.full_hashes {
            "--format=%H %P"
        } else {
            "--format=%h %p"
        };
        let command = self.git(["log".to_string(), format.to_string(), from.to_string()]);
        let output = self.run_checked(&command)?;

        Ok(output
            .stdout
            .iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = LogEntry::parse(line);
                if entry.is_none() {
                    warn!(line = %line, "Skipping malformed log line");
                }
                entry
            })
            .collect())
    }

    fn diff(&self, old: &str, new: &str) -> Result<Vec<DiffFile>> {
        let command = self.git([
            "diff".to_string(),
            "--name-status".to_string(),
            "--no-renames".to_string(),
            old.to_string(),
            new.to_string(),
        ]);
        let output = self.run_checked(&command)?;

        Ok(output
            .stdout
            .iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let file = DiffFile::parse_name_status(line);
                if file.is_none() {
                    warn!(line = %line, "Skipping unrecognized diff line");
                }
                file
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ChangeType;
    use crate::error::Error;
    use crate::repository::Repository;
    use crate::strategy::GradleStrategy;
    use crate::tests::fixtures::ScriptedRunner;
    use std::process::Command;
    use tempfile::TempDir;

    fn git_output(repo: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo)
            .args([
                "-c",
                "user.name=revgraph",
                "-c",
                "user.email=revgraph@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// A repository with `commits` empty commits on one branch.
    fn git_history(commits: usize) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        git_output(dir.path(), &["init", "--quiet"]);
        for i in 0..commits {
            let message = format!("c{i}");
            git_output(
                dir.path(),
                &["commit", "--quiet", "--allow-empty", "-m", message.as_str()],
            );
        }
        dir
    }

    #[test]
    fn parses_log_lines_with_any_number_of_parents() {
        assert_eq!(LogEntry::parse("c1"), Some(LogEntry::new("c1", Vec::<String>::new())));
        assert_eq!(LogEntry::parse("m a b"), Some(LogEntry::new("m", ["a", "b"])));
        assert_eq!(LogEntry::parse("   "), None);
    }

    #[test]
    fn git_client_parses_log_and_diff_output() {
        let runner = ScriptedRunner::default()
            .respond("log", 0, &["c3 c2", "c2 c1", "c1", ""])
            .respond("diff", 0, &["M\tsrc/App.java", "A\tsrc/AppTest.java", "R100\ta\tb"]);
        let git = GitClient::new(Path::new("/repo"), &runner);

        assert_eq!(
            git.log("c3").unwrap(),
            vec![
                LogEntry::new("c3", ["c2"]),
                LogEntry::new("c2", ["c1"]),
                LogEntry::new("c1", Vec::<String>::new()),
            ]
        );
        assert_eq!(
            git.diff("c2", "c3").unwrap(),
            vec![
                DiffFile::new(ChangeType::Modified, "src/App.java"),
                DiffFile::new(ChangeType::Added, "src/AppTest.java"),
            ]
        );
    }

    #[test]
    fn git_client_reports_refused_checkout() {
        let runner = ScriptedRunner::default().respond("checkout", 1, &[]);
        let git = GitClient::new(Path::new("/repo"), &runner);

        assert!(!git.checkout("nope").unwrap());
    }

    #[test]
    fn git_client_uses_full_hash_format_when_asked() {
        let runner = ScriptedRunner::default().respond("log", 0, &[]);
        let git = GitClient::new(Path::new("/repo"), &runner).full_hashes(true);

        git.log("HEAD").unwrap();
        assert!(runner.commands()[0].args.contains(&"--format=%H %P".to_string()));
    }

    #[test]
    fn failed_diff_is_an_error_not_an_empty_change() {
        let runner = ScriptedRunner::default().respond("diff", 128, &[]);
        let git = GitClient::new(Path::new("/repo"), &runner);

        assert!(matches!(
            git.diff("c1", "c2"),
            Err(Error::VcsFailure { command, .. }) if command.contains("diff")
        ));
    }

    #[test]
    fn failed_log_fails_graph_construction() {
        let runner = ScriptedRunner::default()
            .respond("rev-parse", 0, &["c3"])
            .respond("log", 128, &[]);
        let repo = Repository::new(
            Path::new("/repo"),
            GitClient::new(Path::new("/repo"), &runner),
            GradleStrategy::default(),
            ScriptedRunner::default(),
        );

        assert!(matches!(
            repo.build_history_graph("c3", "c1"),
            Err(Error::VcsFailure { .. })
        ));
    }

    #[test]
    fn resolve_asks_for_short_ids_unless_full_hashes() {
        let runner = ScriptedRunner::default().respond("rev-parse", 0, &["abc1234"]);
        let git = GitClient::new(Path::new("/repo"), &runner);

        assert_eq!(git.resolve("HEAD~2").unwrap(), Some("abc1234".to_string()));
        let args = &runner.commands()[0].args;
        assert!(args.contains(&"--short".to_string()));
        assert!(args.contains(&"HEAD~2^{commit}".to_string()));

        let git = GitClient::new(Path::new("/repo"), &runner).full_hashes(true);
        git.resolve("HEAD").unwrap();
        assert!(!runner.commands()[1].args.contains(&"--short".to_string()));
    }

    #[test]
    fn unknown_revision_resolves_to_none() {
        let runner = ScriptedRunner::default().respond("rev-parse", 1, &[]);
        let git = GitClient::new(Path::new("/repo"), &runner);

        assert_eq!(git.resolve("no-such-branch").unwrap(), None);
    }

    #[test]
    fn resolves_every_form_of_a_commit_in_a_real_repository() {
        let dir = git_history(5);
        let full = git_output(dir.path(), &["rev-parse", "HEAD~2"]);
        let git = GitClient::new(dir.path(), ShellRunner::default());

        let short = git.resolve("HEAD~2").unwrap().unwrap();
        assert!(full.starts_with(&short));
        assert_eq!(git.resolve(&full).unwrap(), Some(short.clone()));
        assert_eq!(git.resolve(&full[..10]).unwrap(), Some(short.clone()));
        assert_eq!(git.resolve("no-such-branch").unwrap(), None);

        let git = git.full_hashes(true);
        assert_eq!(git.resolve(&short).unwrap(), Some(full));
    }

    #[test]
    fn window_bounds_accept_any_form_of_a_commit() {
        let dir = git_history(5);
        let full = git_output(dir.path(), &["rev-parse", "HEAD~2"]);

        for end in ["HEAD~2".to_string(), full.clone(), full[..10].to_string()] {
            let repo = Repository::git(
                dir.path(),
                GradleStrategy::default(),
                ShellRunner::default(),
                false,
            );
            let graph = repo.build_history_graph("HEAD", &end).unwrap();

            assert_eq!(graph.resolution_order().len(), 3, "window ending at {end}");
            assert_eq!(graph.placeholders().count(), 1);
            assert!(graph.contains(&end));
            assert_eq!(graph.tip(), graph.get("HEAD"));
            assert!(full.starts_with(graph.canonical_id(&end)));
        }
    }

    #[test]
    fn full_hash_mode_keys_the_graph_by_full_ids() {
        let dir = git_history(3);
        let head = git_output(dir.path(), &["rev-parse", "HEAD"]);
        let repo = Repository::git(
            dir.path(),
            GradleStrategy::default(),
            ShellRunner::default(),
            true,
        );

        let graph = repo.build_history_graph("HEAD", "HEAD~2").unwrap();

        assert_eq!(graph.resolution_order().len(), 3);
        assert_eq!(graph.tip().unwrap().id(), head);
    }
}
