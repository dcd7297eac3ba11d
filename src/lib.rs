pub mod builder;
pub mod diff;
pub mod error;
pub mod graph;
pub mod outcome;
pub mod repository;
pub mod revision;
pub mod shell;
pub mod strategy;
pub mod vcs;
pub mod visualize;

pub use diff::{ChangeType, DiffFile};
pub use error::{Error, Result};
pub use graph::HistoryGraph;
pub use outcome::{CompileState, TestResult};
pub use repository::Repository;
pub use revision::{ParentDiff, Revision, RevisionKind};
pub use strategy::{BuildStrategy, GradleStrategy, MavenStrategy, StrategyKind};
pub use vcs::{GitClient, LogEntry, VcsClient};
