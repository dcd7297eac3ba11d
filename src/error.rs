use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested commit could not be checked out.
    #[error("could not check out commit {commit}")]
    CheckoutFailure { commit: String },

    /// A VCS or build tool process could not be spawned or read.
    #[error("failed to run `{command}`: {source}")]
    ProcessFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A VCS command ran but exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    VcsFailure { command: String, stderr: String },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// A revision was evaluated against a repository it was not mined from.
    #[error("revision {commit} does not belong to repository {}", repository.display())]
    ForeignRevision { commit: String, repository: PathBuf },

    #[error("unknown build strategy `{0}`. Valid choices are gradle, maven.")]
    UnknownStrategy(String),
}

impl Error {
    pub(crate) fn process(command: impl Into<String>, source: std::io::Error) -> Self {
        Error::ProcessFailure {
            command: command.into(),
            source,
        }
    }
}
