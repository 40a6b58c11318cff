//! Error taxonomy shared by the spec readers and the deploy coordinator

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::wire::RpcError;

/// Errors surfaced by the client core
#[derive(Error, Debug)]
pub enum Error {
    #[error("filesystem error at [{}]: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error decoding spec [{}]: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("error encoding spec [{}]: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("error converting spec to wire form: {0}")]
    Wire(String),

    #[error("spec with name [{name}] is not found")]
    NotFound { name: String },

    #[error("no job specifications are found for namespace [{namespace}]")]
    NoJobs { namespace: String },

    #[error("no resource specifications are found for namespace [{namespace}] datastore [{datastore}]")]
    NoResources { namespace: String, datastore: String },

    #[error("transport error: {0}")]
    Transport(#[from] RpcError),

    #[error("{phase} took too long, timing out")]
    Timeout { phase: Phase },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deployment [{id}] is cancelled")]
    DeploymentCancelled { id: String },

    #[error("{}", render_deployment_failed(.id, .succeeded, .total, .failures))]
    DeploymentFailed {
        id: String,
        succeeded: i32,
        total: i32,
        failures: Vec<JobFailure>,
    },

    #[error("deployment [{id}] did not reach a terminal status in time")]
    DeploymentTimeout { id: String },

    #[error("{}", render_composite(.0))]
    Composite(Vec<Error>),

    #[error("spec [{name}] is invalid: {}", .problems.join("; "))]
    InvalidSpec { name: String, problems: Vec<String> },

    #[error("job specifications of namespace [{namespace}] failed server-side validation")]
    ValidationFailed { namespace: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid client config: {0}")]
    Config(String),
}

/// Phase of a client run, used to name timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ResourceDeploy,
    JobDeploy,
    ReplaceAll,
    Polling,
    StatusCall,
    Refresh,
    Check,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceDeploy => write!(f, "resource deployment"),
            Self::JobDeploy => write!(f, "job deployment"),
            Self::ReplaceAll => write!(f, "replace-all"),
            Self::Polling => write!(f, "deployment polling"),
            Self::StatusCall => write!(f, "deployment status request"),
            Self::Refresh => write!(f, "job refresh"),
            Self::Check => write!(f, "job validation"),
        }
    }
}

/// A single job that the server refused to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job_name: String,
    pub message: String,
}

fn render_deployment_failed(id: &str, succeeded: &i32, total: &i32, failures: &[JobFailure]) -> String {
    let mut out = format!("deployment [{}] failed, deployed {}/{} jobs", id, succeeded, total);
    for failure in failures {
        if failure.job_name.is_empty() {
            out.push_str(&format!("\n    {}", failure.message));
        } else {
            out.push_str(&format!("\n    {}: {}", failure.job_name, failure.message));
        }
    }
    out
}

fn render_composite(errors: &[Error]) -> String {
    let mut out = format!("{} deployment(s) did not succeed:", errors.len());
    for err in errors {
        out.push_str(&format!("\n  - {}", err));
    }
    out
}

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this is one of the "nothing to deploy" sentinels
    pub fn is_empty_sentinel(&self) -> bool {
        matches!(self, Self::NoJobs { .. } | Self::NoResources { .. })
    }

    /// Map a transport failure onto the phase it happened in.
    ///
    /// Deadline and cancellation statuses become `Timeout` and `Cancelled`;
    /// anything else stays a `Transport` error.
    pub(crate) fn from_rpc(err: RpcError, phase: Phase) -> Self {
        if err.is_deadline_exceeded() {
            Self::Timeout { phase }
        } else if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Transport(err)
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_lists_every_child() {
        let err = Error::Composite(vec![
            Error::DeploymentCancelled { id: "a".into() },
            Error::DeploymentTimeout { id: "b".into() },
        ]);
        let rendered = err.to_string();
        assert!(rendered.starts_with("2 deployment(s)"));
        assert!(rendered.contains("[a] is cancelled"));
        assert!(rendered.contains("[b] did not reach"));
    }

    #[test]
    fn test_deployment_failed_names_jobs() {
        let err = Error::DeploymentFailed {
            id: "d1".into(),
            succeeded: 2,
            total: 3,
            failures: vec![
                JobFailure {
                    job_name: "job-a".into(),
                    message: "bad window".into(),
                },
                JobFailure {
                    job_name: String::new(),
                    message: "upstream unreachable".into(),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("deployed 2/3 jobs"));
        assert!(rendered.contains("job-a: bad window"));
        assert!(rendered.contains("\n    upstream unreachable"));
    }

    #[test]
    fn test_rpc_deadline_maps_to_timeout() {
        let err = Error::from_rpc(RpcError::deadline_exceeded("slow"), Phase::JobDeploy);
        assert!(matches!(err, Error::Timeout { phase: Phase::JobDeploy }));
        assert_eq!(err.to_string(), "job deployment took too long, timing out");
    }
}
