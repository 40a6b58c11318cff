//! Wire protocol of the Optimus server, package `odpf.optimus.core.v1beta1`
//!
//! Messages are declared by hand with `prost` derives instead of being
//! generated at build time, so the crate builds without `protoc`.

mod convert;
mod service;

pub use convert::{from_wire_enum_name, to_wire_enum_name};
pub use service::{
    bidi_channel, server_stream_channel, BidiStream, DeployJobsStream, DeployResourcesStream,
    JobSpecificationService, ReplaceAllStream, ResourceService, ServerEnd, ServerStream,
};

use std::collections::BTreeMap;
use std::fmt;

pub const PACKAGE: &str = "odpf.optimus.core.v1beta1";

/// Status code of a failed RPC, following the gRPC code set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Unimplemented,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::PermissionDenied => "permission denied",
            Self::FailedPrecondition => "failed precondition",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::Unauthenticated => "unauthenticated",
        };
        write!(f, "{}", name)
    }
}

/// Failure reported by the transport or by the server for one call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: RpcCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(RpcCode::DeadlineExceeded, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Cancelled, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.code == RpcCode::DeadlineExceeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == RpcCode::Cancelled
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Level {
    Unspecified = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
}

impl Level {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Level::Unspecified => "LEVEL_UNSPECIFIED",
            Level::Debug => "LEVEL_DEBUG",
            Level::Info => "LEVEL_INFO",
            Level::Warning => "LEVEL_WARNING",
            Level::Error => "LEVEL_ERROR",
        }
    }
}

/// Event a notifier subscribes to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum JobEventType {
    Unspecified = 0,
    SlaMiss = 1,
    Failure = 2,
    JobSuccess = 3,
    ReplayLifecycle = 4,
    TaskRetry = 5,
    TaskSuccess = 6,
    TaskStart = 7,
    TaskFail = 8,
    SensorRetry = 9,
    SensorSuccess = 10,
    SensorStart = 11,
    SensorFail = 12,
    HookStart = 13,
    HookRetry = 14,
    HookFail = 15,
    HookSuccess = 16,
}

impl JobEventType {
    const NAMES: [(JobEventType, &'static str); 17] = [
        (Self::Unspecified, "TYPE_UNSPECIFIED"),
        (Self::SlaMiss, "TYPE_SLA_MISS"),
        (Self::Failure, "TYPE_FAILURE"),
        (Self::JobSuccess, "TYPE_JOB_SUCCESS"),
        (Self::ReplayLifecycle, "TYPE_REPLAY_LIFECYCLE"),
        (Self::TaskRetry, "TYPE_TASK_RETRY"),
        (Self::TaskSuccess, "TYPE_TASK_SUCCESS"),
        (Self::TaskStart, "TYPE_TASK_START"),
        (Self::TaskFail, "TYPE_TASK_FAIL"),
        (Self::SensorRetry, "TYPE_SENSOR_RETRY"),
        (Self::SensorSuccess, "TYPE_SENSOR_SUCCESS"),
        (Self::SensorStart, "TYPE_SENSOR_START"),
        (Self::SensorFail, "TYPE_SENSOR_FAIL"),
        (Self::HookStart, "TYPE_HOOK_START"),
        (Self::HookRetry, "TYPE_HOOK_RETRY"),
        (Self::HookFail, "TYPE_HOOK_FAIL"),
        (Self::HookSuccess, "TYPE_HOOK_SUCCESS"),
    ];

    pub fn as_str_name(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(value, _)| value == self)
            .map(|(_, name)| *name)
            .unwrap_or("TYPE_UNSPECIFIED")
    }

    pub fn from_str_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(value, _)| *value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum JobDependencyType {
    Unspecified = 0,
    Intra = 1,
    Inter = 2,
    Extra = 3,
}

impl JobDependencyType {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Unspecified => "TYPE_UNSPECIFIED",
            Self::Intra => "TYPE_INTRA",
            Self::Inter => "TYPE_INTER",
            Self::Extra => "TYPE_EXTRA",
        }
    }

    pub fn from_str_name(name: &str) -> Option<Self> {
        match name {
            "TYPE_UNSPECIFIED" => Some(Self::Unspecified),
            "TYPE_INTRA" => Some(Self::Intra),
            "TYPE_INTER" => Some(Self::Inter),
            "TYPE_EXTRA" => Some(Self::Extra),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Specifications
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobSpecification {
    #[prost(int32, tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub owner: String,
    #[prost(string, tag = "4")]
    pub start_date: String,
    #[prost(string, tag = "5")]
    pub end_date: String,
    #[prost(string, tag = "6")]
    pub interval: String,
    #[prost(bool, tag = "7")]
    pub depends_on_past: bool,
    #[prost(bool, tag = "8")]
    pub catch_up: bool,
    #[prost(string, tag = "9")]
    pub task_name: String,
    #[prost(message, repeated, tag = "10")]
    pub config: Vec<JobConfigItem>,
    #[prost(string, tag = "11")]
    pub window_size: String,
    #[prost(string, tag = "12")]
    pub window_offset: String,
    #[prost(string, tag = "13")]
    pub window_truncate_to: String,
    #[prost(message, repeated, tag = "14")]
    pub dependencies: Vec<JobDependency>,
    #[prost(btree_map = "string, string", tag = "15")]
    pub assets: BTreeMap<String, String>,
    #[prost(message, repeated, tag = "16")]
    pub hooks: Vec<JobSpecHook>,
    #[prost(string, tag = "17")]
    pub description: String,
    #[prost(btree_map = "string, string", tag = "18")]
    pub labels: BTreeMap<String, String>,
    #[prost(message, optional, tag = "19")]
    pub behavior: Option<JobBehavior>,
    #[prost(message, optional, tag = "20")]
    pub metadata: Option<JobMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobConfigItem {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobDependency {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "JobDependencyType", tag = "2")]
    pub r#type: i32,
    #[prost(message, optional, tag = "3")]
    pub http_dependency: Option<HttpDependency>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpDependency {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub url: String,
    #[prost(btree_map = "string, string", tag = "3")]
    pub headers: BTreeMap<String, String>,
    #[prost(btree_map = "string, string", tag = "4")]
    pub params: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobSpecHook {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub config: Vec<JobConfigItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobBehavior {
    #[prost(message, optional, tag = "1")]
    pub retry: Option<JobRetry>,
    #[prost(message, repeated, tag = "2")]
    pub notify: Vec<JobNotifier>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobRetry {
    #[prost(int32, tag = "1")]
    pub count: i32,
    #[prost(message, optional, tag = "2")]
    pub delay: Option<::prost_types::Duration>,
    #[prost(bool, tag = "3")]
    pub exponential_backoff: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobNotifier {
    #[prost(enumeration = "JobEventType", tag = "1")]
    pub on: i32,
    #[prost(string, repeated, tag = "2")]
    pub channels: Vec<String>,
    #[prost(btree_map = "string, string", tag = "3")]
    pub config: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobMetadata {
    #[prost(message, optional, tag = "1")]
    pub resource: Option<JobMetadataResource>,
    #[prost(message, optional, tag = "2")]
    pub airflow: Option<JobMetadataAirflow>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobMetadataResource {
    #[prost(message, optional, tag = "1")]
    pub request: Option<JobMetadataResourceConfig>,
    #[prost(message, optional, tag = "2")]
    pub limit: Option<JobMetadataResourceConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobMetadataResourceConfig {
    #[prost(string, tag = "1")]
    pub cpu: String,
    #[prost(string, tag = "2")]
    pub memory: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobMetadataAirflow {
    #[prost(string, tag = "1")]
    pub pool: String,
    #[prost(string, tag = "2")]
    pub queue: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceSpecification {
    #[prost(int32, tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub r#type: String,
    #[prost(message, optional, tag = "4")]
    pub spec: Option<::prost_types::Struct>,
    #[prost(btree_map = "string, string", tag = "5")]
    pub assets: BTreeMap<String, String>,
    #[prost(btree_map = "string, string", tag = "6")]
    pub labels: BTreeMap<String, String>,
}

/// Progress or diagnostic line emitted by the server during a streamed call
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Log {
    #[prost(enumeration = "Level", tag = "1")]
    pub level: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl Log {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level: level as i32,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobSpecificationService
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeployJobSpecificationRequest {
    #[prost(string, tag = "1")]
    pub project_name: String,
    #[prost(message, repeated, tag = "2")]
    pub jobs: Vec<JobSpecification>,
    #[prost(string, tag = "3")]
    pub namespace_name: String,
}

/// Either a log record or a deployment identifier
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeployJobSpecificationResponse {
    #[prost(message, optional, tag = "1")]
    pub log_status: Option<Log>,
    #[prost(string, tag = "2")]
    pub deployment_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReplaceAllJobSpecificationsRequest {
    #[prost(string, tag = "1")]
    pub project_name: String,
    #[prost(message, repeated, tag = "2")]
    pub jobs: Vec<JobSpecification>,
    #[prost(string, tag = "3")]
    pub namespace_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReplaceAllJobSpecificationsResponse {
    #[prost(message, optional, tag = "1")]
    pub log_status: Option<Log>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetDeployJobsStatusRequest {
    #[prost(string, tag = "1")]
    pub deployment_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetDeployJobsStatusResponse {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(int32, tag = "2")]
    pub success_count: i32,
    #[prost(int32, tag = "3")]
    pub failure_count: i32,
    #[prost(message, repeated, tag = "4")]
    pub failures: Vec<DeployJobFailure>,
    #[prost(btree_map = "string, message", tag = "5")]
    pub unknown_dependencies: BTreeMap<String, UnknownDependencies>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeployJobFailure {
    #[prost(string, tag = "1")]
    pub job_name: String,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnknownDependencies {
    #[prost(string, repeated, tag = "1")]
    pub names: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RefreshJobsRequest {
    #[prost(string, tag = "1")]
    pub project_name: String,
    #[prost(string, repeated, tag = "2")]
    pub namespace_names: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub job_names: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RefreshJobsResponse {
    #[prost(message, optional, tag = "1")]
    pub log_status: Option<Log>,
    #[prost(string, tag = "2")]
    pub deployment_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckJobSpecificationsRequest {
    #[prost(string, tag = "1")]
    pub project_name: String,
    #[prost(message, repeated, tag = "2")]
    pub jobs: Vec<JobSpecification>,
    #[prost(string, tag = "3")]
    pub namespace_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckJobSpecificationsResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(message, optional, tag = "2")]
    pub log_status: Option<Log>,
}

// ---------------------------------------------------------------------------
// ResourceService
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeployResourceSpecificationRequest {
    #[prost(string, tag = "1")]
    pub project_name: String,
    #[prost(string, tag = "2")]
    pub datastore_name: String,
    #[prost(message, repeated, tag = "3")]
    pub resources: Vec<ResourceSpecification>,
    #[prost(string, tag = "4")]
    pub namespace_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeployResourceSpecificationResponse {
    #[prost(message, optional, tag = "1")]
    pub log_status: Option<Log>,
}

/// Responses of the streamed calls that may carry a log record
pub trait LogCarrier {
    fn log_status(&self) -> Option<&Log>;
}

macro_rules! impl_log_carrier {
    ($($message:ty),* $(,)?) => {
        $(
            impl LogCarrier for $message {
                fn log_status(&self) -> Option<&Log> {
                    self.log_status.as_ref()
                }
            }
        )*
    };
}

impl_log_carrier!(
    DeployJobSpecificationResponse,
    ReplaceAllJobSpecificationsResponse,
    DeployResourceSpecificationResponse,
    RefreshJobsResponse,
    CheckJobSpecificationsResponse,
);

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_response_roundtrips_through_bytes() {
        let mut response = GetDeployJobsStatusResponse {
            status: "Failed".into(),
            success_count: 2,
            failure_count: 1,
            failures: vec![DeployJobFailure {
                job_name: "job-a".into(),
                message: "bad window".into(),
            }],
            ..Default::default()
        };
        response.unknown_dependencies.insert(
            "job-a".into(),
            UnknownDependencies {
                names: vec!["ghost".into()],
            },
        );

        let bytes = response.encode_to_vec();
        let decoded = GetDeployJobsStatusResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(JobEventType::SlaMiss.as_str_name(), "TYPE_SLA_MISS");
        assert_eq!(
            JobEventType::from_str_name("TYPE_TASK_FAIL"),
            Some(JobEventType::TaskFail)
        );
        assert_eq!(JobEventType::from_str_name("TYPE_NOPE"), None);
        assert_eq!(JobDependencyType::Inter.as_str_name(), "TYPE_INTER");
    }

    #[test]
    fn test_unknown_enum_value_reads_as_default() {
        let log = Log {
            level: 42,
            message: "x".into(),
        };
        assert_eq!(log.level(), Level::Unspecified);
    }
}
