//! Spec entities: jobs, resources and the values they carry

mod duration;
mod job;
mod merge;
mod resource;
mod validate;

pub use duration::{ParseDurationError, SpecDuration};
pub use job::{
    DependencyType, HttpDependency, JobBehavior, JobDependency, JobHook, JobMetadata,
    JobNotifier, JobRetry, JobSchedule, JobSpec, JobTask, JobWindow, MetadataAirflow,
    MetadataResource, ResourceQuantity,
};
pub use resource::{ResourceSpec, SpecNode};
pub use validate::TRUNCATE_TO;
