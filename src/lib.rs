//! Optimus client - local spec tooling and deploy coordinator
//!
//! Reads hierarchical job and resource specifications from disk, merges
//! inherited `this.yaml` defaults, and streams them to an Optimus server.

pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fs;
pub mod model;
pub mod specio;
pub mod wire;

// Re-exports
pub use config::ClientConfig;
pub use deploy::{DeployOptions, Deployer, Timeouts};
pub use error::{Error, Result};
pub use fs::{MemFs, OsFs, SpecFs};
pub use model::{JobSpec, ResourceSpec};
pub use specio::{JobSpecReadWriter, ResourceSpecReadWriter, SpecReadWriter};
