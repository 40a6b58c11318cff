//! Streaming deploy coordinator
//!
//! A run deploys resources first, then jobs. Each phase opens one stream,
//! sends a batch per namespace, half-closes and drains the responses.
//! Incremental job deploys then poll every returned deployment id.

mod job;
mod poll;
mod printer;
mod refresh;
mod resource;

pub use poll::{poll_deployment, poll_deployments, DeploymentStatus};
pub use printer::{print_log_status, LogPrinter, Printer, SendProgress};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ClientConfig, NamespaceConfig};
use crate::error::{Error, Phase, Result};
use crate::fs::SpecFs;
use crate::wire::{BidiStream, JobSpecificationService, LogCarrier, ResourceService};

const MINUTE: Duration = Duration::from_secs(60);

/// Deadlines of a deploy run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub resource_deploy: Duration,
    pub job_deploy: Duration,
    /// Overall deadline of one deployment's polling
    pub poll: Duration,
    /// Deadline of a single status request
    pub status_call: Duration,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            resource_deploy: 30 * MINUTE,
            job_deploy: 30 * MINUTE,
            poll: 30 * MINUTE,
            status_call: MINUTE,
            poll_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub ignore_jobs: bool,
    pub ignore_resources: bool,
    pub verbose: bool,
    /// Resources per request; 0 sends each datastore in one request
    pub batch_size: usize,
    pub timeouts: Timeouts,
}

/// Runs deploy, replace-all, refresh and validation flows against a server
pub struct Deployer {
    config: ClientConfig,
    fs: Arc<dyn SpecFs>,
    jobs: Arc<dyn JobSpecificationService>,
    resources: Arc<dyn ResourceService>,
    printer: Arc<dyn Printer>,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(
        config: ClientConfig,
        fs: Arc<dyn SpecFs>,
        jobs: Arc<dyn JobSpecificationService>,
        resources: Arc<dyn ResourceService>,
    ) -> Self {
        Self {
            config,
            fs,
            jobs,
            resources,
            printer: Arc::new(LogPrinter),
            options: DeployOptions::default(),
        }
    }

    pub fn with_printer(mut self, printer: Arc<dyn Printer>) -> Self {
        self.printer = printer;
        self
    }

    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Resource phase, then incremental job phase
    pub async fn deploy(&self, namespaces: &[&NamespaceConfig]) -> Result<()> {
        self.deploy_resources(namespaces).await?;
        if !self.options.ignore_resources {
            self.printer.info("> resource deployment finished!");
        }

        self.deploy_jobs(namespaces).await?;
        if !self.options.ignore_jobs {
            self.printer.info("> job deployment finished!");
        }
        Ok(())
    }

    fn project_name(&self) -> &str {
        &self.config.project.name
    }

    /// Run `fut` under `limit`; on expiry print `message` and fail with a timeout for `phase`
    async fn within<T>(
        &self,
        limit: Duration,
        phase: Phase,
        message: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                self.printer.error(message);
                Err(Error::Timeout { phase })
            }
        }
    }

    /// Print every log record until the server ends the stream; other
    /// payloads go to `on_response`.
    async fn drain<Req, Resp>(
        &self,
        stream: &mut BidiStream<Req, Resp>,
        phase: Phase,
        mut on_response: impl FnMut(&Resp),
    ) -> Result<()>
    where
        Resp: LogCarrier,
    {
        self.printer.info("> Receiving responses:");
        while let Some(response) = stream
            .message()
            .await
            .map_err(|e| Error::from_rpc(e, phase))?
        {
            if let Some(log) = response.log_status() {
                print_log_status(self.printer.as_ref(), log, self.options.verbose);
            }
            on_response(&response);
        }
        Ok(())
    }
}

fn namespace_names(namespaces: &[&NamespaceConfig]) -> String {
    namespaces
        .iter()
        .map(|ns| ns.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
