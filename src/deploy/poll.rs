//! Deployment status polling
//!
//! One worker per deployment id. Workers report once on a shared channel
//! and the collector waits for all of them before failing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::printer::Printer;
use super::Timeouts;
use crate::error::{Error, JobFailure, Phase, Result};
use crate::wire::{GetDeployJobsStatusRequest, GetDeployJobsStatusResponse, JobSpecificationService};

/// Status tag reported by `GetDeployJobsStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    InProgress,
    InQueue,
    Succeed,
    Cancelled,
    Failed,
}

impl DeploymentStatus {
    /// Unknown tags are treated as still in progress
    pub fn parse(tag: &str) -> Self {
        match tag {
            "In Queue" => Self::InQueue,
            "Succeed" => Self::Succeed,
            "Cancelled" => Self::Cancelled,
            "Failed" => Self::Failed,
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeed | Self::Cancelled | Self::Failed)
    }
}

/// Poll every id to a terminal status, in parallel.
///
/// Returns `Error::Composite` holding each failed deployment once all
/// workers are done.
pub async fn poll_deployments(
    service: Arc<dyn JobSpecificationService>,
    printer: Arc<dyn Printer>,
    ids: Vec<String>,
    timeouts: Timeouts,
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(ids.len());
    let mut workers = JoinSet::new();
    for id in ids {
        let tx = tx.clone();
        let service = Arc::clone(&service);
        let printer = Arc::clone(&printer);
        workers.spawn(async move {
            let result = poll_deployment(service.as_ref(), printer.as_ref(), &id, &timeouts).await;
            let _ = tx.send((id, result)).await;
        });
    }
    drop(tx);

    let mut errors = Vec::new();
    while let Some((id, result)) = rx.recv().await {
        match result {
            Ok(()) => log::debug!("deployment {} finished", id),
            Err(e) => errors.push(e),
        }
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Composite(errors))
    }
}

/// Poll one deployment until it is terminal or the poll deadline passes
pub async fn poll_deployment(
    service: &dyn JobSpecificationService,
    printer: &dyn Printer,
    id: &str,
    timeouts: &Timeouts,
) -> Result<()> {
    let polling = poll_until_terminal(service, printer, id, timeouts.status_call, timeouts.poll_interval);
    match tokio::time::timeout(timeouts.poll, polling).await {
        Ok(result) => result,
        Err(_) => {
            printer.error(&format!(
                "Deployment request for deployID {} took too long, timing out",
                id
            ));
            Err(Error::DeploymentTimeout { id: id.to_string() })
        }
    }
}

async fn poll_until_terminal(
    service: &dyn JobSpecificationService,
    printer: &dyn Printer,
    id: &str,
    status_call: Duration,
    poll_interval: Duration,
) -> Result<()> {
    loop {
        let request = GetDeployJobsStatusRequest {
            deployment_id: id.to_string(),
        };
        let response =
            match tokio::time::timeout(status_call, service.get_deploy_jobs_status(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(Error::from_rpc(e, Phase::StatusCall)),
                Err(_) => {
                    printer.error("Get deployment process took too long, timing out");
                    return Err(Error::Timeout {
                        phase: Phase::StatusCall,
                    });
                }
            };

        match DeploymentStatus::parse(&response.status) {
            DeploymentStatus::InProgress => printer.info(&format!(
                "Deployment request for deployID {} is in progress...",
                id
            )),
            DeploymentStatus::InQueue => printer.info(&format!(
                "Deployment request for deployID {} is in queue...",
                id
            )),
            DeploymentStatus::Succeed => {
                printer.info(&format!(
                    "Success deploying {} jobs for deployID {}",
                    response.success_count, id
                ));
                return Ok(());
            }
            DeploymentStatus::Cancelled => {
                printer.error(&format!(
                    "Deployment request for deployID {} is cancelled.",
                    id
                ));
                return Err(Error::DeploymentCancelled { id: id.to_string() });
            }
            DeploymentStatus::Failed => return Err(report_failure(printer, id, response)),
        }

        tokio::time::sleep(poll_interval).await;
    }
}

fn report_failure(printer: &dyn Printer, id: &str, response: GetDeployJobsStatusResponse) -> Error {
    for failure in &response.failures {
        if failure.job_name.is_empty() {
            printer.error(&format!("Job deployment failed: {}", failure.message));
        } else {
            printer.error(&format!(
                "Unable to deploy job {}: {}",
                failure.job_name, failure.message
            ));
        }
    }

    if !response.unknown_dependencies.is_empty() {
        printer.error("Unable to create sensors for below jobs:");
        for (job_name, dependencies) in &response.unknown_dependencies {
            printer.error(&format!(
                "- {}: invalid dependency name(s): {}.",
                job_name,
                dependencies.names.join(", ")
            ));
        }
    }

    let total = response.success_count + response.failure_count;
    printer.error(&format!("Deployed {}/{} jobs.", response.success_count, total));

    Error::DeploymentFailed {
        id: id.to_string(),
        succeeded: response.success_count,
        total,
        failures: response
            .failures
            .into_iter()
            .map(|f| JobFailure {
                job_name: f.job_name,
                message: f.message,
            })
            .collect(),
    }
}
