//! Server-streamed flows: refreshing job dependencies and validating specs

use std::sync::Arc;

use super::{poll_deployments, print_log_status, Deployer};
use crate::config::NamespaceConfig;
use crate::error::{Error, Phase, Result};
use crate::wire::{CheckJobSpecificationsRequest, Level, RefreshJobsRequest};

impl Deployer {
    /// Ask the server to re-resolve dependencies and redeploy the given
    /// namespaces and jobs, then poll the resulting deployment.
    pub async fn refresh_jobs(&self, namespace_names: &[String], job_names: &[String]) -> Result<()> {
        if namespace_names.is_empty() && job_names.is_empty() {
            self.printer.info(&format!(
                "Redeploying all jobs in {} project",
                self.project_name()
            ));
        } else {
            self.printer
                .info("Refreshing job dependencies of selected jobs/namespaces");
        }

        let phase = Phase::Refresh;
        let ids = self
            .within(
                self.options.timeouts.job_deploy,
                phase,
                "Refresh process took too long, timing out",
                async {
                    let request = RefreshJobsRequest {
                        project_name: self.project_name().to_string(),
                        namespace_names: namespace_names.to_vec(),
                        job_names: job_names.to_vec(),
                    };
                    let mut stream = self
                        .jobs
                        .refresh_jobs(request)
                        .await
                        .map_err(|e| Error::from_rpc(e, phase))?;

                    let mut ids: Vec<String> = Vec::new();
                    while let Some(response) = stream
                        .message()
                        .await
                        .map_err(|e| Error::from_rpc(e, phase))?
                    {
                        if let Some(log) = &response.log_status {
                            print_log_status(self.printer.as_ref(), log, self.options.verbose);
                        }
                        let id = response.deployment_id;
                        if !id.is_empty() && !ids.contains(&id) {
                            self.printer
                                .info(&format!("Deployment request created with ID: {}", id));
                            ids.push(id);
                        }
                    }
                    Ok(ids)
                },
            )
            .await?;

        if ids.is_empty() {
            self.printer.warn("refresh finished without a deployment request");
            return Ok(());
        }
        poll_deployments(
            Arc::clone(&self.jobs),
            Arc::clone(&self.printer),
            ids,
            self.options.timeouts,
        )
        .await?;
        self.printer.info("Job refresh & deployment finished");
        Ok(())
    }

    /// Send a namespace's merged job specs for server-side validation.
    ///
    /// Fails when the server reports an error record or a negative status.
    pub async fn check_jobs(&self, namespace: &NamespaceConfig) -> Result<()> {
        let jobs = self.namespace_jobs(namespace)?;
        self.printer.info(&format!(
            "Validating job specifications for project: {}, namespace: {}",
            self.project_name(),
            namespace.name
        ));

        let phase = Phase::Check;
        let passed = self
            .within(
                self.options.timeouts.job_deploy,
                phase,
                "Validate process took too long, timing out",
                async {
                    let request = CheckJobSpecificationsRequest {
                        project_name: self.project_name().to_string(),
                        jobs,
                        namespace_name: namespace.name.clone(),
                    };
                    let mut stream = self
                        .jobs
                        .check_job_specifications(request)
                        .await
                        .map_err(|e| Error::from_rpc(e, phase))?;

                    let mut passed = true;
                    while let Some(response) = stream
                        .message()
                        .await
                        .map_err(|e| Error::from_rpc(e, phase))?
                    {
                        match &response.log_status {
                            Some(log) => {
                                print_log_status(self.printer.as_ref(), log, self.options.verbose);
                                if log.level() == Level::Error {
                                    passed = false;
                                }
                            }
                            // a response without a log record is a status report
                            None => passed &= response.success,
                        }
                    }
                    Ok(passed)
                },
            )
            .await?;

        if !passed {
            return Err(Error::ValidationFailed {
                namespace: namespace.name.clone(),
            });
        }
        self.printer.info("Jobs validated successfully");
        Ok(())
    }
}
