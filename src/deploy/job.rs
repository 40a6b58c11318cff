//! Job phases: incremental deploy with polling, and replace-all

use std::sync::Arc;

use super::{namespace_names, poll_deployments, Deployer, SendProgress};
use crate::config::NamespaceConfig;
use crate::error::{Error, Phase, Result};
use crate::specio::{JobSpecReadWriter, SpecReadWriter};
use crate::wire::{
    BidiStream, DeployJobSpecificationRequest, JobSpecification,
    ReplaceAllJobSpecificationsRequest,
};

/// Requests that carry one namespace's job batch
trait JobBatchRequest {
    fn batch(project_name: &str, namespace_name: &str, jobs: Vec<JobSpecification>) -> Self;
}

impl JobBatchRequest for DeployJobSpecificationRequest {
    fn batch(project_name: &str, namespace_name: &str, jobs: Vec<JobSpecification>) -> Self {
        Self {
            project_name: project_name.to_string(),
            jobs,
            namespace_name: namespace_name.to_string(),
        }
    }
}

impl JobBatchRequest for ReplaceAllJobSpecificationsRequest {
    fn batch(project_name: &str, namespace_name: &str, jobs: Vec<JobSpecification>) -> Self {
        Self {
            project_name: project_name.to_string(),
            jobs,
            namespace_name: namespace_name.to_string(),
        }
    }
}

const NO_JOBS_WARNING: &str = "no job specs are found from all the namespaces";

impl Deployer {
    /// Merged job specs of a namespace in wire form.
    ///
    /// Fails with `NoJobs` when the namespace has no job directory at all.
    pub(crate) fn namespace_jobs(&self, namespace: &NamespaceConfig) -> Result<Vec<JobSpecification>> {
        if namespace.job.path.as_os_str().is_empty() {
            return Err(Error::NoJobs {
                namespace: namespace.name.clone(),
            });
        }
        let root = self.config.resolve(&namespace.job.path);
        if !self.fs.is_dir(&root) {
            return Err(Error::NoJobs {
                namespace: namespace.name.clone(),
            });
        }

        let reader = JobSpecReadWriter::new(Arc::clone(&self.fs)).with_parent_reading(true);
        reader
            .read_all(&root)?
            .iter()
            .map(|spec| spec.to_wire())
            .collect()
    }

    /// Send one request per namespace; returns how many specs went out
    async fn send_job_batches<Req, Resp>(
        &self,
        stream: &mut BidiStream<Req, Resp>,
        namespaces: &[&NamespaceConfig],
        phase: Phase,
    ) -> Result<usize>
    where
        Req: JobBatchRequest,
    {
        let mut total = 0;
        for namespace in namespaces {
            let jobs = match self.namespace_jobs(namespace) {
                Ok(jobs) => jobs,
                Err(e) if e.is_empty_sentinel() => {
                    self.printer.warn(&format!(
                        "no job specifications are found for namespace [{}]",
                        namespace.name
                    ));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let count = jobs.len();
            stream
                .send(Req::batch(self.project_name(), &namespace.name, jobs))
                .await
                .map_err(|e| Error::from_rpc(e, phase))?;
            total += count;
            self.printer.progress(&SendProgress {
                namespace: namespace.name.clone(),
                datastore: String::new(),
                sent: count,
                total,
            });
        }
        Ok(total)
    }

    /// Deploy job specs and poll every resulting deployment to completion
    pub async fn deploy_jobs(&self, namespaces: &[&NamespaceConfig]) -> Result<()> {
        if self.options.ignore_jobs {
            self.printer.warn("> Skipping job deployment");
            return Ok(());
        }
        self.printer.info(&format!(
            "> Deploying jobs from namespaces [{}]",
            namespace_names(namespaces)
        ));

        let phase = Phase::JobDeploy;
        let submitted = self.within(
            self.options.timeouts.job_deploy,
            phase,
            "Deployment process took too long, timing out",
            async {
                let mut stream = self
                    .jobs
                    .deploy_job_specification()
                    .await
                    .map_err(|e| Error::from_rpc(e, phase))?;

                let total = self.send_job_batches(&mut stream, namespaces, phase).await?;
                stream.close_send();
                if total == 0 {
                    self.printer.warn(NO_JOBS_WARNING);
                    return Ok(None);
                }

                let mut ids: Vec<String> = Vec::new();
                self.drain(&mut stream, phase, |response| {
                    let id = &response.deployment_id;
                    if !id.is_empty() && !ids.contains(id) {
                        self.printer
                            .info(&format!("deployID {} successfully submitted", id));
                        ids.push(id.clone());
                    }
                })
                .await?;
                Ok(Some(ids))
            },
        );

        let Some(ids) = submitted.await? else {
            return Ok(());
        };

        self.printer.info("> Polling deployment results:");
        poll_deployments(
            Arc::clone(&self.jobs),
            Arc::clone(&self.printer),
            ids,
            self.options.timeouts,
        )
        .await
    }

    /// Replace every job of the selected namespaces with what is on disk
    pub async fn replace_all_jobs(&self, namespaces: &[&NamespaceConfig]) -> Result<()> {
        self.printer.info(&format!(
            "> Replacing all jobs for namespaces [{}]",
            namespace_names(namespaces)
        ));

        let phase = Phase::ReplaceAll;
        self.within(
            self.options.timeouts.job_deploy,
            phase,
            "Replace job specifications process took too long, timing out",
            async {
                let mut stream = self
                    .jobs
                    .replace_all_job_specifications()
                    .await
                    .map_err(|e| Error::from_rpc(e, phase))?;

                let total = self.send_job_batches(&mut stream, namespaces, phase).await?;
                stream.close_send();
                if total == 0 {
                    self.printer.warn(NO_JOBS_WARNING);
                    return Ok(());
                }
                self.drain(&mut stream, phase, |_| {}).await
            },
        )
        .await?;

        self.printer.info("> replace all job specifications finished!");
        Ok(())
    }
}
