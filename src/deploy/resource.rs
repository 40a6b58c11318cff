//! Resource phase

use std::sync::Arc;

use super::{namespace_names, Deployer, SendProgress};
use crate::config::{DatastoreConfig, NamespaceConfig};
use crate::error::{Error, Phase, Result};
use crate::specio::{ResourceSpecReadWriter, SpecReadWriter};
use crate::wire::{DeployResourceSpecificationRequest, ResourceSpecification};

impl Deployer {
    /// Resource specs of one datastore in wire form.
    ///
    /// Fails with `NoResources` when the datastore directory is missing.
    pub(crate) fn datastore_resources(
        &self,
        namespace: &NamespaceConfig,
        datastore: &DatastoreConfig,
    ) -> Result<Vec<ResourceSpecification>> {
        let root = self.config.resolve(&datastore.path);
        if datastore.path.as_os_str().is_empty() || !self.fs.is_dir(&root) {
            return Err(Error::NoResources {
                namespace: namespace.name.clone(),
                datastore: datastore.datastore_type.clone(),
            });
        }

        ResourceSpecReadWriter::new(Arc::clone(&self.fs))
            .read_all(&root)?
            .iter()
            .map(|spec| spec.to_wire())
            .collect()
    }

    /// Upload every resource of the selected namespaces over one stream
    pub async fn deploy_resources(&self, namespaces: &[&NamespaceConfig]) -> Result<()> {
        if self.options.ignore_resources {
            self.printer.warn("> Skipping resource deployment");
            return Ok(());
        }
        self.printer.info(&format!(
            "> Deploying all resources for namespaces [{}]",
            namespace_names(namespaces)
        ));

        let phase = Phase::ResourceDeploy;
        self.within(
            self.options.timeouts.resource_deploy,
            phase,
            "Deployment of resources took too long, timing out",
            async {
                let mut stream = self
                    .resources
                    .deploy_resource_specification()
                    .await
                    .map_err(|e| Error::from_rpc(e, phase))?;

                let mut total = 0;
                for namespace in namespaces {
                    for datastore in &namespace.datastore {
                        self.printer.info(&format!(
                            "> Deploying {} resources for namespace [{}]",
                            datastore.datastore_type, namespace.name
                        ));
                        let resources = match self.datastore_resources(namespace, datastore) {
                            Ok(resources) => resources,
                            Err(e) if e.is_empty_sentinel() => {
                                self.printer.warn(&format!(
                                    "no resource specifications are found for namespace [{}]",
                                    namespace.name
                                ));
                                continue;
                            }
                            Err(e) => return Err(e),
                        };
                        if resources.is_empty() {
                            continue;
                        }

                        let size = match self.options.batch_size {
                            0 => resources.len(),
                            n => n,
                        };
                        for chunk in resources.chunks(size) {
                            let request = DeployResourceSpecificationRequest {
                                project_name: self.project_name().to_string(),
                                datastore_name: datastore.datastore_type.clone(),
                                resources: chunk.to_vec(),
                                namespace_name: namespace.name.clone(),
                            };
                            stream
                                .send(request)
                                .await
                                .map_err(|e| Error::from_rpc(e, phase))?;
                            total += chunk.len();
                            self.printer.progress(&SendProgress {
                                namespace: namespace.name.clone(),
                                datastore: datastore.datastore_type.clone(),
                                sent: chunk.len(),
                                total,
                            });
                        }
                    }
                }
                stream.close_send();

                if total == 0 {
                    self.printer
                        .warn("no resource specs are found from all the namespaces");
                    return Ok(());
                }
                self.drain(&mut stream, phase, |_| {}).await
            },
        )
        .await
    }
}
