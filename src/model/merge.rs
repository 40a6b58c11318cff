//! Directory inheritance: a child spec absorbs defaults from an ancestor `this.yaml`.
//!
//! Scalars keep the child's value unless it is zero. Maps and lists are
//! unioned, child entries first, so the parent can only add.

use std::collections::BTreeMap;

use super::job::{
    JobBehavior, JobMetadata, JobNotifier, JobSpec, MetadataAirflow, MetadataResource,
    ResourceQuantity,
};

fn merge_string(child: &mut String, parent: &str) {
    if child.is_empty() {
        *child = parent.to_string();
    }
}

fn merge_map(child: &mut BTreeMap<String, String>, parent: &BTreeMap<String, String>) {
    for (key, value) in parent {
        child
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

impl JobSpec {
    /// Merge `parent` into `self`. The parent is never modified.
    pub fn merge_from(&mut self, parent: &JobSpec) {
        if self.version == 0 {
            self.version = parent.version;
        }
        merge_string(&mut self.name, &parent.name);
        merge_string(&mut self.owner, &parent.owner);
        merge_string(&mut self.description, &parent.description);

        merge_string(&mut self.schedule.start_date, &parent.schedule.start_date);
        merge_string(&mut self.schedule.end_date, &parent.schedule.end_date);
        merge_string(&mut self.schedule.interval, &parent.schedule.interval);

        merge_behavior(&mut self.behavior, &parent.behavior);

        merge_string(&mut self.task.name, &parent.task.name);
        merge_map(&mut self.task.config, &parent.task.config);
        merge_string(&mut self.task.window.size, &parent.task.window.size);
        merge_string(&mut self.task.window.offset, &parent.task.window.offset);
        merge_string(
            &mut self.task.window.truncate_to,
            &parent.task.window.truncate_to,
        );

        merge_map(&mut self.labels, &parent.labels);

        for dependency in &parent.dependencies {
            if !self.dependencies.iter().any(|d| d.same_target(dependency)) {
                self.dependencies.push(dependency.clone());
            }
        }

        for parent_hook in &parent.hooks {
            match self.hooks.iter_mut().find(|h| h.name == parent_hook.name) {
                Some(hook) => merge_map(&mut hook.config, &parent_hook.config),
                None => self.hooks.push(parent_hook.clone()),
            }
        }

        if let Some(parent_metadata) = &parent.metadata {
            merge_metadata(
                self.metadata.get_or_insert_with(JobMetadata::default),
                parent_metadata,
            );
        }
    }
}

fn merge_behavior(child: &mut JobBehavior, parent: &JobBehavior) {
    // bools have no "unset" state: `true` anywhere on the path wins
    child.depends_on_past |= parent.depends_on_past;
    child.catch_up |= parent.catch_up;

    if let Some(parent_retry) = &parent.retry {
        let retry = child.retry.get_or_insert_with(Default::default);
        if retry.count == 0 {
            retry.count = parent_retry.count;
        }
        if retry.delay.is_zero() {
            retry.delay = parent_retry.delay;
        }
        retry.exponential_backoff |= parent_retry.exponential_backoff;
    }

    for parent_notifier in &parent.notify {
        match child.notify.iter_mut().find(|n| n.on == parent_notifier.on) {
            Some(notifier) => merge_notifier(notifier, parent_notifier),
            None => child.notify.push(parent_notifier.clone()),
        }
    }
}

fn merge_notifier(child: &mut JobNotifier, parent: &JobNotifier) {
    merge_map(&mut child.config, &parent.config);
    for channel in &parent.channels {
        if !child.channels.contains(channel) {
            child.channels.push(channel.clone());
        }
    }
}

fn merge_quantity(child: &mut Option<ResourceQuantity>, parent: &Option<ResourceQuantity>) {
    if let Some(parent) = parent {
        let child = child.get_or_insert_with(ResourceQuantity::default);
        merge_string(&mut child.cpu, &parent.cpu);
        merge_string(&mut child.memory, &parent.memory);
    }
}

fn merge_metadata(child: &mut JobMetadata, parent: &JobMetadata) {
    if let Some(parent_resource) = &parent.resource {
        let resource = child.resource.get_or_insert_with(MetadataResource::default);
        merge_quantity(&mut resource.request, &parent_resource.request);
        merge_quantity(&mut resource.limit, &parent_resource.limit);
    }
    if let Some(parent_airflow) = &parent.airflow {
        let airflow = child.airflow.get_or_insert_with(MetadataAirflow::default);
        merge_string(&mut airflow.pool, &parent_airflow.pool);
        merge_string(&mut airflow.queue, &parent_airflow.queue);
    }
}
