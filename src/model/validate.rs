//! Local checks run by `job validate --local`. The codec never calls these.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;

use super::job::{DependencyType, JobSpec};
use super::resource::ResourceSpec;
use crate::error::{Error, Result};

const JOB_NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.\-]+$";
const JOB_NAME_MAX: usize = 220;
const RESOURCE_NAME_MAX: usize = 1024;
const NAME_MIN: usize = 3;

/// Allowed `task.window.truncate_to` values; empty leaves it to the server
pub const TRUNCATE_TO: [&str; 4] = ["h", "d", "w", "M"];

const CRON_DESCRIPTORS: [&str; 7] = [
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

fn check_date(field: &str, value: &str, problems: &mut Vec<String>) {
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        problems.push(format!("{} [{}] is not a YYYY-MM-DD date", field, value));
    }
}

/// Standard five-field cron or one of the `@` descriptors
fn is_cron(interval: &str, field_re: &Regex) -> bool {
    let interval = interval.trim();
    if let Some(every) = interval.strip_prefix("@every ") {
        return every.trim().parse::<super::SpecDuration>().is_ok();
    }
    if interval.starts_with('@') {
        return CRON_DESCRIPTORS.contains(&interval);
    }
    let fields: Vec<&str> = interval.split_whitespace().collect();
    fields.len() == 5 && fields.iter().all(|f| field_re.is_match(f))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidArgument(e.to_string()))
}

impl JobSpec {
    /// Check the shape of an already merged spec, collecting every problem found.
    pub fn validate(&self) -> Result<()> {
        let name_re = compile(JOB_NAME_PATTERN)?;
        let cron_field_re = compile(r"^[0-9A-Za-z*?/,\-LW#]+$")?;
        let mut problems = Vec::new();

        if self.version < 1 {
            problems.push(format!("version {} must be at least 1", self.version));
        }
        let len = self.name.chars().count();
        if !(NAME_MIN..=JOB_NAME_MAX).contains(&len) || !name_re.is_match(&self.name) {
            problems.push(format!(
                "name must be {}-{} characters of [A-Za-z0-9_.-], starting alphanumeric",
                NAME_MIN, JOB_NAME_MAX
            ));
        }
        if self.owner.trim().is_empty() {
            problems.push("owner is required".to_string());
        }

        if self.schedule.start_date.is_empty() {
            problems.push("schedule.start_date is required".to_string());
        } else {
            check_date("schedule.start_date", &self.schedule.start_date, &mut problems);
        }
        if !self.schedule.end_date.is_empty() {
            check_date("schedule.end_date", &self.schedule.end_date, &mut problems);
        }
        if !self.schedule.interval.is_empty() && !is_cron(&self.schedule.interval, &cron_field_re)
        {
            problems.push(format!(
                "schedule.interval [{}] is not a cron expression",
                self.schedule.interval
            ));
        }

        let truncate_to = self.task.window.truncate_to.as_str();
        if !truncate_to.is_empty() && !TRUNCATE_TO.contains(&truncate_to) {
            problems.push(format!(
                "task.window.truncate_to [{}] must be one of {}",
                truncate_to,
                TRUNCATE_TO.join(", ")
            ));
        }

        let mut seen = HashSet::new();
        for hook in &self.hooks {
            if !seen.insert(hook.name.as_str()) {
                problems.push(format!("hook [{}] is declared more than once", hook.name));
            }
        }

        for (i, dependency) in self.dependencies.iter().enumerate() {
            match (dependency.job.is_empty(), dependency.http.is_some()) {
                (false, false) => {
                    if !dependency.dependency_type.is_empty()
                        && DependencyType::parse(&dependency.dependency_type).is_none()
                    {
                        problems.push(format!(
                            "dependencies[{}] has unknown type [{}]",
                            i, dependency.dependency_type
                        ));
                    }
                }
                (true, true) => {}
                _ => problems.push(format!(
                    "dependencies[{}] must set exactly one of job or http",
                    i
                )),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidSpec {
                name: self.name.clone(),
                problems,
            })
        }
    }
}

impl ResourceSpec {
    /// Name must be printable, free of `/`, and 3-1024 characters long
    pub fn validate(&self) -> Result<()> {
        let len = self.name.chars().count();
        let mut problems = Vec::new();
        if !(NAME_MIN..=RESOURCE_NAME_MAX).contains(&len) {
            problems.push(format!(
                "name must be {}-{} characters long",
                NAME_MIN, RESOURCE_NAME_MAX
            ));
        }
        if self.name.contains('/') || self.name.chars().any(char::is_control) {
            problems.push("name must be printable and must not contain '/'".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidSpec {
                name: self.name.clone(),
                problems,
            })
        }
    }
}
