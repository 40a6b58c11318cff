//! User-facing output of the deploy flows

use crate::wire::{Level, Log};

/// One successful send of a deploy phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendProgress {
    pub namespace: String,
    /// Datastore of a resource batch; empty for job batches
    pub datastore: String,
    /// Specs carried by this request
    pub sent: usize,
    /// Specs sent so far in the phase, this request included
    pub total: usize,
}

/// Sink for the lines a deploy run shows to the user
pub trait Printer: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Called after every request a phase managed to send
    fn progress(&self, _progress: &SendProgress) {}
}

/// Forwards every line to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrinter;

impl Printer for LogPrinter {
    fn debug(&self, message: &str) {
        log::debug!("{}", message);
    }

    fn info(&self, message: &str) {
        log::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
    }

    fn progress(&self, progress: &SendProgress) {
        if progress.datastore.is_empty() {
            log::debug!(
                "sent {} job specs of namespace [{}], {} so far",
                progress.sent,
                progress.namespace,
                progress.total
            );
        } else {
            log::debug!(
                "sent {} {} resource specs of namespace [{}], {} so far",
                progress.sent,
                progress.datastore,
                progress.namespace,
                progress.total
            );
        }
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Warning => "warning",
        Level::Error => "error",
        Level::Info | Level::Unspecified => "info",
    }
}

/// Print a server log record with its level preserved.
///
/// Without `verbose`, debug records are dropped; with it, every line is
/// prefixed by its level tag.
pub fn print_log_status(printer: &dyn Printer, log: &Log, verbose: bool) {
    let level = log.level();
    if level == Level::Debug && !verbose {
        return;
    }

    let line = if verbose {
        format!("[{}] {}", level_tag(level), log.message)
    } else {
        log.message.clone()
    };

    match level {
        Level::Debug => printer.debug(&line),
        Level::Warning => printer.warn(&line),
        Level::Error => printer.error(&line),
        Level::Info | Level::Unspecified => printer.info(&line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Lines {
        fn push(&self, level: &str, message: &str) {
            self.0.lock().unwrap().push(format!("{}: {}", level, message));
        }

        fn taken(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Printer for Lines {
        fn debug(&self, message: &str) {
            self.push("debug", message);
        }

        fn info(&self, message: &str) {
            self.push("info", message);
        }

        fn warn(&self, message: &str) {
            self.push("warn", message);
        }

        fn error(&self, message: &str) {
            self.push("error", message);
        }
    }

    #[test]
    fn test_levels_are_preserved() {
        let printer = Lines::default();
        print_log_status(&printer, &Log::new(Level::Info, "a"), false);
        print_log_status(&printer, &Log::new(Level::Warning, "b"), false);
        print_log_status(&printer, &Log::new(Level::Error, "c"), false);

        assert_eq!(printer.taken(), vec!["info: a", "warn: b", "error: c"]);
    }

    #[test]
    fn test_debug_only_when_verbose() {
        let printer = Lines::default();
        print_log_status(&printer, &Log::new(Level::Debug, "hidden"), false);
        assert!(printer.taken().is_empty());

        print_log_status(&printer, &Log::new(Level::Debug, "shown"), true);
        print_log_status(&printer, &Log::new(Level::Info, "tagged"), true);
        assert_eq!(
            printer.taken(),
            vec!["debug: [debug] shown", "info: [info] tagged"]
        );
    }

    #[test]
    fn test_progress_defaults_to_no_output() {
        let printer = Lines::default();
        printer.progress(&SendProgress {
            namespace: "ns".into(),
            datastore: String::new(),
            sent: 3,
            total: 3,
        });
        assert!(printer.taken().is_empty());
    }
}
