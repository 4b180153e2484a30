use super::{ExecutorManager, SubsystemError};
use flowgate_props::Props;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const CHECK_INTERVAL_KEY: &str = "sla.check.interval.ms";
pub const DEFAULT_CHECK_INTERVAL_MS: i64 = 60_000;

/// Snapshot of the SLA monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaStats {
    pub rules: usize,
    pub check_interval_ms: u64,
    /// Running executions covered by a rule at the last check.
    pub watched: usize,
}

/// SLA monitoring subsystem.
pub trait SlaManager: Send + Sync {
    /// Watch every execution of `project`/`flow`.
    fn add_rule(&self, project: &str, flow: &str) -> Result<(), SubsystemError>;

    /// Re-evaluate the rules against the executor. Returns the number of
    /// running executions covered by a rule.
    fn check(&self) -> Result<usize, SubsystemError>;

    fn stats(&self) -> SlaStats;

    fn shutdown(&self) -> Result<(), SubsystemError>;
}

pub struct BasicSlaManager {
    executor: Arc<dyn ExecutorManager>,
    check_interval_ms: u64,
    rules: Mutex<Vec<(String, String)>>,
    watched: Mutex<usize>,
    shut_down: AtomicBool,
}

impl BasicSlaManager {
    pub fn from_props(
        props: &Props,
        executor: Arc<dyn ExecutorManager>,
    ) -> Result<Self, SubsystemError> {
        let interval = props.get_int_or(CHECK_INTERVAL_KEY, DEFAULT_CHECK_INTERVAL_MS)?;
        if interval <= 0 {
            return Err(SubsystemError::Invalid(format!(
                "{} must be positive, got {}",
                CHECK_INTERVAL_KEY, interval
            )));
        }

        Ok(Self {
            executor,
            check_interval_ms: interval as u64,
            rules: Mutex::new(Vec::new()),
            watched: Mutex::new(0),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl SlaManager for BasicSlaManager {
    fn add_rule(&self, project: &str, flow: &str) -> Result<(), SubsystemError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SubsystemError::ShutDown("SLA manager"));
        }
        let mut rules = self.rules.lock();
        let rule = (project.to_string(), flow.to_string());
        if !rules.contains(&rule) {
            rules.push(rule);
        }
        Ok(())
    }

    fn check(&self) -> Result<usize, SubsystemError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SubsystemError::ShutDown("SLA manager"));
        }
        let rules = self.rules.lock();
        let watched = self
            .executor
            .running()
            .values()
            .filter(|execution| rules.contains(execution))
            .count();
        *self.watched.lock() = watched;
        Ok(watched)
    }

    fn stats(&self) -> SlaStats {
        SlaStats {
            rules: self.rules.lock().len(),
            check_interval_ms: self.check_interval_ms,
            watched: *self.watched.lock(),
        }
    }

    fn shutdown(&self) -> Result<(), SubsystemError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}
