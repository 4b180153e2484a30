use super::SubsystemError;
use chrono::{DateTime, Utc};
use flowgate_props::Props;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub const MAX_CONCURRENT_KEY: &str = "executor.max.concurrent";
pub const DEFAULT_MAX_CONCURRENT: i64 = 10;

/// Snapshot of executor activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    pub submitted: u64,
    pub running: usize,
    pub finished: u64,
    pub max_concurrent: usize,
    pub last_submitted: Option<DateTime<Utc>>,
}

/// Execution engine subsystem.
pub trait ExecutorManager: Send + Sync {
    /// Submit a flow of a project. Returns the execution id.
    fn submit(&self, project: &str, flow: &str) -> Result<u64, SubsystemError>;

    /// Mark an execution as finished.
    fn finish(&self, execution_id: u64) -> Result<(), SubsystemError>;

    /// `(project, flow)` of every running execution, by id.
    fn running(&self) -> BTreeMap<u64, (String, String)>;

    fn stats(&self) -> ExecutorStats;

    fn shutdown(&self) -> Result<(), SubsystemError>;
}

/// Executor tracking executions in process.
pub struct LocalExecutorManager {
    max_concurrent: usize,
    next_id: AtomicU64,
    finished: AtomicU64,
    running: Mutex<BTreeMap<u64, (String, String)>>,
    last_submitted: Mutex<Option<DateTime<Utc>>>,
    shut_down: AtomicBool,
}

impl LocalExecutorManager {
    pub fn from_props(props: &Props) -> Result<Self, SubsystemError> {
        let max_concurrent = props.get_int_or(MAX_CONCURRENT_KEY, DEFAULT_MAX_CONCURRENT)?;
        if max_concurrent < 1 {
            return Err(SubsystemError::Invalid(format!(
                "{} must be positive, got {}",
                MAX_CONCURRENT_KEY, max_concurrent
            )));
        }

        Ok(Self {
            max_concurrent: max_concurrent as usize,
            next_id: AtomicU64::new(1),
            finished: AtomicU64::new(0),
            running: Mutex::new(BTreeMap::new()),
            last_submitted: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl ExecutorManager for LocalExecutorManager {
    fn submit(&self, project: &str, flow: &str) -> Result<u64, SubsystemError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SubsystemError::ShutDown("executor"));
        }

        let mut running = self.running.lock();
        if running.len() >= self.max_concurrent {
            return Err(SubsystemError::Invalid(format!(
                "Executor is full ({} running)",
                running.len()
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        running.insert(id, (project.to_string(), flow.to_string()));
        *self.last_submitted.lock() = Some(Utc::now());
        tracing::debug!("Execution {} submitted for {}.{}", id, project, flow);
        Ok(id)
    }

    fn finish(&self, execution_id: u64) -> Result<(), SubsystemError> {
        match self.running.lock().remove(&execution_id) {
            Some(_) => {
                self.finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(SubsystemError::Invalid(format!(
                "Execution {} is not running",
                execution_id
            ))),
        }
    }

    fn running(&self) -> BTreeMap<u64, (String, String)> {
        self.running.lock().clone()
    }

    fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            submitted: self.next_id.load(Ordering::SeqCst) - 1,
            running: self.running.lock().len(),
            finished: self.finished.load(Ordering::SeqCst),
            max_concurrent: self.max_concurrent,
            last_submitted: *self.last_submitted.lock(),
        }
    }

    fn shutdown(&self) -> Result<(), SubsystemError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let abandoned = std::mem::take(&mut *self.running.lock());
        if !abandoned.is_empty() {
            tracing::warn!("Executor shut down with {} running executions", abandoned.len());
        }
        Ok(())
    }
}
