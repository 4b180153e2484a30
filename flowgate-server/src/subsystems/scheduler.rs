use super::{ExecutorManager, ProjectManager, SlaManager, SubsystemError};
use chrono::{DateTime, Duration, Utc};
use flowgate_props::Props;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Handles the scheduler is built on.
#[derive(Clone)]
pub struct ScheduleDeps {
    pub executor: Arc<dyn ExecutorManager>,
    pub projects: Arc<dyn ProjectManager>,
    pub sla: Arc<dyn SlaManager>,
}

/// A flow scheduled to run at `next_run`, optionally repeating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: u64,
    pub project: String,
    pub flow: String,
    pub next_run: DateTime<Utc>,
    pub period: Option<Duration>,
}

/// Snapshot of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleStats {
    pub schedules: usize,
    pub triggered: u64,
    pub next_run: Option<DateTime<Utc>>,
}

/// Scheduling subsystem.
pub trait ScheduleManager: Send + Sync {
    fn add_schedule(
        &self,
        project: &str,
        flow: &str,
        first_run: DateTime<Utc>,
        period: Option<Duration>,
    ) -> Result<u64, SubsystemError>;

    fn remove_schedule(&self, id: u64) -> bool;

    fn schedules(&self) -> Vec<Schedule>;

    /// Submit every schedule due at `now`. Returns the execution ids.
    ///
    /// A schedule the executor refuses stays due and is tried again on the
    /// next call; the others are advanced or, if one-shot, removed.
    fn trigger_due(&self, now: DateTime<Utc>) -> Result<Vec<u64>, SubsystemError>;

    fn stats(&self) -> ScheduleStats;

    fn shutdown(&self) -> Result<(), SubsystemError>;
}

pub struct BasicScheduleManager {
    deps: ScheduleDeps,
    schedules: Mutex<Vec<Schedule>>,
    next_id: AtomicU64,
    triggered: AtomicU64,
    shut_down: AtomicBool,
}

impl BasicScheduleManager {
    pub fn from_props(_props: &Props, deps: ScheduleDeps) -> Result<Self, SubsystemError> {
        Ok(Self {
            deps,
            schedules: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            triggered: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    fn ensure_running(&self) -> Result<(), SubsystemError> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(SubsystemError::ShutDown("scheduler"))
        } else {
            Ok(())
        }
    }
}

impl ScheduleManager for BasicScheduleManager {
    fn add_schedule(
        &self,
        project: &str,
        flow: &str,
        first_run: DateTime<Utc>,
        period: Option<Duration>,
    ) -> Result<u64, SubsystemError> {
        self.ensure_running()?;
        if !self.deps.projects.contains(project) {
            let message = format!("Unknown project '{}'", project);
            return Err(SubsystemError::Invalid(message));
        }
        if period.is_some_and(|p| p <= Duration::zero()) {
            let message = "Schedule period must be positive".to_string();
            return Err(SubsystemError::Invalid(message));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.schedules.lock().push(Schedule {
            id,
            project: project.to_string(),
            flow: flow.to_string(),
            next_run: first_run,
            period,
        });
        self.deps.sla.add_rule(project, flow)?;
        Ok(id)
    }

    fn remove_schedule(&self, id: u64) -> bool {
        let mut schedules = self.schedules.lock();
        let before = schedules.len();
        schedules.retain(|s| s.id != id);
        schedules.len() != before
    }

    fn schedules(&self) -> Vec<Schedule> {
        self.schedules.lock().clone()
    }

    fn trigger_due(&self, now: DateTime<Utc>) -> Result<Vec<u64>, SubsystemError> {
        self.ensure_running()?;
        let mut submitted = Vec::new();
        let mut completed = Vec::new();
        let mut schedules = self.schedules.lock();

        for schedule in schedules.iter_mut().filter(|s| s.next_run <= now) {
            let execution = match self.deps.executor.submit(&schedule.project, &schedule.flow) {
                Ok(execution) => execution,
                Err(e) => {
                    warn!(
                        "Schedule {} ({}.{}) not submitted, retrying later: {}",
                        schedule.id, schedule.project, schedule.flow, e
                    );
                    continue;
                }
            };

            submitted.push(execution);
            match schedule.period {
                Some(period) => {
                    while schedule.next_run <= now {
                        schedule.next_run = schedule.next_run + period;
                    }
                }
                None => completed.push(schedule.id),
            }
        }
        schedules.retain(|s| !completed.contains(&s.id));

        self.triggered.fetch_add(submitted.len() as u64, Ordering::SeqCst);
        Ok(submitted)
    }

    fn stats(&self) -> ScheduleStats {
        let schedules = self.schedules.lock();
        ScheduleStats {
            schedules: schedules.len(),
            triggered: self.triggered.load(Ordering::SeqCst),
            next_run: schedules.iter().map(|s| s.next_run).min(),
        }
    }

    fn shutdown(&self) -> Result<(), SubsystemError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}
