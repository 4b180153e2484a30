//! Management adapters for the subsystems.

use super::{ExecutorManager, ScheduleManager, SlaManager};
use flowgate_management::{AttributeValue, Managed};
use std::sync::Arc;

pub struct ExecutorManagement(pub Arc<dyn ExecutorManager>);

impl Managed for ExecutorManagement {
    fn kind(&self) -> &str {
        "flowgate.executor"
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        &[
            "NumRunningFlows",
            "NumSubmittedFlows",
            "NumFinishedFlows",
            "MaxConcurrentFlows",
            "LastSubmittedTime",
            "RunningFlows",
        ]
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let stats = self.0.stats();
        let value: AttributeValue = match name {
            "NumRunningFlows" => stats.running.into(),
            "NumSubmittedFlows" => AttributeValue::Int(stats.submitted as i64),
            "NumFinishedFlows" => AttributeValue::Int(stats.finished as i64),
            "MaxConcurrentFlows" => stats.max_concurrent.into(),
            "LastSubmittedTime" => stats.last_submitted.into(),
            "RunningFlows" => self
                .0
                .running()
                .iter()
                .map(|(id, (project, flow))| format!("{id}:{project}.{flow}"))
                .collect::<Vec<_>>()
                .into(),
            _ => return None,
        };
        Some(value)
    }
}

pub struct SlaManagement(pub Arc<dyn SlaManager>);

impl Managed for SlaManagement {
    fn kind(&self) -> &str {
        "flowgate.sla"
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        &["NumRules", "CheckIntervalMs", "NumWatchedFlows"]
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let stats = self.0.stats();
        match name {
            "NumRules" => Some(stats.rules.into()),
            "CheckIntervalMs" => Some(AttributeValue::Int(stats.check_interval_ms as i64)),
            "NumWatchedFlows" => Some(stats.watched.into()),
            _ => None,
        }
    }
}

pub struct ScheduleManagement(pub Arc<dyn ScheduleManager>);

impl Managed for ScheduleManagement {
    fn kind(&self) -> &str {
        "flowgate.scheduler"
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        &["NumSchedules", "NumTriggered", "NextScheduledTime"]
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let stats = self.0.stats();
        match name {
            "NumSchedules" => Some(stats.schedules.into()),
            "NumTriggered" => Some(AttributeValue::Int(stats.triggered as i64)),
            "NextScheduledTime" => Some(stats.next_run.into()),
            _ => None,
        }
    }
}
