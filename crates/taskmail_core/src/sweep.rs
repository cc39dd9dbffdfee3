//! Deadline reminder sweep.
//!
//! One pass over the incomplete tasks. Each task can cross two thresholds,
//! one day and two hours before its deadline, and each threshold produces at
//! most one message per task. The persisted sent-flags are the latch: a flag
//! is written right after a send that reported no error, so a failed send is
//! simply retried on the next pass.

use crate::error::AppError;
use crate::model::{Task, TaskFilter, Threshold};
use crate::notify::Notifier;
use crate::storage::TaskStore;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub subject: String,
    pub body: String,
}

impl ReminderMessage {
    pub fn for_task(task: &Task, threshold: Threshold) -> Self {
        let body = match threshold {
            Threshold::Reminder => format!("Reminder: Your task \"{}\" is due in 1 day!", task.text),
            Threshold::Alert => format!("Urgent: Your task \"{}\" is due in 2 hours!", task.text),
        };
        Self {
            subject: format!("Task Reminder: {}", task.text),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub task_id: String,
    pub threshold: Threshold,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub reminders_sent: usize,
    pub alerts_sent: usize,
    pub skipped_overdue: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn notifications_sent(&self) -> usize {
        self.reminders_sent + self.alerts_sent
    }

    fn record_sent(&mut self, threshold: Threshold) {
        match threshold {
            Threshold::Reminder => self.reminders_sent += 1,
            Threshold::Alert => self.alerts_sent += 1,
        }
    }
}

/// Which thresholds are due for `task` at `now`, ignoring ones already
/// latched. Completed, deadline-less and overdue tasks yield nothing.
pub fn due_thresholds(task: &Task, now: OffsetDateTime) -> Vec<Threshold> {
    if task.completed {
        return Vec::new();
    }
    let Some(deadline) = task.deadline else {
        return Vec::new();
    };
    if deadline <= now {
        return Vec::new();
    }

    Threshold::ALL
        .into_iter()
        .filter(|threshold| !task.is_sent(*threshold))
        .filter(|threshold| deadline <= now + threshold.lead_time())
        .collect()
}

#[derive(Clone)]
pub struct ReminderSweep {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    recipient: String,
}

impl ReminderSweep {
    pub fn new(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            recipient: recipient.into(),
        }
    }

    /// Runs one pass. Only a failure to fetch the task set aborts the pass;
    /// per-task failures are logged and collected in the report.
    pub fn run_once(&self, now: OffsetDateTime) -> Result<SweepReport, AppError> {
        let tasks = self.store.list(TaskFilter::Pending)?;
        let mut report = SweepReport {
            scanned: tasks.len(),
            ..SweepReport::default()
        };

        for task in &tasks {
            if task.deadline.is_some_and(|deadline| deadline <= now) {
                debug!(task_id = %task.id, "deadline passed, skipping");
                report.skipped_overdue += 1;
                continue;
            }

            for threshold in due_thresholds(task, now) {
                match self.notify(task, threshold) {
                    Ok(()) => report.record_sent(threshold),
                    Err(err) => {
                        warn!(
                            task_id = %task.id,
                            threshold = threshold.label(),
                            error = %err,
                            "reminder not delivered"
                        );
                        report.failures.push(SweepFailure {
                            task_id: task.id.clone(),
                            threshold,
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            scanned = report.scanned,
            reminders = report.reminders_sent,
            alerts = report.alerts_sent,
            failures = report.failures.len(),
            "reminder sweep finished"
        );
        Ok(report)
    }

    fn notify(&self, task: &Task, threshold: Threshold) -> Result<(), AppError> {
        let message = ReminderMessage::for_task(task, threshold);
        self.notifier
            .send(&self.recipient, &message.subject, &message.body)?;
        self.store.mark_sent(&task.id, threshold)?;
        debug!(task_id = %task.id, threshold = threshold.label(), "sent-flag latched");
        Ok(())
    }
}
