//! Recurring driver for [`ReminderSweep`].
//!
//! The scheduler owns the timer; the sweep itself stays a plain synchronous
//! call so tests can run a single pass with a fixed clock. Passes run on the
//! blocking pool because the store and the SMTP transport block.

use crate::sweep::ReminderSweep;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct ReminderScheduler {
    sweep: ReminderSweep,
    period: Duration,
    cancel: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(sweep: ReminderSweep, period: Duration, cancel: CancellationToken) -> Self {
        Self {
            sweep,
            period,
            cancel,
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Sweeps once immediately, then every `period`, until cancelled. A pass
    /// that is already running when the token fires is allowed to finish.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = self.period.as_secs(), "reminder scheduler started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("reminder scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    run_pass(self.sweep.clone()).await;
                }
            }
        }
    }
}

async fn run_pass(sweep: ReminderSweep) {
    let outcome =
        tokio::task::spawn_blocking(move || sweep.run_once(OffsetDateTime::now_utc())).await;

    match outcome {
        Ok(Ok(report)) if !report.failures.is_empty() => {
            warn!(
                failures = report.failures.len(),
                "reminder sweep left work for the next pass"
            );
        }
        Ok(Ok(_)) => {}
        Ok(Err(err)) => error!(error = %err, "reminder sweep failed"),
        Err(err) => error!(error = %err, "reminder sweep task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::ReminderScheduler;
    use crate::error::AppError;
    use crate::model::NewTask;
    use crate::notify::Notifier;
    use crate::storage::{JsonTaskStore, TaskStore};
    use crate::sweep::ReminderSweep;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use time::OffsetDateTime;
    use tokio_util::sync::CancellationToken;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskmail-{nanos}-{file_name}"))
    }

    #[derive(Default)]
    struct CountingNotifier {
        sends: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn send(&self, _recipient: &str, _subject: &str, _body: &str) -> Result<(), AppError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_tick_sweeps_immediately_and_latches() {
        let path = temp_path("scheduler-tick.json");
        let store = Arc::new(JsonTaskStore::open(&path).unwrap());
        let task = store
            .create(NewTask {
                text: "soon".to_string(),
                description: None,
                deadline: Some(OffsetDateTime::now_utc() + time::Duration::minutes(30)),
            })
            .unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let sweep = ReminderSweep::new(store.clone(), notifier.clone(), "me@example.com");
        let cancel = CancellationToken::new();

        let handle =
            ReminderScheduler::new(sweep, Duration::from_millis(20), cancel.clone()).spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(2), handle).await;
        let stored = store.get(&task.id).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(finished.is_ok(), "scheduler should stop after cancel");
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 2);
        assert!(stored.reminder_sent && stored.alert_sent);
    }

    #[tokio::test]
    async fn scheduler_stops_on_cancel() {
        let path = temp_path("scheduler-cancel.json");
        let store = Arc::new(JsonTaskStore::open(&path).unwrap());
        let sweep = ReminderSweep::new(store, Arc::new(CountingNotifier::default()), "me");
        let cancel = CancellationToken::new();

        let handle =
            ReminderScheduler::new(sweep, Duration::from_secs(3600), cancel.clone()).spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok(), "scheduler should finish after cancel");
    }
}
