use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Longest description accepted on create or update, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default)]
    pub alert_sent: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Task {
    pub fn is_sent(&self, threshold: Threshold) -> bool {
        match threshold {
            Threshold::Reminder => self.reminder_sent,
            Threshold::Alert => self.alert_sent,
        }
    }
}

/// Fields a caller supplies when creating a task; the store fills in the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub description: Option<String>,
    pub deadline: Option<OffsetDateTime>,
}

/// Partial update. `None` leaves a field untouched; `Some(None)` clears an
/// optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub deadline: Option<Option<OffsetDateTime>>,
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Pending => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

/// Time-to-deadline boundary that gates one notification per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// One day out; latched by `reminder_sent`.
    Reminder,
    /// Two hours out; latched by `alert_sent`.
    Alert,
}

impl Threshold {
    pub const ALL: [Threshold; 2] = [Threshold::Reminder, Threshold::Alert];

    pub fn lead_time(self) -> time::Duration {
        match self {
            Self::Reminder => time::Duration::hours(24),
            Self::Alert => time::Duration::hours(2),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Alert => "alert",
        }
    }
}
