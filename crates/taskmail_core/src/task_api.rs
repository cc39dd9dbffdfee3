use crate::error::AppError;
use crate::model::{NewTask, Task, TaskFilter, TaskPatch};
use crate::storage::TaskStore;
use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::info;

/// Body of `POST /tasks`. `title` is accepted as an alias of `text`; a blank
/// deadline is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default, alias = "title")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `PUT /tasks/:id`. Absent fields are untouched; an explicit `null`
/// deadline or description clears it. A blank deadline string is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default, alias = "title", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn create_task(store: &dyn TaskStore, request: CreateTaskRequest) -> Result<Task, AppError> {
    let text = match request.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(AppError::validation("text is required")),
    };
    let deadline = request
        .deadline
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_deadline)
        .transpose()?;

    let task = store.create(NewTask {
        text,
        description: request.description,
        deadline,
    })?;
    info!(task_id = %task.id, "task created");
    Ok(task)
}

pub fn list_tasks(store: &dyn TaskStore) -> Result<Vec<Task>, AppError> {
    store.list(TaskFilter::All)
}

pub fn get_task(store: &dyn TaskStore, id: &str) -> Result<Task, AppError> {
    store.get(id)
}

pub fn update_task(
    store: &dyn TaskStore,
    id: &str,
    request: UpdateTaskRequest,
) -> Result<Task, AppError> {
    let deadline = match request.deadline {
        Some(Some(raw)) if raw.trim().is_empty() => None,
        Some(Some(raw)) => Some(Some(parse_deadline(&raw)?)),
        Some(None) => Some(None),
        None => None,
    };
    let patch = TaskPatch {
        text: request.text,
        completed: request.completed,
        deadline,
        description: request.description,
    };

    let task = store.update(id, patch)?;
    info!(task_id = %task.id, completed = task.completed, "task updated");
    Ok(task)
}

pub fn delete_task(store: &dyn TaskStore, id: &str) -> Result<Task, AppError> {
    let task = store.delete(id)?;
    info!(task_id = %task.id, "task deleted");
    Ok(task)
}

/// Parses a deadline as RFC 3339, or as a zone-less `YYYY-MM-DDTHH:MM[:SS]`
/// (what an HTML `datetime-local` input submits), which is read in the
/// server's local offset.
pub fn parse_deadline(raw: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("deadline must not be empty"));
    }

    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(parsed);
    }

    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let without_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    PrimitiveDateTime::parse(trimmed, with_seconds)
        .or_else(|_| PrimitiveDateTime::parse(trimmed, without_seconds))
        .map(|local| local.assume_offset(local_offset()))
        .map_err(|_| AppError::validation("deadline must be RFC3339"))
}

/// Falls back to UTC when the platform cannot report the offset safely.
fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}
