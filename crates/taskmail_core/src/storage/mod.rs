//! Durable task collection.
//!
//! [`TaskStore`] is the seam the HTTP handlers and the reminder sweep share.
//! Every operation touches a single record and is atomic on its own; there
//! are no multi-record transactions.

pub mod json_store;

use crate::error::AppError;
use crate::model::{MAX_DESCRIPTION_CHARS, NewTask, Task, TaskFilter, TaskPatch, Threshold};

pub use json_store::JsonTaskStore;

pub trait TaskStore: Send + Sync {
    /// Assigns a fresh id and defaults, then persists the task.
    fn create(&self, new_task: NewTask) -> Result<Task, AppError>;

    /// Tasks matching `filter`, in insertion order.
    fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, AppError>;

    fn get(&self, id: &str) -> Result<Task, AppError>;

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, AppError>;

    /// Hard delete. Returns the removed task.
    fn delete(&self, id: &str) -> Result<Task, AppError>;

    /// Latches the sent-flag for `threshold`. Never clears a flag.
    fn mark_sent(&self, id: &str, threshold: Threshold) -> Result<Task, AppError>;
}

pub(crate) fn normalize_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("id is required"));
    }
    Ok(trimmed)
}

pub(crate) fn normalize_text(text: &str) -> Result<String, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("text is required"));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions collapse to `None`.
pub(crate) fn normalize_description(
    description: Option<String>,
) -> Result<Option<String>, AppError> {
    let Some(description) = description else {
        return Ok(None);
    };
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::validation(format!(
            "description must be at most {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

pub(crate) fn new_task_id() -> String {
    format!("task-{}", uuid::Uuid::new_v4().simple())
}

pub(crate) fn task_not_found(id: &str) -> AppError {
    AppError::not_found(format!("task {id} not found"))
}
