//! Thin async client for the task API plus the terminal rendering used by
//! the client subcommands.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use taskmail_core::error::AppError;
use taskmail_core::http::{DeleteResponse, ErrorBody};
use taskmail_core::model::Task;
use taskmail_core::task_api::{CreateTaskRequest, UpdateTaskRequest};
use time::format_description::well_known::Rfc3339;
use tracing::debug;

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list(&self) -> Result<Vec<Task>, AppError> {
        let url = self.url("/tasks");
        debug!(%url, "listing tasks");
        let response = self.http.get(&url).send().await.map_err(request_failed(&url))?;
        decode(response).await
    }

    pub async fn get(&self, id: &str) -> Result<Task, AppError> {
        let url = self.url(&format!("/tasks/{id}"));
        let response = self.http.get(&url).send().await.map_err(request_failed(&url))?;
        decode(response).await
    }

    pub async fn create(&self, request: &CreateTaskRequest) -> Result<Task, AppError> {
        let url = self.url("/tasks");
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(request_failed(&url))?;
        decode(response).await
    }

    pub async fn update(&self, id: &str, request: &UpdateTaskRequest) -> Result<Task, AppError> {
        let url = self.url(&format!("/tasks/{id}"));
        let response = self
            .http
            .put(&url)
            .json(request)
            .send()
            .await
            .map_err(request_failed(&url))?;
        decode(response).await
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteResponse, AppError> {
        let url = self.url(&format!("/tasks/{id}"));
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(request_failed(&url))?;
        decode(response).await
    }

    /// Reads the task and writes it back with `completed` flipped.
    pub async fn toggle(&self, id: &str) -> Result<Task, AppError> {
        let current = self.get(id).await?;
        let request = UpdateTaskRequest {
            completed: Some(!current.completed),
            ..UpdateTaskRequest::default()
        };
        self.update(id, &request).await
    }

    /// Creates the task unless one with the same text already exists. The
    /// check runs against a fresh listing and is not atomic with the create.
    pub async fn add(&self, request: &CreateTaskRequest) -> Result<Task, AppError> {
        if let Some(text) = request.text.as_deref() {
            let existing = self.list().await?;
            if has_duplicate_text(&existing, text) {
                return Err(AppError::validation(format!(
                    "a task named '{}' already exists, try another name",
                    text.trim()
                )));
            }
        }
        self.create(request).await
    }
}

fn request_failed(url: &str) -> impl FnOnce(reqwest::Error) -> AppError + '_ {
    move |err| AppError::client(format!("failed to reach {url}: {err}"))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|err| AppError::client(format!("unexpected response body: {err}")));
    }

    let body = response.text().await.unwrap_or_default();
    Err(error_from_response(status, &body))
}

/// Rebuilds the server-side error from an `{"error","code"}` body, falling
/// back to a client error carrying the status line.
pub fn error_from_response(status: StatusCode, body: &str) -> AppError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error, code }) => match code.as_str() {
            "validation" => AppError::validation(error),
            "not_found" => AppError::not_found(error),
            _ => AppError::client(format!("server error ({status}): {error}")),
        },
        Err(_) => AppError::client(format!("server responded {status}")),
    }
}

pub fn has_duplicate_text(tasks: &[Task], text: &str) -> bool {
    let wanted = text.trim().to_lowercase();
    tasks
        .iter()
        .any(|task| task.text.trim().to_lowercase() == wanted)
}

/// Splits into `(completed, pending)`, keeping list order inside each group.
pub fn partition_by_completion(tasks: Vec<Task>) -> (Vec<Task>, Vec<Task>) {
    tasks.into_iter().partition(|task| task.completed)
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Task")]
    text: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        let deadline = task
            .deadline
            .and_then(|deadline| deadline.format(&Rfc3339).ok())
            .unwrap_or_else(|| "-".to_string());
        Self {
            id: task.id.clone(),
            text: task.text.clone(),
            deadline,
            description: task.description.clone().unwrap_or_default(),
        }
    }
}

pub fn render_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "(none)".to_string();
    }
    let mut table = Table::new(tasks.iter().map(TaskRow::from));
    table.with(Style::sharp());
    table.to_string()
}

/// Renders the two-section listing: completed tasks, then pending ones.
pub fn render_listing(tasks: Vec<Task>) -> String {
    let (completed, pending) = partition_by_completion(tasks);
    format!(
        "Completed tasks\n{}\n\nPending tasks\n{}",
        render_tasks(&completed),
        render_tasks(&pending)
    )
}

#[cfg(test)]
mod tests {
    use super::{
        error_from_response, has_duplicate_text, partition_by_completion, render_listing,
    };
    use reqwest::StatusCode;
    use taskmail_core::model::Task;
    use time::macros::datetime;

    fn task(id: &str, text: &str, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            description: None,
            completed,
            deadline: None,
            reminder_sent: false,
            alert_sent: false,
            created_at: datetime!(2030-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn duplicate_check_ignores_case_and_padding() {
        let tasks = vec![task("task-1", "Buy Milk", false)];

        assert!(has_duplicate_text(&tasks, "buy milk"));
        assert!(has_duplicate_text(&tasks, "  BUY MILK "));
        assert!(!has_duplicate_text(&tasks, "buy bread"));
    }

    #[test]
    fn partition_keeps_order_within_groups() {
        let tasks = vec![
            task("task-1", "a", true),
            task("task-2", "b", false),
            task("task-3", "c", true),
        ];

        let (completed, pending) = partition_by_completion(tasks);

        let completed_ids: Vec<&str> = completed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(completed_ids, vec!["task-1", "task-3"]);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "task-2");
    }

    #[test]
    fn listing_shows_both_sections() {
        let mut due = task("task-1", "file taxes", false);
        due.deadline = Some(datetime!(2030-04-15 17:00:00 UTC));
        let rendered = render_listing(vec![due, task("task-2", "done thing", true)]);

        let completed_at = rendered.find("Completed tasks").unwrap();
        let pending_at = rendered.find("Pending tasks").unwrap();
        assert!(completed_at < pending_at);
        assert!(rendered[completed_at..pending_at].contains("done thing"));
        assert!(rendered[pending_at..].contains("file taxes"));
        assert!(rendered[pending_at..].contains("2030-04-15T17:00:00Z"));
    }

    #[test]
    fn empty_sections_render_placeholder() {
        let rendered = render_listing(Vec::new());

        assert_eq!(rendered.matches("(none)").count(), 2);
    }

    #[test]
    fn error_body_codes_map_back_to_errors() {
        let not_found = error_from_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"task task-9 not found","code":"not_found"}"#,
        );
        let internal = error_from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"disk full","code":"store"}"#,
        );
        let opaque = error_from_response(StatusCode::BAD_GATEWAY, "<html>");

        assert_eq!(not_found.code(), "not_found");
        assert_eq!(not_found.message(), "task task-9 not found");
        assert_eq!(internal.code(), "client");
        assert!(internal.message().contains("disk full"));
        assert_eq!(opaque.code(), "client");
        assert!(opaque.message().contains("502"));
    }
}
