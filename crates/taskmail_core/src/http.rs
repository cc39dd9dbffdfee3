//! JSON-over-HTTP surface for the task collection.
//!
//! | method   | path          | success             |
//! |----------|---------------|---------------------|
//! | `GET`    | `/tasks`      | 200, all tasks      |
//! | `POST`   | `/tasks`      | 201, created task   |
//! | `GET`    | `/tasks/{id}` | 200, one task       |
//! | `PUT`    | `/tasks/{id}` | 200, updated task   |
//! | `DELETE` | `/tasks/{id}` | 200, confirmation   |
//! | `GET`    | `/health`     | 200                 |
//!
//! Errors are `{"error": "...", "code": "..."}` with 400 for validation,
//! 404 for unknown ids and 500 otherwise.

use crate::error::AppError;
use crate::model::Task;
use crate::storage::TaskStore;
use crate::task_api::{self, CreateTaskRequest, UpdateTaskRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    store: Arc<dyn TaskStore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_)
            | AppError::Delivery(_)
            | AppError::Config(_)
            | AppError::Client(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorBody {
            error: self.message().to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(store: Arc<dyn TaskStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .layer(CorsLayer::permissive())
        .with_state(AppState { store })
}

/// Serves the API on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    store: Arc<dyn TaskStore>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::io(format!("failed to get local addr: {err}")))?;
    info!("task API listening on http://{addr}");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|err| AppError::io(format!("task API server error: {err}")))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// Runs a store call on the blocking pool; the store locks a mutex and
/// rewrites its file on every mutation.
async fn with_store<T, F>(state: &AppState, call: F) -> Result<T, AppError>
where
    F: FnOnce(&dyn TaskStore) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || call(store.as_ref()))
        .await
        .map_err(|err| AppError::store(format!("store task failed: {err}")))?
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, AppError> {
    with_store(&state, |store| task_api::list_tasks(store))
        .await
        .map(Json)
}

async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let request = json_body(payload)?;
    let task = with_store(&state, move |store| task_api::create_task(store, request)).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    with_store(&state, move |store| task_api::get_task(store, &id))
        .await
        .map(Json)
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let request = json_body(payload)?;
    with_store(&state, move |store| task_api::update_task(store, &id, request))
        .await
        .map(Json)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let task = with_store(&state, move |store| task_api::delete_task(store, &id)).await?;
    Ok(Json(DeleteResponse {
        message: "Task deleted successfully".to_string(),
        id: task.id,
    }))
}
