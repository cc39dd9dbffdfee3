use crate::error::AppError;
use crate::model::{NewTask, Task, TaskFilter, TaskPatch, Threshold};
use crate::storage::{
    TaskStore, new_task_id, normalize_description, normalize_id, normalize_text, task_not_found,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use tracing::debug;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    tasks: Vec<Task>,
}

pub fn load_tasks(path: &Path) -> Result<Vec<Task>, AppError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::store(format!("{}: {}", path.display(), err)))?;
    let stored: StoredTasks = serde_json::from_str(&content).map_err(|err| {
        AppError::store(format!("invalid task store {}: {}", path.display(), err))
    })?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::store(format!(
            "schema_version mismatch: expected {SCHEMA_VERSION}, found {}",
            stored.schema_version
        )));
    }

    Ok(stored.tasks)
}

pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| AppError::store(err.to_string()))?;
    }

    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        tasks: tasks.to_vec(),
    };
    let content =
        serde_json::to_string_pretty(&stored).map_err(|err| AppError::store(err.to_string()))?;
    std::fs::write(path, content)
        .map_err(|err| AppError::store(format!("{}: {}", path.display(), err)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|err| AppError::store(err.to_string()))?;
    }

    Ok(())
}

/// File-backed [`TaskStore`].
///
/// The document is read once at [`open`](Self::open) and cached. Every
/// mutation is applied to a copy, written through to disk, and only then
/// swapped into the cache, so a failed write leaves the store unchanged.
#[derive(Debug)]
pub struct JsonTaskStore {
    path: PathBuf,
    tasks: Mutex<Vec<Task>>,
}

impl JsonTaskStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let tasks = load_tasks(&path)?;
        debug!(path = %path.display(), count = tasks.len(), "task store opened");
        Ok(Self {
            path,
            tasks: Mutex::new(tasks),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Task>>, AppError> {
        self.tasks
            .lock()
            .map_err(|_| AppError::store("task store lock poisoned"))
    }

    /// Applies `change` to the task with `id` and persists the result.
    fn modify<F>(&self, id: &str, change: F) -> Result<Task, AppError>
    where
        F: FnOnce(&mut Task) -> Result<(), AppError>,
    {
        let trimmed_id = normalize_id(id)?;
        let mut guard = self.lock()?;
        let mut tasks = guard.clone();

        let task = tasks
            .iter_mut()
            .find(|task| task.id == trimmed_id)
            .ok_or_else(|| task_not_found(trimmed_id))?;
        change(task)?;
        let updated = task.clone();

        save_tasks(&self.path, &tasks)?;
        *guard = tasks;
        Ok(updated)
    }
}

impl TaskStore for JsonTaskStore {
    fn create(&self, new_task: NewTask) -> Result<Task, AppError> {
        let task = Task {
            id: new_task_id(),
            text: normalize_text(&new_task.text)?,
            description: normalize_description(new_task.description)?,
            completed: false,
            deadline: new_task.deadline,
            reminder_sent: false,
            alert_sent: false,
            created_at: OffsetDateTime::now_utc(),
        };

        let mut guard = self.lock()?;
        let mut tasks = guard.clone();
        tasks.push(task.clone());
        save_tasks(&self.path, &tasks)?;
        *guard = tasks;

        Ok(task)
    }

    fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, AppError> {
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    fn get(&self, id: &str) -> Result<Task, AppError> {
        let trimmed_id = normalize_id(id)?;
        let guard = self.lock()?;
        guard
            .iter()
            .find(|task| task.id == trimmed_id)
            .cloned()
            .ok_or_else(|| task_not_found(trimmed_id))
    }

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, AppError> {
        let text = patch.text.as_deref().map(normalize_text).transpose()?;
        let description = patch.description.map(normalize_description).transpose()?;

        self.modify(id, |task| {
            if let Some(text) = text {
                task.text = text;
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            if let Some(deadline) = patch.deadline {
                task.deadline = deadline;
            }
            if let Some(description) = description {
                task.description = description;
            }
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<Task, AppError> {
        let trimmed_id = normalize_id(id)?;
        let mut guard = self.lock()?;
        let mut tasks = guard.clone();

        let index = tasks
            .iter()
            .position(|task| task.id == trimmed_id)
            .ok_or_else(|| task_not_found(trimmed_id))?;
        let removed = tasks.remove(index);

        save_tasks(&self.path, &tasks)?;
        *guard = tasks;
        Ok(removed)
    }

    fn mark_sent(&self, id: &str, threshold: Threshold) -> Result<Task, AppError> {
        self.modify(id, |task| {
            match threshold {
                Threshold::Reminder => task.reminder_sent = true,
                Threshold::Alert => task.alert_sent = true,
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonTaskStore, SCHEMA_VERSION, load_tasks, save_tasks};
    use crate::model::{NewTask, Task, TaskFilter, TaskPatch, Threshold};
    use crate::storage::TaskStore;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::macros::datetime;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskmail-{nanos}-{file_name}"))
    }

    fn new_task(text: &str) -> NewTask {
        NewTask {
            text: text.to_string(),
            ..NewTask::default()
        }
    }

    fn sample_task() -> Task {
        Task {
            id: "task-1".to_string(),
            text: "demo".to_string(),
            description: Some("notes".to_string()),
            completed: false,
            deadline: Some(datetime!(2025-12-21 09:00 UTC)),
            reminder_sent: true,
            alert_sent: false,
            created_at: datetime!(2025-12-20 00:00 UTC),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path("tasks.json");
        let task = sample_task();

        save_tasks(&path, std::slice::from_ref(&task)).unwrap();
        let loaded = load_tasks(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, vec![task]);
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let path = temp_path("missing.json");
        let store = JsonTaskStore::open(&path).unwrap();

        assert!(store.list(TaskFilter::All).unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn accepts_documents_without_flags_or_description() {
        let path = temp_path("minimal.json");
        let content = "{\n  \"schema_version\": 1,\n  \"tasks\": [\n    {\n      \"id\": \"task-1\",\n      \"text\": \"demo\",\n      \"created_at\": \"2025-12-20T00:00:00Z\"\n    }\n  ]\n}";
        fs::write(&path, content).unwrap();

        let loaded = load_tasks(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description, None);
        assert_eq!(loaded[0].deadline, None);
        assert!(!loaded[0].completed);
        assert!(!loaded[0].reminder_sent);
        assert!(!loaded[0].alert_sent);
    }

    #[test]
    fn rejects_non_rfc3339_deadline() {
        let path = temp_path("bad-deadline.json");
        let content = "{\n  \"schema_version\": 1,\n  \"tasks\": [\n    {\n      \"id\": \"task-1\",\n      \"text\": \"demo\",\n      \"deadline\": \"tomorrow\",\n      \"created_at\": \"2025-12-20T00:00:00Z\"\n    }\n  ]\n}";
        fs::write(&path, content).unwrap();

        let err = JsonTaskStore::open(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "store");
    }

    #[test]
    fn schema_version_must_match() {
        let path = temp_path("bad-schema.json");
        let bad = format!(
            "{{\n  \"schema_version\": {},\n  \"tasks\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, bad).unwrap();

        let err = load_tasks(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "store");
    }

    #[test]
    fn create_assigns_defaults_and_persists() {
        let path = temp_path("create.json");
        let store = JsonTaskStore::open(&path).unwrap();

        let task = store
            .create(NewTask {
                text: "  write report ".to_string(),
                description: Some("quarterly".to_string()),
                deadline: Some(datetime!(2030-01-01 12:00 UTC)),
            })
            .unwrap();
        let reopened = JsonTaskStore::open(&path).unwrap();
        let loaded = reopened.get(&task.id).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(task.text, "write report");
        assert!(!task.completed);
        assert!(!task.reminder_sent);
        assert!(!task.alert_sent);
        assert_eq!(loaded, task);
    }

    #[test]
    fn create_rejects_blank_text() {
        let path = temp_path("blank.json");
        let store = JsonTaskStore::open(&path).unwrap();

        let err = store.create(new_task("   ")).unwrap_err();

        assert_eq!(err.code(), "validation");
        assert!(!path.exists());
    }

    #[test]
    fn ids_are_unique_and_stable() {
        let path = temp_path("ids.json");
        let store = JsonTaskStore::open(&path).unwrap();

        let created: Vec<Task> = (0..25)
            .map(|n| store.create(new_task(&format!("task {n}"))).unwrap())
            .collect();
        let ids: HashSet<&str> = created.iter().map(|task| task.id.as_str()).collect();
        let listed = store.list(TaskFilter::All).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(ids.len(), created.len());
        let listed_ids: Vec<&str> = listed.iter().map(|task| task.id.as_str()).collect();
        let created_ids: Vec<&str> = created.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(listed_ids, created_ids);
    }

    #[test]
    fn list_filters_by_completion() {
        let path = temp_path("filter.json");
        let store = JsonTaskStore::open(&path).unwrap();
        let open = store.create(new_task("open")).unwrap();
        let done = store.create(new_task("done")).unwrap();
        store
            .update(
                &done.id,
                TaskPatch {
                    completed: Some(true),
                    ..TaskPatch::default()
                },
            )
            .unwrap();

        let pending = store.list(TaskFilter::Pending).unwrap();
        let completed = store.list(TaskFilter::Completed).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open.id);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done.id);
    }

    #[test]
    fn update_toggles_completed_and_keeps_other_fields() {
        let path = temp_path("toggle.json");
        let store = JsonTaskStore::open(&path).unwrap();
        let task = store
            .create(NewTask {
                text: "demo".to_string(),
                description: Some("notes".to_string()),
                deadline: Some(datetime!(2030-01-01 12:00 UTC)),
            })
            .unwrap();
        store.mark_sent(&task.id, Threshold::Reminder).unwrap();

        let updated = store
            .update(
                &task.id,
                TaskPatch {
                    completed: Some(true),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        let reread = store.get(&task.id).unwrap();
        fs::remove_file(&path).ok();

        assert!(updated.completed);
        assert_eq!(reread, updated);
        assert_eq!(reread.text, task.text);
        assert_eq!(reread.description, task.description);
        assert_eq!(reread.deadline, task.deadline);
        assert!(reread.reminder_sent);
        assert!(!reread.alert_sent);
    }

    #[test]
    fn update_can_clear_deadline_and_description() {
        let path = temp_path("clear.json");
        let store = JsonTaskStore::open(&path).unwrap();
        let task = store
            .create(NewTask {
                text: "demo".to_string(),
                description: Some("notes".to_string()),
                deadline: Some(datetime!(2030-01-01 12:00 UTC)),
            })
            .unwrap();

        let updated = store
            .update(
                &task.id,
                TaskPatch {
                    deadline: Some(None),
                    description: Some(None),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(updated.deadline, None);
        assert_eq!(updated.description, None);
    }

    #[test]
    fn update_rejects_blank_text_without_writing() {
        let path = temp_path("blank-update.json");
        let store = JsonTaskStore::open(&path).unwrap();
        let task = store.create(new_task("demo")).unwrap();

        let err = store
            .update(
                &task.id,
                TaskPatch {
                    text: Some("  ".to_string()),
                    ..TaskPatch::default()
                },
            )
            .unwrap_err();
        let reread = store.get(&task.id).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "validation");
        assert_eq!(reread.text, "demo");
    }

    #[test]
    fn delete_then_get_or_update_is_not_found() {
        let path = temp_path("delete.json");
        let store = JsonTaskStore::open(&path).unwrap();
        let task = store.create(new_task("demo")).unwrap();

        let removed = store.delete(&task.id).unwrap();
        let get_err = store.get(&task.id).unwrap_err();
        let update_err = store.update(&task.id, TaskPatch::default()).unwrap_err();
        let delete_err = store.delete(&task.id).unwrap_err();
        let persisted = load_tasks(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(removed.id, task.id);
        assert_eq!(get_err.code(), "not_found");
        assert_eq!(update_err.code(), "not_found");
        assert_eq!(delete_err.code(), "not_found");
        assert!(persisted.is_empty());
    }

    #[test]
    fn mark_sent_latches_only_the_given_flag() {
        let path = temp_path("latch.json");
        let store = JsonTaskStore::open(&path).unwrap();
        let task = store.create(new_task("demo")).unwrap();

        let after_alert = store.mark_sent(&task.id, Threshold::Alert).unwrap();
        let after_again = store.mark_sent(&task.id, Threshold::Alert).unwrap();
        fs::remove_file(&path).ok();

        assert!(after_alert.alert_sent);
        assert!(!after_alert.reminder_sent);
        assert_eq!(after_again, after_alert);
    }

    #[test]
    fn mark_sent_on_missing_task_is_not_found() {
        let path = temp_path("latch-missing.json");
        let store = JsonTaskStore::open(&path).unwrap();

        let err = store.mark_sent("task-missing", Threshold::Reminder).unwrap_err();

        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let path = temp_path("unwritable.json");
        let store = JsonTaskStore::open(&path).unwrap();
        fs::create_dir_all(&path).unwrap();

        let err = store.create(new_task("demo")).unwrap_err();
        let listed = store.list(TaskFilter::All).unwrap();
        fs::remove_dir_all(&path).ok();

        assert_eq!(err.code(), "store");
        assert!(listed.is_empty());
    }
}
