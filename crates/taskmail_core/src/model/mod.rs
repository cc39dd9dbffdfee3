mod task;

pub use task::{MAX_DESCRIPTION_CHARS, NewTask, Task, TaskFilter, TaskPatch, Threshold};
