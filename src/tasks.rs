//! Operations on the task tree of a list.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::core::task::{Task, check_integrity};
use crate::core::{ListId, TaskId, validate_name};
use crate::error::ClientError;
use crate::http::{Gateway, paths};
use crate::notify::Notification;
use crate::refresh::RefreshSignal;

#[derive(Deserialize)]
struct TasksReply {
    #[serde(default)]
    tasks: Vec<Task>,
}

/// Obtained from [`Session::tasks`](crate::session::Session::tasks).
///
/// Like [`ListManager`](crate::lists::ListManager), mutations only talk to the
/// server and bump the refresh signal; the tree is re-fetched afterwards.
#[derive(Clone)]
pub struct TaskManager {
    gateway: Gateway,
    refresh: RefreshSignal,
}

impl TaskManager {
    pub fn new(gateway: Gateway, refresh: RefreshSignal) -> Self {
        Self { gateway, refresh }
    }

    /// Root tasks of a list with their subtasks nested, as assembled by the server.
    pub async fn get_tasks(&self, list_id: ListId) -> Result<Vec<Task>, ClientError> {
        let reply: TasksReply = self
            .gateway
            .fetch(Method::GET, &paths::get_tasks(list_id), None)
            .await?;

        for issue in check_integrity(list_id, &reply.tasks) {
            log::warn!("List {} tree is inconsistent: {:?}", list_id, issue);
        }
        Ok(reply.tasks)
    }

    pub async fn add_task(&self, list_id: ListId, name: &str) -> Result<(), ClientError> {
        let name = validate_name("Task", name)?;
        self.gateway
            .send(Method::POST, &paths::add_task(list_id), Some(json!({ "name": name })))
            .await?;
        log::info!("Added task {:?} to list {}", name, list_id);
        self.mutated("Task added successfully!");
        Ok(())
    }

    /// Add a task under `parent_id`. The server refuses parents outside `list_id`.
    pub async fn add_subtask(
        &self,
        parent_id: TaskId,
        list_id: ListId,
        name: &str,
    ) -> Result<(), ClientError> {
        let name = validate_name("Subtask", name)?;
        let body = json!({ "name": name, "parent_id": parent_id, "list_id": list_id });
        self.gateway
            .send(Method::POST, paths::ADD_SUBTASK, Some(body))
            .await?;
        log::info!("Added subtask {:?} under task {}", name, parent_id);
        self.mutated("Subtask added successfully!");
        Ok(())
    }

    /// Replace the name and completion flag.
    pub async fn edit_task(&self, id: TaskId, name: &str, completed: bool) -> Result<(), ClientError> {
        let name = validate_name("Task", name)?;
        self.gateway
            .send(
                Method::PUT,
                &paths::edit_task(id),
                Some(json!({ "name": name, "completed": completed })),
            )
            .await?;
        log::info!("Edited task {}", id);
        self.mutated("Task updated successfully!");
        Ok(())
    }

    /// Flip the completion flag on the server, leaving everything else alone.
    pub async fn toggle_completion(&self, id: TaskId) -> Result<(), ClientError> {
        self.gateway
            .send(Method::PUT, &paths::toggle_task(id), None)
            .await?;
        log::debug!("Toggled task {}", id);
        self.refresh.bump();
        Ok(())
    }

    /// Move a task to another list. Parent links are left for the server to decide.
    pub async fn move_task(&self, id: TaskId, new_list_id: ListId) -> Result<(), ClientError> {
        self.gateway
            .send(
                Method::PUT,
                &paths::move_task(id),
                Some(json!({ "new_list_id": new_list_id })),
            )
            .await?;
        log::info!("Moved task {} to list {}", id, new_list_id);
        self.mutated("Task moved successfully!");
        Ok(())
    }

    /// Delete a task. The server removes its subtasks with it.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), ClientError> {
        self.gateway
            .send(Method::DELETE, &paths::delete_task(id), None)
            .await?;
        log::info!("Deleted task {}", id);
        self.mutated("Task deleted successfully!");
        Ok(())
    }

    fn mutated(&self, message: &str) {
        self.gateway.notify(Notification::success(message));
        self.refresh.bump();
    }
}
