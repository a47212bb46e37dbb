//! An in-process stand-in for the task list server.
//!
//! Implements the same routes, status codes and reply bodies as the real
//! service, with one session shared by everything that sends through it
//! (the way a cookie jar is shared by one HTTP client).

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ApiRequest, ApiResponse, Transport};
use crate::core::{ListId, TaskId};
use crate::error::ClientError;

type Reply = (u16, Value);

#[derive(Debug, Clone)]
struct StoredUser {
    id: i64,
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Clone)]
struct StoredList {
    id: ListId,
    owner: i64,
    name: String,
}

#[derive(Debug, Clone)]
struct StoredTask {
    id: TaskId,
    list_id: ListId,
    parent_id: Option<TaskId>,
    name: String,
    completed: bool,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<StoredUser>,
    lists: Vec<StoredList>,
    tasks: Vec<StoredTask>,
    session: Option<i64>,
    requests: Vec<String>,
    fail_next: Option<Failure>,
}

#[derive(Debug)]
struct Failure {
    path: Option<String>,
    status: u16,
    message: String,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, without going through `/signup`.
    pub fn with_user(self, username: &str, email: &str, password: &str) -> Self {
        {
            let mut state = self.lock();
            let id = state.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
            state.users.push(StoredUser {
                id,
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            });
        }
        self
    }

    /// Insert a list with a fixed id for `owner`.
    pub fn seed_list(&self, owner: &str, id: ListId, name: &str) -> Result<(), String> {
        let mut state = self.lock();
        let owner_id = state
            .users
            .iter()
            .find(|u| u.username == owner)
            .map(|u| u.id)
            .ok_or_else(|| format!("No user named {}", owner))?;
        if state.lists.iter().any(|l| l.id == id) {
            return Err(format!("List {} already exists", id));
        }
        state.lists.push(StoredList {
            id,
            owner: owner_id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Insert a task with a fixed id.
    pub fn seed_task(
        &self,
        id: TaskId,
        list_id: ListId,
        parent_id: Option<TaskId>,
        name: &str,
    ) -> Result<(), String> {
        let mut state = self.lock();
        if !state.lists.iter().any(|l| l.id == list_id) {
            return Err(format!("No list {}", list_id));
        }
        if state.tasks.iter().any(|t| t.id == id) {
            return Err(format!("Task {} already exists", id));
        }
        if let Some(parent) = parent_id {
            if !state.tasks.iter().any(|t| t.id == parent) {
                return Err(format!("No parent task {}", parent));
            }
        }
        state.tasks.push(StoredTask {
            id,
            list_id,
            parent_id,
            name: name.to_string(),
            completed: false,
        });
        Ok(())
    }

    /// Make the next request fail with `status` and `message`, whatever it is.
    pub fn fail_next(&self, status: u16, message: &str) {
        self.lock().fail_next = Some(Failure {
            path: None,
            status,
            message: message.to_string(),
        });
    }

    /// Make the next request to exactly `path` fail. Other requests pass.
    pub fn fail_next_on(&self, path: &str, status: u16, message: &str) {
        self.lock().fail_next = Some(Failure {
            path: Some(path.to_string()),
            status,
            message: message.to_string(),
        });
    }

    /// Every request received so far, as `"METHOD /path"`.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Username holding the session, if any.
    pub fn session_user(&self) -> Option<String> {
        let state = self.lock();
        let id = state.session?;
        state.users.iter().find(|u| u.id == id).map(|u| u.username.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Transport for MemoryBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let mut state = self.lock();
        state.requests.push(format!("{} {}", request.method, request.path));

        let injected = state
            .fail_next
            .as_ref()
            .is_some_and(|f| f.path.as_deref().is_none_or(|p| p == request.path));
        if injected {
            if let Some(f) = state.fail_next.take() {
                return Ok(ApiResponse::new(f.status, json!({ "message": f.message })));
            }
        }

        let (status, body) = state.route(&request);
        Ok(ApiResponse::new(status, body))
    }
}

fn text<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Ids arrive as numbers from this client but as strings from HTML selects.
fn id_field(body: &Value, key: &str) -> Option<i64> {
    match body.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn message(status: u16, msg: &str) -> Reply {
    (status, json!({ "message": msg }))
}

fn error(status: u16, msg: &str) -> Reply {
    (status, json!({ "error": msg }))
}

impl State {
    fn route(&mut self, request: &ApiRequest) -> Reply {
        let body = request.body.clone().unwrap_or(Value::Null);
        let mut segments = request.path.trim_matches('/').split('/');
        let route = segments.next().unwrap_or("");
        let id = segments.next().and_then(|s| s.parse::<i64>().ok());
        let method = request.method.as_str();

        match (method, route) {
            ("POST", "signup") => return self.signup(&body),
            ("POST", "login") => return self.login(&body),
            _ => {}
        }

        let Some(uid) = self.session else {
            return message(401, "Unauthorized");
        };

        match (method, route, id) {
            ("POST", "logout", None) => {
                self.session = None;
                message(200, "Logged out successfully!")
            }
            ("GET", "current_user", None) => self.current_user(uid),
            ("GET", "GetLists", None) => self.get_lists(uid),
            ("POST", "Addlists", None) => self.add_list(uid, &body),
            ("PUT", "EditList", Some(id)) => self.edit_list(uid, id, &body),
            ("DELETE", "DeleteList", Some(id)) => self.delete_list(uid, id),
            ("GET", "GetListDetails", Some(id)) => self.list_details(uid, id),
            ("GET", "GetTasks", Some(id)) => self.get_tasks(uid, id),
            ("POST", "AddTask", Some(id)) => self.add_task(uid, id, &body),
            ("POST", "AddSubtasks", None) => self.add_subtask(uid, &body),
            ("PUT", "EditTask", Some(id)) => self.edit_task(uid, id, &body),
            ("PUT", "TaskCompleted", Some(id)) => self.toggle_task(uid, id),
            ("PUT", "moveTask", Some(id)) => self.move_task(uid, id, &body),
            ("DELETE", "DeleteTask", Some(id)) => self.delete_task(uid, id),
            _ => message(404, "Not Found"),
        }
    }

    fn signup(&mut self, body: &Value) -> Reply {
        let (Some(username), Some(email), Some(password), Some(_name)) = (
            text(body, "username"),
            text(body, "email"),
            text(body, "password"),
            text(body, "name"),
        ) else {
            return message(400, "All fields are required!");
        };
        if self.users.iter().any(|u| u.username == username) {
            return message(400, "Username already exists!");
        }
        if self.users.iter().any(|u| u.email == email) {
            return message(400, "Email already exists!");
        }
        let id = self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        self.users.push(StoredUser {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        });
        message(201, "New user created!")
    }

    fn login(&mut self, body: &Value) -> Reply {
        let (Some(login), Some(password)) = (text(body, "login"), text(body, "password")) else {
            return message(400, "Login and password are required!");
        };
        let user = self
            .users
            .iter()
            .find(|u| u.username == login)
            .or_else(|| self.users.iter().find(|u| u.email == login));
        let Some((id, username)) = user
            .filter(|u| u.password == password)
            .map(|u| (u.id, u.username.clone()))
        else {
            return message(400, "Username or password is incorrect!");
        };
        self.session = Some(id);
        (200, json!({ "message": "Logged in successfully!", "username": username }))
    }

    fn current_user(&self, uid: i64) -> Reply {
        match self.users.iter().find(|u| u.id == uid) {
            Some(u) => (200, json!({ "username": u.username, "email": u.email })),
            None => message(401, "Unauthorized"),
        }
    }

    fn owns_list(&self, uid: i64, list_id: ListId) -> bool {
        self.lists.iter().any(|l| l.id == list_id && l.owner == uid)
    }

    fn owned_task(&self, uid: i64, id: TaskId) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id && self.owns_list(uid, t.list_id))
    }

    fn next_list_id(&self) -> ListId {
        self.lists.iter().map(|l| l.id).max().unwrap_or(0) + 1
    }

    fn next_task_id(&self) -> TaskId {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// `id` and every task below it.
    fn subtree(&self, id: TaskId) -> Vec<TaskId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            out.extend(
                self.tasks
                    .iter()
                    .filter(|t| t.parent_id == Some(current))
                    .map(|t| t.id),
            );
            i += 1;
        }
        out
    }

    fn task_json(&self, task: &StoredTask, depth: u32) -> Value {
        let subtasks: Vec<Value> = self
            .tasks
            .iter()
            .filter(|c| c.parent_id == Some(task.id))
            .map(|c| self.task_json(c, depth + 1))
            .collect();
        json!({
            "id": task.id,
            "name": task.name,
            "parent_id": task.parent_id,
            "list_id": task.list_id,
            "depth": depth,
            "completed": task.completed,
            "subtasks": subtasks,
        })
    }

    fn roots(&self, list_id: ListId) -> Vec<Value> {
        self.tasks
            .iter()
            .filter(|t| t.list_id == list_id && t.parent_id.is_none())
            .map(|t| self.task_json(t, 0))
            .collect()
    }

    fn get_lists(&self, uid: i64) -> Reply {
        let lists: Vec<Value> = self
            .lists
            .iter()
            .filter(|l| l.owner == uid)
            .map(|l| json!({ "id": l.id, "name": l.name, "tasks": self.roots(l.id) }))
            .collect();
        (
            200,
            json!({ "message": "Successfully retrieved user's lists from the database.", "lists": lists }),
        )
    }

    fn add_list(&mut self, uid: i64, body: &Value) -> Reply {
        let Some(name) = text(body, "name") else {
            return message(400, "List name is required!");
        };
        let id = self.next_list_id();
        self.lists.push(StoredList {
            id,
            owner: uid,
            name: name.to_string(),
        });
        message(200, "List added successfully!")
    }

    fn edit_list(&mut self, uid: i64, id: ListId, body: &Value) -> Reply {
        let Some(name) = text(body, "name") else {
            return message(400, "New list name is required!");
        };
        match self.lists.iter_mut().find(|l| l.id == id && l.owner == uid) {
            Some(list) => {
                list.name = name.to_string();
                message(200, "List updated successfully!")
            }
            None => message(404, "List not found!"),
        }
    }

    fn delete_list(&mut self, uid: i64, id: ListId) -> Reply {
        if !self.owns_list(uid, id) {
            return message(404, "List not found!");
        }
        let doomed: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.list_id == id)
            .flat_map(|t| self.subtree(t.id))
            .collect();
        self.tasks.retain(|t| !doomed.contains(&t.id));
        self.lists.retain(|l| l.id != id);
        message(200, "List deleted successfully!")
    }

    fn list_details(&self, uid: i64, id: ListId) -> Reply {
        match self.lists.iter().find(|l| l.id == id && l.owner == uid) {
            Some(list) => (200, json!({ "listName": list.name })),
            None => error(404, "List not found or unauthorized access."),
        }
    }

    fn get_tasks(&self, uid: i64, list_id: ListId) -> Reply {
        if !self.owns_list(uid, list_id) {
            return error(404, "List not found or unauthorized access.");
        }
        (
            200,
            json!({
                "message": "Successfully retrieved all tasks from the database.",
                "tasks": self.roots(list_id),
            }),
        )
    }

    fn add_task(&mut self, uid: i64, list_id: ListId, body: &Value) -> Reply {
        let Some(name) = text(body, "name") else {
            return error(400, "Task name is required.");
        };
        if !self.owns_list(uid, list_id) {
            return error(404, "List not found or unauthorized access.");
        }
        let id = self.next_task_id();
        self.tasks.push(StoredTask {
            id,
            list_id,
            parent_id: None,
            name: name.to_string(),
            completed: false,
        });
        message(200, "Task added successfully!")
    }

    fn add_subtask(&mut self, uid: i64, body: &Value) -> Reply {
        let (Some(parent_id), Some(name), Some(list_id)) = (
            id_field(body, "parent_id"),
            text(body, "name"),
            id_field(body, "list_id"),
        ) else {
            return error(400, "parent_id, name, and list_id are required.");
        };
        let parent_ok = self
            .tasks
            .iter()
            .any(|t| t.id == parent_id && t.list_id == list_id)
            && self.owns_list(uid, list_id);
        if !parent_ok {
            return error(404, "Parent task not found or unauthorized access.");
        }
        let id = self.next_task_id();
        self.tasks.push(StoredTask {
            id,
            list_id,
            parent_id: Some(parent_id),
            name: name.to_string(),
            completed: false,
        });
        message(200, "Subtask added successfully!")
    }

    fn edit_task(&mut self, uid: i64, id: TaskId, body: &Value) -> Reply {
        let Some(idx) = self.owned_task(uid, id) else {
            return error(404, "Task not found or unauthorized access!");
        };
        let task = &mut self.tasks[idx];
        if let Some(name) = text(body, "name") {
            task.name = name.to_string();
        }
        if let Some(completed) = body.get("completed").and_then(Value::as_bool) {
            task.completed = completed;
        }
        message(200, "Task edited successfully!")
    }

    fn toggle_task(&mut self, uid: i64, id: TaskId) -> Reply {
        let Some(idx) = self.owned_task(uid, id) else {
            return error(404, "Task not found or unauthorized access!");
        };
        let task = &mut self.tasks[idx];
        task.completed = !task.completed;
        message(200, "Task completion status toggled successfully!")
    }

    fn move_task(&mut self, uid: i64, id: TaskId, body: &Value) -> Reply {
        let Some(new_list_id) = id_field(body, "new_list_id") else {
            return error(400, "New list ID is required.");
        };
        if !self.owns_list(uid, new_list_id) {
            return error(404, "Target list not found or unauthorized access.");
        }
        let Some(idx) = self.owned_task(uid, id) else {
            return error(404, "Task not found or unauthorized access.");
        };

        // The moved task becomes a root of the target list, taking its subtree along.
        self.tasks[idx].parent_id = None;
        let moving = self.subtree(id);
        for task in self.tasks.iter_mut().filter(|t| moving.contains(&t.id)) {
            task.list_id = new_list_id;
        }
        message(200, "Task and all subtasks moved successfully!")
    }

    fn delete_task(&mut self, uid: i64, id: TaskId) -> Reply {
        if self.owned_task(uid, id).is_none() {
            return message(404, "Task not found or unauthorized access!");
        }
        let doomed = self.subtree(id);
        self.tasks.retain(|t| !doomed.contains(&t.id));
        message(200, "Task deleted successfully!")
    }
}
