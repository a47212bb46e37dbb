//! Endpoint paths. The casing is whatever the server routes use.

use crate::core::{ListId, TaskId};

pub const SIGNUP: &str = "/signup";
pub const LOGIN: &str = "/login";
pub const LOGOUT: &str = "/logout";
pub const CURRENT_USER: &str = "/current_user";

pub const GET_LISTS: &str = "/GetLists";
pub const ADD_LIST: &str = "/Addlists";
pub const ADD_SUBTASK: &str = "/AddSubtasks";

pub fn edit_list(id: ListId) -> String {
    format!("/EditList/{}", id)
}

pub fn delete_list(id: ListId) -> String {
    format!("/DeleteList/{}", id)
}

pub fn list_details(id: ListId) -> String {
    format!("/GetListDetails/{}", id)
}

pub fn get_tasks(list_id: ListId) -> String {
    format!("/GetTasks/{}", list_id)
}

pub fn add_task(list_id: ListId) -> String {
    format!("/AddTask/{}", list_id)
}

pub fn edit_task(id: TaskId) -> String {
    format!("/EditTask/{}", id)
}

pub fn toggle_task(id: TaskId) -> String {
    format!("/TaskCompleted/{}", id)
}

pub fn move_task(id: TaskId) -> String {
    format!("/moveTask/{}", id)
}

pub fn delete_task(id: TaskId) -> String {
    format!("/DeleteTask/{}", id)
}
