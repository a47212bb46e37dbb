use serde::{Deserialize, Serialize};

use super::{ListId, TaskId};

/// A task as returned by `GET /GetTasks/{list}`, with its subtasks already nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
    pub list_id: ListId,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    /// Nesting depth as computed by the server. Root tasks are 0.
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    pub fn new(id: TaskId, list_id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            completed: false,
            list_id,
            parent_id: None,
            depth: 0,
            subtasks: Vec::new(),
        }
    }

    /// Append `child` as a subtask, linking it to this task and its list.
    pub fn with_subtask(mut self, mut child: Task) -> Self {
        child.parent_id = Some(self.id);
        child.list_id = self.list_id;
        child.depth = self.depth + 1;
        self.subtasks.push(child);
        self
    }

    pub fn find(&self, id: TaskId) -> Option<&Task> {
        if self.id == id {
            return Some(self);
        }
        find_task(&self.subtasks, id)
    }

    /// Number of tasks in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + count_tasks(&self.subtasks)
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}

pub fn find_task(tasks: &[Task], id: TaskId) -> Option<&Task> {
    tasks.iter().find_map(|t| t.find(id))
}

pub fn count_tasks(tasks: &[Task]) -> usize {
    tasks.iter().map(Task::subtree_len).sum()
}

/// Depth-first, pre-order walk yielding each task with its depth in the tree.
pub fn flatten(tasks: &[Task]) -> Vec<(&Task, usize)> {
    fn collect<'a>(tasks: &'a [Task], depth: usize, out: &mut Vec<(&'a Task, usize)>) {
        for task in tasks {
            out.push((task, depth));
            collect(&task.subtasks, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    collect(tasks, 0, &mut out);
    out
}

/// A place where a fetched tree disagrees with its own parent or list links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// A root task that still points at a parent.
    RootHasParent { task: TaskId, parent: TaskId },
    /// A subtask whose parent link does not name the task it is nested under.
    ParentMismatch {
        task: TaskId,
        expected: TaskId,
        found: Option<TaskId>,
    },
    /// A task nested in a tree for one list but recorded against another.
    ListMismatch {
        task: TaskId,
        expected: ListId,
        found: ListId,
    },
}

/// Check every task in the tree fetched for `list_id`.
///
/// Issues are only reported; the server stays the source of truth.
pub fn check_integrity(list_id: ListId, roots: &[Task]) -> Vec<IntegrityIssue> {
    fn visit(list_id: ListId, parent: Option<TaskId>, tasks: &[Task], out: &mut Vec<IntegrityIssue>) {
        for task in tasks {
            match (parent, task.parent_id) {
                (None, Some(p)) => out.push(IntegrityIssue::RootHasParent {
                    task: task.id,
                    parent: p,
                }),
                (Some(expected), found) if found != Some(expected) => {
                    out.push(IntegrityIssue::ParentMismatch {
                        task: task.id,
                        expected,
                        found,
                    })
                }
                _ => {}
            }
            if task.list_id != list_id {
                out.push(IntegrityIssue::ListMismatch {
                    task: task.id,
                    expected: list_id,
                    found: task.list_id,
                });
            }
            visit(list_id, Some(task.id), &task.subtasks, out);
        }
    }

    let mut out = Vec::new();
    visit(list_id, None, roots, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Task> {
        vec![
            Task::new(1, 2, "Groceries")
                .with_subtask(Task::new(3, 2, "Milk"))
                .with_subtask(Task::new(4, 2, "Bread").with_subtask(Task::new(6, 2, "Rye"))),
            Task::new(5, 2, "Laundry"),
        ]
    }

    #[test]
    fn decodes_server_tree() {
        let json = r#"{"id":5,"name":"Shop","parent_id":null,"list_id":2,"depth":0,"completed":false,
            "subtasks":[{"id":9,"name":"Buy milk","parent_id":5,"list_id":2,"depth":1,"completed":true,"subtasks":[]}]}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.subtasks.len(), 1);
        assert_eq!(task.subtasks[0].parent_id, Some(5));
        assert!(task.subtasks[0].completed);
        assert!(check_integrity(2, &[task]).is_empty());
    }

    #[test]
    fn flatten_is_preorder_with_depth() {
        let tasks = sample();
        let order: Vec<(TaskId, usize)> = flatten(&tasks).iter().map(|(t, d)| (t.id, *d)).collect();
        assert_eq!(order, vec![(1, 0), (3, 1), (4, 1), (6, 2), (5, 0)]);
    }

    #[test]
    fn find_and_count_cover_nested_tasks() {
        let tasks = sample();
        assert_eq!(count_tasks(&tasks), 5);
        assert_eq!(find_task(&tasks, 6).map(|t| t.name.as_str()), Some("Rye"));
        assert!(find_task(&tasks, 42).is_none());
    }

    #[test]
    fn integrity_reports_broken_links() {
        let mut tasks = sample();
        tasks[0].subtasks[0].parent_id = Some(99);
        tasks[1].list_id = 7;
        tasks[1].parent_id = Some(1);

        let issues = check_integrity(2, &tasks);
        assert_eq!(
            issues,
            vec![
                IntegrityIssue::ParentMismatch {
                    task: 3,
                    expected: 1,
                    found: Some(99)
                },
                IntegrityIssue::RootHasParent { task: 5, parent: 1 },
                IntegrityIssue::ListMismatch {
                    task: 5,
                    expected: 2,
                    found: 7
                },
            ]
        );
    }
}
