//! Per-node view state for a task tree, and the rows a renderer draws.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use super::delete::DeleteFlow;
use crate::core::TaskId;
use crate::core::task::{Task, flatten};

/// Dialog and visibility state of one task row. Each node has its own;
/// nothing is shared with parents or siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeState {
    pub expanded: bool,
    pub edit_open: bool,
    pub move_open: bool,
    pub add_subtask_visible: bool,
    pub delete: DeleteFlow,
}

/// One visible row of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'a> {
    pub task: &'a Task,
    pub depth: usize,
    pub state: NodeState,
}

#[derive(Debug, Default)]
pub struct TaskTreeView {
    nodes: HashMap<TaskId, NodeState>,
}

impl TaskTreeView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: TaskId) -> NodeState {
        self.nodes.get(&id).cloned().unwrap_or_default()
    }

    pub fn node_mut(&mut self, id: TaskId) -> &mut NodeState {
        self.nodes.entry(id).or_default()
    }

    pub fn toggle_expanded(&mut self, id: TaskId) {
        let node = self.node_mut(id);
        node.expanded = !node.expanded;
    }

    pub fn toggle_add_subtask(&mut self, id: TaskId) {
        let node = self.node_mut(id);
        node.add_subtask_visible = !node.add_subtask_visible;
    }

    pub fn set_edit_open(&mut self, id: TaskId, open: bool) {
        self.node_mut(id).edit_open = open;
    }

    pub fn set_move_open(&mut self, id: TaskId, open: bool) {
        self.node_mut(id).move_open = open;
    }

    pub fn request_delete(&mut self, id: TaskId) {
        self.node_mut(id).delete.request();
    }

    pub fn cancel_delete(&mut self, id: TaskId) {
        let flow = &mut self.node_mut(id).delete;
        flow.cancel();
        flow.settle();
    }

    pub fn expand_all(&mut self, tasks: &[Task]) {
        for (task, _) in flatten(tasks) {
            if task.has_subtasks() {
                self.node_mut(task.id).expanded = true;
            }
        }
    }

    /// Forget state for tasks that are no longer in the fetched tree.
    pub fn prune(&mut self, tasks: &[Task]) {
        let live: HashSet<TaskId> = flatten(tasks).into_iter().map(|(t, _)| t.id).collect();
        self.nodes.retain(|id, _| live.contains(id));
    }

    /// Visible rows in display order. Subtasks show only under expanded nodes.
    pub fn rows<'a>(&self, tasks: &'a [Task]) -> Vec<Row<'a>> {
        fn walk<'a>(view: &TaskTreeView, tasks: &'a [Task], depth: usize, out: &mut Vec<Row<'a>>) {
            for task in tasks {
                let state = view.state(task.id);
                let expanded = state.expanded;
                out.push(Row { task, depth, state });
                if expanded {
                    walk(view, &task.subtasks, depth + 1, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(self, tasks, 0, &mut out);
        out
    }

    /// Plain-text rendering, one line per visible row.
    pub fn render(&self, tasks: &[Task]) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        for row in self.rows(tasks) {
            let marker = match (row.task.has_subtasks(), row.state.expanded) {
                (false, _) => ' ',
                (true, true) => 'v',
                (true, false) => '>',
            };
            let check = if row.task.completed { 'x' } else { ' ' };
            write!(
                out,
                "{:indent$}{} [{}] {} (#{})",
                "",
                marker,
                check,
                row.task.name,
                row.task.id,
                indent = row.depth * 2
            )?;
            if row.task.has_subtasks() && !row.state.expanded {
                write!(out, " +{}", row.task.subtree_len() - 1)?;
            }
            if row.state.delete.is_dialog_open() {
                write!(out, "  delete \"{}\"? [y/n]", row.task.name)?;
            }
            writeln!(out)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> Vec<Task> {
        vec![
            Task::new(1, 2, "Groceries")
                .with_subtask(Task::new(3, 2, "Milk"))
                .with_subtask(Task::new(4, 2, "Bread").with_subtask(Task::new(6, 2, "Rye"))),
            Task::new(5, 2, "Laundry"),
        ]
    }

    fn ids(rows: &[Row<'_>]) -> Vec<TaskId> {
        rows.iter().map(|r| r.task.id).collect()
    }

    #[test]
    fn collapsed_by_default() {
        let tasks = tree();
        let view = TaskTreeView::new();
        assert_eq!(ids(&view.rows(&tasks)), vec![1, 5]);
    }

    #[test]
    fn expansion_is_per_node() {
        let tasks = tree();
        let mut view = TaskTreeView::new();
        view.toggle_expanded(1);
        assert_eq!(ids(&view.rows(&tasks)), vec![1, 3, 4, 5]);

        view.toggle_expanded(4);
        let rows = view.rows(&tasks);
        assert_eq!(ids(&rows), vec![1, 3, 4, 6, 5]);
        assert_eq!(rows[3].depth, 2);

        // Collapsing the root hides the subtree but keeps the child's own state.
        view.toggle_expanded(1);
        assert_eq!(ids(&view.rows(&tasks)), vec![1, 5]);
        assert!(view.state(4).expanded);
    }

    #[test]
    fn dialogs_do_not_leak_between_nodes() {
        let mut view = TaskTreeView::new();
        view.set_edit_open(3, true);
        view.request_delete(4);
        view.toggle_add_subtask(1);

        assert!(view.state(3).edit_open);
        assert!(!view.state(4).edit_open);
        assert_eq!(view.state(4).delete, DeleteFlow::ConfirmPending);
        assert_eq!(view.state(1).delete, DeleteFlow::Idle);
        assert!(view.state(1).add_subtask_visible);
        assert!(!view.state(3).add_subtask_visible);

        view.cancel_delete(4);
        assert_eq!(view.state(4).delete, DeleteFlow::Idle);
    }

    #[test]
    fn prune_drops_vanished_tasks() {
        let mut tasks = tree();
        let mut view = TaskTreeView::new();
        view.expand_all(&tasks);
        view.set_move_open(6, true);

        tasks[0].subtasks.pop();
        view.prune(&tasks);
        assert_eq!(view.state(6), NodeState::default());
        assert!(view.state(1).expanded);
    }

    #[test]
    fn renders_indented_rows() {
        let mut tasks = tree();
        tasks[0].subtasks[0].completed = true;
        let mut view = TaskTreeView::new();
        view.toggle_expanded(1);

        let text = view.render(&tasks).unwrap();
        let expected = [
            "v [ ] Groceries (#1)",
            "    [x] Milk (#3)",
            "  > [ ] Bread (#4) +1",
            "  [ ] Laundry (#5)",
        ];
        assert_eq!(text, expected.join("\n") + "\n");
    }
}
