//! The two pages that own fetched data.
//!
//! Each page keeps the last successful fetch and fetches again once for every
//! change it observes on the refresh signal. Actions only call the managers;
//! what the page shows changes on the next fetch.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::future::Future;

use super::delete::DeleteFlow;
use super::tree::TaskTreeView;
use crate::core::list::TaskList;
use crate::core::task::{Task, find_task};
use crate::core::{ListId, TaskId};
use crate::error::ClientError;
use crate::lists::ListManager;
use crate::notify::Notification;
use crate::refresh::{RefreshListener, RefreshSignal};
use crate::tasks::TaskManager;

pub const LOADING_TITLE: &str = "Loading...";

pub struct Dashboard {
    manager: ListManager,
    listener: RefreshListener,
    lists: Vec<TaskList>,
    deletes: HashMap<ListId, DeleteFlow>,
    editing: HashSet<ListId>,
    add_open: bool,
    loaded: bool,
}

impl Dashboard {
    pub fn new(manager: ListManager, refresh: &RefreshSignal) -> Self {
        Self {
            manager,
            listener: refresh.subscribe(),
            lists: Vec::new(),
            deletes: HashMap::new(),
            editing: HashSet::new(),
            add_open: false,
            loaded: false,
        }
    }

    pub fn lists(&self) -> &[TaskList] {
        &self.lists
    }

    pub fn manager(&self) -> &ListManager {
        &self.manager
    }

    /// Fetch if nothing was fetched yet or the signal moved since the last look.
    /// Returns whether a fetch happened.
    pub async fn sync(&mut self) -> Result<bool, ClientError> {
        let changed = self.listener.take_change();
        if self.loaded && !changed {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    /// Sync, then keep re-fetching on every observed change until `stop` completes.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, stop: F) -> Result<(), ClientError> {
        self.sync().await?;
        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;
                alive = self.listener.changed() => {
                    if !alive {
                        return Ok(());
                    }
                    if let Err(e) = self.reload().await {
                        log::warn!("Dashboard refresh failed: {}", e);
                    }
                }
                _ = &mut stop => return Ok(()),
            }
        }
    }

    pub fn is_add_open(&self) -> bool {
        self.add_open
    }

    pub fn set_add_open(&mut self, open: bool) {
        self.add_open = open;
    }

    /// Submit the add-list dialog. It closes only on success.
    pub async fn submit_add(&mut self, name: &str) -> Result<(), ClientError> {
        self.manager.add_list(name).await?;
        self.add_open = false;
        Ok(())
    }

    pub fn is_edit_open(&self, id: ListId) -> bool {
        self.editing.contains(&id)
    }

    pub fn set_edit_open(&mut self, id: ListId, open: bool) {
        if open {
            self.editing.insert(id);
        } else {
            self.editing.remove(&id);
        }
    }

    /// Submit a list's edit dialog. It closes only on success.
    pub async fn submit_rename(&mut self, id: ListId, name: &str) -> Result<(), ClientError> {
        self.manager.edit_list(id, name).await?;
        self.editing.remove(&id);
        Ok(())
    }

    pub fn delete_state(&self, id: ListId) -> DeleteFlow {
        self.deletes.get(&id).copied().unwrap_or_default()
    }

    pub fn request_delete(&mut self, id: ListId) {
        self.deletes.entry(id).or_default().request();
    }

    pub fn cancel_delete(&mut self, id: ListId) {
        if let Some(flow) = self.deletes.get_mut(&id) {
            flow.cancel();
            flow.settle();
        }
    }

    /// Delete a list whose deletion was requested. A refused delete leaves the
    /// confirmation pending.
    pub async fn confirm_delete(&mut self, id: ListId) -> Result<(), ClientError> {
        let manager = self.manager.clone();
        let flow = self.deletes.entry(id).or_default();
        flow.confirm_with(|| async move { manager.delete_list(id).await })
            .await?;
        self.deletes.remove(&id);
        Ok(())
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        if self.lists.is_empty() {
            writeln!(out, "No lists yet.")?;
        }
        for list in &self.lists {
            write!(out, "{:>4}  {}", list.id, list.name)?;
            if self.is_edit_open(list.id) {
                write!(out, "  (editing)")?;
            }
            if self.delete_state(list.id).is_dialog_open() {
                write!(out, "  (delete?)")?;
            }
            writeln!(out)?;
        }
        Ok(out)
    }

    async fn reload(&mut self) -> Result<(), ClientError> {
        self.lists = self.manager.get_lists().await?;
        self.loaded = true;
        let live: Vec<ListId> = self.lists.iter().map(|l| l.id).collect();
        self.deletes.retain(|id, _| live.contains(id));
        self.editing.retain(|id| live.contains(id));
        Ok(())
    }
}

pub struct ListPage {
    list_id: ListId,
    title: Option<String>,
    lists: ListManager,
    tasks: TaskManager,
    listener: RefreshListener,
    tree: Vec<Task>,
    view: TaskTreeView,
    move_targets: Vec<TaskList>,
    loaded: bool,
}

impl ListPage {
    pub fn new(list_id: ListId, lists: ListManager, tasks: TaskManager, refresh: &RefreshSignal) -> Self {
        Self {
            list_id,
            title: None,
            lists,
            tasks,
            listener: refresh.subscribe(),
            tree: Vec::new(),
            view: TaskTreeView::new(),
            move_targets: Vec::new(),
            loaded: false,
        }
    }

    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    /// The list's name, or a placeholder until it has been fetched.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(LOADING_TITLE)
    }

    pub fn tree(&self) -> &[Task] {
        &self.tree
    }

    pub fn view(&self) -> &TaskTreeView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut TaskTreeView {
        &mut self.view
    }

    pub async fn sync(&mut self) -> Result<bool, ClientError> {
        let changed = self.listener.take_change();
        if self.loaded && !changed {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    pub async fn run_until<F: Future<Output = ()>>(&mut self, stop: F) -> Result<(), ClientError> {
        self.sync().await?;
        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;
                alive = self.listener.changed() => {
                    if !alive {
                        return Ok(());
                    }
                    if let Err(e) = self.reload().await {
                        log::warn!("List {} refresh failed: {}", self.list_id, e);
                    }
                }
                _ = &mut stop => return Ok(()),
            }
        }
    }

    pub async fn add_task(&mut self, name: &str) -> Result<(), ClientError> {
        self.tasks.add_task(self.list_id, name).await
    }

    /// Submit a node's add-subtask form. The form closes only on success.
    pub async fn submit_subtask(&mut self, parent_id: TaskId, name: &str) -> Result<(), ClientError> {
        let list_id = find_task(&self.tree, parent_id)
            .map(|t| t.list_id)
            .unwrap_or(self.list_id);
        self.tasks.add_subtask(parent_id, list_id, name).await?;
        self.view.node_mut(parent_id).add_subtask_visible = false;
        Ok(())
    }

    /// Submit a node's edit dialog. The dialog closes only on success.
    pub async fn submit_edit(&mut self, id: TaskId, name: &str, completed: bool) -> Result<(), ClientError> {
        self.tasks.edit_task(id, name, completed).await?;
        self.view.set_edit_open(id, false);
        Ok(())
    }

    pub async fn toggle(&mut self, id: TaskId) -> Result<(), ClientError> {
        self.tasks.toggle_completion(id).await
    }

    /// Open a node's move dialog and load the lists it can move to.
    pub async fn open_move(&mut self, id: TaskId) -> Result<&[TaskList], ClientError> {
        self.view.set_move_open(id, true);
        match self.lists.get_lists().await {
            Ok(lists) => {
                self.move_targets = lists;
                Ok(&self.move_targets)
            }
            Err(e) => {
                self.lists_unavailable();
                Err(e)
            }
        }
    }

    /// The list a move dialog starts on: this one if it is a target, else the first.
    pub fn default_move_target(&self) -> Option<ListId> {
        self.move_targets
            .iter()
            .find(|l| l.id == self.list_id)
            .or_else(|| self.move_targets.first())
            .map(|l| l.id)
    }

    pub async fn submit_move(&mut self, id: TaskId, new_list_id: ListId) -> Result<(), ClientError> {
        self.tasks.move_task(id, new_list_id).await?;
        self.view.set_move_open(id, false);
        Ok(())
    }

    pub async fn confirm_delete(&mut self, id: TaskId) -> Result<(), ClientError> {
        let tasks = self.tasks.clone();
        self.view
            .node_mut(id)
            .delete
            .confirm_with(|| async move { tasks.delete_task(id).await })
            .await
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        writeln!(out, "{}", self.title())?;
        if self.tree.is_empty() {
            writeln!(out, "No tasks.")?;
        }
        out.push_str(&self.view.render(&self.tree)?);
        Ok(out)
    }

    async fn reload(&mut self) -> Result<(), ClientError> {
        if self.title.is_none() {
            match self.lists.get_list_details(self.list_id).await {
                Ok(name) => self.title = Some(name),
                Err(e) => log::warn!("No name for list {}: {}", self.list_id, e),
            }
        }
        self.tree = self.tasks.get_tasks(self.list_id).await?;
        self.view.prune(&self.tree);
        self.loaded = true;
        Ok(())
    }

    fn lists_unavailable(&self) {
        self.lists
            .notify(Notification::error("Failed to fetch lists."));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::count_tasks;
    use crate::core::user::Credentials;
    use crate::http::{Gateway, MemoryBackend};
    use crate::notify::RecordingNotifier;
    use crate::session::Session;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Fixture {
        session: Session,
        refresh: RefreshSignal,
        backend: Arc<MemoryBackend>,
        notes: Arc<RecordingNotifier>,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(
            MemoryBackend::new().with_user("alice", "alice@example.com", "secret"),
        );
        backend.seed_list("alice", 2, "Home").unwrap();
        backend.seed_list("alice", 3, "Work").unwrap();
        backend.seed_task(5, 2, None, "Shopping").unwrap();
        backend.seed_task(7, 2, None, "Fix bike").unwrap();
        backend.seed_task(8, 2, Some(7), "Buy tube").unwrap();

        let notes = Arc::new(RecordingNotifier::new());
        let mut session = Session::new(Gateway::new(backend.clone(), notes.clone()));
        session.login(&Credentials::new("alice", "secret")).await.unwrap();
        notes.take();
        Fixture {
            session,
            refresh: RefreshSignal::new(),
            backend,
            notes,
        }
    }

    fn list_page(f: &Fixture, list_id: ListId) -> ListPage {
        ListPage::new(
            list_id,
            f.session.lists(&f.refresh).unwrap(),
            f.session.tasks(&f.refresh).unwrap(),
            &f.refresh,
        )
    }

    #[tokio::test]
    async fn dashboard_fetches_once_per_change() {
        let f = fixture().await;
        let lists = f.session.lists(&f.refresh).unwrap();
        let mut dash = Dashboard::new(lists.clone(), &f.refresh);

        assert!(dash.sync().await.unwrap());
        assert!(!dash.sync().await.unwrap());
        assert_eq!(dash.lists().len(), 2);

        lists.add_list("Groceries").await.unwrap();
        lists.add_list("Garden").await.unwrap();
        let before = f.backend.request_count();
        assert!(dash.sync().await.unwrap());
        assert_eq!(f.backend.request_count(), before + 1);
        assert!(!dash.sync().await.unwrap());

        let names: Vec<&str> = dash.lists().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names.iter().filter(|n| **n == "Groceries").count(), 1);
        assert_eq!(names.len(), 4);
    }

    #[tokio::test]
    async fn dashboard_keeps_stale_lists_when_fetch_fails() {
        let f = fixture().await;
        let lists = f.session.lists(&f.refresh).unwrap();
        let mut dash = Dashboard::new(lists.clone(), &f.refresh);
        dash.sync().await.unwrap();

        lists.add_list("Groceries").await.unwrap();
        f.backend.fail_next(500, "Error fetching lists");
        assert!(dash.sync().await.is_err());
        assert_eq!(dash.lists().len(), 2);
    }

    #[tokio::test]
    async fn dashboard_run_until_follows_mutations() {
        let f = fixture().await;
        let lists = f.session.lists(&f.refresh).unwrap();
        let mut dash = Dashboard::new(lists.clone(), &f.refresh);

        dash.run_until(async move {
            lists.add_list("Groceries").await.unwrap();
            tokio::task::yield_now().await;
        })
        .await
        .unwrap();
        assert!(dash.lists().iter().any(|l| l.name == "Groceries"));
    }

    #[tokio::test]
    async fn dashboard_delete_needs_confirmation() {
        let f = fixture().await;
        let lists = f.session.lists(&f.refresh).unwrap();
        let mut dash = Dashboard::new(lists, &f.refresh);
        dash.sync().await.unwrap();

        let sent = f.backend.request_count();
        assert!(dash.confirm_delete(3).await.is_err());
        assert_eq!(f.backend.request_count(), sent);

        dash.request_delete(3);
        dash.cancel_delete(3);
        assert_eq!(dash.delete_state(3), DeleteFlow::Idle);

        dash.request_delete(3);
        f.backend.fail_next(500, "Error deleting list");
        assert!(dash.confirm_delete(3).await.is_err());
        assert_eq!(dash.delete_state(3), DeleteFlow::ConfirmPending);

        dash.confirm_delete(3).await.unwrap();
        assert_eq!(dash.delete_state(3), DeleteFlow::Idle);
        dash.sync().await.unwrap();
        assert_eq!(dash.lists(), &[TaskList::new(2, "Home")]);
    }

    #[tokio::test]
    async fn rename_dialog_closes_only_on_success() {
        let f = fixture().await;
        let mut dash = Dashboard::new(f.session.lists(&f.refresh).unwrap(), &f.refresh);
        dash.sync().await.unwrap();

        dash.set_edit_open(2, true);
        let sent = f.backend.request_count();
        assert!(matches!(
            dash.submit_rename(2, "   ").await,
            Err(ClientError::Validation(_))
        ));
        assert_eq!(f.backend.request_count(), sent);
        assert!(dash.is_edit_open(2));

        f.backend.fail_next(500, "Error updating list");
        assert!(dash.submit_rename(2, "House").await.is_err());
        assert!(dash.is_edit_open(2));
        assert!(!dash.is_edit_open(3));

        dash.submit_rename(2, "House").await.unwrap();
        assert!(!dash.is_edit_open(2));
        assert!(dash.sync().await.unwrap());
        assert_eq!(dash.lists()[0], TaskList::new(2, "House"));
    }

    #[tokio::test]
    async fn add_dialog_closes_only_on_success() {
        let f = fixture().await;
        let mut dash = Dashboard::new(f.session.lists(&f.refresh).unwrap(), &f.refresh);
        dash.sync().await.unwrap();

        dash.set_add_open(true);
        assert!(dash.submit_add("").await.is_err());
        assert!(dash.is_add_open());

        f.backend.fail_next(500, "Error adding list");
        assert!(dash.submit_add("Groceries").await.is_err());
        assert!(dash.is_add_open());
        assert_eq!(f.notes.errors(), vec!["Error adding list".to_string()]);

        dash.submit_add("Groceries").await.unwrap();
        assert!(!dash.is_add_open());
        dash.sync().await.unwrap();
        assert_eq!(dash.lists().iter().filter(|l| l.name == "Groceries").count(), 1);
    }

    #[tokio::test]
    async fn list_page_loads_title_and_tree() {
        let f = fixture().await;
        let mut page = list_page(&f, 2);
        assert_eq!(page.title(), LOADING_TITLE);

        page.sync().await.unwrap();
        assert_eq!(page.title(), "Home");
        assert_eq!(count_tasks(page.tree()), 3);
        assert_eq!(
            page.render().unwrap(),
            "Home\n  [ ] Shopping (#5)\n> [ ] Fix bike (#7) +1\n"
        );
    }

    #[tokio::test]
    async fn subtask_form_closes_after_success() {
        let f = fixture().await;
        let mut page = list_page(&f, 2);
        page.sync().await.unwrap();

        page.view_mut().toggle_add_subtask(5);
        assert!(matches!(
            page.submit_subtask(5, "  ").await,
            Err(ClientError::Validation(_))
        ));
        assert!(page.view().state(5).add_subtask_visible);

        page.submit_subtask(5, "Buy milk").await.unwrap();
        assert!(!page.view().state(5).add_subtask_visible);

        assert!(page.sync().await.unwrap());
        let parent = find_task(page.tree(), 5).unwrap();
        assert_eq!(parent.subtasks.len(), 1);
        assert_eq!(parent.subtasks[0].name, "Buy milk");
    }

    #[tokio::test]
    async fn move_dialog_defaults_to_current_list() {
        let f = fixture().await;
        let mut page = list_page(&f, 2);
        page.sync().await.unwrap();

        let targets = page.open_move(7).await.unwrap().len();
        assert_eq!(targets, 2);
        assert!(page.view().state(7).move_open);
        assert_eq!(page.default_move_target(), Some(2));

        page.submit_move(7, 3).await.unwrap();
        assert!(!page.view().state(7).move_open);
        page.sync().await.unwrap();
        assert!(find_task(page.tree(), 7).is_none());
        assert!(find_task(page.tree(), 8).is_none());

        let mut work = list_page(&f, 3);
        work.sync().await.unwrap();
        assert!(find_task(work.tree(), 7).is_some());
    }

    #[tokio::test]
    async fn failed_move_fetch_is_reported() {
        let f = fixture().await;
        let mut page = list_page(&f, 2);
        page.sync().await.unwrap();

        f.backend.fail_next(500, "Error fetching lists");
        assert!(page.open_move(7).await.is_err());
        assert!(f.notes.errors().contains(&"Failed to fetch lists.".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_node_state() {
        let f = fixture().await;
        let mut page = list_page(&f, 2);
        page.sync().await.unwrap();
        page.view_mut().toggle_expanded(7);
        page.view_mut().request_delete(7);

        page.confirm_delete(7).await.unwrap();
        page.sync().await.unwrap();
        assert_eq!(count_tasks(page.tree()), 1);
        assert!(!page.view().state(7).expanded);
    }

    #[tokio::test]
    async fn toggle_refetches_once() {
        let f = fixture().await;
        let mut page = list_page(&f, 2);
        page.sync().await.unwrap();

        page.toggle(5).await.unwrap();
        page.toggle(5).await.unwrap();
        assert!(page.sync().await.unwrap());
        assert!(!page.sync().await.unwrap());
        assert!(!find_task(page.tree(), 5).unwrap().completed);
    }
}
