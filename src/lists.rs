//! Operations on the logged-in user's lists.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::core::list::TaskList;
use crate::core::{ListId, validate_name};
use crate::error::ClientError;
use crate::http::{Gateway, paths};
use crate::notify::Notification;
use crate::refresh::RefreshSignal;

#[derive(Deserialize)]
struct ListsReply {
    #[serde(default)]
    lists: Vec<TaskList>,
}

#[derive(Deserialize)]
struct ListDetailsReply {
    #[serde(rename = "listName")]
    list_name: String,
}

/// Obtained from [`Session::lists`](crate::session::Session::lists).
///
/// Mutations never touch local copies of the lists. On success they bump the
/// refresh signal and whoever owns the displayed lists fetches them again.
#[derive(Clone)]
pub struct ListManager {
    gateway: Gateway,
    refresh: RefreshSignal,
}

impl ListManager {
    pub fn new(gateway: Gateway, refresh: RefreshSignal) -> Self {
        Self { gateway, refresh }
    }

    /// Every list the user owns, in server order.
    pub async fn get_lists(&self) -> Result<Vec<TaskList>, ClientError> {
        let reply: ListsReply = self.gateway.fetch(Method::GET, paths::GET_LISTS, None).await?;
        log::debug!("Fetched {} lists", reply.lists.len());
        Ok(reply.lists)
    }

    /// Display name of one list.
    pub async fn get_list_details(&self, id: ListId) -> Result<String, ClientError> {
        let reply: ListDetailsReply = self
            .gateway
            .fetch(Method::GET, &paths::list_details(id), None)
            .await?;
        Ok(reply.list_name)
    }

    pub async fn add_list(&self, name: &str) -> Result<(), ClientError> {
        let name = validate_name("List", name)?;
        self.gateway
            .send(Method::POST, paths::ADD_LIST, Some(json!({ "name": name })))
            .await?;
        log::info!("Added list {:?}", name);
        self.mutated("List added successfully!");
        Ok(())
    }

    pub async fn edit_list(&self, id: ListId, name: &str) -> Result<(), ClientError> {
        let name = validate_name("List", name)?;
        self.gateway
            .send(Method::PUT, &paths::edit_list(id), Some(json!({ "name": name })))
            .await?;
        log::info!("Renamed list {} to {:?}", id, name);
        self.mutated("List updated successfully!");
        Ok(())
    }

    /// Delete a list and, on the server, every task in it.
    ///
    /// Callers confirm first; see [`DeleteFlow`](crate::view::DeleteFlow).
    pub async fn delete_list(&self, id: ListId) -> Result<(), ClientError> {
        self.gateway
            .send(Method::DELETE, &paths::delete_list(id), None)
            .await?;
        log::info!("Deleted list {}", id);
        self.mutated("List deleted successfully!");
        Ok(())
    }

    pub fn notify(&self, notification: Notification) {
        self.gateway.notify(notification);
    }

    fn mutated(&self, message: &str) {
        self.gateway.notify(Notification::success(message));
        self.refresh.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::user::Credentials;
    use crate::http::MemoryBackend;
    use crate::notify::RecordingNotifier;
    use crate::session::Session;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn setup() -> (ListManager, RefreshSignal, Arc<MemoryBackend>, Arc<RecordingNotifier>) {
        let backend = Arc::new(
            MemoryBackend::new().with_user("alice", "alice@example.com", "secret"),
        );
        let notes = Arc::new(RecordingNotifier::new());
        let mut session = Session::new(Gateway::new(backend.clone(), notes.clone()));
        session.login(&Credentials::new("alice", "secret")).await.unwrap();
        notes.take();

        let refresh = RefreshSignal::new();
        let lists = session.lists(&refresh).unwrap();
        (lists, refresh, backend, notes)
    }

    #[tokio::test]
    async fn added_list_shows_up_exactly_once() {
        let (lists, refresh, _backend, _notes) = setup().await;
        let before = lists.get_lists().await.unwrap();
        assert!(before.iter().all(|l| l.name != "Groceries"));

        lists.add_list("Groceries").await.unwrap();
        assert_eq!(refresh.generation(), 1);

        let after = lists.get_lists().await.unwrap();
        assert_eq!(after.iter().filter(|l| l.name == "Groceries").count(), 1);
        assert_eq!(after.len(), before.len() + 1);
    }

    #[tokio::test]
    async fn blank_names_are_rejected_locally() {
        let (lists, refresh, backend, notes) = setup().await;
        let sent = backend.request_count();

        for name in ["", "   ", "\t\n"] {
            let err = lists.add_list(name).await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)));
        }
        assert!(matches!(
            lists.edit_list(1, " ").await,
            Err(ClientError::Validation(_))
        ));

        assert_eq!(backend.request_count(), sent);
        assert_eq!(refresh.generation(), 0);
        assert!(notes.snapshot().is_empty());
    }

    #[tokio::test]
    async fn rename_and_details() {
        let (lists, _refresh, backend, _notes) = setup().await;
        backend.seed_list("alice", 4, "Errands").unwrap();

        lists.edit_list(4, "  Weekend errands ").await.unwrap();
        assert_eq!(lists.get_list_details(4).await.unwrap(), "Weekend errands");
        assert_eq!(
            lists.get_lists().await.unwrap(),
            vec![TaskList::new(4, "Weekend errands")]
        );
    }

    #[tokio::test]
    async fn failed_delete_changes_nothing() {
        let (lists, refresh, backend, notes) = setup().await;
        backend.seed_list("alice", 4, "Errands").unwrap();

        let err = lists.delete_list(99).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(notes.errors(), vec!["List not found!".to_string()]);
        assert_eq!(refresh.generation(), 0);
        assert_eq!(lists.get_lists().await.unwrap().len(), 1);

        lists.delete_list(4).await.unwrap();
        assert_eq!(refresh.generation(), 1);
        assert!(lists.get_lists().await.unwrap().is_empty());
    }
}
