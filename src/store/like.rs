use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{unmarshal_item, unmarshal_items, QueryParams, StoreError, TableClient};

/// One like row; `id` is the liked post's id. The table key is
/// `(id, created)`, username is a filter attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Like {
    pub id: String,
    pub username: String,
    pub created: i64,
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    async fn get_likes(&self, post_id: &str) -> Result<Vec<Like>, StoreError>;
    async fn get_like(&self, post_id: &str, username: &str)
        -> Result<Option<Like>, StoreError>;
    /// Flips the (post, username) like state: inserts a row stamped with
    /// the current time when absent, otherwise deletes the found row by
    /// its own `(id, created)` key so an in-flight toggle never targets a
    /// stale key. One flip per call, deliberately not idempotent.
    async fn toggle_like(&self, post_id: &str, username: &str) -> Result<(), StoreError>;
}

pub type DynLikeStore = Arc<dyn LikeStore>;

pub struct LikeTable {
    table: TableClient,
}

impl LikeTable {
    pub fn new(table: TableClient) -> Self {
        Self { table }
    }
}

#[async_trait]
impl LikeStore for LikeTable {
    async fn get_likes(&self, post_id: &str) -> Result<Vec<Like>, StoreError> {
        const OP: &str = "get_likes";
        let rows = self
            .table
            .query(
                OP,
                QueryParams {
                    index: None,
                    key_condition: "id = :id AND created > :created",
                    filter: None,
                    values: json!({ ":id": post_id, ":created": 0 }),
                    ascending: true,
                    limit: None,
                },
            )
            .await?;
        unmarshal_items(OP, &rows)
    }

    async fn get_like(
        &self,
        post_id: &str,
        username: &str,
    ) -> Result<Option<Like>, StoreError> {
        const OP: &str = "get_like";
        let rows = self
            .table
            .query(
                OP,
                QueryParams {
                    index: None,
                    key_condition: "id = :id AND created > :created",
                    filter: Some("username = :username"),
                    values: json!({ ":id": post_id, ":created": 0, ":username": username }),
                    ascending: true,
                    limit: None,
                },
            )
            .await?;
        match rows.first() {
            Some(item) => Ok(Some(unmarshal_item(OP, item)?)),
            None => Ok(None),
        }
    }

    async fn toggle_like(&self, post_id: &str, username: &str) -> Result<(), StoreError> {
        const OP: &str = "toggle_like";
        match self.get_like(post_id, username).await? {
            None => {
                let doc = json!({
                    "id": post_id,
                    "username": username,
                    "created": Utc::now().timestamp(),
                });
                self.table.put(OP, &doc).await
            }
            Some(like) => {
                let key = json!({ "id": like.id, "created": like.created });
                self.table.delete(OP, &key).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::testutil::MemoryBackend;
    use crate::store::{marshal_object, TableClient};

    use super::*;

    fn store() -> (std::sync::Arc<MemoryBackend>, LikeTable) {
        let backend = MemoryBackend::new();
        let table = LikeTable::new(TableClient::new("likes", backend.clone()));
        (backend, table)
    }

    fn seed_like(backend: &MemoryBackend, post_id: &str, username: &str, created: i64) {
        backend.seed(
            "likes",
            marshal_object(
                "seed",
                &json!({ "id": post_id, "username": username, "created": created }),
            )
            .unwrap(),
        );
    }

    #[tokio::test]
    async fn toggle_is_a_true_flip() {
        let (backend, store) = store();
        assert!(store.get_like("p1", "alice").await.unwrap().is_none());

        store.toggle_like("p1", "alice").await.unwrap();
        let like = store.get_like("p1", "alice").await.unwrap().unwrap();
        assert_eq!(like.username, "alice");
        assert!(like.created > 0);
        assert_eq!(backend.rows("likes").len(), 1);

        store.toggle_like("p1", "alice").await.unwrap();
        assert!(store.get_like("p1", "alice").await.unwrap().is_none());
        assert!(backend.rows("likes").is_empty());
    }

    #[tokio::test]
    async fn toggle_deletes_only_the_callers_row() {
        let (backend, store) = store();
        seed_like(&backend, "p1", "ben", 5);
        store.toggle_like("p1", "ana").await.unwrap();
        assert_eq!(backend.rows("likes").len(), 2);

        store.toggle_like("p1", "ana").await.unwrap();
        let rest = store.get_likes("p1").await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].username, "ben");
    }

    #[tokio::test]
    async fn zero_rows_is_an_empty_list_not_an_error() {
        let (_backend, store) = store();
        assert!(store.get_likes("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn likes_for_one_post_do_not_leak_into_another() {
        let (backend, store) = store();
        seed_like(&backend, "p1", "ana", 1);
        seed_like(&backend, "p2", "ana", 2);
        seed_like(&backend, "p1", "ben", 3);
        assert_eq!(store.get_likes("p1").await.unwrap().len(), 2);
        assert_eq!(store.get_likes("p2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookup_errors_carry_the_op_label() {
        let (backend, store) = store();
        backend.fail_on("query");
        let err = store.get_like("p1", "ana").await.unwrap_err();
        assert!(err.to_string().starts_with("get_like:"));

        let err = store.toggle_like("p1", "ana").await.unwrap_err();
        assert!(err.to_string().starts_with("get_like:"));
    }

    #[tokio::test]
    async fn toggle_surfaces_write_failures() {
        let (backend, store) = store();
        backend.fail_on("put");
        let err = store.toggle_like("p1", "ana").await.unwrap_err();
        assert!(err.to_string().starts_with("toggle_like:"));
    }
}
