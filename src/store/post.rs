use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{unmarshal_item, unmarshal_items, QueryParams, StoreError, TableClient};

/// Secondary index over the posts table exposing only published rows.
pub const PUBLISH_INDEX: &str = "publish_index";

/// Average reading speed the reading-time estimate divides by.
const AVG_WPM: usize = 265;

/// A blog post document. Rows serialize camelCase to match the table
/// layout (`userPic`, `readingTime`). The like count is never stored; it
/// is filled in at render time from the like store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub cover: String,
    pub author: String,
    pub username: String,
    pub user_pic: String,
    pub publish: i64,
    pub created: i64,
    pub updated: i64,
    pub reading_time: i64,
    #[serde(skip)]
    pub likes_count: i64,
}

impl Post {
    pub fn created_date(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.created, 0)
            .map(|dt| dt.format("%b %e, %Y").to_string())
            .unwrap_or_default()
    }
}

/// Fields supplied by the composer; everything else is stamped on write.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub cover: String,
    pub author: String,
    pub username: String,
    pub user_pic: String,
    pub publish: i64,
    pub reading_time: i64,
}

/// Lowercased, non-alphanumeric-stripped, hyphen-joined rendition of a
/// title. An empty or fully stripped title yields an empty slug.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

pub fn post_id(title: &str, created: i64) -> String {
    format!("{}-{}", slugify(title), created)
}

pub fn reading_time(content: &str) -> i64 {
    (content.chars().count() / AVG_WPM) as i64
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, new: NewPost) -> Result<Post, StoreError>;
    async fn get_post(&self, username: &str, id: &str) -> Result<Option<Post>, StoreError>;
    async fn get_user_posts(&self, username: &str) -> Result<Vec<Post>, StoreError>;
    async fn get_posts(&self) -> Result<Vec<Post>, StoreError>;
    async fn update_post(
        &self,
        id: &str,
        cover: &str,
        content: &str,
        created: i64,
    ) -> Result<(), StoreError>;
    /// Approximate provider-maintained row count; 0 on error (logged, not
    /// surfaced).
    async fn get_count(&self) -> i64;
}

pub type DynPostStore = Arc<dyn PostStore>;

pub struct PostTable {
    table: TableClient,
}

impl PostTable {
    pub fn new(table: TableClient) -> Self {
        Self { table }
    }
}

#[async_trait]
impl PostStore for PostTable {
    async fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        const OP: &str = "create_post";
        let created = Utc::now().timestamp();
        let id = post_id(&new.title, created);
        let doc = json!({
            "id": id,
            "title": new.title,
            "content": new.content,
            "cover": new.cover,
            "author": new.author,
            "username": new.username,
            "userPic": new.user_pic,
            "publish": new.publish,
            "readingTime": new.reading_time,
            "created": created,
            "updated": created,
        });
        self.table.put(OP, &doc).await?;
        // The caller gets the write payload back, not a re-read.
        serde_json::from_value(doc).map_err(|source| StoreError::Document { op: OP, source })
    }

    async fn get_post(&self, username: &str, id: &str) -> Result<Option<Post>, StoreError> {
        const OP: &str = "get_post";
        let rows = self
            .table
            .query(
                OP,
                QueryParams {
                    index: None,
                    key_condition: "id = :id AND created > :created",
                    filter: Some("username = :username"),
                    values: json!({ ":id": id, ":created": 0, ":username": username }),
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

    async fn get_user_posts(&self, username: &str) -> Result<Vec<Post>, StoreError> {
        const OP: &str = "get_user_posts";
        let rows = self
            .table
            .query(
                OP,
                QueryParams {
                    index: Some(PUBLISH_INDEX),
                    key_condition: "publish = :publish AND created > :created",
                    filter: Some("username = :username"),
                    values: json!({ ":publish": 1, ":created": 0, ":username": username }),
                    ascending: false,
                    limit: None,
                },
            )
            .await?;
        unmarshal_items(OP, &rows)
    }

    async fn get_posts(&self) -> Result<Vec<Post>, StoreError> {
        const OP: &str = "get_posts";
        let rows = self
            .table
            .query(
                OP,
                QueryParams {
                    index: Some(PUBLISH_INDEX),
                    key_condition: "publish = :publish AND created > :created",
                    filter: None,
                    values: json!({ ":publish": 1, ":created": 0 }),
                    ascending: false,
                    limit: None,
                },
            )
            .await?;
        unmarshal_items(OP, &rows)
    }

    async fn update_post(
        &self,
        id: &str,
        cover: &str,
        content: &str,
        created: i64,
    ) -> Result<(), StoreError> {
        const OP: &str = "update_post";
        self.table
            .update(
                OP,
                &json!({ "id": id, "created": created }),
                "SET cover = :cover, content = :content, updated = :updated",
                &json!({
                    ":cover": cover,
                    ":content": content,
                    ":updated": Utc::now().timestamp(),
                }),
            )
            .await
    }

    async fn get_count(&self) -> i64 {
        match self.table.count("get_count").await {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(error = %err, "post count lookup failed");
                0
            }
        }
    }
}
