use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub mod dynamo;
pub mod like;
pub mod post;

/// One raw row as stored: attribute name to native attribute value.
pub type Item = HashMap<String, AttributeValue>;

/// Transport or service-side failure reported by a table backend.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op}: {source}")]
    Backend {
        op: &'static str,
        source: BackendError,
    },
    #[error("{op}: malformed document: {source}")]
    Document {
        op: &'static str,
        source: serde_json::Error,
    },
    #[error("{op}: {reason}")]
    Malformed {
        op: &'static str,
        reason: &'static str,
    },
}

/// One read query: a key condition over the table or a secondary index,
/// an optional filter, bound values, sort direction and an optional row
/// limit. Zero result rows is not interpreted here; callers decide what
/// an empty result means.
#[derive(Debug, Clone)]
pub struct QueryParams<'a> {
    pub index: Option<&'a str>,
    pub key_condition: &'a str,
    pub filter: Option<&'a str>,
    pub values: Value,
    pub ascending: bool,
    pub limit: Option<i32>,
}

/// A query with its values marshaled, ready for a backend.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub table: String,
    pub index: Option<String>,
    pub key_condition: String,
    pub filter: Option<String>,
    pub values: Item,
    pub ascending: bool,
    pub limit: Option<i32>,
}

/// Raw operations a backing key-value store must provide.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn query(&self, spec: QuerySpec) -> Result<Vec<Item>, BackendError>;
    async fn put_item(&self, table: &str, item: Item) -> Result<(), BackendError>;
    async fn update_item(
        &self,
        table: &str,
        key: Item,
        expression: &str,
        values: Item,
    ) -> Result<(), BackendError>;
    async fn delete_item(&self, table: &str, key: Item) -> Result<(), BackendError>;
    async fn item_count(&self, table: &str) -> Result<i64, BackendError>;
}

/// Issues reads and writes against one named table. Stateless apart from
/// the table name, so it is shared freely across requests.
///
/// Every method takes an `op` label naming the logical operation; errors
/// carry it so a failure reads as `get_likes: ...` in logs.
#[derive(Clone)]
pub struct TableClient {
    table: String,
    backend: Arc<dyn TableBackend>,
}

impl TableClient {
    pub fn new(table: impl Into<String>, backend: Arc<dyn TableBackend>) -> Self {
        Self {
            table: table.into(),
            backend,
        }
    }

    pub async fn query(
        &self,
        op: &'static str,
        params: QueryParams<'_>,
    ) -> Result<Vec<Item>, StoreError> {
        let values = marshal_object(op, &params.values)?;
        let spec = QuerySpec {
            table: self.table.clone(),
            index: params.index.map(str::to_owned),
            key_condition: params.key_condition.to_owned(),
            filter: params.filter.map(str::to_owned),
            values,
            ascending: params.ascending,
            limit: params.limit,
        };
        self.backend
            .query(spec)
            .await
            .map_err(|source| StoreError::Backend { op, source })
    }

    pub async fn put(&self, op: &'static str, doc: &Value) -> Result<(), StoreError> {
        let item = marshal_object(op, doc)?;
        self.backend
            .put_item(&self.table, item)
            .await
            .map_err(|source| StoreError::Backend { op, source })
    }

    pub async fn update(
        &self,
        op: &'static str,
        key: &Value,
        expression: &str,
        values: &Value,
    ) -> Result<(), StoreError> {
        let key = marshal_object(op, key)?;
        let values = marshal_object(op, values)?;
        self.backend
            .update_item(&self.table, key, expression, values)
            .await
            .map_err(|source| StoreError::Backend { op, source })
    }

    pub async fn delete(&self, op: &'static str, key: &Value) -> Result<(), StoreError> {
        let key = marshal_object(op, key)?;
        self.backend
            .delete_item(&self.table, key)
            .await
            .map_err(|source| StoreError::Backend { op, source })
    }

    pub async fn count(&self, op: &'static str) -> Result<i64, StoreError> {
        self.backend
            .item_count(&self.table)
            .await
            .map_err(|source| StoreError::Backend { op, source })
    }
}

/// Marshals a JSON object into native attribute values. The value must be
/// an object; bound-value maps and documents are always built as one.
pub fn marshal_object(op: &'static str, value: &Value) -> Result<Item, StoreError> {
    let map = value.as_object().ok_or(StoreError::Malformed {
        op,
        reason: "expected an object",
    })?;
    Ok(map
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect())
}

pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

pub fn from_attribute(av: &AttributeValue) -> Value {
    match av {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_value(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(from_attribute).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attribute(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(items.iter().map(|n| number_value(n)).collect()),
        _ => Value::Null,
    }
}

fn number_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn unmarshal_item<T: DeserializeOwned>(op: &'static str, item: &Item) -> Result<T, StoreError> {
    let map = item
        .iter()
        .map(|(k, v)| (k.clone(), from_attribute(v)))
        .collect();
    serde_json::from_value(Value::Object(map)).map_err(|source| StoreError::Document { op, source })
}

pub fn unmarshal_items<T: DeserializeOwned>(
    op: &'static str,
    items: &[Item],
) -> Result<Vec<T>, StoreError> {
    items.iter().map(|item| unmarshal_item(op, item)).collect()
}
