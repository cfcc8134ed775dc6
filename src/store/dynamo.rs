use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::Client;

use super::{BackendError, Item, QuerySpec, TableBackend};

/// DynamoDB-backed [`TableBackend`]. Endpoint override points at a local
/// instance during development.
#[derive(Clone)]
pub struct DynamoBackend {
    client: Client,
}

impl DynamoBackend {
    pub fn new(config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

fn backend_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    BackendError(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl TableBackend for DynamoBackend {
    async fn query(&self, spec: QuerySpec) -> Result<Vec<Item>, BackendError> {
        let mut request = self
            .client
            .query()
            .table_name(&spec.table)
            .key_condition_expression(&spec.key_condition)
            .set_expression_attribute_values(Some(spec.values))
            .scan_index_forward(spec.ascending);
        if let Some(index) = &spec.index {
            request = request.index_name(index);
        }
        if let Some(filter) = &spec.filter {
            request = request.filter_expression(filter);
        }
        if let Some(limit) = spec.limit {
            request = request.limit(limit);
        }
        let out = request.send().await.map_err(backend_error)?;
        Ok(out.items.unwrap_or_default())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), BackendError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn update_item(
        &self,
        table: &str,
        key: Item,
        expression: &str,
        values: Item,
    ) -> Result<(), BackendError> {
        self.client
            .update_item()
            .table_name(table)
            .set_key(Some(key))
            .update_expression(expression)
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<(), BackendError> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn item_count(&self, table: &str) -> Result<i64, BackendError> {
        let out = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(out.table.and_then(|t| t.item_count).unwrap_or(0))
    }
}
