use async_trait::async_trait;
use elasticsearch::{
    BulkOperation, BulkParts, Elasticsearch as EsClient,
    auth::Credentials,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::record::HttpLogRecord;
use crate::sink::{BulkOutcome, RecordFailure, Sink, SinkError};

fn default_index_name() -> String {
    "moqui_http_log".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_index_name")]
    pub index_name: String,
}

pub struct ElasticsearchSink {
    config: ElasticsearchConfig,
    client: EsClient,
}

impl ElasticsearchSink {
    /// Builds the client and provisions the index once. Any failure here
    /// means the shipper never starts.
    pub async fn from_config(config: ElasticsearchConfig) -> Result<Self, SinkError> {
        let url = config
            .url
            .parse()
            .map_err(|e| SinkError::Provisioning(format!("invalid url '{}': {e}", config.url)))?;
        let credentials = Credentials::Basic(config.user.clone(), config.password.clone());
        let conn_pool = SingleNodeConnectionPool::new(url);
        let transport = TransportBuilder::new(conn_pool)
            .auth(credentials)
            .build()
            .map_err(|e| SinkError::Provisioning(format!("failed to build transport: {e}")))?;
        let client = EsClient::new(transport);

        let sink = Self { config, client };
        sink.ensure_index().await?;
        Ok(sink)
    }

    /// Idempotent exists-then-create. The mapping pins every field type so
    /// the backend never has to guess from the first document.
    async fn ensure_index(&self) -> Result<(), SinkError> {
        let index_exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.config.index_name]))
            .send()
            .await
            .map_err(|e| SinkError::Provisioning(e.to_string()))?
            .status_code()
            == 200;

        if index_exists {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.config.index_name))
            .body(json!({
                "mappings": {
                    "properties": {
                        "@timestamp": { "type": "date", "format": "epoch_millis" },
                        "remote_ip": { "type": "ip" },
                        "remote_user": { "type": "keyword" },
                        "server_ip": { "type": "ip" },
                        "request_method": { "type": "keyword" },
                        "request_scheme": { "type": "keyword" },
                        "request_host": { "type": "keyword" },
                        "request_path": { "type": "text" },
                        "request_query": { "type": "text" },
                        "http_version": { "type": "half_float" },
                        "response": { "type": "integer" },
                        "bytes": { "type": "long" },
                        "referrer": { "type": "text" },
                        "agent": { "type": "text" }
                    }
                }
            }))
            .send()
            .await
            .map_err(|e| SinkError::Provisioning(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(SinkError::Provisioning(format!(
                "index creation for '{}' returned {}",
                self.config.index_name,
                response.status_code()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    async fn bulk_write(&self, batch: &[HttpLogRecord]) -> Result<BulkOutcome, SinkError> {
        let operations = batch
            .iter()
            .map(|record| BulkOperation::index(record.clone()).into())
            .collect::<Vec<BulkOperation<_>>>();

        let response = self
            .client
            .bulk(BulkParts::Index(&self.config.index_name))
            .body(operations)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status_code().is_success() {
            return Err(SinkError::Transient(format!(
                "bulk request returned {}",
                response.status_code()
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(classify_transport_error)?;

        if !body["errors"].as_bool().unwrap_or(false) {
            return Ok(BulkOutcome::Success);
        }
        let failures = body["items"]
            .as_array()
            .map(|items| collect_item_failures(items))
            .unwrap_or_default();
        Ok(BulkOutcome::Partial { failures })
    }
}

/// A permanently dead connection surfaces as an error message containing
/// "stopped"; everything else is worth retrying.
fn classify_transport_error(err: impl ToString) -> SinkError {
    let message = err.to_string();
    if message.to_lowercase().contains("stopped") {
        SinkError::Fatal(message)
    } else {
        SinkError::Transient(message)
    }
}

fn collect_item_failures(items: &[Value]) -> Vec<RecordFailure> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let op = item.get("index")?;
            let error = op.get("error")?;
            Some(RecordFailure {
                index,
                status: op.get("status").and_then(Value::as_u64).unwrap_or(0) as u16,
                reason: format!(
                    "{}: {}",
                    error.get("type").and_then(Value::as_str).unwrap_or("unknown"),
                    error
                        .get("reason")
                        .and_then(Value::as_str)
                        .unwrap_or("no reason given")
                ),
            })
        })
        .collect()
}
