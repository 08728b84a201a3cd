use serde::{Deserialize, Serialize};

use crate::sink::elasticsearch::ElasticsearchConfig;

fn default_max_batch() -> usize {
    50
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_initial_delay_ms() -> u64 {
    15_000
}

fn default_flush_interval_ms() -> u64 {
    5_000
}

/// Tunables for the background flush task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushConfig {
    /// Upper bound on records per bulk request.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Total attempts per batch before it is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retry attempts; 0 disables sleeping.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Stdout {},
    #[serde(rename = "elasticsearch")]
    Elasticsearch(ElasticsearchConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Stdout {}
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub flush: FlushConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    pub run_duration_secs: u64,
    pub sources: Vec<SourceConfig>,
}

/// One synthetic traffic source for the demo binary, roughly one virtual
/// host worth of requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub host: String,
    pub scheme: String,
    pub rate_per_sec: f64,
    pub status_weights: StatusWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusWeights {
    pub success: f64,
    pub redirect: f64,
    pub client_error: f64,
    pub server_error: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush: FlushConfig::default(),
            sink: SinkConfig::Stdout {},
            run_duration_secs: 30,
            sources: vec![
                SourceConfig {
                    host: "shop.example.com".into(),
                    scheme: "https".into(),
                    rate_per_sec: 120.0,
                    status_weights: StatusWeights {
                        success: 0.92,
                        redirect: 0.03,
                        client_error: 0.04,
                        server_error: 0.01,
                    },
                },
                SourceConfig {
                    host: "api.example.com".into(),
                    scheme: "https".into(),
                    rate_per_sec: 80.0,
                    status_weights: StatusWeights {
                        success: 0.85,
                        redirect: 0.01,
                        client_error: 0.11,
                        server_error: 0.03,
                    },
                },
                SourceConfig {
                    host: "admin.example.com".into(),
                    scheme: "https".into(),
                    rate_per_sec: 8.0,
                    status_weights: StatusWeights {
                        success: 0.7,
                        redirect: 0.1,
                        client_error: 0.18,
                        server_error: 0.02,
                    },
                },
            ],
        }
    }
}
