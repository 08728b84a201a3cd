use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use logship::config::{Config, SinkConfig};
use logship::filter::RequestLogFilter;
use logship::queue::record_queue;
use logship::shipper::Shipper;
use logship::sink::{Sink, SinkError, StdoutSink};
use logship::traffic::simulate_requests;

#[derive(Parser)]
#[command(about = "Generates synthetic HTTP traffic and ships access-log records to a sink")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Override the configured run duration in seconds (0 = run forever)
    #[arg(long)]
    duration: Option<u64>,
}

/// Expand `${VAR_NAME}` patterns in a string with environment variable values.
/// Unknown vars become empty strings.
fn expand_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..start],
            value,
            &result[start + end + 1..]
        );
    }
    result
}

fn load_config(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let expanded = expand_env_vars(&contents);
            serde_yaml::from_str(&expanded).expect("Invalid config file")
        }
        Err(_) => {
            info!("No config file at {}, using defaults", path.display());
            Config::default()
        }
    }
}

async fn build_sink(config: &SinkConfig) -> Result<Box<dyn Sink>, SinkError> {
    match config {
        SinkConfig::Stdout {} => Ok(Box::new(StdoutSink)),
        SinkConfig::Elasticsearch(es_cfg) => {
            use logship::sink::elasticsearch::ElasticsearchSink;
            let sink = ElasticsearchSink::from_config(es_cfg.to_owned()).await?;
            info!(
                "Elasticsearch sink configured for index '{}'",
                es_cfg.index_name
            );
            Ok(Box::new(sink))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config);
    let duration = Duration::from_secs(args.duration.unwrap_or(config.run_duration_secs));

    info!(
        "Starting {} traffic sources; flushing up to {} records every {}ms after a {}ms delay",
        config.sources.len(),
        config.flush.max_batch,
        config.flush.flush_interval_ms,
        config.flush.initial_delay_ms,
    );

    // Provisioning failure is a one-time decision: the filter is built
    // disabled, producers run unaffected, and no flush task is spawned.
    let (filter, shipper_task) = match build_sink(&config.sink).await {
        Ok(sink) => {
            let (sender, queue) = record_queue();
            let shipper = Shipper::new(queue, sink, &config.flush);
            (
                RequestLogFilter::new(sender),
                Some(tokio::spawn(shipper.run())),
            )
        }
        Err(e) => {
            error!("request log shipping disabled, sink provisioning failed: {e}");
            (RequestLogFilter::disabled(), None)
        }
    };

    let mut sources = Vec::new();
    for source in &config.sources {
        let filter = filter.clone();
        let source = source.clone();
        sources.push(tokio::spawn(simulate_requests(source, filter, duration)));
    }
    drop(filter);

    for handle in sources {
        let _ = handle.await;
    }
    // Once every producer is gone the shipper drains what is left and exits.
    if let Some(task) = shipper_task {
        let _ = task.await;
    }

    info!("Done.");
}
