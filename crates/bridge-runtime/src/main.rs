//! # SNS Bridge Runtime
//!
//! Runs one consumer for one channel URI.
//!
//! ## Startup Sequence
//!
//! 1. Parse arguments (flags or `BRIDGE_*` environment)
//! 2. Initialise logging and metrics
//! 3. Load the SDK configuration for the region
//! 4. Build the endpoint and start the consumer (provision, subscribe, poll)
//! 5. Wait for Ctrl-C, then stop (cancel polling, unsubscribe, tear down)

use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use tracing::info;

use bridge_runtime::{LoggingDownstream, PrometheusObserver, RuntimeArgs};
use bridge_telemetry::{encode_metrics, init_telemetry, TelemetryConfig, CONSUMERS_RUNNING};
use sns_bridge::adapters::aws::{SnsNotificationService, SqsQueueService};
use sns_bridge::{HttpCertificateSource, SnsEndpoint};

#[tokio::main]
async fn main() -> Result<()> {
    let args = RuntimeArgs::parse();

    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("failed to initialise telemetry")?;

    let config = args
        .endpoint_config()
        .with_context(|| format!("invalid channel {}", args.redacted_channel()))?;

    info!(channel = %args.redacted_channel(), region = %args.region, "Starting SNS bridge");

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(args.region.clone()))
        .load()
        .await;
    let notifications = Arc::new(SnsNotificationService::new(&sdk_config, &config.credentials));
    let queues = Arc::new(SqsQueueService::new(&sdk_config, &config.credentials));

    let mut endpoint = SnsEndpoint::new(config, notifications, queues);
    if let Some(url) = &args.certificate_url {
        endpoint = endpoint.with_key_source(Arc::new(HttpCertificateSource::with_url(url.clone())));
    }
    let endpoint = Arc::new(endpoint);

    let consumer = endpoint
        .create_consumer(Arc::new(LoggingDownstream::new()))
        .with_observer(Arc::new(PrometheusObserver::new()));

    consumer
        .start()
        .await
        .with_context(|| format!("failed to start {consumer}"))?;
    CONSUMERS_RUNNING.inc();

    info!("Bridge is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    consumer.stop().await;
    CONSUMERS_RUNNING.dec();

    if args.dump_metrics {
        println!("{}", encode_metrics()?);
    }
    Ok(())
}
