//! Binary entry point: configuration, connections, task fan-out.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use email_sentinel::broker::retry::RetryMonitor;
use email_sentinel::broker::RedisQueue;
use email_sentinel::store::PgStore;
use email_sentinel::worker;
use email_sentinel::{Config, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting email validation worker");
    if let Err(err) = dotenv_result {
        tracing::debug!(error = %err, "No .env file loaded, using process environment");
    }

    let config = Config::from_env().context("invalid configuration")?;

    if config.is_dev {
        tracing::info!(
            sink = %format!("{}:{}", config.dev_sink_host, config.dev_sink_port),
            "Running in DEV MODE - targeting the local delivery sink"
        );
    } else {
        tracing::info!("Running in PRODUCTION MODE - targeting real mail exchangers");
    }
    if let Some(proxy) = &config.proxy {
        tracing::info!(
            proxy = %proxy.address,
            authenticated = proxy.credentials().is_some(),
            "SOCKS5 egress configured"
        );
    }
    tracing::info!(identity = %config.worker_hostname, "Worker HELO identity");
    tracing::info!(
        rate = config.global_rate,
        burst = config.global_burst,
        "Rate governor initialized (global ceiling, domain-specific limits active)"
    );

    let queue = Arc::new(
        RedisQueue::connect(
            &config.redis_addr,
            config.redis_password.as_deref(),
            config.redis_db,
        )
        .await
        .context("failed to connect to Redis")?,
    );
    tracing::info!(addr = %config.redis_addr, "Connected to Redis");

    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .context("failed to connect to PostgreSQL")?,
    );
    tracing::info!("Connected to PostgreSQL");

    let services = Arc::new(
        Services::new(config, queue, store).context("failed to initialize services")?,
    );

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                cancel.cancel();
            }
        });
    }

    let (tx, rx) = mpsc::channel(services.config.queue_buffer);
    let worker_handles = worker::spawn_workers(&services, rx, &cancel);
    tracing::info!(count = services.config.worker_count, "Started workers");

    let monitor = RetryMonitor::new(
        Arc::clone(&services.queue),
        Arc::clone(&services.clock),
        services.config.retry_check_interval,
        services.config.retry_delay_secs,
    );
    let monitor_handle = tokio::spawn(monitor.run(cancel.clone()));
    tracing::info!(
        period = ?services.config.retry_check_interval,
        "Retry monitor started"
    );

    worker::run_dispatcher(Arc::clone(&services), tx, cancel.clone()).await;

    // The dispatcher only returns on cancellation; dropping its sender
    // lets the workers drain the channel and exit.
    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = monitor_handle.await;

    tracing::info!("Worker stopped");
    Ok(())
}
