//! Video cleaning worker binary.
//!
//! Usage: `vclean-worker <manifest.json>`

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vclean_models::JobStatus;
use vclean_worker::{load_manifest, JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vclean=info".parse()?)
        .add_directive("vclean_media=info".parse()?)
        .add_directive("vclean_worker=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let manifest_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: vclean-worker <manifest.json>")?;

    info!("Starting vclean-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to start Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let requests = load_manifest(&manifest_path, &config)
        .await
        .with_context(|| format!("failed to load manifest {}", manifest_path.display()))?;
    info!(jobs = requests.len(), "Loaded manifest");

    let executor = JobExecutor::new(config)?;
    for request in requests {
        executor.submit(request).await;
    }

    tokio::select! {
        _ = executor.wait_all() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            executor.shutdown();
            executor.wait_all().await;
        }
    }

    let jobs = executor.registry().list().await;
    let mut failed = 0;
    for job in &jobs {
        match job.status {
            JobStatus::Completed => info!(
                job_id = %job.id,
                output = ?job.output_path,
                "Job completed"
            ),
            _ => {
                failed += 1;
                error!(
                    job_id = %job.id,
                    status = job.status.as_str(),
                    error = job.error.as_deref().unwrap_or("unknown"),
                    "Job did not complete"
                );
            }
        }
    }

    info!("Worker shutdown complete");

    if failed > 0 {
        bail!("{} of {} jobs failed", failed, jobs.len());
    }
    Ok(())
}
