//! Job executor.
//!
//! Runs cleaning requests as background jobs, bounded by a semaphore, and
//! folds pipeline progress into the [`JobRegistry`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};
use vclean_media::{
    default_engine, CaptionRegionDetector, CleaningOrchestrator, InpaintingEngine,
    ProgressReporter,
};
use vclean_models::{CleaningRequest, JobId};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::registry::JobRegistry;

/// Executes cleaning jobs concurrently.
pub struct JobExecutor {
    config: WorkerConfig,
    orchestrator: Arc<CleaningOrchestrator>,
    registry: JobRegistry,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl JobExecutor {
    /// Create an executor with the default inpainting engine.
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        Self::with_engine(config, default_engine())
    }

    /// Create an executor around a specific engine.
    pub fn with_engine(config: WorkerConfig, engine: Arc<dyn InpaintingEngine>) -> WorkerResult<Self> {
        config.validate()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let orchestrator = CleaningOrchestrator::new(
            engine,
            Arc::new(CaptionRegionDetector::default()),
            config.cleaning_config(),
        )
        .with_cancel(shutdown_rx);

        Ok(Self {
            job_semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            config,
            orchestrator: Arc::new(orchestrator),
            registry: JobRegistry::new(),
            shutdown,
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Queue a request; it starts once a job slot is free.
    pub async fn submit(&self, request: CleaningRequest) -> JobId {
        let job_id = self.registry.create().await;

        let orchestrator = Arc::clone(&self.orchestrator);
        let registry = self.registry.clone();
        let semaphore = Arc::clone(&self.job_semaphore);
        let id = job_id.clone();

        self.tasks.lock().await.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = registry.fail(&id, "Executor closed".to_string()).await;
                    return;
                }
            };
            Self::execute_job(orchestrator, registry, id, request).await;
        });

        info!(job_id = %job_id, "Job submitted");
        job_id
    }

    /// Wait until every submitted job has reached a terminal state.
    pub async fn wait_all(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Job task ended abnormally: {}", e);
            }
        }
    }

    /// Ask running jobs to stop at their next checkpoint.
    pub fn shutdown(&self) {
        info!("Shutdown requested, cancelling in-flight jobs");
        let _ = self.shutdown.send(true);
    }

    async fn execute_job(
        orchestrator: Arc<CleaningOrchestrator>,
        registry: JobRegistry,
        job_id: JobId,
        request: CleaningRequest,
    ) {
        let logger = JobLogger::new(&job_id, "video_cleaning");
        let span = logger.create_span();

        async move {
            logger.log_start(&format!(
                "{} -> {} ({})",
                request.input_path.display(),
                request.output_path.display(),
                request.mask_mode().as_str()
            ));

            match Self::run_job(&orchestrator, &registry, &job_id, &request, &logger).await {
                Ok(output_path) => {
                    if let Err(e) = registry.complete(&job_id, output_path).await {
                        logger.log_failure(&e);
                    }
                }
                Err(e) => {
                    logger.log_failure(&e);
                    if let Err(e) = registry.fail(&job_id, e.to_string()).await {
                        logger.log_failure(&e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_job(
        orchestrator: &CleaningOrchestrator,
        registry: &JobRegistry,
        job_id: &JobId,
        request: &CleaningRequest,
        logger: &JobLogger,
    ) -> WorkerResult<std::path::PathBuf> {
        registry.start(job_id).await?;

        // The pipeline reports synchronously; updates are applied in order by
        // a forwarding task so the registry lock is never taken from a callback
        let (tx, mut rx) = mpsc::unbounded_channel::<(u8, String)>();
        let progress = ProgressReporter::from_fn(move |percent, message| {
            let _ = tx.send((percent, message.to_string()));
        });

        let forward_registry = registry.clone();
        let forward_id = job_id.clone();
        let forward_logger = logger.clone();
        let forwarder = tokio::spawn(async move {
            while let Some((percent, message)) = rx.recv().await {
                forward_logger.log_progress(percent, &message);
                if forward_registry
                    .update_progress(&forward_id, percent, message)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let result = orchestrator.process_request(request, &progress).await;

        // Closing the channel lets the forwarder drain and exit
        drop(progress);
        if let Err(e) = forwarder.await {
            warn!(job_id = %job_id, "Progress forwarder ended abnormally: {}", e);
        }

        let outcome = result.map_err(WorkerError::from)?;
        logger.log_completion(&outcome);
        Ok(outcome.output_path)
    }
}
