//! In-process job registry.
//!
//! Holds the status snapshot of every submitted job. Cloning shares the
//! underlying map, so the executor and its job tasks can update the same
//! entries concurrently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use vclean_models::{CleaningJob, JobId, JobStatus};

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, CleaningJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job.
    pub async fn create(&self) -> JobId {
        let id = JobId::new();
        self.jobs
            .write()
            .await
            .insert(id.clone(), CleaningJob::new(id.clone()));
        id
    }

    /// Snapshot of one job.
    pub async fn get(&self, id: &JobId) -> Option<CleaningJob> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Snapshot of every job, oldest first.
    pub async fn list(&self) -> Vec<CleaningJob> {
        let mut jobs: Vec<CleaningJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub async fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .count()
    }

    pub async fn start(&self, id: &JobId) -> WorkerResult<()> {
        self.update(id, |job| job.start()).await
    }

    pub async fn update_progress(&self, id: &JobId, progress: u8, message: String) -> WorkerResult<()> {
        self.update(id, |job| job.set_progress(progress, message)).await
    }

    pub async fn complete(&self, id: &JobId, output_path: PathBuf) -> WorkerResult<()> {
        self.update(id, |job| job.complete(output_path)).await
    }

    pub async fn fail(&self, id: &JobId, error: String) -> WorkerResult<()> {
        self.update(id, |job| job.fail(error)).await
    }

    async fn update(&self, id: &JobId, f: impl FnOnce(&mut CleaningJob)) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| WorkerError::job_not_found(id.as_str()))?;
        f(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let registry = JobRegistry::new();
        let id = registry.create().await;

        let job = registry.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        registry.start(&id).await.unwrap();
        registry
            .update_progress(&id, 50, "Processed 45/90 frames".to_string())
            .await
            .unwrap();
        let job = registry.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 50);

        registry.complete(&id, PathBuf::from("/out/clean.mp4")).await.unwrap();
        let job = registry.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.output_path, Some(PathBuf::from("/out/clean.mp4")));
    }

    #[tokio::test]
    async fn test_failed_job_keeps_message() {
        let registry = JobRegistry::new();
        let id = registry.create().await;
        registry.start(&id).await.unwrap();
        registry
            .fail(&id, "Failed to merge video and audio: exit 1".to_string())
            .await
            .unwrap();

        // Late progress reports do not revive a terminal job
        registry
            .update_progress(&id, 95, "Merging audio and video".to_string())
            .await
            .unwrap();

        let job = registry.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.message.starts_with("Failed: "));
        assert_eq!(registry.count_with_status(JobStatus::Failed).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = JobRegistry::new();
        let result = registry.start(&JobId::from_string("nope")).await;
        assert!(matches!(result, Err(WorkerError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = JobRegistry::new();
        let other = registry.clone();
        let id = registry.create().await;
        assert!(other.get(&id).await.is_some());
        assert_eq!(other.list().await.len(), 1);
    }
}
