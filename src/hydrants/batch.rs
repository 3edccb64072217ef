/// Batch hydrant upload state machine
///
/// At most one batch upload is active per process. Admission installs a
/// placeholder progress record under the mutex; the status endpoint and
/// the delete-all admission check read the same record. Processing runs
/// on a blocking task against the repository, publishing a snapshot
/// after every item.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::AlertHubError;
use crate::logger::{self, LogTag};
use crate::models::{BatchUploadProgress, FailedItem, Hydrant};

pub struct HydrantBatcher {
    db: Arc<Database>,
    active_upload: Arc<Mutex<Option<BatchUploadProgress>>>,
    cancel_flag: Arc<AtomicBool>,
}

impl HydrantBatcher {
    pub fn new(db: Arc<Database>) -> Arc<HydrantBatcher> {
        Arc::new(HydrantBatcher {
            db,
            active_upload: Arc::new(Mutex::new(None)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Admit a new batch upload
    ///
    /// Returns the batch id, or Conflict while another upload is in
    /// progress. A placeholder progress record is installed immediately
    /// so concurrent admissions and status reads observe the busy state.
    pub fn begin(&self) -> Result<String, AlertHubError> {
        let mut active = lock(&self.active_upload);
        if matches!(active.as_ref(), Some(p) if p.in_progress) {
            return Err(AlertHubError::Conflict(
                "Another batch upload is already in progress".to_string(),
            ));
        }

        *active = Some(BatchUploadProgress {
            in_progress: true,
            progress: 0.0,
            ..Default::default()
        });
        self.cancel_flag.store(false, Ordering::Relaxed);

        Ok(Uuid::new_v4().to_string())
    }

    /// Release the admission slot when the request body turned out to be
    /// unusable
    pub fn abort_admission(&self) {
        *lock(&self.active_upload) = None;
    }

    /// Snapshot of the current progress record
    pub fn status(&self) -> Option<BatchUploadProgress> {
        lock(&self.active_upload).clone()
    }

    /// Whether an upload is currently running
    pub fn upload_in_progress(&self) -> bool {
        matches!(lock(&self.active_upload).as_ref(), Some(p) if p.in_progress)
    }

    /// Request cancellation of the running upload (process shutdown)
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Detach batch processing onto a blocking task
    ///
    /// The caller has already admitted the batch via `begin`.
    pub fn spawn_processing(&self, hydrants: Vec<Hydrant>) {
        let db = self.db.clone();
        let active = self.active_upload.clone();
        let cancel = self.cancel_flag.clone();

        tokio::task::spawn_blocking(move || {
            let total = hydrants.len();
            let progress_active = active.clone();
            let progress = move |snapshot: BatchUploadProgress| {
                *lock(&progress_active) = Some(snapshot);
            };

            match db.save_many_hydrants(&hydrants, &cancel, &progress) {
                Ok(ids) => {
                    logger::info(
                        LogTag::Hydrants,
                        &format!("Batch upload completed ({} saved)", ids.len()),
                    );
                }
                Err(e) => {
                    logger::error(LogTag::Hydrants, &format!("Batch upload failed: {}", e));
                    // A commit-level failure fails the whole batch
                    *lock(&active) = Some(BatchUploadProgress {
                        total,
                        processed: total,
                        successful: 0,
                        failed: total,
                        progress: 100.0,
                        in_progress: false,
                        failed_items: vec![FailedItem {
                            index: 0,
                            error: e.to_string(),
                        }],
                    });
                }
            }
        });
    }
}

fn lock(slot: &Mutex<Option<BatchUploadProgress>>) -> std::sync::MutexGuard<'_, Option<BatchUploadProgress>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn batcher() -> Arc<HydrantBatcher> {
        HydrantBatcher::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn sample_hydrants(count: usize) -> Vec<Hydrant> {
        (0..count)
            .map(|i| Hydrant {
                id: format!("H{}", i),
                lat: 39.0 + i as f64 * 0.001,
                lng: -96.0,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_admission_is_exclusive() {
        let batcher = batcher();
        assert!(!batcher.upload_in_progress());

        let first = batcher.begin().unwrap();
        assert!(!first.is_empty());
        assert!(batcher.upload_in_progress());

        // Second admission is refused while the first is in progress
        assert!(matches!(batcher.begin(), Err(AlertHubError::Conflict(_))));

        // Releasing the slot re-opens admission
        batcher.abort_admission();
        assert!(batcher.begin().is_ok());
    }

    #[test]
    fn test_completed_upload_reopens_admission() {
        let batcher = batcher();
        batcher.begin().unwrap();

        // A finished progress record no longer blocks admission
        *lock(&batcher.active_upload) = Some(BatchUploadProgress {
            total: 5,
            processed: 5,
            successful: 5,
            progress: 100.0,
            in_progress: false,
            ..Default::default()
        });
        assert!(!batcher.upload_in_progress());
        assert!(batcher.begin().is_ok());
    }

    #[tokio::test]
    async fn test_processing_reaches_completion() {
        let batcher = batcher();
        batcher.begin().unwrap();
        batcher.spawn_processing(sample_hydrants(25));

        // Poll the status endpoint's view until the batch finishes
        let mut last = None;
        for _ in 0..200 {
            if let Some(progress) = batcher.status() {
                if !progress.in_progress && progress.processed == 25 {
                    last = Some(progress);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let progress = last.expect("batch never completed");
        assert_eq!(progress.total, 25);
        assert_eq!(progress.successful, 25);
        assert_eq!(progress.failed, 0);
        assert_eq!(progress.progress, 100.0);
        assert!(!batcher.upload_in_progress());
    }

    #[tokio::test]
    async fn test_cancelled_upload_ends_not_in_progress() {
        let batcher = batcher();
        batcher.begin().unwrap();
        batcher.cancel();
        batcher.spawn_processing(sample_hydrants(50));

        for _ in 0..200 {
            if let Some(progress) = batcher.status() {
                if !progress.in_progress {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cancelled batch never settled");
    }
}
