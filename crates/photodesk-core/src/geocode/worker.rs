//! Background worker that drains geocode jobs off the ingestion path.
//!
//! Producers hold a [`GeocodeQueue`] and never wait on it: when the buffer is
//! full or the worker is gone, the job is dropped with a log line. The worker
//! exits once every queue handle has been dropped and the buffer is empty.

use super::enricher::{GeocodeEnricher, GeocodeJob, GeocodeOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Cloneable, non-blocking handle for submitting jobs.
#[derive(Clone)]
pub struct GeocodeQueue {
    sender: mpsc::Sender<GeocodeJob>,
}

impl GeocodeQueue {
    /// Enqueue a job without waiting. Returns `false` if it was dropped.
    pub fn submit(&self, job: GeocodeJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(photo_id = %job.photo_id, "Geocode queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(photo_id = %job.photo_id, "Geocode worker stopped, dropping job");
                false
            }
        }
    }
}

pub struct GeocodeWorker {
    pub queue: GeocodeQueue,
    /// Present when the worker was spawned with reporting enabled.
    pub outcomes: Option<mpsc::Receiver<(GeocodeJob, GeocodeOutcome)>>,
    pub handle: JoinHandle<()>,
}

/// Spawn the worker task on the current runtime.
pub fn spawn_geocode_worker(
    enricher: Arc<GeocodeEnricher>,
    buffer: usize,
    report: bool,
) -> GeocodeWorker {
    let (sender, mut input) = mpsc::channel::<GeocodeJob>(buffer.max(1));
    let (mut report_tx, outcomes) = if report {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    let handle = tokio::spawn(async move {
        while let Some(job) = input.recv().await {
            let outcome = enricher.enrich(job).await;
            match &outcome {
                GeocodeOutcome::Updated(written) => {
                    tracing::info!(photo_id = %job.photo_id, ?written, "Geocoded photo")
                }
                GeocodeOutcome::Skipped(reason) => {
                    tracing::debug!(photo_id = %job.photo_id, reason, "Geocode skipped")
                }
                GeocodeOutcome::Failed(message) => {
                    tracing::warn!(photo_id = %job.photo_id, "Geocode failed: {message}")
                }
            }
            if let Some(tx) = report_tx.as_ref() {
                if tx.send((job, outcome)).await.is_err() {
                    // Reader gone; keep enriching silently
                    report_tx = None;
                }
            }
        }
        tracing::debug!("Geocode worker finished");
    });

    GeocodeWorker {
        queue: GeocodeQueue { sender },
        outcomes,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::enricher::tests::{sf_place, MockGeocoder};
    use crate::pipeline::retry::RetryPolicy;
    use crate::store::{tests_support, MemoryStore, PhotoStore};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_worker_processes_and_reports() {
        let store = Arc::new(MemoryStore::new());
        let (asset, photo) = tests_support::sample_rows(None);
        store.insert_asset(&asset).await.unwrap();
        store.insert_photo(&photo).await.unwrap();

        let geocoder = Arc::new(MockGeocoder::new(|_| Ok(Some(sf_place()))));
        let enricher = Arc::new(GeocodeEnricher::new(
            Some(geocoder),
            store.clone(),
            RetryPolicy::default(),
        ));
        let GeocodeWorker {
            queue,
            outcomes,
            handle,
        } = spawn_geocode_worker(enricher, 4, true);
        let mut outcomes = outcomes.unwrap();

        assert!(queue.submit(GeocodeJob {
            photo_id: photo.id,
            latitude: 37.0,
            longitude: -122.0,
        }));
        drop(queue);

        let (job, outcome) = outcomes.recv().await.unwrap();
        assert_eq!(job.photo_id, photo.id);
        assert!(matches!(outcome, GeocodeOutcome::Updated(_)));
        handle.await.unwrap();

        let loc = store.location(photo.id).await.unwrap().unwrap();
        assert!(loc.is_complete());
    }

    #[tokio::test]
    async fn test_submit_after_worker_stops() {
        let store = Arc::new(MemoryStore::new());
        let enricher = Arc::new(GeocodeEnricher::new(None, store, RetryPolicy::default()));
        let worker = spawn_geocode_worker(enricher, 1, false);
        assert!(worker.outcomes.is_none());
        worker.handle.abort();
        let _ = worker.handle.await;

        let accepted = worker.queue.submit(GeocodeJob {
            photo_id: Uuid::new_v4(),
            latitude: 0.0,
            longitude: 0.0,
        });
        assert!(!accepted);
    }
}
