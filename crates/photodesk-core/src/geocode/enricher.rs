//! Best-effort location enrichment for a single photo.
//!
//! The enricher never fails its caller: every problem ends up in a
//! [`GeocodeOutcome`] and a log line. Only empty location fields are ever
//! written, and emptiness is re-checked by the store at write time.

use super::provider::ReverseGeocoder;
use crate::error::GeocodeError;
use crate::pipeline::retry::{with_retry_when, RetryOutcome, RetryPolicy};
use crate::store::PhotoStore;
use crate::types::LocationFields;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A queued lookup for one photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeocodeJob {
    pub photo_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// The fields actually written (possibly none, if a manual edit won).
    Updated(LocationFields),
    Skipped(&'static str),
    Failed(String),
}

pub struct GeocodeEnricher {
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    store: Arc<dyn PhotoStore>,
    policy: RetryPolicy,
}

impl GeocodeEnricher {
    pub fn new(
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
        store: Arc<dyn PhotoStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            geocoder,
            store,
            policy,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.geocoder.is_some()
    }

    pub async fn enrich(&self, job: GeocodeJob) -> GeocodeOutcome {
        let Some(geocoder) = self.geocoder.as_ref() else {
            return GeocodeOutcome::Skipped("geocoder not configured");
        };

        let current = match self.store.location(job.photo_id).await {
            Ok(Some(current)) => current,
            Ok(None) => return GeocodeOutcome::Skipped("photo no longer exists"),
            Err(e) => {
                tracing::warn!(photo_id = %job.photo_id, "Failed to read location: {e}");
                return GeocodeOutcome::Failed(e.to_string());
            }
        };
        if current.is_complete() {
            return GeocodeOutcome::Skipped("location already populated");
        }

        let outcome = with_retry_when(
            &self.policy,
            |_| geocoder.reverse_geocode(job.latitude, job.longitude),
            GeocodeError::is_retryable,
        )
        .await;

        let place = match outcome {
            RetryOutcome::Success {
                value: Some(place),
                ..
            } => place,
            RetryOutcome::Success { value: None, .. } => {
                tracing::debug!(photo_id = %job.photo_id, "No geocoding match");
                return GeocodeOutcome::Skipped("no match for coordinates");
            }
            RetryOutcome::Failure { error, attempts } => {
                tracing::warn!(
                    photo_id = %job.photo_id,
                    provider = geocoder.name(),
                    attempts,
                    "Reverse geocoding failed: {error}"
                );
                return GeocodeOutcome::Failed(error.to_string());
            }
        };

        let candidate = LocationFields::from(place);
        match self.store.fill_location(job.photo_id, &candidate).await {
            Ok(written) => {
                tracing::debug!(photo_id = %job.photo_id, ?written, "Location filled");
                GeocodeOutcome::Updated(written)
            }
            Err(e) => {
                tracing::warn!(photo_id = %job.photo_id, "Failed to write location: {e}");
                GeocodeOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{tests_support, MemoryStore};
    use crate::types::GeocodedPlace;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Geocoder returning a scripted result per call index.
    pub(crate) struct MockGeocoder {
        response_fn:
            Box<dyn Fn(u32) -> Result<Option<GeocodedPlace>, GeocodeError> + Send + Sync>,
        pub(crate) call_count: Arc<AtomicU32>,
    }

    impl MockGeocoder {
        pub(crate) fn new(
            f: impl Fn(u32) -> Result<Option<GeocodedPlace>, GeocodeError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                response_fn: Box::new(f),
                call_count: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl ReverseGeocoder for MockGeocoder {
        fn name(&self) -> &str {
            "mock"
        }

        async fn reverse_geocode(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<Option<GeocodedPlace>, GeocodeError> {
            let n = self.call_count.fetch_add(1, Ordering::SeqCst);
            (self.response_fn)(n)
        }
    }

    pub(crate) fn sf_place() -> GeocodedPlace {
        GeocodedPlace {
            country: Some("United States".to_string()),
            region: Some("California".to_string()),
            city: Some("San Francisco".to_string()),
            place_name: Some("Embarcadero".to_string()),
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    async fn seeded_store() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let (asset, photo) = tests_support::sample_rows(None);
        store.insert_asset(&asset).await.unwrap();
        store.insert_photo(&photo).await.unwrap();
        (store, photo.id)
    }

    fn job(photo_id: Uuid) -> GeocodeJob {
        GeocodeJob {
            photo_id,
            latitude: 37.7749,
            longitude: -122.4194,
        }
    }

    #[tokio::test]
    async fn test_fills_only_empty_fields() {
        let (store, id) = seeded_store().await;
        store
            .update_photo(id, |p| p.city = Some("Oakland".to_string()))
            .unwrap();

        let geocoder = Arc::new(MockGeocoder::new(|_| Ok(Some(sf_place()))));
        let enricher = GeocodeEnricher::new(Some(geocoder), store.clone(), fast_policy(5));

        let outcome = enricher.enrich(job(id)).await;
        let GeocodeOutcome::Updated(written) = outcome else {
            panic!("expected update, got {outcome:?}");
        };
        assert_eq!(written.city, None);
        assert_eq!(written.country.as_deref(), Some("United States"));

        let loc = store.location(id).await.unwrap().unwrap();
        assert_eq!(loc.city.as_deref(), Some("Oakland"));
        assert_eq!(loc.region.as_deref(), Some("California"));
        assert_eq!(loc.place.as_deref(), Some("Embarcadero"));
    }

    #[tokio::test]
    async fn test_unconfigured_skips() {
        let (store, id) = seeded_store().await;
        let enricher = GeocodeEnricher::new(None, store, fast_policy(5));
        assert!(!enricher.is_configured());
        assert!(matches!(
            enricher.enrich(job(id)).await,
            GeocodeOutcome::Skipped(_)
        ));
    }

    #[tokio::test]
    async fn test_complete_location_skips_without_calling() {
        let (store, id) = seeded_store().await;
        store
            .update_photo(id, |p| {
                p.place = Some("a".to_string());
                p.city = Some("b".to_string());
                p.region = Some("c".to_string());
                p.country = Some("d".to_string());
            })
            .unwrap();
        let geocoder = Arc::new(MockGeocoder::new(|_| Ok(Some(sf_place()))));
        let calls = geocoder.call_count.clone();
        let enricher = GeocodeEnricher::new(Some(geocoder), store, fast_policy(5));

        assert!(matches!(
            enricher.enrich(job(id)).await,
            GeocodeOutcome::Skipped(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_photo_skips() {
        let store = Arc::new(MemoryStore::new());
        let geocoder = Arc::new(MockGeocoder::new(|_| Ok(Some(sf_place()))));
        let enricher = GeocodeEnricher::new(Some(geocoder), store, fast_policy(5));
        assert!(matches!(
            enricher.enrich(job(Uuid::new_v4())).await,
            GeocodeOutcome::Skipped(_)
        ));
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let (store, id) = seeded_store().await;
        let geocoder = Arc::new(MockGeocoder::new(|n| {
            if n < 2 {
                Err(GeocodeError::Http {
                    message: "HTTP 503".to_string(),
                    status_code: Some(503),
                })
            } else {
                Ok(Some(sf_place()))
            }
        }));
        let calls = geocoder.call_count.clone();
        let enricher = GeocodeEnricher::new(Some(geocoder), store, fast_policy(5));

        assert!(matches!(
            enricher.enrich(job(id)).await,
            GeocodeOutcome::Updated(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_early() {
        let (store, id) = seeded_store().await;
        let geocoder = Arc::new(MockGeocoder::new(|_| {
            Err(GeocodeError::Http {
                message: "HTTP 401".to_string(),
                status_code: Some(401),
            })
        }));
        let calls = geocoder.call_count.clone();
        let enricher = GeocodeEnricher::new(Some(geocoder), store.clone(), fast_policy(5));

        assert!(matches!(
            enricher.enrich(job(id)).await,
            GeocodeOutcome::Failed(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.location(id).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_timeouts_fail() {
        let (store, id) = seeded_store().await;
        let geocoder = Arc::new(MockGeocoder::new(|_| Err(GeocodeError::Timeout(2000))));
        let calls = geocoder.call_count.clone();
        let enricher = GeocodeEnricher::new(Some(geocoder), store, fast_policy(5));

        assert!(matches!(
            enricher.enrich(job(id)).await,
            GeocodeOutcome::Failed(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_no_match_skips() {
        let (store, id) = seeded_store().await;
        let geocoder = Arc::new(MockGeocoder::new(|_| Ok(None)));
        let enricher = GeocodeEnricher::new(Some(geocoder), store, fast_policy(5));
        assert!(matches!(
            enricher.enrich(job(id)).await,
            GeocodeOutcome::Skipped(_)
        ));
    }
}
