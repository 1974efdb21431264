//! Wiring shared by the commands that touch the library.

use std::sync::Arc;
use std::time::Duration;

use photodesk_core::{
    spawn_geocode_worker, Config, GeocodeEnricher, Ingestor, LocalBlobStore, MapboxGeocoder,
    PhotoStore, ReverseGeocoder, SqliteStore, YearsCache,
};
use tokio::task::JoinHandle;

/// How long `finish` waits for queued geocode jobs.
const GEOCODE_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Opened stores plus the ingestor and its background worker.
pub struct PipelineContext {
    pub ingestor: Ingestor,
    geocode_handle: Option<JoinHandle<()>>,
}

impl PipelineContext {
    /// Open the blob store and database named by `config` and start the
    /// geocode worker when a provider is configured.
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn PhotoStore> = Arc::new(open_store(&config)?);
        let blobs = LocalBlobStore::new(config.storage_root(), &config.storage.public_base_url)
            .await?;
        tracing::debug!(
            root = %config.storage_root().display(),
            database = %config.database_path().display(),
            "Opened library"
        );

        let years = Arc::new(YearsCache::new());
        let mut ingestor = Ingestor::new(config.clone(), Arc::new(blobs), store.clone())
            .with_years_cache(years);

        let geocoder = MapboxGeocoder::from_config(&config.geocode)
            .map(|g| Arc::new(g) as Arc<dyn ReverseGeocoder>);
        let geocode_handle = match geocoder {
            Some(geocoder) => {
                tracing::info!(provider = geocoder.name(), "Reverse geocoding enabled");
                let enricher = Arc::new(GeocodeEnricher::new(
                    Some(geocoder),
                    store,
                    config.retry.geocode,
                ));
                let worker = spawn_geocode_worker(enricher, config.geocode.queue_size, false);
                ingestor = ingestor.with_geocode_queue(worker.queue);
                Some(worker.handle)
            }
            None => {
                if config.geocode.enabled {
                    tracing::warn!("Geocoding enabled but no token resolved; skipping");
                }
                None
            }
        };

        Ok(Self {
            ingestor,
            geocode_handle,
        })
    }

    /// Drop the queue and wait for the worker to drain what was submitted.
    pub async fn finish(self) {
        let Self {
            ingestor,
            geocode_handle,
            ..
        } = self;
        // The ingestor owns the last queue handle
        drop(ingestor);

        let Some(handle) = geocode_handle else {
            return;
        };
        tracing::debug!("Waiting for geocode worker to drain");
        match tokio::time::timeout(GEOCODE_DRAIN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Geocode worker panicked: {e}"),
            Err(_) => tracing::warn!(
                "Geocode worker still busy after {}s; remaining jobs abandoned",
                GEOCODE_DRAIN_TIMEOUT.as_secs()
            ),
        }
    }
}

/// Open the database alone, for read-only commands.
pub fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    Ok(SqliteStore::open(&config.database_path())?)
}

/// Parse a photo id argument with a readable error.
pub fn parse_photo_id(value: &str) -> anyhow::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value.trim())
        .map_err(|e| anyhow::anyhow!("Invalid photo id {value:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.root = dir.join("blobs");
        config.database.path = dir.join("db").join("photodesk.db");
        config.geocode.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_open_creates_stores() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = PipelineContext::open(temp_config(dir.path())).await.unwrap();
        assert!(ctx.geocode_handle.is_none());
        assert!(dir.path().join("db").join("photodesk.db").exists());
        ctx.finish().await;
    }

    #[test]
    fn test_parse_photo_id() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_photo_id(&format!(" {id} ")).unwrap(), id);
        assert!(parse_photo_id("not-a-uuid").is_err());
    }
}
