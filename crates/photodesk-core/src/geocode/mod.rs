//! Background reverse geocoding of photo locations.

pub mod enricher;
pub mod provider;
pub mod worker;

pub use enricher::{GeocodeEnricher, GeocodeJob, GeocodeOutcome};
pub use provider::{resolve_env_var, MapboxGeocoder, ReverseGeocoder};
pub use worker::{spawn_geocode_worker, GeocodeQueue, GeocodeWorker};
