pub mod config;
pub mod context;
pub mod ingest;
pub mod reprocess;
pub mod show;
pub mod years;
