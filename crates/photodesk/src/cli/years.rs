//! The `photodesk years` command.

use photodesk_core::{Config, YearsCache};

use super::context::open_store;

/// Execute the years command.
pub async fn execute(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let years = YearsCache::new().get(&store).await?;
    if years.is_empty() {
        tracing::info!("No photos with a capture date yet");
    }
    for year in years {
        println!("{year}");
    }
    Ok(())
}
