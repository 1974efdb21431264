//! The `photodesk show` command.

use std::io;

use clap::Args;
use photodesk_core::{Config, OutputWriter, PhotoStore};

use super::context::{open_store, parse_photo_id};

/// Arguments for the `show` command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Photo id
    pub id: String,

    /// Pretty-print regardless of `output.pretty`
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the show command.
pub async fn execute(config: Config, args: ShowArgs) -> anyhow::Result<()> {
    let id = parse_photo_id(&args.id)?;
    let store = open_store(&config)?;
    let Some(record) = store.get_photo(id).await? else {
        anyhow::bail!("No photo with id {id}");
    };
    if photodesk_core::needs_reprocessing(&record) {
        tracing::warn!(photo_id = %id, "Photo is incomplete; run `photodesk reprocess {id}`");
    }

    let mut output = OutputWriter::new(io::stdout(), args.pretty || config.output.pretty);
    output.document(&record)?;
    Ok(())
}
