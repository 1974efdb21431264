//! The `photodesk reprocess` command.

use std::io;

use clap::Args;
use photodesk_core::{needs_reprocessing, Config, IngestReport, OutputWriter, PhotoStore};
use uuid::Uuid;

use super::context::{parse_photo_id, PipelineContext};

/// Arguments for the `reprocess` command.
#[derive(Args, Debug)]
pub struct ReprocessArgs {
    /// Photo to regenerate
    #[arg(required_unless_present = "stale", conflicts_with = "stale")]
    pub id: Option<String>,

    /// Reprocess every draft or photo missing renditions or derived fields
    #[arg(long)]
    pub stale: bool,
}

/// Execute the reprocess command.
pub async fn execute(config: Config, args: ReprocessArgs) -> anyhow::Result<()> {
    let pretty = config.output.pretty;
    let ctx = PipelineContext::open(config).await?;

    let targets = match &args.id {
        Some(id) => vec![parse_photo_id(id)?],
        None => stale_photos(ctx.ingestor.store().as_ref()).await?,
    };
    if targets.is_empty() {
        tracing::info!("Nothing to reprocess");
        ctx.finish().await;
        return Ok(());
    }
    tracing::info!("Reprocessing {} photos", targets.len());

    let mut output = OutputWriter::new(io::stdout(), pretty);
    let mut failed = 0usize;
    for id in &targets {
        let report = IngestReport::new(&id.to_string(), &ctx.ingestor.reprocess(*id).await);
        if let IngestReport::Failed { error, .. } = &report {
            tracing::error!(photo_id = %id, "Reprocess failed: {error}");
            failed += 1;
        }
        output.line(&report)?;
    }

    ctx.finish().await;

    if failed > 0 {
        anyhow::bail!("{failed} of {} photos failed to reprocess", targets.len());
    }
    Ok(())
}

/// Ids of every photo the pipeline left incomplete.
pub async fn stale_photos(store: &dyn PhotoStore) -> anyhow::Result<Vec<Uuid>> {
    let mut stale = Vec::new();
    for photo in store.list_photos().await? {
        match store.get_photo(photo.id).await? {
            Some(record) if needs_reprocessing(&record) => stale.push(photo.id),
            _ => {}
        }
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use photodesk_core::Upload;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_stale_photos_tracks_missing_renditions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.root = dir.path().join("blobs");
        config.database.path = dir.path().join("photodesk.db");
        config.geocode.enabled = false;
        let ctx = PipelineContext::open(config).await.unwrap();
        let store = ctx.ingestor.store().clone();

        let outcome = ctx
            .ingestor
            .ingest(Upload {
                bytes: png(80, 60),
                filename: "dark.png".to_string(),
                content_type: None,
                uploader_id: None,
                title: None,
            })
            .await
            .unwrap();
        assert!(stale_photos(store.as_ref()).await.unwrap().is_empty());

        store.delete_renditions(outcome.photo_id).await.unwrap();
        assert_eq!(
            stale_photos(store.as_ref()).await.unwrap(),
            vec![outcome.photo_id]
        );

        ctx.ingestor.reprocess(outcome.photo_id).await.unwrap();
        assert!(stale_photos(store.as_ref()).await.unwrap().is_empty());
        ctx.finish().await;
    }
}
