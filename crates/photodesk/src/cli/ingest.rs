//! The `photodesk ingest` command: local files into the library.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use photodesk_core::types::PhotoStatus;
use photodesk_core::{Config, FileDiscovery, IngestReport, OutputWriter};

use super::context::PipelineContext;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Image files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Title applied to every ingested photo
    #[arg(long)]
    pub title: Option<String>,

    /// Recorded as the creator of the new rows
    #[arg(long, env = "PHOTODESK_UPLOADER")]
    pub uploader: Option<String>,
}

/// Execute the ingest command.
pub async fn execute(config: Config, args: IngestArgs) -> anyhow::Result<()> {
    for path in &args.paths {
        if !path.exists() {
            anyhow::bail!(
                "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                path
            );
        }
    }

    let discovery = FileDiscovery::new(&config.processing);
    let files: Vec<_> = args
        .paths
        .iter()
        .flat_map(|path| discovery.discover(path))
        .collect();
    if files.is_empty() {
        tracing::warn!("No supported images found");
        return Ok(());
    }
    tracing::info!(
        "Found {} images ({:.1} MB)",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0
    );

    let pretty = config.output.pretty;
    let ctx = PipelineContext::open(config).await?;
    let mut output = OutputWriter::new(io::stdout(), pretty);
    let progress = (files.len() > 1).then(|| create_progress_bar(files.len() as u64));

    let mut summary = BatchSummary::default();
    let start = Instant::now();

    for file in files {
        let source = file.path.display().to_string();
        let size = file.size;
        let report = match file.into_upload(args.title.clone(), args.uploader.clone()).await {
            Ok(upload) => IngestReport::new(&source, &ctx.ingestor.ingest(upload).await),
            Err(e) => IngestReport::Failed {
                source: source.clone(),
                error: format!("cannot read file: {e}"),
                rejected: false,
            },
        };

        if let IngestReport::Failed { error, .. } = &report {
            tracing::error!("Failed: {source} - {error}");
        }
        summary.record(&report, size);
        emit(&mut output, &report, progress.as_ref())?;

        if let Some(pb) = &progress {
            pb.inc(1);
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                pb.set_message(format!("{:.1} img/sec", summary.total() as f64 / elapsed));
            }
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
        summary.print(start.elapsed());
    }
    drop(output);

    ctx.finish().await;

    if summary.ingested + summary.drafts == 0 {
        anyhow::bail!("No images were ingested");
    }
    Ok(())
}

/// Print a report line without tearing the progress bar.
fn emit<W: Write>(
    output: &mut OutputWriter<W>,
    report: &IngestReport,
    progress: Option<&ProgressBar>,
) -> io::Result<()> {
    match progress {
        Some(pb) => pb.suspend(|| output.line(report)),
        None => output.line(report),
    }
}

/// Create a progress bar for batch ingestion.
fn create_progress_bar(total: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Tally of a batch run.
#[derive(Debug, Default, PartialEq)]
struct BatchSummary {
    ingested: u64,
    /// Stored but left for `photodesk reprocess`
    drafts: u64,
    rejected: u64,
    failed: u64,
    bytes: u64,
}

impl BatchSummary {
    fn record(&mut self, report: &IngestReport, size: u64) {
        match report {
            IngestReport::Ingested { status, .. } => {
                self.bytes += size;
                match status {
                    PhotoStatus::Published => self.ingested += 1,
                    PhotoStatus::Draft => self.drafts += 1,
                }
            }
            IngestReport::Failed { rejected: true, .. } => self.rejected += 1,
            IngestReport::Failed { .. } => self.failed += 1,
        }
    }

    fn total(&self) -> u64 {
        self.ingested + self.drafts + self.rejected + self.failed
    }

    fn print(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let (rate, throughput) = if secs > 0.0 {
            (
                (self.ingested + self.drafts) as f64 / secs,
                self.bytes as f64 / 1_000_000.0 / secs,
            )
        } else {
            (0.0, 0.0)
        };

        eprintln!();
        eprintln!("  ====================================");
        eprintln!("               Summary");
        eprintln!("  ====================================");
        eprintln!("    Published:    {:>8}", self.ingested);
        if self.drafts > 0 {
            eprintln!("    Drafts:       {:>8}", self.drafts);
        }
        if self.rejected > 0 {
            eprintln!("    Rejected:     {:>8}", self.rejected);
        }
        if self.failed > 0 {
            eprintln!("    Failed:       {:>8}", self.failed);
        }
        eprintln!("  ------------------------------------");
        eprintln!("    Total:        {:>8}", self.total());
        eprintln!("    Duration:     {:>7.1}s", secs);
        eprintln!("    Rate:         {:>7.1} img/sec", rate);
        eprintln!("    Throughput:   {:>7.1} MB/sec", throughput);
        eprintln!("  ====================================");
        if self.drafts > 0 {
            eprintln!("  Run `photodesk reprocess --stale` to complete drafts.");
        }
    }
}
