//! Machine-readable output: one JSON line per ingestion result, or a single
//! JSON document for lookups.

use serde::Serialize;
use std::io::{self, Write};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::types::{IngestOutcome, PhotoStatus};

/// One line of batch output.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IngestReport {
    Ingested {
        source: String,
        photo_id: Uuid,
        status: PhotoStatus,
        detail_url: String,
    },
    Failed {
        source: String,
        error: String,
        /// The input was refused rather than lost to an infrastructure fault
        rejected: bool,
    },
}

impl IngestReport {
    pub fn new(source: &str, result: &Result<IngestOutcome, PipelineError>) -> Self {
        match result {
            Ok(outcome) => IngestReport::Ingested {
                source: source.to_string(),
                photo_id: outcome.photo_id,
                status: outcome.status,
                detail_url: outcome.detail_url.clone(),
            },
            Err(e) => IngestReport::Failed {
                source: source.to_string(),
                error: e.to_string(),
                rejected: e.is_validation(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IngestReport::Ingested { .. })
    }
}

/// Serializes records to a writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    pretty: bool,
    lines_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`OutputWriter::document`]; lines are always compact.
    pub fn new(writer: W, pretty: bool) -> Self {
        Self {
            writer,
            pretty,
            lines_written: 0,
        }
    }

    /// Write one compact JSON line and flush, so consumers can stream.
    pub fn line<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        self.lines_written += 1;
        Ok(())
    }

    /// Write a standalone JSON document.
    pub fn document<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
