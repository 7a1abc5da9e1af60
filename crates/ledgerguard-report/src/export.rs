//! Bulk export of persisted events.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use tracing::info;

use ledgerguard_contracts::{
    error::{LedgerError, LedgerResult},
    query::QueryFilters,
};

use crate::query::QueryEngine;
use crate::render::{event_csv_row, EVENT_CSV_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// A single JSON array.
    Json,
    /// One JSON object per line.
    Jsonl,
    Csv,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Csv => "csv",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "ndjson" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(LedgerError::Validation {
                reason: format!("unknown export format '{s}' (expected json, jsonl or csv)"),
            }),
        }
    }
}

/// Write every event matching `filters` to `writer`, in chain order.
///
/// Returns the number of events written.
pub fn export_logs<W: Write>(
    engine: &QueryEngine,
    format: ExportFormat,
    filters: &QueryFilters,
    writer: &mut W,
) -> LedgerResult<usize> {
    let rows = engine.matching(filters)?;

    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, &rows)?;
            writeln!(writer).map_err(write_error)?;
        }
        ExportFormat::Jsonl => {
            for row in &rows {
                serde_json::to_writer(&mut *writer, row)?;
                writeln!(writer).map_err(write_error)?;
            }
        }
        ExportFormat::Csv => {
            writeln!(writer, "{EVENT_CSV_HEADER}").map_err(write_error)?;
            for row in &rows {
                writeln!(writer, "{}", event_csv_row(row)).map_err(write_error)?;
            }
        }
    }
    writer.flush().map_err(write_error)?;

    info!(%format, events = rows.len(), "events exported");
    Ok(rows.len())
}

fn write_error(e: std::io::Error) -> LedgerError {
    LedgerError::Persistence {
        reason: format!("failed to write export: {e}"),
    }
}
