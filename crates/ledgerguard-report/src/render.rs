//! JSON and CSV renderings of compliance reports and event rows.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use ledgerguard_contracts::{
    block::StoredEvent,
    error::{LedgerError, LedgerResult},
    report::ComplianceReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        })
    }
}

impl FromStr for ReportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(LedgerError::Validation {
                reason: format!("unknown report format '{s}' (expected json or csv)"),
            }),
        }
    }
}

// ── CSV ───────────────────────────────────────────────────────────────────────

/// Column header shared by every event CSV.
pub const EVENT_CSV_HEADER: &str = "id,timestamp,event_type,action,outcome,severity,actor_id,\
resource_type,resource_id,workspace_id,correlation_id,block_sequence_id,position";

/// Quote `value` if it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One CSV line (without the trailing newline) for `row`.
pub fn event_csv_row(row: &StoredEvent) -> String {
    let event = &row.event;
    let optional = |value: &Option<String>| csv_field(value.as_deref().unwrap_or(""));
    [
        event.id.to_string(),
        event.timestamp.to_rfc3339(),
        event.event_type.as_str().to_string(),
        csv_field(&event.action),
        event.outcome.as_str().to_string(),
        event.severity.as_str().to_string(),
        optional(&event.actor.id),
        csv_field(&event.resource.kind),
        csv_field(&event.resource.id),
        optional(&event.metadata.workspace_id),
        optional(&event.metadata.correlation_id),
        row.block_sequence_id.to_string(),
        row.position.to_string(),
    ]
    .join(",")
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// Render `report` as a string in `format`.
pub fn render_report(report: &ComplianceReport, format: ReportFormat) -> LedgerResult<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Csv => Ok(report_csv(report)),
    }
}

/// Write `report` to `writer` in `format`.
pub fn write_report<W: Write>(report: &ComplianceReport, format: ReportFormat, writer: &mut W) -> LedgerResult<()> {
    let rendered = render_report(report, format)?;
    writer
        .write_all(rendered.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|e| LedgerError::Persistence {
            reason: format!("failed to write report: {e}"),
        })
}

/// A `section,key,value` summary block, a blank line, then one row per
/// included event.
fn report_csv(report: &ComplianceReport) -> String {
    let metadata = &report.metadata;
    let summary = &report.summary;
    let mut out = String::from("section,key,value\n");
    let mut line = |section: &str, key: &str, value: String| {
        out.push_str(&format!("{section},{},{}\n", csv_field(key), csv_field(&value)));
    };

    line("metadata", "standard", metadata.standard.to_string());
    line(
        "metadata",
        "from",
        metadata.period.from.map(|t| t.to_rfc3339()).unwrap_or_default(),
    );
    line(
        "metadata",
        "to",
        metadata.period.to.map(|t| t.to_rfc3339()).unwrap_or_default(),
    );
    line(
        "metadata",
        "workspace_id",
        metadata.workspace_id.clone().unwrap_or_default(),
    );
    line("metadata", "generated_at", metadata.generated_at.to_rfc3339());
    line("summary", "total_events", summary.total_events.to_string());
    for (section, counts) in [
        ("action", &summary.by_action),
        ("resource_type", &summary.by_resource_type),
        ("outcome", &summary.by_outcome),
        ("severity", &summary.by_severity),
    ] {
        for (key, count) in counts {
            line(section, key, count.to_string());
        }
    }
    line("integrity", "is_valid", report.integrity.is_valid.to_string());
    line("integrity", "total_checked", report.integrity.total_checked.to_string());
    line("integrity", "issues", report.integrity.issues.len().to_string());

    out.push('\n');
    out.push_str(EVENT_CSV_HEADER);
    out.push('\n');

    let mut rows: Vec<&StoredEvent> = report.details.values().flatten().collect();
    rows.sort_by_key(|row| (row.block_sequence_id, row.position));
    for row in rows {
        out.push_str(&event_csv_row(row));
        out.push('\n');
    }
    out
}
