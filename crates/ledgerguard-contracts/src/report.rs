//! Compliance report types.
//!
//! A `ComplianceReport` is a structural document. JSON and CSV renderings
//! are produced from the same value by the report crate.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    block::StoredEvent,
    error::LedgerError,
    event::EventType,
    integrity::IntegrityReport,
    query::DateRange,
};

/// A regulatory framework with a fixed event-type subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStandard {
    #[serde(rename = "GDPR")]
    Gdpr,
    #[serde(rename = "HIPAA")]
    Hipaa,
    #[serde(rename = "SOC2")]
    Soc2,
    #[serde(rename = "ISO27001")]
    Iso27001,
    #[serde(rename = "PCI-DSS")]
    PciDss,
}

impl ComplianceStandard {
    pub const ALL: [ComplianceStandard; 5] = [
        ComplianceStandard::Gdpr,
        ComplianceStandard::Hipaa,
        ComplianceStandard::Soc2,
        ComplianceStandard::Iso27001,
        ComplianceStandard::PciDss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStandard::Gdpr => "GDPR",
            ComplianceStandard::Hipaa => "HIPAA",
            ComplianceStandard::Soc2 => "SOC2",
            ComplianceStandard::Iso27001 => "ISO27001",
            ComplianceStandard::PciDss => "PCI-DSS",
        }
    }

    /// The event types a report for this standard covers.
    pub fn event_types(&self) -> &'static [EventType] {
        use EventType::*;
        match self {
            ComplianceStandard::Gdpr => &[DataAccess, DataModification, Authorization],
            ComplianceStandard::Hipaa => &[DataAccess, DataModification, Authentication, SecurityEvent],
            ComplianceStandard::Soc2 => &[
                Authentication,
                Authorization,
                DataAccess,
                DataModification,
                SecurityEvent,
                SystemConfiguration,
                UserManagement,
            ],
            ComplianceStandard::Iso27001 => &[
                Authentication,
                Authorization,
                SecurityEvent,
                SystemConfiguration,
                PolicyChange,
            ],
            ComplianceStandard::PciDss => &[DataAccess, DataModification, Authentication, SecurityEvent],
        }
    }
}

impl fmt::Display for ComplianceStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceStandard {
    type Err = LedgerError;

    /// Accepts the canonical names case-insensitively, with `-`, `_` or
    /// nothing between `PCI` and `DSS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match key.as_str() {
            "GDPR" => Ok(ComplianceStandard::Gdpr),
            "HIPAA" => Ok(ComplianceStandard::Hipaa),
            "SOC2" => Ok(ComplianceStandard::Soc2),
            "ISO27001" => Ok(ComplianceStandard::Iso27001),
            "PCIDSS" => Ok(ComplianceStandard::PciDss),
            _ => Err(LedgerError::Validation {
                reason: format!("unknown compliance standard '{s}'"),
            }),
        }
    }
}

/// Who and what the report covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub standard: ComplianceStandard,
    pub period: DateRange,
    pub workspace_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub included_event_types: Vec<EventType>,
}

/// Aggregate counts over the in-scope events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_resource_type: BTreeMap<String, usize>,
    pub by_outcome: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
}

/// A self-attesting compliance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    /// In-scope events grouped by event type, in chain order.
    pub details: BTreeMap<EventType, Vec<StoredEvent>>,
    /// The chain verification result at generation time.
    pub integrity: IntegrityReport,
}
