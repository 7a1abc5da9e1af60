//! Audit event types.
//!
//! An `AuditEvent` is one security-relevant occurrence reported by a
//! producer. Once handed to the audit service it is immutable: it is sealed
//! into exactly one block and never updated or deleted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Closed vocabulary of event categories shared by producers and reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Authentication,
    Authorization,
    DataAccess,
    DataModification,
    SystemConfiguration,
    PolicyChange,
    UserManagement,
    WorkflowExecution,
    ApiAccess,
    ToolExecution,
    SecurityEvent,
    ComplianceEvent,
}

impl EventType {
    /// Every variant, in declaration order.
    pub const ALL: [EventType; 12] = [
        EventType::Authentication,
        EventType::Authorization,
        EventType::DataAccess,
        EventType::DataModification,
        EventType::SystemConfiguration,
        EventType::PolicyChange,
        EventType::UserManagement,
        EventType::WorkflowExecution,
        EventType::ApiAccess,
        EventType::ToolExecution,
        EventType::SecurityEvent,
        EventType::ComplianceEvent,
    ];

    /// The wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Authentication => "authentication",
            EventType::Authorization => "authorization",
            EventType::DataAccess => "data_access",
            EventType::DataModification => "data_modification",
            EventType::SystemConfiguration => "system_configuration",
            EventType::PolicyChange => "policy_change",
            EventType::UserManagement => "user_management",
            EventType::WorkflowExecution => "workflow_execution",
            EventType::ApiAccess => "api_access",
            EventType::ToolExecution => "tool_execution",
            EventType::SecurityEvent => "security_event",
            EventType::ComplianceEvent => "compliance_event",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LedgerError::Validation {
                reason: format!("unknown event type '{s}'"),
            })
    }
}

/// How the reported action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Error,
    Pending,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Error => "error",
            Outcome::Pending => "pending",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            "error" => Ok(Outcome::Error),
            "pending" => Ok(Outcome::Pending),
            _ => Err(LedgerError::Validation {
                reason: format!("unknown outcome '{s}'"),
            }),
        }
    }
}

/// Event severity.
///
/// The derived `Ord` follows declaration order, so `Info < Notice < Warning
/// < Error < Critical`. "Minimum severity" filters rely on this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "notice" => Ok(Severity::Notice),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(LedgerError::Validation {
                reason: format!("unknown severity '{s}'"),
            }),
        }
    }
}

/// Who performed the action. Every field is optional: system-originated
/// events often have no human actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    pub username: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl Actor {
    /// An actor identified only by id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// What the action touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: Option<String>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            name: None,
        }
    }
}

/// Correlation data attached by the producer.
///
/// `extra` holds any additional keys; it is a `BTreeMap` so the canonical
/// serialization is key-ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub workspace_id: Option<String>,
    pub correlation_id: Option<String>,
    pub trace_id: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One security-relevant occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique id, assigned when the event is constructed.
    pub id: Uuid,
    pub event_type: EventType,
    /// Free-form verb, e.g. `"user.login"`.
    pub action: String,
    #[serde(default)]
    pub actor: Actor,
    pub resource: Resource,
    pub outcome: Outcome,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Opaque producer payload. The audit chain never inspects it.
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl AuditEvent {
    /// Create an event stamped now, with a successful `info` outcome and no
    /// actor, details or metadata. Use the `with_*` builders to fill the rest.
    pub fn new(event_type: EventType, action: impl Into<String>, resource: Resource) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            action: action.into(),
            actor: Actor::default(),
            resource,
            outcome: Outcome::Success,
            severity: Severity::Info,
            timestamp: Utc::now(),
            details: serde_json::Value::Null,
            metadata: EventMetadata::default(),
        }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.metadata.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Critical events force an immediate flush and survive buffer trimming.
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
