//! Inbound event validator.
//!
//! `EventValidator` guards the producer boundary. Events that fail are
//! rejected with `LedgerError::Validation` before they reach the buffer, so
//! nothing malformed is ever sealed into the chain.
//!
//! Validation runs in up to two phases:
//!
//! 1. **Structural**: raw JSON submissions are checked against the built-in
//!    event JSON Schema using the `jsonschema` crate.
//! 2. **Semantic**: typed events are checked against the built-in rules and
//!    any custom rules registered by the host. All failures are collected
//!    before returning so producers see the full failure set in one pass.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use ledgerguard_contracts::{
    error::{LedgerError, LedgerResult},
    event::{AuditEvent, EventType},
};

/// Longest accepted `action` string.
pub const MAX_ACTION_LEN: usize = 256;

/// A caller-supplied semantic rule.
///
/// Returns `Some(message)` when the event fails the rule, `None` otherwise.
pub type CustomRuleFn = Box<dyn Fn(&AuditEvent) -> Option<String> + Send + Sync>;

/// The result of validating one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True only if every rule passed.
    pub passed: bool,
    pub failures: Vec<ValidationFailure>,
}

/// A single rule failure within a `ValidationReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub rule_id: String,
    pub message: String,
}

impl ValidationReport {
    fn from_failures(failures: Vec<ValidationFailure>) -> Self {
        Self {
            passed: failures.is_empty(),
            failures,
        }
    }

    /// Convert a failing report into `LedgerError::Validation`.
    pub fn into_result(self) -> LedgerResult<()> {
        if self.passed {
            return Ok(());
        }
        let reason = self
            .failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(LedgerError::Validation { reason })
    }
}

/// The JSON Schema every raw event submission must satisfy.
pub fn event_json_schema() -> Value {
    let event_types: Vec<&str> = EventType::ALL.iter().map(|t| t.as_str()).collect();
    let optional_string = json!({ "type": ["string", "null"] });
    json!({
        "type": "object",
        "required": ["event_type", "action", "resource", "outcome", "severity"],
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "event_type": { "enum": event_types },
            "action": { "type": "string", "minLength": 1, "maxLength": MAX_ACTION_LEN },
            "actor": {
                "type": "object",
                "properties": {
                    "id": optional_string,
                    "username": optional_string,
                    "ip": optional_string,
                    "user_agent": optional_string,
                    "session_id": optional_string
                }
            },
            "resource": {
                "type": "object",
                "required": ["type", "id"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 },
                    "id": { "type": "string", "minLength": 1 },
                    "name": optional_string
                }
            },
            "outcome": { "enum": ["success", "failure", "error", "pending"] },
            "severity": { "enum": ["info", "notice", "warning", "error", "critical"] },
            "timestamp": { "type": "string" },
            "metadata": {
                "type": "object",
                "properties": {
                    "workspace_id": optional_string,
                    "correlation_id": optional_string,
                    "trace_id": optional_string,
                    "extra": { "type": "object" }
                }
            }
        }
    })
}

/// Validates events at the producer boundary.
pub struct EventValidator {
    schema: jsonschema::Validator,
    custom_rules: BTreeMap<String, CustomRuleFn>,
}

impl EventValidator {
    /// Create a validator with the built-in schema and rules.
    ///
    /// Returns `LedgerError::Config` if the built-in schema fails to compile.
    pub fn new() -> LedgerResult<Self> {
        let schema =
            jsonschema::validator_for(&event_json_schema()).map_err(|e| LedgerError::Config {
                reason: format!("invalid built-in event schema: {e}"),
            })?;
        Ok(Self {
            schema,
            custom_rules: BTreeMap::new(),
        })
    }

    /// Register a custom semantic rule under `name`.
    ///
    /// Registering the same name twice replaces the previous rule.
    pub fn register_rule(&mut self, name: impl Into<String>, rule: CustomRuleFn) {
        self.custom_rules.insert(name.into(), rule);
    }

    /// Run the semantic rules against a typed event.
    pub fn check(&self, event: &AuditEvent) -> ValidationReport {
        let mut failures = Vec::new();
        let mut fail = |rule_id: &str, message: String| {
            warn!(rule_id, event_id = %event.id, %message, "event validation failure");
            failures.push(ValidationFailure {
                rule_id: rule_id.to_string(),
                message,
            });
        };

        if event.action.trim().is_empty() {
            fail("action-present", "action must not be empty".to_string());
        } else if event.action.len() > MAX_ACTION_LEN {
            fail(
                "action-length",
                format!("action is {} bytes, maximum is {MAX_ACTION_LEN}", event.action.len()),
            );
        }
        if event.action.chars().any(char::is_control) {
            fail("action-printable", "action must not contain control characters".to_string());
        }
        if event.resource.kind.trim().is_empty() {
            fail("resource-type-present", "resource.type must not be empty".to_string());
        }
        if event.resource.id.trim().is_empty() {
            fail("resource-id-present", "resource.id must not be empty".to_string());
        }
        if event.id.is_nil() {
            fail("id-present", "event id must not be the nil UUID".to_string());
        }

        for (name, rule) in &self.custom_rules {
            if let Some(message) = rule(event) {
                fail(name.as_str(), message);
            }
        }

        let report = ValidationReport::from_failures(failures);
        debug!(
            event_id = %event.id,
            passed = report.passed,
            failure_count = report.failures.len(),
            "event validation complete"
        );
        report
    }

    /// Validate a typed event, returning `LedgerError::Validation` on failure.
    pub fn validate(&self, event: &AuditEvent) -> LedgerResult<()> {
        self.check(event).into_result()
    }

    /// Validate and decode a raw JSON submission.
    ///
    /// `id` and `timestamp` are optional in raw submissions; missing values
    /// are filled with a fresh UUID and the current time.
    pub fn parse_json(&self, mut raw: Value) -> LedgerResult<AuditEvent> {
        let structural: Vec<ValidationFailure> = self
            .schema
            .iter_errors(&raw)
            .map(|error| ValidationFailure {
                rule_id: "json-schema".to_string(),
                message: format!("JSON Schema violation at {}: {}", error.instance_path, error),
            })
            .collect();
        if !structural.is_empty() {
            for failure in &structural {
                warn!(message = %failure.message, "structural validation failure");
            }
            ValidationReport::from_failures(structural).into_result()?;
        }

        if let Some(object) = raw.as_object_mut() {
            object
                .entry("id")
                .or_insert_with(|| json!(Uuid::new_v4().to_string()));
            object
                .entry("timestamp")
                .or_insert_with(|| json!(Utc::now()));
        }

        let event: AuditEvent =
            serde_json::from_value(raw).map_err(|e| LedgerError::Validation {
                reason: format!("event does not match the audit event shape: {e}"),
            })?;
        self.validate(&event)?;
        Ok(event)
    }
}
