//! # ledgerguard-report
//!
//! Read-side operations over a ledgerguard audit chain:
//!
//! 1. **Queries** with filters, sorting and 1-based pagination
//!    ([`QueryEngine`]).
//! 2. **Compliance reports** for GDPR, HIPAA, SOC2, ISO27001 and PCI-DSS,
//!    each embedding a verification pass over the same scope
//!    ([`ComplianceReporter`]), rendered as JSON or CSV.
//! 3. **Exports** of matching events as JSON, JSON Lines or CSV
//!    ([`export_logs`]).
//!
//! Everything here reads through `ChainStore`; nothing writes to the chain.

pub mod compliance;
pub mod export;
pub mod query;
pub mod render;

pub use compliance::ComplianceReporter;
pub use export::{export_logs, ExportFormat};
pub use query::QueryEngine;
pub use render::{render_report, write_report, ReportFormat};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;

    use ledgerguard_audit::{AuditService, MemoryChainStore};
    use ledgerguard_contracts::{
        event::{Actor, AuditEvent, EventType, Outcome, Resource, Severity},
        query::{DateRange, PageRequest, QueryFilters, SortBy, SortDirection},
        report::ComplianceStandard,
    };
    use ledgerguard_core::traits::ChainStore;

    use super::{export_logs, render_report, ComplianceReporter, ExportFormat, QueryEngine, ReportFormat};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn service() -> AuditService {
        AuditService::builder()
            .batch_size(1000)
            .difficulty(0)
            .background(false)
            .build(Arc::new(MemoryChainStore::new()))
            .unwrap()
    }

    fn event(event_type: EventType, action: &str, minutes: i64) -> AuditEvent {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        AuditEvent::new(event_type, action, Resource::new("record", "r-1")).at(base + Duration::minutes(minutes))
    }

    /// Three data accesses and two logins, sealed into one block.
    fn seeded() -> AuditService {
        let service = service();
        for i in 0..3 {
            service
                .log_event(event(EventType::DataAccess, "record.read", i).with_workspace("ws-1"))
                .unwrap();
        }
        for i in 3..5 {
            service
                .log_event(
                    event(EventType::Authentication, "user.login", i)
                        .with_actor(Actor::with_id("alice"))
                        .with_outcome(if i == 3 { Outcome::Failure } else { Outcome::Success }),
                )
                .unwrap();
        }
        service.flush().unwrap();
        service
    }

    fn reporter(service: &AuditService) -> ComplianceReporter {
        ComplianceReporter::new(QueryEngine::new(service.store()), service.verifier())
    }

    // ── 1. queries ────────────────────────────────────────────────────────────

    /// `total` counts all matches; pages slice the sorted result.
    #[test]
    fn test_query_pagination() {
        let service = seeded();
        let engine = QueryEngine::new(service.store());

        let page = engine
            .query(&QueryFilters::default(), &PageRequest::new(2, 2))
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.page_count(), 3);
        assert_eq!(page.items.len(), 2);

        let last = engine
            .query(&QueryFilters::default(), &PageRequest::new(3, 2))
            .unwrap();
        assert_eq!(last.items.len(), 1);
    }

    /// Default ordering is newest first.
    #[test]
    fn test_query_default_sort_is_timestamp_desc() {
        let service = seeded();
        let engine = QueryEngine::new(service.store());
        let page = engine.query(&QueryFilters::default(), &PageRequest::default()).unwrap();

        let timestamps: Vec<_> = page.items.iter().map(|row| row.event.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(timestamps, sorted);
        assert_eq!(page.items[0].event.action, "user.login");
    }

    /// Ties on the sort key are broken by chain position.
    #[test]
    fn test_query_ties_keep_chain_order() {
        let service = seeded();
        let engine = QueryEngine::new(service.store());
        let request = PageRequest::default().sorted(SortBy::Action, SortDirection::Asc);
        let page = engine.query(&QueryFilters::default(), &request).unwrap();

        let positions: Vec<u32> = page
            .items
            .iter()
            .filter(|row| row.event.action == "record.read")
            .map(|row| row.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_query_filters_and_clamps_page_size() {
        let service = seeded();
        let engine = QueryEngine::new(service.store());
        let filters = QueryFilters {
            actor_id: Some("alice".to_string()),
            outcome: Some(Outcome::Failure),
            ..QueryFilters::default()
        };
        let page = engine.query(&filters, &PageRequest::new(0, 0)).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);

        let page = engine
            .query(&QueryFilters::default(), &PageRequest::new(1, 50_000))
            .unwrap();
        assert_eq!(page.page_size, PageRequest::MAX_PAGE_SIZE);
    }

    #[test]
    fn test_get_missing_event() {
        let service = seeded();
        let engine = QueryEngine::new(service.store());
        assert!(engine.get(&uuid::Uuid::new_v4()).is_err());

        let first = &service.store().all_events().unwrap()[0];
        assert_eq!(engine.get(&first.event.id).unwrap().event.id, first.event.id);
    }

    // ── 2. compliance ─────────────────────────────────────────────────────────

    /// GDPR excludes authentication events.
    #[test]
    fn test_gdpr_report_counts_only_included_types() {
        let service = seeded();
        let report = reporter(&service)
            .generate(ComplianceStandard::Gdpr, DateRange::unbounded(), None)
            .unwrap();

        assert_eq!(report.summary.total_events, 3);
        assert_eq!(report.summary.by_action.get("record.read"), Some(&3));
        assert!(!report.summary.by_action.contains_key("user.login"));
        assert_eq!(report.details.len(), 1);
        assert_eq!(report.details[&EventType::DataAccess].len(), 3);
        assert!(report.integrity.is_valid);
        assert_eq!(
            report.metadata.included_event_types,
            ComplianceStandard::Gdpr.event_types().to_vec()
        );
    }

    #[test]
    fn test_hipaa_report_summaries() {
        let service = seeded();
        let report = reporter(&service)
            .generate(ComplianceStandard::Hipaa, DateRange::unbounded(), None)
            .unwrap();

        assert_eq!(report.summary.total_events, 5);
        assert_eq!(report.summary.by_outcome.get("failure"), Some(&1));
        assert_eq!(report.summary.by_outcome.get("success"), Some(&4));
        assert_eq!(report.summary.by_severity.get("info"), Some(&5));
        assert_eq!(report.summary.by_resource_type.get("record"), Some(&5));
    }

    /// The period and workspace narrow the report.
    #[test]
    fn test_report_period_and_workspace() {
        let service = seeded();
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 1, 0).unwrap();
        let period = DateRange::new(start, start + Duration::minutes(10));

        let report = reporter(&service)
            .generate(ComplianceStandard::Soc2, period, Some("ws-1"))
            .unwrap();
        assert_eq!(report.summary.total_events, 2);
        assert_eq!(report.metadata.workspace_id.as_deref(), Some("ws-1"));
    }

    // ── 3. rendering and export ───────────────────────────────────────────────

    #[test]
    fn test_report_renders_as_json_and_csv() {
        let service = seeded();
        let report = reporter(&service)
            .generate(ComplianceStandard::PciDss, DateRange::unbounded(), None)
            .unwrap();

        let json: Value = serde_json::from_str(&render_report(&report, ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(json["metadata"]["standard"], "PCI-DSS");
        assert_eq!(json["summary"]["total_events"], 5);
        assert_eq!(json["details"]["data_access"].as_array().unwrap().len(), 3);

        let csv = render_report(&report, ReportFormat::Csv).unwrap();
        assert!(csv.starts_with("section,key,value\n"));
        assert!(csv.contains("summary,total_events,5\n"));
        assert!(csv.contains("integrity,is_valid,true\n"));
        let event_rows = csv.split("\n\n").nth(1).unwrap();
        assert_eq!(event_rows.lines().filter(|l| l.contains(",record.read,")).count(), 3);
    }

    #[test]
    fn test_export_formats() {
        let service = seeded();
        let engine = QueryEngine::new(service.store());
        let logins = QueryFilters {
            event_types: vec![EventType::Authentication],
            ..QueryFilters::default()
        };

        let mut jsonl = Vec::new();
        assert_eq!(export_logs(&engine, ExportFormat::Jsonl, &logins, &mut jsonl).unwrap(), 2);
        let lines: Vec<Value> = String::from_utf8(jsonl)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "user.login");
        assert_eq!(lines[0]["block_sequence_id"], 1);

        let mut json = Vec::new();
        export_logs(&engine, ExportFormat::Json, &QueryFilters::default(), &mut json).unwrap();
        let array: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(array.as_array().unwrap().len(), 5);

        let mut csv = Vec::new();
        export_logs(&engine, ExportFormat::Csv, &logins, &mut csv).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().next().unwrap().starts_with("id,timestamp,event_type"));
    }

    /// Fields containing delimiters are quoted.
    #[test]
    fn test_csv_escaping() {
        let service = service();
        service
            .log_event(
                AuditEvent::new(
                    EventType::ApiAccess,
                    "api.call",
                    Resource::new("endpoint", "/v1/search?q=a,b"),
                )
                .with_severity(Severity::Warning),
            )
            .unwrap();
        service.flush().unwrap();

        let mut out = Vec::new();
        export_logs(
            &QueryEngine::new(service.store()),
            ExportFormat::Csv,
            &QueryFilters::default(),
            &mut out,
        )
        .unwrap();
        assert!(String::from_utf8(out).unwrap().contains(",\"/v1/search?q=a,b\","));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSONL".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert_eq!("csv".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
