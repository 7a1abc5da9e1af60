//! ledgerguard: operator CLI for the audit chain.
//!
//! Usage:
//!   ledgerguard --store chain.jsonl seed
//!   ledgerguard --store chain.jsonl verify
//!   ledgerguard --store chain.jsonl query --event-type data_access --page-size 20
//!   ledgerguard --store chain.jsonl show <event-id>
//!   ledgerguard --store chain.jsonl report gdpr --from 2026-01-01T00:00:00Z --format csv
//!   ledgerguard --store chain.jsonl export --format jsonl

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ledgerguard_audit::{AuditService, NullPublisher};
use ledgerguard_config::LedgerConfig;
use ledgerguard_contracts::{
    error::{LedgerError, LedgerResult},
    event::{Actor, AuditEvent, EventType, Outcome, Resource, Severity},
    integrity::VerifyScope,
    query::{DateRange, PageRequest, QueryFilters, SortBy, SortDirection},
    report::ComplianceStandard,
};
use ledgerguard_core::traits::ChainStore;
use ledgerguard_report::{export_logs, write_report, ComplianceReporter, ExportFormat, QueryEngine, ReportFormat};

// ── CLI definition ────────────────────────────────────────────────────────────

/// ledgerguard: tamper-evident audit chain.
#[derive(Parser)]
#[command(
    name = "ledgerguard",
    about = "Tamper-evident audit chain operator tool",
    long_about = "Seeds, verifies, queries and exports a ledgerguard audit chain,\n\
                  and generates compliance reports over it."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chain file; overrides `[store] path` from the configuration.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log a small sample corpus of events and seal it.
    Seed {
        /// How many times to repeat the sample corpus.
        #[arg(long, default_value_t = 1)]
        rounds: usize,
    },
    /// Verify the chain and print every issue found.
    Verify {
        #[arg(long)]
        workspace: Option<String>,
        #[command(flatten)]
        period: Period,
    },
    /// Query events with filters and pagination.
    Query {
        #[command(flatten)]
        filters: FilterArgs,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = PageRequest::DEFAULT_PAGE_SIZE)]
        page_size: usize,
        #[arg(long, value_enum, default_value_t = SortKey::Timestamp)]
        sort_by: SortKey,
        /// Sort ascending instead of newest first.
        #[arg(long)]
        asc: bool,
    },
    /// Print one event by id.
    Show { id: Uuid },
    /// Generate a compliance report.
    Report {
        /// gdpr, hipaa, soc2, iso27001 or pci-dss.
        standard: ComplianceStandard,
        #[arg(long)]
        workspace: Option<String>,
        #[command(flatten)]
        period: Period,
        #[arg(long, default_value = "json")]
        format: ReportFormat,
    },
    /// Export matching events.
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "jsonl")]
        format: ExportFormat,
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct Period {
    /// Inclusive lower bound, RFC 3339.
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Inclusive upper bound, RFC 3339.
    #[arg(long)]
    to: Option<DateTime<Utc>>,
}

impl Period {
    fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(clap::Args)]
struct FilterArgs {
    #[arg(long = "event-type")]
    event_types: Vec<EventType>,
    #[arg(long = "action")]
    actions: Vec<String>,
    #[arg(long)]
    actor: Option<String>,
    #[arg(long)]
    resource_type: Option<String>,
    #[arg(long)]
    resource_id: Option<String>,
    #[arg(long)]
    outcome: Option<Outcome>,
    #[arg(long)]
    min_severity: Option<Severity>,
    #[arg(long)]
    workspace: Option<String>,
    #[arg(long)]
    correlation_id: Option<String>,
    #[command(flatten)]
    period: Period,
}

impl FilterArgs {
    fn to_filters(&self) -> QueryFilters {
        QueryFilters {
            event_types: self.event_types.clone(),
            actions: self.actions.clone(),
            actor_id: self.actor.clone(),
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            outcome: self.outcome,
            min_severity: self.min_severity,
            date_range: self.period.range(),
            workspace_id: self.workspace.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Timestamp,
    Severity,
    EventType,
    Action,
    Sequence,
}

impl From<SortKey> for SortBy {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Timestamp => SortBy::Timestamp,
            SortKey::Severity => SortBy::Severity,
            SortKey::EventType => SortBy::EventType,
            SortKey::Action => SortBy::Action,
            SortKey::Sequence => SortBy::Sequence,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging. Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("ledgerguard error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run one command. `Ok(false)` means the command ran but found a problem
/// (an invalid chain).
fn run(cli: Cli) -> LedgerResult<bool> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(store) = cli.store {
        config.store.path = Some(store);
    }
    if config.store.path.is_none() {
        eprintln!("note: no store configured; using an in-memory chain that is discarded on exit");
    }

    let service = AuditService::start(&config, Arc::new(NullPublisher))?;
    if service.is_degraded() {
        eprintln!("warning: chain store could not be opened; running on an in-memory fallback");
    }

    match cli.command {
        Command::Seed { rounds } => seed(&service, rounds),
        Command::Verify { workspace, period } => verify(&service, workspace, &period),
        Command::Query {
            filters,
            page,
            page_size,
            sort_by,
            asc,
        } => {
            let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
            let request = PageRequest::new(page, page_size).sorted(sort_by.into(), direction);
            let result = QueryEngine::new(service.store()).query(&filters.to_filters(), &request)?;
            print_json(&json!({
                "total": result.total,
                "page": result.page,
                "page_size": result.page_size,
                "page_count": result.page_count(),
                "items": result.items,
            }))?;
            Ok(true)
        }
        Command::Show { id } => {
            print_json(&service.get_event(&id)?)?;
            Ok(true)
        }
        Command::Report {
            standard,
            workspace,
            period,
            format,
        } => {
            let reporter = ComplianceReporter::new(QueryEngine::new(service.store()), service.verifier());
            let report = reporter.generate(standard, period.range(), workspace.as_deref())?;
            let mut stdout = io::stdout().lock();
            write_report(&report, format, &mut stdout)?;
            if format == ReportFormat::Json {
                writeln!(stdout).map_err(stdout_error)?;
            }
            Ok(report.integrity.is_valid)
        }
        Command::Export {
            filters,
            format,
            output,
        } => {
            let engine = QueryEngine::new(service.store());
            let filters = filters.to_filters();
            let count = match output {
                Some(path) => {
                    let file = File::create(&path).map_err(|e| LedgerError::Persistence {
                        reason: format!("failed to create '{}': {}", path.display(), e),
                    })?;
                    export_logs(&engine, format, &filters, &mut BufWriter::new(file))?
                }
                None => export_logs(&engine, format, &filters, &mut io::stdout().lock())?,
            };
            eprintln!("exported {count} events");
            Ok(true)
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn seed(service: &AuditService, rounds: usize) -> LedgerResult<bool> {
    let mut logged = 0usize;
    for round in 0..rounds {
        for event in sample_corpus(round) {
            service.log_event(event)?;
            logged += 1;
        }
    }
    service.shutdown()?;
    let blocks = service.store().block_count()?;
    info!(logged, blocks, "sample corpus sealed");
    println!("logged {logged} events; chain now holds {blocks} blocks");
    Ok(true)
}

fn verify(service: &AuditService, workspace: Option<String>, period: &Period) -> LedgerResult<bool> {
    let report = service.verify_integrity(&VerifyScope {
        workspace_id: workspace,
        date_range: period.range(),
    })?;

    println!(
        "checked {} blocks ({} events) up to height {}",
        report.total_checked, report.events_checked, report.chain_height
    );
    for message in report.issue_messages() {
        println!("  {message}");
    }
    println!("{}", if report.is_valid { "chain is valid" } else { "CHAIN IS BROKEN" });
    Ok(report.is_valid)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// A fixed, fictional mix of event types for demos.
fn sample_corpus(round: usize) -> Vec<AuditEvent> {
    let alice = Actor {
        username: Some("alice".to_string()),
        ip: Some("10.0.0.12".to_string()),
        ..Actor::with_id("user-alice")
    };
    let bob = Actor::with_id("user-bob");
    let workspace = if round % 2 == 0 { "ws-clinic" } else { "ws-billing" };

    vec![
        AuditEvent::new(EventType::Authentication, "user.login", Resource::new("session", format!("sess-{round}")))
            .with_actor(alice.clone()),
        AuditEvent::new(EventType::DataAccess, "record.read", Resource::new("patient_record", "pr-1001"))
            .with_actor(alice.clone())
            .with_details(json!({ "fields": ["name", "allergies"] })),
        AuditEvent::new(EventType::DataModification, "record.update", Resource::new("patient_record", "pr-1001"))
            .with_actor(alice.clone())
            .with_severity(Severity::Notice),
        AuditEvent::new(EventType::Authorization, "role.check", Resource::new("role", "clinician"))
            .with_actor(bob.clone())
            .with_outcome(Outcome::Failure)
            .with_severity(Severity::Warning),
        AuditEvent::new(EventType::Authentication, "user.login", Resource::new("session", format!("sess-b{round}")))
            .with_actor(bob.clone())
            .with_outcome(Outcome::Failure)
            .with_severity(Severity::Warning),
        AuditEvent::new(EventType::SystemConfiguration, "config.update", Resource::new("setting", "retention_days"))
            .with_actor(alice)
            .with_details(json!({ "from": 365, "to": 730 })),
        AuditEvent::new(EventType::SecurityEvent, "access.anomaly", Resource::new("endpoint", "/api/export"))
            .with_actor(bob)
            .with_severity(Severity::Critical),
    ]
    .into_iter()
    .map(|event| event.with_workspace(workspace))
    .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> LedgerResult<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(stdout_error)
}

fn stdout_error(e: io::Error) -> LedgerError {
    LedgerError::Persistence {
        reason: format!("failed to write to stdout: {e}"),
    }
}
