//! Query filter, sort and pagination types.
//!
//! Filters are plain data so that the same value can drive the query engine,
//! the exporter and the compliance reporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{AuditEvent, EventType, Outcome, Severity};

/// An inclusive time window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// A range with both bounds open; matches every instant.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *instant >= from) && self.to.map_or(true, |to| *instant <= to)
    }
}

/// Event filters. An empty list or `None` means "do not filter on this".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub event_types: Vec<EventType>,
    #[serde(default)]
    pub actions: Vec<String>,
    pub actor_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub outcome: Option<Outcome>,
    /// Inclusive lower bound on severity.
    pub min_severity: Option<Severity>,
    #[serde(default)]
    pub date_range: DateRange,
    pub workspace_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl QueryFilters {
    /// Return true if `event` passes every configured filter.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if !self.actions.is_empty() && !self.actions.iter().any(|a| *a == event.action) {
            return false;
        }
        if let Some(actor_id) = &self.actor_id {
            if event.actor.id.as_deref() != Some(actor_id.as_str()) {
                return false;
            }
        }
        if let Some(kind) = &self.resource_type {
            if event.resource.kind != *kind {
                return false;
            }
        }
        if let Some(id) = &self.resource_id {
            if event.resource.id != *id {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if event.outcome != outcome {
                return false;
            }
        }
        if let Some(min) = self.min_severity {
            if event.severity < min {
                return false;
            }
        }
        if !self.date_range.contains(&event.timestamp) {
            return false;
        }
        if let Some(workspace) = &self.workspace_id {
            if event.metadata.workspace_id.as_deref() != Some(workspace.as_str()) {
                return false;
            }
        }
        if let Some(correlation) = &self.correlation_id {
            if event.metadata.correlation_id.as_deref() != Some(correlation.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Field to order query results by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Timestamp,
    Severity,
    EventType,
    Action,
    /// Chain order: block sequence, then position inside the block.
    Sequence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Pagination and ordering for a query. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
    pub sort_by: SortBy,
    pub sort_direction: SortDirection,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: usize = 50;
    pub const MAX_PAGE_SIZE: usize = 1000;

    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort_by: SortBy, sort_direction: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.sort_direction = sort_direction;
        self
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
            sort_by: SortBy::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

/// One page of results.
///
/// `total` counts every match regardless of pagination, so callers can
/// render a page count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }
}
