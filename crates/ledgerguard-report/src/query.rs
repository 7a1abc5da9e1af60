//! Filtered, sorted and paginated reads over a `ChainStore`.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use ledgerguard_contracts::{
    block::StoredEvent,
    error::{LedgerError, LedgerResult},
    query::{Page, PageRequest, QueryFilters, SortBy, SortDirection},
};
use ledgerguard_core::traits::ChainStore;

/// Read-only query access to persisted events.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn ChainStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn ChainStore>) -> Self {
        Self { store }
    }

    /// Return one page of events matching `filters`.
    ///
    /// `page` is 1-based (0 is treated as 1) and `page_size` is clamped to
    /// `1..=PageRequest::MAX_PAGE_SIZE`. `total` counts every match.
    pub fn query(&self, filters: &QueryFilters, request: &PageRequest) -> LedgerResult<Page<StoredEvent>> {
        let page = request.page.max(1);
        let page_size = request.page_size.clamp(1, PageRequest::MAX_PAGE_SIZE);

        let mut rows = self.matching(filters)?;
        let total = rows.len();
        rows.sort_by(|a, b| compare(a, b, request.sort_by, request.sort_direction));

        let items: Vec<StoredEvent> = rows
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        debug!(
            total,
            page,
            page_size,
            returned = items.len(),
            sort_by = ?request.sort_by,
            "query executed"
        );
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Every event matching `filters`, in chain order.
    pub fn matching(&self, filters: &QueryFilters) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self
            .store
            .all_events()?
            .into_iter()
            .filter(|row| filters.matches(&row.event))
            .collect())
    }

    pub fn get(&self, id: &Uuid) -> LedgerResult<StoredEvent> {
        self.store.get_event(id)?.ok_or_else(|| LedgerError::NotFound {
            what: format!("audit event {id}"),
        })
    }
}

fn chain_position(row: &StoredEvent) -> (u64, u32) {
    (row.block_sequence_id, row.position)
}

/// Order by `sort_by` in `direction`; equal keys fall back to chain order.
fn compare(a: &StoredEvent, b: &StoredEvent, sort_by: SortBy, direction: SortDirection) -> Ordering {
    let primary = match sort_by {
        SortBy::Timestamp => a.event.timestamp.cmp(&b.event.timestamp),
        SortBy::Severity => a.event.severity.cmp(&b.event.severity),
        SortBy::EventType => a.event.event_type.as_str().cmp(b.event.event_type.as_str()),
        SortBy::Action => a.event.action.cmp(&b.event.action),
        SortBy::Sequence => chain_position(a).cmp(&chain_position(b)),
    };
    let primary = match direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| chain_position(a).cmp(&chain_position(b)))
}
