//! Audit trail filtering, paging and CSV export
//!
//! Everything here is a pure function of the entries and the view state the
//! client sends along, so list and export always agree on what matches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use crate::models::{AuditEvent, AuditLogEntry, AuditLogPage, AuditLogQuery};

pub const PAGE_SIZE_OPTIONS: [usize; 3] = [5, 10, 25];
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const CSV_HEADER: &str = "Time,Description,Event,Category,Performed By";

/// User-selected constraints on the audit list. An empty spec matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub category: Option<String>,
    /// Empty means every event kind
    pub actions: BTreeSet<AuditEvent>,
    /// Case-insensitive substring of `performed_by`
    pub user: String,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl FilterSpec {
    /// Build a filter from query parameters
    ///
    /// Blank values count as absent. Unknown event names and an inverted date
    /// range are rejected.
    pub fn from_query(query: &AuditLogQuery) -> Result<Self, String> {
        let actions = match query.actions.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<AuditEvent>)
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => BTreeSet::new(),
        };

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err("The start date must not be after the end date".to_string());
            }
        }

        Ok(Self {
            category: query
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            actions,
            user: query.user.as_deref().map(str::trim).unwrap_or_default().to_string(),
            from_date: query.from,
            to_date: query.to,
        })
    }

    /// Whether any constraint is set ("Clear all filters" is offered)
    pub fn has_active_filters(&self) -> bool {
        self.category.is_some()
            || !self.actions.is_empty()
            || !self.user.is_empty()
            || self.from_date.is_some()
            || self.to_date.is_some()
    }

    /// Dates compare by calendar day in UTC
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(ref category) = self.category {
            if &entry.category != category {
                return false;
            }
        }

        if !self.actions.is_empty() && !self.actions.contains(&entry.event) {
            return false;
        }

        if !self.user.is_empty()
            && !entry
                .performed_by
                .to_lowercase()
                .contains(&self.user.to_lowercase())
        {
            return false;
        }

        let day = entry.time.date_naive();
        if self.from_date.is_some_and(|from| day < from) {
            return false;
        }
        if self.to_date.is_some_and(|to| day > to) {
            return false;
        }

        true
    }
}

/// Entries matching `spec`, in input order
pub fn filter(entries: &[AuditLogEntry], spec: &FilterSpec) -> Vec<AuditLogEntry> {
    entries.iter().filter(|e| spec.matches(e)).cloned().collect()
}

/// One page of `items`; pages past the end are empty
pub fn paginate<T>(items: &[T], page_index: usize, page_size: usize) -> &[T] {
    let start = page_index.saturating_mul(page_size);
    if page_size == 0 || start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Number of pages needed for `total` items
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

pub fn is_valid_page_size(page_size: usize) -> bool {
    PAGE_SIZE_OPTIONS.contains(&page_size)
}

/// Wrap a value in double quotes, doubling any quotes inside it
pub fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render entries as CSV: plain header, quoted fields, `\n` between rows
pub fn export_csv(entries: &[AuditLogEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for entry in entries {
        let fields = [
            entry.time.to_rfc3339(),
            entry.description.clone(),
            entry.event.to_string(),
            entry.category.clone(),
            entry.performed_by.clone(),
        ];
        lines.push(
            fields
                .iter()
                .map(|f| csv_field(f))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n")
}

/// Download name for an export made at `now`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("audit_trail_{}.csv", now.format("%Y-%m-%d_%H-%M"))
}

/// Zero-based page position and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Ids of rows currently shown expanded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedRows(HashSet<String>);

impl ExpandedRows {
    pub fn toggle(&mut self, id: &str) {
        if !self.0.remove(id) {
            self.0.insert(id.to_string());
        }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.0.contains(id)
    }
}

/// Full view state of the audit trail screen
///
/// Every transition returns a new state. Changing the filter or the page
/// size sends the view back to the first page; row expansion is untouched
/// by both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrailState {
    pub filter: FilterSpec,
    pub pagination: Pagination,
    pub expanded: ExpandedRows,
}

impl AuditTrailState {
    fn refilter(mut self, filter: FilterSpec) -> Self {
        if filter != self.filter {
            self.filter = filter;
            self.pagination.page_index = 0;
        }
        self
    }

    pub fn with_filter(self, filter: FilterSpec) -> Self {
        self.refilter(filter)
    }

    pub fn set_category(self, category: Option<String>) -> Self {
        let filter = FilterSpec {
            category,
            ..self.filter.clone()
        };
        self.refilter(filter)
    }

    pub fn toggle_action(self, event: AuditEvent) -> Self {
        let mut filter = self.filter.clone();
        if !filter.actions.remove(&event) {
            filter.actions.insert(event);
        }
        self.refilter(filter)
    }

    pub fn set_user(self, user: impl Into<String>) -> Self {
        let filter = FilterSpec {
            user: user.into(),
            ..self.filter.clone()
        };
        self.refilter(filter)
    }

    pub fn set_date_range(self, from_date: Option<NaiveDate>, to_date: Option<NaiveDate>) -> Self {
        let filter = FilterSpec {
            from_date,
            to_date,
            ..self.filter.clone()
        };
        self.refilter(filter)
    }

    pub fn clear_filters(self) -> Self {
        self.refilter(FilterSpec::default())
    }

    pub fn set_page(mut self, page_index: usize) -> Self {
        self.pagination.page_index = page_index;
        self
    }

    /// Advance one page unless already on the last page for `total` matches
    pub fn next_page(mut self, total: usize) -> Self {
        if self.pagination.page_index + 1 < page_count(total, self.pagination.page_size) {
            self.pagination.page_index += 1;
        }
        self
    }

    pub fn prev_page(mut self) -> Self {
        self.pagination.page_index = self.pagination.page_index.saturating_sub(1);
        self
    }

    /// Sizes outside [`PAGE_SIZE_OPTIONS`] are ignored
    pub fn set_page_size(mut self, page_size: usize) -> Self {
        if is_valid_page_size(page_size) && page_size != self.pagination.page_size {
            self.pagination.page_size = page_size;
            self.pagination.page_index = 0;
        }
        self
    }

    pub fn toggle_expand(mut self, id: &str) -> Self {
        self.expanded.toggle(id);
        self
    }

    /// Apply the filter and cut out the current page
    pub fn view(&self, entries: &[AuditLogEntry]) -> AuditLogPage {
        let matching = filter(entries, &self.filter);
        let Pagination {
            page_index,
            page_size,
        } = self.pagination;

        AuditLogPage {
            items: paginate(&matching, page_index, page_size).to_vec(),
            total: matching.len(),
            page: page_index,
            page_size,
            page_count: page_count(matching.len(), page_size),
        }
    }
}
