use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::snapshot::{tokens, FilterSnapshot};

/// Default byte capacity of each allow-list.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Which allow-list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Database,
    Table,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Database => f.write_str("database"),
            FilterKind::Table => f.write_str("table"),
        }
    }
}

/// Raised when an allow-list exceeds the store capacity.
///
/// This is a warning, not a failure: the list is truncated at the last whole
/// entry that fits and the remainder is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{kind} allow-list is {input_len} bytes, over the {capacity}-byte capacity; \
     {dropped} trailing entries dropped"
)]
pub struct FilterOverflow {
    pub kind: FilterKind,
    pub capacity: usize,
    pub input_len: usize,
    pub dropped: usize,
}

/// Result of a successful [`FilterStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterUpdate {
    /// Distinct names in the new snapshot.
    pub entries: usize,
    pub overflow: Option<FilterOverflow>,
}

/// The current database and table allow-lists.
///
/// Snapshots are replaced wholesale and never mutated in place, so anything
/// holding an [`Arc<FilterSnapshot>`] from [`snapshot`](Self::snapshot) keeps
/// a consistent view. The store itself takes `&mut self` for updates and
/// relies on its owner for mutual exclusion.
#[derive(Debug, Clone)]
pub struct FilterStore {
    databases: Arc<FilterSnapshot>,
    tables: Arc<FilterSnapshot>,
    capacity: usize,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl FilterStore {
    /// Empty (deny-all) store whose lists are each bounded to `capacity`
    /// bytes of input.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            databases: Arc::default(),
            tables: Arc::default(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the allow-list for `kind` with the names in `csv`.
    ///
    /// Input longer than the capacity is cut before parsing. An entry split
    /// by the cut is dropped along with everything after it, and the returned
    /// [`FilterUpdate::overflow`] says how many entries were lost.
    pub fn update(&mut self, kind: FilterKind, csv: &str) -> FilterUpdate {
        let (kept, overflow) = truncate(kind, csv, self.capacity);
        if let Some(overflow) = &overflow {
            warn!(%kind, %overflow, "allow-list truncated");
        }

        let snapshot = Arc::new(FilterSnapshot::parse(kept));
        let entries = snapshot.len();
        match kind {
            FilterKind::Database => self.databases = snapshot,
            FilterKind::Table => self.tables = snapshot,
        }

        FilterUpdate { entries, overflow }
    }

    /// Exact, case-sensitive membership test against the current snapshot.
    pub fn is_allowed(&self, kind: FilterKind, name: &str) -> bool {
        self.current(kind).contains(name)
    }

    /// Shared handle to the current snapshot for `kind`.
    pub fn snapshot(&self, kind: FilterKind) -> Arc<FilterSnapshot> {
        Arc::clone(self.current(kind))
    }

    fn current(&self, kind: FilterKind) -> &Arc<FilterSnapshot> {
        match kind {
            FilterKind::Database => &self.databases,
            FilterKind::Table => &self.tables,
        }
    }
}

/// Cut `csv` to at most `capacity` bytes on an entry boundary.
fn truncate(kind: FilterKind, csv: &str, capacity: usize) -> (&str, Option<FilterOverflow>) {
    if csv.len() <= capacity {
        return (csv, None);
    }

    let mut cut = capacity;
    while !csv.is_char_boundary(cut) {
        cut -= 1;
    }

    let (head, rest) = csv.split_at(cut);
    // A cut landing inside a name leaves a fragment that must not match.
    let kept = if head.ends_with(',') || rest.starts_with(',') {
        head
    } else {
        head.rfind(',').map_or("", |pos| &head[..pos])
    };

    let dropped = tokens(csv).count() - tokens(kept).count();
    let overflow = FilterOverflow {
        kind,
        capacity,
        input_len: csv.len(),
        dropped,
    };
    (kept, Some(overflow))
}
