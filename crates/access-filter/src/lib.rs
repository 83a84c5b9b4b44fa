//! # access-filter
//!
//! Administrator-configured allow-lists of database and table names. A
//! read is audited only when both its database and its table are listed.
//!
//! ## Quick start
//!
//! ```rust
//! use access_filter::{FilterKind, FilterStore};
//!
//! let mut store = FilterStore::default();
//! store.update(FilterKind::Database, "shop");
//! store.update(FilterKind::Table, "orders,users");
//!
//! assert!(store.is_allowed(FilterKind::Table, "orders"));
//! assert!(!store.is_allowed(FilterKind::Table, "products"));
//! ```
//!
//! Lists start empty, and an empty list matches nothing: until an
//! administrator configures both lists, no read is audited.

mod snapshot;
mod store;

pub use snapshot::FilterSnapshot;
pub use store::{FilterKind, FilterOverflow, FilterStore, FilterUpdate, DEFAULT_CAPACITY};
