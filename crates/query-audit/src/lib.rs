//! # query-audit
//!
//! Audits database reads. The host engine hands every connection and
//! table-access event to a [`Dispatcher`]; connection events update the
//! session's `user@host` identity, and reads of allow-listed tables are
//! appended to a JSON-lines audit log.
//!
//! ```text
//! engine --event--> Dispatcher --> Session identity
//!                       |
//!                       +--> FilterStore --> AuditRecord --> LogWriter
//!
//! admin --ConfigChange--> Dispatcher --> FilterStore | LogWriter
//! ```
//!
//! Auditing never blocks or fails a query: every error is reported through
//! `tracing` and stops at the dispatcher.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use query_audit::{AuditConfig, AuditEvent, ConfigChange, Dispatcher, Session};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::start(&AuditConfig::default())?;
//! dispatcher.apply_config(ConfigChange::LogDatabases("shop".into()))?;
//! dispatcher.apply_config(ConfigChange::LogTables("orders,users".into()))?;
//!
//! let mut session = Session::new(1);
//! dispatcher.dispatch(&AuditEvent::connect("alice", None, "10.0.0.5"), &mut session);
//! dispatcher.dispatch(&AuditEvent::read("shop", "orders", "SELECT * FROM orders"), &mut session);
//! dispatcher.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod event;
pub mod feed;
pub mod identity;

pub use config::{AuditConfig, ConfigChange};
pub use dispatcher::{Applied, Dispatcher, Outcome};
pub use event::{
    AuditEvent, ConnectionEvent, ConnectionSubclass, TableAccessEvent, TableAccessSubclass,
};
pub use identity::{Session, SessionIdentity};
