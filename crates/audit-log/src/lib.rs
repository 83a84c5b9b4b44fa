//! Append-only structured JSON-lines audit records for database reads.
//!
//! Each audited read is turned into an [`AuditRecord`] and serialised as a
//! single newline-terminated JSON object, producing a
//! [JSON Lines](https://jsonlines.org/) stream that is easy to ship, parse,
//! and replay.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_log::{AuditRecord, LogWriter};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = LogWriter::open("/var/log/query_audit.log", true)?;
//!
//! let now = chrono::Local::now().naive_local();
//! let query = "SELECT * FROM orders";
//! let record = AuditRecord::build("shop", "orders", query, "alice@10.0.0.5", now);
//! writer.write_record(&record.to_json_line()?)?;
//! writer.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod writer;

pub use entry::{AuditRecord, TIMESTAMP_FORMAT};
pub use writer::{ConfigError, IoError, LogWriter};
