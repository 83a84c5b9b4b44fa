use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// `strftime` pattern for record timestamps (`YYYY-MM-DD HH:MM:SS`, local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single audited read: who ran which query against which table.
///
/// Field declaration order is the serialization order, so every emitted line
/// carries `timestamp`, `connection_user`, `db`, `table`, `query` in that
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub connection_user: String,
    pub db: String,
    pub table: String,
    pub query: String,
}

impl AuditRecord {
    /// Build a record for one table read.
    ///
    /// `now` is interpreted as wall-clock local time. The function is pure:
    /// the caller samples the clock and resolves the identity beforehand.
    pub fn build(
        database: &str,
        table: &str,
        query: &str,
        connection_user: &str,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            connection_user: connection_user.to_string(),
            db: database.to_string(),
            table: table.to_string(),
            query: query.to_string(),
        }
    }

    /// Serialise as a single compact JSON object without a trailing newline.
    ///
    /// Control characters and quotes are escaped, so the result never spans
    /// more than one line.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
