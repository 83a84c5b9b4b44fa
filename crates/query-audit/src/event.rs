use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use audit_log::AuditRecord;

/// Connection-class subclasses the audit hook subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionSubclass {
    Connect,
    ChangeUser,
    /// Disconnect, pre-authenticate, and anything else the engine reports.
    #[serde(other)]
    Other,
}

/// Table-access subclasses. Only reads are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAccessSubclass {
    Read,
    /// Insert, update, delete.
    #[serde(other)]
    Other,
}

/// A client connected or switched user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub subclass: ConnectionSubclass,
    pub user: String,
    #[serde(default)]
    pub host: Option<String>,
    pub ip: String,
}

/// A statement touched a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAccessEvent {
    pub subclass: TableAccessSubclass,
    pub database: String,
    pub table: String,
    pub query_text: String,
}

impl TableAccessEvent {
    /// Build the audit record for this access as performed by `identity`.
    pub fn to_record(&self, identity: &str, now: NaiveDateTime) -> AuditRecord {
        AuditRecord::build(&self.database, &self.table, &self.query_text, identity, now)
    }
}

/// One observation from the host engine. Borrowed for the duration of a
/// single dispatch call and never retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Connection(ConnectionEvent),
    TableAccess(TableAccessEvent),
    /// Any event class the pipeline does not handle.
    Other,
}

impl AuditEvent {
    pub fn connect(user: &str, host: Option<&str>, ip: &str) -> Self {
        AuditEvent::Connection(ConnectionEvent {
            subclass: ConnectionSubclass::Connect,
            user: user.to_string(),
            host: host.map(str::to_string),
            ip: ip.to_string(),
        })
    }

    pub fn read(database: &str, table: &str, query_text: &str) -> Self {
        AuditEvent::TableAccess(TableAccessEvent {
            subclass: TableAccessSubclass::Read,
            database: database.to_string(),
            table: table.to_string(),
            query_text: query_text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_connection_event() {
        let json = r#"{"connection":{"subclass":"connect","user":"bob","ip":"192.168.1.1"}}"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, AuditEvent::connect("bob", None, "192.168.1.1"));
    }

    #[test]
    fn deserialize_read_event() {
        let json = concat!(
            r#"{"table_access":{"subclass":"read","database":"shop","#,
            r#""table":"orders","query_text":"SELECT 1"}}"#,
        );
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, AuditEvent::read("shop", "orders", "SELECT 1"));
    }

    #[test]
    fn unknown_subclasses_map_to_other() {
        let json = r#"{"subclass":"insert","database":"d","table":"t","query_text":"q"}"#;
        let event: TableAccessEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.subclass, TableAccessSubclass::Other);

        let json = r#"{"subclass":"disconnect","user":"u","host":"h","ip":"i"}"#;
        let event: ConnectionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.subclass, ConnectionSubclass::Other);
    }

    #[test]
    fn deserialize_other_event_class() {
        let event: AuditEvent = serde_json::from_str(r#""other""#).unwrap();
        assert_eq!(event, AuditEvent::Other);
    }

    #[test]
    fn to_record_carries_query_text() {
        let AuditEvent::TableAccess(access) = AuditEvent::read("shop", "orders", "SELECT *") else {
            unreachable!()
        };
        let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 22, 31)
            .unwrap();
        let record = access.to_record("alice@10.0.0.5", now);
        assert_eq!(record.db, "shop");
        assert_eq!(record.table, "orders");
        assert_eq!(record.query, "SELECT *");
        assert_eq!(record.connection_user, "alice@10.0.0.5");
        assert_eq!(record.timestamp, "2024-01-15 10:22:31");
    }
}
