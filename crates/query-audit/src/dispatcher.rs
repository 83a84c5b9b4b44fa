use std::path::PathBuf;

use chrono::Local;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use access_filter::{FilterKind, FilterStore, FilterUpdate};
use audit_log::{ConfigError, IoError, LogWriter};

use crate::config::{AuditConfig, ConfigChange};
use crate::event::{AuditEvent, ConnectionSubclass, TableAccessEvent, TableAccessSubclass};
use crate::identity::Session;

/// What a single [`Dispatcher::dispatch`] did with an event.
///
/// Every outcome means "let the query continue"; none is reported to the
/// engine as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Connect or change-user; the session identity was updated.
    IdentityUpdated,
    /// A read whose database or table is not allow-listed.
    Filtered,
    /// A read that was appended to the audit log.
    Recorded,
    /// Appended, but the always-flush policy could not flush it.
    RecordUnflushed,
    /// A matching read whose record could not be written.
    RecordLost,
    /// Any other event class or subclass.
    Ignored,
}

/// Result of a successful [`Dispatcher::apply_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Destination(PathBuf),
    Filter { kind: FilterKind, update: FilterUpdate },
    FlushPolicy(bool),
}

/// Everything guarded by the process-wide lock.
#[derive(Debug)]
struct Shared {
    filters: FilterStore,
    writer: LogWriter,
}

impl Shared {
    fn apply(&mut self, change: &ConfigChange) -> Result<Applied, ConfigError> {
        info!("[{}] set to: {}", change.variable(), change);

        match change {
            ConfigChange::LogFile(path) => {
                self.writer.set_destination(path)?;
                Ok(Applied::Destination(path.clone()))
            }
            ConfigChange::LogTables(csv) => Ok(self.update_filter(FilterKind::Table, csv)),
            ConfigChange::LogDatabases(csv) => Ok(self.update_filter(FilterKind::Database, csv)),
            ConfigChange::AlwaysFlush(on) => {
                self.writer.set_flush_policy(*on);
                Ok(Applied::FlushPolicy(*on))
            }
        }
    }

    fn update_filter(&mut self, kind: FilterKind, csv: &str) -> Applied {
        let update = self.filters.update(kind, csv);
        debug!(
            %kind,
            entries = update.entries,
            capacity = self.filters.capacity(),
            names = ?self.filters.snapshot(kind).names(),
            "allow-list replaced"
        );
        Applied::Filter { kind, update }
    }

    fn record(&mut self, access: &TableAccessEvent, session: &Session) -> Outcome {
        let record = access.to_record(session.identity(), Local::now().naive_local());

        let result = record
            .to_json_line()
            .map_err(IoError::from)
            .and_then(|line| self.writer.write_record(&line));

        match result {
            Ok(()) => Outcome::Recorded,
            Err(err @ IoError::FlushFailed(_)) => {
                error!(
                    session = session.id(),
                    path = ?self.writer.path(),
                    %err,
                    "failed to flush audit log"
                );
                Outcome::RecordUnflushed
            }
            Err(err) => {
                error!(
                    session = session.id(),
                    db = %access.database,
                    table = %access.table,
                    path = ?self.writer.path(),
                    %err,
                    "audit record lost"
                );
                Outcome::RecordLost
            }
        }
    }
}

/// Entry point for engine events and administrator configuration changes.
///
/// Filter reads and updates, log writes, destination swaps and their
/// diagnostics all run under one lock. Each line is therefore written whole,
/// and no event is ever checked against a half-applied configuration.
///
/// The cost: a write that blocks (stalled storage, say) blocks every session
/// with a matching read and every configuration change until it returns.
/// There is no timeout or retry.
#[derive(Debug)]
pub struct Dispatcher {
    shared: Mutex<Shared>,
}

impl Dispatcher {
    /// Open the configured log file and apply the initial allow-lists and
    /// flush policy.
    ///
    /// Fails with [`ConfigError::StartupOpenFailed`] if the log file cannot
    /// be opened, in which case auditing must not be activated.
    pub fn start(config: &AuditConfig) -> Result<Self, ConfigError> {
        info!("Initializing");

        let writer = match LogWriter::open(&config.log_file, config.always_fflush) {
            Ok(writer) => writer,
            Err(err) => {
                error!(
                    path = %config.log_file.display(),
                    %err,
                    "Unable to create or open log file"
                );
                return Err(err);
            }
        };
        info!("[query_audit_log_file] set to: {}", config.log_file.display());

        let mut shared = Shared {
            filters: FilterStore::with_capacity(config.filter_capacity),
            writer,
        };
        for change in [
            ConfigChange::LogDatabases(config.log_databases.clone()),
            ConfigChange::LogTables(config.log_tables.clone()),
            ConfigChange::AlwaysFlush(config.always_fflush),
        ] {
            shared.apply(&change)?;
        }

        Ok(Self {
            shared: Mutex::new(shared),
        })
    }

    /// Route one event observed on `session`.
    pub fn dispatch(&self, event: &AuditEvent, session: &mut Session) -> Outcome {
        match event {
            AuditEvent::Connection(conn) => match conn.subclass {
                ConnectionSubclass::Connect | ConnectionSubclass::ChangeUser => {
                    session.on_connection_event(conn);
                    let _diagnostics = self.shared.lock();
                    debug!(
                        session = session.id(),
                        identity = session.identity(),
                        "session identity set"
                    );
                    Outcome::IdentityUpdated
                }
                ConnectionSubclass::Other => Outcome::Ignored,
            },
            AuditEvent::TableAccess(access) if access.subclass == TableAccessSubclass::Read => {
                let mut shared = self.shared.lock();
                if !shared.filters.is_allowed(FilterKind::Database, &access.database)
                    || !shared.filters.is_allowed(FilterKind::Table, &access.table)
                {
                    return Outcome::Filtered;
                }
                shared.record(access, session)
            }
            AuditEvent::TableAccess(_) | AuditEvent::Other => Outcome::Ignored,
        }
    }

    /// Apply an administrator configuration change.
    ///
    /// A failed destination change leaves the previous destination active.
    pub fn apply_config(&self, change: ConfigChange) -> Result<Applied, ConfigError> {
        self.shared.lock().apply(&change)
    }

    /// Whether a read of `database.table` would currently be audited.
    pub fn would_audit(&self, database: &str, table: &str) -> bool {
        let shared = self.shared.lock();
        shared.filters.is_allowed(FilterKind::Database, database)
            && shared.filters.is_allowed(FilterKind::Table, table)
    }

    /// Flush and close the log. Matching reads after this are lost and
    /// reported as such.
    pub fn shutdown(&self) {
        let mut shared = self.shared.lock();
        info!("Shutting down");
        shared.writer.shutdown();
    }
}
