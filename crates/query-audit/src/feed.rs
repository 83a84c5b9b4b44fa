//! JSON-lines event feed, replayed the way the engine would deliver it.
//!
//! Every session id gets its own thread, so events of one session are
//! dispatched in feed order while different sessions race each other.
//! A configuration line is applied from the reading thread once every
//! session has dispatched the events read before it.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ConfigChange;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::event::AuditEvent;
use crate::identity::Session;

/// One line of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FeedLine {
    Event { session: u64, event: AuditEvent },
    Config { config: ConfigChange },
}

/// Totals for a replayed feed.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub sessions: usize,
    pub outcomes: HashMap<Outcome, usize>,
    pub config_applied: usize,
    pub config_failed: usize,
    pub malformed: usize,
}

impl Summary {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

/// Work handed to a session thread.
enum SessionMessage {
    Event(AuditEvent),
    /// Acknowledge once everything queued before it has been dispatched.
    Barrier(mpsc::Sender<()>),
}

/// Replay `reader` against `dispatcher`, returning once every session
/// thread has drained its events.
///
/// Malformed lines are skipped with a warning. Only a failure to read the
/// feed itself is an error.
pub fn replay(reader: impl BufRead, dispatcher: &Dispatcher) -> Result<Summary> {
    std::thread::scope(|s| {
        let mut senders: HashMap<u64, mpsc::Sender<SessionMessage>> = HashMap::new();
        let mut workers = Vec::new();
        let mut summary = Summary::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line.context("failed to read event feed")?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<FeedLine>(&line) {
                Ok(FeedLine::Event { session, event }) => {
                    let tx = senders.entry(session).or_insert_with(|| {
                        let (tx, rx) = mpsc::channel();
                        workers.push(s.spawn(move || run_session(session, rx, dispatcher)));
                        tx
                    });
                    if tx.send(SessionMessage::Event(event)).is_err() {
                        warn!(session, "session worker gone; event dropped");
                    }
                }
                Ok(FeedLine::Config { config }) => {
                    drain(&senders);
                    match dispatcher.apply_config(config) {
                        Ok(applied) => {
                            debug!(?applied, "configuration applied");
                            summary.config_applied += 1;
                        }
                        Err(err) => {
                            warn!(%err, "configuration change rejected");
                            summary.config_failed += 1;
                        }
                    }
                }
                Err(err) => {
                    warn!(line = index + 1, %err, "skipping malformed feed line");
                    summary.malformed += 1;
                }
            }
        }

        // Closing the channels ends the session threads.
        drop(senders);
        summary.sessions = workers.len();
        for worker in workers {
            let tally = worker
                .join()
                .map_err(|_| anyhow!("session worker panicked"))?;
            for (outcome, n) in tally {
                *summary.outcomes.entry(outcome).or_default() += n;
            }
        }
        Ok(summary)
    })
}

/// Block until every session thread has dispatched what it was sent.
fn drain(senders: &HashMap<u64, mpsc::Sender<SessionMessage>>) {
    let (ack_tx, ack_rx) = mpsc::channel();
    let mut pending = 0;
    for (session, tx) in senders {
        if tx.send(SessionMessage::Barrier(ack_tx.clone())).is_ok() {
            pending += 1;
        } else {
            warn!(session, "session worker gone; not waiting for it");
        }
    }
    drop(ack_tx);
    // A worker that dies mid-queue drops its ack sender, which ends the wait.
    for _ in ack_rx.iter().take(pending) {}
}

fn run_session(
    id: u64,
    rx: mpsc::Receiver<SessionMessage>,
    dispatcher: &Dispatcher,
) -> HashMap<Outcome, usize> {
    let mut session = Session::new(id);
    let mut tally = HashMap::new();
    for message in rx {
        match message {
            SessionMessage::Event(event) => {
                let outcome = dispatcher.dispatch(&event, &mut session);
                *tally.entry(outcome).or_default() += 1;
            }
            SessionMessage::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!(session = id, identity = session.identity(), "session ended");
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir) -> (Dispatcher, std::path::PathBuf) {
        let path = dir.path().join("audit.log");
        let config = AuditConfig {
            log_file: path.clone(),
            ..AuditConfig::default()
        };
        (Dispatcher::start(&config).unwrap(), path)
    }

    fn connect_line(session: u64, fields: &str) -> String {
        format!(
            r#"{{"session":{session},"event":{{"connection":{{"subclass":"connect",{fields}}}}}}}"#
        )
    }

    fn access_line(session: u64, subclass: &str, table: &str, query: &str) -> String {
        format!(
            concat!(
                r#"{{"session":{},"event":{{"table_access":"#,
                r#"{{"subclass":"{}","database":"shop","table":"{}","query_text":"{}"}}}}}}"#,
            ),
            session, subclass, table, query
        )
    }

    fn read_lines(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parse_event_and_config_lines() {
        let line: FeedLine = serde_json::from_str(concat!(
            r#"{"session":7,"event":{"connection":"#,
            r#"{"subclass":"connect","user":"bob","host":null,"ip":"192.168.1.1"}}}"#,
        ))
        .unwrap();
        assert_eq!(
            line,
            FeedLine::Event {
                session: 7,
                event: AuditEvent::connect("bob", None, "192.168.1.1"),
            }
        );

        let line: FeedLine =
            serde_json::from_str(r#"{"config":{"log_tables":"orders,users"}}"#).unwrap();
        assert_eq!(
            line,
            FeedLine::Config {
                config: ConfigChange::LogTables("orders,users".to_string()),
            }
        );
    }

    #[test]
    fn replay_tallies_outcomes_per_session() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, path) = dispatcher(&dir);
        let feed = [
            r#"{"config":{"log_databases":"shop"}}"#.to_string(),
            r#"{"config":{"log_tables":"orders,users"}}"#.to_string(),
            connect_line(1, r#""user":"alice","ip":"10.0.0.5""#),
            connect_line(2, r#""user":"bob","host":"laptop","ip":"10.0.0.6""#),
            access_line(1, "read", "orders", "SELECT * FROM orders"),
            access_line(2, "read", "products", "SELECT * FROM products"),
            access_line(2, "update", "users", "UPDATE users SET x = 1"),
            access_line(2, "read", "users", "SELECT * FROM users"),
            "not json".to_string(),
            r#"{"config":{"log_file":"/nonexistent-dir/audit.log"}}"#.to_string(),
        ]
        .join("\n");
        let summary = replay(feed.as_bytes(), &dispatcher).unwrap();
        dispatcher.shutdown();

        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.config_applied, 2);
        assert_eq!(summary.config_failed, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.count(Outcome::IdentityUpdated), 2);
        assert_eq!(summary.count(Outcome::Recorded), 2);
        assert_eq!(summary.count(Outcome::Filtered), 1);
        assert_eq!(summary.count(Outcome::Ignored), 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        let users: Vec<String> = contents
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["connection_user"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(users.len(), 2);
        assert!(users.contains(&"alice@10.0.0.5".to_string()));
        assert!(users.contains(&"bob@laptop".to_string()));
    }

    #[test]
    fn config_waits_for_events_read_before_it() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, path) = dispatcher(&dir);
        let mut feed = vec![
            r#"{"config":{"log_databases":"shop"}}"#.to_string(),
            r#"{"config":{"log_tables":"orders"}}"#.to_string(),
        ];
        for i in 0..500 {
            feed.push(access_line(1, "read", "orders", &format!("SELECT {i}")));
        }
        feed.push(r#"{"config":{"log_tables":""}}"#.to_string());
        for i in 0..20 {
            feed.push(access_line(1, "read", "orders", &format!("SELECT late {i}")));
        }

        let summary = replay(feed.join("\n").as_bytes(), &dispatcher).unwrap();
        dispatcher.shutdown();

        assert_eq!(summary.config_applied, 3);
        assert_eq!(summary.count(Outcome::Recorded), 500);
        assert_eq!(summary.count(Outcome::Filtered), 20);
        assert_eq!(read_lines(&path).len(), 500);
    }

    #[test]
    fn config_line_toggles_flush_policy() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, path) = dispatcher(&dir);

        let feed = [
            r#"{"config":{"log_databases":"shop"}}"#.to_string(),
            r#"{"config":{"log_tables":"orders"}}"#.to_string(),
            r#"{"config":{"always_fflush":false}}"#.to_string(),
            access_line(1, "read", "orders", "SELECT buffered"),
        ]
        .join("\n");
        let summary = replay(feed.as_bytes(), &dispatcher).unwrap();
        assert_eq!(summary.config_applied, 3);
        assert_eq!(summary.count(Outcome::Recorded), 1);
        assert!(read_lines(&path).is_empty());

        let feed = [
            r#"{"config":{"always_fflush":true}}"#.to_string(),
            access_line(1, "read", "orders", "SELECT flushed"),
        ]
        .join("\n");
        let summary = replay(feed.as_bytes(), &dispatcher).unwrap();
        assert_eq!(summary.config_applied, 1);
        assert_eq!(summary.count(Outcome::Recorded), 1);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("SELECT buffered"));
        assert!(lines[1].contains("SELECT flushed"));
        dispatcher.shutdown();
    }

    #[test]
    fn empty_feed_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _) = dispatcher(&dir);
        let summary = replay("\n\n".as_bytes(), &dispatcher).unwrap();
        assert_eq!(summary.sessions, 0);
        assert!(summary.outcomes.is_empty());
    }
}
