use std::fmt;

use crate::event::{ConnectionEvent, ConnectionSubclass};

/// `user@host` for a session, falling back to the IP when the engine did
/// not resolve a host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn from_connection(event: &ConnectionEvent) -> Self {
        let host = match event.host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => event.ip.as_str(),
        };
        Self(format!("{}@{}", event.user, host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-connection state owned by the host's session.
///
/// The host creates one `Session` per client connection, passes it to every
/// dispatch on that connection, and drops it when the connection ends. Only
/// the owning session's thread touches it, so it needs no locking.
#[derive(Debug)]
pub struct Session {
    id: u64,
    identity: Option<SessionIdentity>,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self { id, identity: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Record the identity from a connect or change-user event, replacing
    /// any previous one. Returns `false` (and changes nothing) for other
    /// subclasses.
    pub fn on_connection_event(&mut self, event: &ConnectionEvent) -> bool {
        match event.subclass {
            ConnectionSubclass::Connect | ConnectionSubclass::ChangeUser => {
                self.identity = Some(SessionIdentity::from_connection(event));
                true
            }
            ConnectionSubclass::Other => false,
        }
    }

    /// The current identity, or `""` if no connect event was seen (for
    /// example a pooled connection established before auditing started).
    pub fn identity(&self) -> &str {
        self.identity.as_ref().map_or("", SessionIdentity::as_str)
    }
}
