use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

/// Errors raised while changing the log destination.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A runtime destination change could not open the new file. The
    /// previous destination, if any, is still active.
    #[error("could not create or open log file {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The initial destination could not be opened; auditing must not
    /// activate.
    #[error("unable to create or open log file at startup {}: {source}", .path.display())]
    StartupOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while appending a record.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The line was not written; the record is lost.
    #[error("failed to write to audit log: {0}")]
    WriteFailed(std::io::Error),

    /// The line was appended but could not be flushed; durability unknown.
    #[error("failed to flush audit log: {0}")]
    FlushFailed(std::io::Error),

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No destination is open (writer was shut down or never opened).
    #[error("audit log has no open destination")]
    NoDestination,
}

/// Open handle plus the path it was opened from.
struct Destination {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Destination {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    /// Flush and close. Failure is reported but the handle is released
    /// regardless.
    fn close(mut self) {
        if let Err(err) = self.out.flush() {
            error!(
                path = %self.path.display(),
                %err,
                "failed to flush audit log while closing"
            );
        }
    }
}

/// Append-only JSON-lines writer owning the single audit destination.
///
/// `LogWriter` does no locking of its own: every method takes `&mut self`,
/// and the owner is expected to hold it behind the process-wide lock so
/// that lines never interleave and a swap is never observed half-done.
///
/// Writes go through the stream's own buffer. With the always-flush policy
/// enabled, each line is flushed before [`write_record`](Self::write_record)
/// returns.
pub struct LogWriter {
    destination: Option<Destination>,
    always_flush: bool,
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("path", &self.path())
            .field("always_flush", &self.always_flush)
            .finish()
    }
}

impl LogWriter {
    /// Open the initial destination in append mode (created if missing).
    ///
    /// Parent directories are *not* created; a missing directory is an open
    /// failure like any other.
    pub fn open(path: impl AsRef<Path>, always_flush: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let destination =
            Destination::open(path).map_err(|source| ConfigError::StartupOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            destination: Some(destination),
            always_flush,
        })
    }

    /// Switch to a new destination.
    ///
    /// The new file is opened first. Only once that succeeds is the previous
    /// handle flushed and closed; on failure the previous handle stays active
    /// and keeps receiving writes.
    pub fn set_destination(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let next = match Destination::open(path) {
            Ok(next) => next,
            Err(source) => {
                error!(
                    path = %path.display(),
                    previous = ?self.path(),
                    %source,
                    "could not create or open log file; keeping previous destination"
                );
                return Err(ConfigError::OpenFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if let Some(previous) = self.destination.replace(next) {
            previous.close();
        }
        Ok(())
    }

    pub fn set_flush_policy(&mut self, always_flush: bool) {
        self.always_flush = always_flush;
    }

    pub fn always_flush(&self) -> bool {
        self.always_flush
    }

    /// Path of the active destination, or `None` once closed.
    pub fn path(&self) -> Option<&Path> {
        self.destination.as_ref().map(|d| d.path.as_path())
    }

    pub fn is_open(&self) -> bool {
        self.destination.is_some()
    }

    /// Append `line` and a trailing newline as one write.
    pub fn write_record(&mut self, line: &str) -> Result<(), IoError> {
        let Some(destination) = self.destination.as_mut() else {
            return Err(IoError::NoDestination);
        };

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        destination
            .out
            .write_all(&buf)
            .map_err(IoError::WriteFailed)?;

        if self.always_flush {
            destination.out.flush().map_err(IoError::FlushFailed)?;
        }
        Ok(())
    }

    /// Flush and close the destination. Further writes fail with
    /// [`IoError::NoDestination`].
    pub fn shutdown(&mut self) {
        match self.destination.take() {
            Some(destination) => {
                info!(path = %destination.path.display(), "closing audit log");
                destination.close();
            }
            None => warn!("audit log already closed"),
        }
    }
}
