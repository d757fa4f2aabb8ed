//! Per-adapter instance lock using a Unix socket.
//!
//! Two bridges driving the same CEC adapter would fight over it, so a bridge
//! holds a socket named after its adapter port for its whole lifetime. The OS
//! releases the socket if the process dies.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another bridge holds the lock for this adapter port.
    #[error("another bridge is already using {0}")]
    AlreadyRunning(String),

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Per-adapter lock held through a bound Unix socket.
///
/// The lock lasts as long as this struct. Dropping it removes the socket
/// file; a socket left by a crashed process is detected and replaced.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock for the adapter on `port`.
    pub fn acquire(port: &str) -> Result<Self, InstanceLockError> {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        Self::acquire_in(&runtime_dir, port)
    }

    /// Acquire the lock with its socket placed in `dir`.
    fn acquire_in(dir: &Path, port: &str) -> Result<Self, InstanceLockError> {
        let path = socket_path(dir, port);

        // A socket file nobody answers on was left behind by a killed process.
        if path.exists() {
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(port.to_string()));
            }
            let _ = std::fs::remove_file(&path);
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(port.to_string()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    /// Path of the socket backing this lock.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `/dev/ttyACM0` -> `<dir>/cec-mqtt-bridge-dev-ttyACM0.sock`
fn socket_path(dir: &Path, port: &str) -> PathBuf {
    let name: String = port
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    dir.join(format!("cec-mqtt-bridge-{}.sock", name))
}
