// Process bookkeeping for the research server: PID file, lock file, stop

use crate::error::{DelveError, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

/// Grace period polls after SIGTERM before escalating
const STOP_POLLS: u32 = 10;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Graceful,
    Killed,
    /// Still alive after SIGKILL, or the PID file is stale
    Unresponsive,
}

/// Manages the PID and lock files of the server process
#[derive(Debug, Clone)]
pub struct ProcessManager {
    pid_file: PathBuf,
    lock_file: PathBuf,
}

impl ProcessManager {
    pub fn new(pid_file: PathBuf) -> Self {
        let lock_file = pid_file.with_extension("lock");
        Self {
            pid_file,
            lock_file,
        }
    }

    /// Whether the PID file names a live process
    pub fn is_running(&self) -> bool {
        match self.read_pid() {
            // Signal 0 only checks existence
            Ok(pid) => kill(Pid::from_raw(pid), None).is_ok(),
            Err(_) => false,
        }
    }

    /// Take the lock and record this process as the server
    ///
    /// Leftovers from a server that died without cleanup are removed first.
    pub fn acquire(&self) -> Result<()> {
        if self.is_running() {
            return Err(DelveError::Server("Server is already running".to_string()));
        }

        if self.lock_file.exists() || self.pid_file.exists() {
            tracing::warn!("Removing stale server files at {:?}", self.pid_file);
            self.release()?;
        }

        self.acquire_lock()?;
        self.write_pid(std::process::id())
    }

    /// Remove the PID and lock files
    pub fn release(&self) -> Result<()> {
        for file in [&self.pid_file, &self.lock_file] {
            if file.exists() {
                std::fs::remove_file(file).map_err(|e| DelveError::Io {
                    source: e,
                    context: format!("Failed to remove {:?}", file),
                })?;
            }
        }
        Ok(())
    }

    pub fn read_pid(&self) -> Result<i32> {
        let contents = std::fs::read_to_string(&self.pid_file).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to read PID file: {:?}", self.pid_file),
        })?;

        contents
            .trim()
            .parse()
            .map_err(|_| DelveError::Server("Invalid PID in file".to_string()))
    }

    fn write_pid(&self, pid: u32) -> Result<()> {
        ensure_parent(&self.pid_file)?;
        std::fs::write(&self.pid_file, pid.to_string()).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to write PID file: {:?}", self.pid_file),
        })
    }

    fn acquire_lock(&self) -> Result<()> {
        ensure_parent(&self.lock_file)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_file)
            .map_err(|_| {
                DelveError::Server(
                    "Failed to acquire lock - server may already be running".to_string(),
                )
            })?;
        Ok(())
    }

    /// Send a signal to the recorded process
    pub fn signal(&self, sig: Signal) -> Result<()> {
        let pid = self.read_pid()?;
        kill(Pid::from_raw(pid), sig)
            .map_err(|_| DelveError::Server(format!("Failed to send signal to process {}", pid)))
    }

    /// SIGTERM, wait for exit, then SIGKILL
    pub fn stop(&self) -> Result<StopOutcome> {
        if !self.is_running() {
            return Ok(StopOutcome::NotRunning);
        }

        tracing::debug!("Sending SIGTERM to server");
        self.signal(Signal::SIGTERM)?;

        for _ in 0..STOP_POLLS {
            sleep(STOP_POLL_INTERVAL);
            if !self.is_running() {
                return Ok(StopOutcome::Graceful);
            }
        }

        tracing::warn!("Server not responding, sending SIGKILL");
        self.signal(Signal::SIGKILL)?;
        sleep(STOP_POLL_INTERVAL);

        if self.is_running() {
            Ok(StopOutcome::Unresponsive)
        } else {
            // A killed server cannot clean up after itself
            self.release()?;
            Ok(StopOutcome::Killed)
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to create directory: {:?}", parent),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_not_running_initially() {
        let temp_dir = TempDir::new().unwrap();
        let pm = ProcessManager::new(temp_dir.path().join("delve.pid"));

        assert!(!pm.is_running());
        assert_eq!(pm.stop().unwrap(), StopOutcome::NotRunning);
    }

    #[test]
    fn test_acquire_and_release() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("run").join("delve.pid");
        let pm = ProcessManager::new(pid_file.clone());

        pm.acquire().unwrap();
        assert!(pid_file.exists());
        assert!(pm.lock_file().exists());
        assert!(pm.is_running());
        assert_eq!(pm.read_pid().unwrap(), std::process::id() as i32);

        pm.release().unwrap();
        assert!(!pid_file.exists());
        assert!(!pm.lock_file().exists());
    }

    #[test]
    fn test_cannot_acquire_twice() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("delve.pid");
        let pm1 = ProcessManager::new(pid_file.clone());
        let pm2 = ProcessManager::new(pid_file);

        pm1.acquire().unwrap();
        assert!(pm2.acquire().is_err());

        pm1.release().unwrap();
    }

    #[test]
    fn test_stale_files_are_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("delve.pid");
        let pm = ProcessManager::new(pid_file.clone());

        // No process has this PID
        std::fs::write(&pid_file, i32::MAX.to_string()).unwrap();
        std::fs::write(pm.lock_file(), "").unwrap();

        pm.acquire().unwrap();
        assert_eq!(pm.read_pid().unwrap(), std::process::id() as i32);
        pm.release().unwrap();
    }
}
