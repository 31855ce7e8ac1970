//! File-based single-instance lock.
//!
//! Acquisition is atomic via an OS advisory lock
//! ([`fs2::FileExt::try_lock_exclusive`]) on a pid file in the config
//! directory, so two processes racing to start at the same instant can't
//! both succeed. A lock file left behind by an ungraceful termination is
//! detected as stale by checking the recorded pid's liveness
//! (`kill(pid, 0)`) before reclaiming it; a pid that is still alive fails
//! fast with an actionable error instead of fighting the live instance for
//! the lock.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::error::{SupervisorError, SupervisorResult};
use crate::paths::AgentPaths;

/// A held process lock. Releases the OS lock and removes the lock file on
/// drop.
pub struct ProcessLock {
    path: PathBuf,
    file: File,
}

impl ProcessLock {
    /// Acquire the single-instance lock for `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] if a live instance holds
    /// the lock, or [`SupervisorError::Lock`] if the lock file cannot be
    /// created, locked, or written.
    pub fn acquire(paths: &AgentPaths) -> SupervisorResult<Self> {
        let path = paths.lock_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SupervisorError::Lock { path: path.clone(), source })?;
        }

        if let Some(pid) = read_pid(&path) {
            if is_alive(pid) {
                return Err(SupervisorError::AlreadyRunning { pid: Some(pid) });
            }
            warn!(pid, path = %path.display(), "reclaiming stale lock file");
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| SupervisorError::Lock { path: path.clone(), source })?;

        file.try_lock_exclusive().map_err(|_| SupervisorError::AlreadyRunning { pid: read_pid(&path) })?;

        file.set_len(0).map_err(|source| SupervisorError::Lock { path: path.clone(), source })?;
        file.seek(SeekFrom::Start(0)).map_err(|source| SupervisorError::Lock { path: path.clone(), source })?;
        write!(file, "{}", std::process::id()).map_err(|source| SupervisorError::Lock { path: path.clone(), source })?;
        file.sync_all().map_err(|source| SupervisorError::Lock { path: path.clone(), source })?;

        info!(pid = std::process::id(), path = %path.display(), "acquired process lock");
        Ok(Self { path, file })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), None).is_ok()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn paths_in(dir: &TempDir) -> AgentPaths {
        AgentPaths { base_dir: dir.path().to_path_buf() }
    }

    #[test]
    fn acquire_then_release_allows_a_second_acquire() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);

        let lock = ProcessLock::acquire(&paths).unwrap();
        drop(lock);

        assert!(ProcessLock::acquire(&paths).is_ok());
    }

    #[test]
    fn second_acquire_while_first_is_held_fails() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);

        let _lock = ProcessLock::acquire(&paths).unwrap();
        let err = ProcessLock::acquire(&paths).unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyRunning { .. }));
    }

    #[test]
    fn stale_lock_file_from_a_dead_pid_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);

        std::fs::write(paths.lock_file(), "999999999").unwrap();
        assert!(ProcessLock::acquire(&paths).is_ok());
    }
}
