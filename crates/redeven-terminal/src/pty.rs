//! PTY spawning and the blocking reader/writer tasks around it, grounded
//! on the `portable-pty` usage pattern for a long-lived interactive shell
//! rather than a one-shot exec.

use std::io::{ErrorKind, Read as _, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::{mpsc, oneshot};

use crate::error::{TerminalError, TerminalResult};

/// A running PTY-backed child process and the handles needed to drive it.
pub struct PtyHandle {
    pub(crate) master: Arc<StdMutex<Box<dyn MasterPty + Send>>>,
    pub(crate) writer_tx: mpsc::Sender<Vec<u8>>,
    pub(crate) killer: StdMutex<Box<dyn ChildKiller + Send + Sync>>,
    pub(crate) pid: Option<u32>,
}

/// How the child process ended.
#[derive(Debug, Clone, Copy)]
pub enum ExitReason {
    /// The child process exited with this code.
    Exited(i32),
    /// The PTY reader hit EOF without us seeing an exit code (the master
    /// side closed first).
    Eof,
}

/// Spawn `shell -c cmd`-shaped session: here, just `shell` with no
/// arguments, as an interactive login-less shell under a fresh PTY sized
/// `(cols, rows)` rooted at `cwd`.
///
/// Returns the handle, a channel of raw output chunks (pre-sequencing),
/// and a one-shot fired when the child exits.
///
/// # Errors
///
/// Returns [`TerminalError::Unavailable`] if the PTY cannot be allocated
/// or the shell cannot be spawned.
pub fn spawn(shell: &str, cwd: &Path, cols: u16, rows: u16) -> TerminalResult<(PtyHandle, mpsc::Receiver<Vec<u8>>, oneshot::Receiver<ExitReason>)> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
        .map_err(|source| TerminalError::Unavailable(format!("openpty failed: {source}")))?;

    let mut command = CommandBuilder::new(shell);
    command.cwd(cwd);

    let mut child = pair
        .slave
        .spawn_command(command)
        .map_err(|source| TerminalError::Unavailable(format!("failed to spawn {shell}: {source}")))?;
    let pid = child.process_id();
    let killer = child.clone_killer();

    let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(256);
    let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(256);
    let (exit_tx, exit_rx) = oneshot::channel::<ExitReason>();

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|source| TerminalError::Unavailable(format!("failed to clone PTY reader: {source}")))?;
    tokio::task::spawn_blocking(move || {
        let mut buf = [0_u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });

    let writer = pair
        .master
        .take_writer()
        .map_err(|source| TerminalError::Unavailable(format!("failed to take PTY writer: {source}")))?;
    let writer = Arc::new(StdMutex::new(writer));
    tokio::spawn(async move {
        while let Some(bytes) = writer_rx.recv().await {
            let writer = Arc::clone(&writer);
            let _ = tokio::task::spawn_blocking(move || {
                if let Ok(mut guard) = writer.lock() {
                    let _ = guard.write_all(&bytes);
                    let _ = guard.flush();
                }
            })
            .await;
        }
    });

    tokio::task::spawn_blocking(move || {
        #[allow(clippy::cast_possible_wrap)]
        let reason = match child.wait() {
            Ok(status) => ExitReason::Exited(status.exit_code() as i32),
            Err(_) => ExitReason::Eof,
        };
        let _ = exit_tx.send(reason);
    });

    let handle = PtyHandle {
        master: Arc::new(StdMutex::new(pair.master)),
        writer_tx,
        killer: StdMutex::new(killer),
        pid,
    };
    Ok((handle, output_rx, exit_rx))
}

impl PtyHandle {
    /// Resize the PTY. Best-effort: logged but not fatal on failure.
    pub async fn resize(&self, cols: u16, rows: u16) {
        let master = Arc::clone(&self.master);
        let resized = tokio::task::spawn_blocking(move || {
            let guard = master.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 }).is_ok()
        })
        .await
        .unwrap_or(false);
        if !resized {
            tracing::warn!(cols, rows, "PTY resize failed");
        }
    }

    /// Send bytes to the child's stdin.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::Io`] if the writer task has already shut
    /// down (the child has exited).
    pub async fn write_input(&self, bytes: Vec<u8>) -> TerminalResult<()> {
        self.writer_tx
            .send(bytes)
            .await
            .map_err(|_| TerminalError::Io(std::io::Error::other("terminal writer task is gone")))
    }

    /// Kill the child process.
    pub fn kill(&self) {
        if let Ok(mut guard) = self.killer.lock() {
            let _ = guard.kill();
        }
    }
}
