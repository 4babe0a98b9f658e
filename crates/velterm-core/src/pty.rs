//! The narrow pseudo-terminal abstraction and its host implementation.
//!
//! The terminal core consumes only the [`Pty`] and [`PtyReader`] traits;
//! [`PtyProcess`] wraps the host pseudo-terminal facility (ConPTY on
//! Windows, openpty elsewhere) through `portable-pty`. Shell selection
//! order: an explicit hint, then `pwsh`/`powershell`/`cmd` on Windows or
//! `$SHELL`/`/bin/sh` elsewhere.

use std::fmt;
use std::io::{self, Read, Write};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::debug;

/// PTY failure kinds.
#[derive(Debug)]
pub enum PtyError {
    /// Shell spawn or pseudo-console allocation failed. Fatal for a pane.
    CreateFailed(String),
    /// Read/write error after creation; the terminal transitions to closed.
    Io(io::Error),
    /// Operation on a PTY that has already been closed.
    Closed,
}

impl fmt::Display for PtyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PtyError::CreateFailed(reason) => write!(f, "failed to create pty: {reason}"),
            PtyError::Io(err) => write!(f, "pty i/o error: {err}"),
            PtyError::Closed => write!(f, "pty is closed"),
        }
    }
}

impl std::error::Error for PtyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PtyError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PtyError {
    fn from(err: io::Error) -> Self {
        PtyError::Io(err)
    }
}

/// Blocking read half of a PTY, consumed by the reader worker thread.
pub trait PtyReader: Send {
    /// Blocking read of available output. `Ok(0)` means EOF (child exited
    /// and the pipe drained).
    fn read_output(&mut self, buf: &mut [u8]) -> Result<usize, PtyError>;
}

/// The pseudo-terminal contract the terminal core consumes.
pub trait Pty: Send {
    /// Resize the pseudo-console.
    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Synchronous write to the child's input; may write partially.
    fn write_input(&mut self, bytes: &[u8]) -> Result<usize, PtyError>;

    /// Take the blocking output reader. Can be taken once; the reader
    /// worker owns it for the lifetime of the terminal.
    fn take_output_reader(&mut self) -> Result<Box<dyn PtyReader>, PtyError>;

    /// Whether the child process is still running.
    fn is_alive(&mut self) -> bool;

    /// Terminate the child and release the console.
    fn close(&mut self);
}

struct BlockingReader {
    inner: Box<dyn Read + Send>,
}

impl PtyReader for BlockingReader {
    fn read_output(&mut self, buf: &mut [u8]) -> Result<usize, PtyError> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(PtyError::Io(err)),
            }
        }
    }
}

/// Host PTY implementation over `portable-pty`.
pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    reader: Option<Box<dyn PtyReader>>,
    closed: bool,
}

impl PtyProcess {
    /// Spawn the shell through the host pseudo-console.
    ///
    /// `shell_hint` overrides platform shell selection when non-empty.
    pub fn create(cols: u16, rows: u16, shell_hint: Option<&str>) -> Result<Self, PtyError> {
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let shell = match shell_hint {
            Some(hint) if !hint.is_empty() => hint.to_string(),
            _ => default_shell(),
        };
        debug!(shell = %shell, cols, rows, "spawning shell");

        let mut cmd = CommandBuilder::new(&shell);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        Ok(Self {
            master: pair.master,
            writer,
            child,
            reader: Some(Box::new(BlockingReader { inner: reader })),
            closed: false,
        })
    }
}

impl Pty for PtyProcess {
    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if self.closed {
            return Err(PtyError::Closed);
        }
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Io(io::Error::other(e.to_string())))
    }

    fn write_input(&mut self, bytes: &[u8]) -> Result<usize, PtyError> {
        if self.closed {
            return Err(PtyError::Closed);
        }
        let n = self.writer.write(bytes)?;
        self.writer.flush()?;
        Ok(n)
    }

    fn take_output_reader(&mut self) -> Result<Box<dyn PtyReader>, PtyError> {
        self.reader.take().ok_or(PtyError::Closed)
    }

    fn is_alive(&mut self) -> bool {
        !self.closed && matches!(self.child.try_wait(), Ok(None))
    }

    fn close(&mut self) {
        if !self.closed {
            let _ = self.child.kill();
            self.closed = true;
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.close();
    }
}

/// Platform shell selection order.
#[cfg(windows)]
fn default_shell() -> String {
    for candidate in ["pwsh.exe", "powershell.exe"] {
        if find_in_path(candidate) {
            return candidate.to_string();
        }
    }
    "cmd.exe".to_string()
}

#[cfg(windows)]
fn find_in_path(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| dir.join(name).is_file()))
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn default_shell_falls_back_to_sh() {
        // With $SHELL set the env value wins; either way the result is
        // non-empty and absolute-ish.
        let shell = default_shell();
        assert!(!shell.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn spawn_write_read_roundtrip() {
        let mut pty = PtyProcess::create(80, 24, Some("/bin/sh")).expect("spawn sh");
        assert!(pty.is_alive());

        let mut reader = pty.take_output_reader().expect("reader");
        pty.write_input(b"echo vt-ok\n").expect("write");

        let mut collected = String::new();
        let mut buf = [0u8; 4096];
        for _ in 0..50 {
            let n = reader.read_output(&mut buf).expect("read");
            if n == 0 {
                break;
            }
            collected.push_str(&String::from_utf8_lossy(&buf[..n]));
            if collected.contains("vt-ok") {
                break;
            }
        }
        assert!(collected.contains("vt-ok"), "output: {collected:?}");
        pty.close();
        assert!(!pty.is_alive());
    }

    #[cfg(unix)]
    #[test]
    fn reader_can_be_taken_once() {
        let mut pty = PtyProcess::create(20, 5, Some("/bin/sh")).expect("spawn sh");
        assert!(pty.take_output_reader().is_ok());
        assert!(matches!(pty.take_output_reader(), Err(PtyError::Closed)));
    }

    #[cfg(unix)]
    #[test]
    fn resize_succeeds_on_live_pty() {
        let mut pty = PtyProcess::create(80, 24, Some("/bin/sh")).expect("spawn sh");
        assert!(pty.resize(100, 40).is_ok());
    }
}
