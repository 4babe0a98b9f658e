//! Terminal: binds a PTY to a screen buffer through the parser.
//!
//! One reader thread per terminal pulls PTY output into a bounded byte
//! queue; the UI thread drains a bounded amount per frame through
//! [`Terminal::process_output`]. Queue-full blocks the reader, applying
//! backpressure to the child. Bytes from a single PTY are parsed in strict
//! FIFO order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::input::{self, Key};
use crate::palette::Palette;
use crate::parser::{Action, Parser};
use crate::pty::{Pty, PtyError};
use crate::reply::ReplyEngine;
use crate::screen::{ScreenBuffer, ViewportMetrics};
use crate::width::WidthPolicy;

/// Reader thread buffer size.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Queue bound in chunks; with 64 KiB reads this caps queued output at
/// ~4 MiB before the reader blocks.
const QUEUE_CHUNKS: usize = 64;

/// Hard cap on bytes fed to the parser per [`Terminal::process_output`]
/// call, keeping frame pacing smooth.
const MAX_DRAIN_BYTES: usize = 1024 * 1024;

/// Host-visible terminal emissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// BEL received.
    Bell,
    /// OSC 0/2 title change.
    Title(String),
    /// The child exited and all queued output has been drained.
    Exited,
}

/// Consumer of terminal emissions; the renderer/shell implements this.
pub trait TerminalSink {
    fn on_event(&mut self, event: TerminalEvent);
}

/// Construction options beyond the grid size.
#[derive(Debug, Clone)]
pub struct TerminalOptions {
    pub scrollback_max: usize,
    pub palette: Palette,
    pub width_policy: WidthPolicy,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            scrollback_max: 10_000,
            palette: Palette::default(),
            width_policy: WidthPolicy::Standard,
        }
    }
}

/// A live terminal: PTY + parser + screen buffer + reader worker.
pub struct Terminal {
    pty: Box<dyn Pty>,
    screen: ScreenBuffer,
    parser: Parser,
    reply: ReplyEngine,
    rx: Receiver<Vec<u8>>,
    /// Chunk partially fed when the drain budget ran out.
    pending: Vec<u8>,
    pending_pos: usize,
    running: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    sink: Option<Box<dyn TerminalSink>>,
    title: String,
    closed: bool,
    exit_notified: bool,
}

impl Terminal {
    /// Spawn the shell and start the reader worker.
    ///
    /// On failure the terminal is not constructed (a pane cannot exist
    /// without a PTY).
    pub fn start(
        cols: u16,
        rows: u16,
        shell_hint: Option<&str>,
        options: TerminalOptions,
    ) -> Result<Self, PtyError> {
        let pty = crate::pty::PtyProcess::create(cols, rows, shell_hint)?;
        Self::start_with_pty(Box::new(pty), cols, rows, options)
    }

    /// Bind an already-created PTY (the seam used by tests and alternate
    /// hosts).
    pub fn start_with_pty(
        mut pty: Box<dyn Pty>,
        cols: u16,
        rows: u16,
        options: TerminalOptions,
    ) -> Result<Self, PtyError> {
        let mut reader = pty.take_output_reader()?;
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(QUEUE_CHUNKS);
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let reader_thread = std::thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || reader_loop(&mut *reader, &tx, &flag))
            .map_err(PtyError::Io)?;

        Ok(Self {
            pty,
            screen: ScreenBuffer::new(
                cols,
                rows,
                options.scrollback_max,
                options.palette,
                options.width_policy,
            ),
            parser: Parser::new(),
            reply: ReplyEngine,
            rx,
            pending: Vec::new(),
            pending_pos: 0,
            running,
            reader_thread: Some(reader_thread),
            sink: None,
            title: String::new(),
            closed: false,
            exit_notified: false,
        })
    }

    /// Install the emission sink (title, bell, exit).
    pub fn set_sink(&mut self, sink: Box<dyn TerminalSink>) {
        self.sink = Some(sink);
    }

    // ── Inspection ──────────────────────────────────────────────────

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn cursor(&self) -> (u16, u16) {
        let cursor = self.screen.cursor();
        (cursor.col, cursor.row)
    }

    #[must_use]
    pub fn buffer(&self) -> &ScreenBuffer {
        &self.screen
    }

    #[must_use]
    pub fn buffer_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.screen
    }

    /// True until the child reports exit (and not closed by error).
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.closed && self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn viewport_metrics(&self) -> ViewportMetrics {
        self.screen.viewport_metrics()
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Write bytes to the child. A write failure after start marks the
    /// terminal closed; queued reads are still drained.
    pub fn send_input(&mut self, bytes: &[u8]) {
        if self.closed {
            return;
        }
        let mut written = 0;
        while written < bytes.len() {
            match self.pty.write_input(&bytes[written..]) {
                Ok(0) => {
                    warn!("pty input channel closed mid-write");
                    self.closed = true;
                    return;
                }
                Ok(n) => written += n,
                Err(err) => {
                    warn!(%err, "pty write failed; closing terminal");
                    self.closed = true;
                    return;
                }
            }
        }
    }

    /// Encode and send a semantic key press.
    pub fn send_key(&mut self, key: Key) {
        if let Some(bytes) = input::encode_key(key, self.screen.modes()) {
            self.send_input(&bytes);
        }
    }

    /// Send pasted text, bracketed when the child requested it.
    pub fn send_paste(&mut self, text: &str) {
        let bytes = input::encode_paste(text, self.screen.modes());
        self.send_input(&bytes);
    }

    // ── Output ──────────────────────────────────────────────────────

    /// Drain queued PTY output into the parser, bounded per call.
    ///
    /// Called from the UI thread between frames. Returns the number of
    /// bytes processed; a full budget return means more output is pending.
    pub fn process_output(&mut self) -> usize {
        let mut budget = MAX_DRAIN_BYTES;
        let mut processed = 0;

        loop {
            if self.pending_pos >= self.pending.len() {
                match self.rx.try_recv() {
                    Ok(chunk) => {
                        self.pending = chunk;
                        self.pending_pos = 0;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            if budget == 0 {
                break;
            }

            let available = self.pending.len() - self.pending_pos;
            let take = available.min(budget);
            let start = self.pending_pos;
            let actions = self.parser.feed(&self.pending[start..start + take]);
            self.pending_pos += take;
            budget -= take;
            processed += take;

            for action in actions {
                self.apply(action);
            }
        }

        if processed == 0
            && !self.exit_notified
            && !self.running.load(Ordering::Acquire)
            && self.pending_pos >= self.pending.len()
        {
            self.exit_notified = true;
            self.emit(TerminalEvent::Exited);
        }
        processed
    }

    fn apply(&mut self, action: Action) {
        if let Some(reply) = self.reply.reply_for_action(&action, self.screen.cursor()) {
            self.write_reply(&reply);
            return;
        }
        match action {
            Action::Bell => self.emit(TerminalEvent::Bell),
            Action::SetTitle(title) => {
                self.title = title.clone();
                self.emit(TerminalEvent::Title(title));
            }
            other => self.screen.apply_action(&other),
        }
    }

    fn write_reply(&mut self, reply: &[u8]) {
        if self.closed {
            return;
        }
        let mut written = 0;
        while written < reply.len() {
            match self.pty.write_input(&reply[written..]) {
                Ok(0) => {
                    self.closed = true;
                    return;
                }
                Ok(n) => written += n,
                Err(err) => {
                    debug!(%err, "reply write failed");
                    self.closed = true;
                    return;
                }
            }
        }
    }

    fn emit(&mut self, event: TerminalEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_event(event);
        }
    }

    // ── Geometry ────────────────────────────────────────────────────

    /// Resize the PTY, then the screen buffer.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if !self.closed {
            if let Err(err) = self.pty.resize(cols, rows) {
                debug!(%err, "pty resize failed");
            }
        }
        self.screen.resize(cols, rows);
    }

    /// Scroll the viewport by a signed row delta (positive = into history).
    pub fn scroll_viewport(&mut self, delta: isize) {
        self.screen.scroll_viewport(delta);
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        // Terminates the child; the reader hits EOF/error and exits. The
        // thread is not joined because it may be blocked in a read that
        // only resolves after process teardown.
        self.pty.close();
        self.reader_thread.take();
    }
}

fn reader_loop(
    reader: &mut dyn crate::pty::PtyReader,
    tx: &SyncSender<Vec<u8>>,
    running: &AtomicBool,
) {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read_output(&mut buf) {
            Ok(0) => {
                debug!("pty reader reached eof");
                break;
            }
            Ok(n) => {
                // A full queue blocks here, backpressuring the child.
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) => {
                debug!(%err, "pty reader error");
                break;
            }
        }
    }
    running.store(false, Ordering::Release);
}
