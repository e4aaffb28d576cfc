use std::io::{self, BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum time between outbound cursor updates. Sends inside the window
/// are dropped, not queued: only the latest position matters.
pub const MIN_SEND_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

/// Inbound mailbox size; a full mailbox drops new values instead of
/// blocking the reader.
const MAILBOX_CAPACITY: usize = 10;

/// One JSONL message on the wire: `{"op":"cursor","line":N}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncMessage {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

struct Conn {
    stream: UnixStream,
    last_sent: Option<Instant>,
}

/// Best-effort cursor sync with an external editor over a Unix socket.
/// Absence of a client is fully supported standalone mode; every operation
/// is a safe no-op once the connection is closed.
pub struct SyncClient {
    conn: Mutex<Conn>,
    closed: Arc<AtomicBool>,
    cursor_rx: Receiver<usize>,
}

impl SyncClient {
    pub fn connect(socket_path: &Path) -> io::Result<SyncClient> {
        let stream = UnixStream::connect(socket_path)?;
        SyncClient::from_stream(stream)
    }

    pub(crate) fn from_stream(stream: UnixStream) -> io::Result<SyncClient> {
        let reader_stream = stream.try_clone()?;
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = std::sync::mpsc::sync_channel(MAILBOX_CAPACITY);
        {
            let closed = Arc::clone(&closed);
            thread::Builder::new()
                .name("cursor-sync-reader".to_string())
                .spawn(move || read_loop(reader_stream, tx, closed))?;
        }
        Ok(SyncClient {
            conn: Mutex::new(Conn {
                stream,
                last_sent: None,
            }),
            closed,
            cursor_rx: rx,
        })
    }

    /// Sends the selected node's source line, throttled: a send less than
    /// `MIN_SEND_INTERVAL` after the previous one is silently dropped.
    pub fn send_cursor(&self, line: usize) -> io::Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let now = Instant::now();
        if let Some(last) = conn.last_sent {
            if now.duration_since(last) < MIN_SEND_INTERVAL {
                return Ok(());
            }
        }
        let msg = SyncMessage {
            op: "cursor".to_string(),
            line: Some(line),
        };
        let mut data = serde_json::to_vec(&msg)?;
        data.push(b'\n');
        conn.stream.write_all(&data)?;
        conn.last_sent = Some(now);
        Ok(())
    }

    /// Next cursor line received from the peer, if any. Never blocks.
    pub fn try_recv_cursor(&self) -> Option<usize> {
        self.cursor_rx.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Marks the client closed, turns sends into no-ops and unblocks the
    /// reader thread's pending read.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::Relaxed) {
            return;
        }
        let conn = self.conn.lock();
        if let Err(err) = conn.stream.shutdown(Shutdown::Both) {
            debug!(?err, "cursor sync shutdown");
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.close();
    }
}

// Decodes newline-delimited messages for the lifetime of the connection.
// A line that fails to decode is skipped; ops other than "cursor" are
// ignored for forward compatibility.
fn read_loop(stream: UnixStream, tx: SyncSender<usize>, closed: Arc<AtomicBool>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        if closed.load(Ordering::Relaxed) {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(_) => return,
        };
        let msg: SyncMessage = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(_) => continue,
        };
        if msg.op == "cursor" {
            if let Some(n) = msg.line {
                // drop on full rather than block the reader
                let _ = tx.try_send(n);
            }
        }
    }
}
