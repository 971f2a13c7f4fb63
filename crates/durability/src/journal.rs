//! Write-ahead journal
//!
//! The journal is an append-only file recording every committed
//! transaction since the last full dump.
//!
//! ## File Format
//!
//! ```text
//! header := UTF "GJournal", i16 major (0), i16 minor (1), i64 created_millis
//! frame  := UTF "open", i64 ts, i32 count, record{count}, UTF "close", i64 ts
//! record := u8 op, i16 base, body
//! body   := object                 (op = CREATE 1 | EDIT 2)
//!         | i32 object_id          (op = DELETE 3)
//! ```
//!
//! A frame whose close marker is missing, whose closing timestamp differs
//! from its opening one, or which cannot be parsed at all is treated as a
//! crash-interrupted write: it and everything after it are discarded, and
//! the file is truncated back to the end of the last good frame.
//!
//! ## Concurrency
//!
//! Frames are encoded in full before the journal mutex is taken, then
//! appended with one write. The mutex makes `write_transaction` and
//! `reset` atomic with respect to each other.

use crate::codec::{expect_utf, read_utf, write_utf};
use crate::encoding::{read_object, write_object};
use crate::error::{JournalError, Result};
use crate::mode::DurabilityMode;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::Utc;
use dirstore_core::{BaseId, Invid, ObjectId, StoredObject};
use dirstore_storage::{BaseTable, NamespaceTable, ObjectBase};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Magic string opening every journal file
pub const JOURNAL_MAGIC: &str = "GJournal";
/// Journal format major version
pub const MAJOR_VERSION: i16 = 0;
/// Journal format minor version
pub const MINOR_VERSION: i16 = 1;

const OPEN_MARKER: &str = "open";
const CLOSE_MARKER: &str = "close";

// ============================================================================
// Records
// ============================================================================

/// Operation tag of a journal record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JournalOp {
    /// Object created
    Create = 1,
    /// Object replaced
    Edit = 2,
    /// Object deleted
    Delete = 3,
}

impl JournalOp {
    /// Decode an operation byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(JournalOp::Create),
            2 => Some(JournalOp::Edit),
            3 => Some(JournalOp::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for JournalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalOp::Create => write!(f, "CREATE"),
            JournalOp::Edit => write!(f, "EDIT"),
            JournalOp::Delete => write!(f, "DELETE"),
        }
    }
}

/// A record decoded from the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Object created
    Create(StoredObject),
    /// Object replaced
    Edit(StoredObject),
    /// Object deleted
    Delete(Invid),
}

impl JournalRecord {
    /// Operation tag
    pub fn op(&self) -> JournalOp {
        match self {
            JournalRecord::Create(_) => JournalOp::Create,
            JournalRecord::Edit(_) => JournalOp::Edit,
            JournalRecord::Delete(_) => JournalOp::Delete,
        }
    }

    /// Object the record applies to
    pub fn invid(&self) -> Invid {
        match self {
            JournalRecord::Create(o) | JournalRecord::Edit(o) => o.invid(),
            JournalRecord::Delete(invid) => *invid,
        }
    }

    /// Borrowed form, as accepted by [`Journal::write_transaction`]
    pub fn as_ref(&self) -> RecordRef<'_> {
        match self {
            JournalRecord::Create(o) => RecordRef::Create(o),
            JournalRecord::Edit(o) => RecordRef::Edit(o),
            JournalRecord::Delete(invid) => RecordRef::Delete(*invid),
        }
    }
}

/// A record to be written, borrowing the object
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    /// Object created
    Create(&'a StoredObject),
    /// Object replaced
    Edit(&'a StoredObject),
    /// Object deleted
    Delete(Invid),
}

impl RecordRef<'_> {
    fn op(&self) -> JournalOp {
        match self {
            RecordRef::Create(_) => JournalOp::Create,
            RecordRef::Edit(_) => JournalOp::Edit,
            RecordRef::Delete(_) => JournalOp::Delete,
        }
    }

    fn invid(&self) -> Invid {
        match self {
            RecordRef::Create(o) | RecordRef::Edit(o) => o.invid(),
            RecordRef::Delete(invid) => *invid,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Journal file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    /// Format major version
    pub major: i16,
    /// Format minor version
    pub minor: i16,
    /// When the journal was started, in epoch milliseconds
    pub created_millis: i64,
}

/// A decoded transaction frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalFrame {
    /// Byte offset of the frame in the file
    pub offset: u64,
    /// Transaction timestamp in epoch milliseconds
    pub timestamp_millis: i64,
    /// Records in write order
    pub records: Vec<JournalRecord>,
}

/// Result of reading a journal file without applying it
#[derive(Debug, Clone)]
pub struct JournalScan {
    /// File header
    pub header: JournalHeader,
    /// Well-formed frames, in file order
    pub frames: Vec<JournalFrame>,
    /// Length of the header plus all well-formed frames
    pub valid_len: u64,
    /// Total file length
    pub file_len: u64,
}

impl JournalScan {
    /// Whether bytes after the last well-formed frame were found
    pub fn discarded_tail(&self) -> bool {
        self.valid_len < self.file_len
    }

    /// Number of bytes that will be discarded
    pub fn discarded_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }

    /// Total records across all frames
    pub fn record_count(&self) -> usize {
        self.frames.iter().map(|f| f.records.len()).sum()
    }
}

/// Encode a journal header
pub fn encode_header(created_millis: i64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(32);
    write_utf(&mut buf, JOURNAL_MAGIC)?;
    buf.write_i16::<BigEndian>(MAJOR_VERSION)?;
    buf.write_i16::<BigEndian>(MINOR_VERSION)?;
    buf.write_i64::<BigEndian>(created_millis)?;
    Ok(buf)
}

/// Encode one transaction frame
pub fn encode_frame(timestamp_millis: i64, records: &[RecordRef<'_>]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64 + records.len() * 64);
    write_utf(&mut buf, OPEN_MARKER)?;
    buf.write_i64::<BigEndian>(timestamp_millis)?;
    let count = i32::try_from(records.len())
        .map_err(|_| JournalError::Corrupt("too many records in one frame".to_string()))?;
    buf.write_i32::<BigEndian>(count)?;

    for record in records {
        buf.write_u8(record.op() as u8)?;
        buf.write_i16::<BigEndian>(record.invid().base().0)?;
        match record {
            RecordRef::Create(object) | RecordRef::Edit(object) => write_object(&mut buf, object)?,
            RecordRef::Delete(invid) => buf.write_i32::<BigEndian>(invid.id().0)?,
        }
    }

    write_utf(&mut buf, CLOSE_MARKER)?;
    buf.write_i64::<BigEndian>(timestamp_millis)?;
    Ok(buf)
}

fn read_header(cursor: &mut Cursor<&[u8]>) -> Result<JournalHeader> {
    let magic = read_utf(cursor)?;
    if magic != JOURNAL_MAGIC {
        return Err(JournalError::BadMagic {
            expected: JOURNAL_MAGIC,
            found: magic,
        });
    }
    let major = cursor.read_i16::<BigEndian>()?;
    let minor = cursor.read_i16::<BigEndian>()?;
    if major != MAJOR_VERSION || minor > MINOR_VERSION {
        return Err(JournalError::VersionMismatch { major, minor });
    }
    let created_millis = cursor.read_i64::<BigEndian>()?;
    Ok(JournalHeader {
        major,
        minor,
        created_millis,
    })
}

fn read_frame(cursor: &mut Cursor<&[u8]>) -> Result<JournalFrame> {
    let offset = cursor.position();
    expect_utf(cursor, OPEN_MARKER)?;
    let timestamp_millis = cursor.read_i64::<BigEndian>()?;
    let count = cursor.read_i32::<BigEndian>()?;
    if count < 0 {
        return Err(JournalError::Corrupt(format!(
            "negative record count {}",
            count
        )));
    }

    let mut records = Vec::new();
    for _ in 0..count {
        let op_byte = cursor.read_u8()?;
        let base = BaseId(cursor.read_i16::<BigEndian>()?);
        let record = match JournalOp::from_u8(op_byte) {
            Some(JournalOp::Create) => JournalRecord::Create(read_object(cursor, base)?),
            Some(JournalOp::Edit) => JournalRecord::Edit(read_object(cursor, base)?),
            Some(JournalOp::Delete) => {
                let id = ObjectId(cursor.read_i32::<BigEndian>()?);
                JournalRecord::Delete(Invid::new(base, id))
            }
            None => {
                return Err(JournalError::Corrupt(format!(
                    "unknown operation {}",
                    op_byte
                )))
            }
        };
        records.push(record);
    }

    expect_utf(cursor, CLOSE_MARKER)?;
    let closing = cursor.read_i64::<BigEndian>()?;
    if closing != timestamp_millis {
        return Err(JournalError::Corrupt(format!(
            "frame timestamps disagree: open {} close {}",
            timestamp_millis, closing
        )));
    }

    Ok(JournalFrame {
        offset,
        timestamp_millis,
        records,
    })
}

/// Parse a journal image
///
/// # Errors
///
/// Header problems are fatal. A frame that fails to parse ends the scan
/// cleanly; see [`JournalScan::discarded_tail`].
pub fn scan_bytes(bytes: &[u8]) -> Result<JournalScan> {
    let mut cursor = Cursor::new(bytes);
    let header = read_header(&mut cursor)?;
    let mut valid_len = cursor.position();
    let mut frames = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        match read_frame(&mut cursor) {
            Ok(frame) => {
                valid_len = cursor.position();
                frames.push(frame);
            }
            Err(e) => {
                warn!(
                    offset = valid_len,
                    error = %e,
                    "Discarding incomplete journal frame and everything after it"
                );
                break;
            }
        }
    }

    Ok(JournalScan {
        header,
        frames,
        valid_len,
        file_len: bytes.len() as u64,
    })
}

/// Read and parse a journal file
pub fn scan_file(path: &Path) -> Result<JournalScan> {
    let bytes = fs::read(path)?;
    scan_bytes(&bytes)
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination of encoded frames
///
/// The file-backed [`FileSink`] is the only production implementation;
/// the trait exists so a store can be pointed at an alternative sink.
///
/// A frame whose append or sync fails is cut off again with
/// [`truncate`](JournalSink::truncate), so a sink must be able to shrink
/// back to any length it reported from [`position`](JournalSink::position).
pub trait JournalSink: Send + std::fmt::Debug {
    /// Current length in bytes
    fn position(&mut self) -> std::io::Result<u64>;

    /// Append one complete frame
    fn append(&mut self, frame: &[u8]) -> std::io::Result<()>;

    /// Force appended frames to stable storage
    fn sync(&mut self) -> std::io::Result<()>;

    /// Drop everything past `len` bytes
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

/// Append-only journal file
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Open `path` for appending
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self { file })
    }
}

impl JournalSink for FileSink {
    fn position(&mut self) -> std::io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn append(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_data()
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.file.set_len(len)?;
        self.file.sync_data()
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Outcome of replaying a journal into the live tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Frames applied
    pub frames_applied: usize,
    /// Records applied
    pub records_applied: usize,
    /// Whether a trailing partial frame was discarded
    pub discarded_tail: bool,
    /// Bytes truncated from the end of the file
    pub discarded_bytes: u64,
}

#[derive(Debug)]
struct JournalInner {
    sink: Box<dyn JournalSink>,
    frames_since_reset: u64,
    /// Set when a failed frame could not be cut off again
    poisoned: bool,
}

/// The store's write-ahead journal
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    mode: DurabilityMode,
    inner: Mutex<JournalInner>,
}

impl Journal {
    /// Open the journal at `path`, creating it with a fresh header if it
    /// does not exist or is empty
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let empty = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if empty {
            write_fresh(&path)?;
            info!(path = %path.display(), "Created journal");
        }

        let sink = FileSink::open(&path)?;
        Ok(Self {
            path,
            mode,
            inner: Mutex::new(JournalInner {
                sink: Box::new(sink),
                frames_since_reset: 0,
                poisoned: false,
            }),
        })
    }

    /// Journal file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode frames are written with
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }

    /// Whether frames have been written or replayed since the last reset
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().frames_since_reset > 0
    }

    /// Whether a failed frame may still be in the file
    ///
    /// A poisoned journal refuses every write until the next
    /// [`reset`](Journal::reset).
    pub fn is_poisoned(&self) -> bool {
        self.inner.lock().poisoned
    }

    /// Replace the sink frames are appended to, returning the old one
    pub fn swap_sink(&self, sink: Box<dyn JournalSink>) -> Box<dyn JournalSink> {
        std::mem::replace(&mut self.inner.lock().sink, sink)
    }

    /// Replay the journal into the live tables
    ///
    /// Each frame is fully decoded and its bases resolved before any of its
    /// records is applied. A trailing partial frame is truncated away.
    ///
    /// # Errors
    ///
    /// Bad header, unknown base, or I/O failure. These are fatal to
    /// startup; a truncated final frame is not an error.
    pub fn load(&self, bases: &BaseTable, namespaces: &NamespaceTable) -> Result<LoadSummary> {
        let mut inner = self.inner.lock();
        let scan = scan_file(&self.path)?;
        let mut summary = LoadSummary::default();

        for frame in &scan.frames {
            let targets = frame
                .records
                .iter()
                .map(|r| {
                    let base = r.invid().base();
                    bases.get(base).ok_or(JournalError::UnknownBase(base))
                })
                .collect::<Result<Vec<Arc<ObjectBase>>>>()?;

            for (record, base) in frame.records.iter().zip(targets) {
                match record {
                    JournalRecord::Create(object) | JournalRecord::Edit(object) => {
                        base.install_with(namespaces, object.clone());
                    }
                    JournalRecord::Delete(invid) => {
                        base.remove_with(namespaces, invid.id());
                    }
                }
            }
            summary.frames_applied += 1;
            summary.records_applied += frame.records.len();
        }

        if scan.discarded_tail() {
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
            summary.discarded_tail = true;
            summary.discarded_bytes = scan.discarded_bytes();
            warn!(
                path = %self.path.display(),
                bytes = summary.discarded_bytes,
                "Truncated partial journal frame"
            );
        }

        inner.frames_since_reset += summary.frames_applied as u64;
        info!(
            frames = summary.frames_applied,
            records = summary.records_applied,
            "Journal replayed"
        );
        Ok(summary)
    }

    /// Append one transaction frame
    ///
    /// Must be called while holding a write lock on every base touched by
    /// `records`. On error nothing is committed: the sink is cut back to
    /// its length before the append, and if that fails too the journal is
    /// poisoned.
    pub fn write_transaction(&self, timestamp_millis: i64, records: &[RecordRef<'_>]) -> Result<()> {
        let frame = encode_frame(timestamp_millis, records)?;
        let mut inner = self.inner.lock();
        if inner.poisoned {
            return Err(JournalError::Poisoned);
        }

        let before = inner.sink.position()?;
        let mut written = inner.sink.append(&frame);
        if written.is_ok() && self.mode.requires_immediate_fsync() {
            written = inner.sink.sync();
        }
        if let Err(e) = written {
            if let Err(trunc) = inner.sink.truncate(before) {
                error!(
                    error = %trunc,
                    len = before,
                    "Failed to remove unwritten journal frame; refusing further commits"
                );
                inner.poisoned = true;
            }
            return Err(e.into());
        }
        inner.frames_since_reset += 1;
        debug!(
            txn_ts = timestamp_millis,
            records = records.len(),
            bytes = frame.len(),
            "Journal frame written"
        );
        Ok(())
    }

    /// Move the current journal aside and start an empty one
    ///
    /// Called after a full dump, before the dump's locks are released.
    /// Returns the path the old journal was renamed to. The fresh file is
    /// written beside the journal first, so on error the journal at
    /// `path` is still the one frames are appended to.
    pub fn reset(&self) -> Result<PathBuf> {
        let mut inner = self.inner.lock();
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "journal".to_string());
        let fresh = self.path.with_file_name(format!("{}.new", file_name));
        let aside = aside_path(&self.path, &file_name);

        let staged = write_fresh(&fresh)
            .and_then(|()| fs::rename(&self.path, &aside).map_err(JournalError::from));
        if let Err(e) = staged {
            let _ = fs::remove_file(&fresh);
            return Err(e);
        }
        let sink = fs::rename(&fresh, &self.path).and_then(|()| FileSink::open(&self.path));
        let sink = match sink {
            Ok(sink) => sink,
            Err(e) => {
                // The old sink still points at the renamed file
                if let Err(restore) = fs::rename(&aside, &self.path) {
                    error!(
                        error = %restore,
                        aside = %aside.display(),
                        "Failed to restore journal after reset; refusing further commits"
                    );
                    inner.poisoned = true;
                }
                let _ = fs::remove_file(&fresh);
                return Err(e.into());
            }
        };

        inner.sink = Box::new(sink);
        inner.frames_since_reset = 0;
        inner.poisoned = false;
        info!(old = %aside.display(), "Journal reset");
        Ok(aside)
    }
}

/// `<name>.<stamp>`, with a counter appended if that name is taken
fn aside_path(path: &Path, file_name: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S%.3f").to_string();
    let mut aside = path.with_file_name(format!("{}.{}", file_name, stamp));
    let mut n = 1u32;
    while aside.exists() {
        aside = path.with_file_name(format!("{}.{}.{}", file_name, stamp, n));
        n += 1;
    }
    aside
}

fn write_fresh(path: &Path) -> Result<()> {
    let header = encode_header(Utc::now().timestamp_millis())?;
    let mut file = File::create(path)?;
    file.write_all(&header)?;
    file.sync_all()?;
    Ok(())
}
