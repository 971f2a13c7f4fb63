//! Full-store dump file
//!
//! ```text
//! dump := UTF "DStore", i16 major (1), i16 minor (0), i64 ts_millis,
//!         i32 base_count, base{base_count}
//! base := i16 base_id, i32 max_id, i32 object_count, object{object_count}
//! ```
//!
//! Objects use the same encoding as journal records. A dump is written to
//! a temporary sibling file, synced, then renamed over the previous dump,
//! so a crash mid-dump leaves the old dump intact.

use crate::codec::{read_utf, write_utf};
use crate::encoding::{read_object, write_object};
use crate::error::{JournalError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use dirstore_core::{BaseId, ObjectId, StoredObject};
use dirstore_storage::{BaseTable, NamespaceTable};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Magic string opening every dump file
pub const DUMP_MAGIC: &str = "DStore";
/// Dump format major version
pub const DUMP_MAJOR_VERSION: i16 = 1;
/// Dump format minor version
pub const DUMP_MINOR_VERSION: i16 = 0;

/// Contents of one base in a dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedBase {
    /// Base id
    pub base: BaseId,
    /// The base's `maxId` at dump time
    pub max_id: ObjectId,
    /// Live objects, sorted by id
    pub objects: Vec<StoredObject>,
}

/// A decoded dump file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpImage {
    /// When the dump was taken, in epoch milliseconds
    pub timestamp_millis: i64,
    /// One entry per base
    pub bases: Vec<DumpedBase>,
}

impl DumpImage {
    /// Total objects across all bases
    pub fn object_count(&self) -> usize {
        self.bases.iter().map(|b| b.objects.len()).sum()
    }
}

/// Write every base's live objects to `path`
///
/// The caller must hold a dump lock covering every base.
pub fn write_dump(path: &Path, bases: &BaseTable, timestamp_millis: i64) -> Result<usize> {
    let tmp = temp_path(path);
    let all = bases.all();
    let mut written = 0usize;
    {
        let file = File::create(&tmp)?;
        let mut w = BufWriter::new(file);
        write_utf(&mut w, DUMP_MAGIC)?;
        w.write_i16::<BigEndian>(DUMP_MAJOR_VERSION)?;
        w.write_i16::<BigEndian>(DUMP_MINOR_VERSION)?;
        w.write_i64::<BigEndian>(timestamp_millis)?;
        w.write_i32::<BigEndian>(all.len() as i32)?;

        for base in &all {
            let objects = base.objects();
            w.write_i16::<BigEndian>(base.type_id().0)?;
            w.write_i32::<BigEndian>(base.max_id().0)?;
            w.write_i32::<BigEndian>(objects.len() as i32)?;
            for object in &objects {
                write_object(&mut w, object)?;
            }
            debug!(base = base.type_id().0, objects = objects.len(), "Dumped base");
            written += objects.len();
        }

        let file = w.into_inner().map_err(|e| JournalError::Io(e.into_error()))?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), objects = written, "Store dumped");
    Ok(written)
}

/// Read a dump file
pub fn read_dump(path: &Path) -> Result<DumpImage> {
    let mut r = BufReader::new(File::open(path)?);
    read_dump_from(&mut r)
}

fn read_dump_from<R: Read>(r: &mut R) -> Result<DumpImage> {
    let magic = read_utf(r)?;
    if magic != DUMP_MAGIC {
        return Err(JournalError::BadMagic {
            expected: DUMP_MAGIC,
            found: magic,
        });
    }
    let major = r.read_i16::<BigEndian>()?;
    let minor = r.read_i16::<BigEndian>()?;
    if major != DUMP_MAJOR_VERSION {
        return Err(JournalError::VersionMismatch { major, minor });
    }
    let timestamp_millis = r.read_i64::<BigEndian>()?;
    let base_count = r.read_i32::<BigEndian>()?;

    let mut bases = Vec::new();
    for _ in 0..base_count.max(0) {
        let base = BaseId(r.read_i16::<BigEndian>()?);
        let max_id = ObjectId(r.read_i32::<BigEndian>()?);
        let count = r.read_i32::<BigEndian>()?;
        let objects = (0..count.max(0))
            .map(|_| read_object(r, base))
            .collect::<Result<Vec<_>>>()?;
        bases.push(DumpedBase {
            base,
            max_id,
            objects,
        });
    }
    Ok(DumpImage {
        timestamp_millis,
        bases,
    })
}

/// Load a dump into empty bases
///
/// # Errors
///
/// Any decoding problem is fatal: unlike the journal, a dump is only
/// ever replaced atomically, so a damaged dump is real corruption.
pub fn load_dump(path: &Path, bases: &BaseTable, namespaces: &NamespaceTable) -> Result<usize> {
    let image = read_dump(path)?;
    let mut loaded = 0;
    for dumped in image.bases {
        let base = bases
            .get(dumped.base)
            .ok_or(JournalError::UnknownBase(dumped.base))?;
        base.restore_max_id(dumped.max_id);
        for object in dumped.objects {
            base.install_with(namespaces, object);
            loaded += 1;
        }
    }
    info!(path = %path.display(), objects = loaded, "Dump loaded");
    Ok(loaded)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
