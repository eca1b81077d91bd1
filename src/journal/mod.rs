//! Append-only journal transport.
//!
//! One journal per [`Location`](crate::location::Location): a directory with
//! a control file, a fixed-size mmap'd data segment, and a writer lock.
//! Exactly one process writes a given journal; arbitrarily many readers
//! consume it concurrently, each with private cursor state. Commit is a
//! Release store of the shared write offset, so a reader never observes a
//! partial frame.

pub mod frame;
pub mod meta;
pub mod mmap;
pub mod reader;
pub mod writer;

pub use reader::{Reader, WaitStrategy};
pub use writer::{FrameGuard, JournalConfig, Writer};

use std::path::Path;

use crate::{Error, Result};

pub(crate) const SEGMENT_FILE: &str = "000000000.j";
pub(crate) const META_FILE: &str = "journal.meta";
pub(crate) const LOCK_FILE: &str = "writer.lock";

pub(crate) struct JournalFiles {
    pub meta: meta::JournalMeta,
    pub data: mmap::MmapFile,
}

/// Opens a journal directory, creating the segment and control file if this
/// is the first process to touch it. Readers call this too: a peer that has
/// never appeared is an empty journal, not an error.
pub(crate) fn open_or_create(dir: &Path, segment_size: usize) -> Result<JournalFiles> {
    std::fs::create_dir_all(dir)?;
    let segment_path = dir.join(SEGMENT_FILE);
    let meta_path = dir.join(META_FILE);

    if !meta_path.exists() {
        // Segment first, control file last: a visible control file implies
        // the segment exists and is fully sized.
        match mmap::MmapFile::create_new(&segment_path, segment_size) {
            Ok(_) => {}
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }

    let meta = meta::JournalMeta::open_or_create(&meta_path, segment_size as u64)?;
    let data = mmap::MmapFile::open(&segment_path)?;
    if data.len() as u64 != meta.segment_size() {
        return Err(Error::Corrupt("segment size does not match control file"));
    }
    Ok(JournalFiles { meta, data })
}
