use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::journal::mmap::MmapFile;
use crate::{Error, Result};

const META_MAGIC: u32 = 0x474c_4431; // "GLD1"
const META_VERSION: u32 = 1;
const META_LEN: usize = 64;

// Byte offsets into the control file. All fields are 8-byte aligned or
// smaller, and the mapping is page-aligned, so the atomic casts below are
// well-formed.
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_SEGMENT_SIZE: usize = 8;
const OFF_WRITE_OFFSET: usize = 16;

/// Per-journal control file shared between the writer and all readers.
///
/// Holds the committed write offset; the writer advances it with Release
/// ordering after a frame is fully in place, and readers load it with
/// Acquire ordering, which is what makes commit atomic from their side.
pub struct JournalMeta {
    mmap: MmapFile,
}

impl JournalMeta {
    /// Opens the control file, creating and initializing it if absent.
    /// The magic word is stamped last, so concurrent openers wait until the
    /// creator has finished.
    pub fn open_or_create(path: &Path, segment_size: u64) -> Result<Self> {
        match MmapFile::create_new(path, META_LEN) {
            Ok(mmap) => {
                let meta = Self { mmap };
                meta.atomic_u64(OFF_SEGMENT_SIZE).store(segment_size, Ordering::Relaxed);
                meta.atomic_u64(OFF_WRITE_OFFSET).store(0, Ordering::Relaxed);
                meta.atomic_u32(OFF_VERSION).store(META_VERSION, Ordering::Relaxed);
                meta.atomic_u32(OFF_MAGIC).store(META_MAGIC, Ordering::Release);
                Ok(meta)
            }
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let meta = Self {
                    mmap: MmapFile::open(path)?,
                };
                meta.wait_ready()?;
                Ok(meta)
            }
            Err(err) => Err(err),
        }
    }

    fn wait_ready(&self) -> Result<()> {
        if self.mmap.len() < META_LEN {
            return Err(Error::Corrupt("control file too small"));
        }
        let deadline = Instant::now() + Duration::from_secs(1);
        while self.atomic_u32(OFF_MAGIC).load(Ordering::Acquire) != META_MAGIC {
            if Instant::now() > deadline {
                return Err(Error::Corrupt("control file never became ready"));
            }
            std::thread::yield_now();
        }
        let version = self.atomic_u32(OFF_VERSION).load(Ordering::Acquire);
        if version != META_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(())
    }

    pub fn segment_size(&self) -> u64 {
        self.atomic_u64(OFF_SEGMENT_SIZE).load(Ordering::Acquire)
    }

    pub fn write_offset(&self) -> u64 {
        self.atomic_u64(OFF_WRITE_OFFSET).load(Ordering::Acquire)
    }

    pub fn set_write_offset(&self, offset: u64) {
        self.atomic_u64(OFF_WRITE_OFFSET).store(offset, Ordering::Release);
    }

    fn atomic_u32(&self, offset: usize) -> &AtomicU32 {
        unsafe { &*(self.mmap.as_slice().as_ptr().add(offset) as *const AtomicU32) }
    }

    fn atomic_u64(&self, offset: usize) -> &AtomicU64 {
        unsafe { &*(self.mmap.as_slice().as_ptr().add(offset) as *const AtomicU64) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_open_shares_offsets() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("journal.meta");

        let created = JournalMeta::open_or_create(&path, 1024).expect("create");
        created.set_write_offset(96);

        let opened = JournalMeta::open_or_create(&path, 4096).expect("open");
        assert_eq!(opened.segment_size(), 1024); // creator's size wins
        assert_eq!(opened.write_offset(), 96);

        created.set_write_offset(160);
        assert_eq!(opened.write_offset(), 160);
    }
}
