use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::journal::frame::{record_len, FrameHeader, FRAME_HEADER_SIZE, MAX_PAYLOAD_LEN};
use crate::journal::meta::JournalMeta;
use crate::journal::mmap::MmapFile;
use crate::journal::{open_or_create, LOCK_FILE};
use crate::layout::Locator;
use crate::location::Location;
use crate::{Error, Result};

pub const DEFAULT_SEGMENT_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct JournalConfig {
    pub segment_size: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

/// Single writer for one location's journal.
///
/// Exclusivity is enforced by a lock file in the journal directory; a second
/// `Writer::open` on the same location fails with `WriterAlreadyActive`.
/// Frames become visible to readers atomically when the shared write offset
/// advances.
pub struct Writer {
    location: Location,
    meta: JournalMeta,
    data: MmapFile,
    clock: Arc<dyn Clock>,
    _lock: WriterLock,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Writer {
    pub fn open(
        location: &Location,
        locator: &dyn Locator,
        clock: Arc<dyn Clock>,
        config: JournalConfig,
    ) -> Result<Self> {
        let dir = locator.resolve(location);
        std::fs::create_dir_all(&dir)?;
        let lock = WriterLock::acquire(&dir)?;
        let files = open_or_create(&dir, config.segment_size)?;
        log::debug!(
            "writer open {} ({:08x}) at offset {}",
            location.uname(),
            location.uid(),
            files.meta.write_offset()
        );
        Ok(Self {
            location: location.clone(),
            meta: files.meta,
            data: files.data,
            clock,
            _lock: lock,
        })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Opens a frame and hands out its payload buffer. The frame is not
    /// visible to any reader until [`FrameGuard::close`] commits it.
    ///
    /// A `trigger_time` of zero means "stamp with `gen_time`".
    pub fn open_frame(&mut self, type_id: u16, trigger_time: u64) -> Result<FrameGuard<'_>> {
        let source = self.location.uid();
        self.frame(source, type_id, trigger_time)
    }

    /// Relay variant of [`open_frame`](Self::open_frame): the frame keeps
    /// `source` instead of this writer's own uid, so a relayed event still
    /// names its originating location.
    pub fn open_frame_as(
        &mut self,
        source: u32,
        type_id: u16,
        trigger_time: u64,
    ) -> Result<FrameGuard<'_>> {
        self.frame(source, type_id, trigger_time)
    }

    fn frame(&mut self, source: u32, type_id: u16, trigger_time: u64) -> Result<FrameGuard<'_>> {
        let start = self.meta.write_offset() as usize;
        let end_of_segment = self.data.len();
        // A header-only frame at the exact end of the segment still fits.
        if start + FRAME_HEADER_SIZE > end_of_segment {
            return Err(Error::JournalFull);
        }
        let capacity = (end_of_segment - start - FRAME_HEADER_SIZE).min(MAX_PAYLOAD_LEN);
        Ok(FrameGuard {
            writer: self,
            start,
            capacity,
            source,
            type_id,
            trigger_time,
        })
    }

    /// Appends a complete payload. Returns the committed frame's `gen_time`.
    pub fn write(&mut self, type_id: u16, trigger_time: u64, payload: &[u8]) -> Result<u64> {
        let source = self.location.uid();
        self.append(source, type_id, trigger_time, payload)
    }

    /// Appends a payload on behalf of `source` (relay).
    pub fn write_as(
        &mut self,
        source: u32,
        type_id: u16,
        trigger_time: u64,
        payload: &[u8],
    ) -> Result<u64> {
        self.append(source, type_id, trigger_time, payload)
    }

    fn append(
        &mut self,
        source: u32,
        type_id: u16,
        trigger_time: u64,
        payload: &[u8],
    ) -> Result<u64> {
        let mut frame = self.frame(source, type_id, trigger_time)?;
        let buffer = frame.buffer();
        if payload.len() > buffer.len() {
            return if payload.len() > MAX_PAYLOAD_LEN {
                Err(Error::PayloadTooLarge)
            } else {
                Err(Error::JournalFull)
            };
        }
        buffer[..payload.len()].copy_from_slice(payload);
        frame.close(payload.len())
    }

    /// Appends a JSON-encoded payload. Returns the committed frame's `gen_time`.
    pub fn write_json<T: Serialize>(
        &mut self,
        type_id: u16,
        trigger_time: u64,
        value: &T,
    ) -> Result<u64> {
        let payload = serde_json::to_vec(value)?;
        self.write(type_id, trigger_time, &payload)
    }

    /// JSON relay variant of [`write_json`](Self::write_json).
    pub fn write_json_as<T: Serialize>(
        &mut self,
        source: u32,
        type_id: u16,
        trigger_time: u64,
        value: &T,
    ) -> Result<u64> {
        let payload = serde_json::to_vec(value)?;
        self.write_as(source, type_id, trigger_time, &payload)
    }
}

/// An open, uncommitted frame.
pub struct FrameGuard<'a> {
    writer: &'a mut Writer,
    start: usize,
    capacity: usize,
    source: u32,
    type_id: u16,
    trigger_time: u64,
}

impl FrameGuard<'_> {
    /// Mutable payload region. Bounds were validated by `open_frame`.
    pub fn buffer(&mut self) -> &mut [u8] {
        let payload_start = self.start + FRAME_HEADER_SIZE;
        &mut self.writer.data.as_mut_slice()[payload_start..payload_start + self.capacity]
    }

    /// Commits the first `payload_len` bytes of the buffer. Stamps
    /// `gen_time` from the writer's clock, checksums the payload, then
    /// publishes the new write offset with Release ordering.
    pub fn close(self, payload_len: usize) -> Result<u64> {
        if payload_len > self.capacity {
            return Err(Error::PayloadTooLarge);
        }
        let Self {
            writer,
            start,
            source,
            type_id,
            trigger_time,
            ..
        } = self;

        let payload_start = start + FRAME_HEADER_SIZE;
        let checksum = {
            let payload = writer.data.range(payload_start, payload_len)?;
            FrameHeader::crc32(payload)
        };
        let gen_time = writer.clock.now();
        let header = FrameHeader {
            length: payload_len as u32,
            type_id,
            _reserved: 0,
            source,
            checksum,
            gen_time,
            trigger_time: if trigger_time == 0 { gen_time } else { trigger_time },
        };
        writer
            .data
            .range_mut(start, FRAME_HEADER_SIZE)?
            .copy_from_slice(&header.to_bytes());

        fence(Ordering::Release);
        writer
            .meta
            .set_write_offset((start + record_len(payload_len)) as u64);
        Ok(gen_time)
    }
}

struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    // TODO: reclaim locks left behind by crashed writers.
    fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::WriterAlreadyActive(dir.to_path_buf()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
