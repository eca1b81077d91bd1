use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::event::Event;
use crate::journal::frame::{record_len, FrameHeader, FRAME_HEADER_SIZE};
use crate::journal::meta::JournalMeta;
use crate::journal::mmap::MmapFile;
use crate::journal::open_or_create;
use crate::layout::Locator;
use crate::location::{uid_str, Location};
use crate::signal::StopSignal;
use crate::journal::writer::DEFAULT_SEGMENT_SIZE;
use crate::{Error, Result};

const SPINS_PER_US: u32 = 50;
const PARK_INTERVAL: Duration = Duration::from_micros(200);
const DEFAULT_SPIN_US: u32 = 10;

/// How a reader waits when it has consumed every committed frame.
#[derive(Debug, Clone, Copy)]
pub enum WaitStrategy {
    /// True busy-spinning. Burns a core for minimum wake latency.
    BusySpin,
    /// Spins for `spin_us`, then parks in short kernel sleeps.
    SpinThenPark { spin_us: u32 },
    /// Low-priority periodic polling.
    Sleep(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::SpinThenPark {
            spin_us: DEFAULT_SPIN_US,
        }
    }
}

/// Merging reader over any number of joined journals.
///
/// Each joined location gets a private cursor; `next` interleaves committed
/// frames across cursors in non-decreasing `gen_time` order, breaking ties
/// by join order. Cursor state lives entirely in this process: nothing is
/// persisted and no cross-process locking is needed.
pub struct Reader {
    locator: Arc<dyn Locator>,
    cursors: Vec<Cursor>,
    wait: WaitStrategy,
}

struct Cursor {
    location: Location,
    meta: JournalMeta,
    data: MmapFile,
    offset: usize,
    from_time: u64,
    pending: Option<Event>,
}

impl Reader {
    pub fn new(locator: Arc<dyn Locator>) -> Self {
        Self {
            locator,
            cursors: Vec::new(),
            wait: WaitStrategy::default(),
        }
    }

    pub fn set_wait_strategy(&mut self, wait: WaitStrategy) {
        self.wait = wait;
    }

    pub fn is_joined(&self, uid: u32) -> bool {
        self.cursors.iter().any(|cursor| cursor.location.uid() == uid)
    }

    /// Starts consuming `location`'s journal from `from_time` onward.
    ///
    /// Additive: the new cursor interleaves with every previously joined
    /// location. Frames with `gen_time < from_time` are skipped; the journal
    /// is created empty if the peer has not appeared yet. Joining a location
    /// twice is a no-op.
    pub fn join(&mut self, location: &Location, requesting_uid: u32, from_time: u64) -> Result<()> {
        if self.is_joined(location.uid()) {
            log::debug!("already joined {}", location.uname());
            return Ok(());
        }
        let dir = self.locator.resolve(location);
        let files = open_or_create(&dir, DEFAULT_SEGMENT_SIZE)?;
        log::debug!(
            "reader {} joins {} from {}",
            uid_str(requesting_uid),
            location.uname(),
            from_time
        );
        self.cursors.push(Cursor {
            location: location.clone(),
            meta: files.meta,
            data: files.data,
            offset: 0,
            from_time,
            pending: None,
        });
        Ok(())
    }

    /// Returns the next merged event, or `None` when every cursor is at the
    /// committed end of its journal.
    pub fn next(&mut self) -> Result<Option<Event>> {
        for cursor in &mut self.cursors {
            if cursor.pending.is_none() {
                cursor.fill()?;
            }
        }

        let mut best: Option<(usize, u64)> = None;
        for (index, cursor) in self.cursors.iter().enumerate() {
            let Some(event) = cursor.pending.as_ref() else {
                continue;
            };
            match best {
                None => best = Some((index, event.gen_time())),
                Some((_, best_time)) if event.gen_time() < best_time => {
                    best = Some((index, event.gen_time()));
                }
                Some(_) => {}
            }
        }

        match best {
            Some((index, _)) => Ok(self.cursors[index].pending.take()),
            None => Ok(None),
        }
    }

    /// Blocking variant of [`next`](Self::next): suspends past the committed
    /// end of all joined journals until a frame is appended or the stop
    /// signal is observed, in which case it returns `None`. Exhaustion is a
    /// suspension, never an error.
    pub fn next_blocking(&mut self, stop: &StopSignal) -> Result<Option<Event>> {
        let mut spins: u32 = 0;
        loop {
            if stop.is_signalled() {
                return Ok(None);
            }
            if let Some(event) = self.next()? {
                return Ok(Some(event));
            }
            match self.wait {
                WaitStrategy::BusySpin => std::hint::spin_loop(),
                WaitStrategy::SpinThenPark { spin_us } => {
                    if spins < spin_us.saturating_mul(SPINS_PER_US) {
                        spins += 1;
                        std::hint::spin_loop();
                    } else {
                        std::thread::sleep(PARK_INTERVAL);
                    }
                }
                WaitStrategy::Sleep(interval) => std::thread::sleep(interval),
            }
        }
    }
}

impl Cursor {
    /// Advances past skipped frames and parks the next deliverable event in
    /// `pending`. Loading the committed offset with Acquire ordering pairs
    /// with the writer's Release publish, so only whole frames are visible.
    fn fill(&mut self) -> Result<()> {
        loop {
            let committed = self.meta.write_offset() as usize;
            if self.offset + FRAME_HEADER_SIZE > committed {
                return Ok(());
            }
            fence(Ordering::Acquire);

            let mut header_buf = [0u8; FRAME_HEADER_SIZE];
            header_buf.copy_from_slice(self.data.range(self.offset, FRAME_HEADER_SIZE)?);
            let header = FrameHeader::from_bytes(&header_buf);

            let len = header.length as usize;
            if self.offset + record_len(len) > committed {
                return Err(Error::Corrupt("frame extends past committed offset"));
            }
            let payload = self.data.range(self.offset + FRAME_HEADER_SIZE, len)?;
            header.validate(payload)?;

            self.offset += record_len(len);
            if header.gen_time < self.from_time {
                continue;
            }
            self.pending = Some(Event::from_frame(&header, payload.to_vec()));
            return Ok(());
        }
    }
}
