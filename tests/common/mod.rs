use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use guild::{Clock, DirectoryLocator, JournalConfig, Locator};

pub const TEST_SEGMENT_SIZE: usize = 256 * 1024;

/// Clock whose time only moves when the test says so, making every
/// `gen_time` in a scenario exact.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ns: AtomicU64,
}

impl ManualClock {
    pub fn at(now_ns: u64) -> Arc<Self> {
        let clock = Self::default();
        clock.set(now_ns);
        Arc::new(clock)
    }

    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_locator(root: &std::path::Path) -> Arc<dyn Locator> {
    Arc::new(DirectoryLocator::new(root))
}

pub fn small_journal() -> JournalConfig {
    JournalConfig {
        segment_size: TEST_SEGMENT_SIZE,
    }
}
