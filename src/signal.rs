use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide stop token.
///
/// Cloned freely and threaded through the event loop; checked at each
/// dispatch boundary. Signalling is idempotent and never blocks, so it is
/// safe to raise from timer threads and signal handlers alike.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            log::debug!("stop signalled");
        }
    }

    pub fn is_signalled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_idempotent() {
        let stop = StopSignal::new();
        assert!(!stop.is_signalled());
        stop.signal();
        assert!(stop.is_signalled());
        stop.signal();
        assert!(stop.is_signalled());
    }

    #[test]
    fn clones_share_state() {
        let stop = StopSignal::new();
        let other = stop.clone();
        other.signal();
        assert!(stop.is_signalled());
    }
}
