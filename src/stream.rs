//! Declarative subscriptions over the merged event sequence.
//!
//! Protocol conditions are expressed as composed operators rather than
//! imperative state machines: filter by tag (`is`), filter by source
//! (`from`), gate on a first occurrence (`skip_until`), deliver exactly once
//! (`first`), and arm a liveness timeout. The engine is a push-based
//! pipeline: the owning event loop feeds it one event at a time and gets
//! back the tokens of every subscription that fired, in subscription order.
//!
//! Timeouts are the single concurrency boundary. Each armed timeout runs on
//! its own timing thread and may only invoke its callback; it never touches
//! the reader, registry, or writer, which belong exclusively to the event
//! loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::event::Event;
use crate::protocol::MsgType;

const TIMEOUT_TICK: Duration = Duration::from_millis(5);

/// Conjunction of per-event filters.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    type_id: Option<u16>,
    source: Option<u32>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only events with this message tag.
    pub fn is(mut self, msg_type: MsgType) -> Self {
        self.type_id = Some(msg_type.type_id());
        self
    }

    /// Keep only events from this source uid.
    pub fn from(mut self, uid: u32) -> Self {
        self.source = Some(uid);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(type_id) = self.type_id {
            if event.type_id() != type_id {
                return false;
            }
        }
        if let Some(source) = self.source {
            if event.source() != source {
                return false;
            }
        }
        true
    }
}

struct Gate {
    pattern: Pattern,
    open: bool,
}

struct Subscription<T> {
    pattern: Pattern,
    gate: Option<Gate>,
    once: bool,
    done: bool,
    token: T,
    // Shared with the timeout watcher; set on first delivery.
    delivered: Option<Arc<AtomicBool>>,
}

/// The set of live subscriptions owned by one event loop.
pub struct Subscriptions<T: Copy> {
    subs: Vec<Subscription<T>>,
}

impl<T: Copy> Default for Subscriptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Subscriptions<T> {
    pub fn new() -> Self {
        Self { subs: Vec::new() }
    }

    /// Begins a subscription matching `pattern`; finish with
    /// [`SubscriptionBuilder::token`].
    pub fn on(&mut self, pattern: Pattern) -> SubscriptionBuilder<'_, T> {
        SubscriptionBuilder {
            subs: &mut self.subs,
            pattern,
            gate: None,
            once: false,
            timeout: None,
        }
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Feeds one event through every live subscription and returns the
    /// tokens that fired.
    pub fn dispatch(&mut self, event: &Event) -> Vec<T> {
        let mut fired = Vec::new();
        for sub in &mut self.subs {
            if sub.done {
                continue;
            }
            if let Some(gate) = &mut sub.gate {
                if !gate.open {
                    if gate.pattern.matches(event) {
                        // The event that opens the gate is itself eligible
                        // downstream.
                        gate.open = true;
                    } else {
                        continue;
                    }
                }
            }
            if !sub.pattern.matches(event) {
                continue;
            }
            if let Some(flag) = &sub.delivered {
                flag.store(true, Ordering::Release);
            }
            if sub.once {
                sub.done = true;
            }
            fired.push(sub.token);
        }
        fired
    }
}

pub struct SubscriptionBuilder<'a, T: Copy> {
    subs: &'a mut Vec<Subscription<T>>,
    pattern: Pattern,
    gate: Option<Pattern>,
    once: bool,
    timeout: Option<TimeoutSpec>,
}

struct TimeoutSpec {
    after: Duration,
    on_timeout: Box<dyn FnOnce() + Send>,
}

impl<T: Copy> SubscriptionBuilder<'_, T> {
    /// Drop events until `pattern` first matches; from then on (that event
    /// included) pass everything to the downstream filters.
    pub fn skip_until(mut self, pattern: Pattern) -> Self {
        self.gate = Some(pattern);
        self
    }

    /// Deliver exactly one element, then end the subscription.
    pub fn first(mut self) -> Self {
        self.once = true;
        self
    }

    /// If nothing is delivered within `after` of subscribing, run
    /// `on_timeout` once on a background timer thread. The callback must not
    /// touch anything owned by the event loop; raising a stop signal is the
    /// intended use.
    pub fn timeout(mut self, after: Duration, on_timeout: impl FnOnce() + Send + 'static) -> Self {
        self.timeout = Some(TimeoutSpec {
            after,
            on_timeout: Box::new(on_timeout),
        });
        self
    }

    /// Registers the subscription under `token`, arming any timeout now.
    pub fn token(self, token: T) {
        let mut delivered = None;
        if let Some(spec) = self.timeout {
            let flag = Arc::new(AtomicBool::new(false));
            spawn_timeout_watch(spec, Arc::clone(&flag));
            delivered = Some(flag);
        }
        self.subs.push(Subscription {
            pattern: self.pattern,
            gate: self.gate.map(|pattern| Gate {
                pattern,
                open: false,
            }),
            once: self.once,
            done: false,
            token,
            delivered,
        });
    }
}

fn spawn_timeout_watch(spec: TimeoutSpec, delivered: Arc<AtomicBool>) {
    let deadline = Instant::now() + spec.after;
    let mut on_timeout = Some(spec.on_timeout);
    std::thread::spawn(move || loop {
        if delivered.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            if let Some(callback) = on_timeout.take() {
                callback();
            }
            return;
        }
        std::thread::sleep((deadline - now).min(TIMEOUT_TICK));
    });
}
