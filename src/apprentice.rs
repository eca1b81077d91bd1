//! Per-process runtime: registration handshake and reaction loop.
//!
//! An apprentice announces itself to the supervisor at construction, waits
//! for its Register event to come back over the supervisor's journal, joins
//! the supervisor's stream from that exact moment, and from then on learns
//! every peer from relayed Register events. A single `RequestStart` hands
//! control to the embedded [`Service`] exactly once.
//!
//! All protocol logic runs on one event-processing context; handshake
//! transitions and registry mutation never race. The registration timeout is
//! the only other thread, and it is limited to raising the stop signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, TscClock};
use crate::event::Event;
use crate::journal::{JournalConfig, Reader, WaitStrategy, Writer};
use crate::layout::Locator;
use crate::location::{uid_str, Category, Location};
use crate::protocol::{MsgType, RegisterPayload, RequestSubscribePayload};
use crate::registry::LocationRegistry;
use crate::signal::StopSignal;
use crate::stream::{Pattern, Subscriptions};
use crate::{Error, Result};

/// Well-known supervisor identity fields (`system/master/...`).
pub const MASTER_GROUP: &str = "master";
pub const MASTER_NAME: &str = "master";
/// Group of the shared configuration location (`system/etc/<application>`).
pub const CONFIG_GROUP: &str = "etc";

pub const DEFAULT_REGISTER_TIMEOUT: Duration = Duration::from_secs(1);

/// Handshake states. `Stopped` is terminal and reachable from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    AwaitingAck,
    Joined,
    Running,
    Stopped,
}

/// Token dispatched by the reaction loop when a subscription fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// The supervisor echoed our own Register event.
    Ack,
    /// Any Register event: continuous peer discovery.
    PeerRegister,
    /// First RequestStart.
    Start,
    /// Service-installed subscription, identified by its tag.
    Custom(u32),
}

/// Extension point for gateway and strategy specializations.
///
/// One implementation per process kind, selected at construction. The
/// runtime calls `start` exactly once, on the first RequestStart observed.
pub trait Service {
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<()>;

    /// Install additional subscriptions before the reaction loop begins;
    /// they fire back into [`Service::on_event`] with the chosen tag.
    fn subscriptions(&self, _subs: &mut Subscriptions<Reaction>) {}

    fn on_event(&mut self, _tag: u32, _event: &Event, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }
}

/// Runtime surface handed to a [`Service`] inside the reaction loop.
pub struct Context<'a> {
    home: &'a Location,
    registry: &'a LocationRegistry,
    writer: &'a mut Writer,
    clock: &'a dyn Clock,
}

impl Context<'_> {
    pub fn home(&self) -> &Location {
        self.home
    }

    pub fn registry(&self) -> &LocationRegistry {
        self.registry
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Publishes a domain frame on the home journal.
    pub fn publish(&mut self, type_id: u16, trigger_time: u64, payload: &[u8]) -> Result<u64> {
        self.writer.write(type_id, trigger_time, payload)
    }

    /// Asks the supervisor to relay `location`'s stream from now on.
    pub fn observe(&mut self, location: &Location) -> Result<()> {
        publish_subscribe_request(self.writer, self.clock.now(), location.uid())
    }
}

#[derive(Debug, Clone)]
pub struct ApprenticeConfig {
    pub journal: JournalConfig,
    pub wait: WaitStrategy,
    pub register_timeout: Duration,
    /// Name of the shared configuration location.
    pub application: String,
}

impl Default for ApprenticeConfig {
    fn default() -> Self {
        Self {
            journal: JournalConfig::default(),
            wait: WaitStrategy::default(),
            register_timeout: DEFAULT_REGISTER_TIMEOUT,
            application: "guild".to_string(),
        }
    }
}

pub struct Apprentice {
    home: Location,
    clock: Arc<dyn Clock>,
    writer: Writer,
    reader: Reader,
    registry: LocationRegistry,
    stop: StopSignal,
    state: State,
    /// Supervisor channel dedicated to this apprentice; carries the Register
    /// echo and targeted commands. Joined at construction from this run's
    /// Register time, so echoes left by a previous incarnation are skipped.
    master_channel: Location,
    /// Supervisor's public journal; carries every relayed Register. Joined
    /// from the echo's `gen_time`.
    master_journal: Location,
    config_location: Location,
    register_timeout: Duration,
    timeout_fired: Arc<AtomicBool>,
}

impl Apprentice {
    pub fn new(home: Location, locator: Arc<dyn Locator>) -> Result<Self> {
        Self::with_config(
            home,
            locator,
            Arc::new(TscClock::new()),
            ApprenticeConfig::default(),
        )
    }

    /// Builds the runtime and publishes the Register request. This is the
    /// `Init -> AwaitingAck` transition; the handshake completes inside
    /// [`run`](Self::run).
    pub fn with_config(
        home: Location,
        locator: Arc<dyn Locator>,
        clock: Arc<dyn Clock>,
        config: ApprenticeConfig,
    ) -> Result<Self> {
        let mode = home.mode();
        let master_channel =
            Location::new(mode, Category::System, MASTER_GROUP, &uid_str(home.uid()))?;
        let master_journal = Location::new(mode, Category::System, MASTER_GROUP, MASTER_NAME)?;
        let config_location =
            Location::new(mode, Category::System, CONFIG_GROUP, &config.application)?;

        let mut registry = LocationRegistry::new();
        registry.register(home.clone())?;
        registry.register(master_channel.clone())?;
        registry.register(master_journal.clone())?;

        let mut writer = Writer::open(&home, locator.as_ref(), Arc::clone(&clock), config.journal)?;

        let payload = RegisterPayload::from_location(&home);
        // trigger_time zero stamps the frame with trigger_time == gen_time.
        let register_time = writer.write_json(MsgType::Register.type_id(), 0, &payload)?;

        // Journals persist across restarts, so the channel may still hold a
        // previous incarnation's echo. Joining from this run's Register time
        // keeps stale echoes out of the ack condition: a genuine echo is
        // always relayed at or after it.
        let mut reader = Reader::new(locator);
        reader.set_wait_strategy(config.wait);
        reader.join(&master_channel, home.uid(), register_time)?;
        log::debug!(
            "apprentice {} ({:08x}) published register, awaiting ack on {}",
            home.uname(),
            home.uid(),
            master_channel.uname()
        );

        Ok(Self {
            home,
            clock,
            writer,
            reader,
            registry,
            stop: StopSignal::new(),
            state: State::AwaitingAck,
            master_channel,
            master_journal,
            config_location,
            register_timeout: config.register_timeout,
            timeout_fired: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn home(&self) -> &Location {
        &self.home
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn registry(&self) -> &LocationRegistry {
        &self.registry
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn master_channel_location(&self) -> &Location {
        &self.master_channel
    }

    pub fn master_journal_location(&self) -> &Location {
        &self.master_journal
    }

    /// Shared configuration location. Resolved, never auto-subscribed.
    pub fn config_location(&self) -> &Location {
        &self.config_location
    }

    /// Inserts a location into the local registry. Idempotent for identical
    /// fields.
    pub fn register_location(&mut self, location: Location) -> Result<bool> {
        self.registry.register(location)
    }

    /// Publishes a RequestSubscribe for `location`, asking the supervisor to
    /// relay its stream from now on. Fire-and-forget; meant for use once the
    /// handshake has completed.
    pub fn observe(&mut self, location: &Location) -> Result<()> {
        publish_subscribe_request(&mut self.writer, self.clock.now(), location.uid())
    }

    /// Runs the reaction loop until the stop signal is observed. One-shot:
    /// the handshake subscriptions assume a fresh construction.
    ///
    /// Returns `Error::RegisterTimeout` if the supervisor never echoed our
    /// Register within the configured window.
    pub fn run(&mut self, service: &mut dyn Service) -> Result<()> {
        let mut subs: Subscriptions<Reaction> = Subscriptions::new();
        self.install_protocol_subscriptions(&mut subs);
        service.subscriptions(&mut subs);

        let result = self.event_loop(service, &mut subs);
        self.set_state(State::Stopped);
        result?;
        if self.timeout_fired.load(Ordering::Acquire) {
            return Err(Error::RegisterTimeout);
        }
        Ok(())
    }

    fn install_protocol_subscriptions(&mut self, subs: &mut Subscriptions<Reaction>) {
        let self_register = Pattern::new()
            .is(MsgType::Register)
            .from(self.home.uid());

        let stop = self.stop.clone();
        let fired = Arc::clone(&self.timeout_fired);
        self.timeout_fired.store(false, Ordering::Release);
        subs.on(self_register.clone())
            .skip_until(self_register)
            .first()
            .timeout(self.register_timeout, move || {
                // Runs on the timer thread: raise the stop signal and
                // nothing else. Joining a journal from here is forbidden.
                if stop.is_signalled() {
                    return;
                }
                log::error!("registration ack timeout, signalling stop");
                fired.store(true, Ordering::Release);
                stop.signal();
            })
            .token(Reaction::Ack);

        subs.on(Pattern::new().is(MsgType::Register))
            .token(Reaction::PeerRegister);

        subs.on(Pattern::new().is(MsgType::RequestStart))
            .first()
            .token(Reaction::Start);
    }

    fn event_loop(
        &mut self,
        service: &mut dyn Service,
        subs: &mut Subscriptions<Reaction>,
    ) -> Result<()> {
        while let Some(event) = self.reader.next_blocking(&self.stop)? {
            for reaction in subs.dispatch(&event) {
                match reaction {
                    Reaction::Ack => self.handle_ack(&event)?,
                    Reaction::PeerRegister => self.handle_register(&event),
                    Reaction::Start => {
                        self.set_state(State::Running);
                        let mut ctx = Context {
                            home: &self.home,
                            registry: &self.registry,
                            writer: &mut self.writer,
                            clock: &*self.clock,
                        };
                        service.start(&mut ctx)?;
                    }
                    Reaction::Custom(tag) => {
                        let mut ctx = Context {
                            home: &self.home,
                            registry: &self.registry,
                            writer: &mut self.writer,
                            clock: &*self.clock,
                        };
                        service.on_event(tag, &event, &mut ctx)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `AwaitingAck -> Joined`: join the supervisor's journal from the
    /// echo's `gen_time`, so no relayed peer registration at or after that
    /// instant is missed and nothing before it is replayed.
    fn handle_ack(&mut self, event: &Event) -> Result<()> {
        self.reader
            .join(&self.master_journal, self.home.uid(), event.gen_time())?;
        self.set_state(State::Joined);
        Ok(())
    }

    fn handle_register(&mut self, event: &Event) {
        match event
            .decode::<RegisterPayload>()
            .and_then(|payload| payload.location())
        {
            Ok(location) => {
                if let Err(err) = self.registry.register(location) {
                    log::error!("{err}");
                    self.stop.signal();
                }
            }
            Err(err) => {
                log::warn!(
                    "undecodable register payload from {}: {err}",
                    uid_str(event.source())
                );
            }
        }
    }

    fn set_state(&mut self, next: State) {
        if self.state != next {
            log::debug!("apprentice {:08x} {:?} -> {next:?}", self.home.uid(), self.state);
            self.state = next;
        }
    }
}

fn publish_subscribe_request(writer: &mut Writer, now: u64, source_id: u32) -> Result<()> {
    let payload = RequestSubscribePayload {
        source_id,
        from_time: now,
    };
    writer.write_json(MsgType::RequestSubscribe.type_id(), now, &payload)?;
    Ok(())
}
