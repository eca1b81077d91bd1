//! Journal-backed IPC and process coordination for trading systems.
//!
//! Cooperating processes ("apprentices") announce themselves to a
//! well-known supervisor over append-only journals, discover each other
//! through relayed Register events, and consume a merged, time-ordered
//! event sequence through declaratively composed stream subscriptions. The
//! supervisor itself is an external collaborator; only its message
//! contracts live here.

pub mod apprentice;
pub mod clock;
pub mod error;
pub mod event;
pub mod journal;
pub mod layout;
pub mod location;
pub mod protocol;
pub mod registry;
pub mod signal;
pub mod stream;

pub use apprentice::{Apprentice, ApprenticeConfig, Context, Reaction, Service, State};
pub use clock::{Clock, SystemClock, TscClock};
pub use error::{Error, Result};
pub use event::Event;
pub use journal::{JournalConfig, Reader, WaitStrategy, Writer};
pub use layout::{DirectoryLocator, Locator};
pub use location::{derive_uid, uid_str, Category, Location, Mode};
pub use protocol::{MsgType, RegisterPayload, RequestSubscribePayload};
pub use registry::LocationRegistry;
pub use signal::StopSignal;
pub use stream::{Pattern, Subscriptions};
