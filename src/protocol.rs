//! Bootstrap protocol message contracts.
//!
//! Three message types carry the registration handshake, stream requests,
//! and the start signal. Payloads are JSON; timing lives in the frame
//! header, not the payload. Everything above `0x1000` is domain traffic the
//! core never interprets.

use serde::{Deserialize, Serialize};

use crate::location::{Category, Location, Mode};
use crate::{Error, Result};

/// Protocol message tags. Tags not known to this enum map to `Unknown` and
/// flow through filters unharmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Register,
    RequestSubscribe,
    RequestStart,
    Unknown(u16),
}

impl MsgType {
    pub const fn type_id(self) -> u16 {
        match self {
            MsgType::Register => 0x11,
            MsgType::RequestSubscribe => 0x12,
            MsgType::RequestStart => 0x13,
            MsgType::Unknown(tag) => tag,
        }
    }

    pub const fn from_type_id(tag: u16) -> Self {
        match tag {
            0x11 => MsgType::Register,
            0x12 => MsgType::RequestSubscribe,
            0x13 => MsgType::RequestStart,
            other => MsgType::Unknown(other),
        }
    }
}

/// Payload of a `Register` frame: the sender's full identity. Published by
/// an apprentice at construction, relayed verbatim by the supervisor to
/// every listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub mode: Mode,
    pub category: Category,
    pub group: String,
    pub name: String,
    pub uid: u32,
    pub pid: u32,
}

impl RegisterPayload {
    pub fn from_location(location: &Location) -> Self {
        Self {
            mode: location.mode(),
            category: location.category(),
            group: location.group().to_string(),
            name: location.name().to_string(),
            uid: location.uid(),
            pid: std::process::id(),
        }
    }

    /// Rebuilds the sender's location, cross-checking the advertised uid
    /// against the derived one.
    pub fn location(&self) -> Result<Location> {
        let location = Location::new(self.mode, self.category, &self.group, &self.name)?;
        if location.uid() != self.uid {
            return Err(Error::Corrupt("register payload uid mismatch"));
        }
        Ok(location)
    }
}

/// Payload of a `RequestSubscribe` frame: ask the supervisor to relay
/// `source_id`'s stream to the caller from `from_time` onward.
/// Fire-and-forget; any acknowledgement arrives as ordinary relayed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubscribePayload {
    pub source_id: u32,
    pub from_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ids_round_trip() {
        for msg_type in [MsgType::Register, MsgType::RequestSubscribe, MsgType::RequestStart] {
            assert_eq!(MsgType::from_type_id(msg_type.type_id()), msg_type);
        }
        assert_eq!(MsgType::from_type_id(0x7777), MsgType::Unknown(0x7777));
    }

    #[test]
    fn register_payload_round_trips_as_json() {
        let location = Location::new(Mode::Live, Category::Strategy, "grp1", "alpha").unwrap();
        let payload = RegisterPayload::from_location(&location);
        let bytes = serde_json::to_vec(&payload).unwrap();
        let decoded: RegisterPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.location().unwrap(), location);
    }

    #[test]
    fn tampered_uid_is_rejected() {
        let location = Location::new(Mode::Live, Category::Strategy, "grp1", "alpha").unwrap();
        let mut payload = RegisterPayload::from_location(&location);
        payload.uid ^= 1;
        assert!(payload.location().is_err());
    }
}
