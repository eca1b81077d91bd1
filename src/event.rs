use serde::de::DeserializeOwned;

use crate::journal::frame::FrameHeader;
use crate::protocol::MsgType;
use crate::Result;

/// One immutable record from the merged event sequence.
///
/// `gen_time` is when the producing writer committed the frame;
/// `trigger_time` is the causal timestamp and may predate `gen_time` when
/// the frame relays an earlier event. Unknown `type_id` values are carried
/// untouched so listeners stay forward-compatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    gen_time: u64,
    trigger_time: u64,
    type_id: u16,
    source: u32,
    payload: Vec<u8>,
}

impl Event {
    pub fn new(gen_time: u64, trigger_time: u64, type_id: u16, source: u32, payload: Vec<u8>) -> Self {
        Self {
            gen_time,
            trigger_time,
            type_id,
            source,
            payload,
        }
    }

    pub(crate) fn from_frame(header: &FrameHeader, payload: Vec<u8>) -> Self {
        Self::new(
            header.gen_time,
            header.trigger_time,
            header.type_id,
            header.source,
            payload,
        )
    }

    pub fn gen_time(&self) -> u64 {
        self.gen_time
    }

    pub fn trigger_time(&self) -> u64 {
        self.trigger_time
    }

    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn msg_type(&self) -> MsgType {
        MsgType::from_type_id(self.type_id)
    }

    /// uid of the originating location, preserved through relays.
    pub fn source(&self) -> u32 {
        self.source
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}
