use crate::{Error, Result};

/// Serialized frame header size. Field order below matches the explicit
/// little-endian offsets used by `to_bytes`/`from_bytes`.
pub const FRAME_HEADER_SIZE: usize = 32;
/// Records start on 8-byte boundaries; the gap is zero padding.
pub const FRAME_ALIGN: usize = 8;
/// Per-frame payload cap, independent of segment size.
pub const MAX_PAYLOAD_LEN: usize = 1 << 20;

/// One committed record's header.
///
/// `gen_time` is stamped by the writer's clock when the frame closes;
/// `trigger_time` is the causal timestamp supplied by the caller and may
/// predate `gen_time` when an event is being relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub type_id: u16,
    pub _reserved: u16,
    pub source: u32,
    pub checksum: u32,
    pub gen_time: u64,
    pub trigger_time: u64,
}

impl FrameHeader {
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..6].copy_from_slice(&self.type_id.to_le_bytes());
        buf[6..8].copy_from_slice(&self._reserved.to_le_bytes());
        buf[8..12].copy_from_slice(&self.source.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf[16..24].copy_from_slice(&self.gen_time.to_le_bytes());
        buf[24..32].copy_from_slice(&self.trigger_time.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            length: u32::from_le_bytes(bytes[0..4].try_into().expect("slice length")),
            type_id: u16::from_le_bytes(bytes[4..6].try_into().expect("slice length")),
            _reserved: u16::from_le_bytes(bytes[6..8].try_into().expect("slice length")),
            source: u32::from_le_bytes(bytes[8..12].try_into().expect("slice length")),
            checksum: u32::from_le_bytes(bytes[12..16].try_into().expect("slice length")),
            gen_time: u64::from_le_bytes(bytes[16..24].try_into().expect("slice length")),
            trigger_time: u64::from_le_bytes(bytes[24..32].try_into().expect("slice length")),
        }
    }

    pub fn crc32(payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }

    pub fn validate(&self, payload: &[u8]) -> Result<()> {
        if Self::crc32(payload) == self.checksum {
            Ok(())
        } else {
            Err(Error::Corrupt("frame checksum mismatch"))
        }
    }
}

/// Total bytes a frame occupies in the segment, padding included.
pub fn record_len(payload_len: usize) -> usize {
    align_up(FRAME_HEADER_SIZE + payload_len, FRAME_ALIGN)
}

#[inline]
fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
