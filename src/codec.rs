//! Fixed-width binary codec for input records.
//!
//! Wire layout, little-endian, no padding:
//!
//! ```text
//! | seconds: long | microseconds: long | type: u16 | code: u16 | value: i32 |
//! ```
//!
//! The two timestamp fields are the C `long` of the kernel that produced the stream:
//! 8 bytes on 64-bit Linux (24-byte records), 4 bytes on most 32-bit targets (16-byte
//! records). The width is part of [`RecordLayout`] and must match the device; a wrong
//! width misaligns every record after the first.

use crate::error::{Error, Result};
use crate::event::RawEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the two timestamp fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWidth {
    /// Width of `c_long` on the compilation target.
    #[default]
    Native,
    /// 8-byte timestamps (64-bit kernels).
    Long64,
    /// 4-byte timestamps (32-bit kernels).
    Long32,
}

impl TimeWidth {
    /// Width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            TimeWidth::Native => std::mem::size_of::<std::ffi::c_long>(),
            TimeWidth::Long64 => 8,
            TimeWidth::Long32 => 4,
        }
    }
}

/// Byte layout of one record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordLayout {
    pub time_width: TimeWidth,
}

impl RecordLayout {
    /// 24-byte records.
    pub const LONG64: RecordLayout = RecordLayout {
        time_width: TimeWidth::Long64,
    };
    /// 16-byte records.
    pub const LONG32: RecordLayout = RecordLayout {
        time_width: TimeWidth::Long32,
    };

    pub fn new(time_width: TimeWidth) -> Self {
        Self { time_width }
    }

    /// Total size of one record in bytes.
    pub fn record_size(&self) -> usize {
        2 * self.time_width.bytes() + 2 + 2 + 4
    }
}

impl fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-byte records ({}-byte timestamps, {:?})",
            self.record_size(),
            self.time_width.bytes(),
            self.time_width
        )
    }
}

/// Encoder/decoder for one [`RecordLayout`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventCodec {
    layout: RecordLayout,
}

impl EventCodec {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn record_size(&self) -> usize {
        self.layout.record_size()
    }

    /// Decode the first record of `bytes`. Trailing bytes are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Result<RawEvent> {
        let size = self.record_size();
        if bytes.len() < size {
            return Err(Error::MalformedRecord {
                expected: size,
                actual: bytes.len(),
            });
        }

        let tw = self.layout.time_width.bytes();
        let seconds = read_long(&bytes[..tw]);
        let microseconds = read_long(&bytes[tw..2 * tw]);
        let rest = &bytes[2 * tw..size];

        Ok(RawEvent {
            seconds,
            microseconds,
            kind: u16::from_le_bytes([rest[0], rest[1]]),
            code: u16::from_le_bytes([rest[2], rest[3]]),
            value: i32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]),
        })
    }

    /// Encode `event` into exactly [`record_size`](Self::record_size) bytes.
    ///
    /// With 4-byte timestamps the time fields are truncated to 32 bits.
    pub fn encode(&self, event: &RawEvent) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.record_size());
        self.encode_into(event, &mut out);
        out
    }

    /// Append the encoding of `event` to `out`.
    pub fn encode_into(&self, event: &RawEvent, out: &mut Vec<u8>) {
        match self.layout.time_width.bytes() {
            4 => {
                out.extend_from_slice(&(event.seconds as i32).to_le_bytes());
                out.extend_from_slice(&(event.microseconds as i32).to_le_bytes());
            }
            _ => {
                out.extend_from_slice(&event.seconds.to_le_bytes());
                out.extend_from_slice(&event.microseconds.to_le_bytes());
            }
        }
        out.extend_from_slice(&event.kind.to_le_bytes());
        out.extend_from_slice(&event.code.to_le_bytes());
        out.extend_from_slice(&event.value.to_le_bytes());
    }
}

fn read_long(bytes: &[u8]) -> i64 {
    match bytes {
        &[a, b, c, d] => i32::from_le_bytes([a, b, c, d]) as i64,
        &[a, b, c, d, e, f, g, h] => i64::from_le_bytes([a, b, c, d, e, f, g, h]),
        _ => unreachable!("timestamp fields are 4 or 8 bytes"),
    }
}
