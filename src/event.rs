//! Raw input records and their classification.
//!
//! Every record read from or written to the device is a [`RawEvent`]: a timestamp plus a
//! `type`/`code`/`value` triple, exactly as the kernel input layer lays it out. `dialup`
//! does not reinterpret the fields; the [`EventKinds`] table decides which records are
//! button pushes, dial rotations or LED commands.
//!
//! ## Value conventions
//! - **Push:** `value != 0` is the button going down, `0` is the button coming up.
//! - **Rotate:** `value` is a signed delta in detents (negative = counter-clockwise).
//! - **LED:** `value` is a bit-packed [`LedCommand`](crate::led::LedCommand).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `type` of button records.
pub const PUSH: u16 = 0x01;
/// `type` of rotation records.
pub const ROTATE: u16 = 0x02;
/// `type` of LED-control records (`EV_MSC`).
pub const EV_MSC: u16 = 0x04;
/// `code` of LED-control records (`MSC_PULSELED`).
pub const MSC_PULSELED: u16 = 0x01;

/// One fixed-size input record.
///
/// Immutable value type; two events are equal when all their fields are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawEvent {
    /// Seconds part of the kernel timestamp.
    pub seconds: i64,
    /// Microseconds part of the kernel timestamp.
    pub microseconds: i64,
    /// Event type discriminant.
    #[serde(rename = "type")]
    pub kind: u16,
    /// Event code within the type.
    pub code: u16,
    /// Payload.
    pub value: i32,
}

impl RawEvent {
    pub fn new(seconds: i64, microseconds: i64, kind: u16, code: u16, value: i32) -> Self {
        Self {
            seconds,
            microseconds,
            kind,
            code,
            value,
        }
    }

    /// Event with a zero timestamp, as used for records written to the device.
    pub fn untimed(kind: u16, code: u16, value: i32) -> Self {
        Self::new(0, 0, kind, code, value)
    }

    /// Timestamp in microseconds since the epoch.
    pub fn timestamp_micros(&self) -> i64 {
        self.seconds
            .saturating_mul(1_000_000)
            .saturating_add(self.microseconds)
    }

    /// Time elapsed from `earlier` to `self`. Clock steps backwards count as zero.
    pub fn elapsed_since(&self, earlier: &RawEvent) -> Duration {
        let delta = self
            .timestamp_micros()
            .saturating_sub(earlier.timestamp_micros());
        Duration::from_micros(u64::try_from(delta).unwrap_or(0))
    }
}

/// What a record means to the gesture layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Button edge; `true` = pressed.
    Push { pressed: bool },
    /// Dial moved by `delta` detents.
    Rotate { delta: i32 },
    /// LED command echoed back by the device.
    Led { value: i32 },
}

/// Named event-type discriminants for one peripheral.
///
/// Passed explicitly to the classifier and the LED builder instead of living in globals,
/// so a device with different numbering only needs a different table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventKinds {
    /// `type` of button records.
    pub push: u16,
    /// `type` of rotation records.
    pub rotate: u16,
    /// `type` of LED-control records.
    pub led_type: u16,
    /// `code` of LED-control records.
    pub led_code: u16,
}

impl Default for EventKinds {
    fn default() -> Self {
        Self {
            push: PUSH,
            rotate: ROTATE,
            led_type: EV_MSC,
            led_code: MSC_PULSELED,
        }
    }
}

impl EventKinds {
    /// Classify a record, or `None` when its type/code pair is not one of ours.
    pub fn classify(&self, event: &RawEvent) -> Option<Signal> {
        if event.kind == self.push {
            Some(Signal::Push {
                pressed: event.value != 0,
            })
        } else if event.kind == self.rotate {
            Some(Signal::Rotate { delta: event.value })
        } else if event.kind == self.led_type && event.code == self.led_code {
            Some(Signal::Led { value: event.value })
        } else {
            None
        }
    }

    /// Whether `event` is an LED-control record.
    pub fn is_led(&self, event: &RawEvent) -> bool {
        event.kind == self.led_type && event.code == self.led_code
    }
}
