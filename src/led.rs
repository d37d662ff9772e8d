//! LED command bit packing.
//!
//! The dial's ring LED is driven by writing an `EV_MSC`/`MSC_PULSELED` record whose
//! `value` packs brightness and pulse settings:
//!
//! ```text
//! bits  0..=7   brightness
//! bits  8..=15  pulse speed
//! bit   16      unused
//! bits 17..=18  pulse type
//! bit   19      pulse while asleep
//! bit   20      pulse while awake
//! ```

use crate::event::{EventKinds, RawEvent};
use serde::{Deserialize, Serialize};

pub const MAX_BRIGHTNESS: u8 = 255;
pub const MAX_PULSE_SPEED: u8 = 255;

const PULSE_TYPE_MASK: u32 = 0b11;

/// Decoded LED command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedCommand {
    pub brightness: u8,
    pub speed: u8,
    /// Pulse waveform, `0..=3`. Higher bits are discarded when packing.
    pub pulse_type: u8,
    pub asleep: bool,
    pub awake: bool,
}

impl Default for LedCommand {
    fn default() -> Self {
        Self::max()
    }
}

impl LedCommand {
    /// Steady light at `brightness`.
    pub fn brightness(brightness: u8) -> Self {
        Self {
            brightness,
            speed: 0,
            pulse_type: 0,
            asleep: false,
            awake: false,
        }
    }

    /// Full brightness.
    pub fn max() -> Self {
        Self::brightness(MAX_BRIGHTNESS)
    }

    pub fn off() -> Self {
        Self::brightness(0)
    }

    /// Fastest pulse, both asleep and awake.
    pub fn pulse() -> Self {
        Self {
            brightness: MAX_BRIGHTNESS,
            speed: MAX_PULSE_SPEED,
            pulse_type: 2,
            asleep: true,
            awake: true,
        }
    }

    /// Steady light at `round(fraction * 255)`, clamped to `0..=255`.
    pub fn from_fraction(fraction: f64) -> Self {
        let scaled = (fraction * f64::from(MAX_BRIGHTNESS)).round();
        Self::brightness(scaled.clamp(0.0, f64::from(MAX_BRIGHTNESS)) as u8)
    }

    /// Pack into a record `value`.
    pub fn pack(&self) -> u32 {
        u32::from(self.brightness)
            | u32::from(self.speed) << 8
            | (u32::from(self.pulse_type) & PULSE_TYPE_MASK) << 17
            | u32::from(self.asleep) << 19
            | u32::from(self.awake) << 20
    }

    /// Inverse of [`pack`](Self::pack). Bits outside the defined ranges are ignored.
    pub fn unpack(value: u32) -> Self {
        Self {
            brightness: (value & 0xff) as u8,
            speed: (value >> 8 & 0xff) as u8,
            pulse_type: (value >> 17 & PULSE_TYPE_MASK) as u8,
            asleep: value >> 19 & 1 == 1,
            awake: value >> 20 & 1 == 1,
        }
    }

    /// Untimed LED-control record using `kinds`' type/code pair.
    pub fn to_event(&self, kinds: &EventKinds) -> RawEvent {
        RawEvent::untimed(kinds.led_type, kinds.led_code, self.pack() as i32)
    }

    /// Decode an LED-control record, or `None` for any other record.
    pub fn from_event(event: &RawEvent, kinds: &EventKinds) -> Option<Self> {
        kinds
            .is_led(event)
            .then(|| Self::unpack(event.value as u32))
    }
}

impl From<LedCommand> for RawEvent {
    fn from(cmd: LedCommand) -> Self {
        cmd.to_event(&EventKinds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EV_MSC, MSC_PULSELED, PUSH};

    #[test]
    fn packs_fields_into_their_bits() {
        assert_eq!(LedCommand::max().pack(), 0xff);
        assert_eq!(LedCommand::off().pack(), 0);
        assert_eq!(
            LedCommand::pulse().pack(),
            0xff | 0xff << 8 | 2 << 17 | 1 << 19 | 1 << 20
        );
    }

    #[test]
    fn unpack_inverts_pack_over_field_ranges() {
        for brightness in [0u8, 1, 128, 255] {
            for speed in [0u8, 77, 255] {
                for pulse_type in 0u8..=3 {
                    for (asleep, awake) in [(false, false), (true, false), (false, true), (true, true)] {
                        let cmd = LedCommand {
                            brightness,
                            speed,
                            pulse_type,
                            asleep,
                            awake,
                        };
                        assert_eq!(LedCommand::unpack(cmd.pack()), cmd);
                    }
                }
            }
        }
    }

    #[test]
    fn out_of_range_pulse_type_is_masked() {
        let cmd = LedCommand {
            pulse_type: 0b111,
            ..LedCommand::off()
        };
        assert_eq!(LedCommand::unpack(cmd.pack()).pulse_type, 0b11);
        assert!(!LedCommand::unpack(cmd.pack()).asleep);
    }

    #[test]
    fn fraction_rounds_and_clamps() {
        assert_eq!(LedCommand::from_fraction(0.5).brightness, 128);
        assert_eq!(LedCommand::from_fraction(1.0).brightness, 255);
        assert_eq!(LedCommand::from_fraction(0.0).brightness, 0);
        assert_eq!(LedCommand::from_fraction(0.37).brightness, 94);
        assert_eq!(LedCommand::from_fraction(1.7).brightness, 255);
        assert_eq!(LedCommand::from_fraction(-0.2).brightness, 0);
    }

    #[test]
    fn event_conversion_uses_led_kinds() {
        let kinds = EventKinds::default();
        let event: RawEvent = LedCommand::pulse().into();
        assert_eq!((event.kind, event.code), (EV_MSC, MSC_PULSELED));
        assert_eq!((event.seconds, event.microseconds), (0, 0));
        assert_eq!(
            LedCommand::from_event(&event, &kinds),
            Some(LedCommand::pulse())
        );
        assert_eq!(
            LedCommand::from_event(&RawEvent::untimed(PUSH, 0, 1), &kinds),
            None
        );
    }
}
