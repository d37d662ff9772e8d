//! System volume through PulseAudio's `pactl`.
//!
//! The [`Mixer`] trait is all a gesture handler needs: read the active output's volume
//! and nudge it. [`Pactl`] implements it by running the `pactl` tool and scraping its
//! text output; the first sink in state `RUNNING` is the active one.
//!
//! [`VolumeKnob`] turns the dial into a volume knob that lights the ring in proportion
//! to the new volume.

use crate::error::{Error, Result};
use crate::gesture::{GestureHandler, Response};
use crate::led::LedCommand;
use regex::Regex;
use std::process::Command;
use std::sync::OnceLock;

/// Volume bounds in percent.
pub const MAX_VOLUME: u8 = 100;

/// The two operations a volume handler needs.
pub trait Mixer {
    /// Volume of the active output in percent, or `None` when nothing is playing.
    fn active_volume(&mut self) -> Result<Option<u8>>;

    /// Change the active output's volume by `delta` percent, clamped to `0..=100`.
    /// Returns the new volume, or `None` when nothing is playing.
    fn adjust_volume(&mut self, delta: i32) -> Result<Option<u8>>;
}

/// One PulseAudio sink as listed by `pactl list sinks`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sink {
    pub index: u32,
    pub name: String,
    pub state: String,
    /// Volume of the first channel, in percent.
    pub volume: Option<u8>,
}

impl Sink {
    pub fn is_running(&self) -> bool {
        self.state == "RUNNING"
    }
}

struct Patterns {
    header: Regex,
    state: Regex,
    name: Regex,
    volume: Regex,
}

// The patterns are constants, so compiling them cannot fail at runtime.
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        header: Regex::new(r"^Sink #(\d+)").expect("valid regex"),
        state: Regex::new(r"^\s+State: (\w+)").expect("valid regex"),
        name: Regex::new(r"^\s+Name: (.+)$").expect("valid regex"),
        // Old: "Volume: 0:  65% 1:  65%"; new: "Volume: front-left: 42597 /  65% / ..."
        volume: Regex::new(r"^\s+Volume: (?:0: +(\d+)%|[^/]*/\s*(\d+)%)").expect("valid regex"),
    })
}

/// Parse the output of `pactl list sinks`.
pub fn parse_sinks(output: &str) -> Vec<Sink> {
    let p = patterns();
    let mut sinks: Vec<Sink> = Vec::new();

    for line in output.lines() {
        if let Some(caps) = p.header.captures(line) {
            sinks.push(Sink {
                index: caps[1].parse().unwrap_or_default(),
                ..Sink::default()
            });
            continue;
        }
        let Some(sink) = sinks.last_mut() else {
            continue;
        };
        if let Some(caps) = p.state.captures(line) {
            sink.state = caps[1].to_string();
        } else if let Some(caps) = p.name.captures(line) {
            sink.name = caps[1].trim().to_string();
        } else if let Some(caps) = p.volume.captures(line) {
            if sink.volume.is_none() {
                sink.volume = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .map(|v| v.min(u32::from(u8::MAX)) as u8);
            }
        }
    }
    sinks
}

/// `current + delta`, clamped to `0..=100`.
pub fn clamp_volume(current: u8, delta: i32) -> u8 {
    (i32::from(current) + delta).clamp(0, i32::from(MAX_VOLUME)) as u8
}

/// [`Mixer`] backed by the `pactl` command.
#[derive(Clone, Debug)]
pub struct Pactl {
    program: String,
}

impl Default for Pactl {
    fn default() -> Self {
        Self::new("pactl")
    }
}

impl Pactl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| Error::Mixer(format!("cannot run {}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(Error::Mixer(format!(
                "{} {} failed ({}): {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn list_sinks(&self) -> Result<Vec<Sink>> {
        Ok(parse_sinks(&self.run(&["list", "sinks"])?))
    }

    /// First sink in state `RUNNING`.
    pub fn active_sink(&self) -> Result<Option<Sink>> {
        Ok(self.list_sinks()?.into_iter().find(Sink::is_running))
    }

    /// Set an absolute volume in percent.
    pub fn set_volume(&self, sink: &Sink, percent: u8) -> Result<()> {
        let value = format!("{}%", percent.min(MAX_VOLUME));
        self.run(&["set-sink-volume", &sink.name, &value])?;
        tracing::debug!(sink = %sink.name, volume = percent, "volume set");
        Ok(())
    }
}

impl Mixer for Pactl {
    fn active_volume(&mut self) -> Result<Option<u8>> {
        Ok(self.active_sink()?.and_then(|sink| sink.volume))
    }

    fn adjust_volume(&mut self, delta: i32) -> Result<Option<u8>> {
        let Some(sink) = self.active_sink()? else {
            tracing::debug!("no running sink");
            return Ok(None);
        };
        let current = sink
            .volume
            .ok_or_else(|| Error::Mixer(format!("sink {} reports no volume", sink.name)))?;
        let volume = clamp_volume(current, delta);
        self.set_volume(&sink, volume)?;
        Ok(Some(volume))
    }
}

/// Gesture handler mapping dial rotation to system volume.
pub struct VolumeKnob<M> {
    mixer: M,
    step: i32,
}

impl<M: Mixer> VolumeKnob<M> {
    /// One percent per detent.
    pub fn new(mixer: M) -> Self {
        Self::with_step(mixer, 1)
    }

    pub fn with_step(mixer: M, step: i32) -> Self {
        Self { mixer, step }
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    /// LED level showing the current volume.
    pub fn current_led(&mut self) -> Result<Option<LedCommand>> {
        Ok(self.mixer.active_volume()?.map(volume_led))
    }
}

fn volume_led(volume: u8) -> LedCommand {
    LedCommand::from_fraction(f64::from(volume) / f64::from(MAX_VOLUME))
}

impl<M: Mixer> GestureHandler for VolumeKnob<M> {
    fn rotate(&mut self, delta: i32) -> Response {
        let volume = self.mixer.adjust_volume(delta.saturating_mul(self.step))?;
        Ok(volume.map(|v| volume_led(v).into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;

    const OLD_FORMAT: &str = "\
Sink #0
\tState: SUSPENDED
\tName: alsa_output.hdmi
\tVolume: 0:  40% 1:  40%
\tBase Volume: 100%
Sink #1
\tState: RUNNING
\tName: alsa_output.analog-stereo
\tVolume: 0:  65% 1:  65%
";

    const NEW_FORMAT: &str = "\
Sink #57
\tState: RUNNING
\tName: alsa_output.pci-0000_00_1f.3.analog-stereo
\tDescription: Built-in Audio Analog Stereo
\tMute: no
\tVolume: front-left: 42597 /  65% / -11.23 dB,   front-right: 42597 /  65% / -11.23 dB
\t        balance 0.00
\tBase Volume: 65536 / 100% / 0.00 dB
";

    #[test]
    fn parses_old_pactl_output() {
        let sinks = parse_sinks(OLD_FORMAT);
        assert_eq!(sinks.len(), 2);
        assert_eq!(
            sinks[1],
            Sink {
                index: 1,
                name: "alsa_output.analog-stereo".into(),
                state: "RUNNING".into(),
                volume: Some(65),
            }
        );
        assert_eq!(sinks[0].volume, Some(40));
        assert!(!sinks[0].is_running());
    }

    #[test]
    fn parses_new_pactl_output_ignoring_base_volume() {
        let sinks = parse_sinks(NEW_FORMAT);
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].index, 57);
        assert_eq!(sinks[0].name, "alsa_output.pci-0000_00_1f.3.analog-stereo");
        assert_eq!(sinks[0].volume, Some(65));
    }

    #[test]
    fn clamps_to_percent_range() {
        assert_eq!(clamp_volume(98, 5), 100);
        assert_eq!(clamp_volume(3, -10), 0);
        assert_eq!(clamp_volume(50, -1), 49);
    }

    #[derive(Default)]
    struct FakeMixer {
        volume: Option<u8>,
        calls: Vec<i32>,
    }

    impl Mixer for FakeMixer {
        fn active_volume(&mut self) -> Result<Option<u8>> {
            Ok(self.volume)
        }

        fn adjust_volume(&mut self, delta: i32) -> Result<Option<u8>> {
            self.calls.push(delta);
            self.volume = self.volume.map(|v| clamp_volume(v, delta));
            Ok(self.volume)
        }
    }

    #[test]
    fn rotation_adjusts_volume_and_lights_ring() {
        let mut knob = VolumeKnob::with_step(
            FakeMixer {
                volume: Some(48),
                ..FakeMixer::default()
            },
            2,
        );
        let response = knob.rotate(1).unwrap();
        assert_eq!(knob.mixer().calls, [2]);
        assert_eq!(response, Some(RawEvent::from(LedCommand::from_fraction(0.5))));
        assert_eq!(knob.current_led().unwrap(), Some(LedCommand::brightness(128)));
    }

    #[test]
    fn nothing_playing_means_no_response() {
        let mut knob = VolumeKnob::new(FakeMixer::default());
        assert_eq!(knob.rotate(-3).unwrap(), None);
        assert_eq!(knob.current_led().unwrap(), None);
    }

    #[test]
    fn missing_tool_is_a_mixer_error() {
        let pactl = Pactl::new("/nonexistent/pactl-for-tests");
        assert!(matches!(pactl.list_sinks(), Err(Error::Mixer(_))));
    }
}
