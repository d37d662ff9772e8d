//! Runtime configuration.
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! device = "/dev/input/by-id/usb-Griffin_Technology__Inc._Griffin_PowerMate-event-if00"
//! long_press_ms = 1000
//! queue_capacity = 5
//! time_width = "long64"   # "native" | "long64" | "long32"
//!
//! [kinds]
//! push = 1
//! rotate = 2
//! led_type = 4
//! led_code = 1
//! ```

use crate::codec::{RecordLayout, TimeWidth};
use crate::error::{Error, Result};
use crate::event::EventKinds;
use crate::eventbus::DEFAULT_QUEUE_CAPACITY;
use crate::gesture::DEFAULT_LONG_PRESS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Device node. Discovered under `/dev/input/by-id` when absent.
    pub device: Option<PathBuf>,
    /// Hold time at which a press becomes a long press.
    pub long_press_ms: u64,
    /// Per-listener queue capacity.
    pub queue_capacity: usize,
    /// Timestamp width of the device's records.
    pub time_width: TimeWidth,
    pub kinds: EventKinds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            long_press_ms: DEFAULT_LONG_PRESS.as_millis() as u64,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            time_width: TimeWidth::default(),
            kinds: EventKinds::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        let k = &self.kinds;
        if k.push == k.rotate {
            return Err(Error::Config(format!(
                "push and rotate kinds must differ (both 0x{:02x})",
                k.push
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.time_width)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.long_press(), Duration::from_millis(1000));
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.kinds, EventKinds::default());
    }

    #[test]
    fn parses_every_key() {
        let config = Config::from_toml_str(
            r#"
            device = "/dev/input/event7"
            long_press_ms = 750
            queue_capacity = 12
            time_width = "long32"

            [kinds]
            push = 1
            rotate = 2
            led_type = 4
            led_code = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.device, Some(PathBuf::from("/dev/input/event7")));
        assert_eq!(config.long_press(), Duration::from_millis(750));
        assert_eq!(config.queue_capacity, 12);
        assert_eq!(config.layout(), RecordLayout::LONG32);
        assert_eq!(config.layout().record_size(), 16);
    }

    #[test]
    fn partial_kinds_table_keeps_other_defaults() {
        let config = Config::from_toml_str("[kinds]\nrotate = 3\n").unwrap();
        assert_eq!(config.kinds.rotate, 3);
        assert_eq!(config.kinds.push, 1);
        assert_eq!(config.kinds.led_type, 4);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str("queue_capacity = 0"),
            Err(Error::Config(_))
        ));
        assert!(Config::from_toml_str("[kinds]\npush = 2\n").is_err());
        assert!(Config::from_toml_str("time_width = \"long16\"").is_err());
        assert!(Config::from_toml_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dialup.toml");
        std::fs::write(&path, "long_press_ms = 400\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().long_press_ms, 400);
        assert!(matches!(
            Config::load(dir.path().join("missing.toml")),
            Err(Error::Config(_))
        ));
    }
}
