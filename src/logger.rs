//! A listener that logs every raw event.
use crate::event::RawEvent;
use crate::gesture::Response;
use crate::manager::EventHandler;

/// How [`EventLogger`] renders events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Debug,
    Json,
}

/// Logs each event at `debug` level under the `dialup::input` target.
#[derive(Debug, Default)]
pub struct EventLogger {
    format: LogFormat,
    seen: u64,
}

impl EventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            seen: 0,
        }
    }

    /// Events logged so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn render(&self, event: &RawEvent) -> String {
        match self.format {
            LogFormat::Debug => format!("{event:?}"),
            LogFormat::Json => serde_json::to_string(event).unwrap_or_else(|e| e.to_string()),
        }
    }
}

impl EventHandler for EventLogger {
    fn handle(&mut self, event: &RawEvent) -> Response {
        self.seen += 1;
        tracing::debug!(target: "dialup::input", "{}", self.render(event));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ROTATE;

    #[test]
    fn counts_and_never_answers() {
        let mut logger = EventLogger::new();
        for v in 0..3 {
            assert_eq!(logger.handle(&RawEvent::untimed(ROTATE, 7, v)).unwrap(), None);
        }
        assert_eq!(logger.seen(), 3);
    }

    #[test]
    fn renders_json() {
        let logger = EventLogger::json();
        assert_eq!(
            logger.render(&RawEvent::new(5, 6, ROTATE, 7, 1)),
            r#"{"seconds":5,"microseconds":6,"type":2,"code":7,"value":1}"#
        );
    }
}
