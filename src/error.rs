//! Crate-wide error type.
//!
//! | Variant | Raised by | Effect |
//! |---------|-----------|--------|
//! | [`MalformedRecord`](Error::MalformedRecord) | codec, device reader | ends the dispatch loop |
//! | [`Io`](Error::Io) | device open/read/write | ends the dispatch loop (or the writing listener) |
//! | [`UnsupportedEventKind`](Error::UnsupportedEventKind) | gesture classification | event skipped, listener continues |
//! | [`Config`](Error::Config) | config loading | startup failure |
//! | [`Mixer`](Error::Mixer) | external volume tool | logged by the listener |
//! | [`Handler`](Error::Handler) | user gesture callbacks | logged by the listener |
//! | [`NoDevice`](Error::NoDevice) | device discovery | startup failure |
//!
//! A full listener queue is not an error: the event is dropped for that listener.

use thiserror::Error;

/// Errors produced by `dialup`.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer bytes than one fixed-size record were available.
    #[error("malformed event record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    /// Opening, reading or writing the device failed.
    #[error("device i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The event's type/code pair has no gesture classification.
    #[error("unsupported event kind: type=0x{kind:02x} code=0x{code:02x}")]
    UnsupportedEventKind { kind: u16, code: u16 },

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The external mixer tool failed or produced unusable output.
    #[error("mixer error: {0}")]
    Mixer(String),

    /// A gesture callback reported a failure.
    #[error("handler error: {0}")]
    Handler(String),

    /// No matching device node was found.
    #[error("no input device matching {0:?} found")]
    NoDevice(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Whether the dispatch loop can keep going after this error.
    ///
    /// Framing and device errors are fatal: once a read is lost, every following record
    /// would be misaligned.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MalformedRecord { .. } | Error::Io(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
