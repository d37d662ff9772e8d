//! dialup — gestures and LED control for rotary dial peripherals.
//!
//! Reads the raw event stream of a dial such as the Griffin PowerMate from its Linux input
//! device node, fans it out to any number of listeners, classifies button and rotation
//! signals into gestures (short press, long press, rotate, push-rotate), and writes LED
//! commands back to the device.
//!
//! ```text
//! device ──▶ EventReader ──▶ EventBus ──▶ listener thread ──▶ GestureMachine ──▶ handler
//!   ▲                                                                             │
//!   └──────────────────────── EventWriter ◀──── response (LED command) ◀──────────┘
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod gesture;
pub mod led;
pub mod logger;
pub mod manager;
#[cfg(feature = "mixer")]
#[cfg_attr(docsrs, doc(cfg(feature = "mixer")))]
pub mod mixer;

pub use codec::{EventCodec, RecordLayout, TimeWidth};
pub use config::Config;
pub use device::{EventReader, EventSource, EventWriter};
pub use error::{Error, Result};
pub use event::{EventKinds, RawEvent, Signal};
pub use eventbus::{EventBus, ListenerId, Subscription};
pub use gesture::{Gesture, GestureHandler, GestureMachine, GestureState, Response};
pub use led::LedCommand;
pub use logger::EventLogger;
pub use manager::{EventHandler, Manager};
