//! Dispatcher tying a device to its listeners.
//!
//! [`Manager`] owns the device's read half and the [`EventBus`]. Each listener added to it
//! runs on its own thread, pulling from its bus subscription, and writes any response
//! through the shared [`EventWriter`]. [`Manager::run`] drives the dispatch loop on the
//! calling thread.
//!
//! ```no_run
//! use dialup::{Config, GestureHandler, LedCommand, Manager, Response};
//!
//! struct Dimmer(u8);
//!
//! impl GestureHandler for Dimmer {
//!     fn rotate(&mut self, delta: i32) -> Response {
//!         self.0 = (i32::from(self.0) + delta).clamp(0, 255) as u8;
//!         Ok(Some(LedCommand::brightness(self.0).into()))
//!     }
//! }
//!
//! let config = Config::default();
//! let mut manager = Manager::discover(&config).expect("find device");
//! manager.add_gesture_handler(Dimmer(255)).expect("spawn listener");
//! manager.run().expect("device stream");
//! ```

use crate::codec::EventCodec;
use crate::config::Config;
use crate::device::{EventReader, EventSource, EventWriter};
use crate::discovery;
use crate::error::{Error, Result};
use crate::event::{EventKinds, RawEvent};
use crate::eventbus::{EventBus, ListenerId, Subscription};
use crate::gesture::{GestureHandler, GestureMachine, Response};
use std::any::Any;
use std::fs::File;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Something that reacts to raw events, optionally answering with a record for the device.
pub trait EventHandler {
    fn handle(&mut self, event: &RawEvent) -> Response;
}

impl<F> EventHandler for F
where
    F: FnMut(&RawEvent) -> Response,
{
    fn handle(&mut self, event: &RawEvent) -> Response {
        self(event)
    }
}

/// Listener loop: feed every event of `events` to `handler` and write back responses.
///
/// Handler errors and panics are logged and the loop moves on to the next event. Returns
/// when the subscription ends, or with the error of a failed write-back.
pub fn handle_events<H, W>(
    events: Subscription,
    handler: &mut H,
    writer: &EventWriter<W>,
) -> Result<()>
where
    H: EventHandler + ?Sized,
    W: Write,
{
    let listener = events.id();
    for event in events {
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&event))) {
            Ok(Ok(Some(response))) => {
                if let Err(e) = writer.write(&response) {
                    tracing::error!(%listener, error = %e, "write-back failed, stopping listener");
                    return Err(e);
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(Error::UnsupportedEventKind { kind, code })) => {
                tracing::trace!(%listener, kind, code, "event not handled");
            }
            Ok(Err(e)) => {
                tracing::warn!(%listener, error = %e, "handler failed");
            }
            Err(payload) => {
                tracing::error!(%listener, panic = panic_message(&*payload), "handler panicked");
            }
        }
    }
    tracing::debug!(%listener, "listener stopped");
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Owns a device and the listener threads consuming it.
pub struct Manager<R, W> {
    reader: EventReader<R>,
    writer: EventWriter<W>,
    bus: EventBus,
    kinds: EventKinds,
    long_press: Duration,
    listeners: Vec<(ListenerId, JoinHandle<Result<()>>)>,
}

impl Manager<File, File> {
    /// Open the device node at `path`.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let source = EventSource::open(path, EventCodec::new(config.layout()))?;
        Ok(Self::new(source, config))
    }

    /// Open `config.device`, or the first matching node under `/dev/input/by-id`.
    pub fn discover(config: &Config) -> Result<Self> {
        let path = match &config.device {
            Some(path) => path.clone(),
            None => discovery::find_device()?,
        };
        Self::open(path, config)
    }
}

impl<R, W> Manager<R, W>
where
    R: Read,
    W: Write + Send + 'static,
{
    pub fn new(source: EventSource<R, W>, config: &Config) -> Self {
        let (reader, writer) = source.into_parts();
        Self {
            reader,
            writer,
            bus: EventBus::new(config.queue_capacity),
            kinds: config.kinds,
            long_press: config.long_press(),
            listeners: Vec::new(),
        }
    }

    /// Handle to the bus, for registering raw subscriptions from elsewhere.
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Handle for writing records to the device.
    pub fn writer(&self) -> EventWriter<W> {
        self.writer.clone()
    }

    /// Run `handler` on its own thread, fed by a new bus subscription.
    pub fn add_listener<H>(&mut self, mut handler: H) -> Result<ListenerId>
    where
        H: EventHandler + Send + 'static,
    {
        let events = self.bus.subscribe();
        let id = events.id();
        let writer = self.writer.clone();
        let handle = thread::Builder::new()
            .name(id.to_string())
            .spawn(move || handle_events(events, &mut handler, &writer))?;
        self.listeners.push((id, handle));
        tracing::info!(listener = %id, "listener started");
        Ok(id)
    }

    /// Run a gesture state machine for `handler` as a listener.
    pub fn add_gesture_handler<H>(&mut self, handler: H) -> Result<ListenerId>
    where
        H: GestureHandler + Send + 'static,
    {
        let machine = GestureMachine::with_config(handler, self.kinds, self.long_press);
        self.add_listener(machine)
    }

    /// Stop a listener before dispatch starts. Its thread exits without handling anything
    /// still queued for it.
    ///
    /// [`run`](Self::run) consumes the manager; to remove a listener while events are
    /// flowing, keep a handle from [`bus`](Self::bus) and call [`EventBus::remove`] on it.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove(id)
    }

    /// Dispatch device events until the stream ends, then wait for the listeners.
    pub fn run(mut self) -> Result<()> {
        let result = self.bus.run(&mut self.reader);
        for (id, handle) in self.listeners.drain(..) {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(listener = %id, error = %e, "listener ended with error"),
                Err(_) => tracing::error!(listener = %id, "listener thread panicked"),
            }
        }
        result
    }
}
