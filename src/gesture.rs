//! Gesture classification.
//!
//! Raw push/rotate records are folded into four gestures:
//!
//! | From | Signal | To | Emits |
//! |------|--------|----|-------|
//! | any | push down | `Pressed` | nothing (press time recorded) |
//! | `Pressed` | push up | `Idle` | `ShortPress` if held `< long_press`, else `LongPress` |
//! | `PressedRotated` | push up | `Idle` | nothing |
//! | `Idle` | push up | `Idle` | nothing |
//! | `Idle` | rotate | `Idle` | `Rotate(delta)` |
//! | `Pressed` / `PressedRotated` | rotate | `PressedRotated` | `PushRotate(delta)` |
//!
//! Press duration is measured with the records' own timestamps, so classification does
//! not depend on how late a listener gets to an event.

use crate::error::{Error, Result};
use crate::event::{EventKinds, RawEvent, Signal};
use crate::manager::EventHandler;
use std::time::Duration;

/// Default long-press threshold.
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(1000);

/// What a gesture callback answers: optionally a record to write back to the device.
pub type Response = Result<Option<RawEvent>>;

/// Classified user action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    ShortPress,
    LongPress,
    Rotate(i32),
    PushRotate(i32),
}

/// Button/rotation state of one listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GestureState {
    /// Button up.
    #[default]
    Idle,
    /// Button down, no rotation during this hold.
    Pressed,
    /// Button down and the dial was turned during this hold.
    PressedRotated,
}

impl GestureState {
    pub fn button_down(self) -> bool {
        !matches!(self, GestureState::Idle)
    }
}

/// Callbacks for classified gestures.
///
/// Every callback defaults to doing nothing, except [`long_press`](Self::long_press) which
/// falls back to [`short_press`](Self::short_press).
pub trait GestureHandler {
    fn short_press(&mut self) -> Response {
        Ok(None)
    }

    /// Defaults to [`short_press`](Self::short_press).
    fn long_press(&mut self) -> Response {
        self.short_press()
    }

    fn rotate(&mut self, _delta: i32) -> Response {
        Ok(None)
    }

    fn push_rotate(&mut self, _delta: i32) -> Response {
        Ok(None)
    }
}

/// Per-listener gesture state machine driving a [`GestureHandler`].
pub struct GestureMachine<H> {
    handler: H,
    kinds: EventKinds,
    long_press: Duration,
    state: GestureState,
    press_started: RawEvent,
    last_button_value: i32,
}

impl<H: GestureHandler> GestureMachine<H> {
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, EventKinds::default(), DEFAULT_LONG_PRESS)
    }

    pub fn with_config(handler: H, kinds: EventKinds, long_press: Duration) -> Self {
        Self {
            handler,
            kinds,
            long_press,
            state: GestureState::Idle,
            press_started: RawEvent::default(),
            last_button_value: 0,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Value of the most recent push record.
    pub fn last_button_value(&self) -> i32 {
        self.last_button_value
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Advance the state machine by one record.
    ///
    /// Fails with [`Error::UnsupportedEventKind`] for records that are neither pushes nor
    /// rotations; the state is left untouched in that case.
    pub fn step(&mut self, event: &RawEvent) -> Result<Option<Gesture>> {
        let signal = match self.kinds.classify(event) {
            Some(signal @ (Signal::Push { .. } | Signal::Rotate { .. })) => signal,
            Some(Signal::Led { .. }) | None => {
                return Err(Error::UnsupportedEventKind {
                    kind: event.kind,
                    code: event.code,
                })
            }
        };

        let gesture = match signal {
            Signal::Push { pressed: true } => {
                self.last_button_value = event.value;
                self.state = GestureState::Pressed;
                self.press_started = *event;
                None
            }
            Signal::Push { pressed: false } => {
                self.last_button_value = event.value;
                let previous = std::mem::replace(&mut self.state, GestureState::Idle);
                match previous {
                    GestureState::Pressed => {
                        let held = event.elapsed_since(&self.press_started);
                        if held < self.long_press {
                            Some(Gesture::ShortPress)
                        } else {
                            Some(Gesture::LongPress)
                        }
                    }
                    GestureState::PressedRotated => None,
                    GestureState::Idle => {
                        tracing::debug!("button release without a press");
                        None
                    }
                }
            }
            Signal::Rotate { delta } => {
                if self.state.button_down() {
                    self.state = GestureState::PressedRotated;
                    Some(Gesture::PushRotate(delta))
                } else {
                    Some(Gesture::Rotate(delta))
                }
            }
            Signal::Led { .. } => None,
        };
        Ok(gesture)
    }

    /// Invoke the handler callback for `gesture`.
    pub fn dispatch(&mut self, gesture: Gesture) -> Response {
        match gesture {
            Gesture::ShortPress => self.handler.short_press(),
            Gesture::LongPress => self.handler.long_press(),
            Gesture::Rotate(delta) => self.handler.rotate(delta),
            Gesture::PushRotate(delta) => self.handler.push_rotate(delta),
        }
    }
}

impl<H: GestureHandler> EventHandler for GestureMachine<H> {
    fn handle(&mut self, event: &RawEvent) -> Response {
        match self.step(event)? {
            Some(gesture) => {
                tracing::debug!(?gesture, "gesture");
                self.dispatch(gesture)
            }
            None => Ok(None),
        }
    }
}
