//! Fan-out of one device stream to many independently paced listeners.
//!
//! Each registered listener owns a bounded queue. The dispatch loop offers every event to
//! every queue without blocking: when a listener's queue is full the **incoming** event is
//! dropped for that listener only. A stalled listener therefore keeps the `capacity`
//! oldest unread events and misses what arrives while it is full, and the producer never
//! waits on it.
//!
//! Removing a listener (explicitly, or by dropping its [`Subscription`]) destroys its
//! queue: events still waiting in it are discarded and a blocked [`Subscription::pull`]
//! wakes with `None`. Closing the bus at the end of the stream is gentler: listeners keep
//! what is already queued and their iterators end once it is drained.

use crate::device::EventReader;
use crate::error::Result;
use crate::event::RawEvent;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Default per-listener queue capacity.
///
/// Small on purpose: a listener that falls behind should see fresh input soon after it
/// catches up instead of working through a long backlog.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// Identifies a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Queue {
    tx: SyncSender<RawEvent>,
    removed: Arc<AtomicBool>,
}

struct BusState {
    next_id: u64,
    listeners: BTreeMap<ListenerId, Queue>,
    closed: bool,
}

impl BusState {
    fn remove(&mut self, id: ListenerId) -> bool {
        match self.listeners.remove(&id) {
            Some(queue) => {
                queue.removed.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

/// Thread-safe multi-listener event queue.
///
/// Cheap to clone; clones share the same listener set.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
    default_capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventBus {
    /// Bus whose listeners get `default_capacity`-slot queues unless they ask otherwise.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                next_id: 0,
                listeners: BTreeMap::new(),
                closed: false,
            })),
            default_capacity: default_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener with the default capacity.
    pub fn subscribe(&self) -> Subscription {
        self.register(self.default_capacity)
    }

    /// Register a listener with a queue of `capacity` events (at least one).
    ///
    /// On a closed bus the returned subscription ends immediately.
    pub fn register(&self, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let removed = Arc::new(AtomicBool::new(false));
        let mut state = self.lock();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        if state.closed {
            tracing::debug!(listener = %id, "registered on closed bus");
        } else {
            state.listeners.insert(
                id,
                Queue {
                    tx,
                    removed: Arc::clone(&removed),
                },
            );
            tracing::debug!(listener = %id, capacity, "listener registered");
        }
        Subscription {
            id,
            rx,
            removed,
            bus: Arc::downgrade(&self.state),
        }
    }

    /// Remove a listener. Returns `false` if it was not registered.
    ///
    /// Events still queued for it are discarded, and a thread blocked in that listener's
    /// [`Subscription::pull`] wakes with `None`.
    pub fn remove(&self, id: ListenerId) -> bool {
        let removed = self.lock().remove(id);
        if removed {
            tracing::debug!(listener = %id, "listener removed");
        }
        removed
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Offer `event` to every listener without blocking.
    ///
    /// Returns how many listeners accepted it.
    pub fn publish(&self, event: &RawEvent) -> usize {
        let snapshot: Vec<(ListenerId, SyncSender<RawEvent>)> = self
            .lock()
            .listeners
            .iter()
            .map(|(id, queue)| (*id, queue.tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(*event) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(listener = %id, "queue full, event dropped");
                }
                Err(TrySendError::Disconnected(_)) => gone.push(id),
            }
        }

        if !gone.is_empty() {
            let mut state = self.lock();
            for id in gone {
                state.remove(id);
                tracing::debug!(listener = %id, "listener went away");
            }
        }
        delivered
    }

    /// Drive the bus from `reader` until the stream ends or fails.
    ///
    /// The bus is closed on return either way, which ends every listener's iterator once
    /// its queue is drained.
    pub fn run<R: Read>(&self, reader: &mut EventReader<R>) -> Result<()> {
        let result = loop {
            match reader.read_next() {
                Ok(Some(event)) => {
                    self.publish(&event);
                }
                Ok(None) => {
                    tracing::info!("input device reached end of stream");
                    break Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "dispatch loop stopped");
                    break Err(e);
                }
            }
        };
        self.close();
        result
    }

    /// Refuse new listeners and let existing ones drain what they already hold.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let count = state.listeners.len();
        state.listeners.clear();
        tracing::debug!(listeners = count, "event bus closed");
    }
}

/// One listener's view of the bus.
///
/// Iterating blocks for each event and ends when the listener is removed or the bus is
/// closed. Dropping the subscription removes the listener.
pub struct Subscription {
    id: ListenerId,
    rx: Receiver<RawEvent>,
    removed: Arc<AtomicBool>,
    bus: Weak<Mutex<BusState>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the listener has been removed from the bus.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    // A removed queue may still hold events, including ones a concurrent publish slipped
    // in after removal; none of them are handed out.
    fn live(&self, event: RawEvent) -> Option<RawEvent> {
        (!self.is_removed()).then_some(event)
    }

    /// Block until the next event, or `None` once the listener was removed.
    pub fn pull(&self) -> Option<RawEvent> {
        if self.is_removed() {
            return None;
        }
        self.rx.recv().ok().and_then(|event| self.live(event))
    }

    /// Next queued event without blocking.
    pub fn try_pull(&self) -> Option<RawEvent> {
        match self.rx.try_recv() {
            Ok(event) => self.live(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Like [`pull`](Self::pull) with an upper bound on the wait.
    ///
    /// `Err(())` means the wait timed out; `Ok(None)` means the listener was removed.
    #[allow(clippy::result_unit_err)]
    pub fn pull_timeout(&self, timeout: Duration) -> Result<Option<RawEvent>, ()> {
        if self.is_removed() {
            return Ok(None);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(self.live(event)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(()),
        }
    }
}

impl Iterator for Subscription {
    type Item = RawEvent;

    fn next(&mut self) -> Option<RawEvent> {
        self.pull()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.bus.upgrade() {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EventCodec, RecordLayout};
    use crate::event::ROTATE;
    use std::io::Cursor;
    use std::thread;

    fn rotate(value: i32) -> RawEvent {
        RawEvent::untimed(ROTATE, 7, value)
    }

    #[test]
    fn every_listener_sees_every_event_in_order() {
        let bus = EventBus::new(8);
        let a = bus.subscribe();
        let b = bus.subscribe();
        for v in 0..3 {
            assert_eq!(bus.publish(&rotate(v)), 2);
        }
        let a: Vec<_> = std::iter::from_fn(|| a.try_pull()).map(|e| e.value).collect();
        let b: Vec<_> = std::iter::from_fn(|| b.try_pull()).map(|e| e.value).collect();
        assert_eq!(a, [0, 1, 2]);
        assert_eq!(b, [0, 1, 2]);
    }

    #[test]
    fn stalled_listener_keeps_oldest_and_drops_newest() {
        let bus = EventBus::new(5);
        let slow = bus.subscribe();
        let fast = bus.register(16);

        for v in 0..10 {
            bus.publish(&rotate(v));
        }

        let drained: Vec<_> = std::iter::from_fn(|| slow.try_pull()).map(|e| e.value).collect();
        assert_eq!(drained, [0, 1, 2, 3, 4]);
        // The other listener was not affected.
        assert_eq!(
            std::iter::from_fn(|| fast.try_pull()).count(),
            10
        );

        // Once drained, new events flow again.
        bus.publish(&rotate(42));
        assert_eq!(slow.try_pull().map(|e| e.value), Some(42));
    }

    #[test]
    fn removal_wakes_blocked_pull() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        let id = sub.id();
        let (done_tx, done_rx) = mpsc::channel();

        let waiter = thread::spawn(move || {
            let got = sub.pull();
            done_tx.send(got).unwrap();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(bus.remove(id));
        let got = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("pull stayed blocked after removal");
        assert_eq!(got, None);
        waiter.join().unwrap();
        assert!(!bus.remove(id));
    }

    #[test]
    fn removal_discards_queued_events() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        for v in 0..3 {
            bus.publish(&rotate(v));
        }
        assert!(bus.remove(sub.id()));
        assert!(sub.is_removed());
        assert_eq!(sub.try_pull(), None);
        assert_eq!(sub.pull(), None);
        assert_eq!(sub.pull_timeout(Duration::from_millis(10)), Ok(None));
    }

    #[test]
    fn removed_listener_handles_nothing_further() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        bus.publish(&rotate(1));
        assert_eq!(sub.next(), Some(rotate(1)));
        for v in 2..5 {
            bus.publish(&rotate(v));
        }
        bus.remove(sub.id());
        assert_eq!(sub.count(), 0);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        let _other = bus.subscribe();
        assert_eq!(bus.listener_count(), 2);
        drop(sub);
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.publish(&rotate(1)), 1);
    }

    #[test]
    fn pull_timeout_distinguishes_idle_from_removed() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        assert_eq!(sub.pull_timeout(Duration::from_millis(10)), Err(()));
        bus.publish(&rotate(3));
        assert_eq!(
            sub.pull_timeout(Duration::from_millis(10)),
            Ok(Some(rotate(3)))
        );
        bus.remove(sub.id());
        assert_eq!(sub.pull_timeout(Duration::from_millis(10)), Ok(None));
    }

    #[test]
    fn run_delivers_stream_then_ends_listeners() {
        let codec = EventCodec::new(RecordLayout::LONG64);
        let mut bytes = Vec::new();
        for v in 1..=3 {
            codec.encode_into(&rotate(v), &mut bytes);
        }
        let mut reader = EventReader::new(Cursor::new(bytes), codec);

        let bus = EventBus::new(8);
        let sub = bus.subscribe();
        bus.run(&mut reader).unwrap();

        assert!(bus.is_closed());
        let values: Vec<_> = sub.map(|e| e.value).collect();
        assert_eq!(values, [1, 2, 3]);
    }

    #[test]
    fn run_error_is_returned_and_closes_bus() {
        let codec = EventCodec::new(RecordLayout::LONG64);
        let mut reader = EventReader::new(Cursor::new(vec![0u8; 30]), codec);

        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        let err = bus.run(&mut reader).unwrap_err();
        assert!(err.is_fatal());
        // The one complete record was still delivered before the failure.
        assert_eq!(sub.next(), Some(RawEvent::default()));
        assert_eq!(sub.next(), None);
    }

    #[test]
    fn register_after_close_ends_immediately() {
        let bus = EventBus::default();
        bus.close();
        let mut sub = bus.subscribe();
        assert_eq!(sub.next(), None);
        assert_eq!(bus.listener_count(), 0);
    }
}
