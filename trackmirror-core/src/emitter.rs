//! Named-event emitter held by composition

use crate::track::ListenerId;
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// An event that can be dispatched by name
pub trait NamedEvent: Clone + Send + 'static {
    /// Event name listeners register against
    fn name(&self) -> &'static str;
}

/// Callback invoked for each matching emission
pub type EventCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registration<E> {
    id: ListenerId,
    /// `None` matches every event
    name: Option<&'static str>,
    once: bool,
    callback: EventCallback<E>,
}

/// Emissions waiting behind the one being dispatched
struct DispatchQueue<E> {
    dispatching: bool,
    pending: VecDeque<E>,
}

/// Register-by-name, emit-by-name event dispatcher.
///
/// Callbacks run synchronously in registration order, then channel
/// subscribers receive the event. An `emit` issued while another emission is
/// being dispatched (from a callback, or from another thread) is queued and
/// delivered once the current one completes, so every callback and
/// subscriber observes events in the same order.
pub struct EventEmitter<E: NamedEvent> {
    listeners: RwLock<Vec<Registration<E>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<E>>>,
    queue: Mutex<DispatchQueue<E>>,
}

impl<E: NamedEvent> EventEmitter<E> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            queue: Mutex::new(DispatchQueue {
                dispatching: false,
                pending: VecDeque::new(),
            }),
        }
    }

    /// Invoke `callback` for every event named `name`
    pub fn on<F>(&self, name: &'static str, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(Some(name), false, Arc::new(callback))
    }

    /// Invoke `callback` for the next event named `name` only
    pub fn once<F>(&self, name: &'static str, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(Some(name), true, Arc::new(callback))
    }

    /// Invoke `callback` for every event
    pub fn on_any<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(None, false, Arc::new(callback))
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Number of callbacks that an event named `name` would reach
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|registration| registration.name.map_or(true, |n| n == name))
            .count()
    }

    /// Remove every callback. Channel subscribers are kept.
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    /// Open a channel that receives every event emitted from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.push(tx);
        rx
    }

    /// Number of open channel subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Dispatch `event`.
    ///
    /// Returns how many callbacks and subscribers this call delivered to,
    /// including events queued by callbacks while it ran. An event queued
    /// behind an emission already in progress returns 0 here and is counted
    /// by the call that drains it.
    pub fn emit(&self, event: E) -> usize {
        {
            let name = event.name();
            let mut queue = self.queue.lock();
            queue.pending.push_back(event);
            if queue.dispatching {
                debug!("📡 Queued '{}' behind the current emission", name);
                return 0;
            }
            queue.dispatching = true;
        }

        let drain = DrainGuard::new(&self.queue);
        let mut delivered = 0;
        while let Some(event) = drain.pop() {
            delivered += self.dispatch(event);
        }
        delivered
    }

    fn dispatch(&self, event: E) -> usize {
        let name = event.name();
        let callbacks: Vec<EventCallback<E>> = {
            let mut listeners = self.listeners.write();
            let matching: Vec<EventCallback<E>> = listeners
                .iter()
                .filter(|registration| registration.name.map_or(true, |n| n == name))
                .map(|registration| Arc::clone(&registration.callback))
                .collect();
            listeners.retain(|registration| {
                !(registration.once && registration.name.map_or(true, |n| n == name))
            });
            matching
        };

        for callback in &callbacks {
            callback(&event);
        }

        let delivered = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            subscribers.len()
        };

        debug!(
            "📡 Emitted '{}' to {} callbacks and {} subscribers",
            name,
            callbacks.len(),
            delivered
        );
        callbacks.len() + delivered
    }

    fn register(
        &self,
        name: Option<&'static str>,
        once: bool,
        callback: EventCallback<E>,
    ) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.write().push(Registration {
            id,
            name,
            once,
            callback,
        });
        id
    }
}

/// Pops queued events for the dispatching call. Dropped before the queue is
/// drained (a panicking callback), it discards the rest and hands dispatch
/// back to the next `emit`.
struct DrainGuard<'a, E> {
    queue: &'a Mutex<DispatchQueue<E>>,
    drained: Cell<bool>,
}

impl<'a, E> DrainGuard<'a, E> {
    fn new(queue: &'a Mutex<DispatchQueue<E>>) -> Self {
        Self {
            queue,
            drained: Cell::new(false),
        }
    }

    fn pop(&self) -> Option<E> {
        let mut queue = self.queue.lock();
        let event = queue.pending.pop_front();
        if event.is_none() {
            queue.dispatching = false;
            self.drained.set(true);
        }
        event
    }
}

impl<E> Drop for DrainGuard<'_, E> {
    fn drop(&mut self) {
        if !self.drained.get() {
            let mut queue = self.queue.lock();
            queue.dispatching = false;
            queue.pending.clear();
        }
    }
}

impl<E: NamedEvent> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: NamedEvent> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.read().len())
            .field("subscribers", &self.subscribers.lock().len())
            .field("pending", &self.queue.lock().pending.len())
            .finish()
    }
}
