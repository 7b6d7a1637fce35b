//! Latest-value publish/subscribe channel.
//!
//! RULE: every reactive surface in the core is a `Feed`. A feed replays
//! its latest value to new subscribers, pushes synchronously on
//! publish, and unregisters subscribers synchronously on cancellation,
//! so a cancelled subscriber costs nothing on later publishes.
//!
//! Two subscription flavors:
//!   - `attach`    — a callback sink, invoked on the publisher's call
//!                   stack. Used for internal wiring.
//!   - `subscribe` — a channel endpoint for external consumers that
//!                   want to await the next value.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

pub type SubscriberId = u64;

type Sink<T> = Box<dyn FnMut(&T) + Send>;

struct FeedState<T> {
    next_id:  SubscriberId,
    latest:   Option<T>,
    sinks:    Vec<(SubscriberId, Arc<Mutex<Sink<T>>>)>,
    channels: Vec<(SubscriberId, Sender<T>)>,
}

pub struct Feed<T> {
    state: Arc<Mutex<FeedState<T>>>,
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<T> Default for Feed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Feed<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                next_id:  0,
                latest:   None,
                sinks:    Vec::new(),
                channels: Vec::new(),
            })),
        }
    }

    /// Number of live subscribers (both flavors). Exposed for tests and
    /// tooling that assert cancellation really unregistered.
    pub fn subscriber_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.sinks.len() + state.channels.len()
    }
}

impl<T: Clone + Send + 'static> Feed<T> {
    /// Push a value to every subscriber and store it as the latest.
    ///
    /// Sinks run on this call stack, but the registry lock is released
    /// first: a sink may attach/cancel/subscribe on this same feed.
    pub fn publish(&self, value: T) {
        let (sinks, channels) = {
            let mut state = self.state.lock().unwrap();
            state.latest = Some(value.clone());
            (state.sinks.clone(), state.channels.clone())
        };

        for (_, sink) in &sinks {
            (*sink.lock().unwrap())(&value);
        }

        let mut dead = Vec::new();
        for (id, tx) in &channels {
            if tx.send(value.clone()).is_err() {
                dead.push(*id);
            }
        }
        if !dead.is_empty() {
            let mut state = self.state.lock().unwrap();
            state.channels.retain(|(id, _)| !dead.contains(id));
        }
    }

    /// Current value, if one has ever been published.
    pub fn latest(&self) -> Option<T> {
        self.state.lock().unwrap().latest.clone()
    }

    /// Register a callback sink. The latest value, if any, is replayed
    /// into the sink before this returns.
    pub fn attach(&self, sink: impl FnMut(&T) + Send + 'static) -> SinkHandle<T> {
        let shared: Arc<Mutex<Sink<T>>> = Arc::new(Mutex::new(Box::new(sink)));
        let (id, latest) = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.sinks.push((id, Arc::clone(&shared)));
            (id, state.latest.clone())
        };
        if let Some(value) = latest {
            (*shared.lock().unwrap())(&value);
        }
        SinkHandle { id, state: Arc::downgrade(&self.state) }
    }

    /// Open a channel endpoint. The latest value, if any, is queued
    /// before this returns, so a fresh subscriber always starts from
    /// the current state.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = channel();
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            if let Some(value) = &state.latest {
                let _ = tx.send(value.clone());
            }
            state.channels.push((id, tx));
            id
        };
        Subscription { id, rx, state: Arc::downgrade(&self.state) }
    }
}

/// Cancellation token for an attached callback sink. Dropping it
/// unregisters the sink synchronously.
pub struct SinkHandle<T> {
    id:    SubscriberId,
    state: Weak<Mutex<FeedState<T>>>,
}

impl<T> SinkHandle<T> {
    pub fn cancel(&self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().unwrap().sinks.retain(|(id, _)| *id != self.id);
        }
    }
}

impl<T> Drop for SinkHandle<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Channel endpoint of a feed. Dropping it unregisters the subscriber
/// synchronously; already-queued values are discarded with it.
pub struct Subscription<T> {
    id:    SubscriberId,
    rx:    Receiver<T>,
    state: Weak<Mutex<FeedState<T>>>,
}

impl<T> Subscription<T> {
    /// Block until the next value is pushed. `None` once the feed is
    /// gone and the queue is drained.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Next value if one is already queued.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued and return the newest value, if any.
    pub fn drain(&self) -> Option<T> {
        let mut newest = None;
        while let Some(value) = self.try_recv() {
            newest = Some(value);
        }
        newest
    }

    pub fn cancel(&self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().unwrap().channels.retain(|(id, _)| *id != self.id);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
