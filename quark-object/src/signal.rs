//! Multi-subscriber event sources.

use parking_lot::{Mutex, ReentrantMutex};
use quark_value::{ActionId, AnyValue, Signature};
use std::sync::Arc;

/// A callback registered on a signal.
pub type Subscriber = Arc<dyn Fn(&[AnyValue]) + Send + Sync>;

/// Local subscription id, unique within one signal.
pub type LocalLink = u32;

pub const INVALID_LOCAL_LINK: LocalLink = u32::MAX;

/// A subscription handle composing the id of the subscribed event with the
/// local link handed out by the signal: `(event << 32) | local`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SignalLink(u64);

impl SignalLink {
    pub const INVALID: SignalLink = SignalLink(u64::MAX);

    pub fn new(event: ActionId, local: LocalLink) -> Self {
        Self((u64::from(event.0) << 32) | u64::from(local))
    }

    pub fn event(self) -> ActionId {
        ActionId((self.0 >> 32) as u32)
    }

    pub fn local(self) -> LocalLink {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl From<u64> for SignalLink {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<SignalLink> for u64 {
    fn from(link: SignalLink) -> Self {
        link.0
    }
}

impl std::fmt::Display for SignalLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An event source that fans out to any number of subscribers.
///
/// Subscribers are invoked exactly once per trigger, in subscription order.
/// Concurrent triggers are serialized by a re-entrant guard, so a subscriber
/// may re-trigger the signal it is being notified from without deadlocking.
/// No threading is imposed on subscribers; one that needs a worker dispatches
/// to it on its own.
pub struct Signal {
    signature: Signature,
    subscribers: Mutex<SubscriberMap>,
    trigger_guard: ReentrantMutex<()>,
}

#[derive(Default)]
struct SubscriberMap {
    next_id: LocalLink,
    entries: Vec<(LocalLink, Subscriber)>,
}

impl Signal {
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            subscribers: Mutex::new(SubscriberMap {
                next_id: 1,
                entries: Vec::new(),
            }),
            trigger_guard: ReentrantMutex::new(()),
        }
    }

    /// The signature of the parameters this signal is triggered with.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Registers a subscriber and returns its local link.
    pub fn connect(&self, subscriber: Subscriber) -> LocalLink {
        let mut subscribers = self.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id = match subscribers.next_id.wrapping_add(1) {
            INVALID_LOCAL_LINK => 1,
            next => next,
        };
        subscribers.entries.push((id, subscriber));
        id
    }

    /// Removes a subscription. Returns whether the link was known.
    pub fn disconnect(&self, link: LocalLink) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.entries.len();
        subscribers.entries.retain(|(id, _subscriber)| *id != link);
        subscribers.entries.len() != before
    }

    /// Removes every subscription.
    pub fn disconnect_all(&self) {
        self.subscribers.lock().entries.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }

    /// Invokes all current subscribers with `params`.
    pub fn trigger(&self, params: &[AnyValue]) {
        let _ordering = self.trigger_guard.lock();
        // Invoke outside of the subscriber lock so that subscribers can
        // connect and disconnect while the fan-out runs.
        let snapshot: Vec<Subscriber> = self
            .subscribers
            .lock()
            .entries
            .iter()
            .map(|(_id, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in snapshot {
            subscriber(params);
        }
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("signature", &self.signature)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
