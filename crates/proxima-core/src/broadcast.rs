//! Fan-out of server events to connected viewers.
//!
//! Every subscriber owns an unbounded queue. [`Broadcaster::publish`]
//! serializes an event once and pushes the frame to every queue without
//! looking at how far behind a subscriber is. A viewer that stops reading
//! keeps accumulating frames until it disconnects; there is no lagging,
//! dropping or replay.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::Result;
use crate::events::ServerEvent;

/// A serialized event ready for the wire.
pub type Frame = Arc<str>;

/// Identifies one connected viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// The receiving half handed to a viewer connection.
#[derive(Debug)]
pub struct Subscription {
    /// Subscriber id, for targeted replies and unsubscribe.
    pub id: SubscriberId,
    /// Frames in publish order.
    pub receiver: UnboundedReceiver<Frame>,
}

/// Publish/subscribe hub for [`ServerEvent`]s.
#[derive(Debug, Default)]
pub struct Broadcaster {
    next_id: u64,
    subscribers: Vec<(SubscriberId, UnboundedSender<Frame>)>,
}

impl Broadcaster {
    /// Create a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new viewer.
    pub fn subscribe(&mut self) -> Subscription {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push((id, sender));
        Subscription { id, receiver }
    }

    /// Forget a viewer. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(subscriber, _)| *subscriber != id);
    }

    /// Send `event` to every subscriber. Returns how many received it.
    ///
    /// Subscribers whose receiver has been dropped are pruned.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized; nothing is sent.
    pub fn publish(&mut self, event: &ServerEvent) -> Result<usize> {
        let frame: Frame = Arc::from(event.to_json()?);
        self.subscribers
            .retain(|(_, sender)| sender.send(Arc::clone(&frame)).is_ok());
        tracing::trace!(
            event = event.name(),
            subscribers = self.subscribers.len(),
            "Published event"
        );
        Ok(self.subscribers.len())
    }

    /// Send `event` to one subscriber only. Returns `false` if it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn send_to(&mut self, id: SubscriberId, event: &ServerEvent) -> Result<bool> {
        let frame: Frame = Arc::from(event.to_json()?);
        let Some(position) = self
            .subscribers
            .iter()
            .position(|(subscriber, _)| *subscriber == id)
        else {
            return Ok(false);
        };

        if self.subscribers[position].1.send(frame).is_ok() {
            Ok(true)
        } else {
            self.subscribers.remove(position);
            Ok(false)
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drop every subscriber; their receivers see the queue close.
    pub fn close_all(&mut self) {
        self.subscribers.clear();
    }
}
