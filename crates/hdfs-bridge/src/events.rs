//! Change notification hook.
//!
//! The bridge publishes one [`FsEvent`] per affected top-level resource
//! after a create/write/delete/rename/copy succeeds. Downstream consumers
//! (tree views, caches) subscribe with NATS-style subject patterns:
//!
//! - `*` matches exactly one token: `fs.*` matches `fs.created`
//! - `>` matches one or more tokens (only at end): `fs.>`
//! - Exact match: `fs.deleted` only matches `fs.deleted`
//!
//! Delivery is best effort. A subscriber that falls behind skips events.

use std::time::Instant;

use tokio::sync::broadcast;

use crate::uri::ResourceId;

// ============================================================================
// Pattern Matching
// ============================================================================

/// True if `subject` matches `pattern`.
pub fn matches_pattern(pattern: &str, subject: &str) -> bool {
    let mut subject = subject.split('.');
    let mut pattern = pattern.split('.').peekable();
    while let Some(token) = pattern.next() {
        match (token, subject.next()) {
            // Tail wildcard; only valid as the last token.
            (">", Some(_)) => return pattern.peek().is_none(),
            ("*", Some(_)) => {}
            (t, Some(s)) if t == s => {}
            _ => return false,
        }
    }
    subject.next().is_none()
}

// ============================================================================
// Events
// ============================================================================

/// Coarse-grained change event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsEvent {
    /// A file or directory came into existence.
    Created(ResourceId),
    /// An existing file's content was replaced.
    Changed(ResourceId),
    /// A file or directory was removed.
    Deleted(ResourceId),
}

impl FsEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            FsEvent::Created(_) => "fs.created",
            FsEvent::Changed(_) => "fs.changed",
            FsEvent::Deleted(_) => "fs.deleted",
        }
    }

    pub fn resource(&self) -> &ResourceId {
        match self {
            FsEvent::Created(id) | FsEvent::Changed(id) | FsEvent::Deleted(id) => id,
        }
    }
}

/// An event as delivered to subscribers.
#[derive(Clone, Debug)]
pub struct EventMessage {
    pub subject: &'static str,
    pub event: FsEvent,
    pub timestamp: Instant,
}

// ============================================================================
// EventBus
// ============================================================================

/// Broadcast channel for change events.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<EventMessage>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event. Returns the number of subscribers reached.
    pub fn publish(&self, event: FsEvent) -> usize {
        tracing::trace!(subject = event.subject(), resource = %event.resource(), "fs event");
        let msg = EventMessage {
            subject: event.subject(),
            event,
            timestamp: Instant::now(),
        };
        self.tx.send(msg).unwrap_or(0)
    }

    /// Subscribe to events whose subject matches `pattern`.
    pub fn subscribe(&self, pattern: &str) -> Subscription {
        Subscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
        }
    }

    /// Watch a resource for external changes.
    ///
    /// Remote change notification is not implemented; the handle never
    /// fires. Use [`EventBus::subscribe`] for changes made through the bridge.
    pub fn watch(&self, resource: &ResourceId) -> WatchHandle {
        WatchHandle {
            resource: resource.clone(),
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A pattern-filtered subscription.
pub struct Subscription {
    pattern: String,
    rx: broadcast::Receiver<EventMessage>,
}

impl Subscription {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Receive the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => {
                    if matches_pattern(&self.pattern, msg.subject) {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "fs event subscription lagged behind"
                    );
                }
            }
        }
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    if matches_pattern(&self.pattern, msg.subject) {
                        return Some(msg);
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "fs event subscription lagged behind"
                    );
                }
            }
        }
    }
}

/// Placeholder returned by [`EventBus::watch`].
#[derive(Debug)]
pub struct WatchHandle {
    resource: ResourceId,
}

impl WatchHandle {
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }
}
