//! Subscriber registry and fan-out

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::filter::EventFilter;

/// Per-delivery write deadline; a miss evicts the subscriber
pub const SUBSCRIBER_WRITE_DEADLINE: Duration = Duration::from_millis(100);

/// One registered subscriber
///
/// The hub owns the write half of the subscriber's socket; the connection
/// handler keeps the read half for the control protocol. All writes go
/// through [`send_line`](Self::send_line) so the deadline applies to the
/// acknowledgement and keepalive replies as well as deliveries.
#[derive(Debug)]
pub struct Subscriber {
    id: String,
    filter: EventFilter,
    sink: Mutex<OwnedWriteHalf>,
    cancel: CancellationToken,
}

impl Subscriber {
    /// The caller-supplied id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The filter this subscriber registered with
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Fires when the hub has discarded this subscriber
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Write `line` plus a newline under the subscriber write deadline
    pub async fn send_line(&self, line: &[u8]) -> io::Result<()> {
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.write_all(line).await?;
            sink.write_all(b"\n").await
        };
        match timeout(SUBSCRIBER_WRITE_DEADLINE, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "subscriber write deadline elapsed",
            )),
        }
    }
}

/// Counter snapshot for the stats line
#[derive(Debug, Clone, Copy, Default)]
pub struct HubSnapshot {
    /// Subscribers currently registered
    pub subscribers: usize,
    /// Events delivered to at least the filtering stage
    pub events_published: u64,
    /// Subscribe calls ever
    pub subscribes_total: u64,
}

/// The fan-out registry: id → subscriber
///
/// `publish` takes the read lock; membership changes take the write lock.
/// Ids are a single-holder resource: subscribing an id that is already
/// registered closes the previous holder first.
#[derive(Debug, Default)]
pub struct Hub {
    subscribers: RwLock<HashMap<String, Arc<Subscriber>>>,
    events_published: AtomicU64,
    subscribes_total: AtomicU64,
}

impl Hub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, displacing any existing holder of `id`
    pub fn subscribe(
        &self,
        id: impl Into<String>,
        sink: OwnedWriteHalf,
        filter: EventFilter,
    ) -> Arc<Subscriber> {
        let id = id.into();
        let subscriber = Arc::new(Subscriber {
            id: id.clone(),
            filter,
            sink: Mutex::new(sink),
            cancel: CancellationToken::new(),
        });

        let previous = {
            let mut map = self.subscribers.write();
            map.insert(id, Arc::clone(&subscriber))
        };
        self.subscribes_total.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) = previous {
            previous.cancel.cancel();
            debug!(id = %subscriber.id, "displaced previous subscriber with same id");
        }

        debug!(
            id = %subscriber.id,
            total = self.subscriber_count(),
            "subscriber registered"
        );
        subscriber
    }

    /// Remove by id; does nothing if the id is unknown
    pub fn unsubscribe(&self, id: &str) {
        let removed = self.subscribers.write().remove(id);
        if let Some(subscriber) = removed {
            subscriber.cancel.cancel();
            debug!(id, remaining = self.subscriber_count(), "subscriber removed");
        }
    }

    /// Remove a specific registration
    ///
    /// A no-op on the map when `subscriber` has already been displaced by
    /// a newer holder of the same id, so a stale handler can never tear
    /// down its replacement.
    pub fn remove(&self, subscriber: &Arc<Subscriber>) {
        {
            let mut map = self.subscribers.write();
            if map
                .get(&subscriber.id)
                .is_some_and(|current| Arc::ptr_eq(current, subscriber))
            {
                map.remove(&subscriber.id);
            }
        }
        subscriber.cancel.cancel();
    }

    /// Deliver one record to every matching subscriber
    ///
    /// The record is parsed once; an unparsable record is delivered to no
    /// one and leaves the publish counter unchanged. Failed or timed-out
    /// writes evict the subscriber after the delivery pass.
    pub async fn publish(&self, payload: &[u8]) {
        let targets: Vec<Arc<Subscriber>> = {
            let map = self.subscribers.read();
            if map.is_empty() {
                return;
            }
            map.values().cloned().collect()
        };

        let event: Value = match serde_json::from_slice(payload) {
            Ok(value @ Value::Object(_)) => value,
            _ => {
                debug!("unparsable record, publishing to no one");
                return;
            }
        };

        let mut dead = Vec::new();
        for subscriber in targets {
            if !subscriber.filter.matches(&event) {
                continue;
            }
            match subscriber.send_line(payload).await {
                Ok(()) => trace!(id = %subscriber.id, "delivered event"),
                Err(e) => {
                    debug!(id = %subscriber.id, error = %e, "evicting subscriber");
                    dead.push(subscriber);
                }
            }
        }

        for subscriber in dead {
            self.remove(&subscriber);
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Subscribers currently registered
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Cancel and drop every subscriber (shutdown path)
    pub fn close_all(&self) {
        let drained: Vec<_> = {
            let mut map = self.subscribers.write();
            map.drain().map(|(_, subscriber)| subscriber).collect()
        };
        for subscriber in &drained {
            subscriber.cancel.cancel();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "closed all subscribers");
        }
    }

    /// Counters for the stats report
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            subscribers: self.subscriber_count(),
            events_published: self.events_published.load(Ordering::Relaxed),
            subscribes_total: self.subscribes_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
