//! Typed event bus
//!
//! Handlers run synchronously on the publisher's thread, in subscription
//! order. A handler that needs UI work hands it to a scheduler or to the UI
//! thread; it must not assume it runs there.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

struct BusInner<E> {
    /// subscription id -> handler, ordered by subscription time
    handlers: RwLock<BTreeMap<u64, Handler<E>>>,
    next_id: AtomicU64,
}

impl<E> BusInner<E> {
    fn remove(&self, id: u64) -> bool {
        self.handlers.write().remove(&id).is_some()
    }
}

/// Fan-out of events of type `E` to registered handlers
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventBus<E> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a handler for every event
    ///
    /// The handler stays registered until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.handlers.write().insert(id, Arc::new(handler));
        trace!(sub_id = id, "subscribed");

        let weak: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            remove: Some(Box::new(move |id| {
                weak.upgrade().map(|inner| inner.remove(id)).unwrap_or(false)
            })),
        }
    }

    /// Register a handler for events accepted by `filter`
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_filtered<P, F>(&self, filter: P, handler: F) -> Subscription
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if filter(event) {
                handler(event);
            }
        })
    }

    /// Receive events through a channel instead of a callback
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_channel(&self) -> (Subscription, Receiver<E>)
    where
        E: Clone + Send,
    {
        let (tx, rx): (Sender<E>, Receiver<E>) = crossbeam_channel::unbounded();
        let subscription = self.subscribe(move |event: &E| {
            if tx.send(event.clone()).is_err() {
                trace!("channel subscriber dropped its receiver");
            }
        });
        (subscription, rx)
    }

    /// Deliver `event` to every current subscriber
    ///
    /// Returns the number of handlers invoked. Handlers registered or removed
    /// while this call runs take effect from the next publish.
    pub fn publish(&self, event: &E) -> usize {
        let handlers: Vec<Handler<E>> = self.inner.handlers.read().values().cloned().collect();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().len()
    }
}

/// Guard for one registered handler
///
/// Dropping it unsubscribes. Tie it to the lifetime of the panel that owns
/// the handler.
pub struct Subscription {
    id: u64,
    remove: Option<Box<dyn FnOnce(u64) -> bool + Send + Sync>>,
}

impl Subscription {
    /// Subscription id, unique per bus
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unsubscribe explicitly
    ///
    /// Returns `false` if the bus no longer exists.
    pub fn unsubscribe(mut self) -> bool {
        self.detach()
    }

    fn detach(&mut self) -> bool {
        match self.remove.take() {
            Some(remove) => {
                let removed = remove(self.id);
                trace!(sub_id = self.id, removed, "unsubscribed");
                removed
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.remove.is_some())
            .finish()
    }
}
