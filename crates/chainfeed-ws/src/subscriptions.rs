//! Subscriber registry.
//!
//! Maps each [`EventName`] to an ordered list of handlers. Handlers are
//! compared by identity for removal, so keep the [`Handler`] you passed to
//! `subscribe` if you intend to `unsubscribe` it later.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chainfeed_core::{ErrorKind, EventName, FeedEvent};

/// Error a handler may return to report a failure.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&FeedEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&FeedEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers called.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Ordered, identity-keyed handler lists per event name.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    entries: Arc<Mutex<HashMap<EventName, Vec<Handler>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventName, Vec<Handler>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `handler` to the list for `name`.
    pub fn subscribe(&self, name: EventName, handler: Handler) {
        self.lock().entry(name).or_default().push(handler);
    }

    /// Remove every registration of this exact handler under `name`.
    /// Returns `true` if anything was removed.
    pub fn unsubscribe(&self, name: EventName, handler: &Handler) -> bool {
        let mut entries = self.lock();
        let Some(list) = entries.get_mut(&name) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !same_handler(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            entries.remove(&name);
        }
        removed
    }

    /// Invoke every handler registered for the event's name, in
    /// registration order. A failing handler is logged and skipped; it never
    /// stops the remaining handlers and never propagates to the caller.
    ///
    /// The list is snapshotted first, so handlers may subscribe or
    /// unsubscribe from inside a dispatch.
    pub fn dispatch(&self, event: &FeedEvent) -> DispatchReport {
        let name = event.name();
        let handlers: Vec<Handler> = self.lock().get(&name).cloned().unwrap_or_default();

        let mut report = DispatchReport::default();
        for (index, handler) in handlers.iter().enumerate() {
            report.invoked += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::error!(
                        kind = %ErrorKind::SubscriberFailure,
                        event = %name,
                        index,
                        error = %e,
                        "subscriber failed"
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    tracing::error!(
                        kind = %ErrorKind::SubscriberFailure,
                        event = %name,
                        index,
                        panic = panic_message(payload.as_ref()),
                        "subscriber panicked"
                    );
                }
            }
        }
        report
    }

    /// Number of handlers registered for `name`.
    pub fn len(&self, name: EventName) -> usize {
        self.lock().get(&name).map_or(0, Vec::len)
    }

    /// Returns `true` if no handler is registered for any event.
    pub fn is_empty(&self) -> bool {
        self.lock().values().all(Vec::is_empty)
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<EventName, usize> =
            self.lock().iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("SubscriberRegistry").field("handlers", &counts).finish()
    }
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
