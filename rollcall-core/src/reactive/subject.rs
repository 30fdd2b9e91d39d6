//! Typed event subject
//!
//! A minimal observer: listeners register a callback and get a [`ListenerId`]
//! back to detach with. Emission snapshots the listener list first, so a
//! listener may subscribe or unsubscribe while being notified.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`Subject::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct SubjectInner<E> {
    listeners: RwLock<Vec<(ListenerId, Listener<E>)>>,
    next_id: AtomicU64,
}

/// Multi-listener event channel
///
/// Cloning a subject yields another handle to the same listener list.
pub struct Subject<E> {
    inner: Arc<SubjectInner<E>>,
}

impl<E> Clone for Subject<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E> Default for Subject<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subject<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject").field("listeners", &self.listener_count()).finish()
    }
}

impl<E> Subject<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Detach a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Notify every listener registered at the time of the call
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let subject = Subject::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        subject.subscribe(move |v| a.lock().unwrap().push(("a", *v)));
        let b = Arc::clone(&seen);
        subject.subscribe(move |v| b.lock().unwrap().push(("b", *v)));

        subject.emit(&7);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let subject = Subject::<()>::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let id = subject.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        subject.emit(&());
        assert!(subject.unsubscribe(id));
        assert!(!subject.unsubscribe(id));
        subject.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(subject.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let subject = Subject::<()>::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let inner_subject = subject.clone();
        let inner_slot = Arc::clone(&slot);
        let id = subject.subscribe(move |_| {
            if let Some(id) = inner_slot.lock().unwrap().take() {
                inner_subject.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        subject.emit(&());
        assert_eq!(subject.listener_count(), 0);
    }
}
