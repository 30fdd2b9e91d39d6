//! Derived-value subscriptions
//!
//! A subscription recomputes a value from a fresh [`Evaluator`] whenever the
//! session or the permission cache changes, and calls back only when the
//! value actually differs from the last one delivered.

use super::subject::{ListenerId, Subject};
use crate::access::AccessControl;
use crate::cache::CacheEvent;
use crate::rbac::Evaluator;
use crate::session::SessionEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Live link between a computation and its change sources
///
/// Detaches on [`unsubscribe`](Self::unsubscribe) or when dropped. Once
/// detached, no further callback is delivered, even one already queued
/// behind an in-progress emission.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    active: Arc<AtomicBool>,
    session_events: Subject<SessionEvent>,
    session_listener: ListenerId,
    cache_events: Subject<CacheEvent>,
    cache_listener: ListenerId,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.is_active()).finish()
    }
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(self) {
        self.detach();
    }

    fn detach(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.session_events.unsubscribe(self.session_listener);
            self.cache_events.unsubscribe(self.cache_listener);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Delivery state shared by every emission of one subscription
struct Emitter<T> {
    /// Sequence number of the newest computation accepted
    seq: u64,
    delivered: Option<T>,
    pending: Option<T>,
    delivering: bool,
}

impl<T: PartialEq> Emitter<T> {
    /// Accept `value` unless a later computation already got in first.
    /// Returns `true` when the caller must drain.
    fn offer(&mut self, seq: u64, value: T) -> bool {
        if seq < self.seq {
            return false;
        }
        self.seq = seq;
        self.pending = Some(value);
        !std::mem::replace(&mut self.delivering, true)
    }

    /// Next value to deliver, or `None` once nothing new is pending
    fn next(&mut self) -> Option<T>
    where
        T: Clone,
    {
        if let Some(value) = self.pending.take() {
            if self.delivered.as_ref() != Some(&value) {
                self.delivered = Some(value.clone());
                return Some(value);
            }
        }
        self.delivering = false;
        None
    }
}

/// Watch `compute` and call `on_change` with each distinct result
///
/// `on_change` runs once immediately with the current value. Callbacks never
/// overlap, and a value computed before a newer one was accepted is dropped,
/// so the last callback always reflects the latest change. A callback may
/// itself change the session; the resulting value is delivered after it
/// returns.
pub fn watch<T, C, F>(access: &AccessControl, compute: C, on_change: F) -> Subscription
where
    T: PartialEq + Clone + Send + 'static,
    C: Fn(&Evaluator) -> T + Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let active = Arc::new(AtomicBool::new(true));
    let sequence = AtomicU64::new(0);
    let emitter: Mutex<Emitter<T>> =
        Mutex::new(Emitter { seq: 0, delivered: None, pending: None, delivering: false });
    let source = access.clone();
    let flag = Arc::clone(&active);

    let refresh: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        if !flag.load(Ordering::Acquire) {
            return;
        }
        let seq = sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let value = compute(&source.evaluator());

        let lock = || emitter.lock().unwrap_or_else(PoisonError::into_inner);
        if !lock().offer(seq, value) {
            return;
        }
        loop {
            let Some(value) = lock().next() else { break };
            if !flag.load(Ordering::Acquire) {
                continue;
            }
            on_change(&value);
        }
    });

    let on_session = Arc::clone(&refresh);
    let session_events = access.session().events().clone();
    let session_listener = session_events.subscribe(move |_| on_session());

    let on_cache = Arc::clone(&refresh);
    let cache_events = access.cache().events().clone();
    let cache_listener = cache_events.subscribe(move |_| on_cache());

    refresh();

    Subscription { active, session_events, session_listener, cache_events, cache_listener }
}

/// Watch `compute` through a `tokio::sync::watch` channel
pub fn watch_channel<T, C>(access: &AccessControl, compute: C) -> (Subscription, watch::Receiver<T>)
where
    T: PartialEq + Clone + Send + Sync + 'static,
    C: Fn(&Evaluator) -> T + Send + Sync + 'static,
{
    let compute = Arc::new(compute);
    let (tx, rx) = watch::channel(compute(&access.evaluator()));
    let subscription = watch(access, move |ev| compute(ev), move |value: &T| {
        tx.send_if_modified(|current| {
            if current == value {
                false
            } else {
                *current = value.clone();
                true
            }
        });
    });
    (subscription, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{Requirement, SystemRole};
    use crate::session::{Credentials, Principal};
    use crate::testing::{ScriptedDirectory, ScriptedIdentity};
    use std::sync::atomic::AtomicUsize;

    fn access() -> AccessControl {
        let directory = ScriptedDirectory::new()
            .with_grant("u1", SystemRole::Teacher)
            .with_grant("u2", SystemRole::Parent);
        AccessControl::new(directory, ScriptedIdentity::new())
    }

    #[tokio::test]
    async fn test_watch_emits_initial_and_distinct_values() {
        let access = access();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = watch(&access, |ev| ev.has_permission("grades:create"), move |v| sink.lock().unwrap().push(*v));

        access
            .session()
            .complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();
        access.session().logout();

        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
        drop(sub);
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_callbacks() {
        let access = access();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = watch(&access, |ev| ev.is_authenticated(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        assert_eq!(access.session().events().listener_count(), 0);
        assert_eq!(access.cache().events().listener_count(), 0);

        access
            .session()
            .complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_stale_emission_does_not_overwrite_logout() {
        let access = access();
        access
            .session()
            .complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = watch(
            &access,
            |ev| {
                let allowed = ev.has_permission("grades:create");
                if std::thread::current().name() == Some("slow") {
                    std::thread::sleep(std::time::Duration::from_millis(200));
                }
                allowed
            },
            move |v| sink.lock().unwrap().push(*v),
        );

        let events = access.cache().events().clone();
        let slow = std::thread::Builder::new()
            .name("slow".to_string())
            .spawn(move || events.emit(&CacheEvent::Loaded))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        access.session().logout();
        slow.join().unwrap();

        assert!(!access.has_permission("grades:create"));
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_callback_may_change_the_session() {
        let access = access();
        access
            .session()
            .complete_authentication(Principal::new("u1", "u1@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let session = access.session().clone();
        let sub = watch(&access, |ev| ev.is_authenticated(), move |v| {
            sink.lock().unwrap().push(*v);
            if *v {
                session.logout();
            }
        });

        assert!(!access.session().is_authenticated());
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
        drop(sub);
    }

    #[tokio::test]
    async fn test_watch_channel_tracks_decisions() {
        let access = access();
        let requirement = Requirement::route("/students");
        let (_sub, mut rx) = watch_channel(&access, move |ev| ev.authorize(&requirement).allowed);
        assert!(!*rx.borrow());

        access
            .session()
            .complete_authentication(Principal::new("u2", "u2@school.test"), Credentials::new("t"))
            .run()
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }
}
