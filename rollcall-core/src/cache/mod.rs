//! Permission set cache
//!
//! Holds the permissions and roles of the active principal, loaded from a
//! [`PermissionDirectory`]. Readers get an immutable [`PermissionSnapshot`];
//! every change replaces the snapshot and is announced through a
//! [`Subject<CacheEvent>`].
//!
//! Loads are tagged with the cache epoch they started in. [`PermissionCache::reset`]
//! bumps the epoch, so a load that settles after a logout or a principal
//! switch is discarded instead of repopulating the cache.

mod snapshot;

pub use snapshot::{GrantedAccess, PermissionSnapshot};

use crate::rbac::{DirectoryError, DirectoryGrant, PermissionDirectory};
use crate::reactive::{ListenerId, Subject};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Failure of a cache load
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("Permission load timed out after {0:?}")]
    TimedOut(Duration),
    /// The cache was reset while the load was in flight
    #[error("Permission load discarded by a reset")]
    Discarded,
}

/// Change notifications emitted by [`PermissionCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Loaded,
    LoadFailed,
    LoadingChanged(bool),
    Reset,
    Primed,
    ErrorCleared,
}

struct CacheState {
    snapshot: Arc<PermissionSnapshot>,
    epoch: u64,
    in_flight: usize,
}

struct CacheInner {
    directory: Arc<dyn PermissionDirectory>,
    state: RwLock<CacheState>,
    events: Subject<CacheEvent>,
}

/// Shared handle to the permission set of the active principal
#[derive(Clone)]
pub struct PermissionCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("PermissionCache")
            .field("epoch", &state.epoch)
            .field("in_flight", &state.in_flight)
            .field("snapshot", &state.snapshot)
            .finish()
    }
}

impl PermissionCache {
    pub fn new(directory: impl PermissionDirectory + 'static) -> Self {
        Self::with_directory(Arc::new(directory))
    }

    pub fn with_directory(directory: Arc<dyn PermissionDirectory>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                directory,
                state: RwLock::new(CacheState {
                    snapshot: Arc::new(PermissionSnapshot::empty()),
                    epoch: 0,
                    in_flight: 0,
                }),
                events: Subject::new(),
            }),
        }
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<PermissionSnapshot> {
        Arc::clone(&self.read().snapshot)
    }

    pub fn events(&self) -> &Subject<CacheEvent> {
        &self.inner.events
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Start a load for `principal_id`
    ///
    /// The cache is marked loading immediately. The directory is only
    /// called once the returned [`PendingLoad`] is run; dropping it
    /// unrun (or mid-flight) abandons the load.
    pub fn begin_load(&self, principal_id: impl Into<String>) -> PendingLoad {
        let principal_id = principal_id.into();
        let mut events = Vec::new();

        let epoch = {
            let mut state = self.write();
            state.in_flight += 1;
            if state.in_flight == 1 || state.snapshot.error.is_some() {
                let mut next = (*state.snapshot).clone();
                next.is_loading = true;
                next.error = None;
                state.snapshot = Arc::new(next);
                events.push(CacheEvent::LoadingChanged(true));
            }
            state.epoch
        };
        self.emit_all(&events);

        let load_id = Uuid::new_v4();
        log::debug!("Permission load {} started for principal {} (epoch {})", load_id, principal_id, epoch);

        PendingLoad { cache: self.clone(), principal_id, epoch, load_id, settled: false }
    }

    /// Fetch and install the permission set of `principal_id`
    pub async fn load(&self, principal_id: impl Into<String>) -> Result<(), LoadError> {
        self.begin_load(principal_id).run().await
    }

    /// [`load`](Self::load) bounded by `timeout`
    ///
    /// On timeout the load is abandoned and the loading flag cleared.
    pub async fn load_with_timeout(
        &self,
        principal_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<(), LoadError> {
        self.begin_load(principal_id).run_with_timeout(timeout).await
    }

    /// Install a grant directly, without asking the directory
    pub fn prime(&self, principal_id: impl Into<String>, grant: DirectoryGrant) {
        {
            let mut state = self.write();
            let mut next = PermissionSnapshot::with_access(GrantedAccess::from_grant(principal_id, grant));
            next.is_loading = state.in_flight > 0;
            state.snapshot = Arc::new(next);
        }
        self.inner.events.emit(&CacheEvent::Primed);
    }

    /// Empty the cache and invalidate every in-flight load
    pub fn reset(&self) {
        {
            let mut state = self.write();
            state.epoch += 1;
            state.in_flight = 0;
            state.snapshot = Arc::new(PermissionSnapshot::empty());
        }
        log::debug!("Permission cache reset");
        self.inner.events.emit(&CacheEvent::Reset);
    }

    /// Forget the last load error, keeping the permission set
    pub fn clear_error(&self) {
        let cleared = {
            let mut state = self.write();
            if state.snapshot.error.is_none() {
                false
            } else {
                let mut next = (*state.snapshot).clone();
                next.error = None;
                state.snapshot = Arc::new(next);
                true
            }
        };
        if cleared {
            self.inner.events.emit(&CacheEvent::ErrorCleared);
        }
    }

    fn settle(
        &self,
        epoch: u64,
        principal_id: &str,
        load_id: Uuid,
        result: Result<DirectoryGrant, DirectoryError>,
    ) -> Result<(), LoadError> {
        let mut events = Vec::new();

        let outcome = {
            let mut state = self.write();
            if state.epoch != epoch {
                log::debug!("Discarding stale permission load {} for principal {}", load_id, principal_id);
                return Err(LoadError::Discarded);
            }

            state.in_flight = state.in_flight.saturating_sub(1);
            let still_loading = state.in_flight > 0;

            let outcome = match result {
                Ok(grant) => {
                    let mut next =
                        PermissionSnapshot::with_access(GrantedAccess::from_grant(principal_id, grant));
                    next.is_loading = still_loading;
                    state.snapshot = Arc::new(next);
                    events.push(CacheEvent::Loaded);
                    Ok(())
                }
                Err(err) => {
                    let mut next = (*state.snapshot).clone();
                    next.is_loading = still_loading;
                    next.error = Some(err.to_string());
                    state.snapshot = Arc::new(next);
                    events.push(CacheEvent::LoadFailed);
                    Err(LoadError::Directory(err))
                }
            };
            if !still_loading {
                events.push(CacheEvent::LoadingChanged(false));
            }
            outcome
        };

        match &outcome {
            Ok(()) => log::debug!("Permission load {} settled for principal {}", load_id, principal_id),
            Err(err) => log::warn!("Permission load {} failed for principal {}: {}", load_id, principal_id, err),
        }
        self.emit_all(&events);
        outcome
    }

    fn abandon(&self, epoch: u64, load_id: Uuid) {
        let idle = {
            let mut state = self.write();
            if state.epoch != epoch || state.in_flight == 0 {
                return;
            }
            state.in_flight -= 1;
            if state.in_flight == 0 {
                let mut next = (*state.snapshot).clone();
                next.is_loading = false;
                state.snapshot = Arc::new(next);
                true
            } else {
                false
            }
        };
        log::debug!("Permission load {} abandoned", load_id);
        if idle {
            self.inner.events.emit(&CacheEvent::LoadingChanged(false));
        }
    }

    fn emit_all(&self, events: &[CacheEvent]) {
        for event in events {
            self.inner.events.emit(event);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A started load that has not settled yet
///
/// Dropping it before [`run`](Self::run) completes abandons the load.
#[must_use = "a pending load does nothing until it is run"]
pub struct PendingLoad {
    cache: PermissionCache,
    principal_id: String,
    epoch: u64,
    load_id: Uuid,
    settled: bool,
}

impl std::fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLoad")
            .field("principal_id", &self.principal_id)
            .field("epoch", &self.epoch)
            .field("load_id", &self.load_id)
            .finish()
    }
}

impl PendingLoad {
    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    /// Call the directory and install the result
    pub async fn run(mut self) -> Result<(), LoadError> {
        let result = self
            .cache
            .inner
            .directory
            .fetch_permissions_and_roles(&self.principal_id)
            .await;
        self.settled = true;
        self.cache.settle(self.epoch, &self.principal_id, self.load_id, result)
    }

    pub async fn run_with_timeout(self, timeout: Duration) -> Result<(), LoadError> {
        match tokio::time::timeout(timeout, self.run()).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Permission load timed out after {:?}", timeout);
                Err(LoadError::TimedOut(timeout))
            }
        }
    }
}

impl Drop for PendingLoad {
    fn drop(&mut self) {
        if !self.settled {
            self.cache.abandon(self.epoch, self.load_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{StaticDirectory, SystemRole};
    use crate::testing::ScriptedDirectory;
    use std::sync::Mutex;

    fn teacher_directory() -> StaticDirectory {
        StaticDirectory::with_system_roles().assign("u1", "teacher").assign("u2", "parent")
    }

    #[tokio::test]
    async fn test_load_installs_union_of_roles() {
        let cache = PermissionCache::new(teacher_directory());
        cache.load("u1").await.unwrap();

        let snapshot = cache.get();
        assert!(snapshot.contains_role("teacher"));
        assert!(snapshot.contains_permission("grades:create"));
        assert!(!snapshot.is_loading());
        assert!(snapshot.error().is_none());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_set() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Teacher);
        let cache = PermissionCache::new(directory.clone());
        cache.load("u1").await.unwrap();

        directory.fail_next(DirectoryError::Network("connection reset".into()));
        let err = cache.load("u1").await.unwrap_err();
        assert!(matches!(err, LoadError::Directory(DirectoryError::Network(_))));

        let snapshot = cache.get();
        assert!(snapshot.contains_role("teacher"));
        assert!(!snapshot.is_loading());
        assert_eq!(snapshot.error(), Some("Directory unreachable: connection reset"));
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_load() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Admin);
        let gate = directory.hold("u1");
        let cache = PermissionCache::new(directory);

        let pending = cache.begin_load("u1");
        assert!(cache.get().is_loading());
        let task = tokio::spawn(pending.run());
        tokio::task::yield_now().await;

        cache.reset();
        gate.notify_one();

        assert_eq!(task.await.unwrap(), Err(LoadError::Discarded));
        let snapshot = cache.get();
        assert!(snapshot.is_empty());
        assert!(!snapshot.is_loading());
    }

    #[tokio::test]
    async fn test_dropping_pending_load_clears_loading() {
        let cache = PermissionCache::new(teacher_directory());
        let pending = cache.begin_load("u1");
        assert!(cache.get().is_loading());

        drop(pending);
        assert!(!cache.get().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout_clears_loading() {
        let directory = ScriptedDirectory::new().with_grant("u1", SystemRole::Admin);
        let _gate = directory.hold("u1");
        let cache = PermissionCache::new(directory);

        let err = cache.load_with_timeout("u1", Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, LoadError::TimedOut(Duration::from_millis(50)));
        assert!(!cache.get().is_loading());
    }

    #[tokio::test]
    async fn test_overlapping_loads_stay_loading_until_last() {
        let directory = ScriptedDirectory::new()
            .with_grant("u1", SystemRole::Teacher)
            .with_grant("u2", SystemRole::Parent);
        let gate = directory.hold("u1");
        let cache = PermissionCache::new(directory);

        let first = tokio::spawn(cache.begin_load("u1").run());
        tokio::task::yield_now().await;
        cache.load("u2").await.unwrap();
        assert!(cache.get().is_loading());
        assert!(cache.get().contains_role("parent"));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!cache.get().is_loading());
        assert!(cache.get().contains_role("teacher"));
    }

    #[tokio::test]
    async fn test_events_follow_load_lifecycle() {
        let cache = PermissionCache::new(teacher_directory());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        cache.subscribe(move |event| sink.lock().unwrap().push(*event));

        cache.load("u1").await.unwrap();
        cache.reset();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                CacheEvent::LoadingChanged(true),
                CacheEvent::Loaded,
                CacheEvent::LoadingChanged(false),
                CacheEvent::Reset,
            ]
        );
    }

    #[test]
    fn test_prime_and_clear_error() {
        let cache = PermissionCache::new(teacher_directory());
        cache.prime("u9", DirectoryGrant::from_roles(vec![SystemRole::Student.to_role()]));
        assert!(cache.get().contains_role("student"));
        assert_eq!(cache.get().principal_id(), Some("u9"));

        cache.clear_error();
        assert!(cache.get().error().is_none());
    }
}
