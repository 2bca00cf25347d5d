//! Client-side permission cache.
//!
//! One [`PermissionCache`] per signed-in session. The first
//! [`ensure_loaded`](PermissionCache::ensure_loaded) issues the only fetch;
//! every other caller waits on that same fetch. Queries afterwards are plain
//! lookups against the cached snapshot and never touch the network.
//!
//! Queries answer `false` while a fetch is outstanding and after a failed
//! one. Each fetch cycle gets a sequence number and only a response newer
//! than the last applied one replaces the snapshot, so when a refresh races
//! an earlier fetch the most recently issued one wins.
//!
//! The fetch itself runs on its own task. Dropping a caller's future (a
//! timeout, `select!`, an aborted handle) leaves that task to settle the
//! cycle, so `loading` always clears once the fetcher returns.

use std::sync::Arc;

use tokio::sync::{watch, OnceCell};
use uuid::Uuid;

use super::fetcher::PermissionFetcher;
use crate::authz::{Permission, PermissionsResponse, ProjectRole, ResolvedPermissionSnapshot, Role};

/// Everything an observer sees. Replaced as a whole on every change.
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    pub snapshot: Option<Arc<ResolvedPermissionSnapshot>>,
    pub loading: bool,
    pub error: Option<String>,
    issued: u64,
    applied: u64,
}

impl CacheState {
    /// The snapshot queries may read. `None` while loading or after a failure.
    pub fn ready(&self) -> Option<&ResolvedPermissionSnapshot> {
        if self.loading {
            return None;
        }
        self.snapshot.as_deref()
    }
}

struct Inner {
    fetcher: Arc<dyn PermissionFetcher>,
    state: watch::Sender<CacheState>,
    initial: OnceCell<()>,
}

#[derive(Clone)]
pub struct PermissionCache {
    inner: Arc<Inner>,
}

impl PermissionCache {
    pub fn new(fetcher: Arc<dyn PermissionFetcher>) -> Self {
        let (state, _) = watch::channel(CacheState::default());
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state,
                initial: OnceCell::new(),
            }),
        }
    }

    /// Load once, then wait until no fetch is outstanding. Concurrent and
    /// later callers share the first fetch, whether it came from here or from
    /// [`refresh_permissions`](Self::refresh_permissions).
    pub async fn ensure_loaded(&self) {
        self.inner.initial.get_or_init(|| self.run_cycle()).await;

        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, so the channel cannot close under us.
        let _ = rx.wait_for(|state| !state.loading).await;
    }

    /// Start the initial load in the background.
    pub fn spawn_load(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move { cache.ensure_loaded().await })
    }

    /// Fetch again and swap in the result. Does not cancel a fetch already in flight.
    pub async fn refresh_permissions(&self) {
        // A refresh counts as the initial load if none has started.
        let _ = self.inner.initial.set(());
        self.run_cycle().await;
    }

    pub fn subscribe(&self) -> watch::Receiver<CacheState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> CacheState {
        self.inner.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn has_permission(&self, permission: Permission, project_id: Option<Uuid>) -> bool {
        self.read(|snapshot| snapshot.has_permission(permission, project_id))
    }

    pub fn has_any_permission(&self, permissions: &[Permission], project_id: Option<Uuid>) -> bool {
        self.read(|snapshot| snapshot.has_any_permission(permissions, project_id))
    }

    pub fn has_all_permissions(&self, permissions: &[Permission], project_id: Option<Uuid>) -> bool {
        self.read(|snapshot| snapshot.has_all_permissions(permissions, project_id))
    }

    pub fn can_access_project(&self, project_id: Uuid) -> bool {
        self.read(|snapshot| snapshot.can_access_project(project_id))
    }

    pub fn can_manage_project(&self, project_id: Uuid) -> bool {
        self.read(|snapshot| snapshot.can_manage_project(project_id))
    }

    pub fn user_role(&self) -> Option<Role> {
        self.inner.state.borrow().ready().and_then(|snapshot| snapshot.global_role)
    }

    pub fn project_role(&self, project_id: Uuid) -> Option<ProjectRole> {
        self.inner
            .state
            .borrow()
            .ready()
            .and_then(|snapshot| snapshot.project_role(project_id))
    }

    fn read(&self, query: impl FnOnce(&ResolvedPermissionSnapshot) -> bool) -> bool {
        self.inner.state.borrow().ready().map(query).unwrap_or(false)
    }

    async fn run_cycle(&self) {
        let seq = self.inner.issue();
        tracing::debug!(seq, "fetching permissions");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.fetcher.fetch().await.map_err(|err| err.to_string());
            inner.apply(seq, result);
        });

        if let Err(err) = task.await {
            self.inner.apply(seq, Err(format!("permission fetch task failed: {err}")));
        }
    }
}

impl Inner {
    fn issue(&self) -> u64 {
        let mut seq = 0;
        self.state.send_modify(|state| {
            state.issued += 1;
            seq = state.issued;
            state.loading = true;
        });
        seq
    }

    fn apply(&self, seq: u64, result: Result<PermissionsResponse, String>) {
        let result = result.map(|response| {
            // The client never needs its own id; the snapshot is only queried.
            let (snapshot, unknown) = response.into_snapshot(Uuid::nil());
            if !unknown.is_empty() {
                tracing::warn!(?unknown, "ignoring unknown names in permission payload");
            }
            Arc::new(snapshot)
        });

        self.state.send_modify(|state| {
            if seq <= state.applied {
                tracing::debug!(seq, applied = state.applied, "discarding superseded permission fetch");
                return;
            }
            state.applied = seq;
            state.loading = state.issued != seq;

            match result {
                Ok(snapshot) => {
                    state.snapshot = Some(snapshot);
                    state.error = None;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "permission fetch failed");
                    state.snapshot = None;
                    state.error = Some(err);
                }
            }
        });
    }
}
