//! Tenant connection registry with keyed single-flight establishment.
//!
//! Maps a tenant id to its isolated backing-store handle. Handles are created
//! lazily on first use and cached for the life of the process; there is no
//! idle eviction and no explicit close (a known limitation, preserved).
//!
//! ## Single-flight discipline
//!
//! Concurrent first-access calls for the same tenant must trigger exactly one
//! establishment attempt. The slot map holds either a ready handle or the
//! shared in-flight future; later callers for the same tenant await that same
//! future and observe its result, success or failure. A failed attempt
//! removes the pending slot so a later call may retry. The map lock is never
//! held across an await, so unrelated tenants never serialize behind each
//! other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use thiserror::Error;

use orderflow_core::TenantId;

use crate::store::TenantHandle;

/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The tenant id was unusable for store establishment.
    #[error("Tenant ID is required")]
    InvalidTenant,

    /// The tenant store could not be reached within the timeout. The tenant
    /// is not cached; a later call retries establishment.
    #[error("tenant store unavailable: {0}")]
    Unavailable(String),
}

/// Establishes a backing-store handle for one tenant.
///
/// Injected into the registry so production uses Postgres while tests use
/// counting/failing doubles.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, tenant_id: &TenantId) -> Result<TenantHandle, RegistryError>;
}

type ConnectFuture = Shared<BoxFuture<'static, Result<TenantHandle, RegistryError>>>;

enum Slot {
    Ready(TenantHandle),
    Pending(ConnectFuture),
}

/// Process-wide tenant → store-handle cache.
pub struct TenantRegistry {
    connector: Arc<dyn StoreConnector>,
    connect_timeout: Duration,
    slots: Mutex<HashMap<TenantId, Slot>>,
}

impl TenantRegistry {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self::with_timeout(connector, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeout(connector: Arc<dyn StoreConnector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached handle for `tenant_id`, establishing it on first
    /// access. Concurrent first-access callers share one attempt.
    pub async fn get_or_create(&self, tenant_id: &TenantId) -> Result<TenantHandle, RegistryError> {
        let attempt = {
            let mut slots = self.slots.lock().expect("registry slot map poisoned");
            match slots.get(tenant_id) {
                Some(Slot::Ready(handle)) => return Ok(handle.clone()),
                Some(Slot::Pending(fut)) => fut.clone(),
                None => {
                    let fut = self.connect_future(tenant_id.clone());
                    slots.insert(tenant_id.clone(), Slot::Pending(fut.clone()));
                    fut
                }
            }
        };

        let result = attempt.clone().await;
        self.settle(tenant_id, &attempt, &result);
        result
    }

    /// Number of established (ready) handles; pending attempts don't count.
    pub fn established(&self) -> usize {
        let slots = self.slots.lock().expect("registry slot map poisoned");
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    fn connect_future(&self, tenant_id: TenantId) -> ConnectFuture {
        let connector = Arc::clone(&self.connector);
        let connect_timeout = self.connect_timeout;
        async move {
            match tokio::time::timeout(connect_timeout, connector.connect(&tenant_id)).await {
                Ok(result) => result,
                Err(_) => Err(RegistryError::Unavailable(format!(
                    "establishment for tenant \"{tenant_id}\" timed out after {connect_timeout:?}"
                ))),
            }
        }
        .boxed()
        .shared()
    }

    /// Record the outcome of an attempt. Every awaiting caller settles; the
    /// pointer guard makes this idempotent and keeps a newer attempt from
    /// being clobbered by a stale result.
    fn settle(
        &self,
        tenant_id: &TenantId,
        attempt: &ConnectFuture,
        result: &Result<TenantHandle, RegistryError>,
    ) {
        let mut slots = self.slots.lock().expect("registry slot map poisoned");
        let current = matches!(
            slots.get(tenant_id),
            Some(Slot::Pending(fut)) if Shared::ptr_eq(fut, attempt)
        );
        if !current {
            return;
        }
        match result {
            Ok(handle) => {
                slots.insert(tenant_id.clone(), Slot::Ready(handle.clone()));
            }
            Err(_) => {
                slots.remove(tenant_id);
            }
        }
    }
}

impl core::fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("established", &self.established())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::store::in_memory::InMemoryTenantStore;

    /// Counts establishment attempts; optionally fails the first N or stalls.
    struct CountingConnector {
        attempts: AtomicUsize,
        fail_first: usize,
        delay: Duration,
    }

    impl CountingConnector {
        fn new(delay: Duration) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                fail_first: 0,
                delay,
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                fail_first: n,
                delay: Duration::from_millis(20),
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StoreConnector for CountingConnector {
        async fn connect(&self, _tenant_id: &TenantId) -> Result<TenantHandle, RegistryError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if attempt < self.fail_first {
                return Err(RegistryError::Unavailable("refused".to_string()));
            }
            Ok(Arc::new(InMemoryTenantStore::new()))
        }
    }

    fn tenant(s: &str) -> TenantId {
        TenantId::new(s).unwrap()
    }

    #[tokio::test]
    async fn concurrent_first_access_establishes_exactly_once() {
        let connector = Arc::new(CountingConnector::new(Duration::from_millis(50)));
        let registry = TenantRegistry::new(connector.clone());

        // join_all polls every call before any completes, so all eight
        // overlap the same in-flight attempt.
        let acme = tenant("acme");
        let calls = (0..8).map(|_| registry.get_or_create(&acme));
        let handles: Vec<_> = futures_util::future::join_all(calls)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(connector.attempts(), 1);
        for pair in handles.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[tokio::test]
    async fn repeat_access_reuses_the_cached_handle() {
        let connector = Arc::new(CountingConnector::new(Duration::from_millis(1)));
        let registry = TenantRegistry::new(connector.clone());

        let first = registry.get_or_create(&tenant("acme")).await.unwrap();
        let second = registry.get_or_create(&tenant("acme")).await.unwrap();

        assert_eq!(connector.attempts(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn distinct_tenants_get_distinct_handles() {
        let connector = Arc::new(CountingConnector::new(Duration::from_millis(1)));
        let registry = TenantRegistry::new(connector.clone());

        let a = registry.get_or_create(&tenant("acme")).await.unwrap();
        let b = registry.get_or_create(&tenant("globex")).await.unwrap();

        assert_eq!(connector.attempts(), 2);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.established(), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_failed_attempt() {
        let connector = Arc::new(CountingConnector::failing_first(1));
        let registry = TenantRegistry::new(connector.clone());

        let acme = tenant("acme");
        let (r1, r2) = tokio::join!(
            registry.get_or_create(&acme),
            registry.get_or_create(&acme)
        );

        assert!(r1.is_err());
        assert!(r2.is_err());
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached_and_a_later_call_retries() {
        let connector = Arc::new(CountingConnector::failing_first(1));
        let registry = TenantRegistry::new(connector.clone());

        let first = registry.get_or_create(&tenant("acme")).await;
        assert!(matches!(first, Err(RegistryError::Unavailable(_))));
        assert_eq!(registry.established(), 0);

        let second = registry.get_or_create(&tenant("acme")).await;
        assert!(second.is_ok());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn establishment_is_bounded_by_the_timeout() {
        let connector = Arc::new(CountingConnector::new(Duration::from_secs(30)));
        let registry =
            TenantRegistry::with_timeout(connector.clone(), Duration::from_millis(50));

        let result = registry.get_or_create(&tenant("acme")).await;
        assert!(matches!(result, Err(RegistryError::Unavailable(_))));
        assert_eq!(registry.established(), 0);
    }
}
