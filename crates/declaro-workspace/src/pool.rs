use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use uuid::Uuid;

use declaro_core::{ContainerCleanup, Endpoint};

use crate::error::{Result, WorkspaceError};

/// Starts and stops database containers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Starts (or resumes) container `name` from `image` and returns an
    /// endpoint once the server accepts connections.
    async fn start(&self, name: &str, image: &str) -> Result<Endpoint>;

    /// Stops and removes container `name`.
    async fn stop(&self, name: &str) -> Result<()>;
}

struct PoolEntry {
    container: String,
    refs: usize,
    ready: Arc<OnceCell<Endpoint>>,
}

/// A reference to a running pooled container. Return it with
/// [`ContainerPool::release`].
#[derive(Debug)]
pub struct ContainerLease {
    image: String,
    container: String,
    endpoint: Endpoint,
}

impl ContainerLease {
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Reference-counted pool holding at most one container per image.
///
/// The first acquirer for an image starts the container and later acquirers
/// wait for the same startup. When the last lease is released the container
/// is stopped, unless the cleanup policy keeps it running.
pub struct ContainerPool {
    runtime: Arc<dyn ContainerRuntime>,
    entries: Mutex<HashMap<String, PoolEntry>>,
    max_per_container: usize,
    cleanup: ContainerCleanup,
}

impl ContainerPool {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        max_per_container: usize,
        cleanup: ContainerCleanup,
    ) -> Self {
        Self {
            runtime,
            entries: Mutex::new(HashMap::new()),
            max_per_container: max_per_container.max(1),
            cleanup,
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, PoolEntry>>> {
        self.entries
            .lock()
            .map_err(|_| WorkspaceError::Provisioning("container pool lock poisoned".to_string()))
    }

    /// Number of leases currently held for `image`, including acquires still
    /// waiting for the container to start.
    pub fn leases(&self, image: &str) -> Result<usize> {
        Ok(self.entries()?.get(image).map_or(0, |entry| entry.refs))
    }

    pub async fn acquire(&self, image: &str) -> Result<ContainerLease> {
        let (pending, ready) = {
            let mut entries = self.entries()?;
            let entry = entries.entry(image.to_string()).or_insert_with(|| PoolEntry {
                container: container_name(image, self.cleanup),
                refs: 0,
                ready: Arc::new(OnceCell::new()),
            });
            if entry.refs >= self.max_per_container {
                return Err(WorkspaceError::ResourceExhausted {
                    image: image.to_string(),
                    limit: self.max_per_container,
                });
            }
            entry.refs += 1;
            let pending = PendingLease {
                pool: self,
                image,
                container: Some(entry.container.clone()),
            };
            (pending, Arc::clone(&entry.ready))
        };

        let started = ready
            .get_or_try_init(|| async {
                let container = pending.container();
                tracing::info!(event = "container_start", image, container, "starting container");
                self.runtime.start(container, image).await
            })
            .await
            .cloned();

        match started {
            Ok(endpoint) => Ok(ContainerLease {
                image: image.to_string(),
                container: pending.keep(),
                endpoint,
            }),
            Err(err) => {
                // The entry stays uninitialized so a later acquirer retries.
                pending.forget()?;
                Err(err)
            }
        }
    }

    pub async fn release(&self, lease: ContainerLease) -> Result<()> {
        let stop = {
            let mut entries = self.entries()?;
            match entries.get_mut(&lease.image) {
                Some(entry) if entry.container == lease.container => {
                    entry.refs = entry.refs.saturating_sub(1);
                    if entry.refs == 0 && self.cleanup == ContainerCleanup::Stop {
                        entries.remove(&lease.image);
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            }
        };
        if stop {
            tracing::info!(
                event = "container_stop",
                image = %lease.image,
                container = %lease.container,
                "stopping container"
            );
            self.runtime.stop(&lease.container).await?;
        }
        Ok(())
    }

    /// Gives back one reference; true when it was the last one.
    fn forget(&self, image: &str, container: &str) -> Result<bool> {
        let mut entries = self.entries()?;
        if let Some(entry) = entries.get_mut(image) {
            if entry.container == container {
                entry.refs = entry.refs.saturating_sub(1);
                if entry.refs == 0 {
                    entries.remove(image);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Gives back the reference of an acquire that was dropped mid-start. The
    /// container may already be booting, so the last reference stops it.
    fn abandon(&self, image: &str, container: String) {
        let last = match self.forget(image, &container) {
            Ok(last) => last,
            Err(err) => {
                tracing::warn!(event = "container_abandon_failed", image, container = %container, error = %err);
                return;
            }
        };
        tracing::debug!(event = "container_acquire_abandoned", image, container = %container, last);
        if !last || self.cleanup != ContainerCleanup::Stop {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let runtime = Arc::clone(&self.runtime);
                handle.spawn(async move {
                    if let Err(err) = runtime.stop(&container).await {
                        tracing::warn!(event = "container_stop_failed", container = %container, error = %err);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    event = "container_leaked",
                    container = %container,
                    "no async runtime available to stop container"
                );
            }
        }
    }
}

/// A reference taken by [`ContainerPool::acquire`] that is not yet backed by
/// a running container. Dropping it returns the reference to the pool.
struct PendingLease<'a> {
    pool: &'a ContainerPool,
    image: &'a str,
    container: Option<String>,
}

impl PendingLease<'_> {
    fn container(&self) -> &str {
        self.container.as_deref().unwrap_or_default()
    }

    /// The container started; the reference now belongs to a lease.
    fn keep(mut self) -> String {
        self.container.take().unwrap_or_default()
    }

    /// The container failed to start and cleaned up after itself.
    fn forget(mut self) -> Result<()> {
        match self.container.take() {
            Some(container) => self.pool.forget(self.image, &container).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Drop for PendingLease<'_> {
    fn drop(&mut self) {
        if let Some(container) = self.container.take() {
            self.pool.abandon(self.image, container);
        }
    }
}

/// Containers that are stopped after use get a unique name per incarnation;
/// containers kept running get a stable name so later runs can reuse them.
fn container_name(image: &str, cleanup: ContainerCleanup) -> String {
    let base: String = image
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect();
    match cleanup {
        ContainerCleanup::None => format!("declaro-{base}"),
        ContainerCleanup::Stop => {
            let suffix = Uuid::new_v4().simple().to_string();
            format!("declaro-{base}-{}", &suffix[..8])
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct FakeRuntime {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_first: bool,
        hang: AtomicBool,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn start(&self, name: &str, _image: &str) -> Result<Endpoint> {
            let attempt = self.starts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_first && attempt == 0 {
                return Err(WorkspaceError::Provisioning(format!("{name} failed to boot")));
            }
            Ok(Endpoint::new("127.0.0.1", 33060))
        }

        async fn stop(&self, _name: &str) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_acquires_share_one_container() {
        let runtime = Arc::new(FakeRuntime::default());
        let pool = ContainerPool::new(runtime.clone(), 16, ContainerCleanup::Stop);

        let (a, b, c) = tokio::join!(
            pool.acquire("mysql:8.0"),
            pool.acquire("mysql:8.0"),
            pool.acquire("mysql:8.0")
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(runtime.starts.load(Ordering::SeqCst), 1);
        assert_eq!(a.container(), b.container());
        assert_eq!(b.container(), c.container());
        assert_eq!(pool.leases("mysql:8.0").unwrap(), 3);

        pool.release(a).await.unwrap();
        pool.release(b).await.unwrap();
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 0);
        pool.release(c).await.unwrap();
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 1);
        assert_eq!(pool.leases("mysql:8.0").unwrap(), 0);
    }

    #[tokio::test]
    async fn limit_per_container_is_enforced() {
        let runtime = Arc::new(FakeRuntime::default());
        let pool = ContainerPool::new(runtime, 1, ContainerCleanup::Stop);

        let lease = pool.acquire("mariadb:10.11").await.unwrap();
        let err = pool.acquire("mariadb:10.11").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::ResourceExhausted { limit: 1, .. }));

        let other = pool.acquire("mysql:8.4").await.unwrap();
        pool.release(lease).await.unwrap();
        pool.release(other).await.unwrap();
    }

    #[tokio::test]
    async fn new_incarnation_after_stop_gets_new_name() {
        let runtime = Arc::new(FakeRuntime::default());
        let pool = ContainerPool::new(runtime.clone(), 4, ContainerCleanup::Stop);

        let first = pool.acquire("mysql:8.0").await.unwrap();
        let first_name = first.container().to_string();
        pool.release(first).await.unwrap();

        let second = pool.acquire("mysql:8.0").await.unwrap();
        assert_ne!(second.container(), first_name);
        assert_eq!(runtime.starts.load(Ordering::SeqCst), 2);
        pool.release(second).await.unwrap();
    }

    #[tokio::test]
    async fn kept_containers_are_not_stopped() {
        let runtime = Arc::new(FakeRuntime::default());
        let pool = ContainerPool::new(runtime.clone(), 4, ContainerCleanup::None);

        let lease = pool.acquire("mysql:8.0").await.unwrap();
        assert_eq!(lease.container(), "declaro-mysql-8-0");
        pool.release(lease).await.unwrap();
        let again = pool.acquire("mysql:8.0").await.unwrap();
        pool.release(again).await.unwrap();

        assert_eq!(runtime.starts.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_start_is_retried_by_next_acquirer() {
        let runtime = Arc::new(FakeRuntime {
            fail_first: true,
            ..FakeRuntime::default()
        });
        let pool = ContainerPool::new(runtime.clone(), 4, ContainerCleanup::Stop);

        assert!(pool.acquire("mysql:8.0").await.is_err());
        assert_eq!(pool.leases("mysql:8.0").unwrap(), 0);
        let lease = pool.acquire("mysql:8.0").await.unwrap();
        assert_eq!(runtime.starts.load(Ordering::SeqCst), 2);
        pool.release(lease).await.unwrap();
    }

    #[tokio::test]
    async fn dropped_acquire_gives_its_slot_back() {
        let runtime = Arc::new(FakeRuntime::default());
        runtime.hang.store(true, Ordering::SeqCst);
        let pool = ContainerPool::new(runtime.clone(), 1, ContainerCleanup::Stop);

        let abandoned = tokio::time::timeout(Duration::from_millis(50), pool.acquire("mysql:8.0")).await;
        assert!(abandoned.is_err());
        assert_eq!(pool.leases("mysql:8.0").unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 1, "half-started container is stopped");

        runtime.hang.store(false, Ordering::SeqCst);
        let lease = pool.acquire("mysql:8.0").await.unwrap();
        assert_eq!(pool.leases("mysql:8.0").unwrap(), 1);
        pool.release(lease).await.unwrap();
    }

    #[tokio::test]
    async fn dropped_acquire_keeps_shared_startup_alive() {
        let runtime = Arc::new(FakeRuntime::default());
        let pool = ContainerPool::new(runtime.clone(), 4, ContainerCleanup::Stop);

        let (abandoned, kept) = tokio::join!(
            tokio::time::timeout(Duration::from_millis(5), pool.acquire("mysql:8.0")),
            pool.acquire("mysql:8.0")
        );
        assert!(abandoned.is_err());
        let kept = kept.unwrap();
        assert_eq!(pool.leases("mysql:8.0").unwrap(), 1);
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 0);
        pool.release(kept).await.unwrap();
        assert_eq!(runtime.stops.load(Ordering::SeqCst), 1);
    }
}
