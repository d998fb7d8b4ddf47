//! Memoized asynchronous loader for one library bundle

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Loads a bundle on first use and hands out shared references afterwards.
///
/// Lifecycle: uninitialized, initializing (one in-flight load shared by all
/// concurrent callers), ready. [`reset`](Self::reset) returns to
/// uninitialized; callers already waiting on the old load still receive its
/// result.
pub struct LibraryManager<T> {
    name: &'static str,
    loader: Loader<T>,
    cell: RwLock<Arc<OnceCell<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> fmt::Debug for LibraryManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryManager")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl<T: Send + Sync + 'static> LibraryManager<T> {
    /// Create a manager around an asynchronous loader
    pub fn new<F, Fut>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            name,
            loader: Box::new(move || loader().boxed()),
            cell: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    /// Create a manager that is already initialized with `value`
    #[cfg(test)]
    pub(crate) fn ready(name: &'static str, value: T) -> Self
    where
        T: Clone,
    {
        let manager = Self::new(name, {
            let value = value.clone();
            move || {
                let value = value.clone();
                async move { Ok(value) }
            }
        });
        manager.current().set(Arc::new(value)).ok();
        manager
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn current(&self) -> Arc<OnceCell<Arc<T>>> {
        let guard = self.cell.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Run the loader if nothing is cached yet and return the bundle.
    ///
    /// Concurrent callers wait on the same load. A failed load leaves the
    /// manager uninitialized so a later call may retry.
    pub async fn initialize(&self) -> Result<Arc<T>> {
        let cell = self.current();
        let value = cell
            .get_or_try_init(|| async {
                tracing::debug!("Loading library bundle '{}'", self.name);
                let bundle = (self.loader)().await.map_err(|e| match e {
                    Error::LibraryLoad(msg) => Error::LibraryLoad(msg),
                    other => Error::LibraryLoad(format!("{}: {}", self.name, other)),
                })?;
                Ok::<_, Error>(Arc::new(bundle))
            })
            .await?;
        Ok(Arc::clone(value))
    }

    /// Cached bundle, or [`Error::UninitializedAccess`] before initialization
    pub fn get(&self) -> Result<Arc<T>> {
        self.current()
            .get()
            .cloned()
            .ok_or(Error::UninitializedAccess)
    }

    pub fn is_initialized(&self) -> bool {
        self.current().initialized()
    }

    /// Discard the cached bundle so the next `initialize` loads again
    pub fn reset(&self) {
        let mut guard = self.cell.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(OnceCell::new());
    }
}
