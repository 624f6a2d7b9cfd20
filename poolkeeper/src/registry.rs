// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::Error;
use crate::ManageResource;
use crate::Pool;
use crate::PoolStatus;
use crate::Result;

/// A pool of any resource type, as held by a [`PoolRegistry`].
pub trait ManagedPool: Send + Sync + 'static {
    /// Returns the name of the pool.
    fn name(&self) -> &str;

    /// Returns the current status of the pool.
    fn status(&self) -> PoolStatus;

    /// Closes the pool.
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Upcasts for downcasting back to the concrete pool.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<M: ManageResource> ManagedPool for Pool<M> {
    fn name(&self) -> &str {
        Pool::name(self)
    }

    fn status(&self) -> PoolStatus {
        Pool::status(self)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(Pool::close(self))
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Named pools, looked up by name.
///
/// A registry is an ordinary value: create one where the pools are wired together and pass it
/// to whoever needs to find a pool.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<BTreeMap<String, Arc<dyn ManagedPool>>>,
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.names())
            .finish()
    }
}

impl PoolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pool` under its name.
    ///
    /// Fails with [`Error::Configuration`] when a pool of the same name is registered already.
    pub fn register<M: ManageResource>(&self, pool: Arc<Pool<M>>) -> Result<()> {
        let mut pools = self.pools.lock();
        let name = pool.name().to_string();
        if pools.contains_key(&name) {
            return Err(Error::Configuration(format!(
                "pool {name} is already registered"
            )));
        }
        pools.insert(name, pool);
        Ok(())
    }

    /// Returns the pool named `name`, if it is registered and manages resources with `M`.
    pub fn get<M: ManageResource>(&self, name: &str) -> Option<Arc<Pool<M>>> {
        let pool = self.pools.lock().get(name).cloned()?;
        pool.as_any().downcast::<Pool<M>>().ok()
    }

    /// Unregisters the pool named `name` and returns it. The pool keeps running.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn ManagedPool>> {
        self.pools.lock().remove(name)
    }

    /// Names of the registered pools, in order.
    pub fn names(&self) -> Vec<String> {
        self.pools.lock().keys().cloned().collect()
    }

    /// Status of every registered pool, by name.
    pub fn statuses(&self) -> BTreeMap<String, PoolStatus> {
        self.pools
            .lock()
            .iter()
            .map(|(name, pool)| (name.clone(), pool.status()))
            .collect()
    }

    /// Unregisters and closes every pool.
    pub async fn close_all(&self) {
        let pools = std::mem::take(&mut *self.pools.lock());
        for (_, pool) in pools {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::PoolBuilder;

    struct Numbers;

    impl ManageResource for Numbers {
        type Resource = u64;
        type Error = Infallible;

        async fn create(&self) -> std::result::Result<Self::Resource, Self::Error> {
            Ok(7)
        }
    }

    struct Words;

    impl ManageResource for Words {
        type Resource = String;
        type Error = Infallible;

        async fn create(&self) -> std::result::Result<Self::Resource, Self::Error> {
            Ok("seven".to_string())
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = PoolRegistry::new();
        let numbers = PoolBuilder::new(Numbers, 2).name("numbers").build().unwrap();
        let words = PoolBuilder::new(Words, 2).name("words").build().unwrap();
        registry.register(numbers.clone()).unwrap();
        registry.register(words).unwrap();

        assert_eq!(registry.names(), vec!["numbers", "words"]);

        let found = registry.get::<Numbers>("numbers").unwrap();
        assert!(Arc::ptr_eq(&found, &numbers));
        assert_eq!(*found.get().await.unwrap(), 7);

        assert!(registry.get::<Words>("numbers").is_none());
        assert!(registry.get::<Numbers>("missing").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let registry = PoolRegistry::new();
        let first = PoolBuilder::new(Numbers, 1).name("dup").build().unwrap();
        let second = PoolBuilder::new(Numbers, 1).name("dup").build().unwrap();
        registry.register(first).unwrap();

        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
        assert_eq!(registry.names(), vec!["dup"]);
    }

    #[tokio::test]
    async fn test_remove_and_close_all() {
        let registry = PoolRegistry::new();
        let a = PoolBuilder::new(Numbers, 1).name("a").build().unwrap();
        let b = PoolBuilder::new(Numbers, 1).name("b").build().unwrap();
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();

        drop(a.get().await.unwrap());
        let statuses = registry.statuses();
        assert_eq!(statuses["a"].idle_count, 1);
        assert_eq!(statuses["b"].current_size, 0);

        let removed = registry.remove("b").unwrap();
        assert_eq!(removed.name(), "b");
        assert_eq!(registry.names(), vec!["a"]);

        registry.close_all().await;
        assert!(registry.names().is_empty());
        assert!(a.is_closed());
        assert!(!b.is_closed());
    }
}
