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

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::EventSink;
use crate::HealthCheck;
use crate::HealthCheckChain;
use crate::KeepAlive;
use crate::ManageResource;
use crate::Pool;
use crate::PoolConfig;
use crate::QueueStrategy;
use crate::Result;
use crate::TracingSink;
use crate::maintenance::KeepaliveChecker;
use crate::maintenance::LeakDetector;
use crate::maintenance::LifetimeRetirer;
use crate::maintenance::MaintenanceScheduler;
use crate::maintenance::MaintenanceTask;
use crate::maintenance::Resizer;

/// Builds a [`Pool`] together with its health checks and background maintenance.
///
/// # Example
///
/// ```
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// use poolkeeper::ManageResource;
/// use poolkeeper::PoolBuilder;
///
/// struct Manager;
/// impl ManageResource for Manager {
///     type Resource = String;
///     type Error = Infallible;
///
///     async fn create(&self) -> Result<Self::Resource, Self::Error> {
///         Ok(String::new())
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let pool = PoolBuilder::new(Manager, 8)
///     .name("strings")
///     .min_idle(2)
///     .max_lifetime(Some(Duration::from_secs(30 * 60)))
///     .health_check(|s: &mut String| s.len() < 1024)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.name(), "strings");
/// assert_eq!(pool.maintenance_tasks(), vec!["resizer", "lifetime-retirer"]);
/// # }
/// ```
pub struct PoolBuilder<M: ManageResource> {
    manager: M,
    config: PoolConfig,
    name: Option<String>,
    health: HealthCheckChain<M::Resource>,
    keepalives: Vec<Box<dyn KeepAlive<M::Resource>>>,
    extra_tasks: Vec<Box<dyn MaintenanceTask<M>>>,
    sink: Arc<dyn EventSink>,
}

impl<M: ManageResource> fmt::Debug for PoolBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .field("name", &self.name)
            .field("health", &self.health)
            .field("keepalives", &self.keepalives.len())
            .field("extra_tasks", &self.extra_tasks.len())
            .finish()
    }
}

impl<M: ManageResource> PoolBuilder<M> {
    /// Creates a builder for a pool of at most `capacity` items created by `manager`.
    pub fn new(manager: M, capacity: usize) -> Self {
        Self {
            manager,
            config: PoolConfig::new(capacity),
            name: None,
            health: HealthCheckChain::new(),
            keepalives: Vec::new(),
            extra_tasks: Vec::new(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the name of the pool; it appears in every event and error.
    ///
    /// Defaults to the type name of the manager followed by a random suffix.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the hard ceiling on the number of live items.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Sets the number of idle items kept ready.
    pub fn min_idle(mut self, min_idle: usize) -> Self {
        self.config.min_idle = min_idle;
        self
    }

    /// Sets how long a borrow may wait for a free slot.
    pub fn borrow_timeout(mut self, timeout: Duration) -> Self {
        self.config.borrow_timeout = timeout;
        self
    }

    /// Sets how long closing waits for outstanding borrows.
    pub fn return_timeout(mut self, timeout: Duration) -> Self {
        self.config.return_timeout = timeout;
        self
    }

    /// Sets the idle timeout; `None` keeps idle items forever.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the maximum lifetime of an item; `None` disables retirement.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.config.max_lifetime = lifetime;
        self
    }

    /// Sets the leak threshold; `None` disables leak detection.
    pub fn leak_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.config.leak_threshold = threshold;
        self
    }

    /// Sets whether items may only be borrowed through a task scope.
    pub fn bind_to_task(mut self, bind_to_task: bool) -> Self {
        self.config.bind_to_task = bind_to_task;
        self
    }

    /// Sets whether dropping a borrowed item returns it to the pool.
    pub fn auto_return(mut self, auto_return: bool) -> Self {
        self.config.auto_return = auto_return;
        self
    }

    /// Sets the order idle items are handed out in.
    pub fn queue_strategy(mut self, queue_strategy: QueueStrategy) -> Self {
        self.config.queue_strategy = queue_strategy;
        self
    }

    /// Sets the resizer interval.
    pub fn resize_interval(mut self, interval: Duration) -> Self {
        self.config.resize_interval = Some(interval);
        self
    }

    /// Sets the lifetime retirer interval.
    pub fn retire_interval(mut self, interval: Duration) -> Self {
        self.config.retire_interval = Some(interval);
        self
    }

    /// Sets how long one retirer run waits for expired borrowed items.
    pub fn max_item_reserving_wait(mut self, wait: Duration) -> Self {
        self.config.max_item_reserving_wait = wait;
        self
    }

    /// Appends a health check run against idle items before they are handed out.
    pub fn health_check(mut self, check: impl HealthCheck<M::Resource> + 'static) -> Self {
        self.health.push(check);
        self
    }

    /// Adds a keepalive check; each one runs as its own maintenance task.
    pub fn keepalive(mut self, keepalive: impl KeepAlive<M::Resource>) -> Self {
        self.keepalives.push(Box::new(keepalive));
        self
    }

    /// Adds a custom maintenance task, scheduled next to the built-in ones.
    pub fn maintenance_task(mut self, task: impl MaintenanceTask<M>) -> Self {
        self.extra_tasks.push(Box::new(task));
        self
    }

    /// Sets where pool events go. Defaults to [`TracingSink`].
    pub fn event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Validates the configuration, creates the pool, and starts its maintenance.
    ///
    /// Must be called within a tokio runtime, which runs the maintenance tasks.
    pub fn build(self) -> Result<Arc<Pool<M>>> {
        self.config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::Configuration(
                "a pool must be built within a tokio runtime".to_string(),
            ));
        }

        let config = self.config;
        let name = self.name.unwrap_or_else(default_name::<M>);

        let mut tasks: Vec<Box<dyn MaintenanceTask<M>>> =
            vec![Box::new(Resizer::new(config.resize_interval()))];
        if let Some(threshold) = config.leak_threshold {
            tasks.push(Box::new(LeakDetector::new(threshold)));
        }
        if let (Some(max_lifetime), Some(interval)) =
            (config.max_lifetime, config.retire_interval())
        {
            tasks.push(Box::new(LifetimeRetirer::new(
                max_lifetime,
                interval,
                config.max_item_reserving_wait,
            )));
        }
        for keepalive in self.keepalives {
            if keepalive.interval().is_zero() {
                return Err(Error::Configuration(
                    "keepalive interval must be positive".to_string(),
                ));
            }
            tasks.push(Box::new(KeepaliveChecker::new(keepalive)));
        }
        for task in self.extra_tasks {
            if task.interval().is_zero() {
                return Err(Error::Configuration(format!(
                    "interval of maintenance task {} must be positive",
                    task.name()
                )));
            }
            tasks.push(task);
        }

        let pool = Pool::new(name, config, self.manager, self.health, self.sink);
        let scheduler = MaintenanceScheduler::start(&pool, tasks);
        pool.attach_scheduler(scheduler);

        tracing::debug!(
            pool = pool.name(),
            capacity = config.capacity,
            min_idle = config.min_idle,
            tasks = ?pool.maintenance_tasks(),
            "pool started"
        );
        Ok(pool)
    }
}

fn default_name<M>() -> String {
    let type_name = std::any::type_name::<M>();
    let short = type_name
        .split('<')
        .next()
        .and_then(|path| path.rsplit("::").next())
        .unwrap_or(type_name);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{short}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[test]
    fn test_default_name() {
        let name = default_name::<Dummy>();
        let (prefix, suffix) = name.split_once('-').unwrap();
        assert_eq!(prefix, "Dummy");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, default_name::<Dummy>());
    }

    #[test]
    fn test_default_name_of_generic_type() {
        let name = default_name::<Vec<Dummy>>();
        assert!(name.starts_with("Vec-"), "{name}");
    }
}
