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

use std::time::Duration;

use crate::Error;
use crate::QueueStrategy;
use crate::Result;

const DEFAULT_BORROW_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_RETURN_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ITEM_RESERVING_WAIT: Duration = Duration::from_secs(1);
const MIN_DERIVED_INTERVAL: Duration = Duration::from_millis(10);

/// The configuration of a [`Pool`](crate::Pool).
///
/// Built once and never changed afterwards. Use [`PoolBuilder`](crate::PoolBuilder) to turn it
/// into a running pool.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Hard ceiling on the number of live items.
    pub capacity: usize,

    /// Number of idle items the resizer keeps ready.
    pub min_idle: usize,

    /// How long a borrow may wait for a free slot.
    pub borrow_timeout: Duration,

    /// How long closing the pool waits for outstanding borrows to come back.
    pub return_timeout: Duration,

    /// Idle items unused for longer than this are closed, down to `min_idle`.
    pub idle_timeout: Option<Duration>,

    /// Items older than this are retired.
    pub max_lifetime: Option<Duration>,

    /// Borrows held longer than this are reported as suspected leaks.
    pub leak_threshold: Option<Duration>,

    /// Whether items may only be borrowed through a task scope.
    pub bind_to_task: bool,

    /// Whether dropping a borrowed item returns it to the pool.
    ///
    /// When disabled, dropping an item without [`Pool::release`](crate::Pool::release) closes
    /// it.
    pub auto_return: bool,

    /// Queue strategy of the idle items.
    pub queue_strategy: QueueStrategy,

    /// Interval of the resizer. Defaults to a tenth of `borrow_timeout`, but at least 10ms.
    pub resize_interval: Option<Duration>,

    /// Interval of the lifetime retirer. Defaults to a tenth of `max_lifetime`, but at least
    /// 10ms.
    pub retire_interval: Option<Duration>,

    /// How long one retirer run waits for expired borrowed items to come back.
    pub max_item_reserving_wait: Duration,
}

impl PoolConfig {
    /// Creates a new [`PoolConfig`] with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            min_idle: 0,
            borrow_timeout: DEFAULT_BORROW_TIMEOUT,
            return_timeout: DEFAULT_RETURN_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_lifetime: None,
            leak_threshold: None,
            bind_to_task: false,
            auto_return: true,
            queue_strategy: QueueStrategy::default(),
            resize_interval: None,
            retire_interval: None,
            max_item_reserving_wait: DEFAULT_MAX_ITEM_RESERVING_WAIT,
        }
    }

    /// Returns a new [`PoolConfig`] with the specified minimum number of idle items.
    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified borrow timeout.
    pub fn with_borrow_timeout(mut self, timeout: Duration) -> Self {
        self.borrow_timeout = timeout;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified return timeout.
    pub fn with_return_timeout(mut self, timeout: Duration) -> Self {
        self.return_timeout = timeout;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified maximum lifetime.
    pub fn with_max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified leak threshold.
    pub fn with_leak_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.leak_threshold = threshold;
        self
    }

    /// Returns a new [`PoolConfig`] with task binding enabled or disabled.
    pub fn with_bind_to_task(mut self, bind_to_task: bool) -> Self {
        self.bind_to_task = bind_to_task;
        self
    }

    /// Returns a new [`PoolConfig`] with auto return enabled or disabled.
    pub fn with_auto_return(mut self, auto_return: bool) -> Self {
        self.auto_return = auto_return;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified queue strategy.
    pub fn with_queue_strategy(mut self, queue_strategy: QueueStrategy) -> Self {
        self.queue_strategy = queue_strategy;
        self
    }

    /// Returns a new [`PoolConfig`] with the specified resizer interval.
    pub fn with_resize_interval(mut self, interval: Duration) -> Self {
        self.resize_interval = Some(interval);
        self
    }

    /// Returns a new [`PoolConfig`] with the specified lifetime retirer interval.
    pub fn with_retire_interval(mut self, interval: Duration) -> Self {
        self.retire_interval = Some(interval);
        self
    }

    /// Returns a new [`PoolConfig`] with the specified reserving wait of the lifetime retirer.
    pub fn with_max_item_reserving_wait(mut self, wait: Duration) -> Self {
        self.max_item_reserving_wait = wait;
        self
    }

    /// The effective resizer interval.
    pub fn resize_interval(&self) -> Duration {
        self.resize_interval
            .unwrap_or_else(|| (self.borrow_timeout / 10).max(MIN_DERIVED_INTERVAL))
    }

    /// The effective lifetime retirer interval, if items have a maximum lifetime.
    pub fn retire_interval(&self) -> Option<Duration> {
        let max_lifetime = self.max_lifetime?;
        Some(
            self.retire_interval
                .unwrap_or_else(|| (max_lifetime / 10).max(MIN_DERIVED_INTERVAL)),
        )
    }

    /// Checks the configuration for values a pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Configuration("capacity must be positive".to_string()));
        }
        if self.min_idle > self.capacity {
            return Err(Error::Configuration(format!(
                "min_idle ({}) must not exceed capacity ({})",
                self.min_idle, self.capacity
            )));
        }
        if self.resize_interval.is_some_and(|i| i.is_zero()) {
            return Err(Error::Configuration(
                "resize interval must be positive".to_string(),
            ));
        }
        if self.retire_interval.is_some_and(|i| i.is_zero()) {
            return Err(Error::Configuration(
                "retire interval must be positive".to_string(),
            ));
        }
        if self.leak_threshold.is_some_and(|t| t.is_zero()) {
            return Err(Error::Configuration(
                "leak threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = PoolConfig::new(4).with_borrow_timeout(Duration::from_secs(2));
        assert_eq!(config.resize_interval(), Duration::from_millis(200));
        assert_eq!(config.retire_interval(), None);

        let config = config.with_max_lifetime(Some(Duration::from_secs(10)));
        assert_eq!(config.retire_interval(), Some(Duration::from_secs(1)));

        let config = config.with_retire_interval(Duration::from_secs(3));
        assert_eq!(config.retire_interval(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_derived_intervals_have_a_floor() {
        let config = PoolConfig::new(1)
            .with_borrow_timeout(Duration::ZERO)
            .with_max_lifetime(Some(Duration::from_millis(1)));
        assert!(config.validate().is_ok());
        assert_eq!(config.resize_interval(), Duration::from_millis(10));
        assert_eq!(config.retire_interval(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_validate() {
        assert!(PoolConfig::new(2).with_min_idle(2).validate().is_ok());

        let err = PoolConfig::new(2).with_min_idle(3).validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = PoolConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = PoolConfig::new(1)
            .with_resize_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = PoolConfig::new(1)
            .with_leak_threshold(Some(Duration::ZERO))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
