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

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::ManageResource;
use crate::Pool;
use crate::Result;
use crate::maintenance::MaintenanceTask;

/// Keeps the number of idle items between `min_idle` and what the idle timeout allows.
///
/// Idle items unused for longer than [`PoolConfig::idle_timeout`](crate::PoolConfig) are closed
/// as long as at least `min_idle` items stay idle; then the idle items are replenished up to
/// `min_idle`, within the free capacity.
#[derive(Debug, Clone)]
pub struct Resizer {
    interval: Duration,
}

impl Resizer {
    /// Creates a resizer running every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl<M: ManageResource> MaintenanceTask<M> for Resizer {
    fn name(&self) -> &'static str {
        "resizer"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run<'a>(&'a self, pool: &'a Pool<M>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let min_idle = pool.config().min_idle;

            if let Some(idle_timeout) = pool.config().idle_timeout {
                let result = pool.trim_idle(idle_timeout, min_idle, Instant::now());
                if result.removed > 0 {
                    tracing::debug!(
                        pool = pool.name(),
                        removed = result.removed,
                        "closed items past the idle timeout"
                    );
                }
            }

            if min_idle > 0 {
                let n = pool.replenish(min_idle).await;
                if n > 0 {
                    tracing::debug!(pool = pool.name(), n, "replenished idle items");
                }
            }

            Ok(())
        })
    }
}
