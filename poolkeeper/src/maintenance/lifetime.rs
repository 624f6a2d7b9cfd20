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

use crate::DestroyReason;
use crate::ManageResource;
use crate::Pool;
use crate::Result;
use crate::maintenance::MaintenanceTask;

/// Retires items older than the maximum lifetime.
///
/// Expired idle items are closed right away and left for the [`Resizer`](super::Resizer) to
/// backfill. Expired borrowed items are marked retiring and closed when they come back; a run
/// waits a bounded time for them and leaves the rest to the next run.
#[derive(Debug, Clone)]
pub struct LifetimeRetirer {
    max_lifetime: Duration,
    interval: Duration,
    reserving_wait: Duration,
}

impl LifetimeRetirer {
    /// Creates a retirer for items older than `max_lifetime`, running every `interval`.
    ///
    /// Each run waits at most `reserving_wait` for expired borrowed items to be returned.
    pub fn new(max_lifetime: Duration, interval: Duration, reserving_wait: Duration) -> Self {
        Self {
            max_lifetime,
            interval,
            reserving_wait,
        }
    }
}

impl<M: ManageResource> MaintenanceTask<M> for LifetimeRetirer {
    fn name(&self) -> &'static str {
        "lifetime-retirer"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run<'a>(&'a self, pool: &'a Pool<M>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let now = Instant::now();
            let result = pool.retain_idle(
                |_, status| status.age(now) <= self.max_lifetime,
                DestroyReason::Expired,
            );
            if result.removed > 0 {
                tracing::debug!(
                    pool = pool.name(),
                    removed = result.removed,
                    "retired expired idle items"
                );
            }

            let retiring = pool.mark_retiring(self.max_lifetime, now);
            if retiring.is_empty() {
                return Ok(());
            }

            let outstanding = pool
                .wait_for_leases(self.reserving_wait, |leases| {
                    retiring.iter().filter(|id| leases.contains_key(id)).count()
                })
                .await;
            if outstanding > 0 {
                tracing::debug!(
                    pool = pool.name(),
                    outstanding,
                    "expired items still borrowed; retrying next run"
                );
            }
            Ok(())
        })
    }
}
