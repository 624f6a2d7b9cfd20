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
use crate::PoolEvent;
use crate::Result;
use crate::maintenance::MaintenanceTask;

/// Reports borrowed items held for at least the leak threshold.
///
/// Every run emits one [`PoolEvent::LeakSuspected`] per such item. The detector only observes:
/// the item stays with its borrower, since taking it back could hand the same resource to two
/// owners.
#[derive(Debug, Clone)]
pub struct LeakDetector {
    threshold: Duration,
}

impl LeakDetector {
    /// Creates a detector for borrows held at least `threshold`; it runs every `threshold`.
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }
}

impl<M: ManageResource> MaintenanceTask<M> for LeakDetector {
    fn name(&self) -> &'static str {
        "leak-detector"
    }

    fn interval(&self) -> Duration {
        self.threshold
    }

    fn run<'a>(&'a self, pool: &'a Pool<M>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for (item, owner, held) in pool.leases_held_for(self.threshold, Instant::now()) {
                pool.emit(PoolEvent::LeakSuspected { item, owner, held });
            }
            Ok(())
        })
    }
}
