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
use std::time::Duration;

use futures::future::BoxFuture;

use crate::DestroyReason;
use crate::KeepAlive;
use crate::ManageResource;
use crate::Pool;
use crate::Result;
use crate::health::run_check;
use crate::maintenance::MaintenanceTask;

/// Runs a [`KeepAlive`] against idle items and closes those failing it.
///
/// Borrowed items are never checked: the pool cannot know what state their borrower left them
/// in. Checks run outside the pool lock, one idle item at a time, so borrows and returns go on
/// while a slow check is in flight.
pub struct KeepaliveChecker<T> {
    checker: Box<dyn KeepAlive<T>>,
}

impl<T: 'static> fmt::Debug for KeepaliveChecker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepaliveChecker")
            .field("interval", &self.checker.interval())
            .finish()
    }
}

impl<T: 'static> KeepaliveChecker<T> {
    /// Wraps `checker`; the task runs on the checker's own interval.
    pub fn new(checker: Box<dyn KeepAlive<T>>) -> Self {
        Self { checker }
    }
}

impl<M: ManageResource> MaintenanceTask<M> for KeepaliveChecker<M::Resource> {
    fn name(&self) -> &'static str {
        "keepalive"
    }

    fn interval(&self) -> Duration {
        self.checker.interval()
    }

    fn run<'a>(&'a self, pool: &'a Pool<M>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let result = pool.check_idle(
                |resource, _| match run_check(|r| self.checker.check(r), resource) {
                    Ok(()) => true,
                    Err(failure) => {
                        tracing::debug!(pool = pool.name(), %failure, "keepalive rejected idle item");
                        false
                    }
                },
                DestroyReason::KeepAliveFailed,
            );
            if result.removed > 0 {
                tracing::debug!(
                    pool = pool.name(),
                    removed = result.removed,
                    retained = result.retained,
                    "closed idle items failing keepalive"
                );
            }
            Ok(())
        })
    }
}
