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

//! Background maintenance of a pool.
//!
//! Each [`MaintenanceTask`] runs periodically on its own tokio task, next to the borrowers of the
//! pool. A run must be short: closing or creating a handful of items is fine, bulk work is not.
//! The scheduler only keeps a [`Weak`] reference to the pool and stops once the pool is closed
//! or dropped.

mod keepalive;
mod leak;
mod lifetime;
mod resizer;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

pub use self::keepalive::KeepaliveChecker;
pub use self::leak::LeakDetector;
pub use self::lifetime::LifetimeRetirer;
pub use self::resizer::Resizer;
use crate::ManageResource;
use crate::Pool;
use crate::PoolEvent;
use crate::Result;

/// A periodic background procedure keeping the invariants of a pool.
pub trait MaintenanceTask<M: ManageResource>: Send + Sync + 'static {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// How often the task runs.
    fn interval(&self) -> Duration;

    /// Runs the task once.
    fn run<'a>(&'a self, pool: &'a Pool<M>) -> BoxFuture<'a, Result<()>>;
}

/// Runs a set of [`MaintenanceTask`]s, each on its own interval.
///
/// Dropping the scheduler stops every task.
pub struct MaintenanceScheduler {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("tasks", &self.task_names())
            .finish()
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}

impl MaintenanceScheduler {
    /// Spawns every task onto the current tokio runtime.
    ///
    /// Each task first runs one interval after the start.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start<M: ManageResource>(
        pool: &Arc<Pool<M>>,
        tasks: Vec<Box<dyn MaintenanceTask<M>>>,
    ) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|task| {
                let name = task.name();
                let handle = tokio::spawn(drive(Arc::downgrade(pool), task));
                (name, handle)
            })
            .collect();
        Self { tasks }
    }

    /// Names of the scheduled tasks.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Stops every task.
    pub fn stop(self) {
        drop(self);
    }
}

async fn drive<M: ManageResource>(pool: Weak<Pool<M>>, task: Box<dyn MaintenanceTask<M>>) {
    let period = task.interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(pool) = pool.upgrade() else {
            break;
        };
        if pool.is_closed() {
            break;
        }

        let error = match AssertUnwindSafe(task.run(&pool)).catch_unwind().await {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };
        pool.emit(PoolEvent::MaintenanceFailed {
            task: task.name(),
            error,
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
