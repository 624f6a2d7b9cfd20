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

//! Observable pool events and the sinks that consume them.

use std::fmt;
use std::time::Duration;

use tracing::Level;

use crate::ItemId;
use crate::TaskId;

/// Why the pool closed an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// A health check rejected the item before hand-off.
    HealthCheckFailed,
    /// A keepalive check rejected the idle item.
    KeepAliveFailed,
    /// The item exceeded its maximum lifetime.
    Expired,
    /// The item stayed idle longer than the idle timeout.
    IdleTimeout,
    /// The item was dropped by its borrower with auto return disabled.
    Dropped,
    /// The item was removed through [`Pool::retain`](crate::Pool::retain).
    Removed,
    /// The pool is closing.
    PoolClosed,
}

impl fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DestroyReason::HealthCheckFailed => "health check failed",
            DestroyReason::KeepAliveFailed => "keepalive failed",
            DestroyReason::Expired => "max lifetime exceeded",
            DestroyReason::IdleTimeout => "idle timeout exceeded",
            DestroyReason::Dropped => "dropped without release",
            DestroyReason::Removed => "removed",
            DestroyReason::PoolClosed => "pool closed",
        };
        f.write_str(reason)
    }
}

/// An event emitted by a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolEvent {
    /// A new item was created.
    Created {
        /// Id of the new item.
        item: ItemId,
    },
    /// The factory failed to create an item.
    ConstructionFailed {
        /// The factory error, rendered.
        error: String,
    },
    /// An item was handed out.
    Borrowed {
        /// Id of the item.
        item: ItemId,
        /// Task holding the item, if borrowed through a task.
        owner: Option<TaskId>,
    },
    /// An item came back to the idle queue.
    Returned {
        /// Id of the item.
        item: ItemId,
    },
    /// An item was closed and removed from the pool.
    Destroyed {
        /// Id of the item.
        item: ItemId,
        /// Why it was closed.
        reason: DestroyReason,
    },
    /// A borrowed item expired and will be closed when returned.
    Retiring {
        /// Id of the item.
        item: ItemId,
        /// Task holding the item, if any.
        owner: Option<TaskId>,
    },
    /// An item has been borrowed for longer than the leak threshold.
    LeakSuspected {
        /// Id of the item.
        item: ItemId,
        /// Task holding the item, if any.
        owner: Option<TaskId>,
        /// How long the item has been held.
        held: Duration,
    },
    /// An item that is not borrowed from the pool was returned to it.
    NotOwned {
        /// Id of the returned item.
        item: ItemId,
    },
    /// A maintenance task failed.
    MaintenanceFailed {
        /// Name of the task.
        task: &'static str,
        /// The failure, rendered.
        error: String,
    },
    /// The pool was closed.
    Closed {
        /// Borrowed items that were still outstanding after the return timeout.
        outstanding: usize,
    },
}

impl PoolEvent {
    /// The level the event is logged at.
    pub fn level(&self) -> Level {
        match self {
            PoolEvent::Borrowed { .. } | PoolEvent::Returned { .. } => Level::TRACE,
            PoolEvent::Destroyed {
                reason: DestroyReason::Dropped,
                ..
            } => Level::WARN,
            PoolEvent::Created { .. } | PoolEvent::Destroyed { .. } => Level::DEBUG,
            PoolEvent::Retiring { .. } | PoolEvent::Closed { .. } => Level::INFO,
            PoolEvent::ConstructionFailed { .. }
            | PoolEvent::LeakSuspected { .. }
            | PoolEvent::NotOwned { .. } => Level::WARN,
            PoolEvent::MaintenanceFailed { .. } => Level::ERROR,
        }
    }
}

/// A consumer of pool events, such as a logger or a metrics recorder.
pub trait EventSink: Send + Sync {
    /// Records an `event` emitted by the pool named `pool`.
    fn log(&self, level: Level, pool: &str, event: &PoolEvent);
}

/// An [`EventSink`] that forwards events to [`tracing`].
///
/// This is the default sink of every pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if level == Level::INFO {
            tracing::info!($($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    }};
}

impl EventSink for TracingSink {
    fn log(&self, level: Level, pool: &str, event: &PoolEvent) {
        match event {
            PoolEvent::Created { item } => {
                log_at!(level, pool, %item, "created pooled item")
            }
            PoolEvent::ConstructionFailed { error } => {
                log_at!(level, pool, %error, "failed to construct pooled item")
            }
            PoolEvent::Borrowed { item, owner } => {
                log_at!(level, pool, %item, owner = ?owner, "borrowed item")
            }
            PoolEvent::Returned { item } => {
                log_at!(level, pool, %item, "returned item")
            }
            PoolEvent::Destroyed { item, reason } => {
                log_at!(level, pool, %item, %reason, "closed pooled item")
            }
            PoolEvent::Retiring { item, owner } => {
                log_at!(level, pool, %item, owner = ?owner, "borrowed item expired; closing it on return")
            }
            PoolEvent::LeakSuspected { item, owner, held } => {
                log_at!(level, pool, %item, owner = ?owner, held = ?held, "item held past leak threshold")
            }
            PoolEvent::NotOwned { item } => {
                log_at!(level, pool, %item, "returned item is not borrowed from this pool")
            }
            PoolEvent::MaintenanceFailed { task, error } => {
                log_at!(level, pool, task, %error, "maintenance task failed")
            }
            PoolEvent::Closed { outstanding } => {
                log_at!(level, pool, outstanding, "pool closed")
            }
        }
    }
}
