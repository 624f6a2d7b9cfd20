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
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Identifier of an item, unique for the lifetime of its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub(crate) u64);

impl ItemId {
    /// Returns the raw value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLifecycle {
    /// Owned by the pool and ready to be handed out.
    Idle,
    /// Owned by a borrower.
    Borrowed,
    /// Owned by a borrower and will be closed when returned.
    Retiring,
    /// Closed, or never known to the pool.
    Closed,
}

/// Statistics regarding an item of the pool.
#[derive(Debug, Clone, Copy)]
pub struct ItemStatus {
    created: Instant,
    pub(crate) last_used: Instant,
    pub(crate) borrow_count: usize,
}

impl ItemStatus {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            created: now,
            last_used: now,
            borrow_count: 0,
        }
    }

    /// Returns the instant when this item was created.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Returns the instant when this item was last borrowed or returned.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Returns the number of times the item has been borrowed.
    pub fn borrow_count(&self) -> usize {
        self.borrow_count
    }

    /// Age of the item at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }

    /// Time since last use at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }
}

/// A factory that creates new resources and destroys retired ones.
pub trait ManageResource: Send + Sync + 'static {
    /// The type of resources that this instance creates.
    type Resource: Send + 'static;

    /// The type of errors that [`ManageResource::create`] can return.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates a new resource.
    fn create(&self) -> impl Future<Output = Result<Self::Resource, Self::Error>> + Send;

    /// Closes a resource the pool no longer needs.
    ///
    /// Called without any pool lock held, but must not block: return paths run it
    /// synchronously. The default implementation just drops the resource.
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}

/// Queue strategy when dequeuing idle items from the pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum QueueStrategy {
    /// First in first out.
    ///
    /// Spreads borrows evenly across idle items.
    #[default]
    Fifo,
    /// Last in first out.
    ///
    /// Keeps a hot set of items busy and lets the rest age out.
    Lifo,
}
