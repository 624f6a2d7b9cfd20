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

use crate::ItemId;
use crate::TaskId;

/// A type-erased error, as returned by resource factories and predicates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The result type of pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the pool.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool configuration is invalid.
    ///
    /// Only returned while building a pool or registering it, never by a running pool.
    #[error("invalid pool configuration: {0}")]
    Configuration(String),

    /// The resource factory failed to create a new resource.
    #[error("pool {pool}: failed to construct a resource")]
    Construction {
        /// Name of the pool.
        pool: String,
        /// The error returned by the factory.
        #[source]
        source: BoxError,
    },

    /// No slot became free before the deadline.
    #[error("pool {pool}: timed out after {timeout:?} waiting for a free slot")]
    Timeout {
        /// Name of the pool.
        pool: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The pool has been closed.
    #[error("pool {0} is closed")]
    Closed(String),

    /// The item returned is not currently borrowed from this pool.
    #[error("pool {pool}: item {item} is not borrowed from this pool")]
    NotOwned {
        /// Name of the pool the item was returned to.
        pool: String,
        /// Id of the offending item.
        item: ItemId,
    },

    /// The pool binds items to tasks and was asked for an item outside of one.
    #[error("pool {0} binds items to tasks; borrow through TaskScopedHandle::acquire")]
    TaskRequired(String),

    /// The task has already finished and cannot hold new items.
    #[error("task {0} has already finished")]
    TaskFinished(TaskId),
}

impl Error {
    pub(crate) fn construction(pool: &str, source: impl Into<BoxError>) -> Self {
        Error::Construction {
            pool: pool.to_string(),
            source: source.into(),
        }
    }

    /// Whether the error is transient and a later borrow may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Construction { .. })
    }
}
