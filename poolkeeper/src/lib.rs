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

//! A bounded async resource pool for Rust.
//!
//! The pool lends out at most `capacity` expensive resources, such as database connections, to
//! any number of concurrent borrowers. Idle resources pass a [`HealthCheckChain`] before they are
//! handed out, and background maintenance keeps the pool in shape: it closes idle resources past
//! their idle timeout and keeps `min_idle` of them ready, retires resources past their maximum
//! lifetime, reports borrows held suspiciously long, and runs keepalive checks.
//!
//! # Example
//!
//! ```
//! use std::io;
//! use std::time::Duration;
//!
//! use poolkeeper::ManageResource;
//! use poolkeeper::PoolBuilder;
//!
//! struct Connection {
//!     open: bool,
//! }
//!
//! impl Connection {
//!     async fn query(&self) -> i32 {
//!         42
//!     }
//! }
//!
//! struct Manager;
//! impl ManageResource for Manager {
//!     type Resource = Connection;
//!     type Error = io::Error;
//!
//!     async fn create(&self) -> Result<Self::Resource, Self::Error> {
//!         Ok(Connection { open: true })
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = PoolBuilder::new(Manager, 16)
//!     .min_idle(2)
//!     .leak_threshold(Some(Duration::from_secs(60)))
//!     .health_check(|c: &mut Connection| c.open)
//!     .build()
//!     .unwrap();
//!
//! let conn = pool.get().await.unwrap();
//! assert_eq!(conn.query().await, 42);
//! drop(conn);
//!
//! assert_eq!(pool.status().idle_count, 1);
//! pool.close().await;
//! # }
//! ```

mod builder;
mod config;
mod error;
mod event;
mod health;
mod idle;
mod manage;
mod pool;
mod registry;
mod task;

pub mod maintenance;

pub use builder::PoolBuilder;
pub use config::PoolConfig;
pub use error::BoxError;
pub use error::Error;
pub use error::Result;
pub use event::DestroyReason;
pub use event::EventSink;
pub use event::PoolEvent;
pub use event::TracingSink;
pub use health::CheckFailure;
pub use health::HealthCheck;
pub use health::HealthCheckChain;
pub use health::KeepAlive;
pub use health::KeepAliveFn;
pub use health::keepalive_fn;
pub use manage::ItemId;
pub use manage::ItemLifecycle;
pub use manage::ItemStatus;
pub use manage::ManageResource;
pub use manage::QueueStrategy;
pub use pool::Pool;
pub use pool::PoolItem;
pub use pool::PoolStatus;
pub use pool::RetainResult;
pub use registry::ManagedPool;
pub use registry::PoolRegistry;
pub use task::TaskContext;
pub use task::TaskId;
pub use task::TaskScopedHandle;
