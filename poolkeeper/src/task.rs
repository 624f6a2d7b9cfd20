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

//! Task-affine borrowing.
//!
//! A [`TaskContext`] stands for one logical task. It is passed explicitly to whatever needs to
//! know which task is running, and runs its end-of-task callbacks exactly once when the task
//! finishes. [`TaskScopedHandle`] builds on it: one borrowed item per task and pool, returned to
//! the pool when the task ends, whether or not the task remembered to return it.
//!
//! ```
//! use std::convert::Infallible;
//!
//! use poolkeeper::ManageResource;
//! use poolkeeper::PoolBuilder;
//! use poolkeeper::TaskContext;
//! use poolkeeper::TaskId;
//! use poolkeeper::TaskScopedHandle;
//!
//! struct Manager;
//! impl ManageResource for Manager {
//!     type Resource = Vec<u8>;
//!     type Error = Infallible;
//!
//!     async fn create(&self) -> Result<Self::Resource, Self::Error> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = PoolBuilder::new(Manager, 4).bind_to_task(true).build().unwrap();
//!
//! let p = pool.clone();
//! TaskContext::scope(TaskId::next(), |ctx| async move {
//!     let handle = TaskScopedHandle::acquire(&ctx, &p).await.unwrap();
//!     handle.lock().await.unwrap().push(42);
//!     // no explicit return: the item goes back when the task ends
//! })
//! .await;
//!
//! assert_eq!(pool.status().idle_count, 1);
//! # }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tokio::sync::MappedMutexGuard;
use tokio::sync::MutexGuard;
use tokio::sync::OnceCell;

use crate::Error;
use crate::ItemId;
use crate::ManageResource;
use crate::Pool;
use crate::PoolItem;
use crate::Result;

/// Identifier of a logical task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a task id from a raw value chosen by the caller.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh task id, distinct from every other id allocated this way.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct TaskState {
    finished: bool,
    on_end: Vec<Callback>,
    /// Per-pool handle cells, keyed by pool address.
    handles: HashMap<usize, Arc<dyn Any + Send + Sync>>,
}

/// The handle a task holds from one pool.
///
/// The weak pool reference pins the pool address, so the key of this cell cannot be taken over
/// by another pool while the cell exists.
struct HandleCell<M: ManageResource> {
    pool: Weak<Pool<M>>,
    handle: OnceCell<TaskScopedHandle<M>>,
}

/// The identity and end-of-task hooks of one logical task.
pub struct TaskContext {
    id: TaskId,
    state: Mutex<TaskState>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("finished", &state.finished)
            .field("callbacks", &state.on_end.len())
            .field("handles", &state.handles.len())
            .finish()
    }
}

impl TaskContext {
    /// Creates the context of a task that has just started.
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            state: Mutex::new(TaskState::default()),
        }
    }

    /// Runs `f` as the task `id` and finishes the task however `f` ends.
    ///
    /// The end-of-task callbacks run when the future completes, panics, or is dropped before
    /// completion.
    pub async fn scope<F, Fut>(id: TaskId, f: F) -> Fut::Output
    where
        F: FnOnce(Arc<TaskContext>) -> Fut,
        Fut: Future,
    {
        let ctx = Arc::new(TaskContext::new(id));
        let _finish = scopeguard::guard(ctx.clone(), |ctx| ctx.finish());
        f(ctx).await
    }

    /// Returns the id of the task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Registers `callback` to run when the task ends.
    ///
    /// If the task has already finished, `callback` runs immediately.
    pub fn on_task_end(&self, callback: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        if state.finished {
            drop(state);
            callback();
        } else {
            state.on_end.push(Box::new(callback));
        }
    }

    /// Ends the task, running every registered callback exactly once.
    ///
    /// Later calls do nothing. Dropping the context finishes it as well.
    pub fn finish(&self) {
        let (callbacks, handles) = {
            let mut state = self.state.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            (
                std::mem::take(&mut state.on_end),
                std::mem::take(&mut state.handles),
            )
        };

        for callback in callbacks {
            callback();
        }
        drop(handles);
    }

    fn handle_cell<M: ManageResource>(
        &self,
        pool: &Arc<Pool<M>>,
    ) -> Result<Arc<HandleCell<M>>> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(Error::TaskFinished(self.id));
        }

        let key = Arc::as_ptr(pool) as usize;
        if let Some(cell) = state.handles.get(&key) {
            if let Ok(cell) = cell.clone().downcast::<HandleCell<M>>() {
                if Weak::ptr_eq(&cell.pool, &Arc::downgrade(pool)) {
                    return Ok(cell);
                }
            }
        }

        let cell = Arc::new(HandleCell {
            pool: Arc::downgrade(pool),
            handle: OnceCell::new(),
        });
        state.handles.insert(key, cell.clone());
        Ok(cell)
    }
}

impl Drop for TaskContext {
    fn drop(&mut self) {
        self.finish();
    }
}

type Slot<M> = tokio::sync::Mutex<Option<PoolItem<M>>>;

/// An item borrowed for the lifetime of one task.
///
/// Clones share the same item. The item goes back to its pool exactly once, when the owning
/// task ends; afterwards [`TaskScopedHandle::lock`] returns `None`.
pub struct TaskScopedHandle<M: ManageResource> {
    id: ItemId,
    task: TaskId,
    slot: Arc<Slot<M>>,
}

impl<M: ManageResource> Clone for TaskScopedHandle<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            task: self.task,
            slot: self.slot.clone(),
        }
    }
}

impl<M: ManageResource> fmt::Debug for TaskScopedHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScopedHandle")
            .field("id", &self.id)
            .field("task", &self.task)
            .finish()
    }
}

impl<M: ManageResource> TaskScopedHandle<M> {
    /// Returns the item the task `ctx` holds from `pool`, borrowing one first if needed.
    ///
    /// A task holds at most one item per pool: repeated and concurrent calls within the same
    /// task share a single borrow.
    pub async fn acquire(ctx: &TaskContext, pool: &Arc<Pool<M>>) -> Result<Self> {
        let cell = ctx.handle_cell(pool)?;
        let handle = cell
            .handle
            .get_or_try_init(|| async {
                let item = pool
                    .borrow(Some(ctx.id()), pool.config().borrow_timeout)
                    .await?;
                let handle = TaskScopedHandle {
                    id: item.id(),
                    task: ctx.id(),
                    slot: Arc::new(tokio::sync::Mutex::new(Some(item))),
                };
                let slot = handle.slot.clone();
                ctx.on_task_end(move || release_slot(slot));
                Ok::<_, Error>(handle)
            })
            .await?;
        Ok(handle.clone())
    }

    /// Returns the id of the held item.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns the id of the owning task.
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Locks the held resource, or returns `None` once the item is back in its pool.
    ///
    /// Holding the guard across another `lock` of the same handle deadlocks.
    pub async fn lock(&self) -> Option<MappedMutexGuard<'_, M::Resource>> {
        let guard = self.slot.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_deref_mut()).ok()
    }

    /// Whether the item has already been returned to its pool.
    pub fn is_released(&self) -> bool {
        match self.slot.try_lock() {
            Ok(slot) => slot.is_none(),
            Err(_) => false,
        }
    }
}

fn release_slot<M: ManageResource>(slot: Arc<Slot<M>>) {
    let taken = slot.try_lock().map(|mut guard| guard.take());
    match taken {
        Ok(item) => {
            if let Some(item) = item {
                item.give_back();
            }
        }
        Err(_) => {
            // a guard outlived its task; return the item once it is released
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let item = slot.lock().await.take();
                    if let Some(item) = item {
                        item.give_back();
                    }
                });
            }
        }
    }
}
