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

//! The bounded pool and its borrow/return protocol.
//!
//! The pool is bounded by [`PoolConfig::capacity`]. Every borrower holds one slot permit while it
//! waits for, constructs, or uses an item; once every permit is taken, [`Pool::get`] waits in
//! FIFO order until an item is returned or retired, or until its deadline elapses.
//!
//! A pool is always used wrapped in an [`Arc`]; borrowed items and background maintenance only
//! keep a [`Weak`] reference, so dropping the last [`Arc`] tears the pool down.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use mea::semaphore::OwnedSemaphorePermit;
use mea::semaphore::Semaphore;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::DestroyReason;
use crate::Error;
use crate::EventSink;
use crate::HealthCheckChain;
use crate::ItemId;
use crate::ItemLifecycle;
use crate::ItemStatus;
use crate::ManageResource;
use crate::PoolConfig;
use crate::PoolEvent;
use crate::Result;
use crate::TaskId;
use crate::idle::Entry;
use crate::idle::IdleQueue;
use crate::maintenance::MaintenanceScheduler;

/// The current pool status.
///
/// See [`Pool::status`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolStatus {
    /// The maximum number of live items.
    pub capacity: usize,

    /// The current number of live items.
    pub current_size: usize,

    /// The number of idle items in the pool.
    pub idle_count: usize,

    /// The number of borrowed items.
    pub borrowed_count: usize,

    /// The number of borrows waiting for an item.
    pub wait_count: usize,
}

/// The result returned by [`Pool::retain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct RetainResult {
    /// The number of idle items kept.
    pub retained: usize,
    /// The number of idle items closed.
    pub removed: usize,
}

/// Bookkeeping of a borrowed item.
#[derive(Debug)]
pub(crate) struct Lease {
    pub(crate) status: ItemStatus,
    pub(crate) owner: Option<TaskId>,
    pub(crate) retiring: bool,
}

#[derive(Debug)]
pub(crate) struct Slots<T> {
    pub(crate) idle: IdleQueue<T>,
    pub(crate) leases: HashMap<ItemId, Lease>,
    /// Idle items taken out of the queue by a running keepalive check.
    checking: HashSet<ItemId>,
    current_size: usize,
    max_size: usize,
}

impl<T> Slots<T> {
    fn check_size(&self) {
        assert!(
            self.current_size <= self.max_size,
            "invariant broken: current_size <= max_size (actual: {} <= {})",
            self.current_size,
            self.max_size,
        );
    }
}

/// Generic bounded pool of resources created by a [`ManageResource`].
///
/// Build one with [`PoolBuilder`](crate::PoolBuilder). See the
/// [module level documentation](self) for more.
pub struct Pool<M: ManageResource> {
    name: String,
    config: PoolConfig,
    manager: Arc<M>,
    health: HealthCheckChain<M::Resource>,
    sink: Arc<dyn EventSink>,

    /// A counter that tracks the sum of waiters + borrowed items.
    users: AtomicUsize,
    /// A semaphore that limits the number of concurrent borrowers.
    permits: Arc<Semaphore>,
    /// Idle items and leases of borrowed ones.
    slots: Mutex<Slots<M::Resource>>,
    next_id: AtomicU64,
    closed: watch::Sender<bool>,
    /// Notified whenever a lease ends.
    returned: Notify,
    scheduler: Mutex<Option<MaintenanceScheduler>>,
}

impl<M: ManageResource> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<M: ManageResource> Drop for Pool<M> {
    fn drop(&mut self) {
        for entry in self.slots.get_mut().idle.drain() {
            self.manager.destroy(entry.resource);
        }
    }
}

impl<M: ManageResource> Pool<M> {
    pub(crate) fn new(
        name: String,
        config: PoolConfig,
        manager: M,
        health: HealthCheckChain<M::Resource>,
        sink: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        let slots = Mutex::new(Slots {
            idle: IdleQueue::with_capacity(config.capacity),
            leases: HashMap::with_capacity(config.capacity),
            checking: HashSet::new(),
            current_size: 0,
            max_size: config.capacity,
        });

        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            name,
            config,
            manager: Arc::new(manager),
            health,
            sink,
            users: AtomicUsize::new(0),
            permits: Arc::new(Semaphore::new(config.capacity)),
            slots,
            next_id: AtomicU64::new(0),
            closed,
            returned: Notify::new(),
            scheduler: Mutex::new(None),
        })
    }

    pub(crate) fn attach_scheduler(&self, scheduler: MaintenanceScheduler) {
        *self.scheduler.lock() = Some(scheduler);
    }

    /// Returns the name of the pool.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration of the pool.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the resource factory of the pool.
    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Whether [`Pool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Names of the running maintenance tasks.
    pub fn maintenance_tasks(&self) -> Vec<&'static str> {
        self.scheduler
            .lock()
            .as_ref()
            .map(|s| s.task_names())
            .unwrap_or_default()
    }

    /// Retrieves a [`PoolItem`] from this [`Pool`], waiting at most
    /// [`PoolConfig::borrow_timeout`] for a free slot.
    pub async fn get(self: &Arc<Self>) -> Result<PoolItem<M>> {
        self.get_timeout(self.config.borrow_timeout).await
    }

    /// Retrieves a [`PoolItem`] from this [`Pool`], waiting at most `deadline` for a free slot.
    ///
    /// Idle items are health checked before they are handed out; items failing the check are
    /// closed and the next candidate is tried. When no idle item is left, a new one is created,
    /// once: a factory failure is returned as [`Error::Construction`].
    ///
    /// Pools with [`PoolConfig::bind_to_task`] refuse this call with [`Error::TaskRequired`];
    /// borrow through [`TaskScopedHandle::acquire`](crate::TaskScopedHandle::acquire) instead.
    pub async fn get_timeout(self: &Arc<Self>, deadline: Duration) -> Result<PoolItem<M>> {
        if self.config.bind_to_task {
            return Err(Error::TaskRequired(self.name.clone()));
        }
        self.borrow(None, deadline).await
    }

    pub(crate) async fn borrow(
        self: &Arc<Self>,
        owner: Option<TaskId>,
        deadline: Duration,
    ) -> Result<PoolItem<M>> {
        self.ensure_open()?;
        self.users.fetch_add(1, Ordering::Relaxed);

        let guard = scopeguard::guard((), |()| {
            self.users.fetch_sub(1, Ordering::Relaxed);
        });

        let permit = self.acquire_permit(deadline).await?;

        let mut entry = loop {
            self.ensure_open()?;

            let candidate = self.slots.lock().idle.pop(self.config.queue_strategy);
            match candidate {
                None => break self.construct().await?,
                Some(mut entry) => {
                    if self.is_expired(&entry.status, Instant::now()) {
                        self.discard(entry, DestroyReason::Expired);
                        continue;
                    }

                    match self.health.evaluate(&mut entry.resource) {
                        Ok(()) => break entry,
                        Err((check, failure)) => {
                            tracing::debug!(
                                pool = %self.name,
                                item = %entry.id,
                                check,
                                %failure,
                                "health check rejected idle item"
                            );
                            self.discard(entry, DestroyReason::HealthCheckFailed);
                        }
                    }
                }
            }
        };

        entry.status.last_used = Instant::now();
        entry.status.borrow_count += 1;

        let leased = {
            let mut slots = self.slots.lock();
            if self.is_closed() {
                false
            } else {
                let lease = Lease {
                    status: entry.status,
                    owner,
                    retiring: false,
                };
                slots.leases.insert(entry.id, lease);
                true
            }
        };
        if !leased {
            self.discard(entry, DestroyReason::PoolClosed);
            return Err(Error::Closed(self.name.clone()));
        }

        self.emit(PoolEvent::Borrowed {
            item: entry.id,
            owner,
        });
        scopeguard::ScopeGuard::into_inner(guard);
        Ok(PoolItem {
            entry: Some(entry),
            owner,
            permit,
            pool: Arc::downgrade(self),
            manager: self.manager.clone(),
        })
    }

    /// Returns a borrowed item to the pool.
    ///
    /// Dropping a [`PoolItem`] does the same when [`PoolConfig::auto_return`] is enabled.
    ///
    /// An item that is not borrowed from this pool is rejected with [`Error::NotOwned`], which is
    /// also logged; the item then goes back to the pool it came from.
    pub fn release(self: &Arc<Self>, mut item: PoolItem<M>) -> Result<()> {
        if !std::ptr::eq(item.pool.as_ptr(), Arc::as_ptr(self)) {
            let id = item.id();
            self.emit(PoolEvent::NotOwned { item: id });
            return Err(Error::NotOwned {
                pool: self.name.clone(),
                item: id,
            });
        }

        match item.entry.take() {
            Some(entry) => self.checkin(entry),
            None => Ok(()),
        }
    }

    /// Retains only the idle items that pass the given predicate, closing the others.
    ///
    /// This function blocks the entire pool. Therefore, the given function should not block.
    pub fn retain(
        &self,
        f: impl FnMut(&mut M::Resource, &ItemStatus) -> bool,
    ) -> RetainResult {
        self.retain_idle(f, DestroyReason::Removed)
    }

    /// Returns the lifecycle state of the item `id`.
    pub fn lifecycle(&self, id: ItemId) -> ItemLifecycle {
        let slots = self.slots.lock();
        match slots.leases.get(&id) {
            Some(lease) if lease.retiring => ItemLifecycle::Retiring,
            Some(_) => ItemLifecycle::Borrowed,
            None if slots.idle.contains(id) || slots.checking.contains(&id) => {
                ItemLifecycle::Idle
            }
            None => ItemLifecycle::Closed,
        }
    }

    /// Returns the current status of the pool.
    ///
    /// The wait count is not guaranteed to be consistent with the other numbers under heavy
    /// load. It is meant for an overall insight.
    pub fn status(&self) -> PoolStatus {
        let slots = self.slots.lock();
        let (current_size, idle_count, borrowed_count) =
            (
                slots.current_size,
                slots.idle.len() + slots.checking.len(),
                slots.leases.len(),
            );
        drop(slots);

        let users = self.users.load(Ordering::Relaxed);
        PoolStatus {
            capacity: self.config.capacity,
            current_size,
            idle_count,
            borrowed_count,
            wait_count: users.saturating_sub(borrowed_count),
        }
    }

    /// Closes the pool.
    ///
    /// New and waiting borrows fail with [`Error::Closed`], maintenance stops, and idle items are
    /// closed. Then waits at most [`PoolConfig::return_timeout`] for borrowed items to come
    /// back; they are closed on return. Calling it again does nothing.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }

        let drained = {
            let mut slots = self.slots.lock();
            let drained = slots.idle.drain();
            slots.current_size -= drained.len();
            drained
        };
        for entry in drained {
            self.destroy(entry, DestroyReason::PoolClosed);
        }

        let outstanding = self
            .wait_for_leases(self.config.return_timeout, |leases| leases.len())
            .await;
        self.emit(PoolEvent::Closed { outstanding });
    }

    /// Replenishes the idle items with at most `most` new items:
    ///
    /// 1. If the pool has fewer free slots than `most`, narrow `most` to the number of slots.
    /// 2. If there is already any idle item in the pool, decrease `most` by the number of idle
    ///    items.
    /// 3. If [`ManageResource::create`] fails, logs the failure and continues to the next.
    ///
    /// Returns the number of items actually added to the pool.
    pub async fn replenish(&self, most: usize) -> usize {
        if self.is_closed() {
            return 0;
        }

        let mut permit = {
            let mut n = most;
            loop {
                match self.permits.try_acquire(n) {
                    Some(permit) => break permit,
                    None => {
                        n = n.min(self.permits.available_permits());
                        continue;
                    }
                }
            }
        };

        if permit.permits() == 0 {
            return 0;
        }

        let gap = {
            let idles = self.slots.lock().idle.len();
            if idles >= permit.permits() {
                return 0;
            }

            match permit.split(idles) {
                None => unreachable!(
                    "idles ({}) should be less than permits ({})",
                    idles,
                    permit.permits()
                ),
                Some(p) => {
                    // reduced by existing idle items and release the corresponding permits
                    drop(p);
                }
            }

            permit.permits()
        };

        let mut replenished = 0;
        for _ in 0..gap {
            if let Ok(entry) = self.construct().await {
                let rejected = {
                    let mut slots = self.slots.lock();
                    if self.is_closed() {
                        Some(entry)
                    } else {
                        slots.idle.push(entry);
                        None
                    }
                };
                match rejected {
                    Some(entry) => self.discard(entry, DestroyReason::PoolClosed),
                    None => replenished += 1,
                }
            }

            match permit.split(1) {
                None => unreachable!("permit must be greater than 0 at this point"),
                Some(p) => {
                    // always release one permit to unblock other waiters
                    drop(p);
                }
            }
        }

        replenished
    }

    pub(crate) fn retain_idle(
        &self,
        f: impl FnMut(&mut M::Resource, &ItemStatus) -> bool,
        reason: DestroyReason,
    ) -> RetainResult {
        let (retained, removed) = {
            let mut slots = self.slots.lock();
            let removed = slots.idle.retain(f);
            slots.current_size -= removed.len();
            (slots.idle.len(), removed)
        };

        let result = RetainResult {
            retained,
            removed: removed.len(),
        };
        for entry in removed {
            self.destroy(entry, reason);
        }
        result
    }

    /// Runs `f` on every idle item, one item at a time and outside the pool lock, closing the
    /// items it rejects.
    ///
    /// An item under check holds a slot permit, so the pool cannot grow past its capacity while
    /// the item is out of the idle queue. Items borrowed in the meantime are skipped. Once every
    /// permit is taken, the remaining items wait for the next run.
    pub(crate) fn check_idle(
        &self,
        mut f: impl FnMut(&mut M::Resource, &ItemStatus) -> bool,
        reason: DestroyReason,
    ) -> RetainResult {
        let mut result = RetainResult {
            retained: 0,
            removed: 0,
        };

        let ids = self.slots.lock().idle.ids();
        for id in ids {
            let Some(_permit) = self.permits.try_acquire(1) else {
                break;
            };

            let candidate = {
                let mut slots = self.slots.lock();
                let entry = slots.idle.remove(id);
                if entry.is_some() {
                    slots.checking.insert(id);
                }
                entry
            };
            let Some(mut entry) = candidate else {
                continue;
            };

            let keep = f(&mut entry.resource, &entry.status);

            let rejected = {
                let mut slots = self.slots.lock();
                slots.checking.remove(&id);
                if keep && !self.is_closed() {
                    slots.idle.push(entry);
                    None
                } else {
                    slots.current_size -= 1;
                    Some(entry)
                }
            };
            match rejected {
                None => result.retained += 1,
                Some(entry) if keep => self.destroy(entry, DestroyReason::PoolClosed),
                Some(entry) => {
                    result.removed += 1;
                    self.destroy(entry, reason);
                }
            }
        }
        result
    }

    /// Closes idle items unused for longer than `idle_timeout`, keeping at least `floor` idle.
    ///
    /// The least recently returned items go first.
    pub(crate) fn trim_idle(
        &self,
        idle_timeout: Duration,
        floor: usize,
        now: Instant,
    ) -> RetainResult {
        let (retained, removed) = {
            let mut slots = self.slots.lock();
            let mut surplus = slots.idle.len().saturating_sub(floor);
            let removed = slots.idle.retain(|_, status| {
                if surplus > 0 && status.idle_for(now) > idle_timeout {
                    surplus -= 1;
                    false
                } else {
                    true
                }
            });
            slots.current_size -= removed.len();
            (slots.idle.len(), removed)
        };

        let result = RetainResult {
            retained,
            removed: removed.len(),
        };
        for entry in removed {
            self.destroy(entry, DestroyReason::IdleTimeout);
        }
        result
    }

    /// Borrowed items held for at least `threshold`, with their owner and holding time.
    pub(crate) fn leases_held_for(
        &self,
        threshold: Duration,
        now: Instant,
    ) -> Vec<(ItemId, Option<TaskId>, Duration)> {
        let slots = self.slots.lock();
        slots
            .leases
            .iter()
            .filter_map(|(id, lease)| {
                let held = lease.status.idle_for(now);
                (held >= threshold).then_some((*id, lease.owner, held))
            })
            .collect()
    }

    /// Marks borrowed items older than `max_lifetime` as retiring.
    ///
    /// Returns every retiring item; the newly marked ones are reported as events.
    pub(crate) fn mark_retiring(&self, max_lifetime: Duration, now: Instant) -> Vec<ItemId> {
        let mut marked = Vec::new();
        let mut retiring = Vec::new();
        {
            let mut slots = self.slots.lock();
            for (id, lease) in slots.leases.iter_mut() {
                if lease.status.age(now) <= max_lifetime {
                    continue;
                }
                if !lease.retiring {
                    lease.retiring = true;
                    marked.push((*id, lease.owner));
                }
                retiring.push(*id);
            }
        }

        for (item, owner) in marked {
            self.emit(PoolEvent::Retiring { item, owner });
        }
        retiring
    }

    /// Waits at most `wait` until `count` of the leases drops to zero.
    ///
    /// Returns the last observed count.
    pub(crate) async fn wait_for_leases(
        &self,
        wait: Duration,
        count: impl Fn(&HashMap<ItemId, Lease>) -> usize,
    ) -> usize {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.returned.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outstanding = count(&self.slots.lock().leases);
            if outstanding == 0 {
                return 0;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return outstanding;
            }
        }
    }

    pub(crate) fn is_expired(&self, status: &ItemStatus, now: Instant) -> bool {
        self.config
            .max_lifetime
            .is_some_and(|max_lifetime| status.age(now) > max_lifetime)
    }

    pub(crate) fn emit(&self, event: PoolEvent) {
        self.sink.log(event.level(), &self.name, &event);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed(self.name.clone()))
        } else {
            Ok(())
        }
    }

    async fn acquire_permit(&self, deadline: Duration) -> Result<OwnedSemaphorePermit> {
        let mut closed = self.closed.subscribe();
        let acquire = async {
            tokio::select! {
                permit = self.permits.clone().acquire_owned(1) => Ok(permit),
                _ = closed.wait_for(|closed| *closed) => Err(Error::Closed(self.name.clone())),
            }
        };

        tokio::time::timeout(deadline, acquire)
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout {
                    pool: self.name.clone(),
                    timeout: deadline,
                })
            })
    }

    async fn construct(&self) -> Result<Entry<M::Resource>> {
        match self.manager.create().await {
            Ok(resource) => {
                let id = ItemId(self.next_id.fetch_add(1, Ordering::Relaxed));
                {
                    let mut slots = self.slots.lock();
                    slots.current_size += 1;
                    slots.check_size();
                }
                self.emit(PoolEvent::Created { item: id });
                Ok(Entry {
                    id,
                    resource,
                    status: ItemStatus::new(Instant::now()),
                })
            }
            Err(err) => {
                self.emit(PoolEvent::ConstructionFailed {
                    error: err.to_string(),
                });
                Err(Error::construction(&self.name, err))
            }
        }
    }

    /// Takes a borrowed item back.
    fn checkin(self: &Arc<Self>, mut entry: Entry<M::Resource>) -> Result<()> {
        entry.status.last_used = Instant::now();
        let id = entry.id;

        let outcome = {
            let mut slots = self.slots.lock();
            slots.check_size();
            match slots.leases.remove(&id) {
                None => None,
                Some(lease) if lease.retiring || self.is_closed() => {
                    slots.current_size -= 1;
                    let reason = if lease.retiring {
                        DestroyReason::Expired
                    } else {
                        DestroyReason::PoolClosed
                    };
                    Some(Err((entry, reason, slots.current_size < self.config.min_idle)))
                }
                Some(_) => {
                    slots.idle.push(entry);
                    Some(Ok(()))
                }
            }
        };

        match outcome {
            None => {
                self.emit(PoolEvent::NotOwned { item: id });
                Err(Error::NotOwned {
                    pool: self.name.clone(),
                    item: id,
                })
            }
            Some(Ok(())) => {
                self.users.fetch_sub(1, Ordering::Relaxed);
                self.returned.notify_waiters();
                self.emit(PoolEvent::Returned { item: id });
                Ok(())
            }
            Some(Err((entry, reason, below_floor))) => {
                self.users.fetch_sub(1, Ordering::Relaxed);
                self.returned.notify_waiters();
                self.destroy(entry, reason);
                if below_floor && !self.is_closed() {
                    self.schedule_backfill();
                }
                Ok(())
            }
        }
    }

    /// Forgets the lease of a borrowed item that will not come back.
    fn end_lease(&self, id: ItemId) {
        let removed = {
            let mut slots = self.slots.lock();
            let removed = slots.leases.remove(&id).is_some();
            if removed {
                slots.current_size -= 1;
            }
            removed
        };

        if removed {
            self.users.fetch_sub(1, Ordering::Relaxed);
            self.returned.notify_waiters();
        }
    }

    /// Closes an item that is neither idle nor leased any more.
    fn discard(&self, entry: Entry<M::Resource>, reason: DestroyReason) {
        {
            let mut slots = self.slots.lock();
            slots.current_size -= 1;
        }
        self.destroy(entry, reason);
    }

    fn destroy(&self, entry: Entry<M::Resource>, reason: DestroyReason) {
        let item = entry.id;
        self.manager.destroy(entry.resource);
        self.emit(PoolEvent::Destroyed { item, reason });
    }

    fn schedule_backfill(self: &Arc<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let weak = Arc::downgrade(self);
        runtime.spawn(async move {
            if let Some(pool) = weak.upgrade() {
                let n = pool.replenish(pool.config.min_idle).await;
                tracing::debug!(pool = %pool.name, n, "backfilled retired items");
            }
        });
    }
}

/// A borrowed item of a [`Pool`].
///
/// This item implements [`Deref`] and [`DerefMut`]. You can use it as if it was of type
/// `M::Resource`.
///
/// This item implements [`Drop`] that returns the underlying resource to the pool on drop when
/// [`PoolConfig::auto_return`] is enabled, and closes it otherwise. An item outliving its pool
/// is closed through [`ManageResource::destroy`] on drop. You may call [`PoolItem::detach`] to
/// take the resource out of the pool for good.
pub struct PoolItem<M: ManageResource> {
    entry: Option<Entry<M::Resource>>,
    owner: Option<TaskId>,
    permit: OwnedSemaphorePermit,
    pool: Weak<Pool<M>>,
    manager: Arc<M>,
}

impl<M> fmt::Debug for PoolItem<M>
where
    M: ManageResource,
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolItem")
            .field("entry", &self.entry)
            .field("owner", &self.owner)
            .field("permit", &self.permit)
            .finish()
    }
}

impl<M: ManageResource> Drop for PoolItem<M> {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };
        let Some(pool) = self.pool.upgrade() else {
            self.manager.destroy(entry.resource);
            return;
        };

        if pool.config.auto_return {
            let _ = pool.checkin(entry);
        } else {
            pool.end_lease(entry.id);
            pool.destroy(entry, DestroyReason::Dropped);
        }
    }
}

impl<M: ManageResource> Deref for PoolItem<M> {
    type Target = M::Resource;
    fn deref(&self) -> &M::Resource {
        // `entry` is always `Some` while the item is owned.
        &self.entry.as_ref().unwrap().resource
    }
}

impl<M: ManageResource> DerefMut for PoolItem<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // `entry` is always `Some` while the item is owned.
        &mut self.entry.as_mut().unwrap().resource
    }
}

impl<M: ManageResource> AsRef<M::Resource> for PoolItem<M> {
    fn as_ref(&self) -> &M::Resource {
        self
    }
}

impl<M: ManageResource> AsMut<M::Resource> for PoolItem<M> {
    fn as_mut(&mut self) -> &mut M::Resource {
        self
    }
}

impl<M: ManageResource> PoolItem<M> {
    /// Detaches the item from the [`Pool`] and hands out its resource.
    ///
    /// This frees one slot of the pool; the pool never sees the resource again.
    pub fn detach(mut self) -> M::Resource {
        // `entry` is always `Some` while the item is owned.
        let entry = self.entry.take().unwrap();
        if let Some(pool) = self.pool.upgrade() {
            pool.end_lease(entry.id);
        }
        entry.resource
    }

    /// Returns the id of the item.
    pub fn id(&self) -> ItemId {
        // `entry` is always `Some` while the item is owned.
        self.entry.as_ref().unwrap().id
    }

    /// Returns the status of the item.
    pub fn status(&self) -> ItemStatus {
        // `entry` is always `Some` while the item is owned.
        self.entry.as_ref().unwrap().status
    }

    /// Returns the task that borrowed the item, if any.
    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    /// Returns the item to its pool regardless of [`PoolConfig::auto_return`].
    pub(crate) fn give_back(self) {
        match self.pool.upgrade() {
            Some(pool) => {
                let _ = pool.release(self);
            }
            None => drop(self),
        }
    }
}
