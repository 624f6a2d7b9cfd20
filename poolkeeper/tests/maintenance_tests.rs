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

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::CountingManager;
use common::RecordingSink;
use futures::future::BoxFuture;
use poolkeeper::DestroyReason;
use poolkeeper::ItemLifecycle;
use poolkeeper::Pool;
use poolkeeper::PoolBuilder;
use poolkeeper::PoolEvent;
use poolkeeper::keepalive_fn;
use poolkeeper::maintenance::MaintenanceTask;
use tracing::Level;

fn is_leak(e: &PoolEvent) -> bool {
    matches!(e, PoolEvent::LeakSuspected { .. })
}

fn destroyed_for(reason: DestroyReason) -> impl Fn(&PoolEvent) -> bool {
    move |e| matches!(e, PoolEvent::Destroyed { reason: r, .. } if *r == reason)
}

#[tokio::test(start_paused = true)]
async fn test_leak_is_reported_once_per_interval() {
    let (manager, _) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 2)
        .leak_threshold(Some(Duration::from_secs(1)))
        .event_sink(sink.clone())
        .build()
        .unwrap();

    let item = pool.get().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(sink.levels(is_leak), vec![Level::WARN]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.count(is_leak), 2);

    // still usable, and returns normally
    assert_eq!(*item, 0);
    assert_eq!(pool.lifecycle(item.id()), ItemLifecycle::Borrowed);
    drop(item);
    assert_eq!(pool.status().idle_count, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.count(is_leak), 2);
}

#[tokio::test(start_paused = true)]
async fn test_leak_detector_never_reclaims() {
    let (manager, _) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 1)
        .leak_threshold(Some(Duration::from_millis(100)))
        .event_sink(sink.clone())
        .build()
        .unwrap();

    let mut item = pool.get().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(sink.count(is_leak) >= 9);

    assert_eq!(pool.lifecycle(item.id()), ItemLifecycle::Borrowed);
    let status = pool.status();
    assert_eq!(status.borrowed_count, 1);
    assert_eq!(status.idle_count, 0);
    *item += 10;

    pool.release(item).unwrap();
    assert_eq!(pool.status().idle_count, 1);
    assert_eq!(*pool.get().await.unwrap(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_expired_idle_item_is_replaced() {
    let (manager, counters) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 2)
        .min_idle(1)
        .max_lifetime(Some(Duration::from_secs(10)))
        .event_sink(sink.clone())
        .build()
        .unwrap();

    // the resizer creates the first idle item
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(pool.status().idle_count, 1);
    assert_eq!(counters.created(), 1);

    tokio::time::sleep(Duration::from_millis(11500)).await;
    assert_eq!(sink.count(destroyed_for(DestroyReason::Expired)), 1);
    assert_eq!(pool.status().idle_count, 1);
    assert_eq!(counters.created(), 2);

    let item = pool.get().await.unwrap();
    assert_eq!(item.id().get(), 1);
    assert_eq!(
        sink.count(|e| matches!(e, PoolEvent::Borrowed { item, .. } if item.get() == 0)),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_expired_idle_item_is_never_handed_out() {
    let (manager, _) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 2)
        .max_lifetime(Some(Duration::from_secs(10)))
        .retire_interval(Duration::from_secs(3600))
        .event_sink(sink.clone())
        .build()
        .unwrap();
    pool.replenish(1).await;

    tokio::time::sleep(Duration::from_secs(11)).await;
    let item = pool.get().await.unwrap();
    assert_eq!(*item, 1);
    assert_eq!(sink.count(destroyed_for(DestroyReason::Expired)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_borrowed_item_is_closed_on_return() {
    let (manager, counters) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 1)
        .min_idle(1)
        .max_lifetime(Some(Duration::from_secs(10)))
        .event_sink(sink.clone())
        .build()
        .unwrap();

    let item = pool.get().await.unwrap();
    let id = item.id();
    tokio::time::sleep(Duration::from_millis(11500)).await;

    assert_eq!(pool.lifecycle(id), ItemLifecycle::Retiring);
    assert_eq!(
        sink.count(|e| matches!(e, PoolEvent::Retiring { .. })),
        1
    );

    drop(item);
    assert_eq!(pool.lifecycle(id), ItemLifecycle::Closed);
    assert_eq!(counters.destroyed(), 1);

    // the freed slot is backfilled up to min_idle
    tokio::time::sleep(Duration::from_millis(10)).await;
    let status = pool.status();
    assert_eq!(status.idle_count, 1);
    assert_eq!(status.current_size, 1);
    assert_eq!(counters.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failing_keepalive_replaces_item() {
    let (manager, _) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 2)
        .keepalive(keepalive_fn(Duration::from_secs(1), |_: &mut u64| false))
        .event_sink(sink.clone())
        .build()
        .unwrap();
    pool.replenish(1).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(pool.status().idle_count, 0);
    assert_eq!(sink.count(destroyed_for(DestroyReason::KeepAliveFailed)), 1);

    let item = pool.get().await.unwrap();
    assert_eq!(item.id().get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_only_checks_idle_items() {
    let (manager, _) = CountingManager::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pool = PoolBuilder::new(manager, 2)
        .keepalive(keepalive_fn(Duration::from_secs(1), {
            let seen = seen.clone();
            move |r: &mut u64| {
                seen.lock().unwrap().push(*r);
                true
            }
        }))
        .build()
        .unwrap();

    let held = pool.get().await.unwrap();
    assert_eq!(pool.replenish(2).await, 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1]);

    drop(held);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(seen.lock().unwrap().contains(&0));
}

#[tokio::test(start_paused = true)]
async fn test_resizer_keeps_idle_floor() {
    let (manager, counters) = CountingManager::new();
    let pool = PoolBuilder::new(manager, 5).min_idle(3).build().unwrap();
    assert_eq!(pool.status().idle_count, 0);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(pool.status().idle_count, 3);
    assert_eq!(counters.created(), 3);

    // borrowing below the floor gets refilled on the next pass
    let a = pool.get().await.unwrap();
    let b = pool.get().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = pool.status();
    assert_eq!(status.idle_count, 3);
    assert_eq!(status.current_size, 5);
    drop((a, b));
}

#[tokio::test(start_paused = true)]
async fn test_resizer_closes_items_past_idle_timeout() {
    let (manager, counters) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 4)
        .min_idle(1)
        .idle_timeout(Some(Duration::from_secs(1)))
        .event_sink(sink.clone())
        .build()
        .unwrap();
    pool.replenish(4).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(pool.status().idle_count, 1);
    assert_eq!(counters.destroyed(), 3);
    assert_eq!(sink.count(destroyed_for(DestroyReason::IdleTimeout)), 3);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(pool.status().idle_count, 1);
}

struct Exploding;

impl MaintenanceTask<CountingManager> for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn run<'a>(&'a self, _: &'a Pool<CountingManager>) -> BoxFuture<'a, poolkeeper::Result<()>> {
        Box::pin(async { explode() })
    }
}

fn explode() -> poolkeeper::Result<()> {
    panic!("maintenance exploded")
}

struct Ticking {
    runs: Arc<AtomicUsize>,
}

impl MaintenanceTask<CountingManager> for Ticking {
    fn name(&self) -> &'static str {
        "ticking"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn run<'a>(&'a self, _: &'a Pool<CountingManager>) -> BoxFuture<'a, poolkeeper::Result<()>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_task_does_not_stop_maintenance() {
    let (manager, _) = CountingManager::new();
    let sink = RecordingSink::default();
    let pool = PoolBuilder::new(manager, 2)
        .min_idle(1)
        .maintenance_task(Exploding)
        .event_sink(sink.clone())
        .build()
        .unwrap();
    assert_eq!(pool.maintenance_tasks(), vec!["resizer", "exploding"]);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let failed = |e: &PoolEvent| {
        matches!(
            e,
            PoolEvent::MaintenanceFailed { task: "exploding", error } if error.contains("maintenance exploded")
        )
    };
    assert_eq!(sink.levels(failed), vec![Level::ERROR, Level::ERROR]);
    assert_eq!(pool.status().idle_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_stops_with_the_pool() {
    let (manager, _) = CountingManager::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let pool = PoolBuilder::new(manager, 1)
        .maintenance_task(Ticking { runs: runs.clone() })
        .build()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    pool.close().await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    let (manager, _) = CountingManager::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let pool = PoolBuilder::new(manager, 1)
        .maintenance_task(Ticking { runs: runs.clone() })
        .build()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    drop(pool);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_keepalive_does_not_block_the_pool() {
    let started = Arc::new(AtomicBool::new(false));
    let flag = started.clone();

    let (manager, _) = CountingManager::new();
    let pool = PoolBuilder::new(manager, 2)
        .keepalive(keepalive_fn(Duration::from_millis(20), move |_: &mut u64| {
            if !flag.swap(true, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(400));
            }
            true
        }))
        .build()
        .unwrap();
    pool.replenish(1).await;

    while !started.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let begin = std::time::Instant::now();
    let status = pool.status();
    let item = pool.get().await.unwrap();
    let elapsed = begin.elapsed();
    assert!(elapsed < Duration::from_millis(200), "{elapsed:?}");

    // the item under check still counts as idle
    assert_eq!(status.idle_count, 1);
    assert_eq!(status.borrowed_count, 0);
    assert!(status.current_size <= 2);
    drop(item);
}
