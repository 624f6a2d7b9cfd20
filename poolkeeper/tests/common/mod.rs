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

#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use poolkeeper::EventSink;
use poolkeeper::ManageResource;
use poolkeeper::PoolEvent;
use tracing::Level;

#[derive(Debug, Default)]
pub struct Counters {
    created: AtomicU64,
    destroyed: AtomicU64,
    failing: AtomicBool,
}

impl Counters {
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

/// Creates `u64` resources numbered in creation order.
pub struct CountingManager {
    counters: Arc<Counters>,
    delay: Duration,
}

impl CountingManager {
    pub fn new() -> (Self, Arc<Counters>) {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let manager = Self {
            counters: counters.clone(),
            delay,
        };
        (manager, counters)
    }
}

impl ManageResource for CountingManager {
    type Resource = u64;
    type Error = io::Error;

    async fn create(&self) -> Result<Self::Resource, Self::Error> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.counters.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other("factory down"));
        }
        Ok(self.counters.created.fetch_add(1, Ordering::SeqCst))
    }

    fn destroy(&self, _: Self::Resource) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keeps every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<(Level, PoolEvent)>>>,
}

impl EventSink for RecordingSink {
    fn log(&self, level: Level, _: &str, event: &PoolEvent) {
        self.events.lock().unwrap().push((level, event.clone()));
    }
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PoolEvent> {
        let events = self.events.lock().unwrap();
        events.iter().map(|(_, event)| event.clone()).collect()
    }

    pub fn count(&self, f: impl Fn(&PoolEvent) -> bool) -> usize {
        let events = self.events.lock().unwrap();
        events.iter().filter(|(_, event)| f(event)).count()
    }

    pub fn levels(&self, f: impl Fn(&PoolEvent) -> bool) -> Vec<Level> {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .filter(|(_, event)| f(event))
            .map(|(level, _)| *level)
            .collect()
    }
}
