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

use std::collections::VecDeque;

use crate::ItemId;
use crate::ItemStatus;
use crate::QueueStrategy;

/// A resource together with its pool bookkeeping.
#[derive(Debug)]
pub(crate) struct Entry<T> {
    pub(crate) id: ItemId,
    pub(crate) resource: T,
    pub(crate) status: ItemStatus,
}

/// The idle items of a pool, oldest return at the front.
#[derive(Debug)]
pub(crate) struct IdleQueue<T> {
    entries: VecDeque<Entry<T>>,
}

impl<T> IdleQueue<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: ItemId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub(crate) fn ids(&self) -> Vec<ItemId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Option<Entry<T>> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(index)
    }

    pub(crate) fn push(&mut self, entry: Entry<T>) {
        self.entries.push_back(entry);
    }

    pub(crate) fn pop(&mut self, strategy: QueueStrategy) -> Option<Entry<T>> {
        match strategy {
            QueueStrategy::Fifo => self.entries.pop_front(),
            QueueStrategy::Lifo => self.entries.pop_back(),
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<Entry<T>> {
        self.entries.drain(..).collect()
    }

    /// Keeps only the entries for which `f` returns `true`, preserving their order.
    ///
    /// Returns the removed entries.
    pub(crate) fn retain(
        &mut self,
        mut f: impl FnMut(&mut T, &ItemStatus) -> bool,
    ) -> Vec<Entry<T>> {
        let len = self.entries.len();
        let mut kept = 0;
        let mut cur = 0;

        // Stage 1: skip the leading run of kept entries.
        while cur < len {
            let entry = &mut self.entries[cur];
            cur += 1;
            if !f(&mut entry.resource, &entry.status) {
                break;
            }
            kept += 1;
        }

        // Stage 2: move every further kept entry right behind the previous one.
        while cur < len {
            let entry = &mut self.entries[cur];
            if f(&mut entry.resource, &entry.status) {
                self.entries.swap(kept, cur);
                kept += 1;
            }
            cur += 1;
        }

        // Stage 3: everything behind the kept prefix is removed.
        if kept == len {
            Vec::new()
        } else {
            self.entries.split_off(kept).into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    fn queue(values: &[u32]) -> IdleQueue<u32> {
        let mut queue = IdleQueue::with_capacity(values.len());
        for (i, v) in values.iter().enumerate() {
            queue.push(Entry {
                id: ItemId(i as u64),
                resource: *v,
                status: ItemStatus::new(Instant::now()),
            });
        }
        queue
    }

    fn resources(queue: &IdleQueue<u32>) -> Vec<u32> {
        queue.entries.iter().map(|e| e.resource).collect()
    }

    #[test]
    fn test_retain_preserves_order() {
        let mut q = queue(&[1, 2, 3, 4, 5, 6]);
        let removed = q.retain(|r, _| *r % 2 == 0);
        assert_eq!(resources(&q), vec![2, 4, 6]);
        let mut removed: Vec<_> = removed.into_iter().map(|e| e.resource).collect();
        removed.sort();
        assert_eq!(removed, vec![1, 3, 5]);

        let removed = q.retain(|_, _| true);
        assert!(removed.is_empty());
        assert_eq!(q.len(), 3);

        let removed = q.retain(|_, _| false);
        assert_eq!(removed.len(), 3);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_pop_strategy() {
        let mut q = queue(&[1, 2, 3]);
        assert_eq!(q.pop(QueueStrategy::Fifo).map(|e| e.resource), Some(1));
        assert_eq!(q.pop(QueueStrategy::Lifo).map(|e| e.resource), Some(3));
        assert!(q.contains(ItemId(1)));
        assert!(!q.contains(ItemId(0)));
        assert_eq!(q.drain().len(), 1);
        assert!(q.pop(QueueStrategy::Fifo).is_none());
    }

    #[test]
    fn test_remove_by_id() {
        let mut q = queue(&[10, 20, 30]);
        assert_eq!(q.ids(), vec![ItemId(0), ItemId(1), ItemId(2)]);
        assert_eq!(q.remove(ItemId(1)).map(|e| e.resource), Some(20));
        assert!(q.remove(ItemId(1)).is_none());
        assert_eq!(resources(&q), vec![10, 30]);
    }
}
