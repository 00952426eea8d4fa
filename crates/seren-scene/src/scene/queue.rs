// Copyright 2025 eraflo
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
use std::sync::{Mutex, PoisonError};

/// A thread-safe FIFO of deferred actions.
///
/// [`DeferredQueue::take_batch`] only takes what is queued when it is called,
/// so an action that enqueues another one defers it to the next batch.
pub(crate) struct DeferredQueue<A> {
    actions: Mutex<VecDeque<A>>,
}

impl<A> DeferredQueue<A> {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, action: A) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(action);
    }

    pub fn len(&self) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn take_batch(&self) -> Vec<A> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_preserve_fifo_order() {
        let queue = DeferredQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_batch(), vec![1, 2]);
        assert!(queue.take_batch().is_empty());
    }

    #[test]
    fn actions_pushed_during_a_batch_wait_for_the_next_one() {
        let queue: DeferredQueue<Box<dyn FnOnce(&DeferredQueue<u8>)>> = DeferredQueue::new();
        let inner = DeferredQueue::new();
        queue.push(Box::new(|q: &DeferredQueue<u8>| q.push(7)));

        for action in queue.take_batch() {
            action(&inner);
        }
        assert_eq!(inner.take_batch(), vec![7]);
    }
}
