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

use log;

/// Manages a generic, thread-safe message channel.
///
/// Producers may live on any thread; the owner of the bus drains it at the
/// synchronization points it chooses. Draining only takes what was queued when
/// the drain started, so a consumer that re-publishes while draining cannot loop
/// forever within a single drain.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new EventBus with an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::trace!("EventBus initialized.");
        Self { sender, receiver }
    }

    /// Attempts to send a message, logging an error if the receiver is disconnected.
    pub fn publish(&self, message: T) {
        if let Err(e) = self.sender.send(message) {
            log::error!("Failed to send message: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sender end of the channel.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns the number of messages currently queued.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Removes every message that was queued when the call started.
    pub fn drain_pending(&self) -> Vec<T> {
        let count = self.receiver.len();
        let mut drained = Vec::with_capacity(count);
        for _ in 0..count {
            match self.receiver.try_recv() {
                Ok(message) => drained.push(message),
                Err(_) => break,
            }
        }
        drained
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
