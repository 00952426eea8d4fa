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

//! Run, suspend and stop signalling between the API and the loop thread.

use seren_core::Completion;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct ControlState {
    running: bool,
    parked: bool,
    suspend: Option<Completion<()>>,
    resume_pending: bool,
}

/// The loop's control block. Every wait of the loop thread goes through it so
/// that [`stop`](Self::stop) and [`resume`](Self::resume) wake it promptly.
#[derive(Default)]
pub(crate) struct LoopControl {
    state: Mutex<ControlState>,
    wake: Condvar,
}

impl LoopControl {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the loop as running. Returns false if it already was.
    pub fn start(&self) -> bool {
        let mut state = self.lock();
        !std::mem::replace(&mut state.running, true)
    }

    pub fn stop(&self) {
        let mut state = self.lock();
        state.running = false;
        state.parked = false;
        self.wake.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_parked(&self) -> bool {
        self.lock().parked
    }

    /// Requests a suspension. While one is pending, every caller gets the
    /// same handle; while the loop is parked, the handle is already complete.
    pub fn request_suspend(&self) -> Completion<()> {
        let mut state = self.lock();
        if state.parked {
            return Completion::completed(());
        }
        state.suspend.get_or_insert_with(Completion::new).clone()
    }

    /// Releases a parked loop, or makes a pending suspension resume right
    /// after parking. Returns false, doing nothing, when no suspension exists.
    pub fn resume(&self) -> bool {
        let mut state = self.lock();
        if state.parked {
            state.parked = false;
            self.wake.notify_all();
            true
        } else if state.suspend.is_some() {
            state.resume_pending = true;
            true
        } else {
            false
        }
    }

    /// Parks the calling loop thread if a suspension was requested, until
    /// resumed or stopped. Returns whether it parked.
    pub fn park_if_requested(&self) -> bool {
        let mut state = self.lock();
        let Some(suspend) = state.suspend.take() else {
            return false;
        };
        suspend.complete(());
        if std::mem::take(&mut state.resume_pending) {
            log::debug!("Frame loop suspended and resumed at once.");
            return false;
        }

        state.parked = true;
        log::info!("Frame loop suspended.");
        while state.parked && state.running {
            state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.parked = false;
        log::info!("Frame loop resumed.");
        true
    }

    /// Sleeps for `duration` unless stopped first. Returns whether the loop
    /// is still running.
    pub fn sleep(&self, duration: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .wake
            .wait_timeout_while(state, duration, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);
        state.running
    }
}
