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

//! The global frame loop.
//!
//! One [`FrameScheduler`] drives every registered [`ViewPipeline`] from a
//! single named thread. Each iteration runs two phases on a dedicated rayon
//! pool, each closed by a join barrier:
//!
//! 1. **Update & Prepare**: the views of each device are prepared in order,
//!    devices in parallel, while every distinct scene is updated exactly once.
//! 2. **Render & UpdateBeside**: one task per device renders its views while
//!    every scene culls for the next frame.
//!
//! Scenes that lost their last view are unloaded at the end of the iteration,
//! then frame waiters and after-frame callbacks queued before the iteration
//! started are released.

mod control;
mod frame;

use self::frame::{lock, FrameMessage, Shared};
use crate::error::{FrameError, SchedulerError};
use crate::pipeline::ViewPipeline;
use seren_core::{Completion, EngineContext, EngineFault, SchedulerConfig, Stopwatch};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Name of the loop thread.
pub const FRAME_LOOP_THREAD: &str = "seren-frame-loop";

/// Counters of the frame loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Iterations that completed.
    pub frames: u64,
    /// Time between the starts of the last two iterations.
    pub last_delta: Duration,
    /// Duration of the last completed iteration.
    pub last_frame: Duration,
    /// Views rendered by the last completed iteration.
    pub views_rendered: usize,
    /// Scenes updated by the last completed iteration.
    pub scenes_updated: usize,
    /// Iterations that failed and were followed by the error backoff.
    pub backoffs: u64,
    /// The error of the last failed iteration.
    pub last_error: Option<FrameError>,
}

/// The global frame clock.
///
/// ```no_run
/// # use seren_core::{EngineConfig, EngineContext};
/// # use seren_frame::FrameScheduler;
/// let context = EngineContext::new(EngineConfig::default());
/// let scheduler = FrameScheduler::new(context).expect("worker pool");
/// scheduler.start().expect("loop thread");
/// scheduler.wait_for_next_frame().wait();
/// scheduler.stop();
/// ```
pub struct FrameScheduler {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FrameScheduler {
    /// Creates a stopped scheduler and its worker pool.
    ///
    /// ## Errors
    /// * `SchedulerError::ThreadPool` - If the worker pool could not be built.
    pub fn new(context: Arc<EngineContext>) -> Result<Self, SchedulerError> {
        let workers = context.config().scheduler.worker_threads;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("seren-frame-worker-{i}"))
            .build()?;
        Ok(Self {
            shared: Arc::new(Shared::new(context, pool)),
            handle: Mutex::new(None),
        })
    }

    /// The engine context.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.shared.context
    }

    // --- Lifecycle ---

    /// Spawns the loop thread.
    ///
    /// ## Errors
    /// * `SchedulerError::AlreadyRunning` - If the loop is running.
    /// * `SchedulerError::Spawn` - If the thread could not be spawned.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut handle = lock(&self.handle);
        if handle.is_some() || !self.shared.control.start() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(FRAME_LOOP_THREAD.to_owned())
            .spawn(move || run_loop(&shared));
        match spawned {
            Ok(thread) => {
                *handle = Some(thread);
                Ok(())
            }
            Err(e) => {
                self.shared.control.stop();
                Err(e.into())
            }
        }
    }

    /// Signals the loop to stop and waits for the current iteration to end.
    ///
    /// A parked loop is woken. Called from the loop thread itself, this only
    /// signals.
    pub fn stop(&self) {
        self.shared.control.stop();
        let Some(handle) = lock(&self.handle).take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("The frame loop thread panicked.");
        }
    }

    /// Returns true while the loop thread runs.
    pub fn is_running(&self) -> bool {
        self.shared.control.is_running()
    }

    /// Runs one iteration on the calling thread. Only allowed while the loop
    /// thread is stopped.
    ///
    /// ## Errors
    /// * `SchedulerError::AlreadyRunning` - If the loop thread is running.
    /// * `SchedulerError::Frame` - If the iteration failed.
    pub fn run_frame(&self, dt: Duration) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let timer = Stopwatch::new();
        let result = self.shared.run_frame(dt);
        record(&self.shared, dt, timer.elapsed(), &result);
        result.map(|_| ()).map_err(SchedulerError::from)
    }

    // --- Views ---

    /// Adds a view to the loop. It is prepared from the next iteration on.
    ///
    /// ## Errors
    /// * `SchedulerError::ViewAlreadyRegistered` - If the view is registered.
    pub fn register_view(&self, view: Arc<ViewPipeline>) -> Result<(), SchedulerError> {
        let mut views = lock(&self.shared.views);
        if views.iter().any(|v| Arc::ptr_eq(v, &view)) {
            let mut pending = lock(&self.shared.pending_deregistrations);
            let before = pending.len();
            pending.retain(|v| !Arc::ptr_eq(v, &view));
            if pending.len() == before {
                return Err(SchedulerError::ViewAlreadyRegistered(view.name().to_owned()));
            }
            log::debug!("View '{}': pending deregistration cancelled.", view.name());
            return Ok(());
        }
        log::info!("View '{}' registered.", view.name());
        views.push(view);
        Ok(())
    }

    /// Removes a view at the start of the next iteration. Returns false if
    /// the view is not registered.
    pub fn deregister_view(&self, view: &Arc<ViewPipeline>) -> bool {
        if !self.is_registered(view) {
            return false;
        }
        let mut pending = lock(&self.shared.pending_deregistrations);
        if !pending.iter().any(|v| Arc::ptr_eq(v, view)) {
            pending.push(Arc::clone(view));
        }
        true
    }

    /// Every registered view, in registration order.
    pub fn registered_views(&self) -> Vec<Arc<ViewPipeline>> {
        lock(&self.shared.views).clone()
    }

    /// Returns true if `view` is registered.
    pub fn is_registered(&self, view: &ViewPipeline) -> bool {
        lock(&self.shared.views)
            .iter()
            .any(|v| std::ptr::eq(Arc::as_ptr(v), view))
    }

    // --- Suspension ---

    /// Requests the loop to park between two iterations.
    ///
    /// The handle completes once the loop is parked. Calls made while a
    /// request is pending return the same handle.
    pub fn suspend(&self) -> Completion<()> {
        self.shared.control.request_suspend()
    }

    /// Releases a suspended loop. Without a pending or active suspension this
    /// does nothing and returns false.
    pub fn resume(&self) -> bool {
        self.shared.control.resume()
    }

    /// Returns true while the loop is parked.
    pub fn is_suspended(&self) -> bool {
        self.shared.control.is_parked()
    }

    // --- Frame synchronization ---

    /// Completes after the next full iteration, render phase and cleanup
    /// included.
    pub fn wait_for_next_frame(&self) -> Completion<()> {
        let completion = Completion::new();
        self.shared
            .mailbox
            .publish(FrameMessage::Waiter(completion.clone()));
        completion
    }

    /// Runs `callback` on the loop thread after the next full iteration.
    pub fn run_after_next_frame(&self, callback: impl FnOnce() + Send + 'static) {
        self.shared
            .mailbox
            .publish(FrameMessage::AfterFrame(Box::new(callback)));
    }

    /// Counters of the loop.
    pub fn frame_stats(&self) -> FrameStats {
        lock(&self.shared.stats).clone()
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record(
    shared: &Shared,
    delta: Duration,
    duration: Duration,
    result: &Result<frame::FrameOutcome, FrameError>,
) {
    let mut stats = lock(&shared.stats);
    stats.last_delta = delta;
    match result {
        Ok(outcome) => {
            stats.frames += 1;
            stats.last_frame = duration;
            stats.views_rendered = outcome.views_rendered;
            stats.scenes_updated = outcome.scenes_updated;
        }
        Err(error) => {
            stats.backoffs += 1;
            stats.last_error = Some(error.clone());
        }
    }
}

/// Time to sleep before the next iteration, `elapsed` after the last one
/// started. Never less than the sleep granularity.
fn frame_wait(config: &SchedulerConfig, elapsed: Duration) -> Duration {
    config
        .min_frame_interval
        .saturating_sub(elapsed)
        .max(config.min_sleep_granularity)
}

fn run_loop(shared: &Shared) {
    log::info!("Frame loop started.");
    let mut clock = Stopwatch::new();

    while shared.control.is_running() {
        let wait = frame_wait(&shared.config, clock.elapsed());
        if !wait.is_zero() && !shared.control.sleep(wait) {
            break;
        }
        let delta = clock.lap();

        let timer = Stopwatch::new();
        let result = shared.run_frame(delta);
        record(shared, delta, timer.elapsed(), &result);
        if let Err(error) = result {
            shared.context.report_fault(EngineFault::FrameFailed {
                error: error.to_string(),
            });
            if !shared.control.sleep(shared.config.error_backoff) {
                break;
            }
        }

        if shared.control.park_if_requested() {
            clock.lap();
        }
    }
    log::info!("Frame loop stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_ms: u64, granularity_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            min_frame_interval: Duration::from_millis(interval_ms),
            min_sleep_granularity: Duration::from_millis(granularity_ms),
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn unpaced_loops_still_sleep_the_granularity() {
        let config = config(0, 1);
        assert_eq!(frame_wait(&config, Duration::ZERO), Duration::from_millis(1));
        assert_eq!(frame_wait(&config, Duration::from_millis(40)), Duration::from_millis(1));
    }

    #[test]
    fn short_waits_round_up_to_the_granularity() {
        let config = config(16, 4);
        assert_eq!(frame_wait(&config, Duration::from_millis(6)), Duration::from_millis(10));
        assert_eq!(frame_wait(&config, Duration::from_millis(14)), Duration::from_millis(4));
        assert_eq!(frame_wait(&config, Duration::from_millis(30)), Duration::from_millis(4));
    }
}
