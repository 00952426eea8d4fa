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

//! One iteration of the frame loop.

use super::control::LoopControl;
use super::FrameStats;
use crate::error::{panic_message, FrameError, ViewError};
use crate::pipeline::{ViewContinuation, ViewPipeline};
use seren_core::event::EventBus;
use seren_core::renderer::{DeviceIndex, GraphicsDevice};
use seren_core::{Completion, EngineContext, EngineFault, SchedulerConfig};
use seren_scene::{Scene, SceneError, SceneId};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Work delivered to the loop thread, consumed once per iteration.
pub(crate) enum FrameMessage {
    /// Completed after the next full iteration.
    Waiter(Completion<()>),
    /// Run after the next full iteration.
    AfterFrame(Box<dyn FnOnce() + Send>),
}

/// Counters of one successful iteration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameOutcome {
    pub scenes_updated: usize,
    pub views_rendered: usize,
    pub views_dropped: usize,
    pub scenes_unloaded: usize,
}

struct DeviceGroup {
    device: Arc<dyn GraphicsDevice>,
    views: Vec<Arc<ViewPipeline>>,
}

/// State shared between the [`FrameScheduler`](super::FrameScheduler) handle
/// and its loop thread.
pub(crate) struct Shared {
    pub context: Arc<EngineContext>,
    pub config: SchedulerConfig,
    pub pool: rayon::ThreadPool,
    pub views: Mutex<Vec<Arc<ViewPipeline>>>,
    pub pending_deregistrations: Mutex<Vec<Arc<ViewPipeline>>>,
    pub mailbox: EventBus<FrameMessage>,
    pub control: LoopControl,
    pub stats: Mutex<FrameStats>,
    frame_lock: Mutex<()>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Failure of one scene task.
enum SceneFailure {
    Error(SceneError),
    Panicked(String),
}

/// Scene failures collected over one iteration, turned into the frame result
/// once cleanup has run.
#[derive(Default)]
struct FrameFailures {
    consistency: Vec<String>,
    scenes: Vec<String>,
    panics: Vec<String>,
}

impl FrameFailures {
    fn record(&mut self, scene: &str, failure: SceneFailure) {
        match failure {
            SceneFailure::Error(e) if e.is_consistency_violation() => {
                self.consistency.push(e.to_string())
            }
            SceneFailure::Error(e) => {
                log::warn!("{e}");
                self.scenes.push(e.to_string());
            }
            SceneFailure::Panicked(message) => {
                log::error!("Scene '{scene}' panicked: {message}");
                self.panics.push(format!("scene '{scene}': {message}"));
            }
        }
    }

    fn into_result(self, outcome: FrameOutcome) -> Result<FrameOutcome, FrameError> {
        if !self.consistency.is_empty() {
            Err(FrameError::Consistency(self.consistency.join("; ")))
        } else if !self.panics.is_empty() {
            Err(FrameError::Panicked(self.panics.join("; ")))
        } else if !self.scenes.is_empty() {
            Err(FrameError::SceneUpdate(self.scenes.join("; ")))
        } else {
            Ok(outcome)
        }
    }
}

/// Runs one scene task, turning both errors and panics into a failure.
fn guarded_scene_task(
    task: impl FnOnce() -> Result<(), SceneError>,
) -> Result<(), SceneFailure> {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result.map_err(SceneFailure::Error),
        Err(payload) => Err(SceneFailure::Panicked(panic_message(payload))),
    }
}

/// Runs one view step, turning a panic into [`ViewError::Panicked`].
fn guarded_view_step<T>(
    view: &ViewPipeline,
    step: impl FnOnce() -> Result<T, ViewError>,
) -> Result<T, ViewError> {
    catch_unwind(AssertUnwindSafe(step)).unwrap_or_else(|payload| {
        Err(ViewError::Panicked {
            view: view.name().to_owned(),
            message: panic_message(payload),
        })
    })
}

/// The distinct scenes the views are registered on, in id order.
fn distinct_scenes(views: &[Arc<ViewPipeline>]) -> Vec<Arc<Scene>> {
    let mut scenes = BTreeMap::<SceneId, Arc<Scene>>::new();
    for scene in views.iter().filter_map(|v| v.registered_scene()) {
        scenes.entry(scene.id()).or_insert(scene);
    }
    scenes.into_values().collect()
}

/// Groups the views by committed device. Views without one are returned apart.
fn group_by_device(
    views: &[Arc<ViewPipeline>],
) -> (BTreeMap<DeviceIndex, DeviceGroup>, Vec<Arc<ViewPipeline>>) {
    let mut groups = BTreeMap::<DeviceIndex, DeviceGroup>::new();
    let mut unbound = Vec::new();
    for view in views {
        match view.device() {
            Some(device) => groups
                .entry(device.index())
                .or_insert_with(|| DeviceGroup {
                    device,
                    views: Vec::new(),
                })
                .views
                .push(Arc::clone(view)),
            None => unbound.push(Arc::clone(view)),
        }
    }
    (groups, unbound)
}

impl Shared {
    pub fn new(context: Arc<EngineContext>, pool: rayon::ThreadPool) -> Self {
        Self {
            config: context.config().scheduler.clone(),
            context,
            pool,
            views: Mutex::new(Vec::new()),
            pending_deregistrations: Mutex::new(Vec::new()),
            mailbox: EventBus::new(),
            control: LoopControl::default(),
            stats: Mutex::new(FrameStats::default()),
            frame_lock: Mutex::new(()),
        }
    }

    /// Runs one iteration: both phases, cleanup, then the frame waiters and
    /// callbacks queued before the iteration started.
    ///
    /// When the iteration fails, the waiters and callbacks are queued again
    /// for the next one.
    pub fn run_frame(&self, dt: Duration) -> Result<FrameOutcome, FrameError> {
        let _frame = lock(&self.frame_lock);
        let armed = self.mailbox.drain_pending();

        let result = catch_unwind(AssertUnwindSafe(|| self.run_phases(dt)))
            .unwrap_or_else(|payload| Err(FrameError::Panicked(panic_message(payload))));

        match &result {
            Ok(_) => deliver(armed),
            Err(_) => {
                for message in armed {
                    self.mailbox.publish(message);
                }
            }
        }
        result
    }

    fn run_phases(&self, dt: Duration) -> Result<FrameOutcome, FrameError> {
        let mut outcome = FrameOutcome::default();
        let mut unload = Vec::new();
        let mut failures = FrameFailures::default();

        let deregistrations = std::mem::take(&mut *lock(&self.pending_deregistrations));
        for view in deregistrations {
            if self.remove_view(&view, &mut unload) {
                log::info!("View '{}' deregistered.", view.name());
            }
        }

        // Phase 1: prepare views and update every scene once.
        let views = lock(&self.views).clone();
        let scenes = distinct_scenes(&views);
        let (groups, unbound) = group_by_device(&views);
        outcome.scenes_updated = scenes.len();

        let (prepared_tx, prepared_rx) = crossbeam_channel::unbounded();
        let (scene_tx, scene_rx) = crossbeam_channel::unbounded::<(Arc<Scene>, SceneFailure)>();
        self.pool.in_place_scope(|s| {
            for group in groups.values() {
                let tx = prepared_tx.clone();
                s.spawn(move |_| {
                    for view in &group.views {
                        let result = guarded_view_step(view, || view.prepare());
                        let _ = tx.send((Arc::clone(view), result));
                    }
                });
            }
            for scene in &scenes {
                let tx = scene_tx.clone();
                s.spawn(move |_| {
                    if let Err(failure) = guarded_scene_task(|| scene.update(dt)) {
                        let _ = tx.send((Arc::clone(scene), failure));
                    }
                });
            }
            for view in &unbound {
                let result = guarded_view_step(view, || view.prepare());
                let _ = prepared_tx.send((Arc::clone(view), result));
            }
        });
        drop((prepared_tx, scene_tx));

        let mut continuations: Vec<(Arc<ViewPipeline>, Vec<ViewContinuation>)> = Vec::new();
        for (view, result) in prepared_rx.try_iter() {
            match result {
                Ok(list) => continuations.push((view, list)),
                Err(e) => {
                    self.drop_view(&view, &e, &mut unload);
                    outcome.views_dropped += 1;
                }
            }
        }
        for (view, list) in continuations {
            for continuation in list {
                match view.apply_continuation(continuation) {
                    Ok(Some(scene)) => unload.push(scene),
                    Ok(None) => {}
                    Err(e) => log::warn!("View '{}': {e}", view.name()),
                }
            }
        }
        for (scene, failure) in scene_rx.try_iter() {
            failures.record(scene.name(), failure);
        }

        // Phase 2: render per device and update every scene beside rendering.
        let views = lock(&self.views).clone();
        let scenes = distinct_scenes(&views);
        let (groups, _) = group_by_device(&views);
        let rendered = AtomicUsize::new(0);

        let (failed_tx, failed_rx) = crossbeam_channel::unbounded::<(Arc<ViewPipeline>, ViewError)>();
        let (beside_tx, beside_rx) = crossbeam_channel::unbounded::<(Arc<Scene>, SceneFailure)>();
        self.pool.in_place_scope(|s| {
            for group in groups.values() {
                let tx = failed_tx.clone();
                let rendered = &rendered;
                s.spawn(move |_| {
                    for scene in distinct_scenes(&group.views) {
                        let device = group.device.as_ref();
                        if let Err(payload) =
                            catch_unwind(AssertUnwindSafe(|| scene.load_device_resources(device)))
                        {
                            log::error!(
                                "Loading resources of scene '{}' on device {} panicked: {}",
                                scene.name(),
                                device.index(),
                                panic_message(payload)
                            );
                        }
                    }
                    for view in &group.views {
                        match guarded_view_step(view, || view.render()) {
                            Ok(true) => {
                                rendered.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(false) => {}
                            Err(e) => {
                                let _ = tx.send((Arc::clone(view), e));
                            }
                        }
                    }
                });
            }
            for scene in &scenes {
                let tx = beside_tx.clone();
                s.spawn(move |_| {
                    if let Err(failure) = guarded_scene_task(|| scene.update_beside_render(dt)) {
                        let _ = tx.send((Arc::clone(scene), failure));
                    }
                });
            }
        });
        drop((failed_tx, beside_tx));
        outcome.views_rendered = rendered.into_inner();

        for (scene, failure) in beside_rx.try_iter() {
            failures.record(scene.name(), failure);
        }
        for (view, error) in failed_rx.try_iter() {
            self.drop_view(&view, &error, &mut unload);
            outcome.views_dropped += 1;
        }

        // Cleanup.
        outcome.scenes_unloaded = unload_scenes(unload);
        let released = self.context.drain_device_unloads();
        if released > 0 {
            log::trace!("Released {released} device resources.");
        }

        failures.into_result(outcome)
    }

    /// Removes `view` from the registered list and from its scene. Returns
    /// false if it was not registered.
    pub fn remove_view(&self, view: &Arc<ViewPipeline>, unload: &mut Vec<Arc<Scene>>) -> bool {
        let removed = {
            let mut views = lock(&self.views);
            let before = views.len();
            views.retain(|v| !Arc::ptr_eq(v, view));
            views.len() != before
        };
        if let Some(scene) = view.leave_scene() {
            unload.push(scene);
        }
        removed
    }

    fn drop_view(&self, view: &Arc<ViewPipeline>, error: &ViewError, unload: &mut Vec<Arc<Scene>>) {
        self.remove_view(view, unload);
        self.context.report_fault(EngineFault::ViewDeregistered {
            view: view.name().to_owned(),
            error: error.to_string(),
        });
    }
}

/// Unloads the scenes that lost their last view, unless a view registered
/// again in the meantime or the scene is pinned.
fn unload_scenes(candidates: Vec<Arc<Scene>>) -> usize {
    let mut scenes = BTreeMap::<SceneId, Arc<Scene>>::new();
    for scene in candidates {
        scenes.entry(scene.id()).or_insert(scene);
    }
    let mut unloaded = 0;
    for scene in scenes.into_values() {
        if scene.registered_view_count() == 0 && scene.auto_unload() {
            scene.unload();
            unloaded += 1;
        }
    }
    unloaded
}

fn deliver(messages: Vec<FrameMessage>) {
    for message in messages {
        match message {
            FrameMessage::Waiter(completion) => {
                completion.complete(());
            }
            FrameMessage::AfterFrame(callback) => {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
                    log::error!(
                        "An after-frame callback panicked: {}",
                        panic_message(payload)
                    );
                }
            }
        }
    }
}
