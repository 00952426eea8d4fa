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

//! Scenes: the shared graph every view of a scene renders.
//!
//! A scene is updated once per frame in two steps. [`Scene::update`] runs with
//! exclusive access while no view renders: it applies the before-update queue,
//! advances components and layers, and brings every (layer, view) subscription
//! engine up to date. [`Scene::update_beside_render`] runs concurrently with
//! rendering under shared access: it applies the beside-render queue and
//! re-culls every view.

mod component;
mod manipulator;
mod partition;
mod queue;

pub use self::component::{SceneComponent, SceneUpdateContext};
pub use self::manipulator::SceneManipulator;

use self::partition::DevicePartition;
use self::queue::DeferredQueue;
use crate::error::SceneError;
use crate::layer::{Layer, DEFAULT_LAYER};
use crate::object::{ObjectKey, SceneObject};
use crate::subscription::SubscriptionInfo;
use crate::view::{ViewBinding, ViewIndex};
use crate::visibility::StageOutcome;
use seren_core::renderer::{
    DeviceIndex, DeviceResource, GraphicsDevice, PassState, RenderPassKind,
};
use seren_core::{Completion, EngineContext, EngineFault};
use slotmap::SlotMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

const SIMULATION_DAY: Duration = Duration::from_secs(24 * 60 * 60);

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// A deferred change applied with exclusive access before the next update.
pub type BeforeUpdateAction =
    Box<dyn FnOnce(&mut SceneManipulator<'_>) -> Result<(), SceneError> + Send>;

/// A deferred action run on the frame loop while views render.
pub type BesideRenderAction = Box<dyn FnOnce() -> Result<(), SceneError> + Send>;

/// Process-unique identifier of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Counters of one scene render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Callbacks that completed.
    pub rendered: usize,
    /// Callbacks that failed; their objects are quarantined at the next update.
    pub failed: usize,
}

pub(crate) struct SceneState {
    objects: SlotMap<ObjectKey, SceneObject>,
    layers: Vec<Layer>,
    components: Vec<Box<dyn SceneComponent>>,
    views: Vec<Option<Arc<ViewBinding>>>,
    simulation_time: Duration,
}

impl SceneState {
    fn registered_views(&self) -> Vec<(ViewIndex, Arc<ViewBinding>)> {
        self.views
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (ViewIndex(i), Arc::clone(v))))
            .collect()
    }

    fn view_index(&self, view: &ViewBinding) -> Option<ViewIndex> {
        self.views
            .iter()
            .position(|v| v.as_ref().is_some_and(|v| v.id() == view.id()))
            .map(ViewIndex)
    }

    fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }
}

struct Polling {
    condition: Box<dyn FnMut() -> bool + Send>,
    action: BeforeUpdateAction,
    max_frames: Option<u32>,
    checks: u32,
    completion: Completion<Result<(), SceneError>>,
}

impl Polling {
    fn run(mut self, manipulator: &mut SceneManipulator<'_>) -> Result<(), SceneError> {
        if (self.condition)() {
            self.completion.complete((self.action)(manipulator));
            return Ok(());
        }
        self.checks += 1;
        if let Some(max) = self.max_frames.filter(|max| self.checks >= *max) {
            log::warn!(
                "Scene '{}': polling gave up after {max} frames.",
                manipulator.scene().name()
            );
            self.completion.complete(Err(SceneError::PollTimeout(max)));
            return Ok(());
        }
        manipulator.enqueue_before_update(move |m| self.run(m));
        Ok(())
    }
}

/// A scene graph shared by every view displaying it.
pub struct Scene {
    id: SceneId,
    name: String,
    context: Arc<EngineContext>,
    state: RwLock<SceneState>,
    before_update: DeferredQueue<BeforeUpdateAction>,
    beside_render: DeferredQueue<BesideRenderAction>,
    partitions: Mutex<BTreeMap<DeviceIndex, Arc<Mutex<DevicePartition>>>>,
    view_count: AtomicUsize,
    updates: AtomicU64,
    auto_unload: AtomicBool,
}

impl Scene {
    /// Creates an empty scene holding only the default layer.
    pub fn new(context: Arc<EngineContext>, name: impl Into<String>) -> Arc<Self> {
        let id = SceneId(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        log::debug!("Created {id} '{name}'.");
        Arc::new(Self {
            id,
            name,
            context,
            state: RwLock::new(SceneState {
                objects: SlotMap::with_key(),
                layers: vec![Layer::new(DEFAULT_LAYER)],
                components: Vec::new(),
                views: Vec::new(),
                simulation_time: Duration::ZERO,
            }),
            before_update: DeferredQueue::new(),
            beside_render: DeferredQueue::new(),
            partitions: Mutex::new(BTreeMap::new()),
            view_count: AtomicUsize::new(0),
            updates: AtomicU64::new(0),
            auto_unload: AtomicBool::new(true),
        })
    }

    /// The scene's identifier.
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// The scene's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine context the scene was created with.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SceneState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SceneState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Deferred work ---

    /// Defers `action` until right before the next update of the scene.
    pub fn enqueue_before_update(
        &self,
        action: impl FnOnce(&mut SceneManipulator<'_>) -> Result<(), SceneError> + Send + 'static,
    ) {
        self.before_update.push(Box::new(action));
    }

    /// Defers `action` to the next beside-render step of the scene.
    pub fn enqueue_beside_render(
        &self,
        action: impl FnOnce() -> Result<(), SceneError> + Send + 'static,
    ) {
        self.beside_render.push(Box::new(action));
    }

    /// Number of actions waiting for the next update.
    pub fn pending_before_update(&self) -> usize {
        self.before_update.len()
    }

    /// Runs `f` with exclusive access at the next update and completes the
    /// returned handle with its result.
    pub fn manipulate<T, F>(&self, f: F) -> Completion<Result<T, SceneError>>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&mut SceneManipulator<'_>) -> Result<T, SceneError> + Send + 'static,
    {
        let completion = Completion::new();
        let done = completion.clone();
        self.enqueue_before_update(move |manipulator| {
            done.complete(f(manipulator));
            Ok(())
        });
        completion
    }

    /// Checks `condition` once per update and runs `action` the first time it
    /// holds.
    ///
    /// With `max_frames`, the handle fails with [`SceneError::PollTimeout`]
    /// once the condition was checked that many times without holding.
    pub fn enqueue_polling(
        &self,
        condition: impl FnMut() -> bool + Send + 'static,
        action: impl FnOnce(&mut SceneManipulator<'_>) -> Result<(), SceneError> + Send + 'static,
        max_frames: Option<u32>,
    ) -> Completion<Result<(), SceneError>> {
        let completion = Completion::new();
        let polling = Polling {
            condition: Box::new(condition),
            action: Box::new(action),
            max_frames,
            checks: 0,
            completion: completion.clone(),
        };
        self.enqueue_before_update(move |m| polling.run(m));
        completion
    }

    // --- Device resources ---

    fn partition(&self, device: DeviceIndex) -> Arc<Mutex<DevicePartition>> {
        Arc::clone(
            self.partitions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(device)
                .or_default(),
        )
    }

    fn lock_partition(partition: &Mutex<DevicePartition>) -> MutexGuard<'_, DevicePartition> {
        partition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a resource to the scene's partition on `device`. It loads the next
    /// time the scene renders on that device.
    pub fn add_device_resource(&self, device: DeviceIndex, resource: Box<dyn DeviceResource>) {
        Self::lock_partition(&self.partition(device)).add(resource);
    }

    pub(crate) fn take_device_resource(
        &self,
        device: DeviceIndex,
        name: &str,
    ) -> Option<Box<dyn DeviceResource>> {
        Self::lock_partition(&self.partition(device)).take(name)
    }

    /// Number of (total, loaded) resources of the partition on `device`.
    pub fn device_resources(&self, device: DeviceIndex) -> (usize, usize) {
        let partition = self.partition(device);
        let partition = Self::lock_partition(&partition);
        (partition.len(), partition.loaded())
    }

    /// Loads the pending resources of the partition on `device`. Called from
    /// that device's render task only. Returns how many resources loaded.
    pub fn load_device_resources(&self, device: &dyn GraphicsDevice) -> usize {
        let partition = self.partition(device.index());
        let loaded = Self::lock_partition(&partition).load_pending(device, |resource, error| {
            self.context.report_fault(EngineFault::ResourceLoadFailed {
                scene: self.name.clone(),
                resource: resource.to_owned(),
                device: device.index(),
                error: format!("{error:#}"),
            });
        });
        if loaded > 0 {
            log::debug!("Scene '{}': loaded {loaded} resources on {}.", self.name, device.index());
        }
        loaded
    }

    // --- Views ---

    /// Registers a view, giving every layer an engine for it.
    pub fn register_view(&self, view: Arc<ViewBinding>) -> Result<ViewIndex, SceneError> {
        let mut state = self.write_state();
        if state.view_index(&view).is_some() {
            return Err(SceneError::ViewAlreadyRegistered(view.name().to_owned()));
        }

        let slot = match state.views.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                state.views.push(None);
                state.views.len() - 1
            }
        };
        let index = ViewIndex(slot);
        state.views[slot] = Some(Arc::clone(&view));
        for layer in &mut state.layers {
            layer.add_view(Arc::clone(&view), index);
        }

        let count = self.view_count.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "Scene '{}': registered view '{}' as {index} ({count} views).",
            self.name,
            view.name()
        );
        Ok(index)
    }

    /// Deregisters a view and drops its engines. Returns the remaining view count.
    pub fn deregister_view(&self, view: &ViewBinding) -> Result<usize, SceneError> {
        let mut guard = self.write_state();
        let state = &mut *guard;
        let index = state
            .view_index(view)
            .ok_or_else(|| SceneError::ViewNotRegistered(view.name().to_owned()))?;

        state.views[index.0] = None;
        for layer in &mut state.layers {
            layer.remove_view(index);
        }
        for object in state.objects.values_mut() {
            object.forget_view(index);
        }

        let remaining = self.view_count.fetch_sub(1, Ordering::AcqRel) - 1;
        log::debug!(
            "Scene '{}': deregistered view '{}' ({remaining} views left).",
            self.name,
            view.name()
        );
        Ok(remaining)
    }

    /// Number of registered views.
    pub fn registered_view_count(&self) -> usize {
        self.view_count.load(Ordering::Acquire)
    }

    /// Index of `view` in this scene, if registered.
    pub fn view_index(&self, view: &ViewBinding) -> Option<ViewIndex> {
        self.read_state().view_index(view)
    }

    /// Whether the frame loop unloads the scene once its last view left.
    pub fn auto_unload(&self) -> bool {
        self.auto_unload.load(Ordering::Acquire)
    }

    /// See [`Scene::auto_unload`].
    pub fn set_auto_unload(&self, enabled: bool) {
        self.auto_unload.store(enabled, Ordering::Release);
    }

    // --- Frame steps ---

    /// The exclusive per-frame update. The frame loop calls it exactly once per
    /// frame for every scene that has at least one view.
    ///
    /// Every failure is collected; the update carries on and reports them all
    /// in one [`SceneError::UpdateFailed`].
    pub fn update(&self, dt: Duration) -> Result<(), SceneError> {
        self.updates.fetch_add(1, Ordering::AcqRel);
        let actions = self.before_update.take_batch();

        let mut guard = self.write_state();
        let mut errors = Vec::new();
        let mut consistency = false;

        let state = &mut *guard;
        state.simulation_time = wrap_simulation_time(state.simulation_time + dt);
        let simulation_time = state.simulation_time;

        let mut ctx = SceneUpdateContext {
            dt,
            simulation_time,
        };
        for component in &mut state.components {
            if let Err(e) = component.update(&mut ctx) {
                errors.push(format!("component '{}': {e:#}", component.name()));
            }
        }

        // Components attached by these actions first run at the next update.
        for action in actions {
            let mut manipulator = SceneManipulator::new(self, &mut guard);
            if let Err(e) = action(&mut manipulator) {
                errors.push(e.to_string());
            }
        }

        let state = &mut *guard;
        let SceneState {
            objects, layers, ..
        } = state;
        for layer in layers.iter_mut() {
            errors.extend(layer.update(objects, dt, simulation_time));
        }

        for layer in layers.iter_mut() {
            for key in layer.apply_pending(objects) {
                log::warn!(
                    "Scene '{}': {key:?} quarantined after a failed render.",
                    self.name
                );
            }
        }
        for layer in layers.iter_mut() {
            match layer.update_views(objects) {
                Ok(reports) => {
                    for report in reports {
                        errors.extend(report.errors);
                    }
                }
                Err(e) => {
                    consistency = true;
                    self.context.report_fault(EngineFault::ConsistencyViolation {
                        error: format!("scene '{}', layer '{}': {e}", self.name, layer.name()),
                    });
                    errors.push(e.to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SceneError::UpdateFailed {
                scene: self.name.clone(),
                errors,
                consistency,
            })
        }
    }

    /// The shared per-frame step running beside rendering: applies the
    /// beside-render queue, latches filter changes and re-culls every view.
    pub fn update_beside_render(&self, dt: Duration) -> Result<(), SceneError> {
        let mut errors = Vec::new();
        for action in self.beside_render.take_batch() {
            if let Err(e) = action() {
                errors.push(e.to_string());
            }
        }

        let state = self.read_state();
        for (_, view) in state.registered_views() {
            view.filters().latch_changes();
        }
        for layer in &state.layers {
            let report = layer.cull(&state.objects);
            log::trace!(
                "Scene '{}', layer '{}': culled {} objects ({} skipped, {} hidden) in {dt:?}.",
                self.name,
                layer.name(),
                report.evaluated,
                report.skipped,
                report.hidden
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SceneError::UpdateFailed {
                scene: self.name.clone(),
                errors,
                consistency: false,
            })
        }
    }

    /// Renders the main passes of every layer for `view`.
    pub fn render(
        &self,
        view: &ViewBinding,
        device: &dyn GraphicsDevice,
    ) -> Result<RenderSummary, SceneError> {
        self.render_passes(view, device, &RenderPassKind::MAIN)
    }

    /// Renders the 2D overlay pass of every layer for `view`.
    pub fn render_overlay(
        &self,
        view: &ViewBinding,
        device: &dyn GraphicsDevice,
    ) -> Result<RenderSummary, SceneError> {
        self.render_passes(view, device, &RenderPassKind::OVERLAY)
    }

    fn render_passes(
        &self,
        view: &ViewBinding,
        device: &dyn GraphicsDevice,
        passes: &[RenderPassKind],
    ) -> Result<RenderSummary, SceneError> {
        let state = self.read_state();
        let index = state
            .view_index(view)
            .ok_or_else(|| SceneError::ViewNotRegistered(view.name().to_owned()))?;

        device
            .bind_pass_state(PassState::DeviceDefaults)
            .map_err(|e| SceneError::Device(e.to_string()))?;

        let mut summary = RenderSummary::default();
        for layer in &state.layers {
            let outcome = layer
                .render(index, passes, device)
                .map_err(|e| SceneError::Device(e.to_string()))?;
            summary.rendered += outcome.rendered;
            summary.failed += outcome.failures.len();
            for (object, pass, error) in outcome.failures {
                let name = state.objects.get(object).map_or("?", SceneObject::name);
                self.context.report_fault(EngineFault::ObjectQuarantined {
                    scene: self.name.clone(),
                    object: format!("'{name}' ({object:?})"),
                    error: format!("{pass} pass in view '{}': {error}", view.name()),
                });
            }
        }
        Ok(summary)
    }

    /// Clears every non-default layer and releases the scene's device resources.
    ///
    /// Released resources stay in their partitions and load again if the scene
    /// is displayed later.
    pub fn unload(&self) {
        let non_default: Vec<String> = self
            .read_state()
            .layers
            .iter()
            .map(|l| l.name().to_owned())
            .filter(|n| n != DEFAULT_LAYER)
            .collect();
        let mut guard = self.write_state();
        let mut manipulator = SceneManipulator::new(self, &mut guard);
        let mut removed = 0;
        for layer in &non_default {
            match manipulator.clear_layer(layer) {
                Ok(count) => removed += count,
                Err(e) => log::warn!("Scene '{}': could not clear '{layer}': {e}", self.name),
            }
        }
        drop(guard);

        let partitions: Vec<_> = self
            .partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(index, partition)| (*index, Arc::clone(partition)))
            .collect();
        let mut released = 0;
        for (index, partition) in partitions {
            match self.context.device(index) {
                Some(device) => {
                    released += Self::lock_partition(&partition).unload_all(device.as_ref())
                }
                None => log::warn!("Scene '{}': {index} is gone, skipping unload.", self.name),
            }
        }
        log::info!(
            "Unloaded scene '{}' ({removed} objects cleared, {released} resources released).",
            self.name
        );
    }

    // --- Queries ---

    /// How many times [`Scene::update`] ran.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Acquire)
    }

    /// Simulation time, wrapped at one day.
    pub fn simulation_time(&self) -> Duration {
        self.read_state().simulation_time
    }

    /// Number of objects.
    pub fn object_count(&self) -> usize {
        self.read_state().objects.len()
    }

    /// Names of every layer, in update order.
    pub fn layer_names(&self) -> Vec<String> {
        self.read_state()
            .layers
            .iter()
            .map(|l| l.name().to_owned())
            .collect()
    }

    /// Number of objects in the named layer.
    pub fn layer_len(&self, layer: &str) -> Option<usize> {
        self.read_state().layer(layer).map(Layer::len)
    }

    /// Runs `f` against the object behind `key`.
    pub fn with_object<R>(&self, key: ObjectKey, f: impl FnOnce(&SceneObject) -> R) -> Option<R> {
        self.read_state().objects.get(key).map(f)
    }

    /// The first object called `name`.
    pub fn find_object(&self, name: &str) -> Option<ObjectKey> {
        self.read_state()
            .objects
            .iter()
            .find(|(_, o)| o.name() == name)
            .map(|(k, _)| k)
    }

    /// Cached visibility of `object` in `view`.
    pub fn is_visible(&self, object: ObjectKey, view: &ViewBinding) -> Option<bool> {
        let state = self.read_state();
        let index = state.view_index(view)?;
        let layer = state.layer(state.objects.get(object)?.layer())?;
        Some(layer.engine(index)?.is_visible(object))
    }

    /// Cached per-stage filter outcomes of `object` in `view`.
    pub fn stage_outcomes(&self, object: ObjectKey, view: &ViewBinding) -> Option<Vec<StageOutcome>> {
        let state = self.read_state();
        let index = state.view_index(view)?;
        let layer = state.layer(state.objects.get(object)?.layer())?;
        layer.engine(index)?.stage_outcomes(object)
    }

    /// The records of `pass` in the named layer for `view`, in list order.
    pub fn subscriptions(
        &self,
        view: &ViewBinding,
        layer: &str,
        pass: RenderPassKind,
    ) -> Vec<SubscriptionInfo> {
        let state = self.read_state();
        let Some(index) = state.view_index(view) else {
            return Vec::new();
        };
        state
            .layer(layer)
            .and_then(|l| l.engine(index))
            .map(|engine| engine.with_passes(|p| p.entries(pass)))
            .unwrap_or_default()
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("views", &self.registered_view_count())
            .field("updates", &self.update_count())
            .finish_non_exhaustive()
    }
}

fn wrap_simulation_time(time: Duration) -> Duration {
    if time < SIMULATION_DAY {
        return time;
    }
    let nanos = time.as_nanos() % SIMULATION_DAY.as_nanos();
    Duration::from_nanos(nanos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectBehavior, ObjectDesc, ViewUpdateContext};
    use crate::subscription::RenderContext;
    use seren_core::renderer::RenderPassKind;
    use seren_core::EngineConfig;

    struct Subscriber;

    impl ObjectBehavior for Subscriber {
        fn update_for_view(&mut self, ctx: &mut ViewUpdateContext<'_>) -> anyhow::Result<()> {
            ctx.ensure_subscribed(RenderPassKind::Plain, 0, |_: &mut RenderContext<'_>| Ok(()))?;
            Ok(())
        }
    }

    #[test]
    fn a_compaction_mismatch_fails_the_update_as_a_consistency_violation() {
        let context = EngineContext::new(EngineConfig::default());
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        context
            .faults()
            .subscribe(move |f: &EngineFault| sink.lock().unwrap().push(f.clone()));
        let scene = Scene::new(context, "main");
        let view = ViewBinding::new("v");
        let index = scene.register_view(Arc::clone(&view)).unwrap();
        scene.enqueue_before_update(|m| {
            m.add_object(ObjectDesc::new("box").with_behavior(Subscriber))?;
            Ok(())
        });
        scene.update(Duration::from_millis(16)).unwrap();

        {
            let mut state = scene.write_state();
            let passes = state.layers[0]
                .engine_mut(index)
                .expect("engine of the registered view")
                .passes_mut();
            let key = passes.entries(RenderPassKind::Plain)[0].key;
            passes.flag_without_counting(key);
        }

        let error = scene.update(Duration::from_millis(16)).unwrap_err();
        assert!(error.is_consistency_violation(), "unexpected error: {error}");
        assert!(faults
            .lock()
            .unwrap()
            .iter()
            .any(|f| matches!(f, EngineFault::ConsistencyViolation { .. })));
    }

    #[test]
    fn simulation_time_wraps_at_one_day() {
        assert_eq!(wrap_simulation_time(Duration::from_secs(10)), Duration::from_secs(10));
        assert_eq!(
            wrap_simulation_time(SIMULATION_DAY + Duration::from_millis(5)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn a_view_cannot_be_registered_twice() {
        let scene = Scene::new(EngineContext::new(EngineConfig::default()), "main");
        let view = ViewBinding::new("left");

        assert_eq!(scene.register_view(Arc::clone(&view)), Ok(ViewIndex(0)));
        assert_eq!(
            scene.register_view(Arc::clone(&view)),
            Err(SceneError::ViewAlreadyRegistered("left".into()))
        );
        assert_eq!(scene.deregister_view(&view), Ok(0));
        assert_eq!(
            scene.deregister_view(&view),
            Err(SceneError::ViewNotRegistered("left".into()))
        );
    }

    #[test]
    fn deregistered_slots_are_reused() {
        let scene = Scene::new(EngineContext::new(EngineConfig::default()), "main");
        let a = ViewBinding::new("a");
        let b = ViewBinding::new("b");
        let c = ViewBinding::new("c");

        scene.register_view(Arc::clone(&a)).unwrap();
        scene.register_view(Arc::clone(&b)).unwrap();
        scene.deregister_view(&a).unwrap();
        assert_eq!(scene.register_view(Arc::clone(&c)), Ok(ViewIndex(0)));
        assert_eq!(scene.registered_view_count(), 2);
    }

    #[test]
    fn default_layer_is_mandatory() {
        let scene = Scene::new(EngineContext::new(EngineConfig::default()), "main");
        let result = scene.manipulate(|m| m.remove_layer(DEFAULT_LAYER));
        scene.update(Duration::ZERO).unwrap();
        assert_eq!(result.try_get(), Some(Err(SceneError::DefaultLayerRemoval)));
    }
}
