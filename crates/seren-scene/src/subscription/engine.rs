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

use super::{PassSet, RenderOutcome};
use crate::error::SubscriptionError;
use crate::object::{ObjectKey, SceneObject, ViewUpdateContext};
use crate::view::{ViewBinding, ViewIndex};
use crate::visibility::culling::{CullingReport, CullingState};
use crate::visibility::{FilterEnvironment, StageOutcome};
use seren_core::renderer::{DeviceError, GraphicsDevice, RenderPassKind};
use slotmap::SlotMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What one view-update step of an engine did.
#[derive(Debug, Default)]
pub(crate) struct ViewUpdateReport {
    pub compacted: usize,
    pub resorted: usize,
    pub errors: Vec<String>,
}

/// The render-pass lists and visibility cache of one (layer, view) pair.
///
/// The scene drives it through a fixed sequence every frame:
///
/// 1. [`apply_pending`](Self::apply_pending) unsubscribes objects that culling
///    hid and quarantines objects whose callbacks failed,
/// 2. [`update_visible`](Self::update_visible) lets visible objects
///    (un)subscribe, compacts the lists and re-sorts transparent geometry,
/// 3. [`cull`](Self::cull) re-evaluates the view's filter chain beside
///    rendering,
/// 4. [`render`](Self::render) runs the callbacks on the view's device.
pub struct ViewSubscriptionEngine {
    view: Arc<ViewBinding>,
    index: ViewIndex,
    passes: Mutex<PassSet>,
    culling: Mutex<CullingState>,
}

impl ViewSubscriptionEngine {
    pub(crate) fn new(view: Arc<ViewBinding>, index: ViewIndex) -> Self {
        Self {
            view,
            index,
            passes: Mutex::new(PassSet::new()),
            culling: Mutex::new(CullingState::default()),
        }
    }

    /// The view this engine serves.
    pub fn view(&self) -> &Arc<ViewBinding> {
        &self.view
    }

    /// The view's index inside the scene.
    pub fn index(&self) -> ViewIndex {
        self.index
    }

    /// Runs `f` against the pass lists.
    pub fn with_passes<R>(&self, f: impl FnOnce(&PassSet) -> R) -> R {
        f(&self.lock_passes())
    }

    /// Cached visibility of `object`. Objects never culled count as visible.
    pub fn is_visible(&self, object: ObjectKey) -> bool {
        self.lock_culling().is_visible(object)
    }

    /// Cached per-stage outcomes of `object`.
    pub fn stage_outcomes(&self, object: ObjectKey) -> Option<Vec<StageOutcome>> {
        self.lock_culling().record(object).map(|r| r.stages.clone())
    }

    fn lock_passes(&self) -> MutexGuard<'_, PassSet> {
        self.passes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_culling(&self) -> MutexGuard<'_, CullingState> {
        self.culling.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn passes_mut(&mut self) -> &mut PassSet {
        self.passes.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unsubscribes objects culling hid, then unsubscribes and invalidates the
    /// objects whose render callbacks failed. Returns the quarantined objects.
    pub(crate) fn apply_pending(
        &mut self,
        objects: &mut SlotMap<ObjectKey, SceneObject>,
    ) -> Vec<ObjectKey> {
        let index = self.index;
        let passes = self.passes.get_mut().unwrap_or_else(PoisonError::into_inner);
        let culling = self.culling.get_mut().unwrap_or_else(PoisonError::into_inner);

        for key in culling.take_pending_unsubscribes() {
            if let Some(object) = objects.get_mut(key) {
                let count = object.unsubscribe_view(index, passes);
                log::trace!("'{}' hidden in {index}: {count} unsubscribed.", object.name());
            }
        }

        let quarantined = passes.take_quarantined();
        for key in &quarantined {
            if let Some(object) = objects.get_mut(*key) {
                object.unsubscribe_view(index, passes);
                object.invalidate();
            }
        }
        quarantined
    }

    /// Per-view update of the visible objects of the layer, followed by
    /// compaction and the transparent re-sort.
    pub(crate) fn update_visible(
        &mut self,
        objects: &mut SlotMap<ObjectKey, SceneObject>,
        layer_objects: &[ObjectKey],
    ) -> Result<ViewUpdateReport, SubscriptionError> {
        let index = self.index;
        let view = &self.view;
        let passes = self.passes.get_mut().unwrap_or_else(PoisonError::into_inner);
        let culling = self.culling.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut report = ViewUpdateReport::default();

        for &key in layer_objects {
            let Some(object) = objects.get_mut(key) else {
                continue;
            };
            if !object.is_valid() {
                object.unsubscribe_view(index, passes);
                continue;
            }
            if !culling.is_visible(key) {
                continue;
            }

            object.prune_subscriptions(index, passes);
            let Some(mut behavior) = object.take_behavior() else {
                continue;
            };
            let result = {
                let mut ctx = ViewUpdateContext::new(object, passes, view, index);
                behavior.update_for_view(&mut ctx)
            };
            object.restore_behavior(behavior);
            if let Err(e) = result {
                report
                    .errors
                    .push(format!("'{}' in {index}: {e:#}", object.name()));
            }
        }

        report.compacted = passes.compact()?;

        let eye = view.camera_position();
        report.resorted = passes.resort_by_distance(RenderPassKind::Transparent, |owner| {
            objects
                .get(owner)
                .map_or(0.0, |o| o.world_position().distance_squared(eye))
        });
        Ok(report)
    }

    /// Re-evaluates the filter chain for the objects of the layer.
    pub(crate) fn cull(
        &self,
        objects: &SlotMap<ObjectKey, SceneObject>,
        spatial: &[ObjectKey],
        non_spatial: &[ObjectKey],
    ) -> CullingReport {
        let chain = self.view.filters();
        let env = FilterEnvironment {
            view: &self.view,
            camera_position: self.view.camera_position(),
        };
        self.lock_culling().cull(
            objects,
            spatial,
            non_spatial,
            &chain.stages(),
            chain.version(),
            &env,
        )
    }

    /// Runs the callbacks of `passes` on `device`.
    pub(crate) fn render(
        &self,
        passes: &[RenderPassKind],
        device: &dyn GraphicsDevice,
    ) -> Result<RenderOutcome, DeviceError> {
        self.lock_passes().render(passes, device, &self.view)
    }

    /// Drops everything the engine knows about `object`.
    pub(crate) fn forget(&mut self, object: &mut SceneObject) {
        let index = self.index;
        object.unsubscribe_view(index, self.passes_mut());
        self.culling
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .forget(object.key());
    }
}

impl fmt::Debug for ViewSubscriptionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSubscriptionEngine")
            .field("view", &self.view.name())
            .field("index", &self.index)
            .field("passes", &*self.lock_passes())
            .finish()
    }
}
