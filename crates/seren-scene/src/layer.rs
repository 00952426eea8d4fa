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

//! Layers: ordered partitions of a scene's objects.
//!
//! A layer keeps its objects in insertion order plus the subsets the frame
//! needs (static objects awaiting their initial update, dynamic roots, spatial
//! and non-spatial objects), and one [`ViewSubscriptionEngine`] per view
//! registered on the scene.

use crate::error::{SceneError, SubscriptionError};
use crate::object::{ObjectKey, ObjectUpdateContext, SceneObject};
use crate::subscription::{RenderOutcome, ViewSubscriptionEngine, ViewUpdateReport};
use crate::view::{ViewBinding, ViewIndex};
use crate::visibility::culling::CullingReport;
use seren_core::math::Vec3;
use seren_core::renderer::{DeviceError, GraphicsDevice, RenderPassKind};
use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;

/// Name of the layer every scene starts with. It cannot be removed.
pub const DEFAULT_LAYER: &str = "Default";

#[derive(Clone, Copy)]
enum Hook {
    Update,
    UpdateOverall,
}

/// An ordered partition of a scene's objects.
#[derive(Debug)]
pub struct Layer {
    name: String,
    objects: Vec<ObjectKey>,
    static_pending: Vec<ObjectKey>,
    roots: Vec<ObjectKey>,
    spatial: Vec<ObjectKey>,
    non_spatial: Vec<ObjectKey>,
    engines: Vec<ViewSubscriptionEngine>,
    is_updating: bool,
}

impl Layer {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
            static_pending: Vec::new(),
            roots: Vec::new(),
            spatial: Vec::new(),
            non_spatial: Vec::new(),
            engines: Vec::new(),
            is_updating: false,
        }
    }

    /// The layer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every object of the layer, in insertion order.
    pub fn objects(&self) -> &[ObjectKey] {
        &self.objects
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the layer holds no object.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// True while the layer iterates its objects.
    pub fn is_updating(&self) -> bool {
        self.is_updating
    }

    /// Static objects still waiting for their initial update.
    pub fn pending_static(&self) -> &[ObjectKey] {
        &self.static_pending
    }

    /// The engine serving `view`.
    pub fn engine(&self, view: ViewIndex) -> Option<&ViewSubscriptionEngine> {
        self.engines.iter().find(|e| e.index() == view)
    }

    #[cfg(test)]
    pub(crate) fn engine_mut(&mut self, view: ViewIndex) -> Option<&mut ViewSubscriptionEngine> {
        self.engines.iter_mut().find(|e| e.index() == view)
    }

    fn ensure_mutable(&self) -> Result<(), SceneError> {
        if self.is_updating {
            return Err(SceneError::LayerUpdating(self.name.clone()));
        }
        Ok(())
    }

    /// Adds `object`. It is a dynamic root if it has no dynamic parent.
    pub(crate) fn insert(&mut self, object: &SceneObject, is_root: bool) -> Result<(), SceneError> {
        self.ensure_mutable()?;
        let key = object.key();
        self.objects.push(key);
        if object.is_static() {
            self.static_pending.push(key);
        } else if is_root {
            self.roots.push(key);
        }
        if object.is_spatial() {
            self.spatial.push(key);
        } else {
            self.non_spatial.push(key);
        }
        Ok(())
    }

    /// Removes `object` and forgets its subscriptions and visibility records.
    pub(crate) fn remove(&mut self, object: &mut SceneObject) -> Result<(), SceneError> {
        self.ensure_mutable()?;
        let key = object.key();
        for list in [
            &mut self.objects,
            &mut self.static_pending,
            &mut self.roots,
            &mut self.spatial,
            &mut self.non_spatial,
        ] {
            list.retain(|k| *k != key);
        }
        for engine in &mut self.engines {
            engine.forget(object);
        }
        Ok(())
    }

    /// Updates the dynamic-root status of a non-static object after a reparent.
    pub(crate) fn set_root(&mut self, object: &SceneObject, is_root: bool) -> Result<(), SceneError> {
        self.ensure_mutable()?;
        let key = object.key();
        self.roots.retain(|k| *k != key);
        if is_root && !object.is_static() {
            self.roots.push(key);
        }
        Ok(())
    }

    pub(crate) fn add_view(&mut self, view: Arc<ViewBinding>, index: ViewIndex) {
        self.engines.push(ViewSubscriptionEngine::new(view, index));
        self.engines.sort_by_key(ViewSubscriptionEngine::index);
    }

    pub(crate) fn remove_view(&mut self, index: ViewIndex) -> Option<ViewSubscriptionEngine> {
        let position = self.engines.iter().position(|e| e.index() == index)?;
        Some(self.engines.remove(position))
    }

    /// Runs the object updates of one frame and returns the collected errors.
    ///
    /// Pending static objects get their initial update first, then every
    /// dynamic root updates its subtree, then every dynamic root runs the
    /// overall pass over its subtree.
    pub(crate) fn update(
        &mut self,
        objects: &mut SlotMap<ObjectKey, SceneObject>,
        dt: Duration,
        simulation_time: Duration,
    ) -> Vec<String> {
        self.is_updating = true;
        let mut errors = Vec::new();

        for key in &self.objects {
            if let Some(object) = objects.get_mut(*key) {
                object.begin_frame();
            }
        }

        for key in std::mem::take(&mut self.static_pending) {
            let parent_world = parent_world(objects, key);
            if let Some(object) = objects.get_mut(key).filter(|o| o.is_valid()) {
                run_hook(object, Hook::Update, dt, simulation_time, &mut errors);
                object.update_world(parent_world);
                object.mark_initial_update_done();
            }
        }

        for &root in &self.roots {
            update_subtree(objects, root, Hook::Update, dt, simulation_time, &mut errors);
        }
        for &root in &self.roots {
            update_subtree(objects, root, Hook::UpdateOverall, dt, simulation_time, &mut errors);
        }

        self.is_updating = false;
        errors
    }

    /// First half of the per-view update. Returns the quarantined objects.
    pub(crate) fn apply_pending(
        &mut self,
        objects: &mut SlotMap<ObjectKey, SceneObject>,
    ) -> Vec<ObjectKey> {
        self.engines
            .iter_mut()
            .flat_map(|engine| engine.apply_pending(objects))
            .collect()
    }

    /// Second half of the per-view update, for every view.
    pub(crate) fn update_views(
        &mut self,
        objects: &mut SlotMap<ObjectKey, SceneObject>,
    ) -> Result<Vec<ViewUpdateReport>, SubscriptionError> {
        let keys = self.objects.as_slice();
        self.engines
            .iter_mut()
            .map(|engine| engine.update_visible(objects, keys))
            .collect()
    }

    pub(crate) fn cull(&self, objects: &SlotMap<ObjectKey, SceneObject>) -> CullingReport {
        let mut total = CullingReport::default();
        for engine in &self.engines {
            let report = engine.cull(objects, &self.spatial, &self.non_spatial);
            total.evaluated += report.evaluated;
            total.skipped += report.skipped;
            total.hidden += report.hidden;
        }
        total
    }

    /// Renders the layer's subscriptions for one view. Layers without an engine
    /// for the view render nothing.
    pub(crate) fn render(
        &self,
        view: ViewIndex,
        passes: &[RenderPassKind],
        device: &dyn GraphicsDevice,
    ) -> Result<RenderOutcome, DeviceError> {
        match self.engine(view) {
            Some(engine) => engine.render(passes, device),
            None => Ok(RenderOutcome::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_updating(&mut self, updating: bool) {
        self.is_updating = updating;
    }
}

fn parent_world(objects: &SlotMap<ObjectKey, SceneObject>, key: ObjectKey) -> Vec3 {
    objects
        .get(key)
        .and_then(SceneObject::parent)
        .and_then(|parent| objects.get(parent))
        .map_or(Vec3::ZERO, SceneObject::world_position)
}

fn run_hook(
    object: &mut SceneObject,
    hook: Hook,
    dt: Duration,
    simulation_time: Duration,
    errors: &mut Vec<String>,
) {
    let Some(mut behavior) = object.take_behavior() else {
        return;
    };
    let result = {
        let mut ctx = ObjectUpdateContext::new(object, dt, simulation_time);
        match hook {
            Hook::Update => behavior.update(&mut ctx),
            Hook::UpdateOverall => behavior.update_overall(&mut ctx),
        }
    };
    object.restore_behavior(behavior);
    if let Err(e) = result {
        errors.push(format!("'{}': {e:#}", object.name()));
    }
}

fn update_subtree(
    objects: &mut SlotMap<ObjectKey, SceneObject>,
    key: ObjectKey,
    hook: Hook,
    dt: Duration,
    simulation_time: Duration,
    errors: &mut Vec<String>,
) {
    let parent_world = parent_world(objects, key);
    let Some(object) = objects.get_mut(key).filter(|o| o.is_valid()) else {
        return;
    };
    run_hook(object, hook, dt, simulation_time, errors);
    if matches!(hook, Hook::Update) {
        object.update_world(parent_world);
    }

    let children = object.children().to_vec();
    for child in children {
        if objects.get(child).is_some_and(|c| !c.is_static()) {
            update_subtree(objects, child, hook, dt, simulation_time, errors);
        }
    }
}
