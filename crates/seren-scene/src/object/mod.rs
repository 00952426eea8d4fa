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

//! Scene objects.
//!
//! Objects live in the scene's arena and are addressed by [`ObjectKey`]. The
//! engine owns their bookkeeping (hierarchy, transform versions, subscriptions,
//! validity); application logic plugs in through an [`ObjectBehavior`].

mod behavior;
mod custom_data;

pub use self::behavior::{ObjectBehavior, ObjectUpdateContext, ViewUpdateContext};
pub use self::custom_data::{CustomData, CustomValue};

use crate::subscription::{PassSet, SubscriptionKey};
use crate::view::ViewIndex;
use seren_core::math::Vec3;
use seren_core::renderer::RenderPassKind;
use std::collections::BTreeMap;
use std::fmt;

slotmap::new_key_type! {
    /// Generational handle of a scene object.
    pub struct ObjectKey;
}

/// Everything needed to insert an object into a scene.
pub struct ObjectDesc {
    pub(crate) name: String,
    pub(crate) layer: Option<String>,
    pub(crate) parent: Option<ObjectKey>,
    pub(crate) position: Vec3,
    pub(crate) is_static: bool,
    pub(crate) is_spatial: bool,
    pub(crate) custom: CustomData,
    pub(crate) behavior: Option<Box<dyn ObjectBehavior>>,
}

impl ObjectDesc {
    /// A dynamic, spatial object at the origin of the default layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer: None,
            parent: None,
            position: Vec3::ZERO,
            is_static: false,
            is_spatial: true,
            custom: CustomData::new(),
            behavior: None,
        }
    }

    /// Places the object in the named layer.
    pub fn in_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Attaches the object below `parent`. The parent's layer wins.
    pub fn with_parent(mut self, parent: ObjectKey) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the position relative to the parent.
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Marks the object static: it gets one initial update, then none.
    pub fn static_object(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Marks the object non-spatial: visibility filters never hide it.
    pub fn non_spatial(mut self) -> Self {
        self.is_spatial = false;
        self
    }

    /// Seeds the object's custom data.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<CustomValue>) -> Self {
        self.custom.set(key, value);
        self
    }

    /// Plugs in the object's logic.
    pub fn with_behavior(mut self, behavior: impl ObjectBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }
}

/// An object of the scene graph.
pub struct SceneObject {
    key: ObjectKey,
    name: String,
    layer: String,
    parent: Option<ObjectKey>,
    children: Vec<ObjectKey>,
    local_position: Vec3,
    world_position: Vec3,
    is_static: bool,
    is_spatial: bool,
    initial_update_done: bool,
    transform_version: u64,
    transform_changed: bool,
    valid: bool,
    custom: CustomData,
    subscriptions: BTreeMap<ViewIndex, Vec<(RenderPassKind, SubscriptionKey)>>,
    behavior: Option<Box<dyn ObjectBehavior>>,
}

impl SceneObject {
    pub(crate) fn from_desc(key: ObjectKey, layer: String, desc: ObjectDesc) -> Self {
        Self {
            key,
            name: desc.name,
            layer,
            parent: desc.parent,
            children: Vec::new(),
            local_position: desc.position,
            world_position: desc.position,
            is_static: desc.is_static,
            is_spatial: desc.is_spatial,
            initial_update_done: false,
            transform_version: 1,
            transform_changed: true,
            valid: true,
            custom: desc.custom,
            subscriptions: BTreeMap::new(),
            behavior: desc.behavior,
        }
    }

    /// The object's handle.
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    /// The object's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the layer holding the object.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// The parent object, if any.
    pub fn parent(&self) -> Option<ObjectKey> {
        self.parent
    }

    /// Direct children, in insertion order.
    pub fn children(&self) -> &[ObjectKey] {
        &self.children
    }

    /// Position relative to the parent.
    pub fn local_position(&self) -> Vec3 {
        self.local_position
    }

    /// Position in world space, as of the last transform update.
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// Sets the position relative to the parent.
    ///
    /// The world position follows at the next transform update.
    pub fn set_local_position(&mut self, position: Vec3) {
        self.local_position = position;
    }

    /// Returns true for static objects.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Returns true if visibility filters apply to the object.
    pub fn is_spatial(&self) -> bool {
        self.is_spatial
    }

    /// Returns true once a static object received its single update.
    pub fn initial_update_done(&self) -> bool {
        self.initial_update_done
    }

    /// Increments every time the world position changes.
    pub fn transform_version(&self) -> u64 {
        self.transform_version
    }

    /// Whether the world position changed during the current frame.
    pub fn transform_changed(&self) -> bool {
        self.transform_changed
    }

    /// False once the object was quarantined. Invalid objects are skipped by
    /// every later update and render.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The object's custom data.
    pub fn custom_data(&self) -> &CustomData {
        &self.custom
    }

    /// The object's custom data, mutably.
    pub fn custom_data_mut(&mut self) -> &mut CustomData {
        &mut self.custom
    }

    /// Subscriptions the object holds in `view`, as (pass, handle) pairs.
    pub fn subscriptions(&self, view: ViewIndex) -> &[(RenderPassKind, SubscriptionKey)] {
        self.subscriptions.get(&view).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ObjectKey>) {
        self.parent = parent;
    }

    pub(crate) fn set_layer(&mut self, layer: String) {
        self.layer = layer;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ObjectKey> {
        &mut self.children
    }

    pub(crate) fn mark_initial_update_done(&mut self) {
        self.initial_update_done = true;
    }

    pub(crate) fn begin_frame(&mut self) {
        self.transform_changed = false;
    }

    /// Recomputes the world position. Returns true if it moved.
    pub(crate) fn update_world(&mut self, parent_world: Vec3) -> bool {
        let world = parent_world + self.local_position;
        if world.approx_eq(self.world_position) {
            return false;
        }
        self.world_position = world;
        self.transform_version += 1;
        self.transform_changed = true;
        true
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    pub(crate) fn take_behavior(&mut self) -> Option<Box<dyn ObjectBehavior>> {
        self.behavior.take()
    }

    pub(crate) fn restore_behavior(&mut self, behavior: Box<dyn ObjectBehavior>) {
        self.behavior = Some(behavior);
    }

    pub(crate) fn record_subscription(
        &mut self,
        view: ViewIndex,
        pass: RenderPassKind,
        key: SubscriptionKey,
    ) {
        self.subscriptions.entry(view).or_default().push((pass, key));
    }

    /// Unsubscribes every subscription held in `view`. Returns how many were live.
    pub(crate) fn unsubscribe_view(&mut self, view: ViewIndex, passes: &mut PassSet) -> usize {
        self.subscriptions
            .remove(&view)
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, key)| passes.unsubscribe(*key))
            .count()
    }

    /// Unsubscribes the subscriptions held in `view` for `pass`.
    pub(crate) fn unsubscribe_pass(
        &mut self,
        view: ViewIndex,
        pass: RenderPassKind,
        passes: &mut PassSet,
    ) -> usize {
        let Some(entries) = self.subscriptions.get_mut(&view) else {
            return 0;
        };
        let mut count = 0;
        entries.retain(|(p, key)| {
            if *p != pass {
                return true;
            }
            if passes.unsubscribe(*key) {
                count += 1;
            }
            false
        });
        count
    }

    /// Drops cached handles whose records are flagged or gone.
    pub(crate) fn prune_subscriptions(&mut self, view: ViewIndex, passes: &PassSet) {
        if let Some(entries) = self.subscriptions.get_mut(&view) {
            entries.retain(|(_, key)| passes.is_subscribed(*key));
        }
    }

    /// Forgets cached handles of `view` without touching the pass lists.
    pub(crate) fn forget_view(&mut self, view: ViewIndex) {
        self.subscriptions.remove(&view);
    }
}

impl fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("layer", &self.layer)
            .field("parent", &self.parent)
            .field("world_position", &self.world_position)
            .field("is_static", &self.is_static)
            .field("valid", &self.valid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use slotmap::SlotMap;

    pub(crate) fn spawn(
        objects: &mut SlotMap<ObjectKey, SceneObject>,
        desc: ObjectDesc,
    ) -> ObjectKey {
        objects.insert_with_key(|key| SceneObject::from_desc(key, "default".into(), desc))
    }

    #[test]
    fn world_updates_bump_the_transform_version() {
        let mut objects = SlotMap::with_key();
        let key = spawn(&mut objects, ObjectDesc::new("cube").at(Vec3::new(1.0, 0.0, 0.0)));
        let object = &mut objects[key];
        let v0 = object.transform_version();

        object.begin_frame();
        assert!(!object.update_world(Vec3::ZERO));
        assert_eq!(object.transform_version(), v0);
        assert!(!object.transform_changed());

        assert!(object.update_world(Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(object.world_position(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(object.transform_version(), v0 + 1);
        assert!(object.transform_changed());
    }

    #[test]
    fn per_pass_unsubscribe_keeps_other_passes() {
        let mut objects = SlotMap::with_key();
        let key = spawn(&mut objects, ObjectDesc::new("glass"));
        let mut passes = PassSet::new();
        let view = ViewIndex(0);
        let callback: crate::RenderCallback =
            std::sync::Arc::new(|_: &mut crate::RenderContext<'_>| Ok(()));

        for pass in [RenderPassKind::Plain, RenderPassKind::Transparent] {
            let sub = passes.subscribe(key, pass, 0, callback.clone()).unwrap();
            objects[key].record_subscription(view, pass, sub);
        }

        let object = &mut objects[key];
        assert_eq!(object.unsubscribe_pass(view, RenderPassKind::Plain, &mut passes), 1);
        assert_eq!(object.subscriptions(view).len(), 1);
        assert_eq!(object.unsubscribe_view(view, &mut passes), 1);
        assert!(object.subscriptions(view).is_empty());
        assert_eq!(passes.pending_unsubscribes(RenderPassKind::Transparent), 1);
    }
}
