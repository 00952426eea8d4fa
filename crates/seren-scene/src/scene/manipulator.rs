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

use super::{Scene, SceneComponent, SceneState};
use crate::error::SceneError;
use crate::layer::{Layer, DEFAULT_LAYER};
use crate::object::{ObjectDesc, ObjectKey, SceneObject};
use seren_core::math::Vec3;
use seren_core::renderer::{DeviceIndex, DeviceResource};
use slotmap::SlotMap;
use std::time::Duration;

/// Exclusive access to a scene's graph, handed to deferred actions.
///
/// A manipulator only exists while the frame loop applies the before-update
/// queue, so every structural change happens at the same point of the frame.
pub struct SceneManipulator<'a> {
    scene: &'a Scene,
    state: &'a mut SceneState,
}

impl<'a> SceneManipulator<'a> {
    pub(crate) fn new(scene: &'a Scene, state: &'a mut SceneState) -> Self {
        Self { scene, state }
    }

    /// The scene being manipulated.
    pub fn scene(&self) -> &Scene {
        self.scene
    }

    /// The scene's simulation time.
    pub fn simulation_time(&self) -> Duration {
        self.state.simulation_time
    }

    /// Defers `action` to the next frame.
    pub fn enqueue_before_update(
        &self,
        action: impl FnOnce(&mut SceneManipulator<'_>) -> Result<(), SceneError> + Send + 'static,
    ) {
        self.scene.enqueue_before_update(action);
    }

    /// Names of every layer, in update order.
    pub fn layer_names(&self) -> Vec<String> {
        self.state.layers.iter().map(|l| l.name().to_owned()).collect()
    }

    /// The named layer.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.state.layers.iter().find(|l| l.name() == name)
    }

    /// Appends a layer. It gets an engine for every view registered on the scene.
    pub fn add_layer(&mut self, name: impl Into<String>) -> Result<(), SceneError> {
        let name = name.into();
        if self.layer(&name).is_some() {
            return Err(SceneError::LayerExists(name));
        }
        let mut layer = Layer::new(name);
        for (index, view) in self.state.registered_views() {
            layer.add_view(view, index);
        }
        log::debug!("Scene '{}': added layer '{}'.", self.scene.name(), layer.name());
        self.state.layers.push(layer);
        Ok(())
    }

    /// Removes a layer and every object in it. Returns how many objects went away.
    pub fn remove_layer(&mut self, name: &str) -> Result<usize, SceneError> {
        if name == DEFAULT_LAYER {
            return Err(SceneError::DefaultLayerRemoval);
        }
        let removed = self.clear_layer(name)?;
        self.state.layers.retain(|l| l.name() != name);
        Ok(removed)
    }

    /// Removes every object of a layer. Returns how many objects went away.
    pub fn clear_layer(&mut self, name: &str) -> Result<usize, SceneError> {
        let keys = self
            .layer(name)
            .ok_or_else(|| SceneError::LayerNotFound(name.to_owned()))?
            .objects()
            .to_vec();
        let mut removed = 0;
        for key in keys {
            if self.state.objects.contains_key(key) {
                removed += self.remove_object(key)?;
            }
        }
        Ok(removed)
    }

    /// Inserts an object.
    ///
    /// A child always joins its parent's layer. The world position is computed
    /// right away.
    pub fn add_object(&mut self, desc: ObjectDesc) -> Result<ObjectKey, SceneError> {
        let state = &mut *self.state;
        let (layer_name, parent_world, parent_static) = match desc.parent {
            Some(parent) => {
                let parent = state
                    .objects
                    .get(parent)
                    .ok_or_else(|| SceneError::ObjectNotFound(format!("{parent:?}")))?;
                (
                    parent.layer().to_owned(),
                    parent.world_position(),
                    parent.is_static(),
                )
            }
            None => (
                desc.layer.clone().unwrap_or_else(|| DEFAULT_LAYER.to_owned()),
                Vec3::ZERO,
                false,
            ),
        };

        let layer = state
            .layers
            .iter_mut()
            .find(|l| l.name() == layer_name)
            .ok_or_else(|| SceneError::LayerNotFound(layer_name.clone()))?;
        if layer.is_updating() {
            return Err(SceneError::LayerUpdating(layer_name));
        }

        let parent = desc.parent;
        let key = state
            .objects
            .insert_with_key(|key| SceneObject::from_desc(key, layer_name, desc));
        state.objects[key].update_world(parent_world);
        if let Some(parent) = parent {
            state.objects[parent].children_mut().push(key);
        }
        let is_root = parent.is_none() || parent_static;
        layer.insert(&state.objects[key], is_root)?;
        Ok(key)
    }

    /// Removes an object and its whole subtree. Returns how many objects went away.
    pub fn remove_object(&mut self, key: ObjectKey) -> Result<usize, SceneError> {
        let state = &mut *self.state;
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| SceneError::ObjectNotFound(format!("{key:?}")))?;
        if let Some(parent) = object.parent() {
            if let Some(parent) = state.objects.get_mut(parent) {
                parent.children_mut().retain(|c| *c != key);
            }
        }

        let subtree = collect_subtree(&state.objects, key);
        for &member in &subtree {
            let Some(object) = state.objects.get_mut(member) else {
                continue;
            };
            if let Some(layer) = state.layers.iter_mut().find(|l| l.name() == object.layer()) {
                layer.remove(object)?;
            }
            state.objects.remove(member);
        }
        Ok(subtree.len())
    }

    /// Moves `child` below `parent`, or makes it a root.
    pub fn set_parent(
        &mut self,
        child: ObjectKey,
        parent: Option<ObjectKey>,
    ) -> Result<(), SceneError> {
        let state = &mut *self.state;
        let child_layer = state
            .objects
            .get(child)
            .ok_or_else(|| SceneError::ObjectNotFound(format!("{child:?}")))?
            .layer()
            .to_owned();

        let mut parent_static = false;
        if let Some(parent) = parent {
            let target = state
                .objects
                .get(parent)
                .ok_or_else(|| SceneError::ObjectNotFound(format!("{parent:?}")))?;
            if target.layer() != child_layer {
                return Err(SceneError::InvalidParent(format!(
                    "{parent:?} lives in layer '{}', {child:?} in '{child_layer}'",
                    target.layer()
                )));
            }
            if collect_ancestors(&state.objects, parent).contains(&child) || parent == child {
                return Err(SceneError::InvalidParent(format!(
                    "{parent:?} is below {child:?}"
                )));
            }
            parent_static = target.is_static();
        }

        let layer = state
            .layers
            .iter_mut()
            .find(|l| l.name() == child_layer)
            .ok_or_else(|| SceneError::LayerNotFound(child_layer.clone()))?;
        layer.set_root(&state.objects[child], parent.is_none() || parent_static)?;

        if let Some(old) = state.objects[child].parent() {
            if let Some(old) = state.objects.get_mut(old) {
                old.children_mut().retain(|c| *c != child);
            }
        }
        if let Some(parent) = parent {
            state.objects[parent].children_mut().push(child);
        }
        state.objects[child].set_parent(parent);
        propagate_world(&mut state.objects, child);
        Ok(())
    }

    /// Sets the local position of an object and updates its subtree's world
    /// positions.
    pub fn set_position(&mut self, key: ObjectKey, position: Vec3) -> Result<(), SceneError> {
        self.state
            .objects
            .get_mut(key)
            .ok_or_else(|| SceneError::ObjectNotFound(format!("{key:?}")))?
            .set_local_position(position);
        propagate_world(&mut self.state.objects, key);
        Ok(())
    }

    /// The object behind `key`.
    pub fn object(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.state.objects.get(key)
    }

    /// The object behind `key`, mutably.
    pub fn object_mut(&mut self, key: ObjectKey) -> Option<&mut SceneObject> {
        self.state.objects.get_mut(key)
    }

    /// The first object called `name`.
    pub fn find_object(&self, name: &str) -> Option<ObjectKey> {
        self.state
            .objects
            .iter()
            .find(|(_, o)| o.name() == name)
            .map(|(k, _)| k)
    }

    /// Number of objects in the scene.
    pub fn object_count(&self) -> usize {
        self.state.objects.len()
    }

    /// Adds scene-wide logic.
    pub fn add_component(&mut self, component: impl SceneComponent + 'static) {
        self.state.components.push(Box::new(component));
    }

    /// Adds a resource to the scene's partition on `device`.
    pub fn add_device_resource(&self, device: DeviceIndex, resource: Box<dyn DeviceResource>) {
        self.scene.add_device_resource(device, resource);
    }

    /// Removes the resource called `name` from the partition on `device`. A
    /// loaded resource is released on that device at the end of the frame.
    pub fn remove_device_resource(&self, device: DeviceIndex, name: &str) -> bool {
        let Some(resource) = self.scene.take_device_resource(device, name) else {
            return false;
        };
        if resource.is_loaded() {
            self.scene.context().queue_device_unload(device, resource);
        }
        true
    }
}

fn collect_subtree(objects: &SlotMap<ObjectKey, SceneObject>, root: ObjectKey) -> Vec<ObjectKey> {
    let mut subtree = Vec::new();
    let mut stack = vec![root];
    while let Some(key) = stack.pop() {
        if let Some(object) = objects.get(key) {
            subtree.push(key);
            stack.extend(object.children().iter().copied());
        }
    }
    subtree
}

fn collect_ancestors(objects: &SlotMap<ObjectKey, SceneObject>, key: ObjectKey) -> Vec<ObjectKey> {
    let mut ancestors = Vec::new();
    let mut current = objects.get(key).and_then(SceneObject::parent);
    while let Some(parent) = current {
        ancestors.push(parent);
        current = objects.get(parent).and_then(SceneObject::parent);
    }
    ancestors
}

fn propagate_world(objects: &mut SlotMap<ObjectKey, SceneObject>, key: ObjectKey) {
    let parent_world = objects
        .get(key)
        .and_then(SceneObject::parent)
        .and_then(|p| objects.get(p))
        .map_or(Vec3::ZERO, SceneObject::world_position);
    let Some(object) = objects.get_mut(key) else {
        return;
    };
    object.update_world(parent_world);
    for child in object.children().to_vec() {
        propagate_world(objects, child);
    }
}
