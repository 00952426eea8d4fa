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

use super::{ObjectKey, SceneObject};
use crate::error::SubscriptionError;
use crate::subscription::{PassSet, RenderCallback, RenderContext, SubscriptionKey};
use crate::view::{ViewBinding, ViewIndex};
use anyhow::Result;
use seren_core::math::Vec3;
use seren_core::renderer::RenderPassKind;
use std::sync::Arc;
use std::time::Duration;

/// Application logic attached to a scene object.
///
/// Every hook runs on the frame loop while the scene is exclusively locked.
/// An error returned by a hook is collected into the scene's update error.
pub trait ObjectBehavior: Send + Sync {
    /// Per-frame update. Static objects receive it once, right after insertion.
    fn update(&mut self, ctx: &mut ObjectUpdateContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Runs after every object of the layer received [`update`](Self::update).
    fn update_overall(&mut self, ctx: &mut ObjectUpdateContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Per-view update of a visible object; the place to (un)subscribe to passes.
    fn update_for_view(&mut self, ctx: &mut ViewUpdateContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// What [`ObjectBehavior::update`] and [`ObjectBehavior::update_overall`] receive.
pub struct ObjectUpdateContext<'a> {
    object: &'a mut SceneObject,
    dt: Duration,
    simulation_time: Duration,
}

impl<'a> ObjectUpdateContext<'a> {
    pub(crate) fn new(object: &'a mut SceneObject, dt: Duration, simulation_time: Duration) -> Self {
        Self {
            object,
            dt,
            simulation_time,
        }
    }

    /// The object being updated.
    pub fn object(&self) -> &SceneObject {
        &*self.object
    }

    /// The object being updated, mutably.
    pub fn object_mut(&mut self) -> &mut SceneObject {
        &mut *self.object
    }

    /// Time elapsed since the previous frame.
    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// The scene's simulation time, wrapped at one day.
    pub fn simulation_time(&self) -> Duration {
        self.simulation_time
    }
}

/// What [`ObjectBehavior::update_for_view`] receives.
pub struct ViewUpdateContext<'a> {
    object: &'a mut SceneObject,
    passes: &'a mut PassSet,
    view: &'a ViewBinding,
    view_index: ViewIndex,
    camera_position: Vec3,
}

impl<'a> ViewUpdateContext<'a> {
    pub(crate) fn new(
        object: &'a mut SceneObject,
        passes: &'a mut PassSet,
        view: &'a ViewBinding,
        view_index: ViewIndex,
    ) -> Self {
        Self {
            object,
            passes,
            view,
            view_index,
            camera_position: view.camera_position(),
        }
    }

    /// The object being updated.
    pub fn object(&self) -> &SceneObject {
        &*self.object
    }

    /// The object's handle.
    pub fn key(&self) -> ObjectKey {
        self.object.key()
    }

    /// The view being updated.
    pub fn view(&self) -> &ViewBinding {
        self.view
    }

    /// Index of the view inside the scene.
    pub fn view_index(&self) -> ViewIndex {
        self.view_index
    }

    /// Eye position of the view's camera.
    pub fn camera_position(&self) -> Vec3 {
        self.camera_position
    }

    /// Returns true if the object holds a live subscription to `pass` in this view.
    pub fn is_subscribed(&self, pass: RenderPassKind) -> bool {
        self.object
            .subscriptions(self.view_index)
            .iter()
            .any(|(p, key)| *p == pass && self.passes.is_subscribed(*key))
    }

    /// Subscribes the object to `pass` in this view.
    pub fn subscribe(
        &mut self,
        pass: RenderPassKind,
        z_order: i32,
        callback: RenderCallback,
    ) -> Result<SubscriptionKey, SubscriptionError> {
        let key = self
            .passes
            .subscribe(self.object.key(), pass, z_order, callback)?;
        self.object.record_subscription(self.view_index, pass, key);
        Ok(key)
    }

    /// Subscribes with a plain closure.
    pub fn subscribe_fn(
        &mut self,
        pass: RenderPassKind,
        z_order: i32,
        callback: impl Fn(&mut RenderContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Result<SubscriptionKey, SubscriptionError> {
        self.subscribe(pass, z_order, Arc::new(callback))
    }

    /// Subscribes to `pass` unless a live subscription already exists.
    ///
    /// Returns true if a subscription was added.
    pub fn ensure_subscribed(
        &mut self,
        pass: RenderPassKind,
        z_order: i32,
        callback: impl Fn(&mut RenderContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Result<bool, SubscriptionError> {
        if self.is_subscribed(pass) {
            return Ok(false);
        }
        self.subscribe_fn(pass, z_order, callback)?;
        Ok(true)
    }

    /// Unsubscribes the object from `pass` in this view. Returns how many
    /// subscriptions were removed.
    pub fn unsubscribe(&mut self, pass: RenderPassKind) -> usize {
        self.object
            .unsubscribe_pass(self.view_index, pass, self.passes)
    }

    /// Unsubscribes the object from every pass in this view.
    pub fn unsubscribe_all(&mut self) -> usize {
        self.object.unsubscribe_view(self.view_index, self.passes)
    }
}
