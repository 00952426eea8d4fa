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

//! # Seren Scene
//!
//! The scene graph shared by every view of a scene, and the per-(layer, view)
//! engine deciding which objects render in which pass, in which order.
//!
//! A [`Scene`] is updated exactly once per frame by the frame scheduler, no
//! matter how many views display it. Its object list only changes inside that
//! update: other threads go through the two deferred queues
//! ([`Scene::enqueue_before_update`], [`Scene::enqueue_beside_render`]) or
//! through [`Scene::manipulate`].

#![warn(missing_docs)]

pub mod camera;
pub mod error;
pub mod layer;
pub mod object;
pub mod scene;
pub mod subscription;
pub mod view;
pub mod visibility;

pub use camera::Camera;
pub use error::{SceneError, SubscriptionError};
pub use layer::{Layer, DEFAULT_LAYER};
pub use object::{
    CustomData, CustomValue, ObjectBehavior, ObjectDesc, ObjectKey, ObjectUpdateContext,
    SceneObject, ViewUpdateContext,
};
pub use scene::{
    BeforeUpdateAction, BesideRenderAction, RenderSummary, Scene, SceneComponent, SceneId,
    SceneManipulator, SceneUpdateContext,
};
pub use subscription::{
    PassSet, RenderCallback, RenderContext, SubscriptionInfo, SubscriptionKey,
    ViewSubscriptionEngine,
};
pub use view::{ViewBinding, ViewIndex};
pub use visibility::{FilterChain, FilterEnvironment, FilterStage, ObjectFilter, StageOutcome};
