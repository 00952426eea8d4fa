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

//! Render-pass subscriptions.
//!
//! For each (layer, view) pair a [`ViewSubscriptionEngine`] keeps one list per
//! [`RenderPassKind`] of the objects that asked to draw in that pass. Objects
//! subscribe while the scene updates them for a view; culling and failing
//! callbacks unsubscribe them; the lists are compacted once per frame.

mod engine;
mod pass;

pub use self::engine::ViewSubscriptionEngine;
pub(crate) use self::engine::ViewUpdateReport;
pub use self::pass::{PassSet, SubscriptionInfo};
pub(crate) use self::pass::RenderOutcome;

use crate::object::ObjectKey;
use crate::view::ViewBinding;
use seren_core::renderer::{GraphicsDevice, RenderPassKind};
use std::sync::Arc;

slotmap::new_key_type! {
    /// Stable handle of a subscription record.
    ///
    /// Handles stay valid across compactions for live records and become
    /// stale once the record is dropped.
    pub struct SubscriptionKey;
}

/// What a render callback receives.
pub struct RenderContext<'a> {
    /// The device the view renders on.
    pub device: &'a dyn GraphicsDevice,
    /// The view being rendered.
    pub view: &'a ViewBinding,
    /// The pass being rendered. Its pipeline state is already bound.
    pub pass: RenderPassKind,
    /// The subscribing object.
    pub object: ObjectKey,
    /// The subscription's z-order.
    pub z_order: i32,
}

/// Draws one object in one pass.
///
/// Returning an error (or panicking) quarantines the subscribing object.
pub type RenderCallback =
    Arc<dyn Fn(&mut RenderContext<'_>) -> anyhow::Result<()> + Send + Sync>;
