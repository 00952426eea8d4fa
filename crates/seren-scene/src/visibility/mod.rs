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

//! Per-view visibility filters.
//!
//! Every view owns an ordered [`FilterChain`]. An object is visible in a view
//! when every stage of the chain accepts it; evaluation stops at the first
//! stage that rejects it. Results are cached per (object, view, stage) so a
//! stage only runs again when something it depends on changed.

pub(crate) mod culling;

use crate::object::SceneObject;
use crate::view::ViewBinding;
use seren_core::math::Vec3;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// What a filter sees besides the object under test.
#[derive(Clone, Copy)]
pub struct FilterEnvironment<'a> {
    /// The view being culled.
    pub view: &'a ViewBinding,
    /// Eye position of the view's camera.
    pub camera_position: Vec3,
}

/// A visibility test applied to the spatial objects of a scene.
pub trait ObjectFilter: Send + Sync {
    /// A short name used in log messages.
    fn name(&self) -> &str;

    /// Whether the filter depends on per-frame state (camera, time) and must be
    /// re-evaluated every frame.
    fn update_every_frame(&self) -> bool {
        false
    }

    /// Returns true if `object` passes this stage.
    fn is_visible(&self, object: &SceneObject, env: &FilterEnvironment<'_>) -> bool;
}

/// One stage of a [`FilterChain`]: a filter and its change flags.
///
/// Changes are requested from any thread with [`FilterStage::mark_changed`] and
/// become effective when the owning scene latches them during its beside-render
/// step, so culling sees a stable value for the whole frame.
pub struct FilterStage {
    filter: Arc<dyn ObjectFilter>,
    change_requested: AtomicBool,
    changed: AtomicBool,
}

impl FilterStage {
    fn new(filter: Arc<dyn ObjectFilter>) -> Self {
        Self {
            filter,
            change_requested: AtomicBool::new(false),
            changed: AtomicBool::new(false),
        }
    }

    /// The wrapped filter.
    pub fn filter(&self) -> &Arc<dyn ObjectFilter> {
        &self.filter
    }

    /// Requests a re-evaluation of this stage for every object.
    pub fn mark_changed(&self) {
        self.change_requested.store(true, Ordering::Release);
    }

    /// Whether a change is effective for the current frame.
    pub fn is_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    fn latch(&self) {
        let requested = self.change_requested.swap(false, Ordering::AcqRel);
        self.changed.store(requested, Ordering::Release);
    }
}

impl fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStage")
            .field("filter", &self.filter.name())
            .field("changed", &self.is_changed())
            .finish()
    }
}

/// The outcome of one stage for one object, as cached by culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageOutcome {
    /// The stage ran for the object (and its result is cached).
    pub executed: bool,
    /// The object passed the stage.
    pub passed: bool,
}

/// The ordered filter stages of one view.
///
/// The chain carries a version that changes whenever stages are added, removed
/// or reordered; culling treats a version change like a change of every stage.
#[derive(Default)]
pub struct FilterChain {
    stages: RwLock<Vec<Arc<FilterStage>>>,
    version: AtomicU64,
}

impl FilterChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn push(&self, filter: Arc<dyn ObjectFilter>) -> Arc<FilterStage> {
        let stage = Arc::new(FilterStage::new(filter));
        self.edit(|stages| stages.push(Arc::clone(&stage)));
        stage
    }

    /// Replaces every stage.
    pub fn replace(&self, filters: Vec<Arc<dyn ObjectFilter>>) {
        self.edit(|stages| {
            *stages = filters
                .into_iter()
                .map(|f| Arc::new(FilterStage::new(f)))
                .collect();
        });
    }

    /// Removes every stage.
    pub fn clear(&self) {
        self.edit(Vec::clear);
    }

    /// Edits the stages in place and bumps the chain version.
    pub fn edit<R>(&self, edit: impl FnOnce(&mut Vec<Arc<FilterStage>>) -> R) -> R {
        let mut stages = self.stages.write().unwrap_or_else(PoisonError::into_inner);
        let result = edit(&mut stages);
        self.version.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// A snapshot of the stages, in evaluation order.
    pub fn stages(&self) -> Vec<Arc<FilterStage>> {
        self.stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the chain has no stage.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current structural version.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Makes pending change requests effective and clears the requests.
    pub(crate) fn latch_changes(&self) {
        for stage in self
            .stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            stage.latch();
        }
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.stages())
            .field("version", &self.version())
            .finish()
    }
}
