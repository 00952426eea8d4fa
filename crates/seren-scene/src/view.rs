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

//! The scene-side face of a view.
//!
//! A [`ViewBinding`] carries what a scene needs to know about one view: its
//! camera, its size and its filter chain. The pipeline owns the binding and
//! registers it on exactly one scene at a time.

use crate::camera::Camera;
use crate::error::SceneError;
use crate::visibility::FilterChain;
use seren_core::math::{Extent2D, Vec3};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Dense position of a view inside one scene's registration table.
///
/// Indices of deregistered views are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewIndex(pub usize);

impl fmt::Display for ViewIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// The data of a view that scenes read while updating, culling and rendering.
pub struct ViewBinding {
    id: u64,
    name: String,
    camera: RwLock<Option<Arc<Camera>>>,
    size: RwLock<Extent2D>,
    filters: FilterChain,
}

impl ViewBinding {
    /// Creates a binding without camera and with an empty filter chain.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            camera: RwLock::new(None),
            size: RwLock::new(Extent2D::default()),
            filters: FilterChain::new(),
        })
    }

    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name used in log messages and faults.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attached camera.
    pub fn camera(&self) -> Option<Arc<Camera>> {
        self.camera
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Eye position of the attached camera, or the origin.
    pub fn camera_position(&self) -> Vec3 {
        self.camera().map_or(Vec3::ZERO, |c| c.position())
    }

    /// Attaches `camera`, detaching the previous one. Returns the previous camera.
    ///
    /// Fails without side effects if `camera` is attached to another view.
    pub fn set_camera(
        &self,
        camera: Option<Arc<Camera>>,
    ) -> Result<Option<Arc<Camera>>, SceneError> {
        if let Some(camera) = &camera {
            if !camera.try_claim(self.id) {
                return Err(SceneError::CameraInUse(camera.name().to_owned()));
            }
        }
        let previous = std::mem::replace(
            &mut *self.camera.write().unwrap_or_else(PoisonError::into_inner),
            camera.clone(),
        );
        if let Some(previous) = &previous {
            let reattached = camera.as_ref().is_some_and(|c| Arc::ptr_eq(c, previous));
            if !reattached {
                previous.release(self.id);
            }
        }
        Ok(previous)
    }

    /// Current size of the view targets.
    pub fn size(&self) -> Extent2D {
        *self.size.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the size of the view targets.
    pub fn set_size(&self, size: Extent2D) {
        *self.size.write().unwrap_or_else(PoisonError::into_inner) = size;
    }

    /// The view's filter chain.
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }
}

impl fmt::Debug for ViewBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBinding")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("camera", &self.camera().map(|c| c.name().to_owned()))
            .field("size", &self.size())
            .field("filters", &self.filters.len())
            .finish()
    }
}
