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

//! Cameras and their ownership by views.

use seren_core::math::Vec3;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

static NEXT_CAMERA_ID: AtomicU64 = AtomicU64::new(1);

/// A point of view. A camera can be attached to at most one view at a time.
pub struct Camera {
    id: u64,
    name: String,
    position: RwLock<Vec3>,
    owner: Mutex<Option<u64>>,
}

impl Camera {
    /// Creates an unattached camera at the origin.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CAMERA_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            position: RwLock::new(Vec3::ZERO),
            owner: Mutex::new(None),
        })
    }

    /// Creates an unattached camera at `position`.
    pub fn at(name: impl Into<String>, position: Vec3) -> Arc<Self> {
        let camera = Self::new(name);
        camera.set_position(position);
        camera
    }

    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The camera's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space position of the eye.
    pub fn position(&self) -> Vec3 {
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the eye.
    pub fn set_position(&self, position: Vec3) {
        *self.position.write().unwrap_or_else(PoisonError::into_inner) = position;
    }

    /// Identifier of the view currently owning the camera.
    pub fn owner(&self) -> Option<u64> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches the camera to `owner`.
    ///
    /// Returns `false` if another owner holds it. Claiming twice with the same
    /// owner succeeds.
    pub(crate) fn try_claim(&self, owner: u64) -> bool {
        let mut current = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        match *current {
            Some(existing) if existing != owner => false,
            _ => {
                *current = Some(owner);
                true
            }
        }
    }

    /// Detaches the camera if `owner` holds it.
    pub(crate) fn release(&self, owner: u64) {
        let mut current = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == Some(owner) {
            *current = None;
        }
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("position", &self.position())
            .field("owner", &self.owner())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_claimed_camera_rejects_other_owners() {
        let camera = Camera::new("main");
        assert!(camera.try_claim(1));
        assert!(camera.try_claim(1));
        assert!(!camera.try_claim(2));

        camera.release(2);
        assert_eq!(camera.owner(), Some(1));

        camera.release(1);
        assert!(camera.try_claim(2));
    }
}
