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

use seren_core::renderer::{DeviceResource, GraphicsDevice};

/// The resources of one scene on one device.
#[derive(Default)]
pub(crate) struct DevicePartition {
    resources: Vec<Box<dyn DeviceResource>>,
}

impl DevicePartition {
    pub fn add(&mut self, resource: Box<dyn DeviceResource>) {
        self.resources.push(resource);
    }

    /// Removes the first resource called `name`.
    pub fn take(&mut self, name: &str) -> Option<Box<dyn DeviceResource>> {
        let position = self.resources.iter().position(|r| r.name() == name)?;
        Some(self.resources.remove(position))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn loaded(&self) -> usize {
        self.resources.iter().filter(|r| r.is_loaded()).count()
    }

    /// Loads every resource that is not loaded yet. A resource failing to load
    /// is dropped and handed to `on_failure`.
    pub fn load_pending(
        &mut self,
        device: &dyn GraphicsDevice,
        mut on_failure: impl FnMut(&str, &anyhow::Error),
    ) -> usize {
        let mut loaded = 0;
        self.resources.retain_mut(|resource| {
            if resource.is_loaded() {
                return true;
            }
            match resource.load(device) {
                Ok(()) => {
                    loaded += 1;
                    true
                }
                Err(e) => {
                    on_failure(resource.name(), &e);
                    false
                }
            }
        });
        loaded
    }

    /// Releases every loaded resource. Resources stay in the partition and load
    /// again the next time the scene is rendered on the device.
    pub fn unload_all(&mut self, device: &dyn GraphicsDevice) -> usize {
        let mut released = 0;
        for resource in self.resources.iter_mut().filter(|r| r.is_loaded()) {
            resource.unload(device);
            released += 1;
        }
        released
    }
}
