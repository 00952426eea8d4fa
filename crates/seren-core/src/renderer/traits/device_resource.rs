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

use crate::renderer::traits::GraphicsDevice;
use anyhow::Result;

/// A resource that lives in one device's partition of a scene.
///
/// Geometry, materials and textures implement this; the core only decides *when*
/// they are loaded and released.
pub trait DeviceResource: Send {
    /// A short name used in log messages and fault reports.
    fn name(&self) -> &str;

    /// Creates the GPU-side representation on `device`.
    fn load(&mut self, device: &dyn GraphicsDevice) -> Result<()>;

    /// Releases the GPU-side representation.
    fn unload(&mut self, device: &dyn GraphicsDevice);

    /// Returns true if [`load`](Self::load) succeeded and no unload happened since.
    fn is_loaded(&self) -> bool;
}
