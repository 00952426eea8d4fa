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

use crate::renderer::api::ViewResources;
use crate::renderer::traits::GraphicsDevice;
use anyhow::Result;

/// The callback set implemented by the UI layer hosting a view.
///
/// All methods are called synchronously from the view pipeline's prepare and
/// render steps. An error from any of them is fatal for that view only: the
/// frame scheduler deregisters the view and keeps rendering the others.
pub trait ViewHost: Send + Sync {
    /// Creates the color/depth targets and viewport of the view on `device`.
    fn create_view_resources(&self, device: &dyn GraphicsDevice) -> Result<ViewResources>;

    /// Releases everything created by [`create_view_resources`](Self::create_view_resources).
    fn dispose_view_resources(&self, device: &dyn GraphicsDevice) -> Result<()>;

    /// Lets the host veto rendering for this frame (minimized window, hidden tab...).
    fn check_can_render(&self, device: &dyn GraphicsDevice) -> Result<bool> {
        let _ = device;
        Ok(true)
    }

    /// Called once rendering is armed, before the scene is drawn.
    fn prepare_rendering(&self, device: &dyn GraphicsDevice) -> Result<()> {
        let _ = device;
        Ok(())
    }

    /// Called after the scene has been drawn, before the device is flushed.
    fn after_rendering(&self, device: &dyn GraphicsDevice) -> Result<()> {
        let _ = device;
        Ok(())
    }

    /// Presents the last rendered frame.
    fn present(&self, device: &dyn GraphicsDevice) -> Result<()>;
}
