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

use crate::math::LinearRgba;
use crate::renderer::api::{DeviceIndex, PassState, ViewResources};
use crate::renderer::error::DeviceError;
use std::fmt::Debug;

/// An opaque GPU device as seen by the scheduling core.
///
/// The core never interprets the device's resource formats; it only sequences
/// calls against the device's immediate command context. All views bound to a
/// device are rendered sequentially on one task, so implementations only have
/// to be safe against concurrent use from *different* devices' tasks and from
/// resource loading.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Returns the index of this device inside the engine context.
    fn index(&self) -> DeviceIndex;

    /// Returns a human-readable adapter name.
    fn name(&self) -> &str;

    /// Returns true if the device has been lost and cannot render anymore.
    fn is_lost(&self) -> bool;

    /// Clears the color and depth targets of a view.
    /// ## Errors
    /// * `DeviceError` - If the clear could not be recorded.
    fn clear_targets(
        &self,
        resources: &ViewResources,
        color: LinearRgba,
    ) -> Result<(), DeviceError>;

    /// Binds pipeline state for the draw callbacks that follow.
    /// ## Errors
    /// * `DeviceError` - If the state could not be bound.
    fn bind_pass_state(&self, state: PassState) -> Result<(), DeviceError>;

    /// Submits everything recorded on the immediate context.
    /// ## Errors
    /// * `DeviceError` - If the submission failed.
    fn flush(&self) -> Result<(), DeviceError>;
}
