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

//! Errors reported by device collaborators.

use super::api::DeviceIndex;
use thiserror::Error;

/// An error raised by a [`GraphicsDevice`](super::GraphicsDevice) call.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device was lost (driver reset, adapter removed).
    #[error("{0} was lost")]
    Lost(DeviceIndex),
    /// A command submitted to the immediate context failed.
    #[error("command failed on {device}: {details}")]
    CommandFailed {
        /// The device the command was issued on.
        device: DeviceIndex,
        /// Backend-specific details.
        details: String,
    },
    /// An error originating from the specific backend implementation.
    #[error("backend error: {0}")]
    Backend(String),
}
