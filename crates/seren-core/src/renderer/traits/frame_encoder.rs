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

use crate::renderer::api::PresentedFrame;
use anyhow::Result;

/// A sink receiving every frame a view presents (video capture, streaming).
pub trait FrameEncoder: Send {
    /// A short name used in log messages.
    fn name(&self) -> &str;

    /// Consumes one presented frame.
    ///
    /// Returning an error detaches the encoder from the view and finalizes it.
    fn push_frame(&mut self, frame: &PresentedFrame) -> Result<()>;

    /// Finalizes the output. Called exactly once, on detach.
    fn finish(&mut self) -> Result<()>;
}
