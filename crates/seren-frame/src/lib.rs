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

//! # Seren Frame
//!
//! The global frame clock and the per-view render pipelines.
//!
//! A [`FrameScheduler`] owns the loop thread. Every [`ViewPipeline`]
//! registered on it is prepared and rendered once per iteration, and every
//! scene displayed by at least one registered view is updated exactly once
//! per iteration, however many views display it.

#![warn(missing_docs)]

pub mod error;
pub mod pipeline;
pub mod scheduler;

pub use error::{FrameError, SchedulerError, ViewError};
pub use pipeline::{
    CameraChanged, DeviceChanged, EncoderId, ViewContinuation, ViewPipeline, ViewState,
};
pub use scheduler::{FrameScheduler, FrameStats, FRAME_LOOP_THREAD};
