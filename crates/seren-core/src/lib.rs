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

//! # Seren Core
//!
//! Foundational crate containing the contracts shared by the scene graph and the
//! frame scheduler: the GPU device and host-view collaborators, the explicit
//! engine context, one-shot completions, observer lists and the small amount of
//! math the scheduling core needs.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod event;
pub mod math;
pub mod promise;
pub mod renderer;
pub mod utils;

pub use config::{EngineConfig, SchedulerConfig, ViewConfig};
pub use context::{EngineContext, EngineFault};
pub use promise::Completion;
pub use utils::timer::Stopwatch;
