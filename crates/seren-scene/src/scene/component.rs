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

use std::time::Duration;

/// What a [`SceneComponent`] receives every frame.
#[derive(Debug, Clone, Copy)]
pub struct SceneUpdateContext {
    /// Time elapsed since the previous frame.
    pub dt: Duration,
    /// The scene's simulation time, wrapped at one day.
    pub simulation_time: Duration,
}

/// Scene-wide logic updated once per frame, before the layers.
pub trait SceneComponent: Send + Sync {
    /// A short name used in error messages.
    fn name(&self) -> &str;

    /// Advances the component by one frame.
    fn update(&mut self, ctx: &mut SceneUpdateContext) -> anyhow::Result<()>;
}
