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

//! Engine configuration.
//!
//! Every knob has a default suited to an interactive application; hosts that
//! ship a settings file can read it with [`EngineConfig::from_json_str`].

use crate::math::{Extent2D, LinearRgba};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the global frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum duration of one loop iteration. Zero means "as fast as possible".
    pub min_frame_interval: Duration,
    /// Shortest sleep between two iterations. Shorter waits, including none,
    /// are rounded up to it, so the loop never spins.
    pub min_sleep_granularity: Duration,
    /// Wait applied after a frame-fatal error before the next iteration.
    pub error_backoff: Duration,
    /// Size of the fan-out pool. `0` lets rayon pick one thread per core.
    pub worker_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_frame_interval: Duration::ZERO,
            min_sleep_granularity: Duration::from_millis(1),
            error_backoff: Duration::from_secs(1),
            worker_threads: 0,
        }
    }
}

/// Configuration applied to every view pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Requested view sizes are clamped to at least this extent.
    pub min_size: Extent2D,
    /// Color the targets are cleared to before the scene renders.
    pub clear_color: LinearRgba,
    /// Whether the 2D overlay pass runs after the main scene render.
    pub render_overlay: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_size: Extent2D::new(32, 32),
            clear_color: LinearRgba::TRANSPARENT,
            render_overlay: true,
        }
    }
}

/// Root configuration object, owned by the [`EngineContext`](crate::EngineContext).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame loop settings.
    pub scheduler: SchedulerConfig,
    /// Default view settings.
    pub view: ViewConfig,
}

impl EngineConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }
}
