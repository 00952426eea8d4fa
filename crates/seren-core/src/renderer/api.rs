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

//! Plain data types exchanged with devices and hosts.

use crate::math::Extent2D;
use std::fmt;

/// Index of a GPU device inside the [`EngineContext`](crate::EngineContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIndex(pub usize);

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// An opaque handle to a render target created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(pub u64);

/// The rectangle of the render target a view draws into.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Viewport {
    /// Creates a viewport covering the whole extent.
    pub fn covering(size: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
        }
    }
}

/// The view-level resources a host creates for a device.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewResources {
    /// The color render target.
    pub color_target: TargetHandle,
    /// The depth/stencil render target.
    pub depth_target: TargetHandle,
    /// The viewport rendered into.
    pub viewport: Viewport,
    /// The pixel size the targets were created with.
    pub size: Extent2D,
    /// Dots per inch of the output surface.
    pub dpi: f32,
}

/// The fixed render passes every (layer, view) pair owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderPassKind {
    /// Opaque geometry, rendered in subscription order.
    Plain,
    /// Line geometry.
    Line,
    /// Blended geometry, resorted back-to-front every frame.
    Transparent,
    /// Batched sprites.
    SpriteBatch,
    /// 2D overlay drawing, ordered by z-order.
    Overlay2D,
}

impl RenderPassKind {
    /// Every pass, in storage order.
    pub const ALL: [RenderPassKind; 5] = [
        RenderPassKind::Plain,
        RenderPassKind::Line,
        RenderPassKind::Transparent,
        RenderPassKind::SpriteBatch,
        RenderPassKind::Overlay2D,
    ];

    /// Passes executed by the main scene render, in execution order.
    pub const MAIN: [RenderPassKind; 4] = [
        RenderPassKind::Plain,
        RenderPassKind::Line,
        RenderPassKind::Transparent,
        RenderPassKind::SpriteBatch,
    ];

    /// Passes executed by the overlay render.
    pub const OVERLAY: [RenderPassKind; 1] = [RenderPassKind::Overlay2D];

    /// Returns the dense index of the pass (position in [`RenderPassKind::ALL`]).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            RenderPassKind::Plain => 0,
            RenderPassKind::Line => 1,
            RenderPassKind::Transparent => 2,
            RenderPassKind::SpriteBatch => 3,
            RenderPassKind::Overlay2D => 4,
        }
    }

    /// Returns true if subscriptions to this pass are kept ordered by z-order.
    #[inline]
    pub const fn is_sorted(self) -> bool {
        matches!(self, RenderPassKind::Transparent | RenderPassKind::Overlay2D)
    }
}

impl fmt::Display for RenderPassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderPassKind::Plain => write!(f, "Plain"),
            RenderPassKind::Line => write!(f, "Line"),
            RenderPassKind::Transparent => write!(f, "Transparent"),
            RenderPassKind::SpriteBatch => write!(f, "SpriteBatch"),
            RenderPassKind::Overlay2D => write!(f, "Overlay2D"),
        }
    }
}

/// Pipeline state bound on a device before a group of draw callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
    /// Device-wide defaults (blend, depth, raster), bound once per scene render.
    DeviceDefaults,
    /// State specific to one render pass.
    Pass(RenderPassKind),
}

/// A frame handed to attached encoders after a successful present.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedFrame {
    /// Number of frames this view has presented so far, starting at 1.
    pub frame_number: u64,
    /// The device the frame was rendered on.
    pub device: DeviceIndex,
    /// The color target holding the frame.
    pub color_target: TargetHandle,
    /// The pixel size of the frame.
    pub size: Extent2D,
}
