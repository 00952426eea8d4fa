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

//! Shared fixtures for the frame integration tests.

#![allow(dead_code)]

use seren_core::math::{Extent2D, LinearRgba};
use seren_core::renderer::{
    DeviceError, DeviceIndex, GraphicsDevice, PassState, RenderPassKind, TargetHandle,
    ViewHost, ViewResources, Viewport,
};
use seren_core::{EngineConfig, EngineContext};
use seren_scene::{
    ObjectBehavior, RenderContext, Scene, SceneComponent, SceneUpdateContext, ViewUpdateContext,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Generous timeout for blocking on the loop thread.
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn test_context() -> Arc<EngineContext> {
    init_logging();
    let mut config = EngineConfig::default();
    config.scheduler.min_frame_interval = Duration::from_millis(2);
    config.scheduler.error_backoff = Duration::from_millis(20);
    config.scheduler.worker_threads = 4;
    EngineContext::new(config)
}

/// A device recording bound pass states and counting flushes.
#[derive(Debug, Default)]
pub struct MockDevice {
    pub index: usize,
    pub binds: Mutex<Vec<PassState>>,
    pub flushes: AtomicUsize,
    pub fail_clear: AtomicBool,
}

impl MockDevice {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(Self {
            index,
            ..Default::default()
        })
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl GraphicsDevice for MockDevice {
    fn index(&self) -> DeviceIndex {
        DeviceIndex(self.index)
    }
    fn name(&self) -> &str {
        "mock"
    }
    fn is_lost(&self) -> bool {
        false
    }
    fn clear_targets(&self, _: &ViewResources, _: LinearRgba) -> Result<(), DeviceError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(DeviceError::CommandFailed {
                device: self.index(),
                details: "clear rejected".into(),
            });
        }
        Ok(())
    }
    fn bind_pass_state(&self, state: PassState) -> Result<(), DeviceError> {
        self.binds.lock().unwrap().push(state);
        Ok(())
    }
    fn flush(&self) -> Result<(), DeviceError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A host recording its calls. Individual steps can be made to fail, veto or
/// panic.
#[derive(Default)]
pub struct MockHost {
    pub calls: Mutex<Vec<String>>,
    pub veto: AtomicBool,
    pub fail_present: AtomicBool,
    pub fail_check: AtomicBool,
    pub panic_check: AtomicBool,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str, device: &dyn GraphicsDevice) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{call}@{}", device.index().0));
    }
}

impl ViewHost for MockHost {
    fn create_view_resources(&self, device: &dyn GraphicsDevice) -> anyhow::Result<ViewResources> {
        self.record("create", device);
        let size = Extent2D::new(64, 64);
        Ok(ViewResources {
            color_target: TargetHandle(1),
            depth_target: TargetHandle(2),
            viewport: Viewport::covering(size),
            size,
            dpi: 96.0,
        })
    }
    fn dispose_view_resources(&self, device: &dyn GraphicsDevice) -> anyhow::Result<()> {
        self.record("dispose", device);
        Ok(())
    }
    fn check_can_render(&self, device: &dyn GraphicsDevice) -> anyhow::Result<bool> {
        if self.fail_check.load(Ordering::SeqCst) {
            anyhow::bail!("surface gone");
        }
        if self.panic_check.load(Ordering::SeqCst) {
            panic!("host crashed");
        }
        self.record("check", device);
        Ok(!self.veto.load(Ordering::SeqCst))
    }
    fn present(&self, device: &dyn GraphicsDevice) -> anyhow::Result<()> {
        if self.fail_present.load(Ordering::SeqCst) {
            anyhow::bail!("swap chain out of date");
        }
        self.record("present", device);
        Ok(())
    }
}

/// Counts the updates of the scene it is attached to.
pub struct UpdateCounter(pub Arc<AtomicUsize>);

impl SceneComponent for UpdateCounter {
    fn name(&self) -> &str {
        "update-counter"
    }
    fn update(&mut self, _: &mut SceneUpdateContext) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Subscribes to the plain pass and counts its draws.
pub struct Counted {
    pub draws: Arc<AtomicUsize>,
    pub failing: Arc<AtomicBool>,
}

impl Counted {
    pub fn new(draws: &Arc<AtomicUsize>) -> Self {
        Self {
            draws: Arc::clone(draws),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ObjectBehavior for Counted {
    fn update_for_view(&mut self, ctx: &mut ViewUpdateContext<'_>) -> anyhow::Result<()> {
        let draws = Arc::clone(&self.draws);
        let failing = Arc::clone(&self.failing);
        ctx.ensure_subscribed(RenderPassKind::Plain, 0, move |_: &mut RenderContext<'_>| {
            if failing.load(Ordering::SeqCst) {
                anyhow::bail!("draw failed");
            }
            draws.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })?;
        Ok(())
    }
}

/// A scene counting its updates through a component.
pub fn counted_scene(context: &Arc<EngineContext>, name: &str) -> (Arc<Scene>, Arc<AtomicUsize>) {
    let scene = Scene::new(Arc::clone(context), name);
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = UpdateCounter(Arc::clone(&updates));
    scene.enqueue_before_update(move |m| {
        m.add_component(counter);
        Ok(())
    });
    (scene, updates)
}
