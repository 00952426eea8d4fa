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

//! Shared fixtures for the scene integration tests.

#![allow(dead_code)]

use seren_core::math::LinearRgba;
use seren_core::renderer::{
    DeviceError, DeviceIndex, DeviceResource, GraphicsDevice, PassState, ViewResources,
};
use seren_core::{EngineConfig, EngineContext};
use seren_core::renderer::RenderPassKind;
use seren_scene::{ObjectBehavior, RenderContext, Scene, SceneManipulator, ViewUpdateContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A device that records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub index: usize,
    pub binds: Mutex<Vec<PassState>>,
}

impl RecordingDevice {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(Self {
            index,
            ..Default::default()
        })
    }

    pub fn binds(&self) -> Vec<PassState> {
        self.binds.lock().unwrap().clone()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn index(&self) -> DeviceIndex {
        DeviceIndex(self.index)
    }
    fn name(&self) -> &str {
        "recording"
    }
    fn is_lost(&self) -> bool {
        false
    }
    fn clear_targets(&self, _: &ViewResources, _: LinearRgba) -> Result<(), DeviceError> {
        Ok(())
    }
    fn bind_pass_state(&self, state: PassState) -> Result<(), DeviceError> {
        self.binds.lock().unwrap().push(state);
        Ok(())
    }
    fn flush(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Shared record of the draws performed by [`Drawable`]s.
pub type DrawLog = Arc<Mutex<Vec<String>>>;

/// Subscribes to one pass and appends its name to a [`DrawLog`] on every draw.
/// Draws fail while `failing` is set.
pub struct Drawable {
    pub pass: RenderPassKind,
    pub z_order: i32,
    pub log: DrawLog,
    pub failing: Arc<AtomicBool>,
}

impl Drawable {
    pub fn new(pass: RenderPassKind, log: &DrawLog) -> Self {
        Self {
            pass,
            z_order: 0,
            log: Arc::clone(log),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = z_order;
        self
    }
}

impl ObjectBehavior for Drawable {
    fn update_for_view(&mut self, ctx: &mut ViewUpdateContext<'_>) -> anyhow::Result<()> {
        let name = ctx.object().name().to_owned();
        let failing = Arc::clone(&self.failing);
        let log = Arc::clone(&self.log);
        ctx.ensure_subscribed(self.pass, self.z_order, move |_: &mut RenderContext<'_>| {
            if failing.load(Ordering::SeqCst) {
                anyhow::bail!("draw of '{name}' failed");
            }
            log.lock().unwrap().push(name.clone());
            Ok(())
        })?;
        Ok(())
    }
}

pub fn new_scene(name: &str) -> Arc<Scene> {
    init_logging();
    Scene::new(EngineContext::new(EngineConfig::default()), name)
}

/// Applies `f` at the next update and returns its result.
pub fn apply<T: Clone + Send + 'static>(
    scene: &Scene,
    f: impl FnOnce(&mut SceneManipulator<'_>) -> Result<T, seren_scene::SceneError>
        + Send
        + 'static,
) -> T {
    let done = scene.manipulate(f);
    scene.update(Duration::from_millis(16)).expect("update");
    done.try_get().expect("applied").expect("manipulation")
}

/// A resource whose load can be made to fail.
pub struct TestResource {
    pub name: String,
    pub fail: bool,
    pub loaded: bool,
}

impl DeviceResource for TestResource {
    fn name(&self) -> &str {
        &self.name
    }
    fn load(&mut self, _: &dyn GraphicsDevice) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("corrupt data");
        }
        self.loaded = true;
        Ok(())
    }
    fn unload(&mut self, _: &dyn GraphicsDevice) {
        self.loaded = false;
    }
    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
