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

//! Per-view render state machines.
//!
//! A [`ViewPipeline`] owns one on-screen view. Setters only record the target
//! device, scene, size and configuration; the pipeline commits them in
//! [`ViewPipeline::prepare`], which the frame scheduler calls once per frame
//! before the view's [`ViewPipeline::render`].

mod encoders;

pub use self::encoders::EncoderId;

use self::encoders::EncoderSet;
use crate::error::{panic_message, ViewError};
use seren_core::event::Observers;
use seren_core::math::Extent2D;
use seren_core::renderer::{
    DeviceIndex, FrameEncoder, GraphicsDevice, PresentedFrame, ViewHost, ViewResources,
};
use seren_core::{EngineContext, ViewConfig};
use seren_scene::{Camera, FilterChain, Scene, SceneError, ViewBinding};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a [`ViewPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// Created, never prepared.
    Uninitialized,
    /// Prepared at least once and not rendering right now.
    Prepared,
    /// Inside [`ViewPipeline::render`].
    Rendering,
    /// Terminal: the pipeline released its resources and camera.
    Disposed,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewState::Uninitialized => write!(f, "Uninitialized"),
            ViewState::Prepared => write!(f, "Prepared"),
            ViewState::Rendering => write!(f, "Rendering"),
            ViewState::Disposed => write!(f, "Disposed"),
        }
    }
}

/// Scene registration work returned by [`ViewPipeline::prepare`].
///
/// The scheduler applies continuations only after every view of the frame
/// has been prepared, so no scene's view table changes while other views are
/// still preparing.
#[derive(Debug, Clone)]
pub enum ViewContinuation {
    /// Register the view on a scene.
    RegisterOnScene(Arc<Scene>),
    /// Deregister the view from a scene.
    DeregisterFromScene(Arc<Scene>),
}

/// Emitted when a pipeline commits a new device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceChanged {
    /// Name of the view.
    pub view: String,
    /// The device used until now.
    pub previous: Option<DeviceIndex>,
    /// The device used from now on.
    pub current: Option<DeviceIndex>,
}

/// Emitted when a pipeline's camera changes.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraChanged {
    /// Name of the view.
    pub view: String,
    /// Name of the previous camera.
    pub previous: Option<String>,
    /// Name of the new camera.
    pub current: Option<String>,
}

type AfterPresent = Box<dyn FnOnce(&PresentedFrame) + Send>;
type FilterEdit = Box<dyn FnOnce(&FilterChain) + Send>;

#[derive(Clone)]
struct Target {
    device: Option<Arc<dyn GraphicsDevice>>,
    scene: Option<Arc<Scene>>,
    size: Extent2D,
    config: ViewConfig,
}

struct Committed {
    state: ViewState,
    device: Option<Arc<dyn GraphicsDevice>>,
    scene: Option<Arc<Scene>>,
    size: Extent2D,
    config: ViewConfig,
    resources: Option<ViewResources>,
    armed: bool,
    last_render_ok: bool,
    presented: u64,
    rendered: u64,
}

/// The render state machine of one on-screen view.
pub struct ViewPipeline {
    name: String,
    host: Arc<dyn ViewHost>,
    binding: Arc<ViewBinding>,
    committed: Mutex<Committed>,
    target: Mutex<Target>,
    registered_scene: Mutex<Option<Arc<Scene>>>,
    after_present: Mutex<Vec<AfterPresent>>,
    filter_edits: Mutex<Vec<FilterEdit>>,
    encoders: Mutex<EncoderSet>,
    device_changed: Observers<DeviceChanged>,
    camera_changed: Observers<CameraChanged>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn device_index(device: &Option<Arc<dyn GraphicsDevice>>) -> Option<DeviceIndex> {
    device.as_ref().map(|d| d.index())
}

impl ViewPipeline {
    /// Creates a pipeline using the context's default view configuration.
    pub fn new(
        context: &EngineContext,
        name: impl Into<String>,
        host: Arc<dyn ViewHost>,
    ) -> Arc<Self> {
        let name = name.into();
        let config = context.config().view.clone();
        let size = config.min_size;
        let binding = ViewBinding::new(name.clone());
        binding.set_size(size);
        log::debug!("Created view pipeline '{name}'.");
        Arc::new(Self {
            name,
            host,
            binding,
            committed: Mutex::new(Committed {
                state: ViewState::Uninitialized,
                device: None,
                scene: None,
                size,
                config: config.clone(),
                resources: None,
                armed: false,
                last_render_ok: false,
                presented: 0,
                rendered: 0,
            }),
            target: Mutex::new(Target {
                device: None,
                scene: None,
                size,
                config,
            }),
            registered_scene: Mutex::new(None),
            after_present: Mutex::new(Vec::new()),
            filter_edits: Mutex::new(Vec::new()),
            encoders: Mutex::new(EncoderSet::default()),
            device_changed: Observers::new(),
            camera_changed: Observers::new(),
        })
    }

    /// The view's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What scenes see of this view.
    pub fn binding(&self) -> &Arc<ViewBinding> {
        &self.binding
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ViewState {
        lock(&self.committed).state
    }

    /// The committed device.
    pub fn device(&self) -> Option<Arc<dyn GraphicsDevice>> {
        lock(&self.committed).device.clone()
    }

    /// The committed scene.
    pub fn scene(&self) -> Option<Arc<Scene>> {
        lock(&self.committed).scene.clone()
    }

    /// The scene the view is currently registered on.
    pub fn registered_scene(&self) -> Option<Arc<Scene>> {
        lock(&self.registered_scene).clone()
    }

    /// The committed size.
    pub fn size(&self) -> Extent2D {
        lock(&self.committed).size
    }

    /// Returns true if the last [`render`](Self::render) completed.
    pub fn last_render_succeeded(&self) -> bool {
        lock(&self.committed).last_render_ok
    }

    /// Number of frames rendered so far.
    pub fn rendered_frames(&self) -> u64 {
        lock(&self.committed).rendered
    }

    /// Number of frames presented so far.
    pub fn presented_frames(&self) -> u64 {
        lock(&self.committed).presented
    }

    /// Listeners notified when the committed device changes.
    pub fn device_changed(&self) -> &Observers<DeviceChanged> {
        &self.device_changed
    }

    /// Listeners notified when the camera changes.
    pub fn camera_changed(&self) -> &Observers<CameraChanged> {
        &self.camera_changed
    }

    // --- Target state ---

    /// Sets the device the view renders on from the next prepare.
    pub fn set_device(&self, device: Option<Arc<dyn GraphicsDevice>>) {
        lock(&self.target).device = device;
    }

    /// Sets the scene the view displays from the next prepare.
    pub fn set_scene(&self, scene: Option<Arc<Scene>>) {
        lock(&self.target).scene = scene;
    }

    /// Sets the view size, clamped to the configured minimum.
    pub fn set_view_size(&self, size: Extent2D) {
        let mut target = lock(&self.target);
        target.size = size.clamp_min(target.config.min_size);
    }

    /// Replaces the view configuration from the next prepare.
    pub fn set_config(&self, config: ViewConfig) {
        let mut target = lock(&self.target);
        target.size = target.size.clamp_min(config.min_size);
        target.config = config;
    }

    /// The attached camera.
    pub fn camera(&self) -> Option<Arc<Camera>> {
        self.binding.camera()
    }

    /// Attaches `camera`, releasing the previous one.
    ///
    /// ## Errors
    /// * `ViewError::CameraAlreadyOwned` - If another view owns the camera.
    /// * `ViewError::Disposed` - If the pipeline was disposed.
    pub fn set_camera(&self, camera: Option<Arc<Camera>>) -> Result<(), ViewError> {
        if self.state() == ViewState::Disposed {
            return Err(ViewError::Disposed(self.name.clone()));
        }
        let current = camera.as_ref().map(|c| c.name().to_owned());
        let previous = self
            .binding
            .set_camera(camera)
            .map_err(|e| match e {
                SceneError::CameraInUse(name) => ViewError::CameraAlreadyOwned(name),
                other => ViewError::Scene(other),
            })?
            .map(|c| c.name().to_owned());
        if previous != current {
            self.camera_changed.notify(&CameraChanged {
                view: self.name.clone(),
                previous,
                current,
            });
        }
        Ok(())
    }

    /// Runs `callback` once, right after the next successful present.
    pub fn run_after_present(&self, callback: impl FnOnce(&PresentedFrame) + Send + 'static) {
        lock(&self.after_present).push(Box::new(callback));
    }

    /// Queues an edit of the view's filter chain, applied at the next prepare.
    pub fn edit_filters(&self, edit: impl FnOnce(&FilterChain) + Send + 'static) {
        lock(&self.filter_edits).push(Box::new(edit));
    }

    /// Attaches a sink receiving every presented frame.
    pub fn attach_encoder(&self, encoder: Box<dyn FrameEncoder>) -> EncoderId {
        lock(&self.encoders).attach(encoder)
    }

    /// Detaches and finalizes an encoder.
    pub fn detach_encoder(&self, id: EncoderId) -> bool {
        lock(&self.encoders).detach(id, &self.name)
    }

    /// Number of attached encoders.
    pub fn encoder_count(&self) -> usize {
        lock(&self.encoders).len()
    }

    // --- Frame steps ---

    /// Commits the target state and arms the next [`render`](Self::render).
    ///
    /// In order: presents the previous frame, applies device/scene/size/config
    /// changes (recreating the view resources), checks that rendering is
    /// possible, lets the host veto or set up the frame, and applies queued
    /// filter edits. Rendering stays disarmed when a resource is missing or
    /// the host vetoes.
    ///
    /// ## Errors
    /// Any error is fatal for this view; the scheduler deregisters it.
    pub fn prepare(&self) -> Result<Vec<ViewContinuation>, ViewError> {
        let mut committed = lock(&self.committed);
        let c = &mut *committed;
        if c.state == ViewState::Disposed {
            return Err(ViewError::Disposed(self.name.clone()));
        }
        c.armed = false;

        self.present(c)?;
        let continuations = self.commit_target(c)?;
        if c.state == ViewState::Uninitialized {
            log::debug!("View '{}': {} -> {}.", self.name, c.state, ViewState::Prepared);
        }
        c.state = ViewState::Prepared;

        let device = match (&c.device, &c.resources, &c.scene) {
            (Some(device), Some(_), Some(_)) if !device.is_lost() => Arc::clone(device),
            _ => {
                log::trace!("View '{}': nothing to render this frame.", self.name);
                self.apply_filter_edits();
                return Ok(continuations);
            }
        };

        let can_render = self
            .host
            .check_can_render(device.as_ref())
            .map_err(|e| ViewError::host(&self.name, "check_can_render", e))?;
        if can_render {
            self.host
                .prepare_rendering(device.as_ref())
                .map_err(|e| ViewError::host(&self.name, "prepare_rendering", e))?;
        }

        self.apply_filter_edits();
        c.armed = can_render;
        Ok(continuations)
    }

    fn present(&self, c: &mut Committed) -> Result<(), ViewError> {
        if !std::mem::take(&mut c.last_render_ok) {
            return Ok(());
        }
        let (Some(device), Some(resources)) = (&c.device, &c.resources) else {
            return Ok(());
        };
        self.host
            .present(device.as_ref())
            .map_err(|e| ViewError::PresentFailed {
                view: self.name.clone(),
                error: format!("{e:#}"),
            })?;

        c.presented += 1;
        let frame = PresentedFrame {
            frame_number: c.presented,
            device: device.index(),
            color_target: resources.color_target,
            size: resources.size,
        };
        let callbacks = std::mem::take(&mut *lock(&self.after_present));
        for callback in callbacks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&frame))) {
                log::error!(
                    "An after-present callback of view '{}' panicked: {}",
                    self.name,
                    panic_message(payload)
                );
            }
        }
        lock(&self.encoders).push(&frame, &self.name);
        Ok(())
    }

    fn commit_target(&self, c: &mut Committed) -> Result<Vec<ViewContinuation>, ViewError> {
        let target = lock(&self.target).clone();
        let device_changed = device_index(&c.device) != device_index(&target.device);
        let scene_changed = c.scene.as_ref().map(|s| s.id()) != target.scene.as_ref().map(|s| s.id());
        let missing_resources = c.resources.is_none() && target.device.is_some();
        let mut continuations = Vec::new();
        if !(device_changed
            || scene_changed
            || missing_resources
            || c.size != target.size
            || c.config != target.config)
        {
            return Ok(continuations);
        }

        self.release_resources(c)?;

        if device_changed {
            let previous = device_index(&c.device);
            c.device = target.device;
            let current = device_index(&c.device);
            log::debug!("View '{}': device {previous:?} -> {current:?}.", self.name);
            self.device_changed.notify(&DeviceChanged {
                view: self.name.clone(),
                previous,
                current,
            });
        }

        c.size = target.size;
        c.config = target.config;
        self.binding.set_size(c.size);

        if scene_changed {
            if let Some(old) = c.scene.take() {
                continuations.push(ViewContinuation::DeregisterFromScene(old));
            }
            if let Some(new) = target.scene {
                continuations.push(ViewContinuation::RegisterOnScene(Arc::clone(&new)));
                c.scene = Some(new);
            }
        }

        if let Some(device) = c.device.as_ref().filter(|d| !d.is_lost()) {
            let resources = self
                .host
                .create_view_resources(device.as_ref())
                .map_err(|e| ViewError::host(&self.name, "create_view_resources", e))?;
            log::debug!(
                "View '{}': resources created on {} at {}x{}.",
                self.name,
                device.index(),
                resources.size.width,
                resources.size.height
            );
            c.resources = Some(resources);
        }
        Ok(continuations)
    }

    fn release_resources(&self, c: &mut Committed) -> Result<(), ViewError> {
        let (Some(device), Some(_)) = (&c.device, c.resources.take()) else {
            return Ok(());
        };
        self.host
            .dispose_view_resources(device.as_ref())
            .map_err(|e| ViewError::host(&self.name, "dispose_view_resources", e))
    }

    fn apply_filter_edits(&self) {
        let edits = std::mem::take(&mut *lock(&self.filter_edits));
        if edits.is_empty() {
            return;
        }
        let chain = self.binding.filters();
        for edit in edits {
            edit(chain);
        }
    }

    /// Renders the committed scene into the view, if the preceding
    /// [`prepare`](Self::prepare) armed it. Returns whether a frame was rendered.
    ///
    /// ## Errors
    /// Any error is fatal for this view; the scheduler deregisters it.
    pub fn render(&self) -> Result<bool, ViewError> {
        let mut committed = lock(&self.committed);
        let c = &mut *committed;
        if c.state == ViewState::Disposed {
            return Err(ViewError::Disposed(self.name.clone()));
        }
        if !std::mem::take(&mut c.armed) {
            return Ok(false);
        }
        let (Some(device), Some(resources), Some(scene)) =
            (c.device.clone(), c.resources.clone(), c.scene.clone())
        else {
            return Ok(false);
        };

        c.state = ViewState::Rendering;
        let result = self.render_frame(device.as_ref(), &resources, &scene, &c.config);
        c.state = ViewState::Prepared;
        result?;

        c.last_render_ok = true;
        c.rendered += 1;
        Ok(true)
    }

    fn render_frame(
        &self,
        device: &dyn GraphicsDevice,
        resources: &ViewResources,
        scene: &Scene,
        config: &ViewConfig,
    ) -> Result<(), ViewError> {
        device.clear_targets(resources, config.clear_color)?;
        let mut summary = scene.render(&self.binding, device)?;
        if config.render_overlay {
            let overlay = scene.render_overlay(&self.binding, device)?;
            summary.rendered += overlay.rendered;
            summary.failed += overlay.failed;
        }
        self.host
            .after_rendering(device)
            .map_err(|e| ViewError::host(&self.name, "after_rendering", e))?;
        device.flush()?;
        log::trace!(
            "View '{}': rendered '{}' ({} draws, {} failed).",
            self.name,
            scene.name(),
            summary.rendered,
            summary.failed
        );
        Ok(())
    }

    /// Releases the view resources, the camera and the encoders. Terminal.
    ///
    /// The scheduler deregisters a disposed view at its next prepare.
    pub fn dispose(&self) {
        let mut committed = lock(&self.committed);
        if committed.state == ViewState::Disposed {
            return;
        }
        if let Err(e) = self.release_resources(&mut committed) {
            log::warn!("View '{}': {e}", self.name);
        }
        committed.state = ViewState::Disposed;
        committed.armed = false;
        drop(committed);

        if let Ok(Some(camera)) = self.binding.set_camera(None) {
            self.camera_changed.notify(&CameraChanged {
                view: self.name.clone(),
                previous: Some(camera.name().to_owned()),
                current: None,
            });
        }
        lock(&self.encoders).finish_all(&self.name);
        lock(&self.after_present).clear();
        lock(&self.filter_edits).clear();
        log::debug!("View '{}' disposed.", self.name);
    }

    // --- Scene registration ---

    /// Applies a continuation returned by [`prepare`](Self::prepare).
    ///
    /// Returns the scene if the view was the last one registered on it.
    pub fn apply_continuation(
        &self,
        continuation: ViewContinuation,
    ) -> Result<Option<Arc<Scene>>, SceneError> {
        match continuation {
            ViewContinuation::RegisterOnScene(scene) => {
                let index = scene.register_view(Arc::clone(&self.binding))?;
                log::info!("View '{}' registered on '{}' as {index}.", self.name, scene.name());
                *lock(&self.registered_scene) = Some(scene);
                Ok(None)
            }
            ViewContinuation::DeregisterFromScene(scene) => {
                let remaining = scene.deregister_view(&self.binding)?;
                log::info!("View '{}' left '{}'.", self.name, scene.name());
                let mut registered = lock(&self.registered_scene);
                if registered.as_ref().is_some_and(|s| s.id() == scene.id()) {
                    *registered = None;
                }
                Ok((remaining == 0).then_some(scene))
            }
        }
    }

    /// Deregisters the view from its scene, as when the view leaves the
    /// scheduler. The next prepare registers it again.
    ///
    /// Returns the scene if the view was the last one registered on it.
    pub fn leave_scene(&self) -> Option<Arc<Scene>> {
        lock(&self.committed).scene = None;
        let scene = lock(&self.registered_scene).take()?;
        match scene.deregister_view(&self.binding) {
            Ok(remaining) => {
                log::info!("View '{}' left '{}'.", self.name, scene.name());
                (remaining == 0).then_some(scene)
            }
            Err(e) => {
                log::warn!("View '{}': {e}", self.name);
                None
            }
        }
    }
}

impl fmt::Debug for ViewPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let committed = lock(&self.committed);
        f.debug_struct("ViewPipeline")
            .field("name", &self.name)
            .field("state", &committed.state)
            .field("device", &device_index(&committed.device))
            .field("scene", &committed.scene.as_ref().map(|s| s.name().to_owned()))
            .field("size", &committed.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seren_core::EngineConfig;

    struct NullHost;

    impl ViewHost for NullHost {
        fn create_view_resources(
            &self,
            _: &dyn GraphicsDevice,
        ) -> anyhow::Result<ViewResources> {
            anyhow::bail!("no device expected")
        }
        fn dispose_view_resources(&self, _: &dyn GraphicsDevice) -> anyhow::Result<()> {
            Ok(())
        }
        fn present(&self, _: &dyn GraphicsDevice) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn pipeline() -> Arc<ViewPipeline> {
        let context = EngineContext::new(EngineConfig::default());
        ViewPipeline::new(&context, "main", Arc::new(NullHost))
    }

    #[test]
    fn sizes_are_clamped_to_the_minimum() {
        let view = pipeline();
        view.set_view_size(Extent2D::new(10, 600));
        view.prepare().unwrap();
        assert_eq!(view.size(), Extent2D::new(32, 600));
        assert_eq!(view.binding().size(), Extent2D::new(32, 600));
    }

    #[test]
    fn render_without_device_is_a_no_op() {
        let view = pipeline();
        assert_eq!(view.state(), ViewState::Uninitialized);
        assert!(view.prepare().unwrap().is_empty());
        assert_eq!(view.state(), ViewState::Prepared);
        assert!(!view.render().unwrap());
    }

    #[test]
    fn filter_edits_apply_at_prepare() {
        let view = pipeline();
        view.edit_filters(|chain| chain.clear());
        let before = view.binding().filters().version();
        view.prepare().unwrap();
        assert!(view.binding().filters().version() > before);
    }

    #[test]
    fn disposed_pipelines_refuse_to_prepare() {
        let view = pipeline();
        view.dispose();
        assert!(matches!(view.prepare(), Err(ViewError::Disposed(_))));
        assert_eq!(view.state(), ViewState::Disposed);
    }
}
