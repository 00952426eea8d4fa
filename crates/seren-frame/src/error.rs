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

//! Error types of the view pipelines and the frame scheduler.

use seren_core::renderer::DeviceError;
use seren_scene::SceneError;
use std::any::Any;
use thiserror::Error;

/// An error that is fatal for one view. The scheduler deregisters the view and
/// keeps rendering the others.
#[derive(Debug, Error)]
pub enum ViewError {
    /// Presenting the previous frame failed.
    #[error("view '{view}' failed to present: {error}")]
    PresentFailed {
        /// Name of the view.
        view: String,
        /// What went wrong.
        error: String,
    },
    /// A [`ViewHost`](seren_core::renderer::ViewHost) callback failed.
    #[error("host of view '{view}' failed during {step}: {error}")]
    Host {
        /// Name of the view.
        view: String,
        /// The pipeline step that called the host.
        step: &'static str,
        /// What went wrong.
        error: String,
    },
    /// The camera is owned by another view.
    #[error("camera '{0}' is already owned by another view")]
    CameraAlreadyOwned(String),
    /// The pipeline was disposed.
    #[error("view '{0}' is disposed")]
    Disposed(String),
    /// The device rejected a command.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// The scene refused the view.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// A pipeline step panicked.
    #[error("view '{view}' panicked: {message}")]
    Panicked {
        /// Name of the view.
        view: String,
        /// The panic payload.
        message: String,
    },
}

impl ViewError {
    pub(crate) fn host(view: &str, step: &'static str, error: anyhow::Error) -> Self {
        Self::Host {
            view: view.to_owned(),
            step,
            error: format!("{error:#}"),
        }
    }
}

/// A failure that escaped one frame-loop iteration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// Scene bookkeeping was found inconsistent.
    #[error("consistency violation: {0}")]
    Consistency(String),
    /// One or more scene updates failed.
    #[error("scene update failed: {0}")]
    SceneUpdate(String),
    /// A task of the iteration panicked.
    #[error("frame task panicked: {0}")]
    Panicked(String),
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// An error returned by the [`FrameScheduler`](crate::FrameScheduler) API.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The view is already registered.
    #[error("view '{0}' is already registered")]
    ViewAlreadyRegistered(String),
    /// The loop thread is already running.
    #[error("the frame loop is already running")]
    AlreadyRunning,
    /// The worker pool could not be built.
    #[error("failed to build the frame worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// The loop thread could not be spawned.
    #[error("failed to spawn the frame loop thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A frame run on the calling thread failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}
