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

//! Core engine context providing access to the devices and engine-wide services.
//!
//! The context is created once by the application and handed to the frame
//! scheduler, every view pipeline and every scene. There is no global instance.

use crate::config::EngineConfig;
use crate::event::Observers;
use crate::renderer::{DeviceIndex, DeviceResource, GraphicsDevice};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// A failure reported to the engine-wide fault observers.
///
/// Faults are informational: by the time listeners see one, the engine has
/// already isolated the failing object, view or frame.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineFault {
    /// A scene object failed (render callback, resource load) and was quarantined.
    ObjectQuarantined {
        /// Name of the scene owning the object.
        scene: String,
        /// Debug description of the object handle.
        object: String,
        /// What went wrong.
        error: String,
    },
    /// A device resource failed to load and was dropped from its partition.
    ResourceLoadFailed {
        /// Name of the scene owning the resource.
        scene: String,
        /// Name of the resource.
        resource: String,
        /// The device the load was attempted on.
        device: DeviceIndex,
        /// What went wrong.
        error: String,
    },
    /// A view failed to prepare, render or present and was deregistered.
    ViewDeregistered {
        /// Name of the view.
        view: String,
        /// What went wrong.
        error: String,
    },
    /// A whole frame failed; the loop backs off before the next iteration.
    FrameFailed {
        /// What went wrong.
        error: String,
    },
    /// Internal bookkeeping was found inconsistent. Indicates a bug.
    ConsistencyViolation {
        /// What was inconsistent.
        error: String,
    },
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineFault::ObjectQuarantined {
                scene,
                object,
                error,
            } => write!(f, "object {object} in scene '{scene}' quarantined: {error}"),
            EngineFault::ResourceLoadFailed {
                scene,
                resource,
                device,
                error,
            } => write!(
                f,
                "resource '{resource}' of scene '{scene}' failed to load on {device}: {error}"
            ),
            EngineFault::ViewDeregistered { view, error } => {
                write!(f, "view '{view}' deregistered: {error}")
            }
            EngineFault::FrameFailed { error } => write!(f, "frame failed: {error}"),
            EngineFault::ConsistencyViolation { error } => {
                write!(f, "consistency violation: {error}")
            }
        }
    }
}

/// Engine context providing access to the devices and engine-wide services.
pub struct EngineContext {
    config: EngineConfig,
    devices: RwLock<Vec<Arc<dyn GraphicsDevice>>>,
    faults: Observers<EngineFault>,
    pending_unloads: Mutex<HashMap<DeviceIndex, Vec<Box<dyn DeviceResource>>>>,
}

impl EngineContext {
    /// Creates the context. Devices are registered afterwards.
    pub fn new(config: EngineConfig) -> Arc<Self> {
        log::info!("Engine context initialized.");
        Arc::new(Self {
            config,
            devices: RwLock::new(Vec::new()),
            faults: Observers::new(),
            pending_unloads: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the configuration the context was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a device. Its [`GraphicsDevice::index`] must be unique.
    ///
    /// Returns `false` if a device with the same index is already registered.
    pub fn register_device(&self, device: Arc<dyn GraphicsDevice>) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if devices.iter().any(|d| d.index() == device.index()) {
            log::warn!("{} is already registered.", device.index());
            return false;
        }
        log::info!("Registered {} ({}).", device.index(), device.name());
        devices.push(device);
        devices.sort_by_key(|d| d.index());
        true
    }

    /// Returns every registered device, ordered by index.
    pub fn devices(&self) -> Vec<Arc<dyn GraphicsDevice>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the device with the given index.
    pub fn device(&self, index: DeviceIndex) -> Option<Arc<dyn GraphicsDevice>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.index() == index)
            .cloned()
    }

    /// The engine-wide fault observers.
    pub fn faults(&self) -> &Observers<EngineFault> {
        &self.faults
    }

    /// Logs a fault and notifies the fault observers.
    pub fn report_fault(&self, fault: EngineFault) {
        match &fault {
            EngineFault::ConsistencyViolation { .. } | EngineFault::FrameFailed { .. } => {
                log::error!("{fault}")
            }
            _ => log::warn!("{fault}"),
        }
        self.faults.notify(&fault);
    }

    /// Queues a resource for release on `device` at the end of the current frame.
    pub fn queue_device_unload(&self, device: DeviceIndex, resource: Box<dyn DeviceResource>) {
        self.pending_unloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device)
            .or_default()
            .push(resource);
    }

    /// Returns the number of resources waiting for a device-level unload.
    pub fn pending_device_unloads(&self) -> usize {
        self.pending_unloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Unloads every queued resource on its device. Returns how many were released.
    ///
    /// Resources queued for a device that is no longer registered are dropped.
    pub fn drain_device_unloads(&self) -> usize {
        let pending = std::mem::take(
            &mut *self
                .pending_unloads
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut released = 0;
        for (index, resources) in pending {
            let Some(device) = self.device(index) else {
                log::warn!(
                    "Dropping {} queued resources: {index} is gone.",
                    resources.len()
                );
                continue;
            };
            for mut resource in resources {
                if resource.is_loaded() {
                    resource.unload(device.as_ref());
                }
                released += 1;
            }
        }
        released
    }

    /// Releases queued resources and forgets every device.
    pub fn shutdown(&self) {
        let released = self.drain_device_unloads();
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::info!("Engine context shut down ({released} resources released).");
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("devices", &self.devices().len())
            .field("faults", &self.faults)
            .finish()
    }
}
