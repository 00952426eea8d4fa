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

//! Error types of the scene graph and the subscription engine.

use seren_core::renderer::RenderPassKind;
use thiserror::Error;

/// A bookkeeping error of the render-pass subscription engine.
///
/// Both variants indicate a programming error, never a transient condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubscriptionError {
    /// A subscription was attempted while the pass lists are being iterated.
    #[error("subscribing to the {pass} pass is not allowed while the engine is {phase}")]
    SubscribeDisallowed {
        /// The pass the subscription targeted.
        pass: RenderPassKind,
        /// What the engine was doing.
        phase: &'static str,
    },
    /// Compaction removed a different number of entries than were unsubscribed.
    #[error(
        "compaction of the {pass} pass removed {removed} entries but {expected} were unsubscribed"
    )]
    CompactionMismatch {
        /// The pass that was compacted.
        pass: RenderPassKind,
        /// Entries actually dropped by compaction.
        removed: usize,
        /// Unsubscribe calls counted since the previous compaction.
        expected: usize,
    },
}

/// An error raised by scene graph operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// The named layer does not exist.
    #[error("layer '{0}' does not exist")]
    LayerNotFound(String),
    /// A layer with this name already exists.
    #[error("layer '{0}' already exists")]
    LayerExists(String),
    /// The default layer is mandatory.
    #[error("the default layer cannot be removed")]
    DefaultLayerRemoval,
    /// Structural changes are rejected while the layer iterates its objects.
    #[error("layer '{0}' is updating; structural changes must go through the before-update queue")]
    LayerUpdating(String),
    /// The object handle is stale or belongs to another scene.
    #[error("object {0} does not exist in this scene")]
    ObjectNotFound(String),
    /// A reparenting would break the tree (cycle, cross-layer parent).
    #[error("invalid parent: {0}")]
    InvalidParent(String),
    /// The view is already registered on this scene.
    #[error("view '{0}' is already registered on this scene")]
    ViewAlreadyRegistered(String),
    /// The view is not registered on this scene.
    #[error("view '{0}' is not registered on this scene")]
    ViewNotRegistered(String),
    /// The camera is attached to another view.
    #[error("camera '{0}' is already attached to another view")]
    CameraInUse(String),
    /// A subscription engine invariant was violated.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// The device rejected a call made while rendering the scene.
    #[error("device error: {0}")]
    Device(String),
    /// One or more failures during [`Scene::update`](crate::Scene::update).
    #[error("update of scene '{scene}' failed: {}", errors.join("; "))]
    UpdateFailed {
        /// Name of the scene.
        scene: String,
        /// Every failure collected during the update.
        errors: Vec<String>,
        /// True if at least one failure is a consistency violation.
        consistency: bool,
    },
    /// A deferred action or manipulation reported an error.
    #[error("{0}")]
    Action(String),
    /// A polling action gave up.
    #[error("polling condition not met within {0} frames")]
    PollTimeout(u32),
}

impl SceneError {
    /// Returns true for errors that reveal broken internal bookkeeping.
    pub fn is_consistency_violation(&self) -> bool {
        match self {
            SceneError::Subscription(_) | SceneError::ViewAlreadyRegistered(_) => true,
            SceneError::UpdateFailed { consistency, .. } => *consistency,
            _ => false,
        }
    }
}

impl From<anyhow::Error> for SceneError {
    fn from(error: anyhow::Error) -> Self {
        SceneError::Action(format!("{error:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_errors_are_consistency_violations() {
        let err: SceneError = SubscriptionError::CompactionMismatch {
            pass: RenderPassKind::Plain,
            removed: 1,
            expected: 2,
        }
        .into();
        assert!(err.is_consistency_violation());
        assert!(!SceneError::LayerNotFound("x".into()).is_consistency_violation());
    }

    #[test]
    fn anyhow_errors_become_action_errors() {
        let err: SceneError = anyhow::anyhow!("mesh missing").into();
        assert_eq!(err, SceneError::Action("mesh missing".into()));
    }
}
