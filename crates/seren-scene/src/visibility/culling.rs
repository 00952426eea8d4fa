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

use super::{FilterEnvironment, FilterStage, StageOutcome};
use crate::object::{ObjectKey, SceneObject};
use slotmap::{SecondaryMap, SlotMap};
use std::sync::Arc;

/// Cached visibility of one object in one view.
#[derive(Debug, Clone, Default)]
pub(crate) struct VisibilityRecord {
    pub visible: bool,
    checked: bool,
    transform_version: u64,
    chain_version: u64,
    pub stages: Vec<StageOutcome>,
}

/// Counters of one culling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CullingReport {
    /// Objects whose filter chain was walked.
    pub evaluated: usize,
    /// Static objects skipped because nothing they depend on changed.
    pub skipped: usize,
    /// Objects that turned invisible this pass.
    pub hidden: usize,
}

/// Visibility records of one (layer, view) pair.
#[derive(Debug, Default)]
pub(crate) struct CullingState {
    records: SecondaryMap<ObjectKey, VisibilityRecord>,
    pending_unsubscribes: Vec<ObjectKey>,
}

impl CullingState {
    /// Objects never culled count as visible.
    pub fn is_visible(&self, key: ObjectKey) -> bool {
        self.records.get(key).map_or(true, |r| r.visible)
    }

    pub fn record(&self, key: ObjectKey) -> Option<&VisibilityRecord> {
        self.records.get(key)
    }

    pub fn forget(&mut self, key: ObjectKey) {
        self.records.remove(key);
    }

    pub fn take_pending_unsubscribes(&mut self) -> Vec<ObjectKey> {
        std::mem::take(&mut self.pending_unsubscribes)
    }

    /// Re-evaluates the filter chain for the spatial objects of a layer.
    ///
    /// A stage runs again for an object when it never ran for it, when its
    /// change flag is latched, when an earlier stage just ran again, or when it
    /// updates every frame. After the first rejecting stage the remaining
    /// stages are recorded as not executed. Static objects that did not move
    /// are skipped unless a stage changed.
    pub fn cull(
        &mut self,
        objects: &SlotMap<ObjectKey, SceneObject>,
        spatial: &[ObjectKey],
        non_spatial: &[ObjectKey],
        stages: &[Arc<FilterStage>],
        chain_version: u64,
        env: &FilterEnvironment<'_>,
    ) -> CullingReport {
        let mut report = CullingReport::default();
        let any_stage_changed = stages.iter().any(|s| s.is_changed());

        for &key in non_spatial {
            if objects.get(key).is_some_and(SceneObject::is_valid) {
                let record = self.record_mut(key);
                record.visible = true;
                record.checked = true;
            }
        }

        for &key in spatial {
            let Some(object) = objects.get(key).filter(|o| o.is_valid()) else {
                continue;
            };
            let record = self.record_mut(key);

            let chain_rebuilt = record.chain_version != chain_version;
            if chain_rebuilt || record.stages.len() != stages.len() {
                record.stages = vec![StageOutcome::default(); stages.len()];
            }

            let unchanged = record.checked
                && !chain_rebuilt
                && record.transform_version == object.transform_version();
            if object.is_static() && unchanged && !any_stage_changed {
                report.skipped += 1;
                continue;
            }

            let was_visible = !record.checked || record.visible;
            let mut visible = true;
            let mut earlier_ran = false;
            for (stage, outcome) in stages.iter().zip(record.stages.iter_mut()) {
                if !visible {
                    *outcome = StageOutcome::default();
                    continue;
                }
                let must_run = !outcome.executed
                    || stage.is_changed()
                    || earlier_ran
                    || stage.filter().update_every_frame();
                if must_run {
                    outcome.passed = stage.filter().is_visible(object, env);
                    outcome.executed = true;
                }
                earlier_ran = must_run;
                visible = outcome.passed;
            }

            record.visible = visible;
            record.checked = true;
            record.transform_version = object.transform_version();
            record.chain_version = chain_version;
            report.evaluated += 1;

            if was_visible && !visible {
                report.hidden += 1;
                self.pending_unsubscribes.push(key);
            }
        }
        report
    }

    fn record_mut(&mut self, key: ObjectKey) -> &mut VisibilityRecord {
        if !self.records.contains_key(key) {
            self.records.insert(key, VisibilityRecord::default());
        }
        &mut self.records[key]
    }
}
