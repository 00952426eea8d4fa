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

use super::{RenderCallback, RenderContext, SubscriptionKey};
use crate::error::SubscriptionError;
use crate::object::ObjectKey;
use crate::view::ViewBinding;
use seren_core::renderer::{DeviceError, GraphicsDevice, PassState, RenderPassKind};
use slotmap::SlotMap;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Compacting,
    Rendering,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Compacting => "compacting",
            Phase::Rendering => "rendering",
        }
    }
}

struct Subscription {
    owner: ObjectKey,
    pass: RenderPassKind,
    callback: RenderCallback,
    z_order: i32,
    index: usize,
    subscribed: bool,
}

#[derive(Default)]
struct PassList {
    entries: Vec<SubscriptionKey>,
    unsubscribed: usize,
}

/// A read-only view of one subscription record.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    /// Handle of the record.
    pub key: SubscriptionKey,
    /// The subscribing object.
    pub owner: ObjectKey,
    /// The pass the record belongs to.
    pub pass: RenderPassKind,
    /// Secondary ordering key for sorted passes.
    pub z_order: i32,
    /// Position of the record in its pass list.
    pub index: usize,
    /// False once unsubscribed; the record is dropped at the next compaction.
    pub subscribed: bool,
}

/// What one render of a pass set produced.
#[derive(Debug, Default)]
pub(crate) struct RenderOutcome {
    pub rendered: usize,
    pub failures: Vec<(ObjectKey, RenderPassKind, String)>,
}

/// The render-pass lists of one (layer, view) pair.
///
/// Unsubscribing only flags a record; the lists are rewritten in one go by
/// [`PassSet::compact`], which also renumbers the cached positions. Between two
/// compactions every list may hold flagged records, which rendering skips.
pub struct PassSet {
    arena: SlotMap<SubscriptionKey, Subscription>,
    lists: [PassList; RenderPassKind::ALL.len()],
    phase: Phase,
    quarantined: Vec<ObjectKey>,
}

impl PassSet {
    /// Creates empty lists for every pass.
    pub fn new() -> Self {
        Self {
            arena: SlotMap::with_key(),
            lists: Default::default(),
            phase: Phase::Idle,
            quarantined: Vec::new(),
        }
    }

    /// Subscribes `owner` to `pass`.
    ///
    /// Sorted passes insert after every record with a lower or equal `z_order`
    /// and renumber the records behind the insertion point; other passes
    /// append.
    pub fn subscribe(
        &mut self,
        owner: ObjectKey,
        pass: RenderPassKind,
        z_order: i32,
        callback: RenderCallback,
    ) -> Result<SubscriptionKey, SubscriptionError> {
        if self.phase != Phase::Idle {
            return Err(SubscriptionError::SubscribeDisallowed {
                pass,
                phase: self.phase.as_str(),
            });
        }

        let list = &mut self.lists[pass.index()];
        let position = if pass.is_sorted() {
            let arena = &self.arena;
            list.entries
                .partition_point(|k| arena.get(*k).is_some_and(|s| s.z_order <= z_order))
        } else {
            list.entries.len()
        };

        let key = self.arena.insert(Subscription {
            owner,
            pass,
            callback,
            z_order,
            index: position,
            subscribed: true,
        });
        list.entries.insert(position, key);
        for (index, key) in list.entries.iter().enumerate().skip(position + 1) {
            if let Some(record) = self.arena.get_mut(*key) {
                record.index = index;
            }
        }
        Ok(key)
    }

    /// Flags the record as unsubscribed.
    ///
    /// Returns `false` for stale handles and records that were already flagged.
    pub fn unsubscribe(&mut self, key: SubscriptionKey) -> bool {
        let Some(record) = self.arena.get_mut(key) else {
            return false;
        };
        if !record.subscribed {
            return false;
        }
        record.subscribed = false;
        self.lists[record.pass.index()].unsubscribed += 1;
        true
    }

    /// Returns true if `key` names a live subscription.
    pub fn is_subscribed(&self, key: SubscriptionKey) -> bool {
        self.arena.get(key).is_some_and(|s| s.subscribed)
    }

    /// Describes the record behind `key`, if it still exists.
    pub fn subscription(&self, key: SubscriptionKey) -> Option<SubscriptionInfo> {
        self.arena.get(key).map(|s| Self::info(key, s))
    }

    /// Every record of `pass`, in list order, flagged ones included.
    pub fn entries(&self, pass: RenderPassKind) -> Vec<SubscriptionInfo> {
        self.lists[pass.index()]
            .entries
            .iter()
            .filter_map(|k| self.subscription(*k))
            .collect()
    }

    /// Number of records in the list of `pass`, flagged ones included.
    pub fn len(&self, pass: RenderPassKind) -> usize {
        self.lists[pass.index()].entries.len()
    }

    /// Returns true if no pass holds any record.
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|l| l.entries.is_empty())
    }

    /// Number of live subscriptions to `pass`.
    pub fn subscribed_count(&self, pass: RenderPassKind) -> usize {
        let list = &self.lists[pass.index()];
        list.entries.len() - list.unsubscribed
    }

    /// Unsubscribe calls counted on `pass` since its last compaction.
    pub fn pending_unsubscribes(&self, pass: RenderPassKind) -> usize {
        self.lists[pass.index()].unsubscribed
    }

    /// Drops every flagged record and renumbers the survivors.
    ///
    /// Returns the number of dropped records. Fails if a list dropped a
    /// different number of records than unsubscribe calls were counted for it.
    pub fn compact(&mut self) -> Result<usize, SubscriptionError> {
        self.phase = Phase::Compacting;
        let result = self.compact_lists();
        self.phase = Phase::Idle;
        result
    }

    fn compact_lists(&mut self) -> Result<usize, SubscriptionError> {
        let mut total = 0;
        for pass in RenderPassKind::ALL {
            let list = &mut self.lists[pass.index()];
            if list.unsubscribed == 0 {
                continue;
            }

            let before = list.entries.len();
            let arena = &mut self.arena;
            list.entries.retain(|key| {
                let live = arena.get(*key).is_some_and(|s| s.subscribed);
                if !live {
                    arena.remove(*key);
                }
                live
            });
            let removed = before - list.entries.len();
            let expected = std::mem::take(&mut list.unsubscribed);

            for (index, key) in list.entries.iter().enumerate() {
                if let Some(record) = arena.get_mut(*key) {
                    record.index = index;
                }
            }

            if removed != expected {
                return Err(SubscriptionError::CompactionMismatch {
                    pass,
                    removed,
                    expected,
                });
            }
            total += removed;
        }
        Ok(total)
    }

    /// Reorders `pass` back-to-front by the distance `distance` reports for
    /// each owner. Equal distances keep their relative order.
    ///
    /// Returns how many records changed position.
    pub fn resort_by_distance(
        &mut self,
        pass: RenderPassKind,
        distance: impl Fn(ObjectKey) -> f32,
    ) -> usize {
        let list = &mut self.lists[pass.index()];
        if list.entries.len() < 2 {
            return 0;
        }

        let mut keyed: Vec<(f32, SubscriptionKey)> = list
            .entries
            .iter()
            .map(|k| {
                let d = self.arena.get(*k).map_or(0.0, |s| distance(s.owner));
                (d, *k)
            })
            .collect();
        keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut moved = 0;
        for (index, (_, key)) in keyed.into_iter().enumerate() {
            list.entries[index] = key;
            if let Some(record) = self.arena.get_mut(key) {
                if record.index != index {
                    record.index = index;
                    moved += 1;
                }
            }
        }
        moved
    }

    /// Runs the callbacks of `passes` in order.
    ///
    /// A failing callback (error or panic) has its record flagged and its owner
    /// queued for quarantine; the remaining callbacks still run. Only a device
    /// error while binding a pass aborts the render.
    pub(crate) fn render(
        &mut self,
        passes: &[RenderPassKind],
        device: &dyn GraphicsDevice,
        view: &ViewBinding,
    ) -> Result<RenderOutcome, DeviceError> {
        self.phase = Phase::Rendering;
        let result = self.render_passes(passes, device, view);
        self.phase = Phase::Idle;
        result
    }

    fn render_passes(
        &mut self,
        passes: &[RenderPassKind],
        device: &dyn GraphicsDevice,
        view: &ViewBinding,
    ) -> Result<RenderOutcome, DeviceError> {
        let mut outcome = RenderOutcome::default();
        for &pass in passes {
            if self.subscribed_count(pass) == 0 {
                continue;
            }
            device.bind_pass_state(PassState::Pass(pass))?;

            for position in 0..self.lists[pass.index()].entries.len() {
                let key = self.lists[pass.index()].entries[position];
                let Some(record) = self.arena.get(key) else {
                    continue;
                };
                if !record.subscribed {
                    continue;
                }

                let owner = record.owner;
                let callback = Arc::clone(&record.callback);
                let mut ctx = RenderContext {
                    device,
                    view,
                    pass,
                    object: owner,
                    z_order: record.z_order,
                };
                let error = match panic::catch_unwind(AssertUnwindSafe(|| callback(&mut ctx))) {
                    Ok(Ok(())) => {
                        outcome.rendered += 1;
                        continue;
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(payload) => panic_message(payload.as_ref()),
                };

                self.unsubscribe(key);
                if !self.quarantined.contains(&owner) {
                    self.quarantined.push(owner);
                }
                outcome.failures.push((owner, pass, error));
            }
        }
        Ok(outcome)
    }

    /// Takes the owners whose callbacks failed since the last call.
    pub(crate) fn take_quarantined(&mut self) -> Vec<ObjectKey> {
        std::mem::take(&mut self.quarantined)
    }

    fn info(key: SubscriptionKey, s: &Subscription) -> SubscriptionInfo {
        SubscriptionInfo {
            key,
            owner: s.owner,
            pass: s.pass,
            z_order: s.z_order,
            index: s.index,
            subscribed: s.subscribed,
        }
    }

    #[cfg(test)]
    pub(crate) fn flag_without_counting(&mut self, key: SubscriptionKey) {
        if let Some(record) = self.arena.get_mut(key) {
            record.subscribed = false;
        }
    }
}

impl Default for PassSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for pass in RenderPassKind::ALL {
            map.entry(&pass, &self.subscribed_count(pass));
        }
        map.finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn owner(n: u64) -> ObjectKey {
        ObjectKey::from(KeyData::from_ffi(n | (1 << 32)))
    }

    fn noop() -> RenderCallback {
        Arc::new(|_: &mut RenderContext<'_>| Ok(()))
    }

    fn assert_indices_match_positions(set: &PassSet, pass: RenderPassKind) {
        for (position, info) in set.entries(pass).iter().enumerate() {
            assert_eq!(info.index, position, "stale index in {pass}");
        }
    }

    #[test]
    fn sorted_insert_places_after_equal_z_orders() {
        let mut set = PassSet::new();
        let pass = RenderPassKind::Overlay2D;
        set.subscribe(owner(1), pass, 5, noop()).unwrap();
        set.subscribe(owner(2), pass, 1, noop()).unwrap();
        set.subscribe(owner(3), pass, 5, noop()).unwrap();
        set.subscribe(owner(4), pass, 3, noop()).unwrap();

        let order: Vec<_> = set.entries(pass).iter().map(|i| i.owner).collect();
        assert_eq!(order, vec![owner(2), owner(4), owner(1), owner(3)]);
        assert_indices_match_positions(&set, pass);
    }

    #[test]
    fn unsorted_passes_append() {
        let mut set = PassSet::new();
        set.subscribe(owner(1), RenderPassKind::Plain, 9, noop()).unwrap();
        set.subscribe(owner(2), RenderPassKind::Plain, 1, noop()).unwrap();

        let order: Vec<_> = set
            .entries(RenderPassKind::Plain)
            .iter()
            .map(|i| i.owner)
            .collect();
        assert_eq!(order, vec![owner(1), owner(2)]);
    }

    #[test]
    fn compaction_leaves_only_live_records_with_fresh_indices() {
        let mut set = PassSet::new();
        let pass = RenderPassKind::Plain;
        let keys: Vec<_> = (0..6)
            .map(|n| set.subscribe(owner(n), pass, 0, noop()).unwrap())
            .collect();

        assert!(set.unsubscribe(keys[1]));
        assert!(set.unsubscribe(keys[4]));
        assert!(!set.unsubscribe(keys[4]), "double unsubscribe is a no-op");
        let late = set.subscribe(owner(9), pass, 0, noop()).unwrap();
        assert!(set.unsubscribe(late));

        assert_eq!(set.len(pass), 7);
        assert_eq!(set.subscribed_count(pass), 4);
        assert_eq!(set.compact(), Ok(3));

        assert_eq!(set.len(pass), 4);
        assert_eq!(set.pending_unsubscribes(pass), 0);
        assert!(set.subscription(keys[1]).is_none());
        assert!(!set.unsubscribe(keys[1]), "stale handles are ignored");
        assert_indices_match_positions(&set, pass);
    }

    #[test]
    fn compaction_without_unsubscribes_is_a_no_op() {
        let mut set = PassSet::new();
        set.subscribe(owner(1), RenderPassKind::Line, 0, noop()).unwrap();
        assert_eq!(set.compact(), Ok(0));
        assert_eq!(set.len(RenderPassKind::Line), 1);
    }

    #[test]
    fn compaction_detects_uncounted_removals() {
        let mut set = PassSet::new();
        let pass = RenderPassKind::Plain;
        let a = set.subscribe(owner(1), pass, 0, noop()).unwrap();
        let b = set.subscribe(owner(2), pass, 0, noop()).unwrap();
        set.unsubscribe(a);
        set.flag_without_counting(b);

        assert_eq!(
            set.compact(),
            Err(SubscriptionError::CompactionMismatch {
                pass,
                removed: 2,
                expected: 1,
            })
        );
        assert_eq!(set.len(pass), 0);
    }

    #[test]
    fn resort_orders_back_to_front_and_keeps_ties_stable() {
        let mut set = PassSet::new();
        let pass = RenderPassKind::Transparent;
        for n in 0..4 {
            set.subscribe(owner(n), pass, 0, noop()).unwrap();
        }
        let distances = [2.0, 8.0, 2.0, 5.0];
        let moved = set.resort_by_distance(pass, |o| {
            let n = (0..4).find(|n| owner(*n) == o).unwrap() as usize;
            distances[n]
        });

        let order: Vec<_> = set.entries(pass).iter().map(|i| i.owner).collect();
        assert_eq!(order, vec![owner(1), owner(3), owner(0), owner(2)]);
        assert_eq!(moved, 4);
        assert_indices_match_positions(&set, pass);
    }
}
