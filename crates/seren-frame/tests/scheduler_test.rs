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

//! Integration tests for the frame loop: scene update fan-out, view
//! registration, failure isolation, suspension and frame synchronization.

mod common;

use common::{counted_scene, test_context, Counted, MockDevice, MockHost, TIMEOUT};
use seren_core::{EngineConfig, EngineContext, EngineFault};
use seren_frame::{FrameError, FrameScheduler, SchedulerError, ViewPipeline};
use seren_scene::{ObjectDesc, Scene, SceneComponent, SceneUpdateContext};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const DT: Duration = Duration::from_millis(16);

fn view_on(
    context: &Arc<EngineContext>,
    name: &str,
    device: &Arc<MockDevice>,
    scene: &Arc<Scene>,
) -> (Arc<ViewPipeline>, Arc<MockHost>) {
    let host = MockHost::new();
    let view = ViewPipeline::new(context, name, host.clone());
    view.set_device(Some(device.clone()));
    view.set_scene(Some(Arc::clone(scene)));
    (view, host)
}

/// Adds a counted object to a fresh "level" layer and returns its draw counter.
fn populate(scene: &Scene) -> Arc<AtomicUsize> {
    let draws = Arc::new(AtomicUsize::new(0));
    let behavior = Counted::new(&draws);
    scene.enqueue_before_update(move |m| {
        m.add_layer("level")?;
        m.add_object(ObjectDesc::new("crate").in_layer("level").with_behavior(behavior))?;
        Ok(())
    });
    draws
}

fn collect_faults(context: &EngineContext) -> Arc<Mutex<Vec<EngineFault>>> {
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&faults);
    context
        .faults()
        .subscribe(move |f: &EngineFault| sink.lock().unwrap().push(f.clone()));
    faults
}

/// Fails every update while its flag is set.
struct Faulty(Arc<AtomicBool>);

impl SceneComponent for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }
    fn update(&mut self, _: &mut SceneUpdateContext) -> anyhow::Result<()> {
        if self.0.load(Ordering::SeqCst) {
            anyhow::bail!("simulation diverged");
        }
        Ok(())
    }
}

/// Panics on every update while its flag is set.
struct Tripwire(Arc<AtomicBool>);

impl SceneComponent for Tripwire {
    fn name(&self) -> &str {
        "tripwire"
    }
    fn update(&mut self, _: &mut SceneUpdateContext) -> anyhow::Result<()> {
        if self.0.load(Ordering::SeqCst) {
            panic!("tripwire hit");
        }
        Ok(())
    }
}

/// Attaches `component` to `scene` at its next update.
fn attach(scene: &Scene, component: impl SceneComponent + 'static) {
    scene.enqueue_before_update(move |m| {
        m.add_component(component);
        Ok(())
    });
}

fn has_frame_failure(faults: &Mutex<Vec<EngineFault>>) -> bool {
    faults
        .lock()
        .unwrap()
        .iter()
        .any(|f| matches!(f, EngineFault::FrameFailed { .. }))
}

fn wait_frames(scheduler: &FrameScheduler, frames: usize) {
    for _ in 0..frames {
        assert_eq!(
            scheduler.wait_for_next_frame().wait_timeout(TIMEOUT),
            Some(()),
            "the loop did not complete a frame in time"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scene updates
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_each_scene_updates_once_per_frame() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let (shared, shared_updates) = counted_scene(&context, "shared");
    let (solo, solo_updates) = counted_scene(&context, "solo");
    let first = MockDevice::new(0);
    let second = MockDevice::new(1);

    for (name, device) in [("a", &first), ("b", &first), ("c", &second)] {
        let (view, _) = view_on(&context, name, device, &shared);
        scheduler.register_view(view).unwrap();
    }
    let (view, _) = view_on(&context, "d", &second, &solo);
    scheduler.register_view(view).unwrap();

    // Views join their scene at the end of the first prepare phase, and the
    // counters attach during the first update.
    for _ in 0..4 {
        scheduler.run_frame(DT).unwrap();
    }

    assert_eq!(shared.update_count(), 3, "three views, one update per frame");
    assert_eq!(solo.update_count(), 3);
    assert_eq!(shared_updates.load(Ordering::SeqCst), 2);
    assert_eq!(solo_updates.load(Ordering::SeqCst), 2);

    let stats = scheduler.frame_stats();
    assert_eq!(stats.frames, 4);
    assert_eq!(stats.scenes_updated, 2);
    assert_eq!(stats.views_rendered, 4);
    assert_eq!(first.flushes(), 8);
}

#[test]
fn test_scene_without_views_is_not_updated() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let (scene, updates) = counted_scene(&context, "idle");

    scheduler.run_frame(DT).unwrap();
    assert_eq!(scene.update_count(), 0);
    assert_eq!(updates.load(Ordering::SeqCst), 0);
    assert_eq!(scene.pending_before_update(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_double_registration_is_rejected() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let view = ViewPipeline::new(&context, "main", MockHost::new());

    scheduler.register_view(Arc::clone(&view)).unwrap();
    assert!(matches!(
        scheduler.register_view(Arc::clone(&view)),
        Err(SchedulerError::ViewAlreadyRegistered(name)) if name == "main"
    ));

    assert!(scheduler.deregister_view(&view));
    scheduler.register_view(Arc::clone(&view)).unwrap();
    scheduler.run_frame(DT).unwrap();
    assert!(scheduler.is_registered(&view), "re-registering cancels the removal");
    assert_eq!(scheduler.registered_views().len(), 1);
}

#[test]
fn test_deregistering_an_unknown_view_returns_false() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let view = ViewPipeline::new(&context, "stray", MockHost::new());
    assert!(!scheduler.deregister_view(&view));
}

#[test]
fn test_scene_survives_until_its_last_view_leaves() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "level");
    let draws = populate(&scene);
    let device = MockDevice::new(0);
    let (left, _) = view_on(&context, "left", &device, &scene);
    let (right, _) = view_on(&context, "right", &device, &scene);
    scheduler.register_view(Arc::clone(&left)).unwrap();
    scheduler.register_view(Arc::clone(&right)).unwrap();

    scheduler.start().unwrap();
    wait_frames(&scheduler, 3);
    assert_eq!(scene.registered_view_count(), 2);

    assert!(scheduler.deregister_view(&left));
    wait_frames(&scheduler, 2);
    assert!(!scheduler.is_registered(&left));
    assert_eq!(scene.registered_view_count(), 1);
    assert_eq!(scene.layer_len("level"), Some(1), "one view still displays the scene");

    let before = (right.rendered_frames(), draws.load(Ordering::SeqCst));
    wait_frames(&scheduler, 2);
    assert!(right.rendered_frames() > before.0, "the remaining view keeps rendering");
    assert!(draws.load(Ordering::SeqCst) > before.1);

    assert!(scheduler.deregister_view(&right));
    wait_frames(&scheduler, 2);
    scheduler.stop();

    assert_eq!(scene.registered_view_count(), 0);
    assert_eq!(scene.layer_len("level"), Some(0), "the scene was unloaded");
}

#[test]
fn test_pinned_scene_is_not_unloaded() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "pinned");
    scene.set_auto_unload(false);
    populate(&scene);
    let (view, _) = view_on(&context, "main", &MockDevice::new(0), &scene);
    scheduler.register_view(Arc::clone(&view)).unwrap();

    scheduler.run_frame(DT).unwrap();
    scheduler.run_frame(DT).unwrap();
    assert_eq!(scene.layer_len("level"), Some(1));

    scheduler.deregister_view(&view);
    scheduler.run_frame(DT).unwrap();
    assert_eq!(scene.registered_view_count(), 0);
    assert_eq!(scene.layer_len("level"), Some(1));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure isolation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_prepare_failure_drops_only_that_view() {
    let context = test_context();
    let faults = collect_faults(&context);
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "world");
    let device = MockDevice::new(0);
    let (broken, broken_host) = view_on(&context, "broken", &device, &scene);
    let (healthy, _) = view_on(&context, "healthy", &device, &scene);
    broken_host.fail_check.store(true, Ordering::SeqCst);
    scheduler.register_view(Arc::clone(&broken)).unwrap();
    scheduler.register_view(Arc::clone(&healthy)).unwrap();

    scheduler.run_frame(DT).unwrap();
    scheduler.run_frame(DT).unwrap();

    assert!(!scheduler.is_registered(&broken));
    assert!(scheduler.is_registered(&healthy));
    assert_eq!(healthy.rendered_frames(), 2);
    assert_eq!(scene.registered_view_count(), 1);
    assert!(faults
        .lock()
        .unwrap()
        .iter()
        .any(|f| matches!(f, EngineFault::ViewDeregistered { view, .. } if view == "broken")));
}

#[test]
fn test_panicking_view_is_dropped_alone() {
    let context = test_context();
    let faults = collect_faults(&context);
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "world");
    let device = MockDevice::new(0);
    let (crashing, crashing_host) = view_on(&context, "crashing", &device, &scene);
    let (healthy, _) = view_on(&context, "healthy", &device, &scene);
    crashing_host.panic_check.store(true, Ordering::SeqCst);
    scheduler.register_view(Arc::clone(&crashing)).unwrap();
    scheduler.register_view(Arc::clone(&healthy)).unwrap();

    scheduler.run_frame(DT).unwrap();
    scheduler.run_frame(DT).unwrap();

    assert!(!scheduler.is_registered(&crashing));
    assert!(scheduler.is_registered(&healthy));
    assert_eq!(healthy.rendered_frames(), 2, "the device task carried on");
    assert!(faults.lock().unwrap().iter().any(|f| matches!(
        f,
        EngineFault::ViewDeregistered { view, error }
            if view == "crashing" && error.contains("host crashed")
    )));
}

#[test]
fn test_render_failure_drops_the_view_and_unloads_its_scene() {
    let context = test_context();
    let faults = collect_faults(&context);
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "world");
    populate(&scene);
    let device = MockDevice::new(0);
    let (view, _) = view_on(&context, "main", &device, &scene);
    scheduler.register_view(Arc::clone(&view)).unwrap();

    scheduler.run_frame(DT).unwrap();
    scheduler.run_frame(DT).unwrap();
    assert_eq!(scene.layer_len("level"), Some(1));

    device.fail_clear.store(true, Ordering::SeqCst);
    scheduler.run_frame(DT).unwrap();

    assert!(scheduler.registered_views().is_empty());
    assert_eq!(scene.layer_len("level"), Some(0));
    assert_eq!(scheduler.frame_stats().views_rendered, 0);
    assert_eq!(faults.lock().unwrap().len(), 1);
}

#[test]
fn test_failing_draw_callback_does_not_stop_the_view() {
    let context = test_context();
    let faults = collect_faults(&context);
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "world");
    let good = Arc::new(AtomicUsize::new(0));
    let bad = Counted::new(&Arc::new(AtomicUsize::new(0)));
    bad.failing.store(true, Ordering::SeqCst);
    let healthy = Counted::new(&good);
    scene.enqueue_before_update(move |m| {
        m.add_object(ObjectDesc::new("bad").with_behavior(bad))?;
        m.add_object(ObjectDesc::new("good").with_behavior(healthy))?;
        Ok(())
    });
    let (view, _) = view_on(&context, "main", &MockDevice::new(0), &scene);
    scheduler.register_view(Arc::clone(&view)).unwrap();

    for _ in 0..4 {
        scheduler.run_frame(DT).unwrap();
    }

    assert!(scheduler.is_registered(&view));
    assert_eq!(good.load(Ordering::SeqCst), 3);
    assert!(faults
        .lock()
        .unwrap()
        .iter()
        .any(|f| matches!(f, EngineFault::ObjectQuarantined { .. })));
}

#[test]
fn test_scene_update_error_fails_the_frame() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "world");
    let failing = Arc::new(AtomicBool::new(true));
    attach(&scene, Faulty(Arc::clone(&failing)));
    let (view, _) = view_on(&context, "main", &MockDevice::new(0), &scene);
    scheduler.register_view(Arc::clone(&view)).unwrap();

    // The view joins the scene in the first frame, the component attaches in
    // the second and fails from the third on.
    scheduler.run_frame(DT).unwrap();
    scheduler.run_frame(DT).unwrap();
    let error = scheduler.run_frame(DT).unwrap_err();
    assert!(
        matches!(
            &error,
            SchedulerError::Frame(FrameError::SceneUpdate(m)) if m.contains("simulation diverged")
        ),
        "unexpected error: {error}"
    );

    let stats = scheduler.frame_stats();
    assert_eq!(stats.frames, 2, "failed frames are not counted");
    assert_eq!(stats.backoffs, 1);
    assert!(matches!(stats.last_error, Some(FrameError::SceneUpdate(_))));
    assert!(scheduler.is_registered(&view), "scene errors do not drop views");
    assert_eq!(view.rendered_frames(), 3, "the failed frame still rendered");

    failing.store(false, Ordering::SeqCst);
    scheduler.run_frame(DT).unwrap();
    assert_eq!(scheduler.frame_stats().frames, 3);
}

#[test]
fn test_scene_panic_keeps_the_other_views_continuations() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let device = MockDevice::new(0);
    let armed = Arc::new(AtomicBool::new(false));
    let unstable = Scene::new(Arc::clone(&context), "unstable");
    attach(&unstable, Tripwire(Arc::clone(&armed)));
    let (resident, _) = view_on(&context, "resident", &device, &unstable);
    scheduler.register_view(Arc::clone(&resident)).unwrap();
    scheduler.run_frame(DT).unwrap();
    scheduler.run_frame(DT).unwrap();

    let fresh = Scene::new(Arc::clone(&context), "fresh");
    let (newcomer, _) = view_on(&context, "newcomer", &device, &fresh);
    scheduler.register_view(Arc::clone(&newcomer)).unwrap();
    armed.store(true, Ordering::SeqCst);

    let error = scheduler.run_frame(DT).unwrap_err();
    assert!(
        matches!(
            &error,
            SchedulerError::Frame(FrameError::Panicked(m)) if m.contains("tripwire hit")
        ),
        "unexpected error: {error}"
    );
    assert_eq!(
        fresh.registered_view_count(),
        1,
        "the newcomer joined its scene despite the panic"
    );
    assert!(scheduler.is_registered(&resident));
    assert!(scheduler.is_registered(&newcomer));

    armed.store(false, Ordering::SeqCst);
    scheduler.run_frame(DT).unwrap();
    assert_eq!(newcomer.registered_scene().map(|s| s.id()), Some(fresh.id()));
    assert_eq!(newcomer.rendered_frames(), 2);
    assert_eq!(scheduler.frame_stats().scenes_updated, 2);
}

#[test]
fn test_failed_frames_back_off_and_requeue_waiters() {
    let context = test_context();
    let faults = collect_faults(&context);
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let scene = Scene::new(Arc::clone(&context), "world");
    let failing = Arc::new(AtomicBool::new(true));
    attach(&scene, Faulty(Arc::clone(&failing)));
    let (view, _) = view_on(&context, "main", &MockDevice::new(0), &scene);
    scheduler.register_view(view).unwrap();
    scheduler.start().unwrap();

    let deadline = Instant::now() + TIMEOUT;
    while !has_frame_failure(&faults) {
        assert!(Instant::now() < deadline, "no frame failure was reported");
        thread::sleep(Duration::from_millis(5));
    }
    let stats = scheduler.frame_stats();
    assert!(stats.backoffs >= 1);
    assert!(matches!(stats.last_error, Some(FrameError::SceneUpdate(_))));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let waiter = scheduler.wait_for_next_frame();
    scheduler.run_after_next_frame(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(
        waiter.wait_timeout(Duration::from_millis(100)),
        None,
        "failed frames do not release waiters"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(scheduler.frame_stats().backoffs >= 2);

    failing.store(false, Ordering::SeqCst);
    assert_eq!(waiter.wait_timeout(TIMEOUT), Some(()));
    wait_frames(&scheduler, 1);
    scheduler.stop();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "the callback ran exactly once");
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame synchronization
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_waiters_and_callbacks_fire_after_one_frame() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let waiter = scheduler.wait_for_next_frame();
    let counter = Arc::clone(&calls);
    scheduler.run_after_next_frame(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(!waiter.is_completed());

    scheduler.run_frame(DT).unwrap();
    assert!(waiter.is_completed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    scheduler.run_frame(DT).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "callbacks run once");
}

#[test]
fn test_run_frame_is_refused_while_the_loop_runs() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    scheduler.start().unwrap();
    assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));
    assert!(matches!(
        scheduler.run_frame(DT),
        Err(SchedulerError::AlreadyRunning)
    ));

    scheduler.stop();
    assert!(!scheduler.is_running());
    scheduler.run_frame(DT).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_frame_completion_can_be_awaited() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    scheduler.start().unwrap();

    let frame = scheduler.wait_for_next_frame();
    tokio::time::timeout(TIMEOUT, frame)
        .await
        .expect("the loop did not complete a frame in time");
    assert!(scheduler.frame_stats().frames >= 1);
    scheduler.stop();
}

#[test]
fn test_unpaced_loop_sleeps_between_frames() {
    let context = EngineContext::new(EngineConfig::default());
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    assert!(context.config().scheduler.min_frame_interval.is_zero());
    let granularity = context.config().scheduler.min_sleep_granularity;

    let started = Instant::now();
    scheduler.start().unwrap();
    thread::sleep(Duration::from_millis(200));
    scheduler.stop();
    let elapsed = started.elapsed();

    let frames = scheduler.frame_stats().frames;
    let bound = (elapsed.as_micros() / granularity.as_micros()) as u64 + 1;
    assert!(frames > 0, "the loop never ran");
    assert!(
        frames <= bound,
        "{frames} frames in {elapsed:?}: the loop does not sleep between frames"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Suspension
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_suspend_parks_the_loop_until_resumed() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    scheduler.start().unwrap();
    wait_frames(&scheduler, 1);

    let first = scheduler.suspend();
    let second = scheduler.suspend();
    assert_eq!(first.wait_timeout(TIMEOUT), Some(()));
    assert!(second.is_completed(), "concurrent requests share one suspension");
    assert!(scheduler.is_suspended());
    assert!(scheduler.suspend().is_completed(), "already parked");

    let frames = scheduler.frame_stats().frames;
    let waiter = scheduler.wait_for_next_frame();
    assert_eq!(waiter.wait_timeout(Duration::from_millis(50)), None);
    assert_eq!(scheduler.frame_stats().frames, frames);

    assert!(scheduler.resume());
    assert_eq!(waiter.wait_timeout(TIMEOUT), Some(()));
    assert!(!scheduler.is_suspended());
    assert!(!scheduler.resume(), "nothing left to resume");
    scheduler.stop();
}

#[test]
fn test_stop_releases_a_suspended_loop() {
    let context = test_context();
    let scheduler = FrameScheduler::new(Arc::clone(&context)).unwrap();
    scheduler.start().unwrap();
    assert_eq!(scheduler.suspend().wait_timeout(TIMEOUT), Some(()));

    scheduler.stop();
    assert!(!scheduler.is_running());
    assert!(!scheduler.is_suspended());
}
