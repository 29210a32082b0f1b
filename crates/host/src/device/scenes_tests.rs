// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use vdcapi::frames::DimMode;

use super::*;
use crate::clock::MonoTime;
use crate::device::{Device, DeviceEffect};
use crate::scene::{
    self, SceneValue, AREA_2_ON, DECREMENT, INCREMENT, MINIMUM, PRESET_1, PRESET_2, ROOM_OFF, STOP,
};
use crate::test_support::{light_device, MockBackend};

fn ms(v: u64) -> MonoTime {
    MonoTime::from_millis(v)
}

fn brightness(device: &Device) -> f64 {
    device.output.as_ref().unwrap().channels()[0].value()
}

fn set_brightness(device: &mut Device, v: f64) {
    let output = device.output.as_mut().unwrap();
    output.channel_by_index_mut(0).unwrap().set_value(v, Duration::ZERO, false);
    output.channel_by_index_mut(0).unwrap().value_applied(false);
}

/// Prepare and execute a scene call against a synchronous backend.
fn call_scene(device: &mut Device, backend: &mut MockBackend, scene_no: u8, force: bool, now: MonoTime) -> (NotifyType, Vec<DeviceEffect>) {
    let mut effects = Vec::new();
    let what = device.call_scene_prepare(scene_no, force, None, backend, now, &mut effects);
    if what != NotifyType::None {
        device.call_scene_execute_prepared(what, Some(1), backend, now, &mut effects);
    }
    (what, effects)
}

#[test]
fn preset_applies_default_value() {
    let mut device = light_device("scene-preset");
    let mut backend = MockBackend::new();
    let (what, effects) = call_scene(&mut device, &mut backend, PRESET_1, false, ms(0));
    assert_eq!(what, NotifyType::CallScene);
    assert_eq!(brightness(&device), 100.0);
    assert!(effects.contains(&DeviceEffect::DeliveryDone(1)));
    assert_eq!(backend.apply_calls, 1);
}

#[test]
fn undo_restores_captured_state() {
    let mut device = light_device("scene-undo");
    let mut backend = MockBackend::new();
    set_brightness(&mut device, 23.4);
    let (_, _) = call_scene(&mut device, &mut backend, PRESET_2, false, ms(0));
    assert_eq!(brightness(&device), 75.0);

    let mut effects = Vec::new();
    device.undo_scene(PRESET_2, &mut backend, ms(100), &mut effects);
    assert_eq!(brightness(&device), 23.4);
}

#[test]
fn undo_for_other_scene_is_ignored() {
    let mut device = light_device("scene-undo-other");
    let mut backend = MockBackend::new();
    set_brightness(&mut device, 10.0);
    call_scene(&mut device, &mut backend, PRESET_2, false, ms(0));
    let mut effects = Vec::new();
    device.undo_scene(PRESET_1, &mut backend, ms(10), &mut effects);
    // wrong scene number: nothing restored
    assert_eq!(brightness(&device), 75.0);
}

#[test]
fn dont_care_scene_changes_nothing() {
    let mut device = light_device("scene-dontcare");
    let mut backend = MockBackend::new();
    let table = device.scenes.as_mut().unwrap();
    let mut scene = table.scene(PRESET_2);
    scene.set_dont_care(true);
    table.update_scene(scene);

    set_brightness(&mut device, 42.0);
    let (what, _) = call_scene(&mut device, &mut backend, PRESET_2, false, ms(0));
    assert_eq!(what, NotifyType::None);
    assert_eq!(brightness(&device), 42.0);
    assert!(!device.output.as_ref().unwrap().needs_apply());
    assert_eq!(backend.apply_calls, 0);
}

#[test]
fn local_priority_suppresses_unless_forced() {
    let mut device = light_device("scene-localprio");
    let mut backend = MockBackend::new();
    device.output.as_mut().unwrap().set_local_priority(true);
    set_brightness(&mut device, 5.0);

    let (what, _) = call_scene(&mut device, &mut backend, PRESET_2, false, ms(0));
    assert_eq!(what, NotifyType::None);
    assert_eq!(brightness(&device), 5.0);

    // forced call applies and clears local priority
    let (what, _) = call_scene(&mut device, &mut backend, PRESET_2, true, ms(10));
    assert_eq!(what, NotifyType::CallScene);
    assert_eq!(brightness(&device), 75.0);
    assert!(!device.output.as_ref().unwrap().has_local_priority());
}

#[test]
fn off_scene_clears_local_priority_for_area() {
    let mut device = light_device("scene-areaoff");
    let mut backend = MockBackend::new();
    // put the device into area 2 (both area scenes become regular)
    let table = device.scenes.as_mut().unwrap();
    let mut area_on = table.scene(AREA_2_ON);
    area_on.set_dont_care(false);
    table.update_scene(area_on);
    let mut area_off = table.scene(scene::AREA_2_OFF);
    area_off.set_dont_care(false);
    table.update_scene(area_off);
    device.output.as_mut().unwrap().set_local_priority(true);

    let (what, _) = call_scene(&mut device, &mut backend, scene::AREA_2_OFF, false, ms(0));
    assert_eq!(what, NotifyType::CallScene);
    assert!(!device.output.as_ref().unwrap().has_local_priority());
}

#[test]
fn area_scene_suppressed_when_not_in_area() {
    let mut device = light_device("scene-area");
    let mut backend = MockBackend::new();
    // area scenes default to dontCare: device is not in any area
    let (what, _) = call_scene(&mut device, &mut backend, AREA_2_ON, false, ms(0));
    assert_eq!(what, NotifyType::None);
}

#[test]
fn save_scene_captures_and_maintains_area_flags() {
    let mut device = light_device("scene-save");
    set_brightness(&mut device, 66.0);
    device.save_scene(PRESET_2);
    let saved = device.scenes.as_ref().unwrap().scene(PRESET_2);
    assert_eq!(saved.values[0].value, 66.0);

    // saving an area-on scene while on joins the area
    device.save_scene(AREA_2_ON);
    let table = device.scenes.as_ref().unwrap();
    assert!(!table.scene(AREA_2_ON).dont_care);
    assert!(!table.scene(scene::AREA_2_OFF).dont_care);

    // saving it while off leaves the area again
    set_brightness(&mut device, 0.0);
    device.save_scene(AREA_2_ON);
    let table = device.scenes.as_ref().unwrap();
    assert!(table.scene(AREA_2_ON).dont_care);
    assert!(table.scene(scene::AREA_2_OFF).dont_care);
}

#[test]
fn capture_then_load_round_trips() {
    let mut device = light_device("scene-roundtrip");
    let mut backend = MockBackend::new();
    set_brightness(&mut device, 37.9);
    device.save_scene(PRESET_2);
    set_brightness(&mut device, 80.0);
    call_scene(&mut device, &mut backend, PRESET_2, false, ms(0));
    assert_eq!(brightness(&device), 37.9);
}

#[test]
fn call_scene_min_turns_on_dim_level_only_when_off() {
    let mut device = light_device("scene-min");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    device.call_scene_min(MINIMUM, &mut backend, ms(0), &mut effects);
    assert_eq!(brightness(&device), 1.0);
    set_brightness(&mut device, 60.0);
    device.call_scene_min(MINIMUM, &mut backend, ms(1), &mut effects);
    assert_eq!(brightness(&device), 60.0);
}

#[test]
fn set_local_priority_respects_dont_care() {
    let mut device = light_device("scene-setprio");
    device.set_local_priority(PRESET_2);
    assert!(device.output.as_ref().unwrap().has_local_priority());

    let mut device2 = light_device("scene-setprio2");
    let table = device2.scenes.as_mut().unwrap();
    let mut scene = table.scene(PRESET_2);
    scene.set_dont_care(true);
    table.update_scene(scene);
    device2.set_local_priority(PRESET_2);
    assert!(!device2.output.as_ref().unwrap().has_local_priority());
}

// -- dimming ------------------------------------------------------------------

#[test]
fn dim_up_steps_and_arms_autostop() {
    let mut device = light_device("dim-up");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    let what = device.dim_channel_prepare(
        Some(0),
        DimMode::Up,
        0,
        DEFAULT_DIM_AUTOSTOP,
        None,
        &mut backend,
        ms(0),
        &mut effects,
    );
    assert_eq!(what, NotifyType::DimChannel);
    device.dim_channel_execute_prepared(what, Some(1), &mut backend, ms(0), &mut effects);
    // first step applied immediately
    let step = 300.0 * (100.0 / 7000.0);
    assert!((brightness(&device) - (50.0 + step)).abs() < 0.2);
    assert_eq!(device.dim.current_mode, DimMode::Up);

    // without retrigger, exactly one stop at the auto-stop timeout
    device.dim_tick(ms(5000), &mut backend, &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Stop);
    let applies_at_stop = backend.apply_calls;
    device.dim_tick(ms(6000), &mut backend, &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Stop);
    assert_eq!(backend.apply_calls, applies_at_stop);
}

#[test]
fn dim_retrigger_extends_autostop() {
    let mut device = light_device("dim-retrigger");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(0), &mut effects);
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(0), &mut effects);

    // retrigger at 3 s: only the timer re-arms
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(3000), &mut effects);
    assert_eq!(what, NotifyType::Retrigger);
    // old deadline passes without stopping
    device.dim_tick(ms(5000), &mut backend, &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Up);
    // new deadline stops
    device.dim_tick(ms(8000), &mut backend, &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Stop);
}

#[test]
fn dim_direction_change_stops_first() {
    let mut device = light_device("dim-reverse");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(0), &mut effects);
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(0), &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Up);

    // reversing without a stop first: pipeline inserts the interim stop
    let what = device.dim_channel_prepare(Some(0), DimMode::Down, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(1000), &mut effects);
    assert_eq!(what, NotifyType::DimChannel);
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(1000), &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Down);
}

#[test]
fn dim_brightness_rejected_while_off() {
    let mut device = light_device("dim-off");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    assert!(!device.output_on());
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(0), &mut effects);
    assert_eq!(what, NotifyType::None);
}

#[test]
fn non_area_dim_suppressed_by_local_priority() {
    let mut device = light_device("dim-priority");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    device.output.as_mut().unwrap().set_local_priority(true);
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(0), &mut effects);
    assert_eq!(what, NotifyType::None);
    // area -1 bypasses the check (identify use)
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, -1, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(1), &mut effects);
    assert_eq!(what, NotifyType::DimChannel);
}

#[test]
fn increment_scene_routes_as_legacy_dim() {
    let mut device = light_device("dim-legacy");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    let what = device.call_scene_prepare(INCREMENT, false, None, &mut backend, ms(0), &mut effects);
    assert_eq!(what, NotifyType::DimChannel);
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(0), &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Up);

    let what = device.call_scene_prepare(STOP, false, None, &mut backend, ms(100), &mut effects);
    assert_eq!(what, NotifyType::DimChannel);
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(100), &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Stop);

    let what = device.call_scene_prepare(DECREMENT, false, None, &mut backend, ms(200), &mut effects);
    assert_eq!(what, NotifyType::DimChannel);
}

#[test]
fn scene_call_interrupts_running_dim() {
    let mut device = light_device("dim-interrupt");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 0, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(0), &mut effects);
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(0), &mut effects);
    assert_eq!(device.dim.current_mode, DimMode::Up);

    let what = device.call_scene_prepare(ROOM_OFF, false, None, &mut backend, ms(500), &mut effects);
    assert_eq!(what, NotifyType::CallScene);
    assert_eq!(device.dim.current_mode, DimMode::Stop);
}

#[test]
fn negative_dim_rate_override_is_ignored() {
    let mut device = light_device("dim-rate");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    let what = device.dim_channel_prepare(
        Some(0),
        DimMode::Up,
        0,
        DEFAULT_DIM_AUTOSTOP,
        Some(-4.0),
        &mut backend,
        ms(0),
        &mut effects,
    );
    device.dim_channel_execute_prepared(what, None, &mut backend, ms(0), &mut effects);
    // native rate used, not the bogus override
    let step = 300.0 * (100.0 / 7000.0);
    assert!((brightness(&device) - (50.0 + step)).abs() < 0.2);
}

#[test]
fn transition_override_reaches_channels() {
    let mut device = light_device("scene-transition");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    let what = device.call_scene_prepare(PRESET_1, false, Some(Duration::from_secs(3)), &mut backend, ms(0), &mut effects);
    device.call_scene_execute_prepared(what, None, &mut backend, ms(0), &mut effects);
    // the apply consumed the flag, but the transition time stays recorded
    let ch = &device.output.as_ref().unwrap().channels()[0];
    assert_eq!(ch.transition_time(), Duration::from_secs(3));
}

#[test]
fn area_dim_state_tracks_suppressed_requests() {
    let mut device = light_device("dim-areatrack");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    set_brightness(&mut device, 50.0);
    // device not in area 2: suppressed, but the requested area is recorded
    let what = device.dim_channel_prepare(Some(0), DimMode::Up, 2, DEFAULT_DIM_AUTOSTOP, None, &mut backend, ms(0), &mut effects);
    assert_eq!(what, NotifyType::None);
    assert_eq!(device.dim.area_dimmed, 2);
    assert_eq!(device.dim.area_dim_mode, DimMode::Stop);
}

#[test]
fn undo_respects_per_channel_capture() {
    let mut device = light_device("scene-undo-exact");
    let mut backend = MockBackend::new();
    set_brightness(&mut device, 12.3);
    call_scene(&mut device, &mut backend, PRESET_1, false, ms(0));
    // captured state carries the exact value
    let prev = device.previous_state.as_ref().unwrap();
    assert_eq!(prev.values[0], SceneValue::new(12.3));
}
