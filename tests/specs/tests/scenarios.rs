// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end behavioral scenarios: scene calls with zone state, undo,
//! blind calibration and dim auto-stop, driven through the API session.

use serde_json::json;
use vdc_specs::HostRig;
use vdchost::backends::demo::DemoPopulation;
use vdchost::scene;

fn lights_only(count: usize) -> DemoPopulation {
    DemoPopulation { lights: count, shades: 0, buttons: 0 }
}

// Room preset in a zone: both lights follow, zone state tracks the scene.
#[test]
fn room_preset_reaches_all_zone_lights() {
    let mut rig = HostRig::started(lights_only(2));
    let a = rig.demo_device("light", 0);
    let b = rig.demo_device("light", 1);
    assert_eq!(rig.brightness(&a), 0.0);
    assert_eq!(rig.brightness(&b), 0.0);

    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2 }
    }));
    assert_eq!(rig.brightness(&a), 75.0);
    assert_eq!(rig.brightness(&b), 75.0);
    let zone = &rig.host.controller.zones[&1];
    assert!(zone.state.light_on[0]);
    assert_eq!(zone.state.last_light_scene, Some(scene::PRESET_2));
}

// Undo after the preset returns both devices to their captured state.
#[test]
fn undo_restores_prior_state() {
    let mut rig = HostRig::started(lights_only(2));
    let a = rig.demo_device("light", 0);
    let b = rig.demo_device("light", 1);
    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2 }
    }));
    assert_eq!(rig.brightness(&a), 75.0);

    rig.frame(json!({
        "method": "undoScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2 }
    }));
    assert_eq!(rig.brightness(&a), 0.0);
    assert_eq!(rig.brightness(&b), 0.0);
}

// A dontCare scene leaves channels untouched on the whole audience.
#[test]
fn dont_care_scene_is_inert() {
    let mut rig = HostRig::started(lights_only(2));
    let a = rig.demo_device("light", 0);
    // area scenes default to dontCare on every device
    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::AREA_2_ON }
    }));
    assert_eq!(rig.brightness(&a), 0.0);
    let device = rig.host.device(&a).unwrap();
    assert!(!device.output.as_ref().unwrap().needs_apply());
}

// Blind full-open with end contacts: overshoot plus calibration update.
#[test]
fn blind_full_open_calibrates_open_time() {
    let mut rig = HostRig::started(DemoPopulation { lights: 0, shades: 1, buttons: 0 });
    let shade = rig.demo_device("shade", 0);
    // configure the shade: known at bottom, end contacts present
    {
        let device = rig
            .host
            .vdcs
            .values_mut()
            .find_map(|v| v.devices.get_mut(&shade))
            .unwrap();
        let output = device.output.as_mut().unwrap();
        let (seq, _, _) = output.shadow_parts().unwrap();
        seq.set_device_params(true, std::time::Duration::from_millis(200), None, None, false);
        seq.set_move_times(50.0, 50.0, 1.0, 1.0);
        seq.set_reference(0.0, 0.0);
    }
    rig.frame(json!({
        "method": "setOutputChannelValue",
        "params": { "dSUID": shade.to_string(), "channel": 7, "value": 100.0 }
    }));
    // moving up; the safety stop sits at 120% of the 50 s open time
    {
        let device = rig.host.device(&shade).unwrap();
        assert!(!device.output.as_ref().unwrap().shadow_sequencer().unwrap().is_idle());
    }

    // end contact fires at 48 s: position snaps, open time re-measured
    rig.advance_to_ms(48_000 - 1);
    let mut effects = Vec::new();
    {
        let vdc = rig.host.vdcs.values_mut().next().unwrap();
        let device = vdc.devices.get_mut(&shade).unwrap();
        let mut device_effects = Vec::new();
        device.end_reached(true, &mut *vdc.backend, vdc_specs_now(48_000), &mut device_effects);
        for e in device_effects {
            effects.push((shade, e));
        }
    }
    rig.host.process_device_effects(effects, vdc_specs_now(48_000));
    let device = rig.host.device(&shade).unwrap();
    let seq = device.output.as_ref().unwrap().shadow_sequencer().unwrap();
    assert_eq!(seq.open_time(), 48.0);
    assert_eq!(rig.channel_value(&shade, 0), 100.0);
}

fn vdc_specs_now(ms: u64) -> vdchost::clock::MonoTime {
    vdchost::clock::MonoTime::from_millis(ms)
}

// Blind limit target without end contacts still terminates on the
// 120% safety timer.
#[test]
fn blind_without_end_contacts_terminates() {
    let mut rig = HostRig::started(DemoPopulation { lights: 0, shades: 1, buttons: 0 });
    let shade = rig.demo_device("shade", 0);
    {
        let device = rig
            .host
            .vdcs
            .values_mut()
            .find_map(|v| v.devices.get_mut(&shade))
            .unwrap();
        let output = device.output.as_mut().unwrap();
        let (seq, _, _) = output.shadow_parts().unwrap();
        seq.set_device_params(false, std::time::Duration::from_millis(200), None, None, false);
        seq.set_move_times(10.0, 10.0, 1.0, 1.0);
        seq.set_reference(100.0, 100.0);
    }
    rig.frame(json!({
        "method": "setOutputChannelValue",
        "params": { "dSUID": shade.to_string(), "channel": 7, "value": 0.0 }
    }));
    rig.advance_to_ms(20_000);
    let device = rig.host.device(&shade).unwrap();
    assert!(device.output.as_ref().unwrap().shadow_sequencer().unwrap().is_idle());
    assert_eq!(rig.channel_value(&shade, 0), 0.0);
}

// Dimming without retrigger stops exactly once after the 5 s timeout.
#[test]
fn dim_auto_stop_fires_exactly_once() {
    let mut rig = HostRig::started(lights_only(1));
    let a = rig.demo_device("light", 0);
    // light must be on to dim brightness
    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2 }
    }));
    rig.frame(json!({
        "method": "dimChannel",
        "params": { "zone_id": 1, "group": 1, "mode": 1 }
    }));
    {
        let device = rig.host.device(&a).unwrap();
        assert_eq!(device.dim_state().current_mode, vdcapi::frames::DimMode::Up);
    }
    // auto-stop at 5 s, and only once
    rig.advance_to_ms(10_000);
    let device = rig.host.device(&a).unwrap();
    assert_eq!(device.dim_state().current_mode, vdcapi::frames::DimMode::Stop);
    let brightness = rig.brightness(&a);
    // roughly 5 s of dimming at 100%/7 s on top of the preset level
    assert!(brightness > 75.0, "dimming should have raised brightness, got {brightness}");
}

// Retrigger within the timeout extends dimming.
#[test]
fn dim_retrigger_extends_auto_stop() {
    let mut rig = HostRig::started(lights_only(1));
    let a = rig.demo_device("light", 0);
    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_3 }
    }));
    rig.frame(json!({
        "method": "dimChannel",
        "params": { "zone_id": 1, "group": 1, "mode": 1 }
    }));
    rig.advance_to_ms(3_000);
    rig.frame(json!({
        "method": "dimChannel",
        "params": { "zone_id": 1, "group": 1, "mode": 1 }
    }));
    rig.advance_to_ms(6_000);
    // still dimming: the retrigger moved the stop to t=8 s
    {
        let device = rig.host.device(&a).unwrap();
        assert_eq!(device.dim_state().current_mode, vdcapi::frames::DimMode::Up);
    }
    rig.advance_to_ms(9_000);
    let device = rig.host.device(&a).unwrap();
    assert_eq!(device.dim_state().current_mode, vdcapi::frames::DimMode::Stop);
}

// Local priority suppresses zone calls until an off scene clears it.
#[test]
fn local_priority_blocks_zone_scenes() {
    let mut rig = HostRig::started(lights_only(1));
    let a = rig.demo_device("light", 0);
    rig.frame(json!({
        "method": "setLocalPriority",
        "params": { "dSUID": a.to_string(), "scene": scene::PRESET_2 }
    }));
    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2 }
    }));
    assert_eq!(rig.brightness(&a), 0.0);

    // forced call goes through
    rig.frame(json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2, "force": true }
    }));
    assert_eq!(rig.brightness(&a), 75.0);
}

// Persist-then-reload: device settings survive, volatile state does not.
#[test]
fn settings_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let a;
    {
        let mut rig = HostRig::started(lights_only(1));
        a = rig.demo_device("light", 0);
        rig.host.store = vdchost::persist::ParamStore::open(dir.path()).unwrap();
        rig.frame(json!({
            "method": "callScene",
            "params": { "zone_id": 1, "group": 1, "scene": scene::PRESET_2 }
        }));
        rig.frame(json!({
            "method": "saveScene",
            "params": { "dSUID": a.to_string(), "scene": scene::PRESET_4 }
        }));
        rig.host.save_all_settings();
        rig.host.store.flush().unwrap();
    }
    // a fresh host over the same store finds the saved scene again
    let mut rig = HostRig::started(lights_only(1));
    rig.host.store = vdchost::persist::ParamStore::open(dir.path()).unwrap();
    let mut device = vdchost::device::Device::new(a, "demo light 1");
    device.set_output(vdchost::behaviour::output::OutputBehaviour::light());
    device.load_settings(&rig.host.store).unwrap();
    let saved = device.scenes.as_ref().unwrap().scene(scene::PRESET_4);
    assert_eq!(saved.values[0].value, 75.0);
    // brightness itself is volatile and starts over
    assert_eq!(device.output.as_ref().unwrap().channels()[0].value(), 0.0);
}
