// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use vdcapi::frames::{ChannelType, DsGroup};

use super::*;
use crate::behaviour::button::{ActionMode, ButtonFunc, ButtonMode, ButtonSettings, StateMachineMode};
use crate::scene::{Scene, PRESET_2};
use crate::test_support::{light_device, light_with_button};

#[test]
fn button_settings_round_trip() {
    let mut store = ParamStore::in_memory();
    let settings = ButtonSettings {
        group: DsGroup::GreyShadow,
        func: ButtonFunc::Area2Preset0x,
        mode: ButtonMode::RockerUp,
        fixed_mode: None,
        channel: ChannelType::ShadePosition,
        sets_local_priority: true,
        calls_present: false,
        action_mode: ActionMode::Force,
        action_id: 17,
        state_machine_mode: StateMachineMode::Simple,
        long_function_delay: Duration::from_millis(650),
    };
    store.save(&settings, "dev1_button0", 0);

    let mut restored = ButtonSettings::default();
    let mut flags = 0u64;
    assert!(store.load(&mut restored, "dev1_button0", &mut flags).unwrap());
    assert_eq!(restored.group, DsGroup::GreyShadow);
    assert_eq!(restored.func, ButtonFunc::Area2Preset0x);
    assert_eq!(restored.mode, ButtonMode::RockerUp);
    assert_eq!(restored.channel, ChannelType::ShadePosition);
    assert!(restored.sets_local_priority);
    assert!(!restored.calls_present);
    assert_eq!(restored.action_mode, ActionMode::Force);
    assert_eq!(restored.action_id, 17);
    assert_eq!(restored.state_machine_mode, StateMachineMode::Simple);
    assert_eq!(restored.long_function_delay, Duration::from_millis(650));
}

#[test]
fn scene_rows_are_keyed_by_scene_number() {
    let mut store = ParamStore::in_memory();
    let mut a = Scene::new(PRESET_2, 2);
    a.set_value(0, 33.0);
    let mut b = Scene::new(5, 2);
    b.set_value(0, 90.0);
    store.save(&a, "dev1", 0);
    store.save(&b, "dev1", 0);

    let mut keys = store.list_keys("sceneTable", "dev1");
    keys.sort();
    assert_eq!(keys, vec!["17".to_owned(), "5".to_owned()]);

    let mut restored = Scene::new(PRESET_2, 2);
    let mut flags = 0u64;
    assert!(store.load(&mut restored, "dev1", &mut flags).unwrap());
    assert_eq!(restored.values[0].value, 33.0);
    assert!(!restored.is_dirty());
}

#[test]
fn missing_rows_load_nothing() {
    let store = ParamStore::in_memory();
    let mut settings = ButtonSettings::default();
    let mut flags = 0u64;
    assert!(!store.load(&mut settings, "nothing_here", &mut flags).unwrap());
}

#[test]
fn device_settings_round_trip_excludes_volatile_state() {
    let mut store = ParamStore::in_memory();
    let mut device = light_with_button("persist-dev");
    device.name = "living room lamp".to_owned();
    device.zone_id = 3;
    device.buttons[0].settings.func = ButtonFunc::RoomPreset2x;
    device.save_scene(PRESET_2);
    device.save_settings(&mut store);

    // a fresh device with the same construction shape
    let mut restored = light_with_button("persist-dev");
    restored.load_settings(&store).unwrap();
    assert_eq!(restored.name, "living room lamp");
    assert_eq!(restored.zone_id, 3);
    assert_eq!(restored.buttons[0].settings.func, ButtonFunc::RoomPreset2x);
    let scene = restored.scenes.as_ref().unwrap().scene(PRESET_2);
    assert_eq!(scene.values[0].value, 0.0);
    assert_eq!(
        restored.scenes.as_ref().unwrap().configured_scenes(),
        device.scenes.as_ref().unwrap().configured_scenes()
    );
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = ParamStore::open(dir.path()).unwrap();
        let settings = ButtonSettings { action_id: 42, ..ButtonSettings::default() };
        store.save(&settings, "dev_button0", 0);
        store.flush().unwrap();
    }
    let store = ParamStore::open(dir.path()).unwrap();
    let mut restored = ButtonSettings::default();
    let mut flags = 0u64;
    assert!(store.load(&mut restored, "dev_button0", &mut flags).unwrap());
    assert_eq!(restored.action_id, 42);
}

#[test]
fn forget_parent_drops_all_rows() {
    let mut store = ParamStore::in_memory();
    let device = light_device("forget-me");
    let mut scene = Scene::new(PRESET_2, 1);
    scene.set_value(0, 10.0);
    let parent = device.dsuid.to_string();
    store.save(&scene, &parent, 0);
    assert_eq!(store.list_keys("sceneTable", &parent).len(), 1);
    store.forget_parent(&parent);
    assert!(store.list_keys("sceneTable", &parent).is_empty());
}

#[test]
fn unchanged_rows_do_not_mark_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParamStore::open(dir.path()).unwrap();
    let settings = ButtonSettings::default();
    store.save(&settings, "dev_button0", 0);
    store.flush().unwrap();
    // identical save is a no-op
    store.save(&settings, "dev_button0", 0);
    store.flush().unwrap();
}
