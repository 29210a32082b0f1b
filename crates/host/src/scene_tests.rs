// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    room_off = { ROOM_OFF, SceneCmd::Off, 0 },
    area_2_off = { AREA_2_OFF, SceneCmd::Off, 2 },
    room_on = { ROOM_ON, SceneCmd::Invoke, 0 },
    area_3_on = { AREA_3_ON, SceneCmd::Invoke, 3 },
    continue_dim = { AREA_CONTINUE, SceneCmd::AreaContinue, 0 },
    increment = { INCREMENT, SceneCmd::Increment, 0 },
    decrement = { DECREMENT, SceneCmd::Decrement, 0 },
    stop = { STOP, SceneCmd::Stop, 0 },
    deep_off = { DEEP_OFF, SceneCmd::Off, 0 },
    panic = { PANIC, SceneCmd::Invoke, 0 },
)]
fn scene_kinds(no: SceneNo, cmd: SceneCmd, area: u8) {
    assert_eq!(cmd_for_scene(no), cmd);
    assert_eq!(area_for_scene(no), area);
}

#[test]
fn area_scene_lookup() {
    assert_eq!(main_scene_for_area(1), AREA_1_ON);
    assert_eq!(main_scene_for_area(4), AREA_4_ON);
    assert_eq!(off_scene_for_area(1), AREA_1_OFF);
    assert_eq!(off_scene_for_area(4), AREA_4_OFF);
}

#[test]
fn global_threshold() {
    assert!(!is_global_scene(PRESET_44));
    assert!(is_global_scene(PANIC));
    assert!(is_global_scene(DEEP_OFF));
}

#[test]
fn defaults_follow_preset_rows() {
    let table = SceneTable::new(1);
    assert_eq!(table.scene(ROOM_ON).values[0].value, 100.0);
    assert_eq!(table.scene(PRESET_2).values[0].value, 75.0);
    assert_eq!(table.scene(PRESET_3).values[0].value, 50.0);
    assert_eq!(table.scene(PRESET_4).values[0].value, 25.0);
    assert_eq!(table.scene(ROOM_OFF).values[0].value, 0.0);
    assert_eq!(table.scene(MINIMUM).values[0].value, 1.0);
}

#[test]
fn area_scenes_default_dont_care() {
    let table = SceneTable::new(1);
    assert!(table.scene(AREA_1_ON).dont_care);
    assert!(table.scene(AREA_3_OFF).dont_care);
    assert!(!table.scene(ROOM_ON).dont_care);
}

#[test]
fn alert_scenes_ignore_local_priority() {
    let table = SceneTable::new(1);
    assert!(table.scene(PANIC).ignore_local_priority);
    assert!(table.scene(ALARM1).ignore_local_priority);
    assert!(!table.scene(PRESET_2).ignore_local_priority);
}

#[test]
fn update_and_reload_scene() {
    let mut table = SceneTable::new(2);
    let mut scene = table.scene(PRESET_2);
    scene.set_value(0, 33.0);
    scene.set_value(1, 66.0);
    assert!(scene.is_dirty());
    table.update_scene(scene);
    let back = table.scene(PRESET_2);
    assert_eq!(back.values[0].value, 33.0);
    assert_eq!(back.values[1].value, 66.0);
    assert_eq!(table.configured_scenes(), vec![PRESET_2]);
}

#[test]
fn content_hash_tracks_values_and_flags() {
    let table = SceneTable::new(1);
    let a = table.scene(PRESET_2);
    let mut b = table.scene(PRESET_2);
    assert_eq!(a.content_hash(), b.content_hash());
    b.set_value(0, 12.0);
    assert_ne!(a.content_hash(), b.content_hash());
    let mut c = table.scene(PRESET_2);
    c.set_dont_care(true);
    assert_ne!(a.content_hash(), c.content_hash());
}

#[test]
fn dont_care_set_marks_dirty_once() {
    let mut scene = Scene::new(PRESET_2, 1);
    assert!(!scene.is_dirty());
    scene.set_dont_care(true);
    assert!(scene.is_dirty());
    scene.mark_clean();
    scene.set_dont_care(true);
    assert!(!scene.is_dirty());
}
