// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Button function to scene mapping.
//!
//! For every button function there is a row of scenes indexed by click
//! count (slot 0 is the off scene, slots 1..4 the 1..4-click presets).
//! Area buttons map click 1 to the area-on scene and slot 0 to the area
//! off scene, then share the preset row of their ordinal.

use crate::behaviour::button::ButtonFunc;
use crate::scene::{
    self, SceneNo, ABSENT, ALARM1, BELL1, PANIC, PRESENT, PRESET_11, PRESET_12, PRESET_13,
    PRESET_14, PRESET_2, PRESET_21, PRESET_22, PRESET_23, PRESET_24, PRESET_3, PRESET_31,
    PRESET_32, PRESET_33, PRESET_34, PRESET_4, PRESET_41, PRESET_42, PRESET_43, PRESET_44,
    ROOM_OFF, ROOM_ON,
};

/// Scenes a button function resolves to, by click count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonScenesMap {
    /// Area the button affects, 0 for the whole room.
    pub area: u8,
    /// Scene per click count; slot 0 is the off scene.
    pub scene_for_clicks: [Option<SceneNo>; 5],
}

impl ButtonScenesMap {
    pub fn new(func: ButtonFunc, global: bool) -> Self {
        let mut area = 0u8;
        let mut scenes: [Option<SceneNo>; 5] = [None; 5];
        if global {
            match func {
                ButtonFunc::Alarm => scenes[1] = Some(ALARM1),
                ButtonFunc::Panic => scenes[1] = Some(PANIC),
                ButtonFunc::Leave => {
                    scenes[0] = Some(PRESENT);
                    scenes[1] = Some(ABSENT);
                }
                ButtonFunc::Doorbell => scenes[1] = Some(BELL1),
                _ => {}
            }
            return Self { area, scene_for_clicks: scenes };
        }
        // presets for clicks 2..4, per preset row
        let preset_row = |row: u8| -> [SceneNo; 3] {
            match row {
                1 => [PRESET_12, PRESET_13, PRESET_14],
                2 => [PRESET_22, PRESET_23, PRESET_24],
                3 => [PRESET_32, PRESET_33, PRESET_34],
                4 => [PRESET_42, PRESET_43, PRESET_44],
                _ => [PRESET_2, PRESET_3, PRESET_4],
            }
        };
        let mut row = 0u8;
        match func {
            ButtonFunc::RoomPreset0x => {
                scenes[0] = Some(ROOM_OFF);
                scenes[1] = Some(ROOM_ON);
            }
            ButtonFunc::RoomPreset1x => {
                scenes[0] = Some(ROOM_OFF);
                scenes[1] = Some(PRESET_11);
                row = 1;
            }
            ButtonFunc::RoomPreset2x => {
                scenes[0] = Some(ROOM_OFF);
                scenes[1] = Some(PRESET_21);
                row = 2;
            }
            ButtonFunc::RoomPreset3x => {
                scenes[0] = Some(ROOM_OFF);
                scenes[1] = Some(PRESET_31);
                row = 3;
            }
            ButtonFunc::RoomPreset4x => {
                scenes[0] = Some(ROOM_OFF);
                scenes[1] = Some(PRESET_41);
                row = 4;
            }
            ButtonFunc::Area1Preset0x | ButtonFunc::Area1Preset1x => {
                area = 1;
                row = if func == ButtonFunc::Area1Preset1x { 1 } else { 0 };
            }
            ButtonFunc::Area2Preset0x | ButtonFunc::Area2Preset2x => {
                area = 2;
                row = if func == ButtonFunc::Area2Preset2x { 2 } else { 0 };
            }
            ButtonFunc::Area3Preset0x | ButtonFunc::Area3Preset3x => {
                area = 3;
                row = if func == ButtonFunc::Area3Preset3x { 3 } else { 0 };
            }
            ButtonFunc::Area4Preset0x | ButtonFunc::Area4Preset4x => {
                area = 4;
                row = if func == ButtonFunc::Area4Preset4x { 4 } else { 0 };
            }
            _ => return Self { area, scene_for_clicks: scenes },
        }
        if area != 0 {
            // area buttons: click 1 is area-on, slot 0 is area-off
            scenes[0] = Some(scene::off_scene_for_area(area));
            scenes[1] = Some(scene::main_scene_for_area(area));
        }
        let presets = preset_row(row);
        scenes[2] = Some(presets[0]);
        scenes[3] = Some(presets[1]);
        scenes[4] = Some(presets[2]);
        Self { area, scene_for_clicks: scenes }
    }
}
