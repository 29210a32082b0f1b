// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scene numbers, per-scene flags and the per-device scene table.
//!
//! Scenes 0..63 are zone/room scenes, 64 and up are global (apartment)
//! scenes. Every scene resolves to a command plus optional per-channel
//! values; devices keep a sparse table and fall back to kind-derived
//! defaults for scenes never configured.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vdcapi::hash::Fnv64;

use crate::error::{HostError, HostResult};
use crate::persist::{FieldDef, PersistedParams, RowIdentity, RowReader, StatementBuilder};

pub type SceneNo = u8;

// Room scenes.
pub const ROOM_OFF: SceneNo = 0;
pub const AREA_1_OFF: SceneNo = 1;
pub const AREA_2_OFF: SceneNo = 2;
pub const AREA_3_OFF: SceneNo = 3;
pub const AREA_4_OFF: SceneNo = 4;
pub const ROOM_ON: SceneNo = 5;
pub const PRESET_1: SceneNo = ROOM_ON;
pub const AREA_1_ON: SceneNo = 6;
pub const AREA_2_ON: SceneNo = 7;
pub const AREA_3_ON: SceneNo = 8;
pub const AREA_4_ON: SceneNo = 9;
pub const AREA_CONTINUE: SceneNo = 10;
pub const DECREMENT: SceneNo = 11;
pub const INCREMENT: SceneNo = 12;
pub const MINIMUM: SceneNo = 13;
pub const MAXIMUM: SceneNo = 14;
pub const STOP: SceneNo = 15;
pub const PRESET_2: SceneNo = 17;
pub const PRESET_3: SceneNo = 18;
pub const PRESET_4: SceneNo = 19;
pub const PRESET_12: SceneNo = 20;
pub const PRESET_13: SceneNo = 21;
pub const PRESET_14: SceneNo = 22;
pub const PRESET_22: SceneNo = 23;
pub const PRESET_23: SceneNo = 24;
pub const PRESET_24: SceneNo = 25;
pub const PRESET_32: SceneNo = 26;
pub const PRESET_33: SceneNo = 27;
pub const PRESET_34: SceneNo = 28;
pub const PRESET_42: SceneNo = 29;
pub const PRESET_43: SceneNo = 30;
pub const PRESET_44: SceneNo = 31;
pub const PRESET_OFF_10: SceneNo = 32;
pub const PRESET_11: SceneNo = 33;
pub const PRESET_OFF_20: SceneNo = 34;
pub const PRESET_21: SceneNo = 35;
pub const PRESET_OFF_30: SceneNo = 36;
pub const PRESET_31: SceneNo = 37;
pub const PRESET_OFF_40: SceneNo = 38;
pub const PRESET_41: SceneNo = 39;

// Global (apartment) scenes.
pub const FIRST_GLOBAL_SCENE: SceneNo = 64;
pub const AUTO_STANDBY: SceneNo = 64;
pub const PANIC: SceneNo = 65;
pub const STANDBY: SceneNo = 67;
pub const DEEP_OFF: SceneNo = 68;
pub const SLEEPING: SceneNo = 69;
pub const WAKE_UP: SceneNo = 70;
pub const PRESENT: SceneNo = 71;
pub const ABSENT: SceneNo = 72;
pub const BELL1: SceneNo = 73;
pub const ALARM1: SceneNo = 74;
pub const FIRE: SceneNo = 76;
pub const SMOKE: SceneNo = 77;
pub const WATER: SceneNo = 78;
pub const GAS: SceneNo = 79;
pub const ALARM2: SceneNo = 83;
pub const ALARM3: SceneNo = 84;
pub const ALARM4: SceneNo = 85;
pub const WIND: SceneNo = 86;
pub const NO_WIND: SceneNo = 87;
pub const RAIN: SceneNo = 88;
pub const NO_RAIN: SceneNo = 89;

pub const MAX_SCENE_NO: SceneNo = 91;

/// The command a scene carries beside (or instead of) channel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCmd {
    /// Apply the stored channel values.
    Invoke,
    /// Off scene: applies values (usually zero) and clears local priority.
    Off,
    /// Legacy dim step down on the default channel.
    Decrement,
    /// Legacy dim step up on the default channel.
    Increment,
    /// Switch on at minimum level.
    Min,
    /// Switch on at maximum level.
    Max,
    /// Stop ongoing dimming/transitions.
    Stop,
    /// Continue the last area dimming operation, if any.
    AreaContinue,
}

/// Area on scene (`T<area>_S1`) for an area 1..4.
pub fn main_scene_for_area(area: u8) -> SceneNo {
    AREA_1_ON + (area - 1)
}

/// Area off scene (`T<area>_S0`) for an area 1..4.
pub fn off_scene_for_area(area: u8) -> SceneNo {
    AREA_1_OFF + (area - 1)
}

/// Area (1..4) a scene addresses; 0 when it is not an area scene.
pub fn area_for_scene(scene_no: SceneNo) -> u8 {
    match scene_no {
        AREA_1_OFF..=AREA_4_OFF => scene_no - AREA_1_OFF + 1,
        AREA_1_ON..=AREA_4_ON => scene_no - AREA_1_ON + 1,
        _ => 0,
    }
}

pub fn is_global_scene(scene_no: SceneNo) -> bool {
    scene_no >= FIRST_GLOBAL_SCENE
}

/// Command a scene number resolves to.
pub fn cmd_for_scene(scene_no: SceneNo) -> SceneCmd {
    match scene_no {
        ROOM_OFF | AREA_1_OFF..=AREA_4_OFF | PRESET_OFF_10 | PRESET_OFF_20 | PRESET_OFF_30
        | PRESET_OFF_40 | AUTO_STANDBY | STANDBY | DEEP_OFF | SLEEPING | ABSENT => SceneCmd::Off,
        AREA_CONTINUE => SceneCmd::AreaContinue,
        DECREMENT => SceneCmd::Decrement,
        INCREMENT => SceneCmd::Increment,
        MINIMUM => SceneCmd::Min,
        MAXIMUM => SceneCmd::Max,
        STOP => SceneCmd::Stop,
        _ => SceneCmd::Invoke,
    }
}

pub fn is_off_scene(scene_no: SceneNo) -> bool {
    cmd_for_scene(scene_no) == SceneCmd::Off
}

/// Scenes whose undo must capture the exact hardware state rather than the
/// cached channel values: alert scenes that will routinely be undone.
pub fn precise_undo_important(scene_no: SceneNo) -> bool {
    matches!(scene_no, PANIC | ALARM1 | ALARM2 | ALARM3 | ALARM4 | FIRE | SMOKE | WATER | GAS | BELL1)
}

/// One channel's slot in a scene: value plus per-channel dontCare.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneValue {
    pub value: f64,
    pub dont_care: bool,
}

impl SceneValue {
    pub fn new(value: f64) -> Self {
        Self { value, dont_care: false }
    }

    pub fn dont_care() -> Self {
        Self { value: 0.0, dont_care: true }
    }
}

/// A scene as stored in a device's scene table: common header plus one
/// value slot per output channel (index 0 is the primary channel).
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub scene_no: SceneNo,
    pub dont_care: bool,
    pub ignore_local_priority: bool,
    pub values: Vec<SceneValue>,
    dirty: bool,
}

impl Scene {
    pub fn new(scene_no: SceneNo, num_channels: usize) -> Self {
        Self {
            scene_no,
            dont_care: false,
            ignore_local_priority: false,
            values: vec![SceneValue::new(0.0); num_channels.max(1)],
            dirty: false,
        }
    }

    pub fn cmd(&self) -> SceneCmd {
        cmd_for_scene(self.scene_no)
    }

    pub fn area(&self) -> u8 {
        area_for_scene(self.scene_no)
    }

    pub fn is_global(&self) -> bool {
        is_global_scene(self.scene_no)
    }

    pub fn set_dont_care(&mut self, dont_care: bool) {
        if self.dont_care != dont_care {
            self.dont_care = dont_care;
            self.dirty = true;
        }
    }

    pub fn set_value(&mut self, channel_index: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(channel_index) {
            if (slot.value - value).abs() >= f64::EPSILON || slot.dont_care {
                slot.value = value;
                slot.dont_care = false;
                self.dirty = true;
            }
        }
    }

    pub fn value(&self, channel_index: usize) -> Option<SceneValue> {
        self.values.get(channel_index).copied()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Content fingerprint for delivery optimization; mixed across devices
    /// by XOR so audience order does not matter.
    pub fn content_hash(&self) -> u64 {
        let mut h = Fnv64::new();
        h.add_byte(self.scene_no);
        h.add_byte(u8::from(self.dont_care));
        for v in &self.values {
            h.add_f64(v.value);
            h.add_byte(u8::from(v.dont_care));
        }
        h.hash()
    }
}

/// Kind-derived default values for a light-like primary channel.
fn default_primary_value(scene_no: SceneNo) -> f64 {
    match cmd_for_scene(scene_no) {
        SceneCmd::Off => 0.0,
        SceneCmd::Min => 1.0,
        _ => match scene_no {
            PRESET_2 | PRESET_12 | PRESET_22 | PRESET_32 | PRESET_42 => 75.0,
            PRESET_3 | PRESET_13 | PRESET_23 | PRESET_33 | PRESET_43 => 50.0,
            PRESET_4 | PRESET_14 | PRESET_24 | PRESET_34 | PRESET_44 => 25.0,
            _ => 100.0,
        },
    }
}

/// Per-device scene table: sparse storage over kind-derived defaults.
#[derive(Debug, Clone)]
pub struct SceneTable {
    num_channels: usize,
    scenes: HashMap<SceneNo, Scene>,
}

impl SceneTable {
    pub fn new(num_channels: usize) -> Self {
        Self { num_channels: num_channels.max(1), scenes: HashMap::new() }
    }

    /// Default scene for a number never configured on this device.
    ///
    /// Area scenes default to dontCare (a device reacts to an area only
    /// once configured into it); alert scenes ignore local priority.
    fn default_scene(&self, scene_no: SceneNo) -> Scene {
        let mut scene = Scene::new(scene_no, self.num_channels);
        scene.values[0] = SceneValue::new(default_primary_value(scene_no));
        for slot in scene.values.iter_mut().skip(1) {
            *slot = SceneValue::dont_care();
        }
        if area_for_scene(scene_no) != 0 {
            scene.dont_care = true;
        }
        if precise_undo_important(scene_no) {
            scene.ignore_local_priority = true;
        }
        scene
    }

    /// Look up a scene, falling back to its kind-derived default.
    pub fn scene(&self, scene_no: SceneNo) -> Scene {
        self.scenes.get(&scene_no).cloned().unwrap_or_else(|| self.default_scene(scene_no))
    }

    /// Store a (possibly modified) scene back into the table.
    pub fn update_scene(&mut self, mut scene: Scene) {
        scene.values.resize(self.num_channels, SceneValue::dont_care());
        self.scenes.insert(scene.scene_no, scene);
    }

    /// Scene numbers with explicit (non-default) entries.
    pub fn configured_scenes(&self) -> Vec<SceneNo> {
        let mut nos: Vec<SceneNo> = self.scenes.keys().copied().collect();
        nos.sort_unstable();
        nos
    }

    /// Build the transient pseudo-scene used to capture state for undo.
    pub fn new_undo_state_scene(&self, scene_no: SceneNo) -> Scene {
        let mut scene = Scene::new(scene_no, self.num_channels);
        // capture always considers every channel
        for slot in scene.values.iter_mut() {
            *slot = SceneValue::new(0.0);
        }
        scene
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }
}

// -- persistence --------------------------------------------------------------

const SCENE_FLAG_DONT_CARE: u64 = 0x0001;
const SCENE_FLAG_IGNORE_LOCAL_PRIORITY: u64 = 0x0002;

const SCENE_FIELDS: &[FieldDef] = &[
    FieldDef::integer("sceneNo"),
    FieldDef::integer("sceneFlags"),
    FieldDef::text("channelValues"),
];

#[derive(Serialize, Deserialize)]
struct StoredSceneValue {
    v: f64,
    dc: bool,
}

impl PersistedParams for Scene {
    fn table_name(&self) -> &'static str {
        "sceneTable"
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        SCENE_FIELDS
    }

    fn row_identity(&self) -> RowIdentity {
        RowIdentity::InList { key: self.scene_no.to_string() }
    }

    fn load_from_row(&mut self, row: &mut RowReader<'_>, common_flags: &mut u64) -> HostResult<()> {
        self.scene_no = row.next_integer()?.clamp(0, i64::from(MAX_SCENE_NO)) as SceneNo;
        *common_flags = row.next_integer()? as u64;
        self.dont_care = *common_flags & SCENE_FLAG_DONT_CARE != 0;
        self.ignore_local_priority = *common_flags & SCENE_FLAG_IGNORE_LOCAL_PRIORITY != 0;
        let text = row.next_text()?;
        let stored: Vec<StoredSceneValue> = serde_json::from_str(&text)
            .map_err(|e| HostError::persistence(format!("scene values: {e}")))?;
        self.values = stored.into_iter().map(|s| SceneValue { value: s.v, dont_care: s.dc }).collect();
        self.dirty = false;
        Ok(())
    }

    fn bind_to_statement(&self, stmt: &mut StatementBuilder, _parent_id: &str, _common_flags: u64) {
        stmt.bind_integer(i64::from(self.scene_no));
        let mut flags = 0u64;
        if self.dont_care {
            flags |= SCENE_FLAG_DONT_CARE;
        }
        if self.ignore_local_priority {
            flags |= SCENE_FLAG_IGNORE_LOCAL_PRIORITY;
        }
        stmt.bind_integer(flags as i64);
        let stored: Vec<StoredSceneValue> =
            self.values.iter().map(|s| StoredSceneValue { v: s.value, dc: s.dont_care }).collect();
        stmt.bind_text(serde_json::to_string(&stored).unwrap_or_default());
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
