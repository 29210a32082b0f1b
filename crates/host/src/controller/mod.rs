// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The local controller: zone/group state tracking, button-to-scene
//! mapping, sensor routing and triggers.
//!
//! The controller sits between behaviours and the notification router:
//! button clicks resolve to scene calls or dim operations through the
//! scenes map and the zone state, and every scene apply on a zone device
//! feeds back into that zone's state.

pub mod scenemap;
pub mod trigger;
pub mod zone;

pub use scenemap::ButtonScenesMap;
pub use trigger::{Trigger, TriggerMode, VarDef};
pub use zone::{Zone, ZoneState};

use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info};
use vdcapi::frames::{ChannelType, DimMode, DsGroup, ZoneId};

use crate::behaviour::button::{ActionMode, ButtonBehaviour, ButtonFunc, ButtonMode, ClickType};
use crate::behaviour::sensor::{SensorBehaviour, SensorFunc, SensorType};
use crate::clock::{earliest, MonoTime};
use crate::device::{Device, NotifyType, DEFAULT_DIM_AUTOSTOP};
use crate::router::DeliveryState;
use crate::scene::{self, SceneNo, DEEP_OFF};
use crate::scripting::ScriptRunner;

/// Zone id addressing the whole installation.
pub const GLOBAL_ZONE: ZoneId = 0;

/// What the controller wants delivered in response to a local event.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerAction {
    CallScene {
        zone: ZoneId,
        group: DsGroup,
        scene: SceneNo,
        force: bool,
    },
    DimChannel {
        zone: ZoneId,
        group: DsGroup,
        channel: ChannelType,
        area: i8,
        mode: DimMode,
    },
    UndoScene {
        zone: ZoneId,
        group: DsGroup,
        scene: SceneNo,
    },
    SetChannelValue {
        zone: ZoneId,
        group: DsGroup,
        channel: ChannelType,
        area: i8,
        value: f64,
        transition_time: Duration,
    },
}

pub struct LocalController {
    pub zones: IndexMap<ZoneId, Zone>,
    pub triggers: Vec<Trigger>,
    pub runner: Box<dyn ScriptRunner>,
}

impl LocalController {
    pub fn new(runner: Box<dyn ScriptRunner>) -> Self {
        Self { zones: IndexMap::new(), triggers: Vec::new(), runner }
    }

    pub fn zone_mut(&mut self, zone_id: ZoneId) -> &mut Zone {
        self.zones
            .entry(zone_id)
            .or_insert_with(|| Zone::new(zone_id, format!("zone {zone_id}")))
    }

    pub fn device_added(&mut self, device: &Device) {
        self.zone_mut(device.zone_id).device_count += 1;
    }

    pub fn device_removed(&mut self, device: &Device) {
        if let Some(zone) = self.zones.get_mut(&device.zone_id) {
            zone.device_count = zone.device_count.saturating_sub(1);
        }
    }

    pub fn device_changes_zone(&mut self, from: ZoneId, to: ZoneId) {
        if let Some(zone) = self.zones.get_mut(&from) {
            zone.device_count = zone.device_count.saturating_sub(1);
        }
        self.zone_mut(to).device_count += 1;
    }

    /// Zone state bookkeeping, run for each device right before it applies
    /// a delivered notification. Also maintains per-device local priority
    /// for area scenes.
    pub fn device_will_apply_notification(&mut self, device: &mut Device, state: &DeliveryState) {
        let Some(zone) = self.zones.get_mut(&device.zone_id) else { return };
        let Some(group_mask) = device.output.as_ref().map(|o| o.group_mask()) else { return };
        match state.optimized_type {
            NotifyType::CallScene => {
                let scene_no = state.content_id;
                let area = scene::area_for_scene(scene_no) as usize;
                let is_off = scene::is_off_scene(scene_no);
                for group in DsGroup::ALL.into_iter().skip(1) {
                    if group_mask & (1 << group.number()) == 0 {
                        continue;
                    }
                    if is_off {
                        // off scenes (area or not) end local priority
                        if let Some(output) = device.output.as_mut() {
                            output.set_local_priority(false);
                        }
                    } else if area != 0 {
                        // area-on scene sets local priority on the device
                        device.set_local_priority(scene_no);
                    }
                    if scene::is_global_scene(scene_no) {
                        zone.state.last_global_scene = Some(scene_no);
                    }
                    if group == DsGroup::YellowLight {
                        zone.state.last_light_scene = Some(scene_no);
                        // an on scene counts as "dimmed up", so the next
                        // single-button dim goes down
                        zone.state.last_dim_channel = ChannelType::Default;
                        zone.state.last_dim = if is_off { DimMode::Down } else { DimMode::Up };
                    }
                    zone.state.set_state_for(group, area, !is_off);
                    if scene_no == DEEP_OFF {
                        for a in 1..=4 {
                            zone.state.set_state_for(group, a, false);
                        }
                    }
                }
                debug!(
                    zone = device.zone_id,
                    scene = scene_no,
                    light_on = ?zone.state.light_on,
                    "zone state updated"
                );
            }
            NotifyType::DimChannel | NotifyType::Retrigger => {
                if state.action_variant != DimMode::Stop {
                    zone.state.last_dim = state.action_variant;
                    zone.state.last_dim_channel =
                        ChannelType::try_from(state.action_param).unwrap_or(ChannelType::Default);
                }
            }
            NotifyType::None => {}
        }
    }

    /// Resolve a button click into controller actions.
    ///
    /// Returns `None` when the controller does not handle this button
    /// (app buttons, buttons in unknown zones) so the caller can forward
    /// it elsewhere.
    pub fn process_button_click(&mut self, button: &ButtonBehaviour, device_zone: ZoneId) -> Option<Vec<ControllerAction>> {
        let click = button.last_click();
        let mut group = button.settings.group;
        let mut channel = ChannelType::Default;
        let global = group == DsGroup::BlackVariable;
        let map = ButtonScenesMap::new(button.settings.func, global);
        let zone;
        let mut force = false;
        let mut undo = false;
        let mut do_dim = false;
        let mut scene_to_call: Option<SceneNo> = None;
        let mut direction = DimMode::Stop;

        if button.last_action_mode() != ActionMode::None {
            // direct action button
            scene_to_call = Some(button.last_action_id());
            zone = if global { GLOBAL_ZONE } else { device_zone };
            match button.last_action_mode() {
                ActionMode::Force => force = true,
                ActionMode::Undo => undo = true,
                _ => {}
            }
        } else {
            let click = click?;
            direction = match button.mode() {
                ButtonMode::Inactive => return Some(vec![]),
                ButtonMode::Standard | ButtonMode::Turbo => DimMode::Stop,
                ButtonMode::RockerDown => DimMode::Down,
                ButtonMode::RockerUp => DimMode::Up,
            };
            if button.settings.func == ButtonFunc::App {
                // app buttons are handled programmatically, not here
                return None;
            }
            if global {
                zone = GLOBAL_ZONE;
                group = DsGroup::Undefined;
                match click {
                    ClickType::Tip1x | ClickType::Click1x => {
                        scene_to_call = map.scene_for_clicks[1];
                    }
                    _ => return Some(vec![]),
                }
            } else {
                zone = device_zone;
                channel = button.settings.channel;
                let Some(zone_entry) = self.zones.get(&device_zone) else {
                    // button in a zone this controller does not manage
                    return None;
                };
                if group != DsGroup::YellowLight && group != DsGroup::GreyShadow {
                    // only light and shadow have local semantics for now
                    return Some(vec![]);
                }
                let area = map.area as usize;
                match click {
                    ClickType::HoldStart => {
                        if !zone_entry.state.state_for(group, area) {
                            if direction == DimMode::Up {
                                // holding the up key can dim from off
                                do_dim = true;
                            } else {
                                // long press while off: deep off
                                scene_to_call = Some(DEEP_OFF);
                            }
                        } else {
                            do_dim = true;
                        }
                        if do_dim && direction == DimMode::Stop {
                            // single button: reverse the last dim
                            direction = zone_entry.state.last_dim.inverse();
                        }
                    }
                    ClickType::HoldEnd => {
                        direction = DimMode::Stop;
                        do_dim = true;
                    }
                    _ => {
                        let scene_on_click = match click {
                            ClickType::Tip1x | ClickType::Click1x => map.scene_for_clicks[1],
                            ClickType::Tip2x | ClickType::Click2x => {
                                direction = DimMode::Up;
                                map.scene_for_clicks[2]
                            }
                            ClickType::Tip3x | ClickType::Click3x => {
                                direction = DimMode::Up;
                                map.scene_for_clicks[3]
                            }
                            ClickType::Tip4x => {
                                direction = DimMode::Up;
                                map.scene_for_clicks[4]
                            }
                            _ => return Some(vec![]),
                        };
                        if direction == DimMode::Stop {
                            // single button: on when off, off when on
                            direction = if zone_entry.state.state_for(group, area) {
                                DimMode::Down
                            } else {
                                DimMode::Up
                            };
                        }
                        scene_to_call = if direction == DimMode::Up {
                            scene_on_click
                        } else {
                            map.scene_for_clicks[0]
                        };
                    }
                }
            }
        }
        if let (Some(scene), false) = (scene_to_call, undo) {
            info!(zone, ?group, scene, "button resolves to scene call");
            return Some(vec![ControllerAction::CallScene { zone, group, scene, force }]);
        }
        if undo {
            let scene = scene_to_call?;
            return Some(vec![ControllerAction::UndoScene { zone, group, scene }]);
        }
        if do_dim {
            info!(zone, ?group, ?direction, "button resolves to dim");
            return Some(vec![ControllerAction::DimChannel {
                zone,
                group,
                channel,
                area: map.area as i8,
                mode: direction,
            }]);
        }
        Some(vec![])
    }

    /// Route a sensor change; dimmer-function sensors drive their channel
    /// in the configured scope.
    pub fn process_sensor_change(&mut self, sensor: &SensorBehaviour, device_zone: ZoneId, value: f64) -> Option<ControllerAction> {
        let mut zone = device_zone;
        let area = sensor.func.area() as i8;
        match sensor.func {
            SensorFunc::Standard | SensorFunc::App => return None,
            SensorFunc::DimmerGlobal => zone = GLOBAL_ZONE,
            SensorFunc::DimmerRoom
            | SensorFunc::DimmerArea1
            | SensorFunc::DimmerArea2
            | SensorFunc::DimmerArea3
            | SensorFunc::DimmerArea4 => {}
        }
        if sensor.sensor_type == SensorType::PercentSpeed {
            // signed speed: drive as dimming
            let mode = if value > 0.0 {
                DimMode::Up
            } else if value < 0.0 {
                DimMode::Down
            } else {
                DimMode::Stop
            };
            return Some(ControllerAction::DimChannel {
                zone,
                group: sensor.group,
                channel: sensor.channel,
                area,
                mode,
            });
        }
        let value = value.clamp(0.0, 100.0);
        // fast but not hammering: track the sensor's own push pacing
        let transition_time = sensor.min_push_interval.min(Duration::from_millis(500));
        Some(ControllerAction::SetChannelValue {
            zone,
            group: sensor.group,
            channel: sensor.channel,
            area,
            value,
            transition_time,
        })
    }

    /// Route a value source change into the triggers mapping it.
    pub fn process_value_source_change(&mut self, source_id: &str, value: Option<f64>, now: MonoTime) {
        for trigger in &mut self.triggers {
            if trigger.maps_source(source_id) {
                trigger.process_source_change(source_id, value, self.runner.as_mut(), now);
            }
        }
    }

    pub fn trigger_by_id(&mut self, id: u32) -> Option<&mut Trigger> {
        self.triggers.iter_mut().find(|t| t.id == id)
    }

    pub fn next_wakeup(&self) -> Option<MonoTime> {
        let mut at = None;
        for t in &self.triggers {
            at = earliest(at, t.next_wakeup());
        }
        at
    }

    pub fn tick(&mut self, now: MonoTime) {
        for trigger in &mut self.triggers {
            trigger.tick(now, self.runner.as_mut());
        }
    }

    /// Auto-stop timeout used for button dim operations routed upstream.
    pub fn dim_autostop(&self) -> Duration {
        DEFAULT_DIM_AUTOSTOP
    }
}

impl std::fmt::Debug for LocalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalController")
            .field("zones", &self.zones.len())
            .field("triggers", &self.triggers.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
