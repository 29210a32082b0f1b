// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use vdcapi::frames::{ChannelType, DimMode, DsGroup};

use super::*;
use crate::behaviour::button::{ButtonBehaviour, ButtonSettings, ClickType, StateMachineMode};
use crate::behaviour::sensor::{SensorBehaviour, SensorFunc};
use crate::device::NotifyType;
use crate::router::DeliveryState;
use crate::scene::{SceneNo, DEEP_OFF, PRESET_2, ROOM_OFF, ROOM_ON};
use crate::scripting::NullRunner;
use crate::test_support::light_device;

fn controller() -> LocalController {
    LocalController::new(Box::new(NullRunner))
}

fn scene_delivery(scene: SceneNo) -> DeliveryState {
    let mut state = DeliveryState::new(1, NotifyType::CallScene);
    state.content_id = scene;
    state
}

fn dim_delivery(mode: DimMode, channel: ChannelType) -> DeliveryState {
    let mut state = DeliveryState::new(1, NotifyType::DimChannel);
    state.action_variant = mode;
    state.action_param = channel.number();
    state
}

/// A standard room button that already produced the given click.
fn clicked_button(click: ClickType) -> ButtonBehaviour {
    let mut button = ButtonBehaviour::new("button0", 0, ButtonSettings::default());
    // drive the machine far enough to record the click artificially:
    // inject keeps last_click bookkeeping without the full machine
    let _ = button.inject_click(click, crate::clock::MonoTime::from_millis(1), Default::default());
    button
}

#[test]
fn scene_apply_updates_zone_light_state() {
    let mut ctl = controller();
    let mut device = light_device("zone-light");
    device.zone_id = 1;
    ctl.device_added(&device);

    ctl.device_will_apply_notification(&mut device, &scene_delivery(PRESET_2));
    let zone = &ctl.zones[&1];
    assert!(zone.state.light_on[0]);
    assert_eq!(zone.state.last_light_scene, Some(PRESET_2));
    assert_eq!(zone.state.last_dim, DimMode::Up);

    ctl.device_will_apply_notification(&mut device, &scene_delivery(ROOM_OFF));
    let zone = &ctl.zones[&1];
    assert!(!zone.state.light_on[0]);
    assert_eq!(zone.state.last_dim, DimMode::Down);
}

#[test]
fn deep_off_clears_all_areas() {
    let mut ctl = controller();
    let mut device = light_device("zone-deepoff");
    device.zone_id = 1;
    ctl.device_added(&device);
    {
        let zone = ctl.zone_mut(1);
        zone.state.set_state_for(DsGroup::YellowLight, 2, true);
        zone.state.set_state_for(DsGroup::YellowLight, 4, true);
    }
    ctl.device_will_apply_notification(&mut device, &scene_delivery(DEEP_OFF));
    let zone = &ctl.zones[&1];
    assert_eq!(zone.state.light_on, [false; 5]);
}

#[test]
fn dim_apply_records_direction_and_channel() {
    let mut ctl = controller();
    let mut device = light_device("zone-dim");
    device.zone_id = 1;
    ctl.device_added(&device);
    ctl.device_will_apply_notification(&mut device, &dim_delivery(DimMode::Up, ChannelType::Brightness));
    let zone = &ctl.zones[&1];
    assert_eq!(zone.state.last_dim, DimMode::Up);
    assert_eq!(zone.state.last_dim_channel, ChannelType::Brightness);
    // a stop does not overwrite the recorded direction
    ctl.device_will_apply_notification(&mut device, &dim_delivery(DimMode::Stop, ChannelType::Brightness));
    assert_eq!(ctl.zones[&1].state.last_dim, DimMode::Up);
}

#[test]
fn single_click_calls_preset_when_zone_off() {
    let mut ctl = controller();
    ctl.zone_mut(1);
    let button = clicked_button(ClickType::Tip1x);
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::CallScene {
            zone: 1,
            group: DsGroup::YellowLight,
            scene: ROOM_ON,
            force: false
        }]
    );
}

#[test]
fn single_click_calls_off_when_zone_on() {
    let mut ctl = controller();
    ctl.zone_mut(1).state.set_state_for(DsGroup::YellowLight, 0, true);
    let button = clicked_button(ClickType::Click1x);
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::CallScene {
            zone: 1,
            group: DsGroup::YellowLight,
            scene: ROOM_OFF,
            force: false
        }]
    );
}

#[test]
fn double_click_always_calls_preset() {
    let mut ctl = controller();
    ctl.zone_mut(1).state.set_state_for(DsGroup::YellowLight, 0, true);
    let button = clicked_button(ClickType::Tip2x);
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::CallScene {
            zone: 1,
            group: DsGroup::YellowLight,
            scene: PRESET_2,
            force: false
        }]
    );
}

#[test]
fn hold_dims_opposite_of_last_direction() {
    let mut ctl = controller();
    {
        let zone = ctl.zone_mut(1);
        zone.state.set_state_for(DsGroup::YellowLight, 0, true);
        zone.state.last_dim = DimMode::Up;
    }
    let button = clicked_button(ClickType::HoldStart);
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::DimChannel {
            zone: 1,
            group: DsGroup::YellowLight,
            channel: ChannelType::Default,
            area: 0,
            mode: DimMode::Down
        }]
    );
}

#[test]
fn hold_while_off_without_up_key_calls_deep_off() {
    let mut ctl = controller();
    ctl.zone_mut(1);
    let button = clicked_button(ClickType::HoldStart);
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::CallScene {
            zone: 1,
            group: DsGroup::YellowLight,
            scene: DEEP_OFF,
            force: false
        }]
    );
}

#[test]
fn rocker_up_hold_dims_up_from_off() {
    let mut ctl = controller();
    ctl.zone_mut(1);
    let settings = ButtonSettings {
        mode: crate::behaviour::button::ButtonMode::RockerUp,
        state_machine_mode: StateMachineMode::Dimmer,
        ..ButtonSettings::default()
    };
    let mut button = ButtonBehaviour::new("button0", 0, settings);
    let _ = button.inject_click(ClickType::HoldStart, crate::clock::MonoTime::from_millis(1), Default::default());
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::DimChannel {
            zone: 1,
            group: DsGroup::YellowLight,
            channel: ChannelType::Default,
            area: 0,
            mode: DimMode::Up
        }]
    );
}

#[test]
fn hold_end_stops_dimming() {
    let mut ctl = controller();
    ctl.zone_mut(1).state.set_state_for(DsGroup::YellowLight, 0, true);
    let mut button = clicked_button(ClickType::HoldStart);
    let _ = button.inject_click(ClickType::HoldEnd, crate::clock::MonoTime::from_millis(100), Default::default());
    let actions = ctl.process_button_click(&button, 1).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::DimChannel {
            zone: 1,
            group: DsGroup::YellowLight,
            channel: ChannelType::Default,
            area: 0,
            mode: DimMode::Stop
        }]
    );
}

#[test]
fn global_panic_button_calls_panic() {
    let mut ctl = controller();
    let settings = ButtonSettings {
        group: DsGroup::BlackVariable,
        func: crate::behaviour::button::ButtonFunc::Panic,
        ..ButtonSettings::default()
    };
    let mut button = ButtonBehaviour::new("button0", 0, settings);
    let _ = button.inject_click(ClickType::Tip1x, crate::clock::MonoTime::from_millis(1), Default::default());
    let actions = ctl.process_button_click(&button, 7).unwrap();
    assert_eq!(
        actions,
        vec![ControllerAction::CallScene {
            zone: GLOBAL_ZONE,
            group: DsGroup::Undefined,
            scene: crate::scene::PANIC,
            force: false
        }]
    );
}

#[test]
fn app_buttons_are_not_handled() {
    let mut ctl = controller();
    ctl.zone_mut(1);
    let settings = ButtonSettings {
        func: crate::behaviour::button::ButtonFunc::App,
        ..ButtonSettings::default()
    };
    let mut button = ButtonBehaviour::new("button0", 0, settings);
    let _ = button.inject_click(ClickType::Tip1x, crate::clock::MonoTime::from_millis(1), Default::default());
    assert!(ctl.process_button_click(&button, 1).is_none());
}

#[test]
fn button_in_unknown_zone_is_not_handled() {
    let mut ctl = controller();
    let button = clicked_button(ClickType::Tip1x);
    assert!(ctl.process_button_click(&button, 99).is_none());
}

#[test]
fn dimmer_sensor_routes_channel_value() {
    let mut ctl = controller();
    let mut sensor = SensorBehaviour::new("sensor0", 0, crate::behaviour::sensor::SensorType::Generic, 0.0, 100.0, 0.5);
    sensor.func = SensorFunc::DimmerRoom;
    sensor.group = DsGroup::YellowLight;
    sensor.channel = ChannelType::Brightness;
    let action = ctl.process_sensor_change(&sensor, 3, 55.0).unwrap();
    match action {
        ControllerAction::SetChannelValue { zone, group, channel, area, value, .. } => {
            assert_eq!(zone, 3);
            assert_eq!(group, DsGroup::YellowLight);
            assert_eq!(channel, ChannelType::Brightness);
            assert_eq!(area, 0);
            assert_eq!(value, 55.0);
        }
        other => panic!("expected channel value routing, got {other:?}"),
    }
}

#[test]
fn standard_sensor_not_routed() {
    let mut ctl = controller();
    let sensor = SensorBehaviour::new("sensor0", 0, crate::behaviour::sensor::SensorType::Temperature, -40.0, 80.0, 0.1);
    assert!(ctl.process_sensor_change(&sensor, 1, 21.5).is_none());
}

#[test]
fn global_dimmer_sensor_targets_all_zones() {
    let mut ctl = controller();
    let mut sensor = SensorBehaviour::new("sensor0", 0, crate::behaviour::sensor::SensorType::Generic, 0.0, 100.0, 0.5);
    sensor.func = SensorFunc::DimmerGlobal;
    let action = ctl.process_sensor_change(&sensor, 3, 20.0).unwrap();
    match action {
        ControllerAction::SetChannelValue { zone, .. } => assert_eq!(zone, GLOBAL_ZONE),
        other => panic!("expected channel value routing, got {other:?}"),
    }
}
