// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use vdcapi::frames::DsGroup;

use super::*;
use crate::clock::MonoTime;
use crate::behaviour::button::{ButtonBehaviour, ButtonFunc, ButtonSettings};
use crate::behaviour::sensor::{SensorBehaviour, SensorType};
use crate::behaviour::{BinaryInputBehaviour, OutputBehaviour};
use crate::behaviour::binary_input::BinaryInputType;
use crate::test_support::{light_device, shade_device, test_dsuid, MockBackend};

fn ms(v: u64) -> MonoTime {
    MonoTime::from_millis(v)
}

#[test]
fn behaviour_ids_auto_derive_from_kind_and_index() {
    let mut device = light_device("ids");
    device.add_button(ButtonBehaviour::new("", 0, ButtonSettings::default()));
    device.add_button(ButtonBehaviour::new("", 0, ButtonSettings::default()));
    device.add_input(BinaryInputBehaviour::new("", 0, BinaryInputType::Motion));
    device.add_sensor(SensorBehaviour::new("", 0, SensorType::Temperature, -40.0, 80.0, 0.1));
    assert_eq!(device.buttons[0].id, "button0");
    assert_eq!(device.buttons[1].id, "button1");
    assert_eq!(device.buttons[1].index, 1);
    assert_eq!(device.inputs[0].id, "input0");
    assert_eq!(device.sensors[0].id, "sensor0");
}

#[test]
fn explicit_behaviour_ids_survive() {
    let mut device = light_device("ids2");
    device.add_button(ButtonBehaviour::new("up-key", 0, ButtonSettings::default()));
    assert_eq!(device.buttons[0].id, "up-key");
}

#[test]
fn dominant_color_class_prefers_output() {
    let device = shade_device("color");
    assert_eq!(device.dominant_color_class(), ColorClass::GreyShadow);

    let mut buttons_only = Device::new(test_dsuid("color2"), "color2");
    let settings = ButtonSettings { group: DsGroup::GreyShadow, ..ButtonSettings::default() };
    buttons_only.add_button(ButtonBehaviour::new("", 0, settings));
    assert_eq!(buttons_only.dominant_color_class(), ColorClass::GreyShadow);
}

#[test]
fn local_button_switch_drives_output_through_serializer() {
    let mut device = light_device("localbtn");
    let settings = ButtonSettings { func: ButtonFunc::Device, ..ButtonSettings::default() };
    let mut button = ButtonBehaviour::new("", 0, settings);
    button.supports_local_key_mode = true;
    device.add_button(button);

    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    // short press and release
    device.handle_button_input(0, true, &mut backend, ms(0), &mut effects);
    device.handle_button_input(0, false, &mut backend, ms(60), &mut effects);
    // drive machine timers until the local switch fires
    while let Some(at) = device.next_wakeup() {
        if at > ms(2000) {
            break;
        }
        device.tick(at, &mut backend, &mut effects);
    }
    assert_eq!(backend.apply_calls, 1);
    let brightness = device.output.as_ref().unwrap().channels()[0].value();
    assert_eq!(brightness, 100.0);
}

#[test]
fn shade_device_end_contact_reaches_sequencer() {
    let mut device = shade_device("shade-end");
    let mut backend = MockBackend::new();
    let mut effects = Vec::new();
    if let Some(output) = device.output.as_mut() {
        if let Some((seq, _, _)) = output.shadow_parts() {
            seq.set_device_params(true, Duration::from_millis(200), None, None, false);
            seq.set_move_times(50.0, 50.0, 1.0, 1.0);
            seq.set_reference(0.0, 0.0);
        }
        output.channel_by_index_mut(0).unwrap().set_value(100.0, Duration::ZERO, false);
    }
    device.request_applying_channels(None, false, &mut backend, ms(0), &mut effects);
    // movement command went to the backend
    assert_eq!(backend.movements, vec![1]);

    device.end_reached(true, &mut backend, MonoTime::from_millis(48_000), &mut effects);
    let seq = device.output.as_ref().unwrap().shadow_sequencer().unwrap();
    assert_eq!(seq.open_time(), 48.0);
    assert!(seq.is_idle());
}

#[test]
fn device_next_wakeup_aggregates_components() {
    let mut device = light_device("wakeups");
    assert!(device.next_wakeup().is_none());
    let mut backend = MockBackend::pending();
    let mut effects = Vec::new();
    if let Some(output) = device.output.as_mut() {
        output.channel_by_index_mut(0).unwrap().set_value(10.0, Duration::ZERO, false);
    }
    device.request_applying_channels(None, false, &mut backend, ms(0), &mut effects);
    // serializer watchdog is pending
    assert_eq!(device.next_wakeup(), Some(ms(20_000)));
}
