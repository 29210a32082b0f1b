// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use vdcapi::frames::{Frame, MethodCall, ResponseFrame};

use vdcapi::DsUid;

use super::*;
use crate::clock::MonoTime;
use crate::persist::ParamStore;
use crate::scripting::NullRunner;
use crate::test_support::{light_device, test_dsuid, MockBackend};
use crate::vdc::Vdc;

fn ms(v: u64) -> MonoTime {
    MonoTime::from_millis(v)
}

fn host_with_vdc() -> (VdcHost, DsUid) {
    let mut host = VdcHost::new(
        test_dsuid("host"),
        "test host",
        ParamStore::in_memory(),
        Box::new(NullRunner),
    );
    let vdc = Vdc::new(&host.dsuid, 0, "mock", Box::new(MockBackend::new()));
    let vdc_dsuid = host.add_vdc(vdc);
    (host, vdc_dsuid)
}

fn sent_calls(host: &VdcHost) -> Vec<&'static str> {
    host.outbox
        .iter()
        .map(|Outgoing::Frame { frame, .. }| match frame {
            Frame::Request(r) => r.call.method_name(),
            Frame::Response(_) => "response",
        })
        .collect()
}

#[test]
fn duplicate_add_device_is_idempotent() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    let device = light_device("dup");
    assert!(host.add_device(&vdc_dsuid, device).unwrap());
    let again = light_device("dup");
    assert!(!host.add_device(&vdc_dsuid, again).unwrap());
    assert_eq!(host.total_devices(), 1);
}

#[test]
fn announcement_sequence_vdc_then_devices() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    host.add_device(&vdc_dsuid, light_device("announce-me")).unwrap();

    host.session_started(1, test_dsuid("vdsm"), 3, ms(0));
    assert!(host.next_wakeup().is_some());
    host.tick(ms(600));
    assert_eq!(sent_calls(&host), vec!["announcevdc"]);

    // acknowledge the vdc announcement
    let id = match &host.outbox[0] {
        Outgoing::Frame { frame: Frame::Request(r), .. } => r.id.unwrap(),
        other => panic!("expected request, got {other:?}"),
    };
    host.outbox.clear();
    host.handle_response(&ResponseFrame::ok(id, serde_json::Value::Null), ms(700));
    assert!(host.vdcs[&vdc_dsuid].announced_at.is_some());

    // next step announces the device
    host.tick(ms(1500));
    assert_eq!(sent_calls(&host), vec!["announcedevice"]);
    let id = match &host.outbox[0] {
        Outgoing::Frame { frame: Frame::Request(r), .. } => r.id.unwrap(),
        other => panic!("expected request, got {other:?}"),
    };
    host.outbox.clear();
    host.handle_response(&ResponseFrame::ok(id, serde_json::Value::Null), ms(1600));
    let device_dsuid = test_dsuid("announce-me");
    assert!(host.device(&device_dsuid).unwrap().announced_at.is_some());

    // everything announced: announcer goes quiet
    host.tick(ms(2500));
    assert!(sent_calls(&host).is_empty());
}

#[test]
fn unacknowledged_announcement_retries_after_timeout() {
    let (mut host, _) = host_with_vdc();
    host.session_started(1, test_dsuid("vdsm"), 3, ms(0));
    host.tick(ms(600));
    assert_eq!(sent_calls(&host), vec!["announcevdc"]);
    host.outbox.clear();
    // no ack arrives; announce timeout passes but per-target backoff
    // prevents an immediate re-announce
    host.tick(ms(31_000));
    assert!(sent_calls(&host).is_empty());
    // after the per-target retry timeout the vdc is announced again
    host.session_ended();
    host.session_started(1, test_dsuid("vdsm"), 3, ms(320_000));
    host.tick(ms(321_000));
    assert_eq!(sent_calls(&host), vec!["announcevdc"]);
}

#[test]
fn session_end_resets_announcements() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    host.session_started(1, test_dsuid("vdsm"), 3, ms(0));
    host.tick(ms(600));
    let id = match &host.outbox[0] {
        Outgoing::Frame { frame: Frame::Request(r), .. } => r.id.unwrap(),
        other => panic!("expected request, got {other:?}"),
    };
    host.handle_response(&ResponseFrame::ok(id, serde_json::Value::Null), ms(700));
    assert!(host.vdcs[&vdc_dsuid].announced_at.is_some());

    host.session_ended();
    assert!(host.vdcs[&vdc_dsuid].announced_at.is_none());
    assert!(host.session().is_none());
}

#[test]
fn push_property_needs_session() {
    let (mut host, _) = host_with_vdc();
    let dsuid = test_dsuid("push");
    host.push_property(&dsuid, serde_json::json!({ "x": 1 }));
    assert!(host.outbox.is_empty());
    host.session_started(1, test_dsuid("vdsm"), 3, ms(0));
    host.push_property(&dsuid, serde_json::json!({ "x": 1 }));
    assert_eq!(sent_calls(&host), vec!["pushNotification"]);
}

#[test]
fn remove_device_with_forget_drops_settings() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    let mut device = light_device("removeme");
    device.zone_id = 2;
    let dsuid = device.dsuid;
    host.add_device(&vdc_dsuid, device).unwrap();
    host.save_all_settings();
    assert!(host.remove_device(&dsuid, true));
    assert!(!host.device_exists(&dsuid));
    // settings are gone: a fresh device loads defaults
    let mut fresh = light_device("removeme");
    fresh.load_settings(&host.store).unwrap();
    assert_eq!(fresh.zone_id, 0);
}

#[test]
fn zone_moves_update_controller_counts() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    let mut device = light_device("mover");
    device.zone_id = 1;
    let dsuid = device.dsuid;
    host.add_device(&vdc_dsuid, device).unwrap();
    assert_eq!(host.controller.zones[&1].device_count, 1);
    host.device_set_zone(&dsuid, 2);
    assert_eq!(host.controller.zones[&1].device_count, 0);
    assert_eq!(host.controller.zones[&2].device_count, 1);
}

#[test]
fn mixed_addressing_prefers_dsuid() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    let device = light_device("addr");
    let dsuid = device.dsuid;
    host.add_device(&vdc_dsuid, device).unwrap();
    let addressing = vdcapi::frames::Addressing {
        dsuid: Some(vdcapi::frames::OneOrMany::One(dsuid)),
        zone_id: Some(42),
        ..Default::default()
    };
    let audience = host.build_audience(&addressing).unwrap();
    assert_eq!(audience.groups[0].1, vec![dsuid]);
}

#[test]
fn value_sources_cover_all_behaviours() {
    let (mut host, vdc_dsuid) = host_with_vdc();
    let mut device = crate::test_support::light_with_button("sources");
    device.add_sensor(crate::behaviour::sensor::SensorBehaviour::new(
        "",
        0,
        crate::behaviour::sensor::SensorType::Temperature,
        -40.0,
        80.0,
        0.1,
    ));
    let dsuid = device.dsuid;
    host.add_device(&vdc_dsuid, device).unwrap();
    let sources = host.value_sources();
    // one button, one sensor, one brightness channel
    assert_eq!(sources.len(), 3);
    assert!(sources.iter().any(|s| s.id == format!("{dsuid}_B0")));
    assert!(sources.iter().any(|s| s.id == format!("{dsuid}_S0")));
    assert!(sources.iter().any(|s| s.id == format!("{dsuid}_Cbrightness")));
    // fresh sources have no value yet, except channels
    let sensor = sources.iter().find(|s| s.id.ends_with("_S0")).unwrap();
    assert_eq!(sensor.value, None);
}

#[test]
fn refresh_trigger_vars_resolves_channel_sources() {
    use std::sync::{Arc, Mutex};

    use crate::controller::{Trigger, VarDef};
    use crate::test_support::{SharedRunner, TestRunner};

    let log = Arc::new(Mutex::new(TestRunner::default()));
    let mut host = VdcHost::new(
        test_dsuid("trigger-host"),
        "trigger host",
        ParamStore::in_memory(),
        Box::new(SharedRunner { log: log.clone() }),
    );
    let vdc = Vdc::new(&host.dsuid, 0, "mock", Box::new(MockBackend::new()));
    let vdc_dsuid = host.add_vdc(vdc);
    let device = light_device("trigger-light");
    let dsuid = device.dsuid;
    host.add_device(&vdc_dsuid, device).unwrap();
    if let Some(device) = host.device_mut(&dsuid) {
        let output = device.output.as_mut().unwrap();
        let ch = output.channel_by_index_mut(0).unwrap();
        ch.set_value(40.0, std::time::Duration::ZERO, false);
        ch.value_applied(false);
    }

    let mut trigger = Trigger::new(7, "brightness watch");
    trigger.var_defs = VarDef::parse_defs(&format!("bri:{dsuid}_Cbrightness"));
    host.controller.triggers.push(trigger);

    host.refresh_trigger_vars(7);
    let vars = log.lock().unwrap().vars.clone();
    assert_eq!(vars, vec![("trigger_7".to_owned(), "bri".to_owned(), Some(40.0))]);
}

#[test]
fn main_script_round_trips_through_store() {
    let (mut host, _) = host_with_vdc();
    assert!(host.main_script().is_none());
    host.set_main_script("log('hello')");
    assert_eq!(host.main_script().as_deref(), Some("log('hello')"));
}

#[test]
fn outgoing_calls_well_formed() {
    let (mut host, _) = host_with_vdc();
    host.session_started(9, test_dsuid("vdsm"), 3, ms(0));
    host.push_property(&test_dsuid("dev"), serde_json::json!({ "y": 2 }));
    match &host.outbox[0] {
        Outgoing::Frame { connection_id, frame: Frame::Request(r) } => {
            assert_eq!(*connection_id, 9);
            assert!(r.id.is_none());
            assert!(matches!(r.call, MethodCall::PushNotification(_)));
        }
        other => panic!("unexpected outgoing {other:?}"),
    }
}
