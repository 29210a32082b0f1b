// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;
use crate::dsuid::DSUID_NAMESPACE;

fn some_dsuid() -> DsUid {
    DsUid::from_name_in_space("frame-test", &DSUID_NAMESPACE)
}

#[test]
fn hello_request_round_trip() {
    let frame = RequestFrame {
        id: Some(1),
        call: MethodCall::Hello(HelloParams { api_version: 3, dsuid: some_dsuid() }),
    };
    let text = serde_json::to_string(&frame).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["method"], "hello");
    assert_eq!(value["params"]["api_version"], 3);
    assert!(value["params"]["dSUID"].is_string());
    let back: RequestFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(back, frame);
}

#[test]
fn call_scene_notification_parses_zone_group_addressing() {
    let text = json!({
        "method": "callScene",
        "params": { "zone_id": 1, "group": 1, "scene": 5, "force": false }
    })
    .to_string();
    let frame: RequestFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(frame.id, None);
    match frame.call {
        MethodCall::CallScene(p) => {
            assert_eq!(p.addressing.zone_id, Some(1));
            assert_eq!(p.addressing.group, Some(DsGroup::YellowLight));
            assert_eq!(p.scene, 5);
            assert!(!p.force);
            assert_eq!(p.transition_time, None);
        }
        other => panic!("expected callScene, got {other:?}"),
    }
}

#[test]
fn dim_channel_accepts_dsuid_array() {
    let a = some_dsuid();
    let b = some_dsuid().with_subdevice_index(1);
    let text = json!({
        "method": "dimChannel",
        "params": { "dSUID": [a.to_string(), b.to_string()], "mode": 1, "area": 0 }
    })
    .to_string();
    let frame: RequestFrame = serde_json::from_str(&text).unwrap();
    match frame.call {
        MethodCall::DimChannel(p) => {
            let targets = p.addressing.dsuid.unwrap().into_vec();
            assert_eq!(targets, vec![a, b]);
            assert_eq!(p.mode, DimMode::Up);
            assert!(p.auto_stop);
        }
        other => panic!("expected dimChannel, got {other:?}"),
    }
}

#[test]
fn bye_has_no_params() {
    let frame: RequestFrame = serde_json::from_str(r#"{"id":7,"method":"bye"}"#).unwrap();
    assert_eq!(frame.call, MethodCall::Bye);
    assert_eq!(frame.id, Some(7));
}

#[test]
fn extension_method_names_round_trip() {
    let call = MethodCall::CheckTriggerCondition(TriggerParams { trigger_id: 4, trigger_param: None });
    assert_eq!(call.method_name(), "x-p44-checkTriggerCondition");
    let text = serde_json::to_string(&RequestFrame { id: Some(2), call: call.clone() }).unwrap();
    let back: RequestFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(back.call, call);
}

#[test]
fn frame_discriminates_request_and_response() {
    let req: Frame = serde_json::from_str(r#"{"id":1,"method":"bye"}"#).unwrap();
    assert!(matches!(req, Frame::Request(_)));
    let resp: Frame =
        serde_json::from_str(r#"{"id":1,"result":{"dSUID":"00"}}"#).unwrap();
    assert!(matches!(resp, Frame::Response(_)));
    let err: Frame = serde_json::from_str(
        r#"{"id":2,"error":{"code":401,"message":"no vDC session","domain":"vdcapi"}}"#,
    )
    .unwrap();
    match err {
        Frame::Response(r) => assert_eq!(r.error.unwrap().code, 401),
        other => panic!("expected response, got {other:?}"),
    }
}

#[yare::parameterized(
    dim_up = { 1, DimMode::Up },
    dim_stop = { 0, DimMode::Stop },
    dim_down = { -1, DimMode::Down },
)]
fn dim_mode_wire_numbers(wire: i8, mode: DimMode) {
    let text = serde_json::to_string(&mode).unwrap();
    assert_eq!(text, wire.to_string());
    let back: DimMode = serde_json::from_str(&text).unwrap();
    assert_eq!(back, mode);
}
