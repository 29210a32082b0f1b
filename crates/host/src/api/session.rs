// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-side method dispatch of the vDC API.
//!
//! `hello` negotiates the API version and opens the single session; every
//! other method requires it. Device-targeted methods build an audience
//! and hand over to the router. Failed methods answer with an error body;
//! failed notifications only log.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};
use vdcapi::frames::{Frame, MethodCall, RequestFrame, ResponseFrame};
use vdcapi::version::version_acceptable;
use vdcapi::ApiError;

use crate::clock::MonoTime;
use crate::device::{DEFAULT_DIM_AUTOSTOP, EMERGENCY_DIM_AUTOSTOP};
use crate::error::{HostError, HostResult};
use crate::host::{Outgoing, VdcHost};
use crate::props;
use crate::router::NotificationIntent;

/// Handle one frame read from a connection.
pub fn handle_frame(host: &mut VdcHost, connection_id: u64, frame: Frame, now: MonoTime) {
    match frame {
        Frame::Response(response) => host.handle_response(&response, now),
        Frame::Request(request) => handle_request(host, connection_id, request, now),
    }
}

/// A connection closed; a session bound to it ends (announcements reset,
/// devices stay alive).
pub fn connection_closed(host: &mut VdcHost, connection_id: u64) {
    if host.session().is_some_and(|s| s.connection_id == connection_id) {
        warn!("session connection closed");
        host.session_ended();
    }
}

fn respond(host: &mut VdcHost, connection_id: u64, id: Option<u64>, result: HostResult<serde_json::Value>) {
    match &result {
        Ok(_) => {}
        Err(err) => warn!(%err, "method failed"),
    }
    let Some(id) = id else { return };
    let frame = match result {
        Ok(value) => ResponseFrame::ok(id, value),
        Err(err) => ResponseFrame::err(id, err.to_error_body()),
    };
    host.outbox.push(Outgoing::Frame { connection_id, frame: Frame::Response(frame) });
}

fn handle_request(host: &mut VdcHost, connection_id: u64, request: RequestFrame, now: MonoTime) {
    let id = request.id;
    debug!(method = request.call.method_name(), ?id, "api request");
    // session management first
    match &request.call {
        MethodCall::Hello(params) => {
            if !version_acceptable(params.api_version, 0) {
                respond(
                    host,
                    connection_id,
                    id,
                    Err(HostError::api(
                        ApiError::VersionMismatch,
                        format!("incompatible vDC API version {}", params.api_version),
                    )),
                );
                return;
            }
            host.session_started(connection_id, params.dsuid, params.api_version, now);
            let dsuid = host.dsuid;
            respond(host, connection_id, id, Ok(json!({ "dSUID": dsuid.to_string() })));
            return;
        }
        MethodCall::Bye => {
            host.session_ended();
            respond(host, connection_id, id, Ok(serde_json::Value::Null));
            return;
        }
        _ => {}
    }
    if host.session().is_none() {
        respond(
            host,
            connection_id,
            id,
            Err(HostError::api(ApiError::NoSession, "no vDC session - cannot call method")),
        );
        return;
    }
    let result = dispatch(host, request.call, now);
    respond(host, connection_id, id, result);
}

fn dispatch(host: &mut VdcHost, call: MethodCall, now: MonoTime) -> HostResult<serde_json::Value> {
    match call {
        MethodCall::CallScene(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(
                audience,
                NotificationIntent::CallScene {
                    scene: p.scene,
                    force: p.force,
                    transition_override: p.transition_time.map(Duration::from_secs_f64),
                },
                now,
            );
            Ok(serde_json::Value::Null)
        }
        MethodCall::DimChannel(p) => {
            if p.dim_per_ms.is_some_and(|r| r < 0.0) {
                return Err(HostError::api(ApiError::InvalidParams, "dimPerMS must not be negative"));
            }
            let audience = host.build_audience(&p.addressing)?;
            let autostop_after =
                if p.auto_stop { DEFAULT_DIM_AUTOSTOP } else { EMERGENCY_DIM_AUTOSTOP };
            host.deliver_to_audience(
                audience,
                NotificationIntent::DimChannel {
                    mode: p.mode,
                    channel: p.channel,
                    channel_id: p.channel_id,
                    area: p.area,
                    autostop_after,
                    dim_per_ms_override: p.dim_per_ms,
                },
                now,
            );
            Ok(serde_json::Value::Null)
        }
        MethodCall::SaveScene(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(audience, NotificationIntent::SaveScene { scene: p.scene }, now);
            Ok(serde_json::Value::Null)
        }
        MethodCall::UndoScene(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(audience, NotificationIntent::UndoScene { scene: p.scene }, now);
            Ok(serde_json::Value::Null)
        }
        MethodCall::CallSceneMin(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(audience, NotificationIntent::CallSceneMin { scene: p.scene }, now);
            Ok(serde_json::Value::Null)
        }
        MethodCall::SetLocalPriority(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(
                audience,
                NotificationIntent::SetLocalPriority { scene: p.scene },
                now,
            );
            Ok(serde_json::Value::Null)
        }
        MethodCall::SetControlValue(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(
                audience,
                NotificationIntent::SetControlValue { name: p.name, value: p.value },
                now,
            );
            Ok(serde_json::Value::Null)
        }
        MethodCall::SetOutputChannelValue(p) => {
            let audience = host.build_audience(&p.addressing)?;
            host.deliver_to_audience(
                audience,
                NotificationIntent::SetOutputChannelValue {
                    channel: p.channel,
                    channel_id: p.channel_id,
                    value: p.value,
                    transition_time: p.transition_time.map(Duration::from_secs_f64),
                },
                now,
            );
            Ok(serde_json::Value::Null)
        }
        MethodCall::Remove(p) => {
            if host.remove_device(&p.dsuid, true) {
                Ok(serde_json::Value::Null)
            } else {
                Err(HostError::api(ApiError::UnknownTarget, format!("unknown dSUID {}", p.dsuid)))
            }
        }
        MethodCall::GetProperty(p) => {
            let tree = if p.dsuid == host.dsuid {
                props::host_properties(host)
            } else if let Some(vdc) = host.vdcs.get(&p.dsuid) {
                props::vdc_properties(vdc)
            } else if let Some(device) = host.device(&p.dsuid) {
                props::device_properties(device)
            } else {
                return Err(HostError::api(
                    ApiError::UnknownTarget,
                    format!("unknown dSUID {}", p.dsuid),
                ));
            };
            Ok(props::filter_by_query(&tree, &p.query))
        }
        MethodCall::SetProperty(p) => {
            if host.device(&p.dsuid).is_none() {
                return Err(HostError::api(
                    ApiError::UnknownTarget,
                    format!("unknown dSUID {}", p.dsuid),
                ));
            }
            // zone moves go through the host so controller bookkeeping
            // stays consistent
            if let Some(zone) = p.properties.get("zoneID").and_then(|v| v.as_u64()) {
                host.device_set_zone(&p.dsuid, zone.min(u64::from(u16::MAX)) as u16);
            }
            let mut changed = Vec::new();
            {
                let Some(device) = host.device_mut(&p.dsuid) else {
                    return Err(HostError::api(ApiError::UnknownTarget, "device vanished".to_owned()));
                };
                let mut remaining = p.properties.clone();
                if let Some(obj) = remaining.as_object_mut() {
                    obj.remove("zoneID");
                }
                changed.extend(props::set_device_properties(device, &remaining));
            }
            Ok(json!({ "changed": changed }))
        }
        MethodCall::ScriptExec(p) => {
            let source = p.source.unwrap_or_else(|| "scriptExec".to_owned());
            match host.controller.runner.run(&source, &p.script) {
                Ok(value) => Ok(json!({ "result": value })),
                Err(err) => Err(HostError::Script(err)),
            }
        }
        MethodCall::QueryScenes(p) => {
            let device = host
                .device(&p.dsuid)
                .ok_or_else(|| HostError::api(ApiError::UnknownTarget, format!("unknown dSUID {}", p.dsuid)))?;
            let scenes: Vec<u8> = device
                .scenes
                .as_ref()
                .map(|t| t.configured_scenes())
                .unwrap_or_default();
            Ok(json!({ "scenes": scenes }))
        }
        MethodCall::QueryGroups(p) => {
            let zone = p.zone_id.unwrap_or(0);
            let mut groups: Vec<u8> = Vec::new();
            for vdc in host.vdcs.values() {
                for device in vdc.devices.values() {
                    if zone != 0 && device.zone_id != zone {
                        continue;
                    }
                    if let Some(output) = &device.output {
                        for g in vdcapi::frames::DsGroup::ALL.into_iter().skip(1) {
                            if output.is_member(g) && !groups.contains(&g.number()) {
                                groups.push(g.number());
                            }
                        }
                    }
                }
            }
            groups.sort_unstable();
            Ok(json!({ "groups": groups }))
        }
        MethodCall::CheckTriggerCondition(p) => {
            // bind fresh source values so the check stands on its own
            host.refresh_trigger_vars(p.trigger_id);
            let controller = &mut host.controller;
            let runner = controller.runner.as_mut();
            let trigger = controller
                .triggers
                .iter_mut()
                .find(|t| t.id == p.trigger_id)
                .ok_or_else(|| HostError::api(ApiError::UnknownTarget, format!("no trigger {}", p.trigger_id)))?;
            let result = trigger.evaluate(runner, now);
            Ok(json!({ "condition": result }))
        }
        MethodCall::TestTriggerAction(p) => {
            let controller = &mut host.controller;
            let runner = controller.runner.as_mut();
            let trigger = controller
                .triggers
                .iter_mut()
                .find(|t| t.id == p.trigger_id)
                .ok_or_else(|| HostError::api(ApiError::UnknownTarget, format!("no trigger {}", p.trigger_id)))?;
            trigger.test_action(runner, now);
            Ok(serde_json::Value::Null)
        }
        MethodCall::SetIdentity(p) => {
            if let Some(name) = p.name {
                info!(%name, "host renamed");
                host.name = name;
            }
            if let Some(dsuid) = p.dsuid {
                info!(%dsuid, "host identity externally assigned");
                host.dsuid = dsuid;
            }
            Ok(serde_json::Value::Null)
        }
        // host-originated methods have no meaning as requests to us
        MethodCall::Hello(_)
        | MethodCall::Bye
        | MethodCall::AnnounceVdc(_)
        | MethodCall::AnnounceDevice(_)
        | MethodCall::PushNotification(_) => {
            Err(HostError::api(ApiError::InvalidParams, "method not addressable here"))
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
