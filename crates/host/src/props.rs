// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative property access for the north-bound API.
//!
//! Instead of hand-written descriptor indexes, each entity exposes a table
//! of named properties with getters (and setters for the writable ones)
//! and recurses through its children. Queries are JSON objects whose keys
//! select properties; a null value selects the whole subtree.

use serde_json::{json, Map, Value};

use crate::device::Device;
use crate::host::VdcHost;
use crate::vdc::Vdc;

/// Read a device's full property subtree.
pub fn device_properties(device: &Device) -> Value {
    let mut props = Map::new();
    props.insert("dSUID".into(), json!(device.dsuid.to_string()));
    props.insert("name".into(), json!(device.name));
    props.insert("zoneID".into(), json!(device.zone_id));
    props.insert("model".into(), json!("vdc device"));
    if let Some(output) = &device.output {
        let channels: Map<String, Value> = output
            .channels()
            .iter()
            .map(|c| {
                (
                    c.id().to_owned(),
                    json!({
                        "channelType": c.channel_type().number(),
                        "min": c.min(),
                        "max": c.max(),
                        "resolution": c.resolution(),
                        "value": c.value(),
                    }),
                )
            })
            .collect();
        props.insert("channelStates".into(), Value::Object(channels));
        props.insert("localPriority".into(), json!(output.has_local_priority()));
    }
    if !device.buttons.is_empty() {
        let buttons: Map<String, Value> = device
            .buttons
            .iter()
            .map(|b| {
                (
                    b.id.clone(),
                    json!({
                        "group": b.settings.group.number(),
                        "clickType": b.last_click().map(|c| c.number()),
                    }),
                )
            })
            .collect();
        props.insert("buttonInputStates".into(), Value::Object(buttons));
    }
    if !device.sensors.is_empty() {
        let sensors: Map<String, Value> = device
            .sensors
            .iter()
            .map(|s| (s.id.clone(), json!({ "value": s.current_value() })))
            .collect();
        props.insert("sensorStates".into(), Value::Object(sensors));
    }
    if !device.inputs.is_empty() {
        let inputs: Map<String, Value> = device
            .inputs
            .iter()
            .map(|i| (i.id.clone(), json!({ "value": i.state() })))
            .collect();
        props.insert("binaryInputStates".into(), Value::Object(inputs));
    }
    Value::Object(props)
}

/// Read a vdc's property subtree (devices as dSUID list).
pub fn vdc_properties(vdc: &Vdc) -> Value {
    json!({
        "dSUID": vdc.dsuid.to_string(),
        "name": vdc.name,
        "model": vdc.backend.model_name(),
        "devices": vdc.devices.keys().map(|d| d.to_string()).collect::<Vec<_>>(),
    })
}

/// Read the host root subtree.
pub fn host_properties(host: &VdcHost) -> Value {
    json!({
        "dSUID": host.dsuid.to_string(),
        "name": host.name,
        "model": "vDC host",
        "vdcs": host.vdcs.keys().map(|d| d.to_string()).collect::<Vec<_>>(),
    })
}

/// Filter a property subtree by a query: an object whose keys select
/// properties, with null (or empty object) meaning "everything below".
pub fn filter_by_query(tree: &Value, query: &Value) -> Value {
    match query {
        Value::Null => tree.clone(),
        Value::Object(fields) if fields.is_empty() => tree.clone(),
        Value::Object(fields) => {
            let mut out = Map::new();
            if let Value::Object(props) = tree {
                for (key, sub_query) in fields {
                    if let Some(sub_tree) = props.get(key) {
                        out.insert(key.clone(), filter_by_query(sub_tree, sub_query));
                    }
                }
            }
            Value::Object(out)
        }
        _ => tree.clone(),
    }
}

/// Apply writable properties to a device. Returns the names actually
/// changed; unknown or read-only names are ignored.
pub fn set_device_properties(device: &mut Device, properties: &Value) -> Vec<String> {
    let mut changed = Vec::new();
    let Value::Object(fields) = properties else { return changed };
    for (key, value) in fields {
        match key.as_str() {
            "name" => {
                if let Some(name) = value.as_str() {
                    device.name = name.to_owned();
                    changed.push(key.clone());
                }
            }
            "zoneID" => {
                if let Some(zone) = value.as_u64() {
                    device.zone_id = zone.min(u64::from(u16::MAX)) as u16;
                    changed.push(key.clone());
                }
            }
            _ => {}
        }
    }
    changed
}
