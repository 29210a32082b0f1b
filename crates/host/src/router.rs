// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification routing: audience building and the per-delivery state the
//! vDC-level optimizer works with.
//!
//! A notification from the controller (or the local controller) targets an
//! audience: devices addressed by dSUID, by item spec, or by zone+group.
//! The audience is grouped per vDC so each vDC may coalesce the per-device
//! work into one hardware-native action when every affected device calls
//! the same content onto the same population twice in a row.

use std::time::Duration;

use vdcapi::frames::{ChannelType, DimMode, DsGroup, ZoneId};
use vdcapi::hash::Fnv64;
use vdcapi::{ApiError, DsUid};

use crate::device::{Device, NotifyType, PreparedOp};
use crate::error::HostError;
use crate::scene::SceneNo;
use crate::vdc::Vdc;

/// Parsed intent of a device-targeted notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationIntent {
    CallScene {
        scene: SceneNo,
        force: bool,
        transition_override: Option<Duration>,
    },
    DimChannel {
        mode: DimMode,
        channel: Option<ChannelType>,
        channel_id: Option<String>,
        area: i8,
        autostop_after: Duration,
        dim_per_ms_override: Option<f64>,
    },
    UndoScene { scene: SceneNo },
    SaveScene { scene: SceneNo },
    CallSceneMin { scene: SceneNo },
    SetLocalPriority { scene: SceneNo },
    SetControlValue { name: String, value: f64 },
    SetOutputChannelValue {
        channel: Option<ChannelType>,
        channel_id: Option<String>,
        value: f64,
        transition_time: Option<Duration>,
    },
}

/// Audience of one notification, grouped per vDC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Audience {
    pub groups: Vec<(DsUid, Vec<DsUid>)>,
}

impl Audience {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, members)| members.is_empty())
    }

    fn add(&mut self, vdc_dsuid: DsUid, device_dsuid: DsUid) {
        if let Some((_, members)) = self.groups.iter_mut().find(|(v, _)| *v == vdc_dsuid) {
            if !members.contains(&device_dsuid) {
                members.push(device_dsuid);
            }
        } else {
            self.groups.push((vdc_dsuid, vec![device_dsuid]));
        }
    }
}

/// Add a single device by dSUID; 415 for a zero id, 404 for an unknown one.
pub fn add_to_audience_by_dsuid(
    audience: &mut Audience,
    vdcs: &indexmap::IndexMap<DsUid, Vdc>,
    dsuid: &DsUid,
) -> Result<(), HostError> {
    if dsuid.is_zero() {
        return Err(HostError::api(ApiError::InvalidDsuid, "missing/invalid dSUID"));
    }
    for (vdc_dsuid, vdc) in vdcs {
        if vdc.devices.contains_key(dsuid) {
            audience.add(*vdc_dsuid, *dsuid);
            return Ok(());
        }
    }
    Err(HostError::api(ApiError::UnknownTarget, format!("unknown dSUID {dsuid}")))
}

/// Add devices matching a backend-specific item spec (`<vdc>:<item>`).
pub fn add_to_audience_by_item_spec(
    audience: &mut Audience,
    vdcs: &indexmap::IndexMap<DsUid, Vdc>,
    item_spec: &str,
) -> Result<(), HostError> {
    for (vdc_dsuid, vdc) in vdcs {
        for (dsuid, device) in &vdc.devices {
            if device.name == item_spec {
                audience.add(*vdc_dsuid, *dsuid);
            }
        }
    }
    if audience.is_empty() {
        return Err(HostError::api(ApiError::UnknownTarget, format!("missing/invalid itemSpec {item_spec}")));
    }
    Ok(())
}

/// Add all devices of a zone and group. Zone 0 addresses all zones, a
/// group of `None`/`Undefined` all groups; group membership is decided by
/// the device output.
pub fn add_to_audience_by_zone_and_group(
    audience: &mut Audience,
    vdcs: &indexmap::IndexMap<DsUid, Vdc>,
    zone: ZoneId,
    group: Option<DsGroup>,
) {
    for (vdc_dsuid, vdc) in vdcs {
        for (dsuid, device) in &vdc.devices {
            let zone_match = zone == 0 || device.zone_id == zone;
            let group_match = match group {
                None | Some(DsGroup::Undefined) => true,
                Some(g) => device.output.as_ref().is_some_and(|o| o.is_member(g)),
            };
            if zone_match && group_match {
                audience.add(*vdc_dsuid, *dsuid);
            }
        }
    }
}

/// Per-delivery state shared between the devices of one vDC and its
/// optimizer.
#[derive(Debug, Clone)]
pub struct DeliveryState {
    pub delivery_id: u64,
    pub optimized_type: NotifyType,
    /// Scene number, or 0 for dimming.
    pub content_id: SceneNo,
    /// FNV64 of the called scene contents, XOR-mixed across devices so
    /// audience order does not matter.
    pub contents_hash: u64,
    /// XOR-mix of affected device dSUIDs (subdevice-safe).
    pub affected_devices_hash: u64,
    /// Dim direction for optimized dimming.
    pub action_variant: DimMode,
    /// Channel type number for optimized dimming.
    pub action_param: u8,
    /// Auto-stop reprogramming for an optimized dim repeater.
    pub repeat_variant: DimMode,
    pub repeat_after: Option<Duration>,
    pub affected_devices: Vec<DsUid>,
}

impl DeliveryState {
    pub fn new(delivery_id: u64, optimized_type: NotifyType) -> Self {
        Self {
            delivery_id,
            optimized_type,
            content_id: 0,
            contents_hash: 0,
            affected_devices_hash: 0,
            action_variant: DimMode::Stop,
            action_param: 0,
            repeat_variant: DimMode::Stop,
            repeat_after: None,
            affected_devices: Vec::new(),
        }
    }
}

impl Device {
    /// Fill the delivery state from this device's prepared operation.
    /// Returns false when the device cannot be part of an optimized set
    /// (nothing prepared, or unhashable content).
    pub fn update_delivery_state(&self, state: &mut DeliveryState, for_optimization: bool) -> bool {
        match state.optimized_type {
            NotifyType::CallScene => {
                let Some(PreparedOp::Scene { scene }) = &self.prepared else { return false };
                state.content_id = scene.scene_no;
                if for_optimization {
                    let scene_hash = scene.content_hash();
                    if scene_hash == 0 {
                        return false;
                    }
                    // mix the device id in so the combined hash is
                    // order-insensitive across the audience
                    let mut h = Fnv64::from_hash(scene_hash);
                    h.add_bytes(self.dsuid.as_bytes());
                    state.contents_hash ^= h.hash();
                }
                true
            }
            NotifyType::DimChannel | NotifyType::Retrigger => {
                if !matches!(self.prepared, Some(PreparedOp::Dim))
                    && state.optimized_type == NotifyType::DimChannel
                {
                    return false;
                }
                state.content_id = 0;
                state.action_variant = self.dim.current_mode;
                state.action_param = self
                    .output
                    .as_ref()
                    .and_then(|o| o.channel_by_index(self.dim.current_channel))
                    .map(|c| c.channel_type().number())
                    .unwrap_or(0);
                if for_optimization && self.dim.current_mode != DimMode::Stop {
                    state.repeat_variant = DimMode::Stop;
                    state.repeat_after = Some(crate::device::DEFAULT_DIM_AUTOSTOP);
                }
                true
            }
            NotifyType::None => false,
        }
    }

    /// Ask the device to join an optimized delivery set.
    pub fn add_to_optimized_set(&self, state: &mut DeliveryState) -> bool {
        if self.update_delivery_state(state, true) {
            self.dsuid.mix_into(&mut state.affected_devices_hash);
            state.affected_devices.push(self.dsuid);
            return true;
        }
        false
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
