// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A virtual device controller: groups the devices of one backend kind
//! and delivers audience notifications to them, optionally coalescing the
//! per-device work into one hardware-native action.

use tracing::{debug, info, warn};
use vdcapi::dsuid::DSUID_NAMESPACE;
use vdcapi::frames::DimMode;
use vdcapi::DsUid;

use indexmap::IndexMap;

use crate::clock::{earliest, MonoTime};
use crate::device::{BackendOp, Device, DeviceBackend, DeviceEffect, NotifyType};
use crate::error::HostError;
use crate::router::{DeliveryState, NotificationIntent};

/// Backend of one device technology. Extends per-device hardware access
/// with discovery and (optionally) hardware-native group actions.
pub trait VdcBackend: DeviceBackend {
    /// Short model identifier (e.g. "demo", "external").
    fn model_name(&self) -> &str;

    /// Discover devices. Non-incremental scans return the full population.
    fn scan_for_devices(&mut self, incremental: bool) -> Result<Vec<Device>, HostError>;

    /// Execute a delivery as one native action (group scene call, group
    /// dim). `None` means the backend has no native equivalent and the
    /// per-device path must run.
    fn call_native_action(&mut self, state: &DeliveryState) -> Option<BackendOp> {
        let _ = state;
        None
    }
}

/// Optimizer memory: a native action is only worth trying once the exact
/// same content went to the exact same population twice in a row.
#[derive(Debug, Default)]
struct OptimizerState {
    last_contents_hash: u64,
    last_devices_hash: u64,
    seen_count: u32,
}

/// Container for the devices of one backend kind.
pub struct Vdc {
    pub dsuid: DsUid,
    pub name: String,
    pub instance: u32,
    pub backend: Box<dyn VdcBackend>,
    pub devices: IndexMap<DsUid, Device>,
    pub announced_at: Option<MonoTime>,
    pub announce_attempt: Option<MonoTime>,
    /// Collect/init failures leave the vdc operational but flagged.
    pub error_state: Option<String>,
    optimizer: OptimizerState,
}

impl Vdc {
    pub fn new(host_dsuid: &DsUid, instance: u32, name: impl Into<String>, backend: Box<dyn VdcBackend>) -> Self {
        let name = name.into();
        let dsuid = DsUid::from_name_in_space(
            &format!("{host_dsuid}/vdc/{}/{instance}", backend.model_name()),
            &DSUID_NAMESPACE,
        );
        Self {
            dsuid,
            name,
            instance,
            backend,
            devices: IndexMap::new(),
            announced_at: None,
            announce_attempt: None,
            error_state: None,
            optimizer: OptimizerState::default(),
        }
    }

    /// Run discovery and add the found devices. Collection continues past
    /// individual failures; the vdc is only flagged.
    pub fn collect_devices(&mut self, incremental: bool) -> usize {
        match self.backend.scan_for_devices(incremental) {
            Ok(found) => {
                let mut added = 0;
                for device in found {
                    if self.devices.contains_key(&device.dsuid) {
                        debug!(vdc = %self.dsuid, device = %device.dsuid, "device already known");
                        continue;
                    }
                    info!(vdc = %self.dsuid, device = %device.dsuid, name = %device.name, "device added");
                    self.devices.insert(device.dsuid, device);
                    added += 1;
                }
                added
            }
            Err(err) => {
                warn!(vdc = %self.dsuid, %err, "device scan failed");
                self.error_state = Some(err.to_string());
                0
            }
        }
    }

    /// Prepare phase of a delivery: evaluate each audience member and
    /// build the optimizer state over the devices that participate.
    pub fn prepare_delivery(
        &mut self,
        members: &[DsUid],
        intent: &NotificationIntent,
        delivery_id: u64,
        now: MonoTime,
        effects: &mut Vec<(DsUid, DeviceEffect)>,
    ) -> DeliveryState {
        let optimized_type = match intent {
            NotificationIntent::CallScene { .. } => NotifyType::CallScene,
            NotificationIntent::DimChannel { .. } => NotifyType::DimChannel,
            _ => NotifyType::None,
        };
        let mut state = DeliveryState::new(delivery_id, optimized_type);
        let mut retriggered = false;
        for dsuid in members {
            let Some(device) = self.devices.get_mut(dsuid) else { continue };
            let mut device_effects = Vec::new();
            let what = match intent {
                NotificationIntent::CallScene { scene, force, transition_override } => device
                    .call_scene_prepare(
                        *scene,
                        *force,
                        *transition_override,
                        &mut *self.backend,
                        now,
                        &mut device_effects,
                    ),
                NotificationIntent::DimChannel {
                    mode,
                    channel,
                    channel_id,
                    area,
                    autostop_after,
                    dim_per_ms_override,
                } => {
                    let index = device.channel_index(*channel, channel_id.as_deref());
                    device.dim_channel_prepare(
                        index,
                        *mode,
                        *area,
                        *autostop_after,
                        *dim_per_ms_override,
                        &mut *self.backend,
                        now,
                        &mut device_effects,
                    )
                }
                _ => NotifyType::None,
            };
            match what {
                NotifyType::CallScene | NotifyType::DimChannel => {
                    device.add_to_optimized_set(&mut state);
                }
                NotifyType::Retrigger => retriggered = true,
                NotifyType::None => {}
            }
            for e in device_effects {
                effects.push((*dsuid, e));
            }
        }
        if retriggered {
            // existing dim continues; the optimized repeater (if one runs)
            // must re-arm its auto-stop
            state.repeat_variant = DimMode::Stop;
        }
        state
    }

    /// Execute phase: run the native action when the optimizer saw this
    /// exact delivery before, then execute per-device (skipping the
    /// hardware push when the native action covered it).
    pub fn execute_delivery(
        &mut self,
        state: &DeliveryState,
        now: MonoTime,
        effects: &mut Vec<(DsUid, DeviceEffect)>,
    ) {
        let mut what = state.optimized_type;
        if what != NotifyType::None && state.affected_devices.len() > 1 {
            if state.contents_hash == self.optimizer.last_contents_hash
                && state.affected_devices_hash == self.optimizer.last_devices_hash
            {
                self.optimizer.seen_count += 1;
                if self.optimizer.seen_count >= 2 {
                    if let Some(op) = self.backend.call_native_action(state) {
                        info!(
                            vdc = %self.dsuid,
                            devices = state.affected_devices.len(),
                            content = state.content_id,
                            "delivery executed as native action"
                        );
                        let _ = op;
                        what = NotifyType::None;
                    }
                }
            } else {
                self.optimizer.last_contents_hash = state.contents_hash;
                self.optimizer.last_devices_hash = state.affected_devices_hash;
                self.optimizer.seen_count = 1;
            }
        }
        for dsuid in &state.affected_devices {
            let Some(device) = self.devices.get_mut(dsuid) else { continue };
            let mut device_effects = Vec::new();
            match state.optimized_type {
                NotifyType::CallScene => device.call_scene_execute_prepared(
                    what,
                    Some(state.delivery_id),
                    &mut *self.backend,
                    now,
                    &mut device_effects,
                ),
                NotifyType::DimChannel => device.dim_channel_execute_prepared(
                    what,
                    Some(state.delivery_id),
                    &mut *self.backend,
                    now,
                    &mut device_effects,
                ),
                _ => {}
            }
            for e in device_effects {
                effects.push((*dsuid, e));
            }
        }
    }

    /// Deliver a non-optimizable notification member by member.
    pub fn deliver_simple(
        &mut self,
        members: &[DsUid],
        intent: &NotificationIntent,
        now: MonoTime,
        effects: &mut Vec<(DsUid, DeviceEffect)>,
    ) {
        for dsuid in members {
            let Some(device) = self.devices.get_mut(dsuid) else { continue };
            let mut device_effects = Vec::new();
            match intent {
                NotificationIntent::UndoScene { scene } => {
                    device.undo_scene(*scene, &mut *self.backend, now, &mut device_effects)
                }
                NotificationIntent::SaveScene { scene } => device.save_scene(*scene),
                NotificationIntent::CallSceneMin { scene } => {
                    device.call_scene_min(*scene, &mut *self.backend, now, &mut device_effects)
                }
                NotificationIntent::SetLocalPriority { scene } => device.set_local_priority(*scene),
                NotificationIntent::SetControlValue { name, value } => {
                    device.process_control_value(name, *value, &mut *self.backend, now, &mut device_effects);
                }
                NotificationIntent::SetOutputChannelValue { channel, channel_id, value, transition_time } => {
                    if let Some(index) = device.channel_index(*channel, channel_id.as_deref()) {
                        if let Some(output) = device.output.as_mut() {
                            if let Some(ch) = output.channel_by_index_mut(index) {
                                ch.set_value(*value, transition_time.unwrap_or_default(), false);
                            }
                        }
                        device.request_applying_channels(
                            None,
                            false,
                            &mut *self.backend,
                            now,
                            &mut device_effects,
                        );
                    }
                }
                _ => {}
            }
            for e in device_effects {
                effects.push((*dsuid, e));
            }
        }
    }

    /// Earliest deadline over all owned devices.
    pub fn next_wakeup(&self) -> Option<MonoTime> {
        let mut at = None;
        for device in self.devices.values() {
            at = earliest(at, device.next_wakeup());
        }
        at
    }

    /// Process due deadlines on all owned devices.
    pub fn tick(&mut self, now: MonoTime, effects: &mut Vec<(DsUid, DeviceEffect)>) {
        let dsuids: Vec<DsUid> = self.devices.keys().copied().collect();
        for dsuid in dsuids {
            let Some(device) = self.devices.get_mut(&dsuid) else { continue };
            if device.next_wakeup().is_some_and(|at| at <= now) {
                let mut device_effects = Vec::new();
                device.tick(now, &mut *self.backend, &mut device_effects);
                for e in device_effects {
                    effects.push((dsuid, e));
                }
            }
        }
    }
}

impl std::fmt::Debug for Vdc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vdc")
            .field("dsuid", &self.dsuid)
            .field("name", &self.name)
            .field("devices", &self.devices.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "vdc_tests.rs"]
mod tests;
