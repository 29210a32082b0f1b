// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The vDC host: root of the entity tree.
//!
//! Owns all vDCs (and through them all devices), the local controller,
//! the persistent store and the north-bound session state. The run loop
//! feeds it frames, hardware events and time; it answers with outgoing
//! frames in its outbox.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::json;
use tracing::{debug, info, warn};
use vdcapi::frames::{
    AnnounceDeviceParams, AnnounceVdcParams, Frame, MethodCall, PushNotificationParams,
    RequestFrame, ResponseFrame, ZoneId,
};
use vdcapi::DsUid;

use crate::behaviour::button::ClickType;
use crate::behaviour::BehaviourKind;
use crate::clock::{earliest, MonoTime};
use crate::controller::{ControllerAction, LocalController};
use crate::device::{Device, DeviceEffect, NotifyType};
use crate::error::{HostError, HostResult};
use crate::persist::ParamStore;
use crate::router::{
    add_to_audience_by_dsuid, add_to_audience_by_item_spec, add_to_audience_by_zone_and_group,
    Audience, NotificationIntent,
};
use crate::scripting::ScriptRunner;
use crate::valuesource::source_id;
use crate::vdc::Vdc;

/// One announce request is answered within this window, or retried.
const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(30);
/// Unacknowledged targets are re-announced no sooner than this.
const ANNOUNCE_RETRY_TIMEOUT: Duration = Duration::from_secs(300);
/// Pause between successive announcements.
const ANNOUNCE_PAUSE: Duration = Duration::from_millis(500);

/// Active north-bound session.
#[derive(Debug, Clone)]
pub struct ApiSession {
    pub connection_id: u64,
    pub peer_dsuid: DsUid,
    pub api_version: u16,
}

#[derive(Debug, Clone, Copy)]
enum AnnounceTarget {
    Vdc(DsUid),
    Device { vdc: DsUid, device: DsUid },
}

/// Outgoing work for the transport layer.
#[derive(Debug, Clone)]
pub enum Outgoing {
    Frame { connection_id: u64, frame: Frame },
}

pub struct VdcHost {
    pub dsuid: DsUid,
    pub name: String,
    pub vdcs: IndexMap<DsUid, Vdc>,
    pub controller: LocalController,
    pub store: ParamStore,
    session: Option<ApiSession>,
    next_request_id: u64,
    next_delivery_id: u64,
    pending_announcements: HashMap<u64, AnnounceTarget>,
    announce_check_at: Option<MonoTime>,
    pub outbox: Vec<Outgoing>,
}

impl VdcHost {
    pub fn new(dsuid: DsUid, name: impl Into<String>, store: ParamStore, runner: Box<dyn ScriptRunner>) -> Self {
        Self {
            dsuid,
            name: name.into(),
            vdcs: IndexMap::new(),
            controller: LocalController::new(runner),
            store,
            session: None,
            next_request_id: 1,
            next_delivery_id: 1,
            pending_announcements: HashMap::new(),
            announce_check_at: None,
            outbox: Vec::new(),
        }
    }

    pub fn session(&self) -> Option<&ApiSession> {
        self.session.as_ref()
    }

    pub fn add_vdc(&mut self, vdc: Vdc) -> DsUid {
        let dsuid = vdc.dsuid;
        self.vdcs.insert(dsuid, vdc);
        dsuid
    }

    /// Add a device to a vdc. Duplicate additions by dSUID are idempotent
    /// and leave the existing device untouched.
    pub fn add_device(&mut self, vdc_dsuid: &DsUid, mut device: Device) -> HostResult<bool> {
        if self.device_exists(&device.dsuid) {
            debug!(device = %device.dsuid, "duplicate addDevice ignored");
            return Ok(false);
        }
        let Some(vdc) = self.vdcs.get_mut(vdc_dsuid) else {
            return Err(HostError::backend(format!("no vdc {vdc_dsuid}")));
        };
        if let Err(err) = device.load_settings(&self.store) {
            warn!(device = %device.dsuid, %err, "loading device settings failed");
        }
        info!(device = %device.dsuid, name = %device.name, vdc = %vdc_dsuid, "device added");
        self.controller.device_added(&device);
        vdc.devices.insert(device.dsuid, device);
        // a new device makes announcing necessary
        if self.session.is_some() && self.announce_check_at.is_none() {
            self.announce_check_at = Some(MonoTime::ZERO);
        }
        Ok(true)
    }

    pub fn device_exists(&self, dsuid: &DsUid) -> bool {
        self.vdcs.values().any(|v| v.devices.contains_key(dsuid))
    }

    pub fn device(&self, dsuid: &DsUid) -> Option<&Device> {
        self.vdcs.values().find_map(|v| v.devices.get(dsuid))
    }

    pub fn total_devices(&self) -> usize {
        self.vdcs.values().map(|v| v.devices.len()).sum()
    }

    /// Remove a device; optionally forget its persisted state.
    pub fn remove_device(&mut self, dsuid: &DsUid, forget: bool) -> bool {
        for vdc in self.vdcs.values_mut() {
            if let Some(device) = vdc.devices.shift_remove(dsuid) {
                info!(device = %dsuid, forget, "device removed");
                self.controller.device_removed(&device);
                if forget {
                    device.forget_settings(&mut self.store);
                } else {
                    device.save_settings(&mut self.store);
                }
                return true;
            }
        }
        false
    }

    /// Move a device between zones, keeping controller bookkeeping intact.
    pub fn device_set_zone(&mut self, dsuid: &DsUid, zone: ZoneId) {
        for vdc in self.vdcs.values_mut() {
            if let Some(device) = vdc.devices.get_mut(dsuid) {
                if device.zone_id != zone {
                    let from = device.zone_id;
                    device.zone_id = zone;
                    self.controller.device_changes_zone(from, zone);
                }
                return;
            }
        }
    }

    // -- session and announcements -------------------------------------------

    /// A hello passed version negotiation: start the session.
    pub fn session_started(&mut self, connection_id: u64, peer_dsuid: DsUid, api_version: u16, now: MonoTime) {
        info!(peer = %peer_dsuid, api_version, "vDC API session started");
        self.session = Some(ApiSession { connection_id, peer_dsuid, api_version });
        self.reset_announcing();
        self.announce_check_at = Some(now + ANNOUNCE_PAUSE);
    }

    /// Session ends (bye or connection error): announcements reset, all
    /// devices stay alive.
    pub fn session_ended(&mut self) {
        if self.session.take().is_some() {
            info!("vDC API session ended");
        }
        self.reset_announcing();
        self.announce_check_at = None;
    }

    fn reset_announcing(&mut self) {
        self.pending_announcements.clear();
        for vdc in self.vdcs.values_mut() {
            vdc.announced_at = None;
            vdc.announce_attempt = None;
            for device in vdc.devices.values_mut() {
                device.announced_at = None;
                device.announce_attempt = None;
            }
        }
    }

    fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Announce the next unannounced vdc, then the next unannounced device
    /// of announced vdcs. One announcement is in flight at a time.
    fn announce_next(&mut self, now: MonoTime) {
        let Some(session) = self.session.clone() else {
            self.announce_check_at = None;
            return;
        };
        let retry_ok =
            |attempt: Option<MonoTime>| attempt.is_none_or(|at| now.since(at) > ANNOUNCE_RETRY_TIMEOUT);
        // vdcs first
        let mut call = None;
        for vdc in self.vdcs.values_mut() {
            if vdc.announced_at.is_none() && retry_ok(vdc.announce_attempt) {
                vdc.announce_attempt = Some(now);
                call = Some((
                    AnnounceTarget::Vdc(vdc.dsuid),
                    MethodCall::AnnounceVdc(AnnounceVdcParams { dsuid: vdc.dsuid }),
                ));
                break;
            }
        }
        if call.is_none() {
            'outer: for vdc in self.vdcs.values_mut() {
                if vdc.announced_at.is_none() {
                    continue;
                }
                let vdc_dsuid = vdc.dsuid;
                for device in vdc.devices.values_mut() {
                    if device.announced_at.is_none() && retry_ok(device.announce_attempt) {
                        device.announce_attempt = Some(now);
                        call = Some((
                            AnnounceTarget::Device { vdc: vdc_dsuid, device: device.dsuid },
                            MethodCall::AnnounceDevice(AnnounceDeviceParams {
                                dsuid: device.dsuid,
                                vdc_dsuid,
                            }),
                        ));
                        break 'outer;
                    }
                }
            }
        }
        match call {
            Some((target, method)) => {
                let id = self.allocate_request_id();
                debug!(?target, id, "announcing");
                self.pending_announcements.insert(id, target);
                self.outbox.push(Outgoing::Frame {
                    connection_id: session.connection_id,
                    frame: Frame::Request(RequestFrame { id: Some(id), call: method }),
                });
                // continue (or retry) after the announce timeout
                self.announce_check_at = Some(now + ANNOUNCE_TIMEOUT);
            }
            None => {
                self.announce_check_at = None;
            }
        }
    }

    /// A response frame arrived; announcement acks are consumed here.
    pub fn handle_response(&mut self, frame: &ResponseFrame, now: MonoTime) {
        let Some(target) = self.pending_announcements.remove(&frame.id) else { return };
        if let Some(error) = &frame.error {
            warn!(?target, %error, "announcement rejected");
            // retried after the per-target backoff
        } else {
            match target {
                AnnounceTarget::Vdc(dsuid) => {
                    if let Some(vdc) = self.vdcs.get_mut(&dsuid) {
                        info!(vdc = %dsuid, "vdc announced");
                        vdc.announced_at = Some(now);
                    }
                }
                AnnounceTarget::Device { vdc, device } => {
                    if let Some(d) = self.vdcs.get_mut(&vdc).and_then(|v| v.devices.get_mut(&device)) {
                        info!(device = %device, "device announced");
                        d.announced_at = Some(now);
                    }
                }
            }
        }
        self.announce_check_at = Some(now + ANNOUNCE_PAUSE);
    }

    // -- notification delivery ------------------------------------------------

    /// Build an audience from addressing parameters.
    pub fn build_audience(&self, addressing: &vdcapi::frames::Addressing) -> HostResult<Audience> {
        let mut audience = Audience::default();
        if let Some(targets) = &addressing.dsuid {
            for dsuid in targets.clone().into_vec() {
                add_to_audience_by_dsuid(&mut audience, &self.vdcs, &dsuid)?;
            }
        } else if let Some(spec) = &addressing.item_spec {
            add_to_audience_by_item_spec(&mut audience, &self.vdcs, spec)?;
        } else {
            add_to_audience_by_zone_and_group(
                &mut audience,
                &self.vdcs,
                addressing.zone_id.unwrap_or(0),
                addressing.group,
            );
        }
        Ok(audience)
    }

    /// Deliver an intent to an audience: prepare per vdc, update zone
    /// state per affected device, then execute (optimized where possible).
    pub fn deliver_to_audience(&mut self, audience: Audience, intent: NotificationIntent, now: MonoTime) {
        let delivery_id = self.next_delivery_id;
        self.next_delivery_id += 1;
        let optimizable = matches!(
            intent,
            NotificationIntent::CallScene { .. } | NotificationIntent::DimChannel { .. }
        );
        let mut all_effects: Vec<(DsUid, DeviceEffect)> = Vec::new();
        for (vdc_dsuid, members) in &audience.groups {
            let Some(vdc) = self.vdcs.get_mut(vdc_dsuid) else { continue };
            debug!(vdc = %vdc_dsuid, members = members.len(), ?intent, "delivering notification");
            if optimizable {
                let state = vdc.prepare_delivery(members, &intent, delivery_id, now, &mut all_effects);
                if state.optimized_type != NotifyType::None {
                    // zone/group bookkeeping right before the values hit
                    for dsuid in &state.affected_devices {
                        if let Some(device) = vdc.devices.get_mut(dsuid) {
                            self.controller.device_will_apply_notification(device, &state);
                        }
                    }
                }
                vdc.execute_delivery(&state, now, &mut all_effects);
            } else {
                vdc.deliver_simple(members, &intent, now, &mut all_effects);
            }
        }
        self.process_device_effects(all_effects, now);
    }

    /// Translate a controller action into an audience delivery.
    pub fn perform_controller_action(&mut self, action: ControllerAction, now: MonoTime) {
        match action {
            ControllerAction::CallScene { zone, group, scene, force } => {
                let mut audience = Audience::default();
                add_to_audience_by_zone_and_group(&mut audience, &self.vdcs, zone, Some(group));
                self.deliver_to_audience(
                    audience,
                    NotificationIntent::CallScene { scene, force, transition_override: None },
                    now,
                );
            }
            ControllerAction::DimChannel { zone, group, channel, area, mode } => {
                let mut audience = Audience::default();
                add_to_audience_by_zone_and_group(&mut audience, &self.vdcs, zone, Some(group));
                self.deliver_to_audience(
                    audience,
                    NotificationIntent::DimChannel {
                        mode,
                        channel: Some(channel),
                        channel_id: None,
                        area,
                        autostop_after: self.controller.dim_autostop(),
                        dim_per_ms_override: None,
                    },
                    now,
                );
            }
            ControllerAction::UndoScene { zone, group, scene } => {
                let mut audience = Audience::default();
                add_to_audience_by_zone_and_group(&mut audience, &self.vdcs, zone, Some(group));
                self.deliver_to_audience(audience, NotificationIntent::UndoScene { scene }, now);
            }
            ControllerAction::SetChannelValue { zone, group, channel, area: _, value, transition_time } => {
                let mut audience = Audience::default();
                add_to_audience_by_zone_and_group(&mut audience, &self.vdcs, zone, Some(group));
                self.deliver_to_audience(
                    audience,
                    NotificationIntent::SetOutputChannelValue {
                        channel: Some(channel),
                        channel_id: None,
                        value,
                        transition_time: Some(transition_time),
                    },
                    now,
                );
            }
        }
    }

    // -- hardware-side inputs -------------------------------------------------

    /// Raw button press/release report from a backend.
    pub fn device_button_input(&mut self, dsuid: &DsUid, index: usize, pressed: bool, now: MonoTime) {
        let mut effects = Vec::new();
        for vdc in self.vdcs.values_mut() {
            if let Some(device) = vdc.devices.get_mut(dsuid) {
                let mut device_effects = Vec::new();
                device.handle_button_input(index, pressed, &mut *vdc.backend, now, &mut device_effects);
                for e in device_effects {
                    effects.push((*dsuid, e));
                }
                break;
            }
        }
        self.process_device_effects(effects, now);
    }

    /// Binary input state report from a backend.
    pub fn device_input_state(&mut self, dsuid: &DsUid, index: usize, value: bool, now: MonoTime) {
        let mut changed_source = None;
        if let Some(device) = self.device_mut(dsuid) {
            if let Some(input) = device.inputs.get_mut(index) {
                if input.update_input_state(value, now) {
                    changed_source = Some((
                        source_id(dsuid, BehaviourKind::BinaryInput, index),
                        Some(f64::from(u8::from(value))),
                    ));
                }
            }
        }
        if let Some((id, v)) = changed_source {
            self.controller.process_value_source_change(&id, v, now);
            self.push_property(dsuid, json!({ "binaryInputStates": { index.to_string(): value } }));
        }
    }

    /// Sensor value report from a backend.
    pub fn device_sensor_value(&mut self, dsuid: &DsUid, index: usize, value: f64, now: MonoTime) {
        let mut pushed = false;
        if let Some(device) = self.device_mut(dsuid) {
            if let Some(sensor) = device.sensors.get_mut(index) {
                pushed = sensor.update_sensor_value(value, now);
            }
        }
        let mut routed = None;
        if pushed {
            let Self { vdcs, controller, .. } = self;
            if let Some(device) = vdcs.values().find_map(|v| v.devices.get(dsuid)) {
                if let Some(sensor) = device.sensors.get(index) {
                    routed = controller.process_sensor_change(sensor, device.zone_id, value);
                }
            }
        }
        let source = source_id(dsuid, BehaviourKind::Sensor, index);
        self.controller.process_value_source_change(&source, Some(value), now);
        if pushed {
            self.push_property(dsuid, json!({ "sensorStates": { index.to_string(): value } }));
        }
        if let Some(action) = routed {
            self.perform_controller_action(action, now);
        }
    }

    /// Route effects emitted by device operations.
    pub fn process_device_effects(&mut self, effects: Vec<(DsUid, DeviceEffect)>, now: MonoTime) {
        for (dsuid, effect) in effects {
            match effect {
                DeviceEffect::DeliveryDone(id) => {
                    debug!(device = %dsuid, delivery = id, "device completed delivery");
                }
                DeviceEffect::RequestDone(id) => {
                    debug!(device = %dsuid, request = id, "device completed request");
                }
                DeviceEffect::OutputStateChanged => {
                    let states = self.device(&dsuid).and_then(|d| d.output.as_ref()).map(|o| {
                        let map: serde_json::Map<String, serde_json::Value> = o
                            .channels()
                            .iter()
                            .map(|c| (c.id().to_owned(), json!({ "value": c.value() })))
                            .collect();
                        serde_json::Value::Object(map)
                    });
                    if let Some(states) = states {
                        self.push_property(&dsuid, json!({ "channelStates": states }));
                    }
                }
                DeviceEffect::ButtonClick { index, click } => {
                    self.process_button_click_effect(&dsuid, index, click, now);
                }
                DeviceEffect::ButtonAction { index, .. } => {
                    self.process_button_click_effect(&dsuid, index, ClickType::Tip1x, now);
                }
            }
        }
    }

    fn process_button_click_effect(&mut self, dsuid: &DsUid, index: usize, click: ClickType, now: MonoTime) {
        let mut actions = None;
        let mut push_click = false;
        {
            let Self { vdcs, controller, .. } = self;
            let Some(device) = vdcs.values().find_map(|v| v.devices.get(dsuid)) else { return };
            let Some(button) = device.buttons.get(index) else { return };
            // value source consumers observe clicks (not the progress
            // stream, not hold repeats)
            if !matches!(click, ClickType::Progress | ClickType::HoldRepeat) {
                let source = source_id(dsuid, BehaviourKind::Button, index);
                controller.process_value_source_change(&source, Some(f64::from(click.number())), now);
            }
            if !button.bridge_exclusive {
                // local controller resolution; bridge-exclusive buttons
                // never cause local or upstream actions
                actions = controller.process_button_click(button, device.zone_id);
                push_click = !matches!(click, ClickType::Progress | ClickType::Complete);
            }
        }
        if let Some(actions) = actions {
            for action in actions {
                self.perform_controller_action(action, now);
            }
        }
        // the progress stream is bridge-side only
        if push_click {
            self.push_property(
                dsuid,
                json!({ "buttonInputStates": { index.to_string(): { "clickType": click.number() } } }),
            );
        }
    }

    pub fn device_mut(&mut self, dsuid: &DsUid) -> Option<&mut Device> {
        self.vdcs.values_mut().find_map(|v| v.devices.get_mut(dsuid))
    }

    /// Descriptors of every value source exposed by the population
    /// (buttons, binary inputs, sensors, channels).
    pub fn value_sources(&self) -> Vec<crate::valuesource::ValueSourceDescriptor> {
        use crate::valuesource::{channel_source_id, ValueSourceDescriptor};
        let mut sources = Vec::new();
        for vdc in self.vdcs.values() {
            for device in vdc.devices.values() {
                for button in &device.buttons {
                    sources.push(ValueSourceDescriptor {
                        id: source_id(&device.dsuid, BehaviourKind::Button, button.index),
                        name: format!("{}: {}", device.name, button.id),
                        value: button.last_click().map(|c| f64::from(c.number())),
                        last_update: button.last_action(),
                        op_level: 100,
                    });
                }
                for input in &device.inputs {
                    sources.push(ValueSourceDescriptor {
                        id: source_id(&device.dsuid, BehaviourKind::BinaryInput, input.index),
                        name: format!("{}: {}", device.name, input.id),
                        value: input.state().map(|s| f64::from(u8::from(s))),
                        last_update: input.last_update(),
                        op_level: 100,
                    });
                }
                for sensor in &device.sensors {
                    sources.push(ValueSourceDescriptor {
                        id: source_id(&device.dsuid, BehaviourKind::Sensor, sensor.index),
                        name: format!("{}: {}", device.name, sensor.id),
                        value: sensor.current_value(),
                        last_update: sensor.last_update(),
                        op_level: 100,
                    });
                }
                if let Some(output) = &device.output {
                    for channel in output.channels() {
                        sources.push(ValueSourceDescriptor {
                            id: channel_source_id(&device.dsuid, channel.id()),
                            name: format!("{}: {}", device.name, channel.id()),
                            value: Some(channel.value()),
                            last_update: channel.last_sync(),
                            op_level: 100,
                        });
                    }
                }
            }
        }
        sources
    }

    /// Push a property change to the connected controller.
    pub fn push_property(&mut self, dsuid: &DsUid, properties: serde_json::Value) {
        let Some(session) = &self.session else { return };
        self.outbox.push(Outgoing::Frame {
            connection_id: session.connection_id,
            frame: Frame::Request(RequestFrame {
                id: None,
                call: MethodCall::PushNotification(PushNotificationParams {
                    dsuid: *dsuid,
                    properties,
                }),
            }),
        });
    }

    /// Bind the current values of all sources a trigger maps before an
    /// on-demand condition check, so the check does not depend on a change
    /// having been delivered earlier.
    pub fn refresh_trigger_vars(&mut self, trigger_id: u32) {
        let Self { vdcs, controller, .. } = self;
        let Some(trigger) = controller.triggers.iter().find(|t| t.id == trigger_id) else { return };
        let uid = trigger.source_uid();
        let bindings: Vec<(String, Option<f64>)> = trigger
            .var_defs
            .iter()
            .map(|def| {
                let value = crate::valuesource::parse_source_id(&def.source_id)
                    .and_then(|source| lookup_source_value(vdcs, &source));
                (def.var.clone(), value)
            })
            .collect();
        for (var, value) in bindings {
            controller.runner.set_var(&uid, &var, value);
        }
    }

    /// Main script stored in the persistent store, if any.
    pub fn main_script(&self) -> Option<String> {
        let mut script = crate::scripting::MainScript::default();
        let mut flags = 0u64;
        match self.store.load(&mut script, "host", &mut flags) {
            Ok(true) => Some(script.code),
            Ok(false) => None,
            Err(err) => {
                warn!(%err, "loading main script failed");
                None
            }
        }
    }

    pub fn set_main_script(&mut self, code: impl Into<String>) {
        let script = crate::scripting::MainScript { code: code.into() };
        self.store.save(&script, "host", 0);
    }

    /// Run the stored main script (and thereafter keep it available to the
    /// runtime's command surface).
    pub fn start_main_script(&mut self) {
        let Some(code) = self.main_script() else { return };
        info!("starting main script");
        if let Err(err) = self.controller.runner.run("mainscript", &code) {
            warn!(%err, "main script failed");
        }
    }

    /// Persist the settings of every device.
    pub fn save_all_settings(&mut self) {
        let Self { vdcs, store, .. } = self;
        for vdc in vdcs.values() {
            for device in vdc.devices.values() {
                device.save_settings(store);
            }
        }
    }

    // -- time ----------------------------------------------------------------

    pub fn next_wakeup(&self) -> Option<MonoTime> {
        let mut at = self.announce_check_at;
        at = earliest(at, self.controller.next_wakeup());
        for vdc in self.vdcs.values() {
            at = earliest(at, vdc.next_wakeup());
        }
        at
    }

    pub fn tick(&mut self, now: MonoTime) {
        if self.announce_check_at.is_some_and(|at| at <= now) {
            self.announce_next(now);
        }
        self.controller.tick(now);
        let mut effects = Vec::new();
        for vdc in self.vdcs.values_mut() {
            vdc.tick(now, &mut effects);
        }
        self.process_device_effects(effects, now);
    }
}

/// Resolve a parsed value source reference to its current value.
fn lookup_source_value(vdcs: &IndexMap<DsUid, Vdc>, source: &crate::valuesource::SourceRef) -> Option<f64> {
    let device = vdcs.values().find_map(|v| v.devices.get(&source.dsuid))?;
    match source.kind {
        'S' => {
            let index: usize = source.selector.parse().ok()?;
            device.sensors.get(index)?.current_value()
        }
        'I' => {
            let index: usize = source.selector.parse().ok()?;
            device.inputs.get(index)?.state().map(|s| f64::from(u8::from(s)))
        }
        'B' => {
            let index: usize = source.selector.parse().ok()?;
            device.buttons.get(index)?.last_click().map(|c| f64::from(c.number()))
        }
        'C' => {
            let output = device.output.as_ref()?;
            let index = output.channel_index_by_id(&source.selector)?;
            output.channel_by_index(index).map(|c| c.value())
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
