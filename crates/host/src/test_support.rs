// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: mock backend and device builders.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use vdcapi::dsuid::DSUID_NAMESPACE;
use vdcapi::DsUid;

use crate::behaviour::button::{ButtonBehaviour, ButtonSettings};
use crate::behaviour::output::OutputBehaviour;
use crate::behaviour::shadow::ShadowKind;
use crate::device::{BackendOp, Device, DeviceBackend};
use crate::router::DeliveryState;
use crate::vdc::VdcBackend;

/// Backend double recording every hardware interaction. With `pending`
/// set, apply/sync calls stay in flight until the test completes them
/// explicitly.
#[derive(Debug, Default)]
pub struct MockBackend {
    pub pending: bool,
    pub apply_calls: u32,
    pub sync_calls: u32,
    pub movements: Vec<i8>,
    /// Channel values observed at each completed apply.
    pub applied_values: Vec<Vec<f64>>,
    /// Values `sync_channel_values` installs into the channels.
    pub hardware_values: Option<Vec<f64>>,
    /// Devices returned by the next scan.
    pub scan_results: Vec<Device>,
    /// Make the next scan fail.
    pub fail_scan: bool,
    /// When set, deliveries can be coalesced into native actions.
    pub supports_native: bool,
    /// Recorded native action invocations (content id, device count).
    pub native_calls: Vec<(u8, usize)>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending() -> Self {
        Self { pending: true, ..Self::default() }
    }
}

impl DeviceBackend for MockBackend {
    fn apply_channel_values(&mut self, _dsuid: &DsUid, output: &mut OutputBehaviour, _for_dimming: bool) -> BackendOp {
        self.apply_calls += 1;
        if self.pending {
            return BackendOp::Pending;
        }
        self.applied_values.push(output.channels().iter().map(|c| c.value()).collect());
        for i in output.pending_apply_indexes() {
            if let Some(c) = output.channel_by_index_mut(i) {
                c.value_applied(false);
            }
        }
        BackendOp::Done
    }

    fn sync_channel_values(&mut self, _dsuid: &DsUid, output: &mut OutputBehaviour) -> BackendOp {
        self.sync_calls += 1;
        if self.pending {
            return BackendOp::Pending;
        }
        if let Some(values) = &self.hardware_values {
            for (i, v) in values.clone().into_iter().enumerate() {
                if let Some(c) = output.channel_by_index_mut(i) {
                    c.sync_value(v, crate::clock::MonoTime::ZERO);
                }
            }
        }
        BackendOp::Done
    }

    fn change_movement(&mut self, _dsuid: &DsUid, direction: i8) -> BackendOp {
        self.movements.push(direction);
        BackendOp::Done
    }
}

impl VdcBackend for MockBackend {
    fn model_name(&self) -> &str {
        "mock"
    }

    fn scan_for_devices(&mut self, _incremental: bool) -> crate::error::HostResult<Vec<Device>> {
        if self.fail_scan {
            return Err(crate::error::HostError::backend("bus scan failed"));
        }
        Ok(std::mem::take(&mut self.scan_results))
    }

    fn call_native_action(&mut self, state: &DeliveryState) -> Option<BackendOp> {
        if !self.supports_native {
            return None;
        }
        self.native_calls.push((state.content_id, state.affected_devices.len()));
        Some(BackendOp::Done)
    }
}

/// Complete a pending apply on the mock: record values and confirm
/// channels, as the real backend completion would.
pub fn complete_pending_apply(backend: &mut MockBackend, device: &mut Device) {
    if let Some(output) = device.output.as_mut() {
        backend.applied_values.push(output.channels().iter().map(|c| c.value()).collect());
        for i in output.pending_apply_indexes() {
            if let Some(c) = output.channel_by_index_mut(i) {
                c.value_applied(false);
            }
        }
    }
}

/// Script runner double: records every interaction and returns a canned
/// result from `run`.
#[derive(Debug, Default)]
pub struct TestRunner {
    pub result: serde_json::Value,
    pub vars: Vec<(String, String, Option<f64>)>,
    pub runs: Vec<(String, String)>,
    pub stops: Vec<String>,
}

impl crate::scripting::ScriptRunner for TestRunner {
    fn set_var(&mut self, source_uid: &str, name: &str, value: Option<f64>) {
        self.vars.push((source_uid.to_owned(), name.to_owned(), value));
    }

    fn run(&mut self, source_uid: &str, code: &str) -> Result<serde_json::Value, crate::error::ScriptError> {
        self.runs.push((source_uid.to_owned(), code.to_owned()));
        Ok(self.result.clone())
    }

    fn stop(&mut self, source_uid: &str) {
        self.stops.push(source_uid.to_owned());
    }
}

/// Script runner handed to an owning host while the test keeps a handle
/// on the recording.
#[derive(Debug, Default)]
pub struct SharedRunner {
    pub log: std::sync::Arc<std::sync::Mutex<TestRunner>>,
}

impl crate::scripting::ScriptRunner for SharedRunner {
    fn set_var(&mut self, source_uid: &str, name: &str, value: Option<f64>) {
        self.log.lock().unwrap().set_var(source_uid, name, value);
    }

    fn run(&mut self, source_uid: &str, code: &str) -> Result<serde_json::Value, crate::error::ScriptError> {
        self.log.lock().unwrap().run(source_uid, code)
    }

    fn stop(&mut self, source_uid: &str) {
        self.log.lock().unwrap().stop(source_uid);
    }
}

pub fn test_dsuid(name: &str) -> DsUid {
    DsUid::from_name_in_space(name, &DSUID_NAMESPACE)
}

/// A light device with one brightness channel and a scene table.
pub fn light_device(name: &str) -> Device {
    let mut device = Device::new(test_dsuid(name), name);
    device.set_output(OutputBehaviour::light());
    device
}

/// A jalousie device with position/angle channels.
pub fn shade_device(name: &str) -> Device {
    let mut device = Device::new(test_dsuid(name), name);
    device.set_output(OutputBehaviour::shadow(ShadowKind::Jalousie));
    device
}

/// A light device with one standard button.
pub fn light_with_button(name: &str) -> Device {
    let mut device = light_device(name);
    device.add_button(ButtonBehaviour::new("", 0, ButtonSettings::default()));
    device
}
