// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in demo backend: simulated lights, shades and buttons.
//!
//! Useful for bring-up and end-to-end testing without any bus hardware.
//! Applies are instantaneous (the simulated hardware has native ramps),
//! syncs return the last applied values, and shade movement only logs.

use std::collections::HashMap;

use tracing::{debug, info};
use vdcapi::dsuid::DSUID_NAMESPACE;
use vdcapi::DsUid;

use crate::behaviour::button::{ButtonBehaviour, ButtonSettings};
use crate::behaviour::output::OutputBehaviour;
use crate::behaviour::shadow::ShadowKind;
use crate::device::{BackendOp, Device, DeviceBackend};
use crate::error::HostResult;
use crate::vdc::VdcBackend;

/// Population the demo backend materializes on scan.
#[derive(Debug, Clone, Copy)]
pub struct DemoPopulation {
    pub lights: usize,
    pub shades: usize,
    pub buttons: usize,
}

impl Default for DemoPopulation {
    fn default() -> Self {
        Self { lights: 2, shades: 1, buttons: 1 }
    }
}

#[derive(Debug, Default)]
pub struct DemoBackend {
    population: DemoPopulation,
    /// Last values each simulated device accepted.
    hardware: HashMap<DsUid, Vec<f64>>,
    scanned: bool,
}

impl DemoBackend {
    pub fn new(population: DemoPopulation) -> Self {
        Self { population, hardware: HashMap::new(), scanned: false }
    }

    /// Values the simulated hardware holds for a device.
    pub fn hardware_values(&self, dsuid: &DsUid) -> Option<&Vec<f64>> {
        self.hardware.get(dsuid)
    }
}

impl DeviceBackend for DemoBackend {
    fn apply_channel_values(&mut self, dsuid: &DsUid, output: &mut OutputBehaviour, _for_dimming: bool) -> BackendOp {
        let values: Vec<f64> = output.channels().iter().map(|c| c.value()).collect();
        debug!(device = %dsuid, ?values, "demo hardware accepts values");
        self.hardware.insert(*dsuid, values);
        for i in output.pending_apply_indexes() {
            if let Some(c) = output.channel_by_index_mut(i) {
                c.value_applied(false);
            }
        }
        BackendOp::Done
    }

    fn sync_channel_values(&mut self, dsuid: &DsUid, output: &mut OutputBehaviour) -> BackendOp {
        if let Some(values) = self.hardware.get(dsuid).cloned() {
            for (i, v) in values.into_iter().enumerate() {
                if let Some(c) = output.channel_by_index_mut(i) {
                    c.sync_value(v, crate::clock::MonoTime::ZERO);
                }
            }
        }
        BackendOp::Done
    }

    fn change_movement(&mut self, dsuid: &DsUid, direction: i8) -> BackendOp {
        debug!(device = %dsuid, direction, "demo shade motor");
        BackendOp::Done
    }
}

impl VdcBackend for DemoBackend {
    fn model_name(&self) -> &str {
        "demo"
    }

    fn scan_for_devices(&mut self, incremental: bool) -> HostResult<Vec<Device>> {
        if self.scanned && incremental {
            return Ok(Vec::new());
        }
        self.scanned = true;
        let mut found = Vec::new();
        for i in 0..self.population.lights {
            let name = format!("demo light {}", i + 1);
            let dsuid = DsUid::from_name_in_space(&format!("demo/light/{i}"), &DSUID_NAMESPACE);
            let mut device = Device::new(dsuid, &name);
            device.zone_id = 1;
            device.set_output(OutputBehaviour::light());
            found.push(device);
        }
        for i in 0..self.population.shades {
            let name = format!("demo shade {}", i + 1);
            let dsuid = DsUid::from_name_in_space(&format!("demo/shade/{i}"), &DSUID_NAMESPACE);
            let mut device = Device::new(dsuid, &name);
            device.zone_id = 1;
            device.set_output(OutputBehaviour::shadow(ShadowKind::Jalousie));
            found.push(device);
        }
        for i in 0..self.population.buttons {
            let name = format!("demo button {}", i + 1);
            let dsuid = DsUid::from_name_in_space(&format!("demo/button/{i}"), &DSUID_NAMESPACE);
            let mut device = Device::new(dsuid, &name);
            device.zone_id = 1;
            device.add_button(ButtonBehaviour::new("", 0, ButtonSettings::default()));
            found.push(device);
        }
        info!(devices = found.len(), "demo scan complete");
        Ok(found)
    }
}
