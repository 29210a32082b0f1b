// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end behavioral scenarios.
//!
//! Builds a complete host with the demo backend population and drives it
//! through its public surface: API frames in, outbox frames and device
//! state out, with time advanced manually through the host's own deadline
//! bookkeeping.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde_json::json;
use vdchost::api::session;
use vdchost::backends::demo::{DemoBackend, DemoPopulation};
use vdchost::clock::MonoTime;
use vdchost::host::VdcHost;
use vdchost::persist::ParamStore;
use vdchost::scripting::NullRunner;
use vdchost::vdc::Vdc;
use vdcapi::dsuid::DSUID_NAMESPACE;
use vdcapi::frames::Frame;
use vdcapi::DsUid;

pub const SESSION_CONNECTION: u64 = 1;

pub struct HostRig {
    pub host: VdcHost,
    pub now: MonoTime,
}

impl HostRig {
    /// Host with the given demo population, session already established.
    pub fn started(population: DemoPopulation) -> Self {
        let dsuid = DsUid::from_name_in_space("specs/host", &DSUID_NAMESPACE);
        let mut host = VdcHost::new(dsuid, "spec host", ParamStore::in_memory(), Box::new(NullRunner));
        let backend = DemoBackend::new(population);
        let vdc = Vdc::new(&host.dsuid, 0, "demo devices", Box::new(backend));
        let vdc_dsuid = host.add_vdc(vdc);
        let found = host
            .vdcs
            .get_mut(&vdc_dsuid)
            .unwrap()
            .backend
            .scan_for_devices(false)
            .unwrap();
        for device in found {
            host.add_device(&vdc_dsuid, device).unwrap();
        }
        let mut rig = Self { host, now: MonoTime::ZERO };
        rig.frame(json!({
            "id": 1,
            "method": "hello",
            "params": { "api_version": 3, "dSUID": DsUid::from_name_in_space("specs/vdsm", &DSUID_NAMESPACE).to_string() }
        }));
        rig.host.outbox.clear();
        rig
    }

    /// Feed one JSON frame into the session.
    pub fn frame(&mut self, value: serde_json::Value) {
        let frame: Frame = serde_json::from_value(value).unwrap();
        session::handle_frame(&mut self.host, SESSION_CONNECTION, frame, self.now);
    }

    /// Advance time, processing every deadline on the way.
    pub fn advance_to_ms(&mut self, target_ms: u64) {
        let target = MonoTime::from_millis(target_ms);
        while let Some(at) = self.host.next_wakeup() {
            if at > target {
                break;
            }
            self.now = at;
            self.host.tick(at);
        }
        self.now = target;
    }

    pub fn demo_device(&self, kind: &str, index: usize) -> DsUid {
        DsUid::from_name_in_space(&format!("demo/{kind}/{index}"), &DSUID_NAMESPACE)
    }

    pub fn brightness(&self, dsuid: &DsUid) -> f64 {
        self.channel_value(dsuid, 0)
    }

    pub fn channel_value(&self, dsuid: &DsUid, index: usize) -> f64 {
        self.host
            .device(dsuid)
            .and_then(|d| d.output.as_ref())
            .map(|o| o.channels()[index].value())
            .unwrap_or(f64::NAN)
    }
}
