// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device serialization of hardware access.
//!
//! Two directions compete for the hardware: applying channel values to it
//! and reading values back from it. At most one is in flight; a pending
//! apply absorbs newer apply requests (the previous requester is confirmed
//! as superseded, and exactly one follow-up apply runs afterwards with the
//! latest values), and an update requested while applying is answered from
//! the cache. A watchdog force-completes either direction so a stuck
//! backend can never deadlock the device.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::clock::MonoTime;
use crate::scene::SceneNo;

use super::{BackendOp, Device, DeviceBackend, DeviceEffect};

/// Watchdog on backend apply/update calls.
const SERIALIZER_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(20);

/// Completion token of a serialized operation. Resolved tokens surface as
/// [`DeviceEffect`]s once the operation (or its supersession) finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneTag {
    /// Continue a notification delivery.
    Delivery(u64),
    /// Answer an API request.
    Request(u64),
    /// Run scene actions for the given scene, then continue the delivery.
    SceneActions { delivery: Option<u64>, scene_no: SceneNo },
}

/// Serializer state attached to each device.
#[derive(Debug, Default)]
pub struct ApplySerializer {
    apply_in_progress: bool,
    update_in_progress: bool,
    missed_apply_attempts: u32,
    applied_or_superseded: Option<DoneTag>,
    apply_complete_waiters: Vec<DoneTag>,
    updated_or_cached: Option<DoneTag>,
    watchdog_at: Option<MonoTime>,
}

impl ApplySerializer {
    pub fn apply_in_progress(&self) -> bool {
        self.apply_in_progress
    }

    pub fn update_in_progress(&self) -> bool {
        self.update_in_progress
    }

    pub fn missed_apply_attempts(&self) -> u32 {
        self.missed_apply_attempts
    }

    pub fn next_wakeup(&self) -> Option<MonoTime> {
        self.watchdog_at
    }
}

impl Device {
    /// Request pushing the current channel values to the hardware.
    ///
    /// Three cases: applying already (previous requester is confirmed as
    /// superseded and one follow-up apply is coalesced), updating (the
    /// apply is queued behind the update), or idle (starts right away).
    pub fn request_applying_channels(
        &mut self,
        tag: Option<DoneTag>,
        for_dimming: bool,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let enabled = self.output.as_ref().map(|o| o.enabled).unwrap_or(false);
        if !enabled {
            // no output or disabled output: nothing will be applied
            if let Some(tag) = tag {
                self.resolve_tag(tag, backend, now, effects);
            }
            return;
        }
        if self.serializer.apply_in_progress {
            trace!(device = %self.dsuid, "apply requested while apply already running");
            if let Some(prev) = self.serializer.applied_or_superseded.take() {
                self.serializer.applied_or_superseded = tag;
                // confirm now: those values have been superseded
                self.resolve_tag(prev, backend, now, effects);
            } else {
                self.serializer.applied_or_superseded = tag;
            }
            self.serializer.missed_apply_attempts += 1;
            trace!(
                device = %self.dsuid,
                missed = self.serializer.missed_apply_attempts,
                "missed apply attempts"
            );
        } else if self.serializer.update_in_progress {
            trace!(device = %self.dsuid, "apply requested while update running, postponing");
            self.serializer.missed_apply_attempts += 1;
            self.serializer.applied_or_superseded = tag;
            self.serializer.apply_in_progress = true;
        } else {
            self.serializer.applied_or_superseded = tag;
            self.serializer.apply_in_progress = true;
            self.serializer.watchdog_at = Some(now + SERIALIZER_WATCHDOG_TIMEOUT);
            self.start_apply(for_dimming, backend, now, effects);
        }
    }

    /// Start the backend apply. Shade outputs route through the movement
    /// sequencer instead of a direct channel push.
    fn start_apply(
        &mut self,
        for_dimming: bool,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let is_sequenced_shadow =
            self.output.as_ref().is_some_and(|o| o.is_shadow() && !o.shadow_sequencer().is_some_and(|s| s.absolute_movement));
        if is_sequenced_shadow {
            let mut events = Vec::new();
            if let Some(output) = self.output.as_mut() {
                if let Some((seq, pos, ang)) = output.shadow_parts() {
                    seq.apply_blind_channels(now, pos, ang, for_dimming, &mut events);
                }
            }
            self.pump_shadow(events, backend, now, effects);
        } else {
            let Some(output) = self.output.as_mut() else { return };
            match backend.apply_channel_values(&self.dsuid, output, for_dimming) {
                BackendOp::Done => self.applying_channels_complete(backend, now, effects),
                BackendOp::Pending => {}
            }
        }
    }

    /// Wait for a fully completed apply (not just acceptance). Multiple
    /// waiters chain.
    pub fn wait_for_apply_complete(
        &mut self,
        tag: DoneTag,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        if !self.serializer.apply_in_progress {
            self.resolve_tag(tag, backend, now, effects);
        } else {
            self.serializer.apply_complete_waiters.push(tag);
        }
    }

    /// Backend finished (or watchdog forced) the apply.
    pub fn applying_channels_complete(
        &mut self,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        self.serializer.watchdog_at = None;
        self.serializer.apply_in_progress = false;
        if self.check_for_reapply(backend, now, effects) {
            return;
        }
        // finally applied: confirm requester and any complete-waiters
        if let Some(tag) = self.serializer.applied_or_superseded.take() {
            self.resolve_tag(tag, backend, now, effects);
        }
        let waiters = std::mem::take(&mut self.serializer.apply_complete_waiters);
        for tag in waiters {
            self.resolve_tag(tag, backend, now, effects);
        }
        // report channel changes to bridges, not to dS
        effects.push(DeviceEffect::OutputStateChanged);
    }

    /// After an apply or update finished: if apply requests were missed in
    /// between, run exactly one more apply with the latest values (and the
    /// most recent pending completion token).
    fn check_for_reapply(
        &mut self,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) -> bool {
        if self.serializer.missed_apply_attempts > 0 {
            debug!(
                device = %self.dsuid,
                missed = self.serializer.missed_apply_attempts,
                "reapplying to settle final channel values"
            );
            self.serializer.missed_apply_attempts = 0;
            self.serializer.apply_in_progress = false;
            let tag = self.serializer.applied_or_superseded.take();
            // final apply after missed requests must not optimize for dimming
            self.request_applying_channels(tag, false, backend, now, effects);
            return true;
        }
        false
    }

    /// Request reading hardware values back into the channels.
    ///
    /// While an apply runs, the cached values are authoritative and the
    /// requester is answered immediately; while an update runs, the
    /// previous requester is answered with the then-current values.
    pub fn request_updating_channels(
        &mut self,
        tag: Option<DoneTag>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        if self.serializer.update_in_progress {
            if let Some(prev) = self.serializer.updated_or_cached.take() {
                trace!(device = %self.dsuid, "answering previous update request with current values");
                self.serializer.updated_or_cached = tag;
                self.resolve_tag(prev, backend, now, effects);
            } else {
                self.serializer.updated_or_cached = tag;
            }
        } else if self.serializer.apply_in_progress {
            // cache is being written to hardware right now, it is current
            if let Some(tag) = tag {
                self.resolve_tag(tag, backend, now, effects);
            }
        } else {
            let Some(output) = self.output.as_mut() else {
                if let Some(tag) = tag {
                    self.resolve_tag(tag, backend, now, effects);
                }
                return;
            };
            self.serializer.updated_or_cached = tag;
            self.serializer.update_in_progress = true;
            self.serializer.watchdog_at = Some(now + SERIALIZER_WATCHDOG_TIMEOUT);
            match backend.sync_channel_values(&self.dsuid, output) {
                BackendOp::Done => self.updating_channels_complete(backend, now, effects),
                BackendOp::Pending => {}
            }
        }
    }

    /// Backend finished (or watchdog forced) the readback.
    pub fn updating_channels_complete(
        &mut self,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        self.serializer.watchdog_at = None;
        if self.serializer.update_in_progress {
            self.serializer.update_in_progress = false;
            if let Some(tag) = self.serializer.updated_or_cached.take() {
                self.resolve_tag(tag, backend, now, effects);
            }
        }
        // apply requests queued behind the update run now
        self.check_for_reapply(backend, now, effects);
    }

    /// Watchdog dispatch; forced completions log and proceed so a stuck
    /// backend cannot deadlock the pipeline.
    pub(crate) fn serializer_tick(
        &mut self,
        now: MonoTime,
        backend: &mut dyn DeviceBackend,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let Some(at) = self.serializer.watchdog_at else { return };
        if now < at {
            return;
        }
        self.serializer.watchdog_at = None;
        if self.serializer.apply_in_progress {
            warn!(
                device = %self.dsuid,
                missed = self.serializer.missed_apply_attempts,
                "watchdog force-ends apply"
            );
            self.serializer.missed_apply_attempts = 0;
            self.applying_channels_complete(backend, now, effects);
        }
        if self.serializer.update_in_progress {
            warn!(device = %self.dsuid, "watchdog force-ends update");
            self.updating_channels_complete(backend, now, effects);
        }
    }

    /// Resolve a completion token into its effect. Scene-action tokens run
    /// the best-effort action phase first.
    pub(crate) fn resolve_tag(
        &mut self,
        tag: DoneTag,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        match tag {
            DoneTag::Delivery(id) => effects.push(DeviceEffect::DeliveryDone(id)),
            DoneTag::Request(id) => effects.push(DeviceEffect::RequestDone(id)),
            DoneTag::SceneActions { delivery, scene_no } => {
                self.scene_values_applied(delivery, scene_no, backend, now, effects);
            }
        }
    }
}

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod serializer_tests;
