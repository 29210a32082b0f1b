// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scene-call and dim pipelines of a device.
//!
//! Notifications execute in two phases so the vDC-level optimizer can
//! coalesce per-device applies into hardware-native batch actions: prepare
//! evaluates kind rules, priorities and the undo capture and reports
//! whether the device participates; execute loads the values and pushes
//! them through the serializer (or skips the push when a native action
//! covered it).

use std::time::Duration;

use tracing::{debug, info, trace, warn};
use vdcapi::frames::DimMode;

use crate::clock::{earliest, MonoTime};
use crate::scene::{self, Scene, SceneCmd, SceneNo};

use super::{Device, DeviceBackend, DeviceEffect, DoneTag};

/// Generic dimming step cadence.
const DIM_STEP_INTERVAL: Duration = Duration::from_millis(300);
/// Auto-stop for dimming that is not retriggered.
pub const DEFAULT_DIM_AUTOSTOP: Duration = Duration::from_secs(5);
/// Emergency cap for dimming explicitly started without auto-stop.
pub const EMERGENCY_DIM_AUTOSTOP: Duration = Duration::from_secs(300);
/// Auto-stop window for legacy increment/decrement scene dimming.
const LEGACY_DIM_STEP_TIMEOUT: Duration = Duration::from_millis(400);

/// What the optimizer has to apply for a prepared device, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyType {
    /// Device does not participate in this notification.
    None,
    CallScene,
    DimChannel,
    /// Same dim retriggered: only the auto-stop timer was re-armed; an
    /// optimized repeater must be rescheduled.
    Retrigger,
}

/// Operation prepared on a device, consumed by the execute phase.
#[derive(Debug, Clone)]
pub enum PreparedOp {
    Scene { scene: Scene },
    Dim,
}

/// Dimming state of a device.
#[derive(Debug)]
pub struct DimState {
    pub current_mode: DimMode,
    pub current_channel: usize,
    autostop_after: Duration,
    autostop_at: Option<MonoTime>,
    /// Last area a dim was requested for, even when suppressed; continues
    /// of another area must not restart this one.
    pub area_dimmed: i8,
    pub area_dim_mode: DimMode,
    // generic stepping
    is_dimming: bool,
    step_at: Option<MonoTime>,
    increment: f64,
}

impl Default for DimState {
    fn default() -> Self {
        Self {
            current_mode: DimMode::Stop,
            current_channel: 0,
            autostop_after: DEFAULT_DIM_AUTOSTOP,
            autostop_at: None,
            area_dimmed: 0,
            area_dim_mode: DimMode::Stop,
            is_dimming: false,
            step_at: None,
            increment: 0.0,
        }
    }
}

impl DimState {
    pub fn next_wakeup(&self) -> Option<MonoTime> {
        earliest(self.autostop_at, self.step_at)
    }
}

impl Device {
    /// Device-level veto hook before a scene call is applied.
    fn prepare_scene_call(&mut self, _scene: &Scene) -> bool {
        true
    }

    /// Device-level hook before prepared values go to the hardware.
    fn prepare_scene_apply(&mut self, _scene: &Scene) -> bool {
        true
    }

    /// Prepare a scene call. Returns what the execute phase has to apply.
    pub fn call_scene_prepare(
        &mut self,
        scene_no: SceneNo,
        force: bool,
        transition_override: Option<Duration>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) -> NotifyType {
        self.finish_scene_action_waiting(effects);
        self.prepared = None;
        self.prepared_transition = transition_override;
        if self.output.is_none() || self.scenes.is_none() {
            return NotifyType::None;
        }
        let scene = match &self.scenes {
            Some(table) => table.scene(scene_no),
            None => return NotifyType::None,
        };
        let area = scene.area();
        match scene.cmd() {
            SceneCmd::AreaContinue => {
                // continue area dimming only if this device was dimming there
                if self.dim.area_dimmed != 0 && self.dim.area_dim_mode != DimMode::Stop {
                    let mode = self.dim.area_dim_mode;
                    let dimmed_area = self.dim.area_dimmed;
                    return self.dim_channel_prepare(
                        Some(0),
                        mode,
                        dimmed_area,
                        LEGACY_DIM_STEP_TIMEOUT,
                        None,
                        backend,
                        now,
                        effects,
                    );
                }
                return NotifyType::None;
            }
            SceneCmd::Increment => {
                return self.dim_channel_prepare(
                    Some(0),
                    DimMode::Up,
                    area as i8,
                    LEGACY_DIM_STEP_TIMEOUT,
                    None,
                    backend,
                    now,
                    effects,
                );
            }
            SceneCmd::Decrement => {
                return self.dim_channel_prepare(
                    Some(0),
                    DimMode::Down,
                    area as i8,
                    LEGACY_DIM_STEP_TIMEOUT,
                    None,
                    backend,
                    now,
                    effects,
                );
            }
            SceneCmd::Stop => {
                return self.dim_channel_prepare(
                    Some(0),
                    DimMode::Stop,
                    area as i8,
                    Duration::ZERO,
                    None,
                    backend,
                    now,
                    effects,
                );
            }
            _ => {}
        }
        // any non-dimming scene call stops dimming in progress first
        if self.dim.current_mode != DimMode::Stop {
            info!(device = %self.dsuid, scene = scene_no, "scene call interrupts dimming");
            let channel = self.dim.current_channel;
            self.dim_channel_prepare(
                Some(channel),
                DimMode::Stop,
                area as i8,
                Duration::ZERO,
                None,
                backend,
                now,
                effects,
            );
            self.dim_channel_execute_prepared(NotifyType::DimChannel, None, backend, now, effects);
        }
        self.call_scene_prepare_2(scene, force, backend, now, effects)
    }

    fn call_scene_prepare_2(
        &mut self,
        scene: Scene,
        force: bool,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) -> NotifyType {
        let scene_no = scene.scene_no;
        let area = scene.area();
        debug!(device = %self.dsuid, scene = scene_no, "evaluating scene call");
        if area != 0 {
            // membership in an area is decided by the area-on scene's
            // dontCare flag; other flags are irrelevant here
            let area_main = self
                .scenes
                .as_ref()
                .map(|t| t.scene(scene::main_scene_for_area(area)))
                .filter(|s| !s.dont_care);
            if area_main.is_none() {
                trace!(device = %self.dsuid, area, "not in area, scene suppressed");
                return NotifyType::None;
            }
            if scene.cmd() == SceneCmd::Off {
                // area switched off ends local priority
                if let Some(output) = self.output.as_mut() {
                    output.set_local_priority(false);
                }
            }
        }
        if scene.dont_care {
            // not applied, but scene actions may still run
            self.scene_values_applied(None, scene_no, backend, now, effects);
            return NotifyType::None;
        }
        let local_priority = self.output.as_ref().is_some_and(|o| o.has_local_priority());
        if area == 0 && local_priority {
            if !force && !scene.ignore_local_priority {
                trace!(device = %self.dsuid, scene = scene_no, "suppressed by local priority");
                return NotifyType::None;
            }
            // forced or priority-ignoring call clears local priority
            if let Some(output) = self.output.as_mut() {
                output.set_local_priority(false);
            }
        }
        info!(device = %self.dsuid, scene = scene_no, "affected by scene call");
        // capture current state for undo; important scenes refresh from
        // hardware first so the capture is exact
        if scene::precise_undo_important(scene_no) {
            self.request_updating_channels(None, backend, now, effects);
        }
        let mut undo = match &self.scenes {
            Some(table) => table.new_undo_state_scene(scene_no),
            None => return NotifyType::None,
        };
        if let Some(output) = &self.output {
            output.capture_scene(&mut undo);
        }
        self.previous_state = Some(undo);
        if self.prepare_scene_call(&scene) {
            self.prepared = Some(PreparedOp::Scene { scene });
            NotifyType::CallScene
        } else {
            trace!(device = %self.dsuid, "device-level prepare vetoed scene apply");
            self.prepared = None;
            NotifyType::None
        }
    }

    /// Execute a prepared scene call. With `NotifyType::None` the optimizer
    /// already covered the hardware, so channels count as applied.
    pub fn call_scene_execute_prepared(
        &mut self,
        what_to_apply: NotifyType,
        delivery: Option<u64>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        if let Some(PreparedOp::Scene { scene }) = self.prepared.take() {
            let scene_no = scene.scene_no;
            let transition = self.prepared_transition;
            let changed = self
                .output
                .as_mut()
                .map(|o| o.apply_scene_to_channels(&scene, transition))
                .unwrap_or(false);
            if changed && self.prepare_scene_apply(&scene) {
                if what_to_apply != NotifyType::None {
                    self.request_applying_channels(
                        Some(DoneTag::SceneActions { delivery, scene_no }),
                        false,
                        backend,
                        now,
                        effects,
                    );
                } else {
                    // vdc-level native action already executed this
                    if let Some(output) = self.output.as_mut() {
                        output.all_channels_applied(true);
                    }
                    self.scene_values_applied(delivery, scene_no, backend, now, effects);
                }
                return;
            }
            // nothing to push, proceed straight to scene actions
            self.scene_values_applied(delivery, scene_no, backend, now, effects);
            return;
        }
        if let Some(id) = delivery {
            effects.push(DeviceEffect::DeliveryDone(id));
        }
    }

    /// Discard whatever was prepared but not executed.
    pub fn release_prepared_operation(&mut self) {
        self.prepared = None;
    }

    pub(crate) fn scene_values_applied(
        &mut self,
        delivery: Option<u64>,
        scene_no: SceneNo,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let _ = (backend, now);
        // scene actions are best-effort: a still-pending waiter from an
        // earlier call is confirmed instead of serialized behind this one
        self.confirm_scene_actions_complete(effects);
        self.scene_action_waiter = delivery;
        self.perform_scene_actions(scene_no, effects);
    }

    fn perform_scene_actions(&mut self, scene_no: SceneNo, effects: &mut Vec<DeviceEffect>) {
        // base outputs have no long-running actions; specialized outputs
        // (blinking alerts etc.) hook in here
        trace!(device = %self.dsuid, scene = scene_no, "scene actions complete");
        self.confirm_scene_actions_complete(effects);
    }

    fn confirm_scene_actions_complete(&mut self, effects: &mut Vec<DeviceEffect>) {
        if let Some(delivery) = self.scene_action_waiter.take() {
            effects.push(DeviceEffect::DeliveryDone(delivery));
        }
    }

    pub(crate) fn finish_scene_action_waiting(&mut self, effects: &mut Vec<DeviceEffect>) {
        if self.scene_action_waiter.is_some() {
            warn!(device = %self.dsuid, "scene actions of earlier call still pending, confirming now");
            self.confirm_scene_actions_complete(effects);
        }
    }

    /// Prepare dimming. `channel_index` of `None` resolves to the default
    /// channel; `area` -1 skips the local-priority check (identify use).
    #[allow(clippy::too_many_arguments)]
    pub fn dim_channel_prepare(
        &mut self,
        channel_index: Option<usize>,
        mode: DimMode,
        area: i8,
        auto_stop_after: Duration,
        dim_per_ms_override: Option<f64>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) -> NotifyType {
        let Some(channel) = channel_index else { return NotifyType::None };
        let can_dim = self.output.as_ref().is_some_and(|o| o.can_dim(channel));
        if mode != DimMode::Stop && !can_dim {
            trace!(device = %self.dsuid, channel, "output does not allow dimming this channel now");
            return NotifyType::None;
        }
        // remember the area of the last dim request even when suppressed,
        // so a continue for another area does not restart this one
        self.dim.area_dimmed = area.max(0);
        self.dim.area_dim_mode = DimMode::Stop;
        if area > 0 {
            if let Some(table) = &self.scenes {
                let area_main = table.scene(scene::main_scene_for_area(area as u8));
                if area_main.dont_care {
                    trace!(device = %self.dsuid, area, "not in area, dim suppressed");
                    return NotifyType::None;
                }
            }
            self.dim.area_dim_mode = mode;
        } else if area == 0 && self.output.as_ref().is_some_and(|o| o.has_local_priority()) {
            trace!(device = %self.dsuid, "non-area dimming suppressed by local priority");
            return NotifyType::None;
        }
        if mode == DimMode::Stop {
            self.stop_scene_actions();
        }
        self.finish_scene_action_waiting(effects);
        if mode != self.dim.current_mode || channel != self.dim.current_channel {
            if mode != DimMode::Stop {
                if self.dim.current_mode != DimMode::Stop {
                    // direction or channel change without a stop first
                    let prev = self.dim.current_channel;
                    self.dim_channel(prev, DimMode::Stop, true, backend, now, effects);
                }
                if let Some(output) = self.output.as_mut() {
                    if let Some(ch) = output.channel_by_index_mut(channel) {
                        ch.set_custom_dim_per_ms(dim_per_ms_override);
                    }
                }
            } else if let Some(output) = self.output.as_mut() {
                if let Some(ch) = output.channel_by_index_mut(channel) {
                    ch.set_custom_dim_per_ms(None);
                }
            }
            self.dim.current_mode = mode;
            self.dim.current_channel = channel;
            self.dim.autostop_after = auto_stop_after;
            self.prepared = Some(PreparedOp::Dim);
            NotifyType::DimChannel
        } else if mode != DimMode::Stop {
            // same dim retriggered: just re-arm the auto-stop and tell the
            // optimizer to reschedule its repeater
            self.dim.autostop_after = auto_stop_after;
            self.dim.autostop_at = Some(now + auto_stop_after);
            NotifyType::Retrigger
        } else {
            NotifyType::None
        }
    }

    /// Execute prepared dimming. With `NotifyType::None` the hardware side
    /// is already covered by an optimized native action.
    pub fn dim_channel_execute_prepared(
        &mut self,
        what_to_apply: NotifyType,
        delivery: Option<u64>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        if matches!(self.prepared, Some(PreparedOp::Dim)) {
            self.prepared = None;
            let channel = self.dim.current_channel;
            let mode = self.dim.current_mode;
            self.dim_channel(channel, mode, what_to_apply != NotifyType::None, backend, now, effects);
            if what_to_apply != NotifyType::None {
                if mode != DimMode::Stop {
                    self.dim.autostop_at = Some(now + self.dim.autostop_after);
                } else {
                    self.dim.autostop_at = None;
                }
            }
        }
        if let Some(id) = delivery {
            effects.push(DeviceEffect::DeliveryDone(id));
        }
    }

    /// During optimized dimming: bring the device state back to stopped
    /// without touching the hardware (the native action does that).
    pub fn dim_repeat_prepare(&mut self) {
        if self.dim.current_mode != DimMode::Stop {
            self.dim.current_mode = DimMode::Stop;
            self.dim.autostop_at = None;
            self.prepared = Some(PreparedOp::Dim);
        }
    }

    /// Start/stop actual dimming. The generic implementation steps the
    /// channel periodically; shade outputs hand over to the sequencer.
    pub(crate) fn dim_channel(
        &mut self,
        channel_index: usize,
        mode: DimMode,
        do_apply: bool,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        debug!(device = %self.dsuid, channel = channel_index, ?mode, "dim channel");
        let is_shadow = self.output.as_ref().is_some_and(|o| o.is_shadow());
        match mode {
            DimMode::Stop => {
                self.dim.is_dimming = false;
                self.dim.step_at = None;
                if is_shadow {
                    let mut events = Vec::new();
                    if let Some(output) = self.output.as_mut() {
                        if let Some((seq, pos, ang)) = output.shadow_parts() {
                            seq.dim_blind(now, None, pos, ang, &mut events);
                        }
                    }
                    self.pump_shadow(events, backend, now, effects);
                } else if let Some(output) = self.output.as_mut() {
                    output.stop_transitions();
                }
            }
            DimMode::Up | DimMode::Down => {
                if !do_apply {
                    // optimized native dimming already moves the hardware
                    return;
                }
                if is_shadow {
                    let mut events = Vec::new();
                    if let Some(output) = self.output.as_mut() {
                        if let Some((seq, pos, ang)) = output.shadow_parts() {
                            seq.dim_blind(now, Some(mode == DimMode::Up), pos, ang, &mut events);
                        }
                    }
                    self.pump_shadow(events, backend, now, effects);
                } else {
                    let Some(output) = self.output.as_mut() else { return };
                    let Some(ch) = output.channel_by_index_mut(channel_index) else { return };
                    let per_ms = ch.dim_per_ms();
                    let step = DIM_STEP_INTERVAL.as_millis() as f64 * per_ms;
                    let increment = if mode == DimMode::Up { step } else { -step };
                    self.dim.increment = increment;
                    self.dim.is_dimming = true;
                    ch.dim_value(increment, DIM_STEP_INTERVAL, now);
                    self.dim.step_at = Some(now + DIM_STEP_INTERVAL);
                    self.request_applying_channels(None, true, backend, now, effects);
                }
            }
        }
    }

    /// Deadline processing for dimming: the auto-stop timeout and the
    /// generic step cadence.
    pub(crate) fn dim_tick(&mut self, now: MonoTime, backend: &mut dyn DeviceBackend, effects: &mut Vec<DeviceEffect>) {
        if self.dim.autostop_at.is_some_and(|at| at <= now) {
            self.dim.autostop_at = None;
            let channel = self.dim.current_channel;
            debug!(device = %self.dsuid, "dim auto-stop");
            self.dim_channel(channel, DimMode::Stop, true, backend, now, effects);
            self.dim.current_mode = DimMode::Stop;
        }
        if self.dim.is_dimming {
            if let Some(mut at) = self.dim.step_at {
                if at <= now {
                    let channel = self.dim.current_channel;
                    let increment = self.dim.increment;
                    if let Some(output) = self.output.as_mut() {
                        if let Some(ch) = output.channel_by_index_mut(channel) {
                            ch.dim_value(increment, DIM_STEP_INTERVAL, now);
                            // catch up on steps missed by a slow apply
                            while at + DIM_STEP_INTERVAL < now {
                                ch.dim_value(increment, DIM_STEP_INTERVAL, now);
                                at += DIM_STEP_INTERVAL;
                            }
                        }
                    }
                    self.dim.step_at = Some(at + DIM_STEP_INTERVAL);
                    self.request_applying_channels(None, true, backend, now, effects);
                }
            }
        }
    }

    fn stop_scene_actions(&mut self) {
        // specialized outputs stop blinking etc. here; transitions stop in
        // all cases
        if let Some(output) = self.output.as_mut() {
            output.stop_transitions();
        }
    }

    /// Stop transitions and any generic dimming (scene stop command).
    pub fn stop_transitions(&mut self) {
        self.dim.is_dimming = false;
        self.dim.step_at = None;
        if let Some(output) = self.output.as_mut() {
            output.stop_transitions();
        }
    }

    /// Undo a scene call: restore the output state captured before it.
    pub fn undo_scene(
        &mut self,
        scene_no: SceneNo,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        info!(device = %self.dsuid, scene = scene_no, "undo scene");
        let Some(previous) = self.previous_state.clone() else { return };
        if previous.scene_no != scene_no {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            // restore with no transition: undo is bit-exact
            output.apply_scene_to_channels(&previous, Some(Duration::ZERO));
            if self.prepare_scene_apply(&previous) {
                self.request_applying_channels(None, false, backend, now, effects);
            }
        }
    }

    /// Flag this device's local priority if the scene applies to it.
    pub fn set_local_priority(&mut self, scene_no: SceneNo) {
        let applies = self
            .scenes
            .as_ref()
            .map(|t| !t.scene(scene_no).dont_care)
            .unwrap_or(false);
        if applies {
            debug!(device = %self.dsuid, scene = scene_no, "local priority set");
            if let Some(output) = self.output.as_mut() {
                output.set_local_priority(true);
            }
        }
    }

    /// Call a scene only to guarantee a minimum on-level.
    pub fn call_scene_min(
        &mut self,
        scene_no: SceneNo,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let applies = self
            .scenes
            .as_ref()
            .map(|t| !t.scene(scene_no).dont_care)
            .unwrap_or(false);
        if !applies {
            return;
        }
        info!(device = %self.dsuid, scene = scene_no, "call scene min");
        if let Some(output) = self.output.as_mut() {
            output.on_at_min_level();
            self.request_applying_channels(None, false, backend, now, effects);
        }
    }

    /// Capture the current output state into a scene and persist the area
    /// dontCare bookkeeping.
    pub fn save_scene(&mut self, scene_no: SceneNo) {
        let Some(output) = self.output.as_ref() else { return };
        let Some(table) = self.scenes.as_mut() else { return };
        info!(device = %self.dsuid, scene = scene_no, "save scene");
        let mut scene = table.scene(scene_no);
        output.capture_scene(&mut scene);
        let area = scene.area();
        if area != 0 && scene_no == scene::main_scene_for_area(area) {
            // saving an area-on scene with the default channel at zero
            // means "not in this area": mark both area scenes dontCare
            let must_be_dont_care = output
                .channel_by_index(0)
                .map(|c| c.value() == 0.0)
                .unwrap_or(false);
            scene.set_dont_care(must_be_dont_care);
            let mut off_scene = table.scene(scene::off_scene_for_area(area));
            off_scene.set_dont_care(must_be_dont_care);
            if off_scene.is_dirty() {
                table.update_scene(off_scene);
            }
        }
        if scene.is_dirty() {
            table.update_scene(scene);
        }
    }

    /// Control value from the upstream controller (e.g. heating levels):
    /// routed onto the channel with the matching id.
    pub fn process_control_value(
        &mut self,
        name: &str,
        value: f64,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) -> bool {
        let Some(output) = self.output.as_mut() else { return false };
        let Some(index) = output.channel_index_by_id(name) else { return false };
        if let Some(ch) = output.channel_by_index_mut(index) {
            ch.set_value(value, Duration::ZERO, false);
        }
        self.request_applying_channels(None, false, backend, now, effects);
        true
    }
}

#[cfg(test)]
#[path = "scenes_tests.rs"]
mod scenes_tests;
