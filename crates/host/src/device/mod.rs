// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device core: identity, behaviours, and the pipelines that serialize
//! hardware access and execute scene/dim notifications.
//!
//! A device owns at most one output, plus vectors of buttons, binary
//! inputs and sensors, and an optional scene table. All hardware access
//! goes through the apply/update serializer (`serializer.rs`); scene calls
//! and dimming go through the two-phase prepare/execute pipeline
//! (`scenes.rs`).

mod serializer;
mod scenes;

pub use serializer::{ApplySerializer, DoneTag};
pub use scenes::{DimState, NotifyType, PreparedOp, DEFAULT_DIM_AUTOSTOP, EMERGENCY_DIM_AUTOSTOP};

use std::time::Duration;

use tracing::debug;
use vdcapi::frames::{ChannelType, DsGroup, ZoneId};
use vdcapi::DsUid;

use crate::behaviour::button::{ActionMode, ButtonBehaviour, ButtonDeviceCtx, ButtonSignal, ClickType};
use crate::behaviour::shadow::ShadowEvent;
use crate::behaviour::{auto_id, BehaviourKind, BinaryInputBehaviour, OutputBehaviour, SensorBehaviour};
use crate::clock::{earliest, MonoTime};
use crate::persist::{FieldDef, ParamStore, PersistedParams, RowReader, StatementBuilder};
use crate::scene::{SceneNo, SceneTable};

/// dS color class of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    YellowLight,
    GreyShadow,
    BlueClimate,
    CyanAudio,
    MagentaVideo,
    RedSecurity,
    GreenAccess,
    BlackJoker,
    WhiteSingle,
}

impl ColorClass {
    pub fn from_group(group: DsGroup) -> ColorClass {
        match group {
            DsGroup::YellowLight => ColorClass::YellowLight,
            DsGroup::GreyShadow => ColorClass::GreyShadow,
            DsGroup::BlueHeating => ColorClass::BlueClimate,
            DsGroup::CyanAudio => ColorClass::CyanAudio,
            DsGroup::MagentaVideo => ColorClass::MagentaVideo,
            DsGroup::RedSecurity => ColorClass::RedSecurity,
            DsGroup::GreenAccess => ColorClass::GreenAccess,
            DsGroup::BlackVariable => ColorClass::BlackJoker,
            DsGroup::Undefined => ColorClass::WhiteSingle,
        }
    }
}

/// Result of a backend call: either it finished synchronously or the
/// completion will be delivered later (and the watchdog covers it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Done,
    Pending,
}

/// Hardware access of one backend kind. Implementations push values to the
/// real device technology; the engine never talks to hardware directly.
pub trait DeviceBackend {
    /// Push pending channel values into the hardware. Implementations
    /// confirm each channel they pushed via `value_applied`.
    fn apply_channel_values(&mut self, dsuid: &DsUid, output: &mut OutputBehaviour, for_dimming: bool) -> BackendOp;

    /// Read current hardware values back into the channels (via
    /// `sync_value`).
    fn sync_channel_values(&mut self, dsuid: &DsUid, output: &mut OutputBehaviour) -> BackendOp;

    /// Change shade movement: -1 down, 0 stop, +1 up.
    fn change_movement(&mut self, dsuid: &DsUid, direction: i8) -> BackendOp {
        let _ = (dsuid, direction);
        BackendOp::Done
    }
}

/// Things a device operation asks its owner to do.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEffect {
    /// This device finished its part of a notification delivery.
    DeliveryDone(u64),
    /// An API request waiting on this device can be answered.
    RequestDone(u64),
    /// Output state changed; push channel states to bridge observers.
    OutputStateChanged,
    /// A button produced a click event for upstream processing.
    ButtonClick { index: usize, click: ClickType },
    /// A button fired a direct scene action.
    ButtonAction { index: usize, mode: ActionMode, action_id: SceneNo },
}

/// One addressable endpoint of a vDC.
#[derive(Debug)]
pub struct Device {
    pub dsuid: DsUid,
    pub name: String,
    pub zone_id: ZoneId,
    pub color_class: ColorClass,
    pub buttons: Vec<ButtonBehaviour>,
    pub inputs: Vec<BinaryInputBehaviour>,
    pub sensors: Vec<SensorBehaviour>,
    pub output: Option<OutputBehaviour>,
    pub scenes: Option<SceneTable>,
    /// Announced to the connected controller at this time, if at all.
    pub announced_at: Option<MonoTime>,
    /// Last announce attempt, for re-announce pacing.
    pub announce_attempt: Option<MonoTime>,

    pub(crate) serializer: ApplySerializer,
    pub(crate) dim: DimState,
    pub(crate) prepared: Option<PreparedOp>,
    pub(crate) prepared_transition: Option<Duration>,
    /// Captured output state for undo, keyed by the scene that replaced it.
    pub(crate) previous_state: Option<crate::scene::Scene>,
    /// Delivery still waiting for scene actions of an earlier call.
    pub(crate) scene_action_waiter: Option<u64>,
}

impl Device {
    pub fn new(dsuid: DsUid, name: impl Into<String>) -> Self {
        Self {
            dsuid,
            name: name.into(),
            zone_id: 0,
            color_class: ColorClass::WhiteSingle,
            buttons: Vec::new(),
            inputs: Vec::new(),
            sensors: Vec::new(),
            output: None,
            scenes: None,
            announced_at: None,
            announce_attempt: None,
            serializer: ApplySerializer::default(),
            dim: DimState::default(),
            prepared: None,
            prepared_transition: None,
            previous_state: None,
            scene_action_waiter: None,
        }
    }

    /// Install the output and create the matching scene table.
    pub fn set_output(&mut self, output: OutputBehaviour) {
        self.color_class = ColorClass::from_group(output.default_group);
        self.scenes = Some(SceneTable::new(output.num_channels()));
        self.output = Some(output);
    }

    pub fn add_button(&mut self, mut button: ButtonBehaviour) {
        button.index = self.buttons.len();
        if button.id.is_empty() {
            button.id = auto_id(BehaviourKind::Button, button.index);
        }
        self.buttons.push(button);
    }

    pub fn add_input(&mut self, mut input: BinaryInputBehaviour) {
        input.index = self.inputs.len();
        if input.id.is_empty() {
            input.id = auto_id(BehaviourKind::BinaryInput, input.index);
        }
        self.inputs.push(input);
    }

    pub fn add_sensor(&mut self, mut sensor: SensorBehaviour) {
        sensor.index = self.sensors.len();
        if sensor.id.is_empty() {
            sensor.id = auto_id(BehaviourKind::Sensor, sensor.index);
        }
        self.sensors.push(sensor);
    }

    /// Color class shown to users: the output's group wins, otherwise the
    /// first input behaviour's group, otherwise the configured class.
    pub fn dominant_color_class(&self) -> ColorClass {
        if let Some(output) = &self.output {
            return ColorClass::from_group(output.default_group);
        }
        if let Some(button) = self.buttons.first() {
            return ColorClass::from_group(button.settings.group);
        }
        if let Some(input) = self.inputs.first() {
            return ColorClass::from_group(input.group);
        }
        self.color_class
    }

    /// Resolve a channel index by type or id string.
    pub fn channel_index(&self, channel_type: Option<ChannelType>, channel_id: Option<&str>) -> Option<usize> {
        let output = self.output.as_ref()?;
        if let Some(id) = channel_id {
            return output.channel_index_by_id(id);
        }
        output.channel_index_by_type(channel_type.unwrap_or(ChannelType::Default))
    }

    pub fn output_on(&self) -> bool {
        self.output.as_ref().map(|o| o.is_on()).unwrap_or(false)
    }

    pub fn dim_state(&self) -> &DimState {
        &self.dim
    }

    pub fn serializer(&self) -> &ApplySerializer {
        &self.serializer
    }

    fn button_ctx(&self) -> ButtonDeviceCtx {
        ButtonDeviceCtx { output_on: self.output_on() }
    }

    /// Feed a raw press/release report into a button behaviour.
    pub fn handle_button_input(
        &mut self,
        index: usize,
        pressed: bool,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let ctx = self.button_ctx();
        let Some(button) = self.buttons.get_mut(index) else { return };
        let signals = button.update_button_state(pressed, now, ctx);
        self.process_button_signals(index, signals, backend, now, effects);
    }

    /// Feed an already-classified click into a button behaviour.
    pub fn handle_button_click_injection(
        &mut self,
        index: usize,
        click: ClickType,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let ctx = self.button_ctx();
        let Some(button) = self.buttons.get_mut(index) else { return };
        let signals = button.inject_click(click, now, ctx);
        self.process_button_signals(index, signals, backend, now, effects);
    }

    fn process_button_signals(
        &mut self,
        index: usize,
        signals: Vec<ButtonSignal>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        for signal in signals {
            match signal {
                ButtonSignal::Click(click) => {
                    effects.push(DeviceEffect::ButtonClick { index, click });
                }
                ButtonSignal::Action { mode, action_id } => {
                    effects.push(DeviceEffect::ButtonAction { index, mode, action_id });
                }
                ButtonSignal::LocalSwitch { up } => {
                    debug!(device = %self.dsuid, up, "local button switches output");
                    if let Some(output) = self.output.as_mut() {
                        if let Some(primary) = output.channel_by_index_mut(0) {
                            let v = if up { primary.max() } else { primary.min() };
                            primary.set_value(v, Duration::ZERO, false);
                        }
                        self.request_applying_channels(None, false, backend, now, effects);
                    }
                }
                ButtonSignal::LocalDim(mode) => {
                    self.dim_channel(0, mode, true, backend, now, effects);
                }
            }
        }
    }

    /// Drive the shade sequencer and translate its events: movement
    /// commands go to the backend (synchronous backends confirm inline),
    /// apply confirmations feed the serializer.
    pub(crate) fn pump_shadow(
        &mut self,
        initial: Vec<ShadowEvent>,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let mut queue = initial;
        while !queue.is_empty() {
            let mut next = Vec::new();
            for event in queue {
                match event {
                    ShadowEvent::Command(direction) => {
                        let op = backend.change_movement(&self.dsuid, direction);
                        if op == BackendOp::Done {
                            if let Some(output) = self.output.as_mut() {
                                if let Some((seq, pos, ang)) = output.shadow_parts() {
                                    seq.movement_confirmed(now, pos, ang, &mut next);
                                }
                            }
                        }
                    }
                    ShadowEvent::ApplyDone => {
                        self.applying_channels_complete(backend, now, effects);
                    }
                    ShadowEvent::Progress => {
                        effects.push(DeviceEffect::OutputStateChanged);
                    }
                }
            }
            queue = next;
        }
    }

    /// Hardware end contact report for shade devices.
    pub fn end_reached(
        &mut self,
        top: bool,
        backend: &mut dyn DeviceBackend,
        now: MonoTime,
        effects: &mut Vec<DeviceEffect>,
    ) {
        let mut events = Vec::new();
        if let Some(output) = self.output.as_mut() {
            if let Some((seq, pos, ang)) = output.shadow_parts() {
                seq.end_reached(now, top, pos, ang, &mut events);
            }
        }
        self.pump_shadow(events, backend, now, effects);
    }

    /// Earliest deadline over all of this device's machinery.
    pub fn next_wakeup(&self) -> Option<MonoTime> {
        let mut at = self.serializer.next_wakeup();
        at = earliest(at, self.dim.next_wakeup());
        for b in &self.buttons {
            at = earliest(at, b.next_wakeup());
        }
        if let Some(output) = &self.output {
            at = earliest(at, output.next_wakeup());
        }
        at
    }

    /// Process all due deadlines.
    pub fn tick(&mut self, now: MonoTime, backend: &mut dyn DeviceBackend, effects: &mut Vec<DeviceEffect>) {
        // buttons
        let ctx = self.button_ctx();
        let mut button_signals = Vec::new();
        for (i, b) in self.buttons.iter_mut().enumerate() {
            if b.next_wakeup().is_some_and(|at| at <= now) {
                button_signals.push((i, b.tick(now, ctx)));
            }
        }
        for (i, signals) in button_signals {
            self.process_button_signals(i, signals, backend, now, effects);
        }
        // serializer watchdog
        self.serializer_tick(now, backend, effects);
        // dimming (auto-stop and generic stepping)
        self.dim_tick(now, backend, effects);
        // shade sequencer
        let mut events = Vec::new();
        if let Some(output) = self.output.as_mut() {
            if let Some((seq, pos, ang)) = output.shadow_parts() {
                if seq.next_wakeup().is_some_and(|at| at <= now) {
                    seq.tick(now, pos, ang, &mut events);
                }
            }
        }
        if !events.is_empty() {
            self.pump_shadow(events, backend, now, effects);
        }
    }
}

// -- persistence --------------------------------------------------------------

const DEVICE_FIELDS: &[FieldDef] = &[FieldDef::text("deviceName"), FieldDef::integer("zoneId")];

impl PersistedParams for Device {
    fn table_name(&self) -> &'static str {
        "deviceSettings"
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        DEVICE_FIELDS
    }

    fn load_from_row(&mut self, row: &mut RowReader<'_>, _common_flags: &mut u64) -> crate::error::HostResult<()> {
        self.name = row.next_text()?;
        self.zone_id = row.next_integer()?.clamp(0, i64::from(u16::MAX)) as ZoneId;
        Ok(())
    }

    fn bind_to_statement(&self, stmt: &mut StatementBuilder, _parent_id: &str, _common_flags: u64) {
        stmt.bind_text(self.name.clone());
        stmt.bind_integer(i64::from(self.zone_id));
    }
}

impl Device {
    /// Persist settings of the device and all its behaviours. Volatile
    /// state (machine states, serializer flags, estimates) never hits the
    /// store.
    pub fn save_settings(&self, store: &mut ParamStore) {
        let parent = self.dsuid.to_string();
        store.save(self, &parent, 0);
        for button in &self.buttons {
            store.save(&button.settings, &format!("{parent}_{}", button.id), 0);
        }
        if let Some(table) = &self.scenes {
            for no in table.configured_scenes() {
                let scene = table.scene(no);
                store.save(&scene, &parent, 0);
            }
        }
    }

    /// Restore persisted settings into this (freshly constructed) device.
    pub fn load_settings(&mut self, store: &ParamStore) -> crate::error::HostResult<()> {
        let parent = self.dsuid.to_string();
        let mut flags = 0u64;
        store.load(self, &parent, &mut flags)?;
        for button in &mut self.buttons {
            store.load(&mut button.settings, &format!("{parent}_{}", button.id), &mut flags)?;
        }
        if let Some(table) = self.scenes.as_mut() {
            let num_channels = table.num_channels();
            for key in store.list_keys("sceneTable", &parent) {
                let Ok(no) = key.parse::<SceneNo>() else { continue };
                let mut scene = crate::scene::Scene::new(no, num_channels);
                if store.load(&mut scene, &parent, &mut flags)? {
                    table.update_scene(scene);
                }
            }
        }
        Ok(())
    }

    /// Drop everything persisted for this device (removal with forget).
    pub fn forget_settings(&self, store: &mut ParamStore) {
        let parent = self.dsuid.to_string();
        for button in &self.buttons {
            store.forget_parent(&format!("{parent}_{}", button.id));
        }
        store.forget_parent(&parent);
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod device_tests;
