// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Button behaviour: turns raw press/release reports into the canonical
//! click event stream (tips, multi-clicks, hold sequences).
//!
//! Four machines are selectable. The standard machine does full
//! click/hold/tip disambiguation; the simple machine tolerates lost
//! press/release events and only produces tips; the dimmer machine maps
//! press/release straight to hold start/end; the single machine emits one
//! tip per release. Devices that classify clicks in their own firmware
//! bypass the machines entirely through [`ButtonBehaviour::inject_click`].

use std::time::Duration;

use tracing::{debug, trace, warn};
use vdcapi::frames::{ChannelType, DimMode, DsGroup};

use crate::clock::MonoTime;
use crate::error::HostResult;
use crate::persist::{FieldDef, PersistedParams, RowReader, StatementBuilder};
use crate::scene::SceneNo;

const CLICK_LENGTH: Duration = Duration::from_millis(140);
const CLICK_PAUSE: Duration = Duration::from_millis(140);
const TIP_TIMEOUT: Duration = Duration::from_millis(800);
const DIM_REPEAT_TIME: Duration = Duration::from_millis(1000);
pub const DEFAULT_LONG_FUNCTION_DELAY: Duration = Duration::from_millis(500);
const MACHINE_RECHECK: Duration = Duration::from_millis(10);
const MAX_HOLD_REPEATS: u8 = 30;

/// Click events produced by the state machines. `Progress` and `Complete`
/// are bridge-side observability events and are not forwarded upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    Tip1x,
    Tip2x,
    Tip3x,
    Tip4x,
    HoldStart,
    HoldRepeat,
    HoldEnd,
    Click1x,
    Click2x,
    Click3x,
    ShortLong,
    LocalOff,
    LocalOn,
    ShortShortLong,
    LocalStop,
    Progress,
    Complete,
}

impl ClickType {
    /// Tip event for a 1-based tip count (wraps into the 1..4 range).
    pub fn tip(count: u8) -> ClickType {
        match count {
            1 => ClickType::Tip1x,
            2 => ClickType::Tip2x,
            3 => ClickType::Tip3x,
            _ => ClickType::Tip4x,
        }
    }

    /// Number of clicks/tips this event represents, if any.
    pub fn click_count(&self) -> Option<u8> {
        match self {
            ClickType::Tip1x | ClickType::Click1x => Some(1),
            ClickType::Tip2x | ClickType::Click2x => Some(2),
            ClickType::Tip3x | ClickType::Click3x => Some(3),
            ClickType::Tip4x => Some(4),
            _ => None,
        }
    }

    /// Wire number pushed in button state notifications.
    pub fn number(&self) -> u8 {
        match self {
            ClickType::Tip1x => 0,
            ClickType::Tip2x => 1,
            ClickType::Tip3x => 2,
            ClickType::Tip4x => 3,
            ClickType::HoldStart => 4,
            ClickType::HoldRepeat => 5,
            ClickType::HoldEnd => 6,
            ClickType::Click1x => 7,
            ClickType::Click2x => 8,
            ClickType::Click3x => 9,
            ClickType::ShortLong => 10,
            ClickType::LocalOff => 11,
            ClickType::LocalOn => 12,
            ClickType::ShortShortLong => 13,
            ClickType::LocalStop => 14,
            ClickType::Progress => 128,
            ClickType::Complete => 129,
        }
    }
}

/// Which state machine interprets the raw press/release stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateMachineMode {
    #[default]
    Standard,
    /// No multi-click, tolerant of lost press/release events.
    Simple,
    /// Press is hold-start, release is hold-end.
    Dimmer,
    /// One tip per release, nothing else.
    Single,
}

/// Button mode: how this input combines into one- or two-way buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonMode {
    Inactive,
    #[default]
    Standard,
    /// Like simple machine but selected via mode (legacy turbo setting).
    Turbo,
    /// Down half of a rocker pair.
    RockerDown,
    /// Up half of a rocker pair.
    RockerUp,
}

impl ButtonMode {
    /// Dim direction implied by a rocker half; `Stop` for single buttons.
    pub fn two_way_direction(&self) -> DimMode {
        match self {
            ButtonMode::RockerDown => DimMode::Down,
            ButtonMode::RockerUp => DimMode::Up,
            _ => DimMode::Stop,
        }
    }
}

/// Button function: what the button operates (LTNUM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonFunc {
    /// Local device button.
    Device,
    #[default]
    RoomPreset0x,
    RoomPreset1x,
    RoomPreset2x,
    RoomPreset3x,
    RoomPreset4x,
    Area1Preset0x,
    Area2Preset0x,
    Area3Preset0x,
    Area4Preset0x,
    Area1Preset1x,
    Area2Preset2x,
    Area3Preset3x,
    Area4Preset4x,
    /// Application-handled button; the controller does not act on it.
    App,
    Alarm,
    Panic,
    Leave,
    Doorbell,
}

/// Direct action mode: single clicks bypass the click pipeline and fire a
/// scene action directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionMode {
    #[default]
    None,
    Direct,
    Force,
    Undo,
}

/// Effects a button event has beyond the click stream itself. The owning
/// device translates these into output operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonSignal {
    /// A click event to report upstream / to bridges.
    Click(ClickType),
    /// Direct scene action (action mode buttons).
    Action { mode: ActionMode, action_id: SceneNo },
    /// Local button toggles the device output.
    LocalSwitch { up: bool },
    /// Local dimming of the device output.
    LocalDim(DimMode),
}

/// Read-only device context the machines need while evaluating.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonDeviceCtx {
    /// Default channel of the device output is above zero.
    pub output_on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InitialPress,
    HoldOrTip,
    Hold,
    NextTipWait,
    NextPauseWait,
    TwoClickWait,
    ProgModeWait,
    AwaitRelease,
    TwoPauseWait,
    LocalDim,
    ThreeClickWait,
    ThreePauseWait,
    /// Hold that exceeded the repeat budget; hold_end already sent.
    AwaitReleaseTimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheduled {
    MachineCheck,
    SequenceComplete,
    HoldRepeat,
    InjectedComplete,
}

/// Persistent settings of a button behaviour.
#[derive(Debug, Clone)]
pub struct ButtonSettings {
    pub group: DsGroup,
    pub func: ButtonFunc,
    pub mode: ButtonMode,
    /// When hardware fixes the mode (e.g. one half of a rocker), it cannot
    /// be reconfigured.
    pub fixed_mode: Option<ButtonMode>,
    pub channel: ChannelType,
    pub sets_local_priority: bool,
    pub calls_present: bool,
    pub action_mode: ActionMode,
    pub action_id: SceneNo,
    pub state_machine_mode: StateMachineMode,
    pub long_function_delay: Duration,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            group: DsGroup::YellowLight,
            func: ButtonFunc::default(),
            mode: ButtonMode::Standard,
            fixed_mode: None,
            channel: ChannelType::Default,
            sets_local_priority: false,
            calls_present: false,
            action_mode: ActionMode::None,
            action_id: 0,
            state_machine_mode: StateMachineMode::Standard,
            long_function_delay: DEFAULT_LONG_FUNCTION_DELAY,
        }
    }
}

/// A single button input of a device.
#[derive(Debug)]
pub struct ButtonBehaviour {
    pub id: String,
    pub index: usize,
    pub settings: ButtonSettings,
    /// This input can act as a local button when its function is `Device`.
    pub supports_local_key_mode: bool,
    /// Forward actions to bridge clients only, never to dS or the local
    /// controller.
    pub bridge_exclusive: bool,

    // volatile state
    pressed: bool,
    last_action: Option<MonoTime>,
    last_click: Option<ClickType>,
    last_action_mode: ActionMode,
    last_action_id: SceneNo,

    // state machine
    state: State,
    click_counter: u8,
    hold_repeats: u8,
    dimming_up: bool,
    timer_ref: Option<MonoTime>,
    scheduled: Option<(MonoTime, Scheduled)>,
}

impl ButtonBehaviour {
    pub fn new(id: impl Into<String>, index: usize, settings: ButtonSettings) -> Self {
        Self {
            id: id.into(),
            index,
            settings,
            supports_local_key_mode: false,
            bridge_exclusive: false,
            pressed: false,
            last_action: None,
            last_click: None,
            last_action_mode: ActionMode::None,
            last_action_id: 0,
            state: State::Idle,
            click_counter: 0,
            hold_repeats: 0,
            dimming_up: false,
            timer_ref: None,
            scheduled: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn last_click(&self) -> Option<ClickType> {
        self.last_click
    }

    pub fn last_action(&self) -> Option<MonoTime> {
        self.last_action
    }

    pub fn last_action_mode(&self) -> ActionMode {
        self.last_action_mode
    }

    pub fn last_action_id(&self) -> SceneNo {
        self.last_action_id
    }

    /// Effective mode, honoring a hardware-fixed one.
    pub fn mode(&self) -> ButtonMode {
        self.settings.fixed_mode.unwrap_or(self.settings.mode)
    }

    fn local_button_enabled(&self) -> bool {
        self.supports_local_key_mode && self.settings.func == ButtonFunc::Device
    }

    /// Next instant the machine needs a tick, if any timer is running.
    pub fn next_wakeup(&self) -> Option<MonoTime> {
        self.scheduled.map(|(at, _)| at)
    }

    /// Report the current hardware button state. Idempotent for repeated
    /// identical states. Must not be mixed with [`Self::inject_click`].
    pub fn update_button_state(&mut self, pressed: bool, now: MonoTime, ctx: ButtonDeviceCtx) -> Vec<ButtonSignal> {
        debug!(button = %self.id, pressed, "reports state");
        let state_changed = pressed != self.pressed;
        self.pressed = pressed;
        let mut out = Vec::new();
        if self.mode() == ButtonMode::Turbo || self.settings.state_machine_mode != StateMachineMode::Standard {
            self.check_custom_machine(state_changed, now, ctx, &mut out);
        } else {
            self.check_standard_machine(state_changed, now, ctx, &mut out);
        }
        out
    }

    /// Set the pressed state without running any machine (for devices doing
    /// their own click detection alongside [`Self::inject_click`]).
    pub fn inject_state(&mut self, pressed: bool, now: MonoTime) {
        self.pressed = pressed;
        self.last_action = Some(now);
    }

    /// Feed an already-classified click. Keeps a minimal state so value
    /// source observers still see a progression. Must not be mixed with
    /// [`Self::update_button_state`].
    pub fn inject_click(&mut self, click: ClickType, now: MonoTime, ctx: ButtonDeviceCtx) -> Vec<ButtonSignal> {
        let mut out = Vec::new();
        match click {
            ClickType::Tip1x
            | ClickType::Tip2x
            | ClickType::Tip3x
            | ClickType::Tip4x
            | ClickType::Click1x
            | ClickType::Click2x
            | ClickType::Click3x => {
                self.click_counter = self.click_counter.saturating_add(click.click_count().unwrap_or(1));
                // a state must be set even though the machines are not
                // running, so value sources observe the progression
                self.state = State::NextTipWait;
                if self.local_button_enabled() && self.click_counter == 1 {
                    self.local_switch(ctx, now, &mut out);
                } else if self.click_counter <= 4 {
                    // simulate a full press/release pair for bridges
                    self.pressed = true;
                    self.emit(ClickType::Progress, now, &mut out);
                    self.pressed = false;
                    self.emit(ClickType::tip(self.click_counter), now, &mut out);
                }
                if self.click_counter < 4 {
                    self.scheduled = Some((now + TIP_TIMEOUT, Scheduled::InjectedComplete));
                } else {
                    // counter overflow, finish the sequence right away
                    self.reset_machine();
                    self.emit(ClickType::Complete, now, &mut out);
                }
            }
            ClickType::HoldStart => {
                self.pressed = true;
                let event = if self.last_click == Some(ClickType::HoldStart) {
                    // already started before, treat as repeat
                    ClickType::HoldRepeat
                } else {
                    ClickType::HoldStart
                };
                self.state = State::AwaitRelease;
                self.emit(event, now, &mut out);
                self.scheduled = Some((now + DIM_REPEAT_TIME, Scheduled::HoldRepeat));
            }
            ClickType::HoldEnd => {
                self.pressed = false;
                if matches!(self.last_click, Some(ClickType::HoldStart) | Some(ClickType::HoldRepeat)) {
                    self.emit(ClickType::HoldEnd, now, &mut out);
                    self.reset_machine();
                }
            }
            other => {
                trace!(button = %self.id, ?other, "ignoring injected click");
            }
        }
        out
    }

    /// Process timer expiries. Call whenever `next_wakeup()` has passed.
    pub fn tick(&mut self, now: MonoTime, ctx: ButtonDeviceCtx) -> Vec<ButtonSignal> {
        let mut out = Vec::new();
        let Some((at, what)) = self.scheduled else { return out };
        if now < at {
            return out;
        }
        self.scheduled = None;
        match what {
            Scheduled::MachineCheck => {
                self.check_standard_machine(false, now, ctx, &mut out);
            }
            Scheduled::SequenceComplete => {
                self.emit(ClickType::Complete, now, &mut out);
            }
            Scheduled::InjectedComplete => {
                self.reset_machine();
                self.emit(ClickType::Complete, now, &mut out);
            }
            Scheduled::HoldRepeat => {
                self.emit(ClickType::HoldRepeat, now, &mut out);
                self.hold_repeats += 1;
                if self.hold_repeats < MAX_HOLD_REPEATS {
                    self.scheduled = Some((now + DIM_REPEAT_TIME, Scheduled::HoldRepeat));
                }
            }
        }
        out
    }

    fn reset_machine(&mut self) {
        self.pressed = false;
        self.state = State::Idle;
        self.click_counter = 0;
        self.hold_repeats = 0;
        self.dimming_up = false;
        self.timer_ref = None;
        self.scheduled = None;
    }

    /// Route a click through the direct-action check and record it.
    fn emit(&mut self, click: ClickType, now: MonoTime, out: &mut Vec<ButtonSignal>) {
        if self.settings.action_mode != ActionMode::None
            && matches!(click, ClickType::Tip1x | ClickType::Click1x)
        {
            // scene button: single clicks fire the action directly
            self.last_action = Some(now);
            self.last_action_mode = self.settings.action_mode;
            self.last_action_id = self.settings.action_id;
            out.push(ButtonSignal::Action {
                mode: self.settings.action_mode,
                action_id: self.settings.action_id,
            });
            return;
        }
        self.last_action = Some(now);
        self.last_click = Some(click);
        self.last_action_mode = ActionMode::None;
        out.push(ButtonSignal::Click(click));
    }

    /// Local button: toggle (or rocker-directed switch of) the device
    /// output without any upstream involvement.
    fn local_switch(&mut self, ctx: ButtonDeviceCtx, now: MonoTime, out: &mut Vec<ButtonSignal>) {
        let up = match self.mode().two_way_direction() {
            DimMode::Up => true,
            DimMode::Down => false,
            DimMode::Stop => !ctx.output_on,
        };
        debug!(button = %self.id, up, "local switch");
        out.push(ButtonSignal::LocalSwitch { up });
        self.emit(if up { ClickType::LocalOn } else { ClickType::LocalOff }, now, out);
    }

    fn local_dim(&mut self, start: bool, out: &mut Vec<ButtonSignal>) {
        if start {
            let mut dm = self.mode().two_way_direction();
            if dm == DimMode::Stop {
                // single button: alternate direction on each hold
                self.dimming_up = !self.dimming_up;
                dm = if self.dimming_up { DimMode::Up } else { DimMode::Down };
            }
            out.push(ButtonSignal::LocalDim(dm));
        } else {
            out.push(ButtonSignal::LocalDim(DimMode::Stop));
        }
    }

    // Simple/turbo, dimmer and single machines. Only evaluated on actual
    // press/release reports (state_changed may still be false when an event
    // was lost).
    fn check_custom_machine(&mut self, state_changed: bool, now: MonoTime, ctx: ButtonDeviceCtx, out: &mut Vec<ButtonSignal>) {
        let time_since_ref = self.timer_ref.map(|t| now.since(t));
        self.timer_ref = Some(now);
        self.scheduled = None;
        match self.settings.state_machine_mode {
            StateMachineMode::Single => {
                if self.pressed {
                    self.state = State::AwaitRelease;
                    self.emit(ClickType::Progress, now, out);
                } else {
                    if self.state == State::Idle {
                        // press got lost, act (late) on the release
                        self.pressed = true;
                        self.emit(ClickType::Progress, now, out);
                        self.pressed = false;
                    }
                    self.emit(ClickType::Progress, now, out);
                    self.state = State::Idle;
                    if self.local_button_enabled() {
                        self.local_switch(ctx, now, out);
                    } else {
                        self.emit(ClickType::Tip1x, now, out);
                    }
                }
            }
            StateMachineMode::Dimmer => {
                if !state_changed {
                    return;
                }
                if self.local_button_enabled() && ctx.output_on {
                    self.local_dim(self.pressed, out);
                    return;
                }
                if self.pressed {
                    self.emit(ClickType::HoldStart, now, out);
                    self.hold_repeats = 0;
                    self.scheduled = Some((now + DIM_REPEAT_TIME, Scheduled::HoldRepeat));
                } else {
                    self.emit(ClickType::HoldEnd, now, out);
                }
            }
            // Standard mode only lands here for turbo buttons; both behave
            // like the simple machine.
            StateMachineMode::Simple | StateMachineMode::Standard => {
                if time_since_ref.is_none_or(|d| d > TIP_TIMEOUT) {
                    self.click_counter = 0;
                }
                let mut is_tip = false;
                if self.pressed {
                    is_tip = true;
                    self.state = State::AwaitRelease;
                    self.emit(ClickType::Progress, now, out);
                } else {
                    if self.state == State::Idle {
                        // press got lost, act (late) on the release
                        self.pressed = true;
                        self.emit(ClickType::Progress, now, out);
                        self.pressed = false;
                        is_tip = true;
                    }
                    self.emit(ClickType::Progress, now, out);
                    self.state = State::Idle;
                    self.scheduled = Some((now + TIP_TIMEOUT, Scheduled::SequenceComplete));
                }
                if is_tip {
                    if self.local_button_enabled() && self.click_counter == 0 {
                        self.local_switch(ctx, now, out);
                    } else {
                        self.emit(ClickType::tip(self.click_counter + 1), now, out);
                        self.click_counter += 1;
                        if self.click_counter >= 4 {
                            self.click_counter = 0;
                        }
                    }
                }
            }
        }
    }

    // Standard dS button state machine.
    fn check_standard_machine(&mut self, state_changed: bool, now: MonoTime, ctx: ButtonDeviceCtx, out: &mut Vec<ButtonSignal>) {
        self.scheduled = None;
        let since = self.timer_ref.map(|t| now.since(t)).unwrap_or(Duration::ZERO);
        trace!(button = %self.id, state = ?self.state, ?since, counter = self.click_counter, "machine check");
        match self.state {
            State::Idle => {
                self.timer_ref = None;
                if state_changed && self.pressed {
                    self.click_counter = if self.local_button_enabled() { 0 } else { 1 };
                    self.timer_ref = Some(now);
                    self.state = State::InitialPress;
                    self.emit(ClickType::Progress, now, out);
                }
            }
            State::InitialPress => {
                if state_changed && !self.pressed {
                    self.timer_ref = Some(now);
                    self.state = State::NextPauseWait;
                    self.emit(ClickType::Progress, now, out);
                } else if since >= CLICK_LENGTH {
                    self.state = State::HoldOrTip;
                }
            }
            State::HoldOrTip => {
                if state_changed && !self.pressed && self.click_counter == 0 {
                    self.local_switch(ctx, now, out);
                    self.timer_ref = Some(now);
                    self.click_counter = 1;
                    self.state = State::NextTipWait;
                } else if state_changed && !self.pressed {
                    self.emit(ClickType::tip(self.click_counter), now, out);
                    self.timer_ref = Some(now);
                    self.state = State::NextTipWait;
                } else if since >= self.settings.long_function_delay {
                    if self.local_button_enabled() && ctx.output_on {
                        self.local_dim(true, out);
                        self.state = State::LocalDim;
                    } else {
                        self.hold_repeats = 0;
                        self.timer_ref = Some(now);
                        self.emit(ClickType::HoldStart, now, out);
                        self.state = State::Hold;
                    }
                }
            }
            State::Hold => {
                if state_changed && !self.pressed {
                    self.emit(ClickType::HoldEnd, now, out);
                    self.state = State::Idle;
                } else if since >= DIM_REPEAT_TIME {
                    if self.hold_repeats < MAX_HOLD_REPEATS {
                        self.timer_ref = Some(now);
                        self.emit(ClickType::HoldRepeat, now, out);
                        self.hold_repeats += 1;
                    } else {
                        // button stuck: end the hold early, await release
                        warn!(button = %self.id, "hold exceeded repeat budget, forcing hold_end");
                        self.emit(ClickType::HoldEnd, now, out);
                        self.state = State::AwaitReleaseTimedOut;
                    }
                }
            }
            State::NextTipWait => {
                if state_changed && self.pressed {
                    self.timer_ref = Some(now);
                    self.click_counter = if self.click_counter >= 4 { 2 } else { self.click_counter + 1 };
                    self.emit(ClickType::Progress, now, out);
                    self.state = State::HoldOrTip;
                } else if since >= TIP_TIMEOUT {
                    self.state = State::Idle;
                    self.emit(ClickType::Complete, now, out);
                }
            }
            State::NextPauseWait => {
                if state_changed && self.pressed {
                    self.emit(ClickType::Progress, now, out);
                    self.timer_ref = Some(now);
                    self.click_counter = 2;
                    self.state = State::TwoClickWait;
                } else if since >= CLICK_PAUSE {
                    if self.local_button_enabled() {
                        self.local_switch(ctx, now, out);
                    } else {
                        self.emit(ClickType::Click1x, now, out);
                    }
                    self.state = State::NextTipWait;
                }
            }
            State::TwoClickWait => {
                if state_changed && !self.pressed {
                    self.emit(ClickType::Progress, now, out);
                    self.timer_ref = Some(now);
                    self.state = State::TwoPauseWait;
                } else if since > CLICK_LENGTH {
                    self.state = State::ProgModeWait;
                }
            }
            State::ProgModeWait => {
                if state_changed && !self.pressed {
                    self.emit(ClickType::Tip2x, now, out);
                    self.timer_ref = Some(now);
                    self.state = State::NextTipWait;
                } else if since > self.settings.long_function_delay {
                    self.emit(ClickType::ShortLong, now, out);
                    self.state = State::AwaitRelease;
                }
            }
            State::TwoPauseWait => {
                if state_changed && self.pressed {
                    self.emit(ClickType::Progress, now, out);
                    self.timer_ref = Some(now);
                    self.click_counter = 3;
                    self.state = State::ThreeClickWait;
                } else if since >= CLICK_PAUSE {
                    self.emit(ClickType::Click2x, now, out);
                    self.state = State::NextTipWait;
                }
            }
            State::ThreeClickWait => {
                if state_changed && !self.pressed {
                    self.timer_ref = Some(now);
                    self.emit(ClickType::Click3x, now, out);
                    self.state = State::NextTipWait;
                } else if since >= CLICK_LENGTH {
                    self.state = State::ThreePauseWait;
                }
            }
            State::ThreePauseWait => {
                if state_changed && !self.pressed {
                    self.timer_ref = Some(now);
                    self.emit(ClickType::Tip3x, now, out);
                    self.state = State::NextTipWait;
                } else if since >= self.settings.long_function_delay {
                    self.emit(ClickType::ShortShortLong, now, out);
                    self.state = State::AwaitRelease;
                }
            }
            State::LocalDim => {
                if state_changed && !self.pressed {
                    self.state = State::Idle;
                    self.local_dim(false, out);
                }
            }
            State::AwaitRelease => {
                if state_changed && !self.pressed {
                    self.state = State::Idle;
                    self.emit(ClickType::Complete, now, out);
                }
            }
            State::AwaitReleaseTimedOut => {
                // hold_end was already sent; reset silently
                if state_changed && !self.pressed {
                    self.state = State::Idle;
                }
            }
        }
        if self.timer_ref.is_some() && self.scheduled.is_none() && self.state != State::Idle {
            self.scheduled = Some((now + MACHINE_RECHECK, Scheduled::MachineCheck));
        }
    }
}

// -- persistence --------------------------------------------------------------

const BUTTON_FLAG_SETS_LOCAL_PRIORITY: u64 = 0x0001;
const BUTTON_FLAG_CALLS_PRESENT: u64 = 0x0002;

const BUTTON_FIELDS: &[FieldDef] = &[
    FieldDef::integer("commonFlags"),
    FieldDef::integer("dsGroup"),
    FieldDef::integer("buttonFunc"),
    FieldDef::integer("buttonMode"),
    FieldDef::integer("buttonChannel"),
    FieldDef::integer("stateMachineMode"),
    FieldDef::integer("longFunctionDelayMs"),
    FieldDef::integer("actionMode"),
    FieldDef::integer("actionId"),
];

fn func_number(func: ButtonFunc) -> i64 {
    match func {
        ButtonFunc::Device => 0,
        ButtonFunc::RoomPreset0x => 1,
        ButtonFunc::RoomPreset1x => 2,
        ButtonFunc::RoomPreset2x => 3,
        ButtonFunc::RoomPreset3x => 4,
        ButtonFunc::RoomPreset4x => 5,
        ButtonFunc::Area1Preset0x => 6,
        ButtonFunc::Area2Preset0x => 7,
        ButtonFunc::Area3Preset0x => 8,
        ButtonFunc::Area4Preset0x => 9,
        ButtonFunc::Area1Preset1x => 10,
        ButtonFunc::Area2Preset2x => 11,
        ButtonFunc::Area3Preset3x => 12,
        ButtonFunc::Area4Preset4x => 13,
        ButtonFunc::App => 14,
        ButtonFunc::Alarm => 15,
        ButtonFunc::Panic => 16,
        ButtonFunc::Leave => 17,
        ButtonFunc::Doorbell => 18,
    }
}

fn func_from_number(n: i64) -> ButtonFunc {
    match n {
        0 => ButtonFunc::Device,
        2 => ButtonFunc::RoomPreset1x,
        3 => ButtonFunc::RoomPreset2x,
        4 => ButtonFunc::RoomPreset3x,
        5 => ButtonFunc::RoomPreset4x,
        6 => ButtonFunc::Area1Preset0x,
        7 => ButtonFunc::Area2Preset0x,
        8 => ButtonFunc::Area3Preset0x,
        9 => ButtonFunc::Area4Preset0x,
        10 => ButtonFunc::Area1Preset1x,
        11 => ButtonFunc::Area2Preset2x,
        12 => ButtonFunc::Area3Preset3x,
        13 => ButtonFunc::Area4Preset4x,
        14 => ButtonFunc::App,
        15 => ButtonFunc::Alarm,
        16 => ButtonFunc::Panic,
        17 => ButtonFunc::Leave,
        18 => ButtonFunc::Doorbell,
        _ => ButtonFunc::RoomPreset0x,
    }
}

fn mode_number(mode: ButtonMode) -> i64 {
    match mode {
        ButtonMode::Inactive => 0,
        ButtonMode::Standard => 1,
        ButtonMode::Turbo => 2,
        ButtonMode::RockerDown => 3,
        ButtonMode::RockerUp => 4,
    }
}

fn mode_from_number(n: i64) -> ButtonMode {
    match n {
        0 => ButtonMode::Inactive,
        2 => ButtonMode::Turbo,
        3 => ButtonMode::RockerDown,
        4 => ButtonMode::RockerUp,
        _ => ButtonMode::Standard,
    }
}

fn machine_number(mode: StateMachineMode) -> i64 {
    match mode {
        StateMachineMode::Standard => 0,
        StateMachineMode::Simple => 1,
        StateMachineMode::Dimmer => 2,
        StateMachineMode::Single => 3,
    }
}

fn machine_from_number(n: i64) -> StateMachineMode {
    match n {
        1 => StateMachineMode::Simple,
        2 => StateMachineMode::Dimmer,
        3 => StateMachineMode::Single,
        _ => StateMachineMode::Standard,
    }
}

fn action_mode_number(mode: ActionMode) -> i64 {
    match mode {
        ActionMode::None => 0,
        ActionMode::Direct => 1,
        ActionMode::Force => 2,
        ActionMode::Undo => 3,
    }
}

fn action_mode_from_number(n: i64) -> ActionMode {
    match n {
        1 => ActionMode::Direct,
        2 => ActionMode::Force,
        3 => ActionMode::Undo,
        _ => ActionMode::None,
    }
}

impl PersistedParams for ButtonSettings {
    fn table_name(&self) -> &'static str {
        "buttonSettings"
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        BUTTON_FIELDS
    }

    fn load_from_row(&mut self, row: &mut RowReader<'_>, common_flags: &mut u64) -> HostResult<()> {
        *common_flags = row.next_integer()? as u64;
        self.sets_local_priority = *common_flags & BUTTON_FLAG_SETS_LOCAL_PRIORITY != 0;
        self.calls_present = *common_flags & BUTTON_FLAG_CALLS_PRESENT != 0;
        self.group = DsGroup::try_from(row.next_integer()? as u8).unwrap_or(DsGroup::YellowLight);
        self.func = func_from_number(row.next_integer()?);
        self.mode = mode_from_number(row.next_integer()?);
        self.channel = ChannelType::try_from(row.next_integer()? as u8).unwrap_or(ChannelType::Default);
        self.state_machine_mode = machine_from_number(row.next_integer()?);
        self.long_function_delay = Duration::from_millis(row.next_integer()?.max(0) as u64);
        self.action_mode = action_mode_from_number(row.next_integer()?);
        self.action_id = row.next_integer()?.clamp(0, 255) as u8;
        Ok(())
    }

    fn bind_to_statement(&self, stmt: &mut StatementBuilder, _parent_id: &str, _common_flags: u64) {
        let mut flags = 0u64;
        if self.sets_local_priority {
            flags |= BUTTON_FLAG_SETS_LOCAL_PRIORITY;
        }
        if self.calls_present {
            flags |= BUTTON_FLAG_CALLS_PRESENT;
        }
        stmt.bind_integer(flags as i64);
        stmt.bind_integer(i64::from(self.group.number()));
        stmt.bind_integer(func_number(self.func));
        stmt.bind_integer(mode_number(self.mode));
        stmt.bind_integer(i64::from(self.channel.number()));
        stmt.bind_integer(machine_number(self.state_machine_mode));
        stmt.bind_integer(self.long_function_delay.as_millis() as i64);
        stmt.bind_integer(action_mode_number(self.action_mode));
        stmt.bind_integer(i64::from(self.action_id));
    }
}

#[cfg(test)]
#[path = "button_tests.rs"]
mod tests;
