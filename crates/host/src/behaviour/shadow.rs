// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blind movement sequencer: drives position and blade angle of shade
//! outputs through timed moves.
//!
//! Hardware only understands "start moving up/down" and "stop"; position is
//! estimated from movement time against calibrated full-range times. Limit
//! targets overshoot by 20% so end contacts (when present) re-synchronize
//! the estimate, and full-range moves re-measure the open/close times.
//! Short moves are split into segments to avoid latching the motor into a
//! permanent run.

use std::time::Duration;

use tracing::{debug, info, trace};

use crate::channel::Channel;
use crate::clock::{earliest, MonoTime};

/// Moves longer than this confirm their apply early so callers may issue
/// further updates while the blind is still travelling.
const MIN_INTERRUPTABLE_MOVE_TIME: Duration = Duration::from_secs(5);
/// Settle time between finishing positioning and starting the angle turn.
const POSITION_TO_ANGLE_DELAY: Duration = Duration::from_secs(1);
/// Pause between the two segments of a split short move.
const INTER_SHORT_MOVE_DELAY: Duration = Duration::from_secs(1);
/// Interval of intermediate state reports during long moves.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
/// Progress estimation cap while a move is unconfirmed.
const PROGRESS_CAP: f64 = 0.9;
/// Extra travel fraction for limit targets.
const OVERSHOOT_FACTOR: f64 = 1.2;

const FULL_RANGE: f64 = 100.0;

/// Kind of shade hardware; only jalousies have a controllable blade angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowKind {
    Roller,
    #[default]
    Jalousie,
    Sunblind,
}

/// Movement directives and completion signals produced by the sequencer.
/// The owning device turns commands into backend movement calls and apply
/// confirmations into serializer completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowEvent {
    /// Change hardware movement: -1 move down, 0 stop, +1 move up.
    Command(i8),
    /// The current apply cycle is complete (possibly early for long moves).
    ApplyDone,
    /// Intermediate or final output state worth reporting.
    Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlindState {
    Idle,
    Stopping,
    StoppingBeforeApply,
    Positioning,
    StoppingBeforeTurning,
    StoppingAfterTurn,
    Turning,
    Dimming,
}

/// What the next movement confirmation continues with.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AwaitedConfirm {
    Stopped { delay: bool },
    MoveStarted { stop_in: Duration },
    MovePaused { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SeqStep {
    ProcessStopped,
    ApplyAngle,
    RestartMove { remaining: Duration },
}

/// The movement sequencer of one shade output.
#[derive(Debug)]
pub struct ShadowSequencer {
    pub kind: ShadowKind,
    pub has_end_contacts: bool,
    /// Hardware knows its own position; moves apply directly and the
    /// sequencer is bypassed.
    pub absolute_movement: bool,
    min_move_time: Duration,
    max_short_move_time: Option<Duration>,
    min_long_move_time: Option<Duration>,

    // persistent settings, in seconds
    open_time: f64,
    close_time: f64,
    angle_open_time: f64,
    angle_close_time: f64,
    stop_delay_time: f64,

    // volatile state
    state: BlindState,
    sequence_active: bool,
    moving_up: bool,
    target_position: f64,
    target_angle: f64,
    reference_position: f64,
    reference_angle: f64,
    reference_time: Option<MonoTime>,
    run_into_end: bool,
    update_move_time_at_end_reached: bool,
    apply_pending: bool,

    awaiting: Option<AwaitedConfirm>,
    moving_deadline: Option<(MonoTime, Duration)>,
    sequence_deadline: Option<(MonoTime, SeqStep)>,
    progress_deadline: Option<MonoTime>,
}

impl ShadowSequencer {
    pub fn new(kind: ShadowKind) -> Self {
        Self {
            kind,
            has_end_contacts: false,
            absolute_movement: false,
            min_move_time: Duration::from_millis(200),
            max_short_move_time: None,
            min_long_move_time: None,
            // common motor defaults, re-measured by calibration moves
            open_time: 54.0,
            close_time: 51.0,
            angle_open_time: 1.0,
            angle_close_time: 1.0,
            stop_delay_time: 0.0,
            state: BlindState::Idle,
            sequence_active: false,
            moving_up: false,
            target_position: 0.0,
            target_angle: 0.0,
            // assume fully open at top; angle open as well
            reference_position: FULL_RANGE,
            reference_angle: FULL_RANGE,
            reference_time: None,
            run_into_end: false,
            update_move_time_at_end_reached: false,
            apply_pending: false,
            awaiting: None,
            moving_deadline: None,
            sequence_deadline: None,
            progress_deadline: None,
        }
    }

    /// Configure movement constraints of the hardware.
    pub fn set_device_params(
        &mut self,
        has_end_contacts: bool,
        min_move_time: Duration,
        max_short_move_time: Option<Duration>,
        min_long_move_time: Option<Duration>,
        absolute_movement: bool,
    ) {
        self.has_end_contacts = has_end_contacts;
        self.min_move_time = min_move_time;
        self.max_short_move_time = max_short_move_time;
        self.min_long_move_time = min_long_move_time;
        self.absolute_movement = absolute_movement;
    }

    /// Configure full-range move times in seconds.
    pub fn set_move_times(&mut self, open: f64, close: f64, angle_open: f64, angle_close: f64) {
        self.open_time = open;
        self.close_time = close;
        self.angle_open_time = angle_open;
        self.angle_close_time = angle_close;
    }

    pub fn set_stop_delay_time(&mut self, seconds: f64) {
        self.stop_delay_time = seconds;
    }

    /// Install a known resting position, e.g. restored from persistence or
    /// reported by hardware that is aware of its own position.
    pub fn set_reference(&mut self, position: f64, angle: f64) {
        self.reference_position = position.clamp(0.0, FULL_RANGE);
        self.reference_angle = angle.clamp(0.0, FULL_RANGE);
        self.reference_time = None;
    }

    pub fn open_time(&self) -> f64 {
        self.open_time
    }

    pub fn close_time(&self) -> f64 {
        self.close_time
    }

    pub fn is_idle(&self) -> bool {
        self.state == BlindState::Idle
    }

    /// Estimated position: reference plus travel since the move started.
    pub fn position(&self, now: MonoTime) -> f64 {
        let mut pos = self.reference_position;
        if let Some(started) = self.reference_time {
            let moved = now.since(started).as_secs_f64();
            if self.moving_up {
                pos += FULL_RANGE * moved / self.open_time;
            } else {
                pos -= FULL_RANGE * moved / self.close_time;
            }
        }
        pos.clamp(0.0, FULL_RANGE)
    }

    /// Estimated blade angle, symmetric to [`Self::position`].
    pub fn angle(&self, now: MonoTime) -> f64 {
        let mut ang = self.reference_angle;
        if let Some(started) = self.reference_time {
            let moved = now.since(started).as_secs_f64();
            if self.moving_up {
                ang += FULL_RANGE * moved / self.angle_open_time;
            } else {
                ang -= FULL_RANGE * moved / self.angle_close_time;
            }
        }
        ang.clamp(0.0, FULL_RANGE)
    }

    /// Push the estimator values into the channels without an apply.
    pub fn sync_blind_state(&self, now: MonoTime, position: &mut Channel, angle: &mut Channel) {
        position.sync_value(self.position(now), now);
        angle.sync_value(self.angle(now), now);
    }

    /// Earliest pending deadline of the sequencer.
    pub fn next_wakeup(&self) -> Option<MonoTime> {
        let mut at = self.moving_deadline.map(|(t, _)| t);
        at = earliest(at, self.sequence_deadline.map(|(t, _)| t));
        earliest(at, self.progress_deadline)
    }

    fn move_timer_start(&mut self, now: MonoTime) {
        self.reference_time = Some(now);
    }

    fn move_timer_stop(&mut self, now: MonoTime) {
        if self.state != BlindState::StoppingAfterTurn {
            // position does not change while turning the blades
            self.reference_position = self.position(now);
        }
        self.reference_angle = self.angle(now);
        self.reference_time = None;
    }

    fn confirm_apply(&mut self, events: &mut Vec<ShadowEvent>) {
        if self.apply_pending {
            self.apply_pending = false;
            events.push(ShadowEvent::ApplyDone);
        }
    }

    /// Start a moving sequence to bring channel targets into the hardware.
    ///
    /// When idle the sequence starts right away; an active sequence is
    /// stopped first and then re-applied. An angle-only change during
    /// positioning does not interrupt the running move.
    pub fn apply_blind_channels(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        for_dimming: bool,
        events: &mut Vec<ShadowEvent>,
    ) {
        trace!("starting blind apply sequence");
        self.sequence_active = true;
        self.apply_pending = true;
        if self.state != BlindState::Idle {
            if for_dimming && self.state == BlindState::Positioning {
                // dimming while positioning: recalculate from the current
                // estimate without physically stopping
                self.state = BlindState::Dimming;
                self.stopped(now, false, position, angle, events);
                return;
            }
            if self.state == BlindState::Positioning && angle.needs_apply() && !position.needs_apply() {
                // angle will be (re)applied after positioning anyway
                self.confirm_apply(events);
                return;
            }
            if matches!(self.state, BlindState::Stopping | BlindState::StoppingAfterTurn) {
                // already stopping, just make sure we'll apply afterwards
                self.state = BlindState::StoppingBeforeApply;
            } else {
                self.state = BlindState::StoppingBeforeApply;
                self.stop_movement(now, events);
            }
        } else {
            self.apply_position(now, position, angle, events);
        }
    }

    /// Free movement for dimming. `Stop` cancels; up/down start a bounded
    /// move with a safety stop at 120% of the full-range time.
    pub fn dim_blind(
        &mut self,
        now: MonoTime,
        up: Option<bool>,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        match up {
            None => {
                debug!("dim stop");
                self.sequence_active = true;
                self.stop_movement(now, events);
            }
            Some(up) => {
                debug!(up, "dim move");
                if self.sequence_active {
                    // already running: sample current positions first
                    self.state = BlindState::Idle;
                    self.stopped(now, false, position, angle, events);
                }
                self.sequence_active = true;
                self.moving_up = up;
                let stop_in = if up {
                    Duration::from_secs_f64(self.open_time * OVERSHOOT_FACTOR)
                } else {
                    Duration::from_secs_f64(self.close_time * OVERSHOOT_FACTOR)
                };
                self.state = BlindState::Dimming;
                self.run_into_end = false;
                self.start_moving(now, stop_in, position, angle, events);
            }
        }
    }

    /// Stop all movement, then continue with whatever the state demands.
    fn stop_movement(&mut self, now: MonoTime, events: &mut Vec<ShadowEvent>) {
        if self.sequence_active {
            if self.state == BlindState::Positioning {
                // angle may need re-applying after an interrupted move
                self.state = BlindState::StoppingBeforeTurning;
            } else if self.state != BlindState::StoppingBeforeApply {
                self.state = if self.state == BlindState::Turning {
                    BlindState::StoppingAfterTurn
                } else {
                    BlindState::Stopping
                };
            }
            debug!(state = ?self.state, "stopping all movement");
            self.moving_deadline = None;
            self.progress_deadline = None;
            self.awaiting = Some(AwaitedConfirm::Stopped { delay: true });
            events.push(ShadowEvent::Command(0));
        } else {
            self.state = BlindState::Idle;
            let _ = now;
            self.confirm_apply(events);
        }
    }

    /// Hardware confirmed the last movement command.
    pub fn movement_confirmed(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        let Some(awaited) = self.awaiting.take() else { return };
        match awaited {
            AwaitedConfirm::Stopped { delay } => self.stopped(now, delay, position, angle, events),
            AwaitedConfirm::MoveStarted { stop_in } => self.move_started(now, stop_in, position, angle, events),
            AwaitedConfirm::MovePaused { remaining } => {
                trace!("move paused, waiting to start next segment");
                // update references so the pause is not counted as travel
                self.move_timer_stop(now);
                self.sequence_deadline =
                    Some((now + INTER_SHORT_MOVE_DELAY, SeqStep::RestartMove { remaining }));
            }
        }
    }

    /// End contact reports the blind reached top or bottom.
    pub fn end_reached(
        &mut self,
        now: MonoTime,
        top: bool,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        if !self.has_end_contacts {
            return;
        }
        info!(top, "end contact reached");
        self.moving_deadline = None;
        self.progress_deadline = None;
        if self.update_move_time_at_end_reached {
            if let Some(started) = self.reference_time {
                let measured = now.since(started).as_secs_f64();
                info!(measured, top, "full range move measured, updating move time");
                if top {
                    self.open_time = measured;
                } else {
                    self.close_time = measured;
                }
            }
        }
        // snap the estimate to the limit
        self.reference_time = None;
        if top {
            self.reference_position = FULL_RANGE;
            self.reference_angle = FULL_RANGE;
        } else {
            self.reference_position = 0.0;
            self.reference_angle = 0.0;
        }
        self.stopped(now, false, position, angle, events);
    }

    fn stopped(
        &mut self,
        now: MonoTime,
        delay: bool,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        // a stop ends any full-range timing measurement
        self.update_move_time_at_end_reached = false;
        self.move_timer_stop(now);
        trace!(
            position = self.reference_position,
            angle = self.reference_angle,
            "stopped, estimated state"
        );
        if delay && self.stop_delay_time > 0.0 {
            self.sequence_deadline = Some((
                now + Duration::from_secs_f64(self.stop_delay_time),
                SeqStep::ProcessStopped,
            ));
        } else {
            self.process_stopped(now, position, angle, events);
        }
    }

    fn process_stopped(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        match self.state {
            BlindState::StoppingBeforeApply => {
                self.state = BlindState::Idle;
                self.apply_position(now, position, angle, events);
            }
            BlindState::Dimming => {
                // new position requested while (dim) move still running
                self.apply_position(now, position, angle, events);
            }
            BlindState::StoppingBeforeTurning => {
                self.sequence_deadline = Some((now + POSITION_TO_ANGLE_DELAY, SeqStep::ApplyAngle));
            }
            _ => {
                // end of sequence
                self.all_done(now, position, angle, events);
            }
        }
    }

    fn all_done(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        self.move_timer_stop(now);
        self.sequence_active = false;
        self.state = BlindState::Idle;
        self.moving_deadline = None;
        self.progress_deadline = None;
        // confirm and settle channels: estimation ends here
        position.value_applied(false);
        angle.value_applied(false);
        position.sync_value(self.position(now), now);
        angle.sync_value(self.angle(now), now);
        info!(
            position = self.reference_position,
            angle = self.reference_angle,
            "movement sequence complete"
        );
        if self.apply_pending {
            self.confirm_apply(events);
        } else {
            // long move: apply was confirmed early, re-push the final state
            position.set_transition_progress(1.0);
            angle.set_transition_progress(1.0);
            events.push(ShadowEvent::Progress);
        }
    }

    fn apply_position(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        if position.needs_apply() {
            self.target_position = position.value();
            // position changes angle; keep a defined target even when the
            // angle is not marked for apply right now
            self.target_angle = angle.value();
            let mut dist;
            let probable_dist = self.target_position - self.reference_position;
            self.run_into_end = false;
            if self.target_position >= FULL_RANGE {
                // full up: overshoot so end contacts re-synchronize
                dist = FULL_RANGE * OVERSHOOT_FACTOR;
                self.run_into_end = true;
                if self.reference_position <= 0.0 {
                    self.update_move_time_at_end_reached = true;
                }
            } else if self.target_position <= 0.0 {
                dist = -FULL_RANGE * OVERSHOOT_FACTOR;
                self.run_into_end = true;
                if self.reference_position >= FULL_RANGE {
                    self.update_move_time_at_end_reached = true;
                }
            } else {
                dist = probable_dist;
            }
            if dist == 0.0 {
                // nothing to travel; angle may still need work
                self.apply_angle(now, position, angle, events);
                return;
            }
            let mut stop_in;
            let probably_ends_in;
            if dist > 0.0 {
                self.moving_up = true;
                stop_in = Duration::from_secs_f64(self.open_time / FULL_RANGE * dist);
                probably_ends_in =
                    Duration::from_secs_f64((self.open_time / FULL_RANGE * probable_dist).max(0.0));
                // moves must end with a defined angle, stretch when needed
                let angle_time = Duration::from_secs_f64(self.angle_open_time);
                if stop_in < angle_time {
                    stop_in = angle_time;
                }
            } else {
                self.moving_up = false;
                dist = -dist;
                stop_in = Duration::from_secs_f64(self.close_time / FULL_RANGE * dist);
                probably_ends_in =
                    Duration::from_secs_f64((self.close_time / FULL_RANGE * -probable_dist).max(0.0));
                let angle_time = Duration::from_secs_f64(self.angle_close_time);
                if stop_in < angle_time {
                    stop_in = angle_time;
                }
            }
            info!(
                target = self.target_position,
                current = self.reference_position,
                up = self.moving_up,
                stop_in = stop_in.as_secs_f64(),
                "blind position move"
            );
            if self.state != BlindState::Positioning {
                self.state = BlindState::Positioning;
                position.start_externally_timed_transition(now, probably_ends_in);
                self.start_moving(now, stop_in, position, angle, events);
            }
        } else if angle.needs_apply() {
            self.target_angle = angle.value();
            self.apply_angle(now, position, angle, events);
        } else {
            self.all_done(now, position, angle, events);
        }
    }

    fn apply_angle(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        if self.kind != ShadowKind::Jalousie {
            // no blade angle on this hardware
            self.all_done(now, position, angle, events);
            return;
        }
        if self.position(now) >= FULL_RANGE {
            // fully open: angle is irrelevant, consider applied at max
            self.reference_angle = self.target_angle;
            self.all_done(now, position, angle, events);
            return;
        }
        let dist = self.target_angle - self.reference_angle;
        let mut stop_in = if dist > 0.0 {
            self.moving_up = true;
            Duration::from_secs_f64(self.angle_open_time / FULL_RANGE * dist)
        } else if dist < 0.0 {
            self.moving_up = false;
            Duration::from_secs_f64(self.angle_close_time / FULL_RANGE * -dist)
        } else {
            Duration::ZERO
        };
        // limit angles get 20% extra to stay synchronized
        if self.target_angle >= FULL_RANGE || self.target_angle <= 0.0 {
            stop_in = stop_in.mul_f64(OVERSHOOT_FACTOR);
        }
        info!(
            target = self.target_angle,
            current = self.reference_angle,
            stop_in = stop_in.as_secs_f64(),
            "blind angle move"
        );
        self.state = BlindState::Turning;
        angle.start_externally_timed_transition(now, stop_in);
        self.start_moving(now, stop_in, position, angle, events);
    }

    fn start_moving(
        &mut self,
        now: MonoTime,
        stop_in: Duration,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        if stop_in < self.min_move_time {
            // too short to bother the motor
            if self.state == BlindState::Positioning {
                self.state = BlindState::StoppingBeforeTurning;
            }
            self.stopped(now, false, position, angle, events);
            return;
        }
        let dir: i8 = if self.moving_up { 1 } else { -1 };
        trace!(dir, "start moving");
        self.awaiting = Some(AwaitedConfirm::MoveStarted { stop_in });
        events.push(ShadowEvent::Command(dir));
    }

    fn move_started(
        &mut self,
        now: MonoTime,
        stop_in: Duration,
        _position: &mut Channel,
        _angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        self.move_timer_start(now);
        let mut stop_in = stop_in;
        let mut remaining = stop_in;
        // segment moves in the critical window where a single impulse would
        // latch the motor into a continuous run
        if let (Some(max_short), Some(min_long)) = (self.max_short_move_time, self.min_long_move_time) {
            if stop_in < min_long && stop_in > max_short {
                if remaining < min_long * 2 && remaining > self.min_move_time * 2 {
                    remaining /= 2;
                    stop_in = remaining;
                } else {
                    stop_in = max_short;
                    remaining -= stop_in;
                }
                debug!(
                    now_secs = stop_in.as_secs_f64(),
                    later_secs = remaining.as_secs_f64(),
                    "splitting move to avoid continuous blind run"
                );
            } else {
                remaining = Duration::ZERO;
            }
        } else {
            remaining = Duration::ZERO;
        }
        if stop_in > MIN_INTERRUPTABLE_MOVE_TIME {
            // long move: confirm early so callers can issue further updates
            trace!("long move, confirming apply early");
            self.confirm_apply(events);
            self.progress_deadline = Some(now + PROGRESS_INTERVAL);
        }
        trace!(stop_secs = stop_in.as_secs_f64(), "move started, stop scheduled");
        self.moving_deadline = Some((now + stop_in, remaining));
    }

    fn end_move(
        &mut self,
        now: MonoTime,
        remaining: Duration,
        events: &mut Vec<ShadowEvent>,
    ) {
        self.progress_deadline = None;
        if remaining.is_zero() {
            self.stop_movement(now, events);
        } else {
            // segmented move: pause, then restart for the rest
            trace!("end of move segment, pausing");
            self.awaiting = Some(AwaitedConfirm::MovePaused { remaining });
            events.push(ShadowEvent::Command(0));
        }
    }

    /// Process due deadlines. Call whenever `next_wakeup()` has passed.
    pub fn tick(
        &mut self,
        now: MonoTime,
        position: &mut Channel,
        angle: &mut Channel,
        events: &mut Vec<ShadowEvent>,
    ) {
        if let Some((at, remaining)) = self.moving_deadline {
            if now >= at {
                self.moving_deadline = None;
                self.end_move(now, remaining, events);
            }
        }
        if let Some((at, step)) = self.sequence_deadline {
            if now >= at {
                self.sequence_deadline = None;
                match step {
                    SeqStep::ProcessStopped => self.process_stopped(now, position, angle, events),
                    SeqStep::ApplyAngle => self.apply_angle(now, position, angle, events),
                    SeqStep::RestartMove { remaining } => {
                        self.start_moving(now, remaining, position, angle, events)
                    }
                }
            }
        }
        if let Some(at) = self.progress_deadline {
            if now >= at {
                position.update_timed_transition(now, PROGRESS_CAP);
                angle.update_timed_transition(now, PROGRESS_CAP);
                events.push(ShadowEvent::Progress);
                self.progress_deadline = Some(now + PROGRESS_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
