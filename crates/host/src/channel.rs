// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One scalar output dimension of a device: brightness, shade position,
//! hue, and so on.
//!
//! A channel carries a cached current value (what the hardware last
//! confirmed or what we last synced from it) and a target value (what the
//! owner wants applied). `needs_apply` bridges the two; it is cleared only
//! once the backend has accepted the value. Transitions are modelled, not
//! simulated by repeated writes: while a timed transition runs, the
//! calculated value interpolates between current and target.

use std::time::Duration;

use vdcapi::frames::ChannelType;

use crate::clock::MonoTime;

/// Default full-scale dim time: bottom to top of the range in 7 seconds.
const FULL_SCALE_DIM_TIME_MS: f64 = 7000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    /// Set once the movement/ramp actually started; estimation uses this.
    started: Option<MonoTime>,
    duration: Duration,
    progress: f64,
}

/// A single output channel.
#[derive(Debug, Clone)]
pub struct Channel {
    channel_type: ChannelType,
    id: String,
    min: f64,
    max: f64,
    resolution: f64,
    /// Last value known to be in the hardware (start point of transitions).
    current: f64,
    /// Value the owner wants in the hardware.
    target: f64,
    needs_apply: bool,
    /// Transition time to use for the next apply.
    transition_time: Duration,
    transition: Option<Transition>,
    custom_dim_per_ms: Option<f64>,
    last_sync: Option<MonoTime>,
}

impl Channel {
    pub fn new(channel_type: ChannelType, id: impl Into<String>, min: f64, max: f64, resolution: f64) -> Self {
        Self {
            channel_type,
            id: id.into(),
            min,
            max,
            resolution,
            current: min,
            target: min,
            needs_apply: false,
            transition_time: Duration::ZERO,
            transition: None,
            custom_dim_per_ms: None,
            last_sync: None,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn needs_apply(&self) -> bool {
        self.needs_apply
    }

    pub fn transition_time(&self) -> Duration {
        self.transition_time
    }

    pub fn last_sync(&self) -> Option<MonoTime> {
        self.last_sync
    }

    /// The logical channel value: the target while an apply or transition is
    /// pending, the confirmed value otherwise.
    pub fn value(&self) -> f64 {
        self.target
    }

    // Values are stored unquantized; resolution is hardware metadata and
    // quantizing here would break bit-exact capture/restore.
    fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    /// Set a new target value. Marks the channel for apply when the target
    /// actually changes (or unconditionally with `always_apply`).
    pub fn set_value(&mut self, v: f64, transition_time: Duration, always_apply: bool) {
        let v = self.clamp(v);
        if always_apply || (v - self.target).abs() >= f64::EPSILON {
            self.target = v;
            self.needs_apply = true;
            self.transition_time = transition_time;
        }
    }

    /// Native dim rate in units per millisecond, or the custom override
    /// when one is installed.
    pub fn dim_per_ms(&self) -> f64 {
        match self.custom_dim_per_ms {
            Some(rate) if rate > 0.0 => rate,
            _ => (self.max - self.min) / FULL_SCALE_DIM_TIME_MS,
        }
    }

    /// Install a dim rate override. Only strictly positive rates are
    /// honored; `None` restores the native rate.
    pub fn set_custom_dim_per_ms(&mut self, rate: Option<f64>) {
        self.custom_dim_per_ms = rate.filter(|r| *r > 0.0);
    }

    /// Apply a dim increment relative to the calculated current value, so
    /// dimming through a running transition continues from where the ramp
    /// actually is.
    pub fn dim_value(&mut self, increment: f64, per_step_time: Duration, now: MonoTime) {
        let base = self.calculated(now);
        let v = self.clamp(base + increment);
        self.transition = None;
        self.current = base.clamp(self.min, self.max);
        self.target = v;
        self.needs_apply = true;
        self.transition_time = per_step_time;
    }

    /// Install a hardware-observed value without triggering an apply.
    ///
    /// While an apply is pending the cached target stays authoritative and
    /// only the confirmed-side value is updated.
    pub fn sync_value(&mut self, v: f64, now: MonoTime) {
        let v = self.clamp(v);
        self.transition = None;
        self.current = v;
        if !self.needs_apply {
            self.target = v;
        }
        self.last_sync = Some(now);
    }

    /// Confirm the target value reached the hardware. Only clears the
    /// apply flag and finishes the bookkeeping; no wall-clock use.
    pub fn value_applied(&mut self, anyway: bool) {
        if self.needs_apply || anyway {
            self.needs_apply = false;
            if self.transition.is_none() {
                // no modelled transition: target is now current
                self.current = self.target;
            }
        }
    }

    /// Begin modelling a transition whose progress is estimated from the
    /// wall clock over `duration`.
    pub fn start_externally_timed_transition(&mut self, now: MonoTime, duration: Duration) {
        if duration.is_zero() {
            self.transition = None;
            return;
        }
        self.transition = Some(Transition { started: Some(now), duration, progress: 0.0 });
    }

    /// Re-estimate transition progress from the clock, capped at `cap`
    /// (progress reports stay below 100% until the move is confirmed).
    pub fn update_timed_transition(&mut self, now: MonoTime, cap: f64) {
        let Some(t) = self.transition.as_mut() else { return };
        let Some(started) = t.started else { return };
        let frac = if t.duration.is_zero() {
            1.0
        } else {
            now.since(started).as_secs_f64() / t.duration.as_secs_f64()
        };
        t.progress = frac.min(cap).min(1.0);
        if t.progress >= 1.0 {
            self.finish_transition();
        }
    }

    /// Directly set transition progress; 1.0 completes the transition.
    pub fn set_transition_progress(&mut self, frac: f64) {
        let Some(t) = self.transition.as_mut() else { return };
        t.progress = frac.clamp(0.0, 1.0);
        if t.progress >= 1.0 {
            self.finish_transition();
        }
    }

    fn finish_transition(&mut self) {
        self.transition = None;
        self.current = self.target;
    }

    pub fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Current value with any running transition interpolated in. Always
    /// within `[min, max]`.
    pub fn calculated(&self, now: MonoTime) -> f64 {
        let v = match &self.transition {
            None => self.target,
            Some(t) => {
                let progress = match t.started {
                    Some(started) if !t.duration.is_zero() => {
                        let frac = now.since(started).as_secs_f64() / t.duration.as_secs_f64();
                        frac.max(t.progress).min(1.0)
                    }
                    _ => t.progress,
                };
                self.current + (self.target - self.current) * progress
            }
        };
        v.clamp(self.min, self.max)
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
