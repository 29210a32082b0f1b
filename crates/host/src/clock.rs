// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic time for the behavioral engine.
//!
//! All state machines take `now` as an explicit parameter and keep pending
//! work as deadline fields, so unit tests drive time directly and the run
//! loop owns the single mapping to the process clock.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::{Duration, Instant};

/// Microsecond-resolution monotonic timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MonoTime(u64);

impl MonoTime {
    pub const ZERO: MonoTime = MonoTime(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1000)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`; zero if `earlier` is in the future.
    pub fn since(&self, earlier: MonoTime) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for MonoTime {
    type Output = MonoTime;

    fn add(self, d: Duration) -> MonoTime {
        MonoTime(self.0.saturating_add(d.as_micros() as u64))
    }
}

impl AddAssign<Duration> for MonoTime {
    fn add_assign(&mut self, d: Duration) {
        *self = *self + d;
    }
}

impl Sub<Duration> for MonoTime {
    type Output = MonoTime;

    fn sub(self, d: Duration) -> MonoTime {
        MonoTime(self.0.saturating_sub(d.as_micros() as u64))
    }
}

impl fmt::Display for MonoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0 as f64 / 1_000_000.0)
    }
}

/// Maps the process monotonic clock onto [`MonoTime`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn now(&self) -> MonoTime {
        MonoTime(self.origin.elapsed().as_micros() as u64)
    }

    /// Translate an engine deadline into a process `Instant` for sleeping.
    pub fn instant_for(&self, t: MonoTime) -> Instant {
        self.origin + Duration::from_micros(t.0)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold an optional deadline into the earliest pending wakeup.
pub fn earliest(a: Option<MonoTime>, b: Option<MonoTime>) -> Option<MonoTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}
