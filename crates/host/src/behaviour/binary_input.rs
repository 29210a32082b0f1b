// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary input behaviour: a two-state hardware input (contact, motion,
//! presence, smoke, ...) with change tracking for pushes and triggers.

use tracing::debug;
use vdcapi::frames::DsGroup;

use crate::clock::MonoTime;

/// What the input physically senses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryInputType {
    #[default]
    Generic,
    Presence,
    Light,
    Motion,
    WindowOpen,
    DoorOpen,
    Smoke,
    Wind,
    Rain,
    LowBattery,
}

#[derive(Debug)]
pub struct BinaryInputBehaviour {
    pub id: String,
    pub index: usize,
    pub group: DsGroup,
    pub input_type: BinaryInputType,
    /// `None` until the hardware reported a first state.
    state: Option<bool>,
    last_update: Option<MonoTime>,
}

impl BinaryInputBehaviour {
    pub fn new(id: impl Into<String>, index: usize, input_type: BinaryInputType) -> Self {
        Self {
            id: id.into(),
            index,
            group: DsGroup::Undefined,
            input_type,
            state: None,
            last_update: None,
        }
    }

    pub fn state(&self) -> Option<bool> {
        self.state
    }

    pub fn last_update(&self) -> Option<MonoTime> {
        self.last_update
    }

    pub fn has_defined_state(&self) -> bool {
        self.state.is_some()
    }

    /// Report a hardware state. Returns true when the state changed (first
    /// report always counts as a change).
    pub fn update_input_state(&mut self, value: bool, now: MonoTime) -> bool {
        let changed = self.state != Some(value);
        self.state = Some(value);
        self.last_update = Some(now);
        if changed {
            debug!(input = %self.id, value, "input state changed");
        }
        changed
    }

    /// Forget the current state (e.g. device unreachable).
    pub fn invalidate(&mut self) {
        self.state = None;
        self.last_update = None;
    }
}
