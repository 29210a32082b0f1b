// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output behaviour: owns a device's channels and the output-wide flags
//! (group memberships, local priority, enable state).
//!
//! Concrete output models add their semantics on top: lights gate
//! brightness dimming on being on, shades route applies through the
//! movement sequencer.

use std::time::Duration;

use vdcapi::frames::{ChannelType, DsGroup};

use crate::channel::Channel;
use crate::clock::MonoTime;
use crate::scene::Scene;

use super::shadow::{ShadowKind, ShadowSequencer};

/// Minimum "on" level used by minimum-on scene calls.
const MIN_ON_LEVEL: f64 = 1.0;

/// Concrete output semantics.
#[derive(Debug)]
pub enum OutputModel {
    /// Plain switched/dimmed output without extra semantics.
    Generic,
    /// Light output: primary channel is brightness.
    Light,
    /// Shade output driven by the movement sequencer.
    Shadow(ShadowSequencer),
}

#[derive(Debug)]
pub struct OutputBehaviour {
    pub id: String,
    pub model: OutputModel,
    channels: Vec<Channel>,
    group_mask: u16,
    pub default_group: DsGroup,
    local_priority: bool,
    pub enabled: bool,
    /// Default transition for scene applies that don't override it.
    pub transition_time: Duration,
}

impl OutputBehaviour {
    pub fn new(model: OutputModel, channels: Vec<Channel>, default_group: DsGroup) -> Self {
        let mut out = Self {
            id: "output".to_owned(),
            model,
            channels,
            group_mask: 0,
            default_group,
            local_priority: false,
            enabled: true,
            transition_time: Duration::ZERO,
        };
        out.set_group_membership(default_group, true);
        out
    }

    /// A light output with one brightness channel.
    pub fn light() -> Self {
        let brightness = Channel::new(ChannelType::Brightness, "brightness", 0.0, 100.0, 0.1);
        Self::new(OutputModel::Light, vec![brightness], DsGroup::YellowLight)
    }

    /// A shade output with position and angle channels.
    pub fn shadow(kind: ShadowKind) -> Self {
        let position = Channel::new(ChannelType::ShadePosition, "position", 0.0, 100.0, 0.1);
        let angle = Channel::new(ChannelType::ShadeAngle, "angle", 0.0, 100.0, 0.1);
        Self::new(
            OutputModel::Shadow(ShadowSequencer::new(kind)),
            vec![position, angle],
            DsGroup::GreyShadow,
        )
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Channel] {
        &mut self.channels
    }

    pub fn channel_by_index(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channel_by_index_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.channels.get_mut(index)
    }

    /// Resolve a channel by type; `Default` resolves to the primary one.
    pub fn channel_index_by_type(&self, channel_type: ChannelType) -> Option<usize> {
        if channel_type == ChannelType::Default {
            return (!self.channels.is_empty()).then_some(0);
        }
        self.channels.iter().position(|c| c.channel_type() == channel_type)
    }

    pub fn channel_index_by_id(&self, id: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.id() == id)
    }

    /// Indexes of channels with a pending apply, so apply loops only touch
    /// what actually needs it.
    pub fn pending_apply_indexes(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.needs_apply().then_some(i))
            .collect()
    }

    pub fn needs_apply(&self) -> bool {
        self.channels.iter().any(|c| c.needs_apply())
    }

    /// Longest transition time over channels pending apply.
    pub fn pending_transition_time(&self) -> Duration {
        self.channels
            .iter()
            .filter(|c| c.needs_apply())
            .map(|c| c.transition_time())
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Confirm all channels as applied (e.g. after a hardware-native call).
    pub fn all_channels_applied(&mut self, anyway: bool) {
        for c in &mut self.channels {
            c.value_applied(anyway);
        }
    }

    pub fn is_member(&self, group: DsGroup) -> bool {
        self.group_mask & (1 << group.number()) != 0
    }

    pub fn group_mask(&self) -> u16 {
        self.group_mask
    }

    pub fn set_group_membership(&mut self, group: DsGroup, member: bool) {
        if member {
            self.group_mask |= 1 << group.number();
        } else {
            self.group_mask &= !(1 << group.number());
        }
    }

    pub fn has_local_priority(&self) -> bool {
        self.local_priority
    }

    pub fn set_local_priority(&mut self, priority: bool) {
        self.local_priority = priority;
    }

    /// Primary channel is above zero.
    pub fn is_on(&self) -> bool {
        self.channels.first().map(|c| c.value() > 0.0).unwrap_or(false)
    }

    /// Whether the given channel may be dimmed right now. Lights refuse to
    /// dim brightness while off (dS dimming rule: only devices that are on
    /// take part).
    pub fn can_dim(&self, channel_index: usize) -> bool {
        match &self.model {
            OutputModel::Light | OutputModel::Generic => {
                if channel_index == 0 {
                    self.is_on()
                } else {
                    true
                }
            }
            OutputModel::Shadow(_) => true,
        }
    }

    /// Load scene values into the channels; returns true when anything was
    /// marked for apply.
    pub fn apply_scene_to_channels(&mut self, scene: &Scene, transition_override: Option<Duration>) -> bool {
        let transition = transition_override.unwrap_or(self.transition_time);
        for (i, channel) in self.channels.iter_mut().enumerate() {
            if let Some(slot) = scene.value(i) {
                if !slot.dont_care {
                    channel.set_value(slot.value, transition, false);
                }
            }
        }
        self.needs_apply()
    }

    /// Capture current channel values into a scene.
    pub fn capture_scene(&self, scene: &mut Scene) {
        for (i, channel) in self.channels.iter().enumerate() {
            scene.set_value(i, channel.value());
        }
    }

    /// Switch on at minimum level if currently off (callSceneMin).
    pub fn on_at_min_level(&mut self) {
        if !self.is_on() {
            if let Some(primary) = self.channels.first_mut() {
                primary.set_value(MIN_ON_LEVEL, Duration::ZERO, false);
            }
        }
    }

    /// End any modelled transitions (dimming stop, scene stop commands).
    pub fn stop_transitions(&mut self) {
        for c in &mut self.channels {
            c.set_transition_progress(1.0);
        }
    }

    /// Split borrow for shade outputs: sequencer plus position and angle
    /// channels. Returns `None` for other output models.
    pub fn shadow_parts(&mut self) -> Option<(&mut ShadowSequencer, &mut Channel, &mut Channel)> {
        match &mut self.model {
            OutputModel::Shadow(seq) => {
                let (pos, rest) = self.channels.split_first_mut()?;
                let ang = rest.first_mut()?;
                Some((seq, pos, ang))
            }
            _ => None,
        }
    }

    pub fn shadow_sequencer(&self) -> Option<&ShadowSequencer> {
        match &self.model {
            OutputModel::Shadow(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn is_shadow(&self) -> bool {
        matches!(self.model, OutputModel::Shadow(_))
    }

    /// Earliest deadline of model-internal machinery.
    pub fn next_wakeup(&self) -> Option<MonoTime> {
        match &self.model {
            OutputModel::Shadow(seq) => seq.next_wakeup(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
