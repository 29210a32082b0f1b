// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zones and their transient state.
//!
//! Zone state is bookkeeping over what scene calls and dims happened, so
//! single buttons can toggle ("light is on, next click means off") and
//! reverse dim direction. Index 0 of the per-area arrays is the whole
//! room; 1..4 are the areas.

use vdcapi::frames::{ChannelType, DimMode, DsGroup, ZoneId};

use crate::error::HostResult;
use crate::persist::{FieldDef, PersistedParams, RowIdentity, RowReader, StatementBuilder};
use crate::scene::SceneNo;

/// Transient state of one zone.
#[derive(Debug, Clone)]
pub struct ZoneState {
    pub light_on: [bool; 5],
    pub shades_open: [bool; 5],
    pub last_light_scene: Option<SceneNo>,
    pub last_global_scene: Option<SceneNo>,
    /// Direction of the last dim; a stop is recorded as the previous
    /// non-stop direction so the next single-button hold reverses it.
    pub last_dim: DimMode,
    pub last_dim_channel: ChannelType,
}

impl Default for ZoneState {
    fn default() -> Self {
        Self {
            light_on: [false; 5],
            shades_open: [false; 5],
            last_light_scene: None,
            last_global_scene: None,
            last_dim: DimMode::Down,
            last_dim_channel: ChannelType::Default,
        }
    }
}

impl ZoneState {
    /// On/open state for a group and area (area 0 = whole room).
    pub fn state_for(&self, group: DsGroup, area: usize) -> bool {
        match group {
            DsGroup::GreyShadow => self.shades_open[area.min(4)],
            _ => self.light_on[area.min(4)],
        }
    }

    pub fn set_state_for(&mut self, group: DsGroup, area: usize, state: bool) {
        match group {
            DsGroup::GreyShadow => self.shades_open[area.min(4)] = state,
            _ => self.light_on[area.min(4)] = state,
        }
    }
}

/// One zone known to the local controller.
#[derive(Debug, Clone)]
pub struct Zone {
    pub zone_id: ZoneId,
    pub name: String,
    /// Devices currently registered in this zone.
    pub device_count: usize,
    pub state: ZoneState,
}

impl Zone {
    pub fn new(zone_id: ZoneId, name: impl Into<String>) -> Self {
        Self { zone_id, name: name.into(), device_count: 0, state: ZoneState::default() }
    }
}

// -- persistence --------------------------------------------------------------

const ZONE_FIELDS: &[FieldDef] = &[FieldDef::integer("zoneId"), FieldDef::text("zoneName")];

impl PersistedParams for Zone {
    fn table_name(&self) -> &'static str {
        "zones"
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        ZONE_FIELDS
    }

    fn row_identity(&self) -> RowIdentity {
        RowIdentity::InList { key: self.zone_id.to_string() }
    }

    fn load_from_row(&mut self, row: &mut RowReader<'_>, _common_flags: &mut u64) -> HostResult<()> {
        self.zone_id = row.next_integer()?.clamp(0, i64::from(u16::MAX)) as ZoneId;
        self.name = row.next_text()?;
        Ok(())
    }

    fn bind_to_statement(&self, stmt: &mut StatementBuilder, _parent_id: &str, _common_flags: u64) {
        stmt.bind_integer(i64::from(self.zone_id));
        stmt.bind_text(self.name.clone());
    }
}
