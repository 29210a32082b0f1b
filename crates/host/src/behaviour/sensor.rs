// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sensor behaviour: a scalar hardware input with push-rate limiting.

use std::time::Duration;

use tracing::trace;
use vdcapi::frames::{ChannelType, DsGroup};

use crate::clock::MonoTime;

/// Physical quantity the sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorType {
    #[default]
    Generic,
    Temperature,
    Humidity,
    Illumination,
    Power,
    WindSpeed,
    Precipitation,
    CO2,
    /// Signed speed in percent of full range; used by dial/slider sensors
    /// that directly drive channel movement.
    PercentSpeed,
}

/// How the local controller routes value changes of this sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorFunc {
    /// Plain measurement, no direct control routing.
    #[default]
    Standard,
    /// Application-handled; never routed locally.
    App,
    /// Drives the configured channel in this sensor's room.
    DimmerRoom,
    DimmerArea1,
    DimmerArea2,
    DimmerArea3,
    DimmerArea4,
    /// Drives the configured channel apartment-wide.
    DimmerGlobal,
}

impl SensorFunc {
    /// Area this function addresses, 0 for none.
    pub fn area(&self) -> u8 {
        match self {
            Self::DimmerArea1 => 1,
            Self::DimmerArea2 => 2,
            Self::DimmerArea3 => 3,
            Self::DimmerArea4 => 4,
            _ => 0,
        }
    }
}

#[derive(Debug)]
pub struct SensorBehaviour {
    pub id: String,
    pub index: usize,
    pub group: DsGroup,
    pub sensor_type: SensorType,
    pub func: SensorFunc,
    /// Channel this sensor controls when its function routes values.
    pub channel: ChannelType,
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
    /// Minimum interval between upstream pushes of unchanged-trend values.
    pub min_push_interval: Duration,
    current_value: Option<f64>,
    last_update: Option<MonoTime>,
    last_push: Option<MonoTime>,
}

impl SensorBehaviour {
    pub fn new(id: impl Into<String>, index: usize, sensor_type: SensorType, min: f64, max: f64, resolution: f64) -> Self {
        Self {
            id: id.into(),
            index,
            group: DsGroup::Undefined,
            sensor_type,
            func: SensorFunc::Standard,
            channel: ChannelType::Default,
            min,
            max,
            resolution,
            min_push_interval: Duration::from_secs(2),
            current_value: None,
            last_update: None,
            last_push: None,
        }
    }

    pub fn current_value(&self) -> Option<f64> {
        self.current_value
    }

    pub fn last_update(&self) -> Option<MonoTime> {
        self.last_update
    }

    pub fn has_defined_state(&self) -> bool {
        self.current_value.is_some()
    }

    /// Install a new measurement. Returns true when the value should be
    /// pushed upstream (changed beyond resolution, rate limit respected).
    pub fn update_sensor_value(&mut self, value: f64, now: MonoTime) -> bool {
        let value = value.clamp(self.min, self.max);
        let changed = match self.current_value {
            None => true,
            Some(prev) => (prev - value).abs() >= self.resolution.max(f64::EPSILON),
        };
        self.current_value = Some(value);
        self.last_update = Some(now);
        if !changed {
            return false;
        }
        let pushable = match self.last_push {
            None => true,
            Some(at) => now.since(at) >= self.min_push_interval,
        };
        if pushable {
            self.last_push = Some(now);
        } else {
            trace!(sensor = %self.id, value, "change withheld by push rate limit");
        }
        pushable
    }

    /// Forget the current measurement (e.g. device unreachable).
    pub fn invalidate(&mut self) {
        self.current_value = None;
        self.last_update = None;
    }
}
