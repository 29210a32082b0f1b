// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input and output abstractions layered over a device.
//!
//! A device owns vectors of buttons, binary inputs and sensors, and at most
//! one output. Each behaviour has a string id unique within its vector
//! (auto-derived from kind and index when not given) and its index is its
//! position in that vector.

pub mod binary_input;
pub mod button;
pub mod output;
pub mod sensor;
pub mod shadow;

pub use binary_input::BinaryInputBehaviour;
pub use button::ButtonBehaviour;
pub use output::OutputBehaviour;
pub use sensor::SensorBehaviour;

/// The four behaviour kinds of the device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviourKind {
    Button,
    BinaryInput,
    Sensor,
    Output,
}

impl BehaviourKind {
    /// Prefix used for auto-derived behaviour ids and value-source ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::BinaryInput => "input",
            Self::Sensor => "sensor",
            Self::Output => "output",
        }
    }

    /// Single-letter kind tag used in value source ids.
    pub fn source_tag(&self) -> char {
        match self {
            Self::Button => 'B',
            Self::BinaryInput => 'I',
            Self::Sensor => 'S',
            Self::Output => 'C',
        }
    }
}

/// Derive the id for a behaviour that was added without one.
pub fn auto_id(kind: BehaviourKind, index: usize) -> String {
    format!("{}{}", kind.id_prefix(), index)
}
