// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The 17-byte globally-unique identifier carried by every addressable
//! entity: 16 bytes of identity material plus one subdevice index byte.
//!
//! Three derivations exist and all must stay stable across restarts:
//! name-in-namespace (UUIDv5), MAC-derived (UUIDv5 over a canonical MAC
//! string), and externally assigned (parsed from hex).

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::hash::Fnv64;

/// Namespace for all name-derived dSUIDs of this host family.
pub const DSUID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x98, 0x88, 0xdd, 0x3d, 0xb3, 0x45, 0x41, 0x09, 0xb0, 0x88, 0x26, 0x73, 0x30, 0x6d, 0x0c,
    0x65,
]);

pub const DSUID_BYTES: usize = 17;

/// 17-byte entity identifier. The last byte is the subdevice index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DsUid([u8; DSUID_BYTES]);

impl DsUid {
    /// The all-zero id, used as "not yet assigned".
    pub const fn zero() -> Self {
        Self([0; DSUID_BYTES])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; DSUID_BYTES] {
        &self.0
    }

    pub const fn from_bytes(bytes: [u8; DSUID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Derive from a name within a namespace (UUIDv5), subdevice index 0.
    pub fn from_name_in_space(name: &str, namespace: &Uuid) -> Self {
        let uuid = Uuid::new_v5(namespace, name.as_bytes());
        let mut bytes = [0u8; DSUID_BYTES];
        bytes[..16].copy_from_slice(uuid.as_bytes());
        Self(bytes)
    }

    /// Derive from a MAC address and an instance number on that interface.
    ///
    /// The canonical form hashed is `"AA:BB:CC:DD:EE:FF/<instance>"` so the
    /// same hardware always reproduces the same id.
    pub fn from_mac(mac: [u8; 6], instance: u32) -> Self {
        let name = format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}/{}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5], instance
        );
        Self::from_name_in_space(&name, &DSUID_NAMESPACE)
    }

    /// Return this id with the given subdevice index in the last byte.
    pub fn with_subdevice_index(&self, index: u8) -> Self {
        let mut bytes = self.0;
        bytes[DSUID_BYTES - 1] = index;
        Self(bytes)
    }

    pub fn subdevice_index(&self) -> u8 {
        self.0[DSUID_BYTES - 1]
    }

    /// Fold the full id (subdevice byte included) into 64 bits.
    ///
    /// Because the subdevice byte participates, XOR-mixing these folds over
    /// an audience is order-insensitive and still distinguishes subdevices
    /// of the same base id.
    pub fn fold64(&self) -> u64 {
        let mut h = Fnv64::new();
        h.add_bytes(&self.0);
        h.hash()
    }

    /// XOR this id's fold into an accumulating audience hash.
    pub fn mix_into(&self, mix: &mut u64) {
        *mix ^= self.fold64();
    }
}

impl fmt::Display for DsUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DsUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DsUid({self})")
    }
}

/// Error parsing a dSUID from its 34-char hex form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDsUidError;

impl fmt::Display for ParseDsUidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid dSUID: expected 34 hex characters")
    }
}

impl std::error::Error for ParseDsUidError {}

impl FromStr for DsUid {
    type Err = ParseDsUidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DSUID_BYTES * 2 {
            return Err(ParseDsUidError);
        }
        let mut bytes = [0u8; DSUID_BYTES];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| ParseDsUidError)?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| ParseDsUidError)?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for DsUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct DsUidVisitor;

impl Visitor<'_> for DsUidVisitor {
    type Value = DsUid;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 34-character hex dSUID string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DsUid, E> {
        v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for DsUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(DsUidVisitor)
    }
}

#[cfg(test)]
#[path = "dsuid_tests.rs"]
mod tests;
