// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Value sources: every enabled input, sensor, button and channel exposed
//! as a named scalar for trigger conditions.
//!
//! Source ids follow `<device-dsuid>_<kind><index-or-id>` with kind S
//! (sensor), I (binary input), B (button) or C (channel).

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use vdcapi::DsUid;

use crate::behaviour::BehaviourKind;
use crate::clock::MonoTime;

/// Descriptor of one value source at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSourceDescriptor {
    pub id: String,
    pub name: String,
    pub value: Option<f64>,
    pub last_update: Option<MonoTime>,
    /// Operation level of the underlying device, 0..100.
    pub op_level: i32,
}

/// Build the id of a behaviour's value source.
pub fn source_id(dsuid: &DsUid, kind: BehaviourKind, index: usize) -> String {
    format!("{dsuid}_{}{index}", kind.source_tag())
}

/// Build the id of a channel value source from the channel id string.
pub fn channel_source_id(dsuid: &DsUid, channel_id: &str) -> String {
    format!("{dsuid}_C{channel_id}")
}

/// A parsed source id.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub dsuid: DsUid,
    pub kind: char,
    /// Behaviour index or channel id.
    pub selector: String,
}

// 34 hex chars, separator, kind tag, selector
#[allow(clippy::expect_used)]
fn source_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9a-fA-F]{34})_([SIBC])(.+)$").expect("static pattern"))
}

/// Parse a source id back into its parts.
pub fn parse_source_id(id: &str) -> Option<SourceRef> {
    let caps = source_id_pattern().captures(id)?;
    let dsuid = DsUid::from_str(caps.get(1)?.as_str()).ok()?;
    let kind = caps.get(2)?.as_str().chars().next()?;
    let selector = caps.get(3)?.as_str().to_owned();
    Some(SourceRef { dsuid, kind, selector })
}

#[cfg(test)]
mod tests {
    use vdcapi::dsuid::DSUID_NAMESPACE;

    use super::*;

    #[test]
    fn ids_round_trip() {
        let dsuid = DsUid::from_name_in_space("vs", &DSUID_NAMESPACE);
        let id = source_id(&dsuid, BehaviourKind::Sensor, 2);
        let parsed = parse_source_id(&id).unwrap();
        assert_eq!(parsed.dsuid, dsuid);
        assert_eq!(parsed.kind, 'S');
        assert_eq!(parsed.selector, "2");

        let cid = channel_source_id(&dsuid, "brightness");
        let parsed = parse_source_id(&cid).unwrap();
        assert_eq!(parsed.kind, 'C');
        assert_eq!(parsed.selector, "brightness");
    }

    #[test]
    fn malformed_ids_rejected() {
        assert!(parse_source_id("nonsense").is_none());
        assert!(parse_source_id("00_S1").is_none());
    }
}
