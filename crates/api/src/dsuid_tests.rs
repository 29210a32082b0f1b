// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn name_derivation_is_stable() {
    let a = DsUid::from_name_in_space("demo.device.1", &DSUID_NAMESPACE);
    let b = DsUid::from_name_in_space("demo.device.1", &DSUID_NAMESPACE);
    let c = DsUid::from_name_in_space("demo.device.2", &DSUID_NAMESPACE);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.subdevice_index(), 0);
}

#[test]
fn mac_derivation_depends_on_instance() {
    let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    let a = DsUid::from_mac(mac, 0);
    let b = DsUid::from_mac(mac, 1);
    assert_ne!(a, b);
    assert_eq!(a, DsUid::from_mac(mac, 0));
}

#[test]
fn hex_round_trip() {
    let id = DsUid::from_name_in_space("roundtrip", &DSUID_NAMESPACE).with_subdevice_index(3);
    let text = id.to_string();
    assert_eq!(text.len(), 34);
    let parsed: DsUid = text.parse().unwrap();
    assert_eq!(parsed, id);
    assert_eq!(parsed.subdevice_index(), 3);
}

#[yare::parameterized(
    empty = { "" },
    too_short = { "00112233" },
    bad_hex = { "zz112233445566778899aabbccddeeff0011" },
)]
fn rejects_malformed(text: &str) {
    assert!(text.parse::<DsUid>().is_err());
}

#[test]
fn serde_uses_hex_string() {
    let id = DsUid::from_name_in_space("serde", &DSUID_NAMESPACE);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let back: DsUid = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn subdevice_mixing_does_not_cancel() {
    let base = DsUid::from_name_in_space("mixer", &DSUID_NAMESPACE);
    let sub1 = base.with_subdevice_index(1);
    let sub2 = base.with_subdevice_index(2);
    let mut mix = 0u64;
    sub1.mix_into(&mut mix);
    sub2.mix_into(&mut mix);
    assert_ne!(mix, 0);
    // order-insensitive
    let mut mix2 = 0u64;
    sub2.mix_into(&mut mix2);
    sub1.mix_into(&mut mix2);
    assert_eq!(mix, mix2);
    // mixing the same id twice cancels out
    let mut mix3 = mix;
    sub1.mix_into(&mut mix3);
    sub1.mix_into(&mut mix3);
    assert_eq!(mix3, mix);
}
