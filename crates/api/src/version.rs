// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vDC API version negotiation.

/// Oldest protocol revision this host still understands.
pub const API_VERSION_MIN: u16 = 2;

/// Newest protocol revision this host speaks.
pub const API_VERSION_MAX: u16 = 4;

/// Check a peer's `hello` version against the supported window.
///
/// `max_override` lets an operator pin the host below its compiled-in
/// maximum; zero means no override.
pub fn version_acceptable(version: u16, max_override: u16) -> bool {
    let max = if max_override == 0 || max_override >= API_VERSION_MAX {
        API_VERSION_MAX
    } else {
        max_override
    };
    version >= API_VERSION_MIN && version <= max
}
