//! Protocol-version resolution.
//!
//! Maps a reported `MAJOR.MINOR[.PATCH]` OS version string plus the device
//! kind to a dialect tag. The rules are a first-match chain and their order
//! is load-bearing: the old-generation bound is checked before the
//! new-generation rules, and the specific 12.2 physical-device rule must run
//! before the collapse to the default.

use serde::Serialize;

/// A version-specific variant of the remote-debugging wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Legacy engines, OS major version 8 and below.
    V8,
    /// The default dialect for everything in between.
    V9,
    /// The 12.2 physical-device variant.
    V12,
    /// 13.4 and newer.
    V13,
}

impl Dialect {
    /// The wire tag for this dialect.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::V8 => "v8",
            Dialect::V9 => "v9",
            Dialect::V12 => "v12",
            Dialect::V13 => "v13",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the dialect for an OS version string and device kind.
///
/// Malformed or non-numeric input resolves to the default dialect; this
/// function never fails. A bare major version (`"13"`) has no MINOR
/// component and also falls through to the default.
pub fn resolve_dialect(os_version: &str, is_simulator: bool) -> Dialect {
    let (major, minor) = match parse_major_minor(os_version) {
        Some(parts) => parts,
        None => return Dialect::V9,
    };

    if major <= 8 {
        return Dialect::V8;
    }
    if major > 13 || (major == 13 && minor.is_some_and(|m| m >= 4)) {
        return Dialect::V13;
    }
    if !is_simulator && major == 12 && minor == Some(2) {
        return Dialect::V12;
    }
    Dialect::V9
}

/// Parse the MAJOR and optional MINOR components of a version string.
/// Anything past MINOR (patch level, build suffixes) is ignored.
fn parse_major_minor(version: &str) -> Option<(u32, Option<u32>)> {
    let mut parts = version.split('.');
    let major = parts.next()?.trim().parse::<u32>().ok()?;
    let minor = parts.next().and_then(|m| m.trim().parse::<u32>().ok());
    Some((major, minor))
}
