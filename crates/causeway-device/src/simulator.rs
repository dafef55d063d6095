//! Simulator OS-version resolution.
//!
//! Simulators often omit their OS version from discovery records. The
//! version is recovered by enumerating installed simulator runtimes, which
//! is expensive (a shell-out), so results are cached for the life of the
//! process: at most one enumeration per simulator id per run, with failures
//! cached as the fallback so they are not retried.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::error::DeviceError;

/// Version string assumed when device metadata is unreadable.
///
/// This is a fallback only — it resolves to the default dialect and carries
/// no broader meaning.
pub const FALLBACK_OS_VERSION: &str = "9.3.0";

/// Enumerates installed simulator runtimes.
#[async_trait]
pub trait RuntimeEnumerator: Send + Sync {
    /// Map of simulator id to OS version string.
    async fn os_versions(&self) -> Result<HashMap<String, String>, DeviceError>;
}

/// Runtime enumeration via `xcrun simctl list devices --json`.
pub struct SimctlEnumerator;

#[async_trait]
impl RuntimeEnumerator for SimctlEnumerator {
    async fn os_versions(&self) -> Result<HashMap<String, String>, DeviceError> {
        let output = Command::new("xcrun")
            .args(["simctl", "list", "devices", "--json"])
            .output()
            .await
            .map_err(|e| DeviceError::Enumeration(format!("xcrun: {e}")))?;
        if !output.status.success() {
            return Err(DeviceError::Enumeration(format!(
                "simctl exited with {}",
                output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        parse_simctl_output(&text)
    }
}

/// Parse `simctl list devices --json` output into simulator id → version.
///
/// Runtime keys look like `com.apple.CoreSimulator.SimRuntime.iOS-13-4`;
/// the version is the dash-separated suffix.
pub fn parse_simctl_output(text: &str) -> Result<HashMap<String, String>, DeviceError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| DeviceError::Enumeration(format!("simctl output: {e}")))?;
    let devices = value
        .get("devices")
        .and_then(Value::as_object)
        .ok_or_else(|| DeviceError::Enumeration("simctl output has no devices map".into()))?;

    let mut versions = HashMap::new();
    for (runtime_id, entries) in devices {
        let Some(version) = version_from_runtime_id(runtime_id) else {
            continue;
        };
        let Some(entries) = entries.as_array() else {
            continue;
        };
        for entry in entries {
            if let Some(udid) = entry.get("udid").and_then(Value::as_str) {
                versions.insert(udid.to_string(), version.clone());
            }
        }
    }
    Ok(versions)
}

/// Extract `"13.4"` from `com.apple.CoreSimulator.SimRuntime.iOS-13-4`.
fn version_from_runtime_id(runtime_id: &str) -> Option<String> {
    let suffix = runtime_id.rsplit('.').next()?;
    let version = suffix.strip_prefix("iOS-")?;
    Some(version.replace('-', "."))
}

/// Lazily-populated simulator id → OS version cache.
///
/// Never invalidated within a process run.
#[derive(Debug, Default)]
pub struct SimulatorVersionCache {
    resolved: HashMap<String, String>,
}

impl SimulatorVersionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the OS version for a simulator id.
    ///
    /// A cache miss triggers one enumeration; every id the enumeration
    /// reports is cached. Ids the enumeration does not know (or a failed
    /// enumeration) are cached as [`FALLBACK_OS_VERSION`], so the same id
    /// never triggers a second shell-out.
    pub async fn resolve<E: RuntimeEnumerator>(
        &mut self,
        simulator_id: &str,
        enumerator: &E,
    ) -> String {
        if let Some(version) = self.resolved.get(simulator_id) {
            return version.clone();
        }

        match enumerator.os_versions().await {
            Ok(versions) => {
                for (id, version) in versions {
                    self.resolved.entry(id).or_insert(version);
                }
            }
            Err(err) => {
                tracing::warn!(simulator_id, %err, "runtime enumeration failed, using fallback version");
            }
        }

        self.resolved
            .entry(simulator_id.to_string())
            .or_insert_with(|| FALLBACK_OS_VERSION.to_string())
            .clone()
    }

    /// Number of cached resolutions.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
