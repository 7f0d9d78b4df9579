// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! SoC capability detection via `/sys/devices/soc0/`.
//!
//! The kernel's soc bus driver exposes the machine identifier as a short
//! string (`i.MX8MP`, `i.MX93`, ...). Which 2D engine features exist is a
//! property of the SoC, not discoverable through the engine API, so the
//! supported set is compiled in.

use std::path::Path;

/// Default sysfs path of the SoC identifier.
const SOC_ID_PATH: &str = "/sys/devices/soc0/soc_id";

/// SoCs whose 2D engine this crate knows how to drive.
const SUPPORTED_SOCS: &[&str] = &["i.MX8MP", "i.MX93", "i.MX8QM", "i.MX8QXP"];

/// SoCs whose engine accepts three source channels in one operation.
const THREE_CHANNEL_SOCS: &[&str] = &["i.MX8QM", "i.MX8QXP"];

/// Optional features of the 2D engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Capability {
    /// Plane composition from three sources in a single pass.
    ThreeChannels,
}

/// What the running platform's 2D engine can do.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HardwareCaps {
    /// SoC identifier as reported by the kernel, when readable.
    pub soc_id: Option<String>,
    /// Whether the SoC carries a supported 2D engine at all.
    pub supported: bool,
    /// Whether the engine composes three source channels in one pass.
    pub three_channels: bool,
}

impl HardwareCaps {
    /// Probes the running platform.
    ///
    /// An unreadable identifier (non-embedded host, container without sysfs)
    /// yields an unsupported platform rather than an error; acceleration is
    /// an upgrade, not a requirement.
    pub fn detect() -> Self {
        Self::detect_from(Path::new(SOC_ID_PATH))
    }

    /// Probes a specific sysfs path.
    pub(crate) fn detect_from(path: &Path) -> Self {
        let soc_id = match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                tracing::warn!("cannot read SoC identifier from '{}': {e}", path.display());
                return Self {
                    soc_id: None,
                    supported: false,
                    three_channels: false,
                };
            }
        };

        let supported = SUPPORTED_SOCS.contains(&soc_id.as_str());
        let three_channels = THREE_CHANNEL_SOCS.contains(&soc_id.as_str());
        if !supported {
            tracing::warn!("SoC '{soc_id}' has no supported 2D engine");
        }

        Self {
            soc_id: Some(soc_id),
            supported,
            three_channels,
        }
    }

    /// Builds capabilities by hand, for hosts and tests.
    pub fn unsupported() -> Self {
        Self {
            soc_id: None,
            supported: false,
            three_channels: false,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::ThreeChannels => self.three_channels,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
