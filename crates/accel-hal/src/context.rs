// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The acceleration context: capability gate plus allocator lease.

use graphic_allocator::{EnableGuard, GraphicAllocator};

use crate::caps::{Capability, HardwareCaps};
use crate::counters::PrimitiveCounters;
use crate::error::HalError;

/// A live connection to the platform's 2D acceleration stack.
///
/// Construction is the capability gate: it refuses unsupported platforms,
/// and on supported ones it takes a caching lease on the graphic allocator
/// so frame buffers are recycled for as long as the context exists. Pipeline
/// code records its engine submissions in [`counters`](Self::counters).
#[derive(Debug)]
pub struct AccelContext {
    caps: HardwareCaps,
    counters: PrimitiveCounters,
    _enable: EnableGuard,
}

impl AccelContext {
    /// Opens a context on this platform.
    pub fn new(caps: HardwareCaps, allocator: &GraphicAllocator) -> Result<Self, HalError> {
        if !caps.supported {
            return Err(HalError::UnsupportedPlatform {
                soc_id: caps.soc_id.clone(),
            });
        }
        tracing::info!(
            "2D acceleration context opened on {} (three-channel: {})",
            caps.soc_id.as_deref().unwrap_or("unknown"),
            caps.three_channels
        );
        Ok(Self {
            caps,
            counters: PrimitiveCounters::new(),
            _enable: allocator.enable(),
        })
    }

    pub fn capabilities(&self) -> &HardwareCaps {
        &self.caps
    }

    pub fn counters(&self) -> &PrimitiveCounters {
        &self.counters
    }

    /// Checks that the engine provides `capability` before an operation
    /// that needs it is composed.
    pub fn require(&self, capability: Capability) -> Result<(), HalError> {
        if self.caps.has_capability(capability) {
            Ok(())
        } else {
            Err(HalError::MissingCapability {
                soc_id: self
                    .caps
                    .soc_id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                feature: format!("{capability:?}"),
            })
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
