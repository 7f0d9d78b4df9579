// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the acceleration HAL.

/// Errors from establishing or driving the acceleration context.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// The running SoC has no supported 2D engine.
    #[error("platform has no supported 2D engine (soc_id: {})", soc_id.as_deref().unwrap_or("unknown"))]
    UnsupportedPlatform { soc_id: Option<String> },

    /// The requested operation needs an engine feature this SoC lacks.
    #[error("2D engine on {soc_id} lacks the {feature} capability")]
    MissingCapability { soc_id: String, feature: String },
}
