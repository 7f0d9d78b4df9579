// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the graphic allocator.
//!
//! Only resource conditions are reported as errors. Contract violations
//! (double free, foreign handle, overlapping registration) are caller bugs
//! and panic instead, naming the broken invariant.

use crate::raw::RawError;

/// Errors returned by allocator operations.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// The raw backend could not provide the buffer. The allocator state is
    /// unchanged; callers may retry with a smaller request or fall back to
    /// ordinary heap memory.
    #[error("graphic buffer allocation of {requested} bytes failed: {source}")]
    Exhausted {
        requested: usize,
        #[source]
        source: RawError,
    },

    /// Zero-sized graphic buffers are not representable.
    #[error("cannot allocate a zero-sized graphic buffer")]
    ZeroSized,

    /// A human-readable size string could not be parsed.
    #[error("invalid size string: {0}")]
    InvalidSize(String),

    /// Fallback allocator reconfiguration requires all of its buffers to be
    /// returned first.
    #[error("cannot reconfigure while {outstanding} pooled buffers are outstanding")]
    ActiveBuffers { outstanding: usize },
}
