// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII lease on buffer caching.

use std::fmt;
use std::sync::Arc;

use crate::allocator::AllocatorInner;

/// Keeps buffer caching enabled for as long as it lives.
///
/// Consumers that benefit from reuse (a video pipeline, the fallback image
/// allocator) hold a guard for their own lifetime. The first guard created
/// turns both cache lanes on; dropping the last one turns them off again and
/// drains every cached buffer back to the raw backend. Guards from the same
/// allocator stack freely, so independent consumers need not coordinate.
pub struct EnableGuard {
    inner: Arc<AllocatorInner>,
}

impl EnableGuard {
    pub(crate) fn new(inner: Arc<AllocatorInner>) -> Self {
        Self { inner }
    }
}

impl Drop for EnableGuard {
    fn drop(&mut self) {
        self.inner.release_enable();
    }
}

impl fmt::Debug for EnableGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnableGuard").finish_non_exhaustive()
    }
}
