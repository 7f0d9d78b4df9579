// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Point-in-time statistics snapshots.

use serde::Serialize;

use crate::config::format_size;

/// Snapshot of one cache lane.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheLaneStats {
    /// Bytes currently held in the lane's free list.
    pub usage: usize,
    /// Buffers currently held in the lane's free list.
    pub count: usize,
    /// Allocations served from the free list.
    pub hits: u64,
    /// Allocations that went to the raw backend.
    pub misses: u64,
    /// Cached buffers released to make room for newer ones.
    pub evictions: u64,
}

/// Aggregate allocator snapshot: live-buffer counters plus both lanes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AllocatorStats {
    /// Bytes in buffers currently owned by consumers.
    pub usage: usize,
    /// Buffers currently owned by consumers.
    pub allocations: usize,
    /// High-water mark of `usage`.
    pub peak_usage: usize,
    /// Successful allocations since construction.
    pub total_allocations: u64,
    pub cacheable: CacheLaneStats,
    pub non_cacheable: CacheLaneStats,
}

impl AllocatorStats {
    /// Fraction of allocations served from the caches, in `[0, 1]`.
    ///
    /// Returns 0.0 before the first allocation.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.cacheable.hits + self.non_cacheable.hits;
        let misses = self.cacheable.misses + self.non_cacheable.misses;
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "live: {} in {} buffers (peak {}), cached: {} + {}, hit ratio: {:.1}%",
            format_size(self.usage),
            self.allocations,
            format_size(self.peak_usage),
            format_size(self.cacheable.usage),
            format_size(self.non_cacheable.usage),
            self.hit_ratio() * 100.0
        )
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
