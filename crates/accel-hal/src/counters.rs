// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-primitive submission counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// 2D engine primitives whose submissions are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Primitive {
    Flip,
    Resize,
    Rotate,
}

impl Primitive {
    pub const ALL: [Primitive; 3] = [Primitive::Flip, Primitive::Resize, Primitive::Rotate];

    fn index(self) -> usize {
        match self {
            Primitive::Flip => 0,
            Primitive::Resize => 1,
            Primitive::Rotate => 2,
        }
    }
}

/// Counts how often each primitive was submitted to the engine.
///
/// Shared across pipeline threads; increments are lock-free.
#[derive(Debug, Default)]
pub struct PrimitiveCounters {
    counts: [AtomicU64; 3],
}

impl PrimitiveCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, primitive: Primitive) {
        self.counts[primitive.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, primitive: Primitive) -> u64 {
        self.counts[primitive.index()].load(Ordering::Relaxed)
    }

    /// Snapshot of all counters in [`Primitive::ALL`] order.
    pub fn snapshot(&self) -> [(Primitive, u64); 3] {
        Primitive::ALL.map(|p| (p, self.get(p)))
    }

    pub fn total(&self) -> u64 {
        Primitive::ALL.iter().map(|&p| self.get(p)).sum()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
