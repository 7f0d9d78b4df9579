// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The allocator facade: registry, pool, and aggregate counters behind one
//! cloneable handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer::{Allocation, BufferHandle};
use crate::config::CacheConfig;
use crate::error::AllocError;
use crate::guard::EnableGuard;
use crate::pool::BufferPool;
use crate::raw::{HeapRawAllocator, RawAllocator};
use crate::registry::BufferRegistry;
use crate::stats::AllocatorStats;

pub(crate) struct AllocatorInner {
    registry: BufferRegistry,
    pool: BufferPool,
    /// Number of outstanding [`EnableGuard`]s. Held across the pool
    /// transition on the 0↔1 edges; the pool never locks back into the
    /// facade, so the ordering is one-way.
    enable_count: Mutex<usize>,
    usage: AtomicUsize,
    allocations: AtomicUsize,
    peak_usage: AtomicUsize,
    total_allocations: AtomicU64,
}

impl AllocatorInner {
    pub(crate) fn release_enable(&self) {
        let mut count = self.enable_count.lock().expect("enable count lock poisoned");
        assert!(*count > 0, "cache enable count underflow");
        *count -= 1;
        if *count == 0 {
            tracing::debug!("last enable guard dropped, draining caches");
            self.pool.set_enabled(false);
        }
    }
}

/// Allocator for hardware-reachable graphic buffers.
///
/// Tracks every buffer it vends in a registry keyed by address range and
/// recycles freed buffers through two bounded cache lanes, one per mapping
/// class. The handle is cheaply cloneable; clones share one allocator.
///
/// Allocation and free each run as three separate critical sections:
/// allocation touches the pool lane, then the registry, then the counters;
/// free touches the registry, then the counters, then the pool lane. No lock
/// is held across another component's lock, which rules out lock-ordering
/// deadlocks between the lanes and the registry.
#[derive(Clone)]
pub struct GraphicAllocator {
    inner: Arc<AllocatorInner>,
}

impl GraphicAllocator {
    /// Creates an allocator on top of `raw`. Caching starts disabled.
    pub fn new(raw: Arc<dyn RawAllocator>) -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                registry: BufferRegistry::new(),
                pool: BufferPool::new(raw),
                enable_count: Mutex::new(0),
                usage: AtomicUsize::new(0),
                allocations: AtomicUsize::new(0),
                peak_usage: AtomicUsize::new(0),
                total_allocations: AtomicU64::new(0),
            }),
        }
    }

    /// Convenience constructor over [`HeapRawAllocator`], for hosts without
    /// device memory and for tests.
    pub fn heap_backed() -> Self {
        Self::new(Arc::new(HeapRawAllocator::new()))
    }

    /// Takes a lease on buffer caching.
    ///
    /// The first outstanding lease enables both cache lanes; when the last
    /// one is dropped the lanes are disabled and drained.
    pub fn enable(&self) -> EnableGuard {
        let mut count = self.inner.enable_count.lock().expect("enable count lock poisoned");
        *count += 1;
        if *count == 1 {
            tracing::debug!("first enable guard taken, caching on");
            self.inner.pool.set_enabled(true);
        }
        drop(count);
        EnableGuard::new(Arc::clone(&self.inner))
    }

    /// Allocates a buffer of exactly `size` bytes in the given mapping
    /// class.
    ///
    /// Served from the matching cache lane when a fitting buffer is held
    /// there, otherwise from the raw backend. On error the allocator state
    /// is unchanged.
    pub fn allocate(&self, size: usize, cacheable: bool) -> Result<Allocation, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSized);
        }

        let buf = self.inner.pool.allocate(size, cacheable)?;
        let vaddr = buf.vaddr();
        let bytes = buf.size();
        let handle = self.inner.registry.register(buf);

        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
        let usage = self.inner.usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.inner.peak_usage.fetch_max(usage, Ordering::Relaxed);
        self.inner.total_allocations.fetch_add(1, Ordering::Relaxed);

        Ok(Allocation::new(vaddr, handle))
    }

    /// Returns a buffer to the allocator.
    ///
    /// The buffer leaves the live set immediately; its memory is either
    /// cached in its lane or released to the raw backend.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not name a live buffer of this allocator:
    /// already freed, from another allocator, or stale after the address
    /// was recycled.
    pub fn free(&self, handle: BufferHandle) {
        let buf = self.inner.registry.remove(&handle);

        self.inner.allocations.fetch_sub(1, Ordering::Relaxed);
        self.inner.usage.fetch_sub(buf.size(), Ordering::Relaxed);

        self.inner.pool.release(buf);
    }

    /// Tests whether `addr` points into a live graphic buffer.
    ///
    /// Returns the buffer's handle and whether its mapping is cacheable.
    /// `O(log n)` in the number of live buffers.
    pub fn is_graphic_buffer(&self, addr: usize) -> Option<(BufferHandle, bool)> {
        self.inner.registry.lookup(addr)
    }

    /// Bytes in live buffers.
    pub fn usage(&self) -> usize {
        self.inner.usage.load(Ordering::Relaxed)
    }

    /// Number of live buffers.
    pub fn allocations(&self) -> usize {
        self.inner.allocations.load(Ordering::Relaxed)
    }

    /// Bytes cached in one lane's free list.
    pub fn cache_usage(&self, cacheable: bool) -> usize {
        self.inner.pool.cache_usage(cacheable)
    }

    /// Buffers cached in one lane's free list.
    pub fn cache_allocations(&self, cacheable: bool) -> usize {
        self.inner.pool.cache_count(cacheable)
    }

    /// Applies new cache ceilings to both lanes.
    ///
    /// Both lanes are drained first, so the new ceilings never inherit
    /// buffers accepted under the old ones.
    pub fn set_cache_config(&self, config: CacheConfig) {
        tracing::debug!("applying cache config: {config}");
        self.inner.pool.set_config(config);
    }

    /// Takes a consistent-enough snapshot for reporting. Counters are read
    /// individually; a snapshot taken against concurrent traffic may be
    /// skewed by in-flight operations.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            usage: self.usage(),
            allocations: self.allocations(),
            peak_usage: self.inner.peak_usage.load(Ordering::Relaxed),
            total_allocations: self.inner.total_allocations.load(Ordering::Relaxed),
            cacheable: self.inner.pool.lane_stats(true),
            non_cacheable: self.inner.pool.lane_stats(false),
        }
    }

    /// Number of live buffers according to the registry. Used by tests to
    /// cross-check the counter against the source of truth.
    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.inner.registry.len()
    }
}

impl fmt::Debug for GraphicAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicAllocator")
            .field("usage", &self.usage())
            .field("allocations", &self.allocations())
            .finish_non_exhaustive()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
