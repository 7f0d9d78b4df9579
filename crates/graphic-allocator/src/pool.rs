// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reuse caches for released graphic buffers.
//!
//! Hardware buffer allocation goes through the kernel and costs hundreds of
//! microseconds; a video pipeline that allocates and frees a frame buffer
//! per frame would spend most of its time there. The pool keeps released
//! buffers on a bounded free list instead, one lane per mapping class, and
//! serves later allocations from it when a buffer fits well enough.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer::GraphicBuffer;
use crate::config::CacheConfig;
use crate::error::AllocError;
use crate::raw::RawAllocator;
use crate::stats::CacheLaneStats;

struct LaneState {
    enabled: bool,
    usage_max: usize,
    count_max: usize,
    /// Sum of the sizes of `entries`.
    usage: usize,
    /// Free list in release order; eviction takes from the front.
    entries: VecDeque<GraphicBuffer>,
}

/// One cache lane: all buffers in a lane share the same mapping class.
struct PoolLane {
    cacheable: bool,
    raw: Arc<dyn RawAllocator>,
    state: Mutex<LaneState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PoolLane {
    fn new(cacheable: bool, raw: Arc<dyn RawAllocator>, config: CacheConfig) -> Self {
        Self {
            cacheable,
            raw,
            state: Mutex::new(LaneState {
                enabled: false,
                usage_max: config.usage_max,
                count_max: config.alloc_count_max,
                usage: 0,
                entries: VecDeque::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn name(&self) -> &'static str {
        if self.cacheable {
            "cacheable lane"
        } else {
            "non-cacheable lane"
        }
    }

    /// Serves `size` from the free list when a good-enough buffer is cached,
    /// otherwise allocates fresh from the raw backend.
    ///
    /// A cached candidate qualifies when it is at least `size` bytes and its
    /// headroom (candidate size minus `size`) is at most `size`; reusing a
    /// buffer more than twice the request would waste too much memory. Among
    /// qualifying candidates the smallest headroom wins, ties going to the
    /// oldest. The raw backend is only consulted after the lane lock is
    /// dropped.
    fn allocate(&self, size: usize) -> Result<GraphicBuffer, AllocError> {
        {
            let mut state = self.state.lock().expect("pool lane lock poisoned");
            if state.enabled && !state.entries.is_empty() {
                let mut best: Option<(usize, usize)> = None;
                for (idx, buf) in state.entries.iter().enumerate() {
                    if buf.size() < size {
                        continue;
                    }
                    let headroom = buf.size() - size;
                    if headroom > size {
                        continue;
                    }
                    if best.map_or(true, |(_, h)| headroom < h) {
                        best = Some((idx, headroom));
                        if headroom == 0 {
                            break;
                        }
                    }
                }
                if let Some((idx, _)) = best {
                    let buf = state
                        .entries
                        .remove(idx)
                        .expect("best-fit index out of bounds");
                    state.usage -= buf.size();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        "{}: reusing {} cached bytes for {} byte request",
                        self.name(),
                        buf.size(),
                        size
                    );
                    return Ok(buf);
                }
            }
        }

        // Lane lock released: the raw backend may block.
        match self.raw.raw_allocate(size, self.cacheable) {
            Ok(raw) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("{}: fresh {} byte buffer from backend", self.name(), size);
                Ok(GraphicBuffer::new(raw, self.cacheable))
            }
            Err(source) => {
                tracing::warn!(
                    "{}: backend failed to allocate {} bytes: {}",
                    self.name(),
                    size,
                    source
                );
                Err(AllocError::Exhausted {
                    requested: size,
                    source,
                })
            }
        }
    }

    /// Takes ownership of a freed buffer: caches it when the lane accepts
    /// it, otherwise releases it to the raw backend.
    ///
    /// The cache refuses a buffer while disabled, when the entry ceiling is
    /// zero, or when the buffer alone exceeds the byte ceiling. Accepting a
    /// buffer evicts oldest entries until both ceilings hold again.
    fn free(&self, buf: GraphicBuffer) {
        debug_assert_eq!(buf.cacheable(), self.cacheable, "buffer routed to wrong lane");
        let size = buf.size();

        let mut state = self.state.lock().expect("pool lane lock poisoned");
        if !state.enabled || state.count_max < 1 || size > state.usage_max {
            drop(state);
            tracing::debug!("{}: releasing {} bytes uncached", self.name(), size);
            self.release_raw(buf);
            return;
        }

        while state.entries.len() + 1 > state.count_max || state.usage + size > state.usage_max {
            let oldest = state
                .entries
                .pop_front()
                .expect("cache over ceiling while empty");
            state.usage -= oldest.size();
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "{}: evicting oldest {} byte buffer to admit {}",
                self.name(),
                oldest.size(),
                size
            );
            self.release_raw(oldest);
        }

        state.usage += size;
        state.entries.push_back(buf);
        tracing::debug!(
            "{}: cached {} bytes, holding {} buffers / {} bytes",
            self.name(),
            size,
            state.entries.len(),
            state.usage
        );
    }

    /// Turns caching on or off. Turning it off drains the free list.
    fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.lock().expect("pool lane lock poisoned");
        if !enabled && state.enabled {
            self.drain(&mut state);
        }
        state.enabled = enabled;
    }

    /// Replaces the ceilings. Always drains first so every cached buffer was
    /// accepted under the ceilings in force.
    fn set_config(&self, config: CacheConfig) {
        let mut state = self.state.lock().expect("pool lane lock poisoned");
        self.drain(&mut state);
        state.usage_max = config.usage_max;
        state.count_max = config.alloc_count_max;
    }

    fn drain(&self, state: &mut LaneState) {
        while let Some(buf) = state.entries.pop_front() {
            state.usage -= buf.size();
            tracing::debug!("{}: draining {} cached bytes", self.name(), buf.size());
            self.release_raw(buf);
        }
        assert_eq!(state.usage, 0, "cache usage out of sync with entries");
    }

    /// Returns memory to the raw backend.
    ///
    /// # Panics
    ///
    /// A raw release failure means the backend lost track of a buffer it
    /// vended; continuing would leak device memory silently, so this is
    /// fatal.
    fn release_raw(&self, buf: GraphicBuffer) {
        let addr = buf.addr();
        let size = buf.size();
        if let Err(e) = self.raw.raw_release(buf.into_raw()) {
            panic!("raw release of buffer {addr:#x} ({size} bytes) failed: {e}");
        }
    }

    fn usage(&self) -> usize {
        self.state.lock().expect("pool lane lock poisoned").usage
    }

    fn count(&self) -> usize {
        self.state
            .lock()
            .expect("pool lane lock poisoned")
            .entries
            .len()
    }

    fn stats(&self) -> CacheLaneStats {
        let (usage, count) = {
            let state = self.state.lock().expect("pool lane lock poisoned");
            (state.usage, state.entries.len())
        };
        CacheLaneStats {
            usage,
            count,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PoolLane {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.usage = 0;
            for buf in std::mem::take(&mut state.entries) {
                if let Err(e) = self.raw.raw_release(buf.into_raw()) {
                    tracing::error!("failed to release cached buffer at teardown: {e}");
                }
            }
        }
    }
}

/// The pair of cache lanes, one per mapping class.
pub(crate) struct BufferPool {
    cached: PoolLane,
    uncached: PoolLane,
}

impl BufferPool {
    pub(crate) fn new(raw: Arc<dyn RawAllocator>) -> Self {
        let config = CacheConfig::default();
        Self {
            cached: PoolLane::new(true, Arc::clone(&raw), config),
            uncached: PoolLane::new(false, raw, config),
        }
    }

    fn lane(&self, cacheable: bool) -> &PoolLane {
        if cacheable {
            &self.cached
        } else {
            &self.uncached
        }
    }

    pub(crate) fn allocate(&self, size: usize, cacheable: bool) -> Result<GraphicBuffer, AllocError> {
        self.lane(cacheable).allocate(size)
    }

    /// Routes a freed buffer back to the lane it came from.
    pub(crate) fn release(&self, buf: GraphicBuffer) {
        self.lane(buf.cacheable()).free(buf)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.cached.set_enabled(enabled);
        self.uncached.set_enabled(enabled);
    }

    pub(crate) fn set_config(&self, config: CacheConfig) {
        self.cached.set_config(config);
        self.uncached.set_config(config);
    }

    pub(crate) fn cache_usage(&self, cacheable: bool) -> usize {
        self.lane(cacheable).usage()
    }

    pub(crate) fn cache_count(&self, cacheable: bool) -> usize {
        self.lane(cacheable).count()
    }

    pub(crate) fn lane_stats(&self, cacheable: bool) -> CacheLaneStats {
        self.lane(cacheable).stats()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{HeapRawAllocator, PAGE_SIZE};

    fn pages(n: usize) -> usize {
        n * PAGE_SIZE
    }

    fn pool_with_raw() -> (BufferPool, Arc<HeapRawAllocator>) {
        let raw = Arc::new(HeapRawAllocator::new());
        let pool = BufferPool::new(Arc::clone(&raw) as Arc<dyn RawAllocator>);
        (pool, raw)
    }

    #[test]
    fn test_disabled_pool_releases_immediately() {
        let (pool, raw) = pool_with_raw();
        let buf = pool.allocate(pages(1), true).unwrap();
        pool.release(buf);
        assert_eq!(raw.outstanding(), 0);
        assert_eq!(pool.cache_count(true), 0);
    }

    #[test]
    fn test_miss_then_hit_reuses_buffer() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let buf = pool.allocate(pages(1), true).unwrap();
        let addr = buf.addr();
        pool.release(buf);
        assert_eq!(raw.outstanding(), 1, "released buffer must stay cached");
        assert_eq!(pool.cache_count(true), 1);

        let again = pool.allocate(pages(1), true).unwrap();
        assert_eq!(again.addr(), addr, "exact-size request must reuse");
        assert_eq!(pool.cache_count(true), 0);
        assert_eq!(pool.lane_stats(true).hits, 1);
        assert_eq!(pool.lane_stats(true).misses, 1);
        pool.release(again);
    }

    #[test]
    fn test_lanes_do_not_share_buffers() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let buf = pool.allocate(pages(1), true).unwrap();
        pool.release(buf);
        // The non-cacheable lane must not serve the cacheable lane's buffer.
        let other = pool.allocate(pages(1), false).unwrap();
        assert_eq!(raw.outstanding(), 2);
        assert_eq!(pool.cache_count(true), 1);
        pool.release(other);
    }

    #[test]
    fn test_best_fit_prefers_smallest_headroom() {
        let (pool, _raw) = pool_with_raw();
        pool.set_enabled(true);

        let big = pool.allocate(pages(3), true).unwrap();
        let small = pool.allocate(pages(2), true).unwrap();
        let small_addr = small.addr();
        pool.release(big);
        pool.release(small);

        let got = pool.allocate(pages(2), true).unwrap();
        assert_eq!(got.addr(), small_addr, "exact fit beats larger candidate");
        assert_eq!(pool.cache_count(true), 1);
        pool.release(got);
    }

    #[test]
    fn test_reuse_refused_above_double_request() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let buf = pool.allocate(pages(16), true).unwrap();
        pool.release(buf);

        // 16 pages cached; 4-page request would waste three quarters of it.
        let fresh = pool.allocate(pages(4), true).unwrap();
        assert_eq!(fresh.size(), pages(4));
        assert_eq!(pool.cache_count(true), 1, "oversized candidate stays cached");
        assert_eq!(raw.outstanding(), 2);
        pool.release(fresh);
    }

    #[test]
    fn test_reuse_allowed_at_exactly_double_request() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let buf = pool.allocate(pages(16), true).unwrap();
        pool.release(buf);

        let got = pool.allocate(pages(8), true).unwrap();
        assert_eq!(got.size(), pages(16), "headroom equal to request is accepted");
        assert_eq!(raw.outstanding(), 1);
        pool.release(got);
    }

    #[test]
    fn test_oversize_release_bypasses_cache() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);
        pool.set_config(CacheConfig::new(pages(16), 4));

        let buf = pool.allocate(pages(17), true).unwrap();
        pool.release(buf);
        assert_eq!(pool.cache_count(true), 0);
        assert_eq!(raw.outstanding(), 0);
    }

    #[test]
    fn test_exact_ceiling_size_is_cached() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);
        pool.set_config(CacheConfig::new(pages(16), 4));

        let buf = pool.allocate(pages(16), true).unwrap();
        pool.release(buf);
        assert_eq!(pool.cache_count(true), 1);
        assert_eq!(raw.outstanding(), 1);
    }

    #[test]
    fn test_zero_count_ceiling_disables_caching() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);
        pool.set_config(CacheConfig::new(pages(16), 0));

        let buf = pool.allocate(pages(1), true).unwrap();
        pool.release(buf);
        assert_eq!(pool.cache_count(true), 0);
        assert_eq!(raw.outstanding(), 0);
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);
        pool.set_config(CacheConfig::new(pages(16), 4));

        let b6 = pool.allocate(pages(6), true).unwrap();
        let b3 = pool.allocate(pages(3), true).unwrap();
        let b4 = pool.allocate(pages(4), true).unwrap();
        let b2 = pool.allocate(pages(2), true).unwrap();
        let b8 = pool.allocate(pages(8), true).unwrap();
        let b4_addr = b4.addr();

        pool.release(b6);
        pool.release(b3);
        pool.release(b4);
        pool.release(b2);
        assert_eq!(pool.cache_usage(true), pages(15));
        assert_eq!(pool.cache_count(true), 4);

        // Caching the 8-page buffer overflows both ceilings; the two oldest
        // entries (6 and 3 pages) go, leaving {4, 2, 8}.
        pool.release(b8);
        assert_eq!(pool.cache_usage(true), pages(14));
        assert_eq!(pool.cache_count(true), 3);
        assert_eq!(pool.lane_stats(true).evictions, 2);
        assert_eq!(raw.outstanding(), 3);

        let got = pool.allocate(pages(4), true).unwrap();
        assert_eq!(got.addr(), b4_addr, "the 4-page buffer must have survived");
        pool.release(got);
    }

    #[test]
    fn test_disable_drains_cache() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let buf = pool.allocate(pages(2), true).unwrap();
        pool.release(buf);
        assert_eq!(raw.outstanding(), 1);

        pool.set_enabled(false);
        assert_eq!(pool.cache_count(true), 0);
        assert_eq!(raw.outstanding(), 0);
    }

    #[test]
    fn test_set_config_drains_cache() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let buf = pool.allocate(pages(2), true).unwrap();
        pool.release(buf);

        pool.set_config(CacheConfig::new(pages(32), 8));
        assert_eq!(pool.cache_count(true), 0);
        assert_eq!(raw.outstanding(), 0);

        // Caching still works under the new ceilings.
        let buf = pool.allocate(pages(2), true).unwrap();
        pool.release(buf);
        assert_eq!(pool.cache_count(true), 1);
    }

    #[test]
    fn test_drop_releases_cached_buffers() {
        let raw = Arc::new(HeapRawAllocator::new());
        {
            let pool = BufferPool::new(Arc::clone(&raw) as Arc<dyn RawAllocator>);
            pool.set_enabled(true);
            let buf = pool.allocate(pages(2), true).unwrap();
            pool.release(buf);
            assert_eq!(raw.outstanding(), 1);
        }
        assert_eq!(raw.outstanding(), 0, "drop must drain the free lists");
    }

    #[test]
    fn test_mixed_free_list_serves_closest_size() {
        let (pool, raw) = pool_with_raw();
        pool.set_enabled(true);

        let s1 = pool.allocate(pages(2), true).unwrap();
        let s2 = pool.allocate(pages(4), true).unwrap();
        let s3 = pool.allocate(pages(6), true).unwrap();
        let (a1, a2) = (s1.addr(), s2.addr());
        pool.release(s1);
        pool.release(s2);
        pool.release(s3);

        // {2, 4, 6} pages cached: a 2-page request takes the exact match.
        let got = pool.allocate(pages(2), true).unwrap();
        assert_eq!(got.addr(), a1);

        // {4, 6} left: the 4-page buffer qualifies, the 6-page one does not.
        let got2 = pool.allocate(pages(2), true).unwrap();
        assert_eq!(got2.addr(), a2);

        // {6} left: no candidate qualifies, so a fresh buffer is allocated.
        let got3 = pool.allocate(pages(2), true).unwrap();
        assert_eq!(got3.size(), pages(2));
        assert_eq!(pool.cache_count(true), 1);
        assert_eq!(raw.outstanding(), 4);
        for buf in [got, got2, got3] {
            pool.release(buf);
        }
    }

    #[test]
    fn test_first_of_equal_headroom_wins() {
        let (pool, _raw) = pool_with_raw();
        pool.set_enabled(true);

        let a = pool.allocate(pages(3), true).unwrap();
        let b = pool.allocate(pages(3), true).unwrap();
        let a_addr = a.addr();
        pool.release(a);
        pool.release(b);

        // Both candidates carry one page of headroom; the older entry wins.
        let got = pool.allocate(pages(2), true).unwrap();
        assert_eq!(got.addr(), a_addr, "ties resolve to the oldest entry");
        pool.release(got);
    }
}
