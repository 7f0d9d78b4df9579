// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! End-to-end tests driving the public allocator API the way a video
//! pipeline would.

use std::sync::Arc;

use graphic_allocator::{
    AllocError, BufferHandle, CacheConfig, FallbackAllocator, FallbackConfig, GraphicAllocator,
    HeapRawAllocator, RawAllocator, RawBuffer, RawError, PAGE_SIZE,
};

fn pages(n: usize) -> usize {
    n * PAGE_SIZE
}

fn heap_allocator() -> (GraphicAllocator, Arc<HeapRawAllocator>) {
    let raw = Arc::new(HeapRawAllocator::new());
    let alloc = GraphicAllocator::new(Arc::clone(&raw) as Arc<dyn RawAllocator>);
    (alloc, raw)
}

// ── Frame pipeline lifecycle ────────────────────────────────────────────────

#[test]
fn test_frame_loop_reuses_buffers() {
    let (alloc, raw) = heap_allocator();
    let cache = alloc.enable();
    let frame_bytes = pages(8);

    // Steady-state loop: allocate a frame, process, free it.
    let mut first_addr = None;
    for _ in 0..32 {
        let frame = alloc.allocate(frame_bytes, true).expect("allocation failed");
        let addr = first_addr.get_or_insert(frame.addr());
        assert_eq!(frame.addr(), *addr, "steady state must recycle one buffer");
        alloc.free(frame.handle());
    }

    let stats = alloc.stats();
    assert_eq!(stats.total_allocations, 32);
    assert_eq!(stats.cacheable.misses, 1, "only the first frame hits the backend");
    assert_eq!(stats.cacheable.hits, 31);
    assert_eq!(raw.outstanding(), 1, "one buffer parked in the cache");

    drop(cache);
    assert_eq!(raw.outstanding(), 0, "dropping the lease drains the cache");
    assert_eq!(alloc.usage(), 0);
}

#[test]
fn test_without_lease_every_frame_is_fresh() {
    let (alloc, raw) = heap_allocator();

    for _ in 0..4 {
        let frame = alloc.allocate(pages(8), true).expect("allocation failed");
        alloc.free(frame.handle());
        assert_eq!(raw.outstanding(), 0);
    }
    assert_eq!(alloc.stats().cacheable.hits, 0);
    assert_eq!(alloc.stats().cacheable.misses, 4);
}

// ── Enable lease refcounting ────────────────────────────────────────────────

#[test]
fn test_overlapping_leases_keep_cache_alive() {
    let (alloc, raw) = heap_allocator();

    let pipeline_a = alloc.enable();
    let pipeline_b = alloc.enable();

    let frame = alloc.allocate(pages(4), true).expect("allocation failed");
    alloc.free(frame.handle());
    assert_eq!(alloc.cache_allocations(true), 1);

    drop(pipeline_a);
    assert_eq!(
        alloc.cache_allocations(true),
        1,
        "cache survives while any lease is held"
    );

    drop(pipeline_b);
    assert_eq!(alloc.cache_allocations(true), 0);
    assert_eq!(raw.outstanding(), 0);
}

#[test]
fn test_lease_cycle_restarts_caching() {
    let (alloc, _raw) = heap_allocator();

    let first = alloc.enable();
    let frame = alloc.allocate(pages(2), true).expect("allocation failed");
    alloc.free(frame.handle());
    drop(first);
    assert_eq!(alloc.cache_allocations(true), 0);

    let _second = alloc.enable();
    let frame = alloc.allocate(pages(2), true).expect("allocation failed");
    alloc.free(frame.handle());
    assert_eq!(alloc.cache_allocations(true), 1, "a fresh lease re-enables caching");
}

// ── Ceilings and eviction ───────────────────────────────────────────────────

#[test]
fn test_count_ceiling_evicts_oldest() {
    let (alloc, _raw) = heap_allocator();
    let _cache = alloc.enable();
    alloc.set_cache_config(CacheConfig::new(pages(16), 4));

    let frames: Vec<_> = (0..5)
        .map(|_| alloc.allocate(pages(1), true).expect("allocation failed"))
        .collect();
    for frame in &frames {
        alloc.free(frame.handle());
    }

    assert_eq!(alloc.allocations(), 0, "nothing outstanding after the cycle");
    assert_eq!(alloc.cache_allocations(true), 4, "count ceiling holds");
    assert_eq!(alloc.cache_usage(true), pages(4));
    assert_eq!(alloc.stats().cacheable.evictions, 1);
}

#[test]
fn test_byte_ceiling_bypasses_oversized_buffers() {
    let (alloc, raw) = heap_allocator();
    let _cache = alloc.enable();
    alloc.set_cache_config(CacheConfig::new(pages(16), 4));

    let oversized = alloc.allocate(pages(17), true).expect("allocation failed");
    alloc.free(oversized.handle());
    assert_eq!(alloc.cache_allocations(true), 0, "17 pages exceed the byte ceiling");
    assert_eq!(raw.outstanding(), 0);

    let exact = alloc.allocate(pages(16), true).expect("allocation failed");
    alloc.free(exact.handle());
    assert_eq!(alloc.cache_allocations(true), 1, "exactly the ceiling is accepted");
}

#[test]
fn test_reconfig_drains_both_lanes() {
    let (alloc, raw) = heap_allocator();
    let _cache = alloc.enable();

    for cacheable in [true, false] {
        let frame = alloc.allocate(pages(2), cacheable).expect("allocation failed");
        alloc.free(frame.handle());
    }
    assert_eq!(raw.outstanding(), 2);

    alloc.set_cache_config(CacheConfig::new(pages(32), 8));
    assert_eq!(alloc.cache_allocations(true), 0);
    assert_eq!(alloc.cache_allocations(false), 0);
    assert_eq!(raw.outstanding(), 0);
}

// ── Registry queries ────────────────────────────────────────────────────────

#[test]
fn test_pointer_classification() {
    let (alloc, _raw) = heap_allocator();

    let frame = alloc.allocate(pages(2), true).expect("allocation failed");

    // Interior pointers classify, one-past-the-end does not.
    let (handle, cacheable) = alloc
        .is_graphic_buffer(frame.addr() + pages(1))
        .expect("interior pointer must classify");
    assert_eq!(handle, frame.handle());
    assert!(cacheable);
    assert!(alloc.is_graphic_buffer(frame.addr() + pages(2)).is_none());

    let scratch = alloc.allocate(pages(1), false).expect("allocation failed");
    let (_, cacheable) = alloc
        .is_graphic_buffer(scratch.addr())
        .expect("base pointer must classify");
    assert!(!cacheable);

    alloc.free(frame.handle());
    assert!(
        alloc.is_graphic_buffer(frame.addr()).is_none(),
        "freed buffers must stop classifying"
    );
    alloc.free(scratch.handle());
}

#[test]
#[should_panic(expected = "does not refer to a live graphic buffer")]
fn test_freeing_foreign_handle_panics() {
    let (alloc_a, _raw_a) = heap_allocator();
    let (alloc_b, _raw_b) = heap_allocator();

    let frame = alloc_a.allocate(pages(1), true).expect("allocation failed");
    alloc_b.free(frame.handle());
}

// ── Error handling and fallback ─────────────────────────────────────────────

/// Backend standing in for a fully committed device heap.
struct ExhaustedBackend;

impl RawAllocator for ExhaustedBackend {
    fn raw_allocate(&self, size: usize, _cacheable: bool) -> Result<RawBuffer, RawError> {
        Err(RawError::OutOfMemory { requested: size })
    }

    fn raw_release(&self, _buf: RawBuffer) -> Result<(), RawError> {
        Ok(())
    }

    fn flush(&self, _buf: &BufferHandle) -> Result<(), RawError> {
        Ok(())
    }

    fn invalidate(&self, _buf: &BufferHandle) -> Result<(), RawError> {
        Ok(())
    }
}

#[test]
fn test_exhaustion_is_recoverable() {
    let alloc = GraphicAllocator::new(Arc::new(ExhaustedBackend));
    let _cache = alloc.enable();

    let err = alloc.allocate(pages(1), true).expect_err("backend is exhausted");
    assert!(matches!(err, AllocError::Exhausted { requested, .. } if requested == pages(1)));

    // No state change: counters untouched, later operations unaffected.
    assert_eq!(alloc.usage(), 0);
    assert_eq!(alloc.allocations(), 0);
    assert_eq!(alloc.stats().total_allocations, 0);
}

#[test]
fn test_fallback_degrades_to_heap_when_exhausted() {
    let fallback = FallbackAllocator::new(GraphicAllocator::new(Arc::new(ExhaustedBackend)));

    let mut buf = fallback.allocate(pages(64));
    assert!(!buf.is_graphic(), "exhausted backend must fall back to heap");
    assert_eq!(buf.len(), pages(64));
    buf.as_mut_slice()[..4].copy_from_slice(b"ok!!");
    assert_eq!(&buf.as_slice()[..4], b"ok!!");
}

#[test]
fn test_fallback_routing_by_size() {
    let (alloc, _raw) = heap_allocator();
    let fallback = FallbackAllocator::with_config(
        alloc,
        FallbackConfig {
            size_min: pages(4),
            cacheable: true,
        },
    );

    let small = fallback.allocate(pages(4) - 1);
    let large = fallback.allocate(pages(4));
    assert!(!small.is_graphic());
    assert!(large.is_graphic());
    assert_eq!(fallback.graphic().allocations(), 1);

    drop(large);
    drop(small);
    assert_eq!(fallback.outstanding(), 0);
    assert_eq!(fallback.graphic().cache_allocations(true), 1);
}

// ── Concurrency ─────────────────────────────────────────────────────────────

#[test]
fn test_parallel_pipelines_share_the_allocator() {
    let (alloc, raw) = heap_allocator();
    let cache = alloc.enable();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let alloc = alloc.clone();
            scope.spawn(move || {
                for i in 0..100 {
                    let size = pages(1 + (worker + i) % 3);
                    let cacheable = i % 2 == 0;
                    let frame = alloc.allocate(size, cacheable).expect("allocation failed");
                    // Touch the memory so reuse bugs would surface.
                    unsafe { frame.vaddr().as_ptr().write_volatile(worker as u8) };
                    alloc.free(frame.handle());
                }
            });
        }
    });

    assert_eq!(alloc.usage(), 0, "every buffer returned");
    assert_eq!(alloc.allocations(), 0);
    assert_eq!(alloc.stats().total_allocations, 400);

    let parked = alloc.cache_allocations(true) + alloc.cache_allocations(false);
    assert_eq!(raw.outstanding(), parked, "backend holds exactly the cached buffers");

    drop(cache);
    assert_eq!(raw.outstanding(), 0);
}
