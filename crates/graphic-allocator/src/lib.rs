// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graphic-allocator
//!
//! An allocator for hardware-reachable graphic buffers on embedded SoCs
//! with 2D acceleration engines, built around bounded reuse caches so video
//! pipelines stop paying the kernel allocation cost on every frame.
//!
//! # Key Components
//!
//! - [`GraphicAllocator`] — the facade: allocates and frees buffers, keeps a
//!   registry of everything live, and recycles freed buffers through two
//!   cache lanes (cacheable and non-cacheable CPU mappings).
//! - [`EnableGuard`] — an RAII lease on caching. The first guard turns the
//!   caches on; dropping the last one drains them.
//! - [`Allocation`] / [`BufferHandle`] — what consumers hold: the usable
//!   mapping plus the copyable token that frees it. Handles carry a serial
//!   number, so stale handles are detected even when memory is recycled.
//! - [`RawAllocator`] — the backend seam. Real deployments wrap the
//!   vendor's contiguous-memory API; [`HeapRawAllocator`] stands in on
//!   development hosts.
//! - [`FallbackAllocator`] — an infallible front end for image containers
//!   that degrades to heap memory when a graphic placement is refused.
//! - [`AllocatorStats`] — live and cached usage, peaks, hit ratios.
//!
//! # Ownership Model
//!
//! ```text
//! RawAllocator::raw_allocate          PoolLane free list
//!         │ (cache miss)                    │ (cache hit)
//!         └──────────► GraphicBuffer ◄──────┘
//!                           │ register
//!                           ▼
//!                    BufferRegistry ──── owns the buffer while live;
//!                           │            consumer holds BufferHandle
//!                           │ free(handle)
//!                           ▼
//!                   PoolLane::free ──► cached (accepted) or
//!                                      RawAllocator::raw_release (refused)
//! ```
//!
//! Each buffer descriptor is owned by exactly one component at every moment;
//! state transitions are moves, so a buffer cannot be simultaneously live
//! and cached, and a released descriptor cannot come back.
//!
//! # Example
//! ```
//! use graphic_allocator::GraphicAllocator;
//!
//! let alloc = GraphicAllocator::heap_backed();
//! let cache = alloc.enable();
//!
//! // One 1080p RGBA frame.
//! let frame = alloc.allocate(1920 * 1080 * 4, true).unwrap();
//! assert_eq!(alloc.usage(), 1920 * 1080 * 4);
//! assert!(alloc.is_graphic_buffer(frame.addr() + 100).is_some());
//!
//! // Freeing keeps the buffer cached for the next frame...
//! alloc.free(frame.handle());
//! assert_eq!(alloc.usage(), 0);
//! assert_eq!(alloc.cache_allocations(true), 1);
//!
//! // ...until the last enable guard goes away.
//! drop(cache);
//! assert_eq!(alloc.cache_allocations(true), 0);
//! ```

mod allocator;
mod buffer;
mod config;
mod error;
mod fallback;
mod guard;
mod pool;
pub mod raw;
mod registry;
mod stats;

pub use allocator::GraphicAllocator;
pub use buffer::{Allocation, BufferHandle};
pub use config::{
    format_size, parse_size, CacheConfig, DEFAULT_CACHE_ALLOC_COUNT_MAX, DEFAULT_CACHE_USAGE_MAX,
};
pub use error::AllocError;
pub use fallback::{FallbackAllocator, FallbackConfig, PooledBuffer, DEFAULT_FALLBACK_SIZE_MIN};
pub use guard::EnableGuard;
pub use raw::{HeapRawAllocator, RawAllocator, RawBuffer, RawError, RawHandle, PAGE_SIZE};
pub use stats::{AllocatorStats, CacheLaneStats};
