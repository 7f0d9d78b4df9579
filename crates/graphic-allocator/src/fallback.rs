// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Infallible allocation front end for image containers.
//!
//! Image code wants `allocate` to always hand back usable memory: small
//! buffers are not worth hardware placement, and a full device heap should
//! degrade throughput, not abort the pipeline. [`FallbackAllocator`] routes
//! requests at or above a size floor to the graphic allocator and silently
//! falls back to ordinary heap memory below the floor or when the device is
//! out of buffers.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::allocator::GraphicAllocator;
use crate::buffer::{Allocation, BufferHandle};
use crate::error::AllocError;
use crate::guard::EnableGuard;
use crate::raw::PAGE_SIZE;

/// Default size floor: buffers under eight pages stay on the heap.
pub const DEFAULT_FALLBACK_SIZE_MIN: usize = 8 * PAGE_SIZE;

/// Routing policy for the fallback allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FallbackConfig {
    /// Requests below this many bytes always use the heap.
    pub size_min: usize,
    /// Mapping class requested for graphic placements.
    pub cacheable: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            size_min: DEFAULT_FALLBACK_SIZE_MIN,
            cacheable: true,
        }
    }
}

struct FallbackShared {
    outstanding: AtomicUsize,
}

/// Allocation front end that never fails.
///
/// Holds an [`EnableGuard`] for its whole lifetime, so buffer caching stays
/// on while any image code might allocate.
pub struct FallbackAllocator {
    alloc: GraphicAllocator,
    config: Mutex<FallbackConfig>,
    shared: Arc<FallbackShared>,
    _enable: EnableGuard,
}

impl FallbackAllocator {
    pub fn new(alloc: GraphicAllocator) -> Self {
        Self::with_config(alloc, FallbackConfig::default())
    }

    pub fn with_config(alloc: GraphicAllocator, config: FallbackConfig) -> Self {
        let enable = alloc.enable();
        Self {
            alloc,
            config: Mutex::new(config),
            shared: Arc::new(FallbackShared {
                outstanding: AtomicUsize::new(0),
            }),
            _enable: enable,
        }
    }

    /// Allocates `size` bytes, preferring a graphic buffer when the request
    /// clears the size floor.
    ///
    /// Never fails: a refused or failed graphic placement falls back to
    /// zeroed heap memory. `allocate(0)` yields an empty heap buffer.
    pub fn allocate(&self, size: usize) -> PooledBuffer {
        let config = *self.config.lock().expect("fallback config lock poisoned");

        let backing = if size >= config.size_min {
            match self.alloc.allocate(size, config.cacheable) {
                Ok(allocation) => Backing::Graphic {
                    alloc: self.alloc.clone(),
                    allocation,
                },
                Err(e) => {
                    tracing::warn!("graphic placement of {size} bytes failed, using heap: {e}");
                    Backing::Heap(vec![0u8; size])
                }
            }
        } else {
            Backing::Heap(vec![0u8; size])
        };

        self.shared.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledBuffer {
            backing,
            len: size,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Replaces the routing policy.
    ///
    /// Refused while any [`PooledBuffer`] is outstanding; retargeting
    /// buffers that are already placed would make their routing history
    /// unaccountable.
    pub fn set_config(&self, config: FallbackConfig) -> Result<(), AllocError> {
        let mut current = self.config.lock().expect("fallback config lock poisoned");
        let outstanding = self.outstanding();
        if outstanding > 0 {
            return Err(AllocError::ActiveBuffers { outstanding });
        }
        *current = config;
        Ok(())
    }

    pub fn config(&self) -> FallbackConfig {
        *self.config.lock().expect("fallback config lock poisoned")
    }

    /// Buffers handed out and not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Relaxed)
    }

    /// The graphic allocator behind this front end.
    pub fn graphic(&self) -> &GraphicAllocator {
        &self.alloc
    }
}

impl fmt::Debug for FallbackAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackAllocator")
            .field("config", &self.config())
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

enum Backing {
    Graphic {
        alloc: GraphicAllocator,
        allocation: Allocation,
    },
    Heap(Vec<u8>),
}

/// RAII buffer from a [`FallbackAllocator`].
///
/// Dropping it frees the graphic buffer (which usually means caching it for
/// reuse) or the heap memory, whichever backs it.
pub struct PooledBuffer {
    backing: Backing,
    len: usize,
    shared: Arc<FallbackShared>,
}

impl PooledBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when backed by a hardware-reachable graphic buffer.
    pub fn is_graphic(&self) -> bool {
        matches!(self.backing, Backing::Graphic { .. })
    }

    /// Handle of the backing graphic buffer, if any. Consumers use it for
    /// cache maintenance against the raw backend.
    pub fn handle(&self) -> Option<BufferHandle> {
        match &self.backing {
            Backing::Graphic { allocation, .. } => Some(allocation.handle()),
            Backing::Heap(_) => None,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            // SAFETY: the graphic buffer is at least `len` bytes and stays
            // mapped until this PooledBuffer drops.
            Backing::Graphic { allocation, .. } => unsafe {
                std::slice::from_raw_parts(allocation.vaddr().as_ptr(), self.len)
            },
            Backing::Heap(v) => v.as_slice(),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.backing {
            // SAFETY: as above, and &mut self guarantees exclusive access.
            Backing::Graphic { allocation, .. } => unsafe {
                std::slice::from_raw_parts_mut(allocation.vaddr().as_ptr(), self.len)
            },
            Backing::Heap(v) => v.as_mut_slice(),
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Backing::Graphic { alloc, allocation } = &self.backing {
            alloc.free(allocation.handle());
        }
        self.shared.outstanding.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len)
            .field("graphic", &self.is_graphic())
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
