// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The seam between the allocator core and the hardware buffer provider.
//!
//! Everything above this module is policy (caching, registration, counters);
//! everything below it is mechanism. A real deployment implements
//! [`RawAllocator`] on top of the vendor's contiguous-memory API; hosts and
//! tests use [`HeapRawAllocator`], which vends page-aligned process memory
//! with the same contract.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::buffer::BufferHandle;

/// Alignment (and granularity unit) of hardware graphic buffers.
pub const PAGE_SIZE: usize = 4096;

/// Opaque per-buffer identifier minted by a raw allocator.
///
/// The core never interprets the value; it only carries it back to
/// [`RawAllocator::raw_release`] and compares it for identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// One hardware-backed buffer, as vended by a [`RawAllocator`].
///
/// A `RawBuffer` is the owning descriptor: it is moved into the allocator
/// core at allocation time and moved back into
/// [`RawAllocator::raw_release`] when the memory is returned. It is
/// deliberately neither `Clone` nor `Copy`, so a released buffer cannot be
/// resurrected.
pub struct RawBuffer {
    handle: RawHandle,
    vaddr: NonNull<u8>,
    paddr: u64,
    size: usize,
}

// SAFETY: a RawBuffer is a plain descriptor (id, addresses, length). The
// memory it points at is owned by exactly one RawBuffer at a time, so moving
// the descriptor between threads is sound.
unsafe impl Send for RawBuffer {}
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    /// Builds a descriptor for freshly allocated memory.
    ///
    /// Called by `RawAllocator` implementations only; the core never
    /// constructs descriptors itself.
    pub fn new(handle: RawHandle, vaddr: NonNull<u8>, paddr: u64, size: usize) -> Self {
        Self {
            handle,
            vaddr,
            paddr,
            size,
        }
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Virtual address of the mapping, as a pointer.
    pub fn vaddr(&self) -> NonNull<u8> {
        self.vaddr
    }

    /// Virtual address of the mapping, as an integer key.
    pub fn addr(&self) -> usize {
        self.vaddr.as_ptr() as usize
    }

    /// Bus address for device DMA.
    pub fn paddr(&self) -> u64 {
        self.paddr
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Debug for RawBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuffer")
            .field("handle", &self.handle)
            .field("vaddr", &format_args!("{:#x}", self.addr()))
            .field("paddr", &format_args!("{:#x}", self.paddr))
            .field("size", &self.size)
            .finish()
    }
}

/// Errors surfaced by a raw allocator backend.
#[derive(Debug, thiserror::Error)]
pub enum RawError {
    /// The backend could not satisfy the request.
    #[error("out of buffer memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    /// The requested size is not allocatable (zero, or too large to
    /// describe a layout for).
    #[error("invalid buffer size: {size} bytes")]
    InvalidSize { size: usize },

    /// A device-level failure from a hardware backend.
    #[error("device error: {0}")]
    Device(String),
}

/// Provider of hardware-reachable buffers.
///
/// Implementations must be safe to call from multiple threads; the core
/// invokes [`raw_allocate`](Self::raw_allocate) outside of its own locks and
/// [`raw_release`](Self::raw_release) both inside and outside of them, so an
/// implementation must never call back into the allocator core.
pub trait RawAllocator: Send + Sync {
    /// Allocates a buffer of exactly `size` bytes.
    ///
    /// `cacheable` selects the CPU mapping attributes; backends without the
    /// distinction may ignore it.
    fn raw_allocate(&self, size: usize, cacheable: bool) -> Result<RawBuffer, RawError>;

    /// Returns a buffer to the backend. Consumes the descriptor.
    fn raw_release(&self, buf: RawBuffer) -> Result<(), RawError>;

    /// Writes back CPU cache lines covering the buffer.
    ///
    /// Takes the copyable handle rather than the owning descriptor because
    /// cache maintenance is issued by buffer consumers, which never hold
    /// ownership.
    fn flush(&self, buf: &BufferHandle) -> Result<(), RawError>;

    /// Discards CPU cache lines covering the buffer.
    fn invalidate(&self, buf: &BufferHandle) -> Result<(), RawError>;
}

/// Raw allocator backed by the process heap.
///
/// Stands in for device memory on development hosts: buffers are
/// page-aligned, zero-initialized, and tracked so tests can assert that
/// every allocation was released. The reported bus address mirrors the
/// virtual one, which is good enough for software consumers.
pub struct HeapRawAllocator {
    next_id: AtomicU64,
    outstanding: AtomicUsize,
}

impl HeapRawAllocator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Number of buffers allocated but not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    fn layout_for(size: usize) -> Result<Layout, RawError> {
        Layout::from_size_align(size, PAGE_SIZE).map_err(|_| RawError::InvalidSize { size })
    }
}

impl Default for HeapRawAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeapRawAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapRawAllocator")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl RawAllocator for HeapRawAllocator {
    fn raw_allocate(&self, size: usize, _cacheable: bool) -> Result<RawBuffer, RawError> {
        if size == 0 {
            return Err(RawError::InvalidSize { size });
        }
        let layout = Self::layout_for(size)?;
        // SAFETY: layout has non-zero size, checked above.
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(vaddr) = NonNull::new(ptr) else {
            return Err(RawError::OutOfMemory { requested: size });
        };
        let handle = RawHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        Ok(RawBuffer::new(handle, vaddr, vaddr.as_ptr() as u64, size))
    }

    fn raw_release(&self, buf: RawBuffer) -> Result<(), RawError> {
        let layout = Self::layout_for(buf.size())?;
        // SAFETY: the descriptor was produced by raw_allocate with the same
        // layout, and ownership rules guarantee it is released once.
        unsafe { dealloc(buf.vaddr().as_ptr(), layout) };
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self, _buf: &BufferHandle) -> Result<(), RawError> {
        // Host memory is coherent.
        Ok(())
    }

    fn invalidate(&self, _buf: &BufferHandle) -> Result<(), RawError> {
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
