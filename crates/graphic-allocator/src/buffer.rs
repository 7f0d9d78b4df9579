// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Buffer descriptors and the consumer-facing handle.

use std::fmt;
use std::ptr::NonNull;

use crate::raw::{RawBuffer, RawHandle};

/// Owning descriptor for one graphic buffer inside the allocator.
///
/// Exactly one `GraphicBuffer` exists per piece of backing memory, and it is
/// always owned by exactly one component: the registry while the buffer is
/// live, a pool lane while it is cached, or the stack frame that is about to
/// release it. State transitions are moves, so a buffer cannot be live and
/// cached at the same time.
pub(crate) struct GraphicBuffer {
    raw: RawBuffer,
    cacheable: bool,
}

impl GraphicBuffer {
    pub(crate) fn new(raw: RawBuffer, cacheable: bool) -> Self {
        Self { raw, cacheable }
    }

    pub(crate) fn addr(&self) -> usize {
        self.raw.addr()
    }

    pub(crate) fn vaddr(&self) -> NonNull<u8> {
        self.raw.vaddr()
    }

    pub(crate) fn paddr(&self) -> u64 {
        self.raw.paddr()
    }

    pub(crate) fn size(&self) -> usize {
        self.raw.size()
    }

    pub(crate) fn cacheable(&self) -> bool {
        self.cacheable
    }

    pub(crate) fn raw_handle(&self) -> RawHandle {
        self.raw.handle()
    }

    /// Surrenders the raw descriptor for release.
    pub(crate) fn into_raw(self) -> RawBuffer {
        self.raw
    }
}

impl fmt::Debug for GraphicBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("size", &self.size())
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

/// Copyable identity token for a live graphic buffer.
///
/// Handles are minted by the registry when a buffer goes live and become
/// stale the moment the buffer is freed. Each registration gets a fresh
/// serial number, so a stale handle never compares equal to the handle of a
/// later buffer, even when the backing memory was recycled at the same
/// address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    raw: RawHandle,
    addr: usize,
    paddr: u64,
    size: usize,
    serial: u64,
}

impl BufferHandle {
    pub(crate) fn new(buf: &GraphicBuffer, serial: u64) -> Self {
        Self {
            raw: buf.raw_handle(),
            addr: buf.addr(),
            paddr: buf.paddr(),
            size: buf.size(),
            serial,
        }
    }

    /// Identifier assigned by the raw allocator backend.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Base virtual address of the buffer.
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Bus address for device DMA.
    pub fn paddr(&self) -> u64 {
        self.paddr
    }

    /// Buffer length in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("raw", &self.raw)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("size", &self.size)
            .field("serial", &self.serial)
            .finish()
    }
}

/// A successful allocation: the usable mapping plus the handle to free it.
#[derive(Clone, Copy)]
pub struct Allocation {
    vaddr: NonNull<u8>,
    handle: BufferHandle,
}

// SAFETY: Allocation is a descriptor; the pointed-at memory stays valid
// until the handle is freed, and access synchronization is the consumer's
// responsibility, exactly as with the raw descriptor.
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}

impl Allocation {
    pub(crate) fn new(vaddr: NonNull<u8>, handle: BufferHandle) -> Self {
        Self { vaddr, handle }
    }

    /// CPU-visible pointer to the start of the buffer.
    pub fn vaddr(&self) -> NonNull<u8> {
        self.vaddr
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn addr(&self) -> usize {
        self.handle.addr()
    }

    pub fn size(&self) -> usize {
        self.handle.size()
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("size", &self.size())
            .finish()
    }
}
