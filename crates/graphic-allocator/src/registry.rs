// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Registry of all live graphic buffers, keyed by virtual address range.
//!
//! The registry answers one question in `O(log n)`: does this address fall
//! inside a buffer we handed out? Consumers (image containers, the 2D
//! engine glue) use it to decide whether a pointer they were given is
//! hardware-reachable or ordinary heap memory.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::buffer::{BufferHandle, GraphicBuffer};

/// Half-open virtual address range `[base, base + len)`.
#[derive(Clone, Copy, Debug)]
struct AddrRange {
    base: usize,
    len: usize,
}

impl AddrRange {
    fn of(buf: &GraphicBuffer) -> Self {
        Self {
            base: buf.addr(),
            len: buf.size(),
        }
    }

    /// One-byte probe used to look up the range containing `addr`.
    fn probe(addr: usize) -> Self {
        Self { base: addr, len: 1 }
    }

    fn end(&self) -> usize {
        self.base + self.len
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

// Ranges that overlap compare as equal, so a one-byte probe anywhere inside
// a registered range finds that range. This is a total order only while the
// stored keys are pairwise disjoint; `register` enforces exactly that before
// every insert.
impl PartialEq for AddrRange {
    fn eq(&self, other: &Self) -> bool {
        self.overlaps(other)
    }
}

impl Eq for AddrRange {}

impl PartialOrd for AddrRange {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for AddrRange {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        if self.overlaps(other) {
            CmpOrdering::Equal
        } else {
            self.base.cmp(&other.base)
        }
    }
}

struct Registered {
    buf: GraphicBuffer,
    handle: BufferHandle,
}

/// Tracks every buffer currently owned by a consumer.
///
/// Owns the [`GraphicBuffer`] descriptors for as long as they are live; they
/// enter at registration and leave, by value, when the matching handle is
/// freed.
pub(crate) struct BufferRegistry {
    live: Mutex<BTreeMap<AddrRange, Registered>>,
    next_serial: AtomicU64,
}

impl BufferRegistry {
    pub(crate) fn new() -> Self {
        Self {
            live: Mutex::new(BTreeMap::new()),
            next_serial: AtomicU64::new(1),
        }
    }

    /// Registers a buffer as live and mints its handle.
    ///
    /// # Panics
    ///
    /// Panics if the buffer's address range overlaps any registered range,
    /// including an exact duplicate.
    pub(crate) fn register(&self, buf: GraphicBuffer) -> BufferHandle {
        let range = AddrRange::of(&buf);
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let handle = BufferHandle::new(&buf, serial);

        let mut live = self.live.lock().expect("registry lock poisoned");
        if let Some(entry) = live.get(&range) {
            panic!(
                "buffer {:#x}+{} overlaps live buffer {:#x}+{}",
                range.base,
                range.len,
                entry.buf.addr(),
                entry.buf.size()
            );
        }
        live.insert(range, Registered { buf, handle });
        debug_assert!(
            live.contains_key(&AddrRange::probe(range.base)),
            "registered range must be findable"
        );
        handle
    }

    /// Validates `handle` against the live set and removes its buffer.
    ///
    /// # Panics
    ///
    /// Panics if no live buffer contains the handle's address, or if one
    /// does but its identity differs (a stale or foreign handle).
    pub(crate) fn remove(&self, handle: &BufferHandle) -> GraphicBuffer {
        let mut live = self.live.lock().expect("registry lock poisoned");
        let probe = AddrRange::probe(handle.addr());
        let Some(entry) = live.get(&probe) else {
            panic!(
                "freed handle {:#x} does not refer to a live graphic buffer",
                handle.addr()
            );
        };
        if entry.handle != *handle {
            panic!(
                "freed handle {:#x} is stale: a different buffer now occupies the range",
                handle.addr()
            );
        }
        let entry = live
            .remove(&probe)
            .expect("entry disappeared while holding the registry lock");
        entry.buf
    }

    /// Looks up the live buffer containing `addr`, if any.
    ///
    /// Returns the buffer's handle and whether its mapping is cacheable.
    pub(crate) fn lookup(&self, addr: usize) -> Option<(BufferHandle, bool)> {
        let live = self.live.lock().expect("registry lock poisoned");
        live.get(&AddrRange::probe(addr))
            .map(|entry| (entry.handle, entry.buf.cacheable()))
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().expect("registry lock poisoned").len()
    }
}

impl Drop for BufferRegistry {
    fn drop(&mut self) {
        if let Ok(live) = self.live.get_mut() {
            if !live.is_empty() {
                tracing::warn!(
                    "registry dropped with {} live graphic buffers; their memory leaks",
                    live.len()
                );
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
