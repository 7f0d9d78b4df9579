// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # accel-hal
//!
//! Platform glue for the 2D acceleration engine: detects what the running
//! SoC can do and ties the engine's lifetime to the graphic allocator's
//! caching lease.
//!
//! # Key Components
//!
//! - [`HardwareCaps`] — SoC capability probe via `/sys/devices/soc0/soc_id`.
//!   Unknown or unreadable platforms come back unsupported, never as errors.
//! - [`AccelContext`] — a live acceleration session. Creating one is the
//!   capability gate; it holds an allocator caching lease until dropped.
//! - [`PrimitiveCounters`] — lock-free counters of engine submissions, one
//!   per [`Primitive`].
//!
//! # Example
//! ```
//! use accel_hal::{AccelContext, HardwareCaps};
//! use graphic_allocator::GraphicAllocator;
//!
//! let alloc = GraphicAllocator::heap_backed();
//! match AccelContext::new(HardwareCaps::detect(), &alloc) {
//!     Ok(ctx) => println!("engine ready on {:?}", ctx.capabilities().soc_id),
//!     Err(e) => println!("running without acceleration: {e}"),
//! }
//! ```

mod caps;
mod context;
mod counters;
mod error;

pub use caps::{Capability, HardwareCaps};
pub use context::AccelContext;
pub use counters::{Primitive, PrimitiveCounters};
pub use error::HalError;
