// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `gbuf info` command: report the platform's 2D acceleration state.
//!
//! Works everywhere: on hosts without the soc sysfs node the report simply
//! shows an unsupported platform.

use accel_hal::{AccelContext, Capability, HardwareCaps};
use graphic_allocator::GraphicAllocator;

pub fn execute(json: bool) -> anyhow::Result<()> {
    let caps = HardwareCaps::detect();

    if json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║           gbuf · 2D Acceleration Platform            ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Platform ───────────────────────────────────────────────
    println!("  Platform");
    println!(
        "   SoC:          {}",
        caps.soc_id.as_deref().unwrap_or("unknown (no soc sysfs node)")
    );
    println!(
        "   2D engine:    {}",
        if caps.supported { "supported" } else { "not supported" }
    );
    println!(
        "   3-channel:    {}",
        if caps.has_capability(Capability::ThreeChannels) {
            "yes"
        } else {
            "no"
        }
    );
    println!();

    // ── Context ────────────────────────────────────────────────
    println!("  Context");
    let alloc = GraphicAllocator::heap_backed();
    match AccelContext::new(caps, &alloc) {
        Ok(_ctx) => {
            println!("   Status:       acceleration context opens cleanly");
        }
        Err(e) => {
            println!("   Status:       {e}");
            println!("   Note:         pipelines will run unaccelerated");
        }
    }
    println!();

    Ok(())
}
