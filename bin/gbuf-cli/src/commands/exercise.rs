// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `gbuf exercise` command: push a synthetic frame workload through the
//! allocator and report what the caches did with it.
//!
//! The workload imitates a video pipeline: every frame allocates one buffer
//! per configured size, touches it, and frees it. Some frames add
//! non-cacheable traffic and oversized scratch buffers so both lanes and
//! the eviction path see work.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use graphic_allocator::{format_size, parse_size, AllocatorStats, CacheConfig, GraphicAllocator};

/// TOML-loadable workload description. Missing keys take the defaults.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ExerciseConfig {
    frames: usize,
    sizes: Vec<String>,
    cache_bytes: String,
    cache_count: usize,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            frames: 256,
            sizes: vec!["8M".into(), "4M".into(), "1M".into()],
            cache_bytes: "64M".into(),
            cache_count: 16,
        }
    }
}

#[derive(serde::Serialize)]
struct ExerciseReport {
    frames: usize,
    sizes: Vec<usize>,
    cache_config: CacheConfig,
    failed_allocations: u64,
    elapsed_us: u128,
    stats: AllocatorStats,
}

pub fn execute(
    config: Option<PathBuf>,
    frames: usize,
    sizes: String,
    cache_bytes: String,
    cache_count: usize,
    json: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read workload file {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("invalid workload file {}", path.display()))?
        }
        None => ExerciseConfig {
            frames,
            sizes: sizes.split(',').map(str::to_string).collect(),
            cache_bytes,
            cache_count,
        },
    };

    let sizes = config
        .sizes
        .iter()
        .map(|s| parse_size(s).map_err(anyhow::Error::from))
        .collect::<anyhow::Result<Vec<usize>>>()
        .context("invalid buffer size in workload")?;
    let cache_config = CacheConfig::new(
        parse_size(&config.cache_bytes).context("invalid cache byte ceiling")?,
        config.cache_count,
    );

    let report = run_workload(config.frames, &sizes, cache_config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn run_workload(frames: usize, sizes: &[usize], cache_config: CacheConfig) -> ExerciseReport {
    let alloc = GraphicAllocator::heap_backed();
    alloc.set_cache_config(cache_config);
    let lease = alloc.enable();

    let mut failed: u64 = 0;
    let mut held = Vec::with_capacity(sizes.len() + 1);
    let started = Instant::now();

    for frame in 0..frames {
        for (i, &size) in sizes.iter().enumerate() {
            // One size per frame goes to the non-cacheable lane, the way a
            // pipeline mixes CPU-written sources with device-only targets.
            let cacheable = i != 0 || frame % 4 == 0;
            match alloc.allocate(size, cacheable) {
                Ok(allocation) => {
                    // Touch the first byte so the mapping is really used.
                    unsafe { allocation.vaddr().as_ptr().write_volatile(frame as u8) };
                    held.push(allocation);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("frame {frame}: allocation of {size} bytes failed: {e}");
                }
            }
        }

        // Occasional oversized scratch buffer to stir eviction.
        if frame % 16 == 0 {
            if let Some(&largest) = sizes.iter().max() {
                match alloc.allocate(largest * 2, true) {
                    Ok(allocation) => held.push(allocation),
                    Err(e) => {
                        failed += 1;
                        tracing::warn!("frame {frame}: scratch allocation failed: {e}");
                    }
                }
            }
        }

        for allocation in held.drain(..) {
            alloc.free(allocation.handle());
        }
    }

    let elapsed_us = started.elapsed().as_micros();
    let stats = alloc.stats();
    drop(lease);

    ExerciseReport {
        frames,
        sizes: sizes.to_vec(),
        cache_config,
        failed_allocations: failed,
        elapsed_us,
        stats,
    }
}

fn print_report(report: &ExerciseReport) {
    let stats = &report.stats;

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║           gbuf · Allocator Exercise Report           ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Workload ───────────────────────────────────────────────
    let sizes = report
        .sizes
        .iter()
        .map(|&s| format_size(s))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  Workload");
    println!("   Frames:       {}", report.frames);
    println!("   Sizes:        {sizes}");
    println!("   Ceilings:     {}", report.cache_config);
    let per_frame = report.elapsed_us as f64 / report.frames.max(1) as f64;
    println!(
        "   Elapsed:      {:.1} ms ({per_frame:.1} us/frame)",
        report.elapsed_us as f64 / 1000.0
    );
    if report.failed_allocations > 0 {
        println!("   Failed:       {} allocations", report.failed_allocations);
    }
    println!();

    // ── Live buffers ───────────────────────────────────────────
    println!("  Live");
    println!(
        "   Usage:        {} in {} buffers",
        format_size(stats.usage),
        stats.allocations
    );
    println!("   Peak:         {}", format_size(stats.peak_usage));
    println!("   Total allocs: {}", stats.total_allocations);
    println!();

    // ── Cache lanes ────────────────────────────────────────────
    for (name, lane) in [
        ("Cacheable lane", &stats.cacheable),
        ("Non-cacheable lane", &stats.non_cacheable),
    ] {
        println!("  {name}");
        println!(
            "   Cached:       {} buffers / {}",
            lane.count,
            format_size(lane.usage)
        );
        println!("   Hits:         {}", lane.hits);
        println!("   Misses:       {}", lane.misses);
        println!("   Evictions:    {}", lane.evictions);
        println!();
    }

    println!("  {}", stats.summary());
}
