// Copyright (c) 2026 The gbuf2d developers
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cache ceilings and human-readable size parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AllocError;

/// Default byte ceiling per cache lane: 64 MiB.
pub const DEFAULT_CACHE_USAGE_MAX: usize = 64 * 1024 * 1024;

/// Default entry-count ceiling per cache lane.
pub const DEFAULT_CACHE_ALLOC_COUNT_MAX: usize = 16;

/// Ceilings applied to each of the two cache lanes.
///
/// `usage_max` bounds the total bytes held in one lane's free list and
/// `alloc_count_max` bounds its entry count. A freed buffer larger than
/// `usage_max`, or any freed buffer while `alloc_count_max` is zero, bypasses
/// the cache and is released immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub usage_max: usize,
    pub alloc_count_max: usize,
}

impl CacheConfig {
    pub fn new(usage_max: usize, alloc_count_max: usize) -> Self {
        Self {
            usage_max,
            alloc_count_max,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            usage_max: DEFAULT_CACHE_USAGE_MAX,
            alloc_count_max: DEFAULT_CACHE_ALLOC_COUNT_MAX,
        }
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} entries",
            format_size(self.usage_max),
            self.alloc_count_max
        )
    }
}

/// Parses a human-readable byte size: `"64M"`, `"1G"`, `"32768"`, `"16KB"`.
///
/// Suffixes are case-insensitive. A bare number is bytes. Zero is accepted;
/// a zero ceiling is a legitimate way to cache nothing.
pub fn parse_size(s: &str) -> Result<usize, AllocError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AllocError::InvalidSize("empty size string".into()));
    }

    let upper = s.to_uppercase();
    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("GB").or(upper.strip_suffix('G'))
    {
        (d, 1024 * 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("MB").or(upper.strip_suffix('M')) {
        (d, 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("KB").or(upper.strip_suffix('K')) {
        (d, 1024)
    } else if let Some(d) = upper.strip_suffix('B') {
        (d, 1)
    } else {
        (upper.as_str(), 1)
    };

    let value: usize = digits
        .trim()
        .parse()
        .map_err(|_| AllocError::InvalidSize(s.to_string()))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| AllocError::InvalidSize(format!("{s} overflows usize")))
}

/// Formats a byte count with the largest exact binary suffix.
pub fn format_size(bytes: usize) -> String {
    const GIB: usize = 1024 * 1024 * 1024;
    const MIB: usize = 1024 * 1024;
    const KIB: usize = 1024;

    if bytes >= GIB && bytes % GIB == 0 {
        format!("{}G", bytes / GIB)
    } else if bytes >= MIB && bytes % MIB == 0 {
        format!("{}M", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}K", bytes / KIB)
    } else {
        format!("{bytes}B")
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
