//! Disk usage reporting for cache pools

use serde::Serialize;
use std::path::PathBuf;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Bytes used by a single pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolUsage {
    /// Pool name
    pub name: String,
    /// Pool root directory
    pub path: PathBuf,
    /// Recursive size of every file under the root
    pub bytes: u64,
}

/// Bytes used per pool and in total
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    /// Sum across pools
    pub total_bytes: u64,
    /// Per-pool breakdown in pool order
    pub pools: Vec<PoolUsage>,
}

impl CacheUsage {
    /// Build a report, computing the total
    pub fn new(pools: Vec<PoolUsage>) -> Self {
        Self {
            total_bytes: pools.iter().map(|p| p.bytes).sum(),
            pools,
        }
    }

    /// Bytes used by the named pool
    pub fn pool(&self, name: &str) -> Option<u64> {
        self.pools.iter().find(|p| p.name == name).map(|p| p.bytes)
    }
}
