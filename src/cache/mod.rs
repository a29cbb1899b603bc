//! Filesystem-backed cache pools
//!
//! Entries live one level below a pool root and are evicted least recently
//! used first, unless they carry a lock sentinel.
//!
//! # Entry States
//!
//! | State | Sentinel | Purged when idle past the age threshold |
//! |-------|----------|------------------------------------------|
//! | Unlocked | absent | yes |
//! | Locked | `.lock` present | never |

pub mod scheduler;
pub mod store;
pub mod usage;

pub use scheduler::PurgeScheduler;
pub use store::{pools, CacheEntry, CachePool, CacheStore, PoolPurge, LOCK_DIR};
pub use usage::{format_bytes, CacheUsage, PoolUsage};
