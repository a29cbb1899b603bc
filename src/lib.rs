//! repocache - single-flight git snapshot cache
//!
//! Produces one consistent on-disk checkout per (repository, commit-ish)
//! even under concurrent requests, and keeps it out of LRU eviction while
//! a caller is using it.

pub mod cache;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod git;
pub mod lock_table;
pub mod repository;
pub mod ui;

pub use error::{ErrorKind, RepoCacheError, RepoCacheResult};
