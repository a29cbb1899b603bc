//! CLI command implementations

pub mod cache;
pub mod config;
pub mod daemon;
pub mod fetch;
pub mod unlock;

pub use cache::execute as cache;
pub use config::execute as config;
pub use daemon::execute as daemon;
pub use fetch::execute as fetch;
pub use unlock::execute as unlock;
