//! # rsgroup
//!
//! Server groups for a partitioned storage cluster:
//! - Servers and tables are partitioned into named, disjoint groups
//! - A table's partitions may only be hosted by servers of its group
//! - Servers and tables move between groups while the cluster stays online
//! - Server moves block until the scheduler's live placement converges,
//!   bounded by an operation timeout and cancellable
//!
//! ## Architecture
//!
//! ```text
//!   admin client
//!        │
//! ┌──────▼───────────────────────────────────────┐
//! │ GroupAdmin (facade)                          │
//! │   ├─ MembershipMutator ──► GroupRegistry     │
//! │   └─ TransitionCoordinator (poll + deadline) │
//! └──────┬───────────────────────────────────────┘
//!        │ AssignmentObserver (read-only)
//! ┌──────▼──────────────┐
//! │ scheduler / balancer│  owns live partition placement
//! └─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use rsgroup::{Config, GroupAdmin, MockScheduler};
//! use std::sync::Arc;
//!
//! # async fn run() -> rsgroup::Result<()> {
//! let config = Config::load(None)?;
//! rsgroup::common::init_tracing(&config.log_level);
//!
//! let scheduler = Arc::new(MockScheduler::new());
//! let admin = GroupAdmin::new(scheduler, &config)?;
//!
//! admin.add_group("batch").await?;
//! admin.move_servers(["rs1.example.com:60020"], "batch").await?;
//! admin.move_tables(["events"], "batch").await?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod coordinator;

// Re-export commonly used types
pub use common::{Config, Error, Result, ServerId};
pub use coordinator::{
    AssignmentObserver, GroupAdmin, GroupInfo, GroupRegistry, MockScheduler, PartitionId,
    ServerTransition, TransitionStatus, DEFAULT_GROUP,
};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
