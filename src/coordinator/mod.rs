//! Group membership coordination
//!
//! The coordinator is responsible for:
//! - The group registry (server/table → group mapping)
//! - Membership changes (add/remove groups, move servers and tables)
//! - Waiting for the scheduler to converge after servers move
//! - Diagnostics on servers in transition

pub mod admin;
pub mod mock;
pub mod mutator;
pub mod observer;
pub mod registry;
pub mod transition;

pub use admin::GroupAdmin;
pub use mock::MockScheduler;
pub use observer::{AssignmentObserver, Assignments, PartitionId, TransitionStatus};
pub use registry::{GroupInfo, GroupRegistry, DEFAULT_GROUP};
pub use transition::{ServerTransition, TransitionCoordinator, TransitionRecord};
