//! Read-only view onto the external scheduler's live assignment state
//!
//! The scheduler owns partition placement. The coordinator only reads it
//! through [`AssignmentObserver`] and decides, per server, whether what the
//! server hosts agrees with the registry.

use crate::common::{Result, ServerId};
use crate::coordinator::registry::RegistryView;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A partition (region) of a table as reported by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionId {
    pub table: String,
    pub encoded_name: String,
}

impl PartitionId {
    pub fn new(table: impl Into<String>, encoded_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            encoded_name: encoded_name.into(),
        }
    }
}

/// Live placement per server
pub type Assignments = BTreeMap<ServerId, BTreeSet<PartitionId>>;

/// Interface consumed from the scheduler / assignment engine.
///
/// Connectivity failures should be returned as
/// [`Error::ConnectionFailed`](crate::Error::ConnectionFailed); the
/// coordinator propagates them unchanged.
#[async_trait]
pub trait AssignmentObserver: Send + Sync {
    /// Servers currently live
    async fn list_online_servers(&self) -> Result<BTreeSet<ServerId>>;

    /// Current partition placement
    async fn get_live_assignments(&self) -> Result<Assignments>;

    /// Servers the scheduler reports as mid-reassignment
    async fn list_reassigning_servers(&self) -> Result<BTreeSet<ServerId>> {
        Ok(BTreeSet::new())
    }

    /// Hint that membership changed. The coordinator must keep working when
    /// this does nothing.
    async fn notify_membership_changed(&self, _servers: &[ServerId], _tables: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Why a server shows up in the transition listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionStatus {
    /// Hosts partitions of a table outside its group
    Violating,
    /// Reported by the scheduler as being reassigned
    Reassigning,
    /// Tracked but not online; hosts nothing observably
    Offline,
}

impl TransitionStatus {
    /// Does this status keep a move from converging?
    pub fn blocks_convergence(&self) -> bool {
        matches!(self, TransitionStatus::Violating | TransitionStatus::Reassigning)
    }
}

impl std::fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionStatus::Violating => write!(f, "violating"),
            TransitionStatus::Reassigning => write!(f, "reassigning"),
            TransitionStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Evaluated state of one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerState {
    /// Registry group of the server
    pub group: String,
    pub status: TransitionStatus,
    /// Tables hosted outside the server's group (only for `Violating`)
    pub foreign_tables: BTreeSet<String>,
}

/// One consistent-enough read of the scheduler
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub online: BTreeSet<ServerId>,
    pub assignments: Assignments,
    pub reassigning: BTreeSet<ServerId>,
}

impl LiveState {
    pub async fn fetch(observer: &dyn AssignmentObserver) -> Result<Self> {
        let online = observer.list_online_servers().await?;
        let assignments = observer.get_live_assignments().await?;
        let reassigning = observer.list_reassigning_servers().await?;
        Ok(Self {
            online,
            assignments,
            reassigning,
        })
    }

    /// Every server that is not in a steady, constraint-respecting state.
    ///
    /// Offline servers are reported as `Offline` even if stale assignments
    /// still name them.
    pub fn evaluate(&self, registry: &RegistryView<'_>) -> BTreeMap<ServerId, ServerState> {
        let mut result = BTreeMap::new();

        for server in &self.online {
            let group = registry.group_name_of_server(server);

            let foreign_tables: BTreeSet<String> = self
                .assignments
                .get(server)
                .into_iter()
                .flatten()
                .filter(|p| registry.group_name_of_table(&p.table) != group)
                .map(|p| p.table.clone())
                .collect();

            let status = if !foreign_tables.is_empty() {
                TransitionStatus::Violating
            } else if self.reassigning.contains(server) {
                TransitionStatus::Reassigning
            } else {
                continue;
            };

            result.insert(
                server.clone(),
                ServerState {
                    group: group.to_string(),
                    status,
                    foreign_tables,
                },
            );
        }

        for (server, group) in registry.tracked_servers() {
            if !self.online.contains(server) {
                result.insert(
                    server.clone(),
                    ServerState {
                        group: group.to_string(),
                        status: TransitionStatus::Offline,
                        foreign_tables: BTreeSet::new(),
                    },
                );
            }
        }

        result
    }
}
