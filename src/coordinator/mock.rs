//! In-memory scheduler for tests and local experiments
//!
//! [`MockScheduler`] plays the role of the group-aware assignment engine:
//! servers can be started and stopped, partitions assigned by hand, and
//! [`MockScheduler::reconcile`] moves every misplaced partition onto an online
//! server of the table's group, the way a converging scheduler eventually
//! would.

use crate::common::{Result, ServerId};
use crate::coordinator::observer::{AssignmentObserver, Assignments, PartitionId};
use crate::coordinator::registry::GroupRegistry;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// A recorded `notify_membership_changed` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub servers: Vec<ServerId>,
    pub tables: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    online: BTreeSet<ServerId>,
    assignments: Assignments,
    /// Partitions with no server, e.g. after their host died
    stranded: BTreeSet<PartitionId>,
    reassigning: BTreeSet<ServerId>,
    unreachable: bool,
    notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
pub struct MockScheduler {
    state: Mutex<MockState>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with the given servers already online
    pub fn with_servers<'a>(servers: impl IntoIterator<Item = &'a ServerId>) -> Self {
        let scheduler = Self::new();
        for server in servers {
            scheduler.start_server(server);
        }
        scheduler
    }

    pub fn start_server(&self, server: &ServerId) {
        self.state.lock().online.insert(server.clone());
    }

    /// Take a server offline; whatever it hosted becomes stranded
    pub fn stop_server(&self, server: &ServerId) {
        let mut state = self.state.lock();
        state.online.remove(server);
        state.reassigning.remove(server);
        if let Some(partitions) = state.assignments.remove(server) {
            state.stranded.extend(partitions);
        }
    }

    /// Place a partition on a server, removing it from wherever it was
    pub fn assign(&self, server: &ServerId, partition: PartitionId) {
        let mut state = self.state.lock();
        for partitions in state.assignments.values_mut() {
            partitions.remove(&partition);
        }
        state.stranded.remove(&partition);
        state
            .assignments
            .entry(server.clone())
            .or_default()
            .insert(partition);
    }

    pub fn set_reassigning(&self, server: &ServerId, reassigning: bool) {
        let mut state = self.state.lock();
        if reassigning {
            state.reassigning.insert(server.clone());
        } else {
            state.reassigning.remove(server);
        }
    }

    /// Make every observer call fail with `ConnectionFailed`
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    pub fn partitions_of(&self, server: &ServerId) -> BTreeSet<PartitionId> {
        self.state
            .lock()
            .assignments
            .get(server)
            .cloned()
            .unwrap_or_default()
    }

    /// Hosts of every assigned partition of `table`
    pub fn hosts_of_table(&self, table: &str) -> BTreeMap<PartitionId, ServerId> {
        let state = self.state.lock();
        state
            .assignments
            .iter()
            .flat_map(|(server, partitions)| {
                partitions
                    .iter()
                    .filter(|p| p.table == table)
                    .map(move |p| (p.clone(), server.clone()))
            })
            .collect()
    }

    pub fn stranded(&self) -> BTreeSet<PartitionId> {
        self.state.lock().stranded.clone()
    }

    /// Move misplaced and stranded partitions onto online servers of the
    /// owning table's group, least-loaded first. Partitions whose group has
    /// no online server stay stranded. Returns how many partitions moved.
    pub fn reconcile(&self, registry: &GroupRegistry) -> usize {
        let view = registry.read();
        let mut state = self.state.lock();

        let mut pending: Vec<PartitionId> = std::mem::take(&mut state.stranded).into_iter().collect();
        let online = state.online.clone();
        for (server, partitions) in state.assignments.iter_mut() {
            let group = view.group_name_of_server(server).to_string();
            let misplaced: Vec<PartitionId> = partitions
                .iter()
                .filter(|p| !online.contains(server) || view.group_name_of_table(&p.table) != group)
                .cloned()
                .collect();
            for partition in misplaced {
                partitions.remove(&partition);
                pending.push(partition);
            }
        }
        state.assignments.retain(|_, partitions| !partitions.is_empty());

        let mut moved = 0;
        for partition in pending {
            let group = view.group_name_of_table(&partition.table);
            let target = online
                .iter()
                .filter(|s| view.group_name_of_server(s) == group)
                .min_by_key(|s| state.assignments.get(*s).map_or(0, BTreeSet::len))
                .cloned();

            match target {
                Some(server) => {
                    state.assignments.entry(server).or_default().insert(partition);
                    moved += 1;
                }
                None => {
                    state.stranded.insert(partition);
                }
            }
        }
        state.reassigning.clear();

        moved
    }

    fn check_reachable(state: &MockState) -> Result<()> {
        if state.unreachable {
            Err(crate::Error::ConnectionFailed("mock scheduler unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AssignmentObserver for MockScheduler {
    async fn list_online_servers(&self) -> Result<BTreeSet<ServerId>> {
        let state = self.state.lock();
        Self::check_reachable(&state)?;
        Ok(state.online.clone())
    }

    async fn get_live_assignments(&self) -> Result<Assignments> {
        let state = self.state.lock();
        Self::check_reachable(&state)?;
        Ok(state.assignments.clone())
    }

    async fn list_reassigning_servers(&self) -> Result<BTreeSet<ServerId>> {
        let state = self.state.lock();
        Self::check_reachable(&state)?;
        Ok(state.reassigning.clone())
    }

    async fn notify_membership_changed(&self, servers: &[ServerId], tables: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_reachable(&state)?;
        state.notifications.push(Notification {
            servers: servers.to_vec(),
            tables: tables.to_vec(),
        });
        Ok(())
    }
}
