//! Group admin facade
//!
//! The operation set exposed to administrative clients. Mutations go
//! through the [`MembershipMutator`]; `move_servers` then waits on the
//! [`TransitionCoordinator`] until the scheduler has caught up.
//!
//! `move_tables` does not wait. Table moves are expected to be wrapped in a
//! disable/enable cycle by the caller, which re-places the table's
//! partitions under the new membership.

use crate::common::audit::AuditLogger;
use crate::common::{Config, Result, ServerId};
use crate::coordinator::mutator::MembershipMutator;
use crate::coordinator::observer::AssignmentObserver;
use crate::coordinator::registry::{GroupInfo, GroupRegistry};
use crate::coordinator::transition::{ServerTransition, TransitionCoordinator, TransitionRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct GroupAdmin {
    registry: Arc<GroupRegistry>,
    observer: Arc<dyn AssignmentObserver>,
    mutator: MembershipMutator,
    coordinator: TransitionCoordinator,
    shutdown: CancellationToken,
}

impl GroupAdmin {
    /// Facade over a fresh registry
    pub fn new(observer: Arc<dyn AssignmentObserver>, config: &Config) -> Result<Self> {
        Self::with_registry(Arc::new(GroupRegistry::new()), observer, config)
    }

    /// Facade over an existing (e.g. restored) registry
    pub fn with_registry(
        registry: Arc<GroupRegistry>,
        observer: Arc<dyn AssignmentObserver>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        let audit = match &config.audit_log {
            Some(path) => AuditLogger::with_file(path)?,
            None => AuditLogger::new(),
        };

        tracing::info!(
            "Group admin ready (operation timeout {:?}, poll interval {:?})",
            config.operation_timeout(),
            config.poll_interval()
        );

        Ok(Self {
            mutator: MembershipMutator::new(registry.clone(), observer.clone(), Arc::new(audit)),
            coordinator: TransitionCoordinator::new(registry.clone(), observer.clone(), config),
            registry,
            observer,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    /// Pick up live servers and tables that were never placed, as default
    /// members. Best effort: when the scheduler cannot be reached the
    /// registry answers from what it already tracks.
    async fn refresh_membership(&self) {
        if let Err(e) = self.track_live_membership().await {
            tracing::warn!("Membership refresh failed, answering from registry: {}", e);
        }
    }

    async fn track_live_membership(&self) -> Result<()> {
        let online = self.observer.list_online_servers().await?;
        let added = self.registry.track_servers(&online);
        if added > 0 {
            tracing::debug!("Tracking {} new server(s) in the default group", added);
        }

        let assignments = self.observer.get_live_assignments().await?;
        let tables: BTreeSet<&str> = assignments
            .values()
            .flatten()
            .map(|p| p.table.as_str())
            .collect();
        let added = self.registry.track_tables(tables);
        if added > 0 {
            tracing::debug!("Tracking {} new table(s) in the default group", added);
        }
        Ok(())
    }

    // === Lookups ===

    pub async fn list_tables_of_group(&self, name: &str) -> Result<BTreeSet<String>> {
        self.refresh_membership().await;
        self.registry.tables_of_group(name)
    }

    pub async fn get_group_info(&self, name: &str) -> Result<GroupInfo> {
        self.refresh_membership().await;
        self.registry.get_group(name)
    }

    pub async fn get_group_info_of_table(&self, table: &str) -> Result<GroupInfo> {
        self.refresh_membership().await;
        self.registry.group_of_table(table)
    }

    pub async fn get_group_of_server(&self, server: &str) -> Result<GroupInfo> {
        let server = ServerId::parse(server)?;
        self.refresh_membership().await;
        self.registry.group_of_server(&server)
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupInfo>> {
        self.refresh_membership().await;
        Ok(self.registry.list_groups())
    }

    // === Mutations ===

    pub async fn add_group(&self, name: &str) -> Result<()> {
        self.mutator.add_group(name)
    }

    pub async fn remove_group(&self, name: &str) -> Result<()> {
        self.mutator.remove_group(name).map(|_| ())
    }

    /// Move servers and wait for the scheduler to converge.
    ///
    /// A `TransitionTimeout` or `Cancelled` error means the move was applied
    /// but not confirmed; it is never rolled back.
    pub async fn move_servers<I, S>(&self, servers: I, target: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.move_servers_with_cancel(servers, target, &self.shutdown)
            .await
    }

    /// Like [`move_servers`](Self::move_servers), also aborted by `cancel`
    pub async fn move_servers_with_cancel<I, S>(
        &self,
        servers: I,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let servers = parse_unique(servers)?;
        let moves = self.mutator.move_servers(&servers, target).await?;

        let linked = self.shutdown.child_token();
        let wait = self.coordinator.wait_for_transitions(&moves, &linked);
        tokio::pin!(wait);

        tokio::select! {
            biased;
            result = &mut wait => result,
            _ = cancel.cancelled() => {
                linked.cancel();
                wait.await
            }
        }
    }

    /// Move tables without waiting for placement to follow
    pub async fn move_tables<I, S>(&self, tables: I, target: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tables: Vec<String> = tables
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.mutator.move_tables(&tables, target).await.map(|_| ())
    }

    // === Diagnostics ===

    /// Best-effort snapshot of servers not in a steady state, for operators
    pub async fn list_servers_in_transition(&self) -> Result<BTreeMap<ServerId, ServerTransition>> {
        self.coordinator.list_servers_in_transition().await
    }

    /// Waits currently in flight
    pub fn transition_records(&self) -> Vec<TransitionRecord> {
        self.coordinator.records()
    }

    /// Abort every running convergence wait with `Cancelled`
    pub fn shutdown(&self) {
        tracing::info!("Group admin shutting down");
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

fn parse_unique<I, S>(servers: I) -> Result<Vec<ServerId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<ServerId> = crate::common::parse_servers(servers)?.into_iter().collect();
    Ok(unique.into_iter().collect())
}
