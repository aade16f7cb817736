//! Membership mutator
//!
//! Applies membership changes to the registry, then tells the scheduler
//! which servers and tables need reconciling. The notification is a hint:
//! if it fails the change stands and the scheduler is expected to notice on
//! its own.

use crate::common::audit::{AuditEventType, AuditLogger};
use crate::common::metrics::METRICS;
use crate::common::{Result, ServerId};
use crate::coordinator::observer::AssignmentObserver;
use crate::coordinator::registry::{GroupInfo, GroupRegistry, ServerMove, TableMove};
use std::sync::Arc;

pub struct MembershipMutator {
    registry: Arc<GroupRegistry>,
    observer: Arc<dyn AssignmentObserver>,
    audit: Arc<AuditLogger>,
}

impl MembershipMutator {
    pub fn new(
        registry: Arc<GroupRegistry>,
        observer: Arc<dyn AssignmentObserver>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            registry,
            observer,
            audit,
        }
    }

    pub fn add_group(&self, name: &str) -> Result<()> {
        self.registry.create_group(name)?;
        METRICS.groups_added.inc();
        self.audit
            .log_event(AuditEventType::GroupAdded, name, Vec::<String>::new(), "group created");
        Ok(())
    }

    pub fn remove_group(&self, name: &str) -> Result<GroupInfo> {
        let removed = self.registry.delete_group(name)?;
        METRICS.groups_removed.inc();
        self.audit
            .log_event(AuditEventType::GroupRemoved, name, Vec::<String>::new(), "group removed");
        Ok(removed)
    }

    /// Reassign servers to `target`.
    ///
    /// Every server must be known to the cluster, either tracked by the
    /// registry or currently online; otherwise nothing moves.
    pub async fn move_servers(&self, servers: &[ServerId], target: &str) -> Result<Vec<ServerMove>> {
        let online = self.observer.list_online_servers().await?;

        let unknown: Vec<String> = servers
            .iter()
            .filter(|s| !online.contains(*s) && !self.registry.is_tracked_server(s))
            .map(ServerId::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(crate::Error::NotFound(format!(
                "unknown server(s): {}",
                unknown.join(", ")
            )));
        }

        self.registry.track_servers(&online);
        let moves = self.registry.move_servers(servers, target)?;

        let changed: Vec<ServerId> = moves
            .iter()
            .filter(|mv| !mv.is_noop())
            .map(|mv| mv.server.clone())
            .collect();
        METRICS.servers_moved.add(changed.len() as u64);

        tracing::info!(
            "Moved {} server(s) to group '{}' ({} already there)",
            changed.len(),
            target,
            moves.len() - changed.len()
        );
        if !changed.is_empty() {
            self.audit.log_event(
                AuditEventType::ServersMoved,
                target,
                &changed,
                format!("{} server(s) moved", changed.len()),
            );
            self.notify(&changed, &[]).await;
        }
        Ok(moves)
    }

    /// Reassign tables to `target`. Does not wait for placement to follow.
    pub async fn move_tables(&self, tables: &[String], target: &str) -> Result<Vec<TableMove>> {
        let moves = self.registry.move_tables(tables, target)?;

        let changed: Vec<String> = moves
            .iter()
            .filter(|mv| !mv.is_noop())
            .map(|mv| mv.table.clone())
            .collect();
        METRICS.tables_moved.add(changed.len() as u64);

        tracing::info!("Moved {} table(s) to group '{}'", changed.len(), target);
        if !changed.is_empty() {
            self.audit.log_event(
                AuditEventType::TablesMoved,
                target,
                &changed,
                format!("{} table(s) moved", changed.len()),
            );
            self.notify(&[], &changed).await;
        }
        Ok(moves)
    }

    async fn notify(&self, servers: &[ServerId], tables: &[String]) {
        if let Err(e) = self.observer.notify_membership_changed(servers, tables).await {
            tracing::warn!("Scheduler membership notification failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::audit::AuditEntry;
    use crate::coordinator::mock::MockScheduler;
    use crate::coordinator::registry::DEFAULT_GROUP;

    fn sid(s: &str) -> ServerId {
        ServerId::parse(s).unwrap()
    }

    fn setup(online: &[&str]) -> (Arc<GroupRegistry>, Arc<MockScheduler>, MembershipMutator) {
        let registry = Arc::new(GroupRegistry::new());
        let servers: Vec<ServerId> = online.iter().map(|s| sid(s)).collect();
        let scheduler = Arc::new(MockScheduler::with_servers(&servers));
        let mutator = MembershipMutator::new(
            registry.clone(),
            scheduler.clone(),
            Arc::new(AuditLogger::new()),
        );
        (registry, scheduler, mutator)
    }

    #[tokio::test]
    async fn test_move_servers_notifies() {
        let (registry, scheduler, mutator) = setup(&["h1:1", "h2:1"]);
        mutator.add_group("g1").unwrap();

        mutator.move_servers(&[sid("h1:1")], "g1").await.unwrap();

        assert_eq!(registry.group_of_server(&sid("h1:1")).unwrap().name, "g1");
        // online servers get tracked on the way
        assert!(registry
            .get_group(DEFAULT_GROUP)
            .unwrap()
            .contains_server(&sid("h2:1")));
        let notifications = scheduler.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].servers, vec![sid("h1:1")]);
    }

    #[tokio::test]
    async fn test_move_servers_unknown_is_atomic() {
        let (registry, scheduler, mutator) = setup(&["h1:1"]);
        mutator.add_group("g2").unwrap();

        let result = mutator
            .move_servers(&[sid("h1:1"), sid("ghost:1")], "g2")
            .await;
        assert!(matches!(result, Err(crate::Error::NotFound(_))));
        assert_eq!(registry.group_of_server(&sid("h1:1")).unwrap().name, DEFAULT_GROUP);
        assert_eq!(registry.group_of_server(&sid("ghost:1")).unwrap().name, DEFAULT_GROUP);
        assert!(registry.get_group("g2").unwrap().servers.is_empty());
        assert!(scheduler.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_noop_move_skips_notification() {
        let (_registry, scheduler, mutator) = setup(&["h1:1"]);
        let moves = mutator.move_servers(&[sid("h1:1")], DEFAULT_GROUP).await.unwrap();
        assert!(moves[0].is_noop());
        assert!(scheduler.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_noop_move_writes_no_audit_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let registry = Arc::new(GroupRegistry::new());
        let scheduler = Arc::new(MockScheduler::with_servers(&[sid("h1:1")]));
        let mutator = MembershipMutator::new(
            registry,
            scheduler,
            Arc::new(AuditLogger::with_file(&path).unwrap()),
        );
        mutator.add_group("g1").unwrap();

        mutator.move_servers(&[sid("h1:1")], "g1").await.unwrap();
        mutator.move_servers(&[sid("h1:1")], "g1").await.unwrap();
        mutator.move_tables(&["t1".to_string()], DEFAULT_GROUP).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let events: Vec<AuditEventType> = contents
            .lines()
            .map(|l| serde_json::from_str::<AuditEntry>(l).unwrap().event)
            .collect();
        assert_eq!(
            events,
            vec![AuditEventType::GroupAdded, AuditEventType::ServersMoved]
        );
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_change() {
        let (registry, scheduler, mutator) = setup(&["h1:1"]);
        mutator.add_group("g1").unwrap();
        scheduler.set_unreachable(true);

        mutator.move_tables(&["t1".to_string()], "g1").await.unwrap();
        assert_eq!(registry.group_of_table("t1").unwrap().name, "g1");
    }

    #[tokio::test]
    async fn test_move_servers_scheduler_unreachable() {
        let (registry, scheduler, mutator) = setup(&["h1:1"]);
        mutator.add_group("g1").unwrap();
        scheduler.set_unreachable(true);

        let result = mutator.move_servers(&[sid("h1:1")], "g1").await;
        assert!(matches!(result, Err(crate::Error::ConnectionFailed(_))));
        assert_eq!(registry.group_of_server(&sid("h1:1")).unwrap().name, DEFAULT_GROUP);
    }

    #[tokio::test]
    async fn test_remove_group() {
        let (_registry, _scheduler, mutator) = setup(&[]);
        mutator.add_group("g1").unwrap();
        assert_eq!(mutator.remove_group("g1").unwrap().name, "g1");
        assert!(matches!(
            mutator.remove_group(DEFAULT_GROUP),
            Err(crate::Error::InvalidState(_))
        ));
    }
}
