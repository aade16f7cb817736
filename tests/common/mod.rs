//! Shared helpers for the integration tests

#![allow(dead_code)]

use rsgroup::{Config, GroupAdmin, GroupRegistry, MockScheduler, PartitionId, ServerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn sid(s: &str) -> ServerId {
    ServerId::parse(s).unwrap()
}

pub fn test_config() -> Config {
    Config::default()
        .with_operation_timeout(Duration::from_secs(5))
        .with_poll_interval(Duration::from_millis(100))
}

/// Admin over a mock scheduler with the given servers online
pub fn cluster(servers: &[&str]) -> (GroupAdmin, Arc<MockScheduler>) {
    let servers: Vec<ServerId> = servers.iter().map(|s| sid(s)).collect();
    let scheduler = Arc::new(MockScheduler::with_servers(&servers));
    let admin = GroupAdmin::new(scheduler.clone(), &test_config()).unwrap();
    (admin, scheduler)
}

/// Create `count` partitions of `table`, spread over `servers`
pub fn create_table(scheduler: &MockScheduler, table: &str, count: usize, servers: &[&str]) {
    for i in 0..count {
        let server = sid(servers[i % servers.len()]);
        scheduler.assign(&server, PartitionId::new(table, format!("{}-r{}", table, i)));
    }
}

/// Emulates the balancer: reconciles placement every `every` until stopped
pub fn spawn_reconciler(
    scheduler: Arc<MockScheduler>,
    registry: Arc<GroupRegistry>,
    every: Duration,
) -> (CancellationToken, JoinHandle<()>) {
    let stop = CancellationToken::new();
    let token = stop.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(every) => {
                    scheduler.reconcile(&registry);
                }
            }
        }
    });
    (stop, handle)
}

/// Partition invariant: every tracked server and every placed table is
/// listed by exactly one group
pub fn assert_partitioned(groups: &[rsgroup::GroupInfo]) {
    let mut servers = std::collections::BTreeSet::new();
    let mut tables = std::collections::BTreeSet::new();
    for group in groups {
        for server in &group.servers {
            assert!(servers.insert(server.clone()), "{} in two groups", server);
        }
        for table in &group.tables {
            assert!(tables.insert(table.clone()), "{} in two groups", table);
        }
    }
}
