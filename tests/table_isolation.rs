//! Table placement stays within the table's group once converged

mod common;

use common::{cluster, create_table, sid, spawn_reconciler};
use rsgroup::{TransitionStatus, DEFAULT_GROUP};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_table_isolation() {
    let (admin, scheduler) = cluster(&["h1:60020", "h2:60020", "h3:60020"]);
    let registry = admin.registry().clone();
    create_table(&scheduler, "t1", 6, &["h1:60020", "h2:60020", "h3:60020"]);
    create_table(&scheduler, "t2", 3, &["h1:60020", "h2:60020", "h3:60020"]);

    admin.add_group("g1").await.unwrap();

    // move_tables does not wait; placement is still mixed right after
    admin.move_tables(["t1"], "g1").await.unwrap();
    assert_eq!(admin.get_group_info_of_table("t1").await.unwrap().name, "g1");
    let listing = admin.list_servers_in_transition().await.unwrap();
    assert_eq!(listing.len(), 3);
    assert!(listing
        .values()
        .all(|entry| entry.status == TransitionStatus::Violating && entry.foreign_tables.contains("t1")));

    let (stop, handle) = spawn_reconciler(scheduler.clone(), registry, Duration::from_millis(100));
    admin.move_servers(["h3:60020"], "g1").await.unwrap();
    stop.cancel();
    handle.await.unwrap();

    let t1_hosts = scheduler.hosts_of_table("t1");
    assert_eq!(t1_hosts.len(), 6);
    assert!(t1_hosts.values().all(|server| *server == sid("h3:60020")));

    let default = admin.get_group_info(DEFAULT_GROUP).await.unwrap();
    let t2_hosts = scheduler.hosts_of_table("t2");
    assert_eq!(t2_hosts.len(), 3);
    assert!(t2_hosts.values().all(|server| default.contains_server(server)));

    assert!(admin.list_servers_in_transition().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_remove_group_after_tables_moved_back() {
    let (admin, _scheduler) = cluster(&["h1:60020"]);
    admin.add_group("g1").await.unwrap();
    admin.move_tables(["t1", "t2", "t1"], "g1").await.unwrap();

    let tables = admin.list_tables_of_group("g1").await.unwrap();
    assert_eq!(tables.len(), 2);

    admin.move_tables(["t1", "t2"], DEFAULT_GROUP).await.unwrap();
    assert!(admin.list_tables_of_group("g1").await.unwrap().is_empty());
    admin.remove_group("g1").await.unwrap();
    assert_eq!(admin.get_group_info_of_table("t1").await.unwrap().name, DEFAULT_GROUP);
}
