//! Group lifecycle through the admin facade

mod common;

use common::{assert_partitioned, cluster, create_table, sid};
use rsgroup::{Error, DEFAULT_GROUP};
use std::collections::BTreeSet;

#[tokio::test]
async fn test_group_lifecycle() {
    let (admin, _scheduler) = cluster(&["h1:60020", "h2:60020", "h3:60020"]);

    admin.add_group("g1").await.unwrap();
    admin.move_servers(["h1:60020"], "g1").await.unwrap();

    let g1 = admin.get_group_info("g1").await.unwrap();
    assert_eq!(g1.servers, BTreeSet::from([sid("h1:60020")]));

    let default = admin.get_group_info(DEFAULT_GROUP).await.unwrap();
    assert!(!default.contains_server(&sid("h1:60020")));
    assert_eq!(default.servers.len(), 2);

    assert_eq!(admin.get_group_of_server("h1:60020").await.unwrap().name, "g1");

    let names: Vec<String> = admin
        .list_groups()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec![DEFAULT_GROUP.to_string(), "g1".to_string()]);

    // tear down: servers back to default, then remove
    assert!(matches!(
        admin.remove_group("g1").await,
        Err(Error::InvalidState(_))
    ));
    admin.move_servers(["h1:60020"], DEFAULT_GROUP).await.unwrap();
    admin.remove_group("g1").await.unwrap();
    assert!(matches!(
        admin.get_group_info("g1").await,
        Err(Error::NotFound(_))
    ));
    assert_partitioned(&admin.list_groups().await.unwrap());
}

#[tokio::test]
async fn test_default_group_protected() {
    let (admin, _scheduler) = cluster(&["h1:60020"]);

    assert!(matches!(
        admin.remove_group(DEFAULT_GROUP).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        admin.add_group(DEFAULT_GROUP).await,
        Err(Error::AlreadyExists(_))
    ));
    assert!(admin.get_group_info(DEFAULT_GROUP).await.is_ok());
}

#[tokio::test]
async fn test_remove_group_with_tables() {
    let (admin, _scheduler) = cluster(&["h1:60020"]);
    admin.add_group("g1").await.unwrap();
    admin.move_tables(["t1"], "g1").await.unwrap();

    assert!(matches!(
        admin.remove_group("g1").await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(
        admin.list_tables_of_group("g1").await.unwrap(),
        BTreeSet::from(["t1".to_string()])
    );
}

#[tokio::test]
async fn test_idempotent_move() {
    let (admin, scheduler) = cluster(&["h1:60020", "h2:60020"]);
    admin.add_group("g1").await.unwrap();
    admin.move_servers(["h1:60020"], "g1").await.unwrap();
    let before = admin.list_groups().await.unwrap();
    let notified = scheduler.notifications().len();

    admin.move_servers(["h1:60020", "H1:60020"], "g1").await.unwrap();

    assert_eq!(admin.list_groups().await.unwrap(), before);
    assert_eq!(scheduler.notifications().len(), notified);
}

#[tokio::test]
async fn test_atomic_multi_move() {
    let (admin, _scheduler) = cluster(&["a:60020"]);
    admin.add_group("g2").await.unwrap();
    let before = admin.list_groups().await.unwrap();

    let result = admin.move_servers(["a:60020", "b:60020"], "g2").await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(admin.list_groups().await.unwrap(), before);
    assert_eq!(admin.get_group_of_server("a:60020").await.unwrap().name, DEFAULT_GROUP);
    assert!(admin.get_group_info("g2").await.unwrap().servers.is_empty());
}

#[tokio::test]
async fn test_move_to_missing_group() {
    let (admin, _scheduler) = cluster(&["a:60020"]);
    assert!(matches!(
        admin.move_servers(["a:60020"], "nope").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        admin.move_tables(["t1"], "nope").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_partition_invariant_over_sequence() {
    let (admin, _scheduler) = cluster(&["h1:1", "h2:1", "h3:1", "h4:1"]);
    admin.add_group("g1").await.unwrap();
    admin.add_group("g2").await.unwrap();

    admin.move_servers(["h1:1", "h2:1"], "g1").await.unwrap();
    assert_partitioned(&admin.list_groups().await.unwrap());
    admin.move_servers(["h2:1", "h3:1"], "g2").await.unwrap();
    assert_partitioned(&admin.list_groups().await.unwrap());
    admin.move_tables(["t1", "t2"], "g1").await.unwrap();
    admin.move_tables(["t2", "t3"], "g2").await.unwrap();

    let groups = admin.list_groups().await.unwrap();
    assert_partitioned(&groups);
    let all_servers: usize = groups.iter().map(|g| g.servers.len()).sum();
    assert_eq!(all_servers, 4);
    assert_eq!(admin.get_group_info_of_table("t2").await.unwrap().name, "g2");
    assert_eq!(admin.get_group_info_of_table("t1").await.unwrap().name, "g1");
    assert_eq!(
        admin.get_group_info_of_table("never-moved").await.unwrap().name,
        DEFAULT_GROUP
    );
}

#[tokio::test]
async fn test_scheduler_unreachable_is_propagated() {
    let (admin, scheduler) = cluster(&["h1:1"]);
    admin.add_group("g1").await.unwrap();
    scheduler.set_unreachable(true);

    let err = admin.move_servers(["h1:1"], "g1").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionFailed(_)));
    assert!(err.is_retryable());
    assert!(matches!(
        admin.list_servers_in_transition().await,
        Err(Error::ConnectionFailed(_))
    ));

    // lookups still answer from the registry
    let default = admin.get_group_info(DEFAULT_GROUP).await.unwrap();
    assert!(default.contains_server(&sid("h1:1")));
    assert_eq!(admin.get_group_of_server("h1:1").await.unwrap().name, DEFAULT_GROUP);
}

#[tokio::test]
async fn test_default_group_owns_unmoved_live_tables() {
    let (admin, scheduler) = cluster(&["h1:1", "h2:1"]);
    create_table(&scheduler, "t1", 2, &["h1:1", "h2:1"]);
    create_table(&scheduler, "t2", 2, &["h1:1", "h2:1"]);
    admin.add_group("g1").await.unwrap();
    admin.move_tables(["t1"], "g1").await.unwrap();

    assert_eq!(
        admin.list_tables_of_group(DEFAULT_GROUP).await.unwrap(),
        BTreeSet::from(["t2".to_string()])
    );
    assert_eq!(admin.get_group_info_of_table("t2").await.unwrap().name, DEFAULT_GROUP);

    let groups = admin.list_groups().await.unwrap();
    assert_partitioned(&groups);
    let tables: BTreeSet<String> = groups.iter().flat_map(|g| g.tables.iter().cloned()).collect();
    assert_eq!(tables, BTreeSet::from(["t1".to_string(), "t2".to_string()]));
}
