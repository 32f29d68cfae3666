//! Store adapter behavior: atomic result saves, status-cache ordering,
//! due-monitor selection and cascade deletes.

mod common;

use sea_orm::{EntityTrait, PaginatorTrait};
use time::macros::datetime;

use common::{check, group, member, monitor, test_db};
use uptime_sentinel::entity::types::{CheckStatus, MonitorKind};
use uptime_sentinel::entity::{check_result, monitor_group_member, monitor_last_status};
use uptime_sentinel::error::StoreError;
use uptime_sentinel::store::Store;

#[tokio::test]
async fn save_result_updates_cache_atomically() {
    let db = test_db().await;
    let store = Store::new(db);
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let t1 = datetime!(2026-03-01 00:00:00 UTC);
    store
        .save_result(check(&m, CheckStatus::Down, t1))
        .await
        .unwrap();

    let status = store.status_for(m.id).await.unwrap().unwrap();
    assert_eq!(status.status, CheckStatus::Down);
    assert_eq!(status.last_check, t1);
    assert_eq!(status.message, "Unexpected status code: 500");
}

#[tokio::test]
async fn later_checked_at_wins_regardless_of_arrival_order() {
    let db = test_db().await;
    let store = Store::new(db);
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let earlier = datetime!(2026-03-01 00:00:00 UTC);
    let later = datetime!(2026-03-01 00:00:30 UTC);

    // The slower region's (newer) result lands first.
    store
        .save_result(check(&m, CheckStatus::Up, later))
        .await
        .unwrap();
    store
        .save_result(check(&m, CheckStatus::Down, earlier))
        .await
        .unwrap();

    // Cache reflects the newest checked_at; both rows are persisted.
    let status = store.status_for(m.id).await.unwrap().unwrap();
    assert_eq!(status.status, CheckStatus::Up);
    assert_eq!(status.last_check, later);

    let history = store.history(m.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].checked_at, later);
}

#[tokio::test]
async fn due_monitors_selects_new_and_elapsed() {
    let db = test_db().await;
    let store = Store::new(db);
    let now = datetime!(2026-03-01 12:00:00 UTC);

    // Never checked: due.
    let fresh = monitor(MonitorKind::Http, 60);
    store.insert_monitor(fresh.clone()).await.unwrap();

    // Checked recently: not due.
    let recent = monitor(MonitorKind::Http, 60);
    store.insert_monitor(recent.clone()).await.unwrap();
    store
        .save_result(check(&recent, CheckStatus::Up, now - time::Duration::seconds(10)))
        .await
        .unwrap();

    // Interval elapsed: due.
    let stale = monitor(MonitorKind::Http, 60);
    store.insert_monitor(stale.clone()).await.unwrap();
    store
        .save_result(check(&stale, CheckStatus::Up, now - time::Duration::seconds(120)))
        .await
        .unwrap();

    // Disabled: never due.
    let mut disabled = monitor(MonitorKind::Http, 60);
    disabled.enabled = false;
    store.insert_monitor(disabled.clone()).await.unwrap();

    let due = store.due_monitors(now).await.unwrap();
    let due_ids: Vec<_> = due.iter().map(|m| m.id).collect();
    assert!(due_ids.contains(&fresh.id));
    assert!(due_ids.contains(&stale.id));
    assert!(!due_ids.contains(&recent.id));
    assert!(!due_ids.contains(&disabled.id));
}

#[tokio::test]
async fn deleting_monitor_cascades() {
    let db = test_db().await;
    let store = Store::new(db.clone());
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();
    store
        .save_result(check(&m, CheckStatus::Up, datetime!(2026-03-01 00:00:00 UTC)))
        .await
        .unwrap();

    let g = group(&m.tenant_id);
    store
        .create_group(g.clone(), vec![member(&g, &m, 1.0, true)])
        .await
        .unwrap();

    store.delete_monitor(m.id).await.unwrap();

    assert_eq!(check_result::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(
        monitor_last_status::Entity::find().count(&db).await.unwrap(),
        0
    );
    assert_eq!(
        monitor_group_member::Entity::find().count(&db).await.unwrap(),
        0
    );
    // The group itself survives; only the membership is removed.
    assert!(store.group(g.id).await.unwrap().is_some());
}

#[tokio::test]
async fn group_creation_enforces_weight_invariant() {
    let db = test_db().await;
    let store = Store::new(db);
    let m1 = monitor(MonitorKind::Http, 60);
    let m2 = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m1.clone()).await.unwrap();
    store.insert_monitor(m2.clone()).await.unwrap();

    let g = group(&m1.tenant_id);
    let err = store
        .create_group(
            g.clone(),
            vec![member(&g, &m1, 0.5, false), member(&g, &m2, 0.3, false)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::WeightSum(_)));

    // Nothing was written: the transaction never started.
    assert!(store.group(g.id).await.unwrap().is_none());

    store
        .create_group(
            g.clone(),
            vec![member(&g, &m1, 0.6, false), member(&g, &m2, 0.4, false)],
        )
        .await
        .unwrap();
    assert_eq!(store.group_members(g.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn groups_for_monitor_resolves_memberships() {
    let db = test_db().await;
    let store = Store::new(db);
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let g1 = group(&m.tenant_id);
    store
        .create_group(g1.clone(), vec![member(&g1, &m, 1.0, false)])
        .await
        .unwrap();

    let mut g2 = group(&m.tenant_id);
    g2.enabled = false;
    store
        .create_group(g2.clone(), vec![member(&g2, &m, 1.0, false)])
        .await
        .unwrap();

    let groups = store.groups_for_monitor(m.id).await.unwrap();
    let ids: Vec<_> = groups.iter().map(|g| g.id).collect();
    assert!(ids.contains(&g1.id));
    // Disabled groups are not refreshed at fan-out.
    assert!(!ids.contains(&g2.id));
}
