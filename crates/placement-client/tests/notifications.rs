mod common;

use std::time::Duration;

use placement_shared::SubjectId;

use common::{client_for, client_polling_every, start_backend, SUBJECT};

/// Long enough that only the immediate first poll runs during a test.
const ONE_POLL: Duration = Duration::from_secs(3600);

async fn create(server: &common::TestBackend, count: usize) {
    for i in 0..count {
        server
            .backend
            .create_notification(SubjectId::from(SUBJECT), format!("Update {i}"), String::new())
            .await;
    }
}

#[tokio::test]
async fn test_badge_follows_polled_count() {
    let server = start_backend().await;
    create(&server, 7).await;
    let state = client_for(&server);

    let mut center = state.notification_center().unwrap();
    let count = tokio::time::timeout(Duration::from_secs(2), center.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(count, 7);
    assert_eq!(center.badge().as_deref(), Some("7"));

    create(&server, 113).await;
    let mut seen = 0;
    for _ in 0..20 {
        seen = tokio::time::timeout(Duration::from_secs(2), center.changed())
            .await
            .unwrap()
            .unwrap();
        if seen == 120 {
            break;
        }
    }
    assert_eq!(seen, 120);
    assert_eq!(center.badge().as_deref(), Some("99+"));
}

#[tokio::test]
async fn test_mark_all_read_zeroes_the_badge() {
    let server = start_backend().await;
    create(&server, 5).await;
    let state = client_polling_every(&server, ONE_POLL);

    let mut center = state.notification_center().unwrap();
    center.changed().await.unwrap();
    assert_eq!(center.unread(), 5);

    center.mark_all_read().await.unwrap();
    assert_eq!(center.unread(), 0);
    assert_eq!(center.badge(), None);
    assert_eq!(server.backend.unread_count(&SubjectId::from(SUBJECT)).await, 0);
}

#[tokio::test]
async fn test_expand_and_mark_one_read() {
    let server = start_backend().await;
    create(&server, 3).await;
    let state = client_polling_every(&server, ONE_POLL);

    let mut center = state.notification_center().unwrap();
    center.changed().await.unwrap();

    let items = center.expand().await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|n| !n.read));
    let id = items[0].id.clone();
    assert!(center.is_expanded());

    center.mark_read(&id).await.unwrap();
    assert_eq!(center.unread(), 2);
    assert!(center.items().iter().find(|n| n.id == id).unwrap().read);
    assert_eq!(server.backend.unread_count(&SubjectId::from(SUBJECT)).await, 2);
}

#[tokio::test]
async fn test_one_poller_per_subject_released_on_drop() {
    let server = start_backend().await;
    let state = client_for(&server);

    let first = state.notification_center().unwrap();
    let second = state.notification_center().unwrap();
    assert_eq!(state.notifications.active_pollers(), 1);

    drop(first);
    assert_eq!(state.notifications.active_pollers(), 1);

    drop(second);
    assert_eq!(state.notifications.active_pollers(), 0);
}

#[tokio::test]
async fn test_mount_requires_login() {
    let server = start_backend().await;
    let state = client_for(&server);
    state.session.logout().unwrap();

    assert!(state.notification_center().is_err());
    assert_eq!(state.notifications.active_pollers(), 0);
}
