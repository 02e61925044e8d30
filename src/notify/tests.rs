//! Tests for the notification queue

use super::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn manual_queue() -> (Arc<ManualClock>, NotificationQueue) {
    let clock = Arc::new(ManualClock::at_epoch());
    clock.advance(Duration::from_secs(1_000));
    let queue = NotificationQueue::with_clock(clock.clone(), DEFAULT_TTL);
    (clock, queue)
}

#[test]
fn test_post_is_visible_immediately() {
    let (_clock, queue) = manual_queue();
    let id = queue.post(
        NotificationKind::Success,
        "Saved items loaded",
        Some("214 items".to_string()),
    );

    let live = queue.list();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].position, 0);
    assert_eq!(live[0].notification.id, id);
    assert_eq!(live[0].notification.title, "Saved items loaded");
    assert_eq!(live[0].notification.description.as_deref(), Some("214 items"));
    assert_eq!(queue.pending_timers(), 1);
}

#[test]
fn test_expires_after_ttl() {
    let (clock, queue) = manual_queue();
    queue.post(NotificationKind::Info, "hello", None);

    clock.advance(Duration::from_millis(2_999));
    assert_eq!(queue.list().len(), 1);

    clock.advance(Duration::from_millis(1));
    assert!(queue.list().is_empty());
    assert_eq!(queue.pending_timers(), 0);
}

#[test]
fn test_dismiss_removes_early_and_cancels_timer() {
    let (clock, queue) = manual_queue();
    let keep = queue.post(NotificationKind::Info, "keep", None);
    let drop_me = queue.post(NotificationKind::Warning, "drop", None);

    assert!(queue.dismiss(drop_me));
    assert_eq!(queue.pending_timers(), 1);
    let live = queue.list();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].notification.id, keep);

    clock.advance(DEFAULT_TTL);
    assert_eq!(queue.expire_due(), vec![keep]);
}

#[test]
fn test_dismiss_unknown_is_noop() {
    let (_clock, queue) = manual_queue();
    queue.post(NotificationKind::Info, "x", None);
    assert!(!queue.dismiss(42));
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_ids_are_monotonic_within_same_millisecond() {
    let (_clock, queue) = manual_queue();
    let a = queue.post(NotificationKind::Info, "a", None);
    let b = queue.post(NotificationKind::Info, "b", None);
    let c = queue.post(NotificationKind::Info, "c", None);
    assert!(a < b && b < c);
    // Timestamp-derived
    assert_eq!(a, 1_000_000);
}

#[test]
fn test_positions_follow_insertion_order() {
    let (clock, queue) = manual_queue();
    let first = queue.post(NotificationKind::Loading, "first", None);
    clock.advance(Duration::from_millis(1_000));
    let second = queue.post(NotificationKind::Success, "second", None);
    clock.advance(Duration::from_millis(1_000));
    let third = queue.post(NotificationKind::Error, "third", None);

    let order: Vec<_> = queue
        .list()
        .into_iter()
        .map(|p| (p.position, p.notification.id))
        .collect();
    assert_eq!(order, vec![(0, first), (1, second), (2, third)]);

    // First expires; the others move up
    clock.advance(Duration::from_millis(1_000));
    let order: Vec<_> = queue
        .list()
        .into_iter()
        .map(|p| (p.position, p.notification.id))
        .collect();
    assert_eq!(order, vec![(0, second), (1, third)]);
}

#[test]
fn test_next_deadline_tracks_earliest_timer() {
    let (clock, queue) = manual_queue();
    assert!(queue.next_deadline().is_none());

    let start = clock.now();
    let first = queue.post(NotificationKind::Info, "a", None);
    clock.advance(Duration::from_millis(500));
    queue.post(NotificationKind::Info, "b", None);

    assert_eq!(
        queue.next_deadline(),
        Some(start + chrono::Duration::milliseconds(3_000))
    );

    queue.dismiss(first);
    assert_eq!(
        queue.next_deadline(),
        Some(start + chrono::Duration::milliseconds(3_500))
    );
}

#[test]
fn test_clear_and_get() {
    let (_clock, queue) = manual_queue();
    let id = queue.error("Request failed", "HTTP 503");
    assert_eq!(
        queue.get(id).map(|n| n.kind),
        Some(NotificationKind::Error)
    );

    queue.clear();
    assert!(queue.is_empty());
    assert_eq!(queue.pending_timers(), 0);
    assert!(queue.get(id).is_none());
}

#[test]
fn test_events_are_published() {
    let (clock, queue) = manual_queue();
    let mut rx = queue.subscribe();

    let a = queue.success("a");
    let b = queue.success("b");
    queue.dismiss(a);
    clock.advance(DEFAULT_TTL);
    queue.expire_due();

    assert_eq!(rx.try_recv().unwrap(), QueueEvent::Posted(a));
    assert_eq!(rx.try_recv().unwrap(), QueueEvent::Posted(b));
    assert_eq!(rx.try_recv().unwrap(), QueueEvent::Dismissed(a));
    assert_eq!(rx.try_recv().unwrap(), QueueEvent::Expired(vec![b]));
}

#[test]
fn test_kind_serializes_lowercase() {
    let json = serde_json::to_string(&NotificationKind::Warning).unwrap();
    assert_eq!(json, "\"warning\"");
}

#[tokio::test]
async fn test_reaper_expires_on_system_clock() {
    let queue = Arc::new(NotificationQueue::with_clock(
        Arc::new(SystemClock),
        Duration::from_millis(50),
    ));
    let shutdown = CancellationToken::new();
    let reaper = queue.spawn_reaper(shutdown.clone());

    queue.post(NotificationKind::Info, "short lived", None);
    assert_eq!(queue.len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    // len() does not purge, so only the reaper could have removed it
    assert_eq!(queue.len(), 0);

    shutdown.cancel();
    reaper.await.unwrap();
}

#[tokio::test]
async fn test_reaper_picks_up_later_posts() {
    let queue = Arc::new(NotificationQueue::with_clock(
        Arc::new(SystemClock),
        Duration::from_millis(40),
    ));
    let shutdown = CancellationToken::new();
    let reaper = queue.spawn_reaper(shutdown.clone());

    // Reaper is idle with no deadline; a post must wake it
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.post(NotificationKind::Info, "late", None);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(queue.is_empty());

    shutdown.cancel();
    reaper.await.unwrap();
}
