use super::*;

#[test]
fn test_checkpoint_scheduler() {
    let start = Instant::now();
    let interval = Duration::from_secs(2);
    let mut scheduler = CheckpointScheduler::new(interval, start);
    assert_eq!(scheduler.poll_timeout(), start + interval);

    assert_eq!(scheduler.handle_timeout(start + Duration::from_secs(1)), None);
    assert_eq!(
        scheduler.handle_timeout(start + interval),
        Some(CheckpointTrigger::Timer)
    );
    assert_eq!(scheduler.poll_timeout(), start + interval * 2);

    // a late wakeup does not replay the missed periods
    let late = start + Duration::from_secs(11);
    assert_eq!(scheduler.handle_timeout(late), Some(CheckpointTrigger::Timer));
    assert_eq!(scheduler.handle_timeout(late), None);
    assert_eq!(scheduler.poll_timeout(), late + interval);
}

#[test]
fn test_checkpoint_health() {
    let mut health = CheckpointHealth::default();
    assert!(health.is_healthy());

    assert_eq!(health.record_failure("disk full".to_owned()), 1);
    assert_eq!(health.record_failure("disk full".to_owned()), 2);
    assert!(!health.is_healthy());
    assert_eq!(health.last_error.as_deref(), Some("disk full"));

    let now = SystemTime::now();
    health.record_success(now);
    assert!(health.is_healthy());
    assert_eq!(health.last_success, Some(now));
    assert_eq!(health.checkpoints, 3);
    assert_eq!(
        health.last_error.as_deref(),
        Some("disk full"),
        "last error is kept for inspection"
    );
}
