mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{MemoryRepository, RecordingCalendar, draft, scheduler};
use shelter_core::{DeleteOutcome, SchedulerBridge, SchedulerUpdate, SchedulerUpdateKind};

fn wait_for_update(bridge: &SchedulerBridge) -> SchedulerUpdate {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let mut received = None;
        bridge.poll_updates(|update| received = Some(update));
        if let Some(update) = received {
            return update;
        }
        assert!(Instant::now() < deadline, "no update within five seconds");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn submitted_work_reports_back_through_polling() {
    let repo = MemoryRepository::new();
    let calendar = RecordingCalendar::succeeding("E1");
    let bridge = SchedulerBridge::new(scheduler(repo.clone(), calendar.clone())).unwrap();

    let create_request = bridge.submit_create(draft());
    let update = wait_for_update(&bridge);
    assert_eq!(update.request_id, create_request);
    let record = match update.kind {
        SchedulerUpdateKind::Created(Ok(outcome)) => outcome.record,
        other => panic!("unexpected update: {other:?}"),
    };
    assert_eq!(record.external_event_ref.as_deref(), Some("E1"));

    let delete_request = bridge.submit_delete(record.id);
    assert_ne!(delete_request, create_request);
    let update = wait_for_update(&bridge);
    assert_eq!(update.request_id, delete_request);
    assert!(matches!(
        update.kind,
        SchedulerUpdateKind::Deleted(Ok(DeleteOutcome::Deleted { .. }))
    ));
    assert!(!repo.contains(record.id));
    assert_eq!(calendar.deleted_ids(), vec!["E1".to_string()]);
}

#[test]
fn polling_without_work_does_not_block() {
    let bridge =
        SchedulerBridge::new(scheduler(MemoryRepository::new(), RecordingCalendar::failing()))
            .unwrap();

    let started = Instant::now();
    let mut seen = 0;
    bridge.poll_updates(|_| seen += 1);

    assert_eq!(seen, 0);
    assert!(started.elapsed() < Duration::from_secs(1));
}
