mod common;

use common::{
    Calls, InstrumentedStore, destination_action, sample_monitor, seed_destination,
    throttled_action,
};
use jobstore::{DocumentStore, SeqNoPrimaryTerm};
use monitors::admission::{
    Admission, AdmissionError, ErrorKind, SCHEDULED_JOBS_INDEX, SCHEMA_VERSION,
};
use monitors::model::document::monitor_from_source;
use monitors::model::{
    Monitor, MonitorInput, MonitorRequest, ResponseStatus, SearchInput, ThrottleUnit,
};
use monitors::settings::{LiveSettings, SettingsHandle};
use std::sync::Arc;
use std::time::Duration;

fn admission_with(settings: LiveSettings) -> (Arc<InstrumentedStore>, Admission) {
    let store = Arc::new(InstrumentedStore::new());
    let admission = Admission::new(store.clone(), SettingsHandle::new(settings));
    (store, admission)
}

fn admission() -> (Arc<InstrumentedStore>, Admission) {
    admission_with(LiveSettings::default())
}

fn plain_monitor(name: &str) -> Monitor {
    sample_monitor(
        name,
        vec![throttled_action("page", 10, ThrottleUnit::Minutes)],
    )
}

#[tokio::test]
async fn capacity_reached_rejects_create_without_writing() {
    let (store, admission) = admission_with(LiveSettings {
        max_monitors: 5,
        ..LiveSettings::default()
    });
    store.faults(|faults| faults.count_override = Some(5));

    let err = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect_err("quota");
    assert!(matches!(
        err,
        AdmissionError::CapacityExceeded { max_monitors: 5 }
    ));
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert!(err.to_string().contains('5'));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn capacity_is_not_checked_on_update() {
    let (store, admission) = admission_with(LiveSettings {
        max_monitors: 1,
        ..LiveSettings::default()
    });
    let created = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create");
    store.faults(|faults| faults.count_override = Some(1));
    let counts_before = Calls::of(&store.calls.count);

    admission
        .admit(MonitorRequest::update(
            created.id,
            plain_monitor("cpu-renamed"),
        ))
        .await
        .expect("update at capacity");
    assert_eq!(Calls::of(&store.calls.count), counts_before);
}

#[tokio::test]
async fn throttle_above_ceiling_fails_before_write() {
    let (store, admission) = admission_with(LiveSettings {
        max_action_throttle: Duration::from_secs(60 * 60),
        ..LiveSettings::default()
    });
    let monitor = sample_monitor(
        "cpu",
        vec![throttled_action("page", 90, ThrottleUnit::Minutes)],
    );

    let err = admission
        .admit(MonitorRequest::create(monitor.clone()))
        .await
        .expect_err("create throttle");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = admission
        .admit(MonitorRequest::update("m1", monitor))
        .await
        .expect_err("update throttle");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn throttle_below_floor_fails_before_provisioning() {
    let (store, admission) = admission();
    let monitor = sample_monitor(
        "cpu",
        vec![throttled_action("page", 30, ThrottleUnit::Seconds)],
    );
    let err = admission
        .admit(MonitorRequest::create(monitor))
        .await
        .expect_err("floor");
    assert_eq!(
        err.to_string(),
        "Can only set throttle period greater than or equal to 1 minute"
    );
    assert_eq!(store.writes(), 0);
    assert_eq!(store.provisioning_calls(), 0);
    assert_eq!(Calls::of(&store.calls.index_exists), 0);
}

#[tokio::test]
async fn stale_revision_is_a_conflict_and_keeps_stored_monitor() {
    let (store, admission) = admission();
    let created = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create");
    let stale = SeqNoPrimaryTerm::new(created.seq_no, created.primary_term);
    let first = MonitorRequest::update(created.id.clone(), plain_monitor("cpu-v2"))
        .with_revision(stale);
    admission.admit(first).await.expect("first update");

    let second = MonitorRequest::update(created.id.clone(), plain_monitor("cpu-v3"))
        .with_revision(stale);
    let err = admission.admit(second).await.expect_err("stale");
    assert!(err.is_version_conflict());
    assert_eq!(err.kind(), ErrorKind::Internal);

    let stored = store
        .inner()
        .get(SCHEDULED_JOBS_INDEX, &created.id)
        .await
        .expect("get")
        .expect("document");
    let monitor = monitor_from_source(&stored.source).expect("parse");
    assert_eq!(monitor.name, "cpu-v2");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn disallowed_destination_type_is_forbidden() {
    let (store, admission) = admission_with(LiveSettings {
        destination_allow_list: ["email".to_string()].into_iter().collect(),
        ..LiveSettings::default()
    });
    seed_destination(store.inner(), "team-email", "email").await;
    seed_destination(store.inner(), "team-chat", "slack").await;
    let writes_before = store.writes();

    let monitor = sample_monitor(
        "cpu",
        vec![
            destination_action("mail", "team-email"),
            destination_action("chat", "team-chat"),
        ],
    );
    let err = admission
        .admit(MonitorRequest::create(monitor))
        .await
        .expect_err("slack");
    match &err {
        AdmissionError::Forbidden { resource, message } => {
            assert_eq!(resource, "slack");
            assert!(message.contains("slack"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.writes(), writes_before);
}

#[tokio::test]
async fn every_referenced_destination_is_fetched_once() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;
    seed_destination(store.inner(), "d2", "chime").await;
    let monitor = sample_monitor(
        "cpu",
        vec![
            destination_action("a", "d1"),
            destination_action("b", "d2"),
            destination_action("c", "d1"),
            destination_action("d", ""),
        ],
    );
    admission
        .admit(MonitorRequest::create(monitor))
        .await
        .expect("allowed");
    assert_eq!(Calls::of(&store.calls.get), 2);
}

#[tokio::test]
async fn destination_lookup_failure_fails_the_request() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;
    store.faults(|faults| {
        faults.failing_gets.insert("d1".to_string());
    });
    let err = admission
        .admit(MonitorRequest::create(sample_monitor(
            "cpu",
            vec![destination_action("a", "d1")],
        )))
        .await
        .expect_err("lookup failure");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("shard unavailable"), "{err}");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn missing_destination_is_not_found() {
    let (store, admission) = admission();
    let err = admission
        .admit(MonitorRequest::create(sample_monitor(
            "cpu",
            vec![destination_action("a", "ghost")],
        )))
        .await
        .expect_err("missing destination");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn first_create_provisions_index_once() {
    let (store, admission) = admission();
    let created = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create");
    assert_eq!(created.status, ResponseStatus::Created);
    assert_eq!(created.monitor.schema_version, SCHEMA_VERSION);
    assert_eq!(Calls::of(&store.calls.create_index), 1);
    assert!(admission.index_state().is_ready());

    admission
        .admit(MonitorRequest::create(plain_monitor("mem")))
        .await
        .expect("second create");
    assert_eq!(Calls::of(&store.calls.create_index), 1);
    assert_eq!(Calls::of(&store.calls.put_mapping), 0);
    assert_eq!(store.inner().document_count(SCHEDULED_JOBS_INDEX).await, 2);
}

#[tokio::test]
async fn concurrent_first_creates_race_on_provisioning() {
    let (store, admission) = admission();
    store.faults(|faults| faults.create_delay = Some(Duration::from_millis(50)));

    let first = admission.clone();
    let second = admission.clone();
    let (a, b) = tokio::join!(
        first.admit(MonitorRequest::create(plain_monitor("cpu"))),
        second.admit(MonitorRequest::create(plain_monitor("mem"))),
    );
    let a = a.expect("first");
    let b = b.expect("second");
    assert_ne!(a.id, b.id);
    assert_eq!(Calls::of(&store.calls.create_index), 2);
    assert!(Calls::of(&store.calls.put_mapping) <= 1);
    assert!(admission.index_state().is_ready());
    assert_eq!(store.inner().document_count(SCHEDULED_JOBS_INDEX).await, 2);

    let provisioning = store.provisioning_calls();
    admission
        .admit(MonitorRequest::create(plain_monitor("disk")))
        .await
        .expect("third");
    assert_eq!(store.provisioning_calls(), provisioning);
}

#[tokio::test]
async fn preexisting_index_gets_one_mapping_update() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;

    admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create");
    admission
        .admit(MonitorRequest::create(plain_monitor("mem")))
        .await
        .expect("create again");
    assert_eq!(Calls::of(&store.calls.create_index), 0);
    assert_eq!(Calls::of(&store.calls.put_mapping), 1);
    let mapping = store
        .inner()
        .mapping(SCHEDULED_JOBS_INDEX)
        .await
        .expect("mapping");
    assert_eq!(mapping.schema_version, SCHEMA_VERSION);
}

#[tokio::test]
async fn unacknowledged_create_is_internal() {
    let (store, admission) = admission();
    store.faults(|faults| faults.unacknowledged_create = true);
    let err = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect_err("not acknowledged");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("not acknowledged"), "{err}");
    assert!(!admission.index_state().is_ready());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn failed_create_leaves_index_unprovisioned() {
    let (store, admission) = admission();
    store.faults(|faults| faults.failing_create = true);
    let err = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect_err("create rejected");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("cluster block"), "{err}");
    assert!(!admission.index_state().is_ready());
    assert_eq!(store.writes(), 0);
    let exists = store
        .inner()
        .index_exists(SCHEDULED_JOBS_INDEX)
        .await
        .expect("exists");
    assert!(!exists);
}

#[tokio::test]
async fn unacknowledged_mapping_update_is_internal() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;
    store.faults(|faults| faults.unacknowledged_mapping = true);

    let err = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect_err("not acknowledged");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(
        err.to_string(),
        "Update .scheduled-jobs mappings call not acknowledged."
    );
    assert!(!admission.index_state().is_ready());
    assert_eq!(Calls::of(&store.calls.put_mapping), 1);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn failed_mapping_update_is_retried_by_the_next_request() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;
    store.faults(|faults| faults.failing_mapping = true);

    let err = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect_err("mapping rejected");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("mapper conflict"), "{err}");
    assert!(!admission.index_state().is_ready());
    assert_eq!(store.writes(), 0);

    store.faults(|faults| faults.failing_mapping = false);
    admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create after recovery");
    assert!(admission.index_state().is_ready());
    assert_eq!(Calls::of(&store.calls.put_mapping), 2);
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn enabled_time_survives_update_of_enabled_monitor() {
    let (_store, admission) = admission();
    let created = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create");

    let mut touched = plain_monitor("cpu");
    touched.enabled_time = Some(1_800_000_000_000);
    let updated = admission
        .admit(MonitorRequest::update(created.id, touched))
        .await
        .expect("update");
    assert_eq!(updated.monitor.enabled_time, Some(1_700_000_000_000));
}

#[tokio::test]
async fn enabled_time_follows_caller_when_either_side_is_disabled() {
    let (_store, admission) = admission();
    let mut disabled = plain_monitor("cpu");
    disabled.enabled = false;
    disabled.enabled_time = None;
    let created = admission
        .admit(MonitorRequest::create(disabled))
        .await
        .expect("create disabled");

    let mut enabled = plain_monitor("cpu");
    enabled.enabled_time = Some(1_800_000_000_000);
    let updated = admission
        .admit(MonitorRequest::update(created.id.clone(), enabled))
        .await
        .expect("enable");
    assert_eq!(updated.monitor.enabled_time, Some(1_800_000_000_000));

    let mut disabling = plain_monitor("cpu");
    disabling.enabled = false;
    disabling.enabled_time = None;
    let updated = admission
        .admit(MonitorRequest::update(created.id, disabling))
        .await
        .expect("disable");
    assert_eq!(updated.monitor.enabled_time, None);
}

#[tokio::test]
async fn created_monitor_round_trips_through_the_store() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;
    let monitor = sample_monitor(
        "cpu",
        vec![
            throttled_action("page", 2, ThrottleUnit::Hours),
            destination_action("mail", "d1"),
        ],
    );
    let created = admission
        .admit(MonitorRequest::create(monitor.clone()))
        .await
        .expect("create");
    let stored = store
        .inner()
        .get(SCHEDULED_JOBS_INDEX, &created.id)
        .await
        .expect("get")
        .expect("document");
    let parsed = monitor_from_source(&stored.source).expect("parse");
    assert_eq!(parsed.triggers, monitor.triggers);
    assert_eq!(parsed.schema_version, SCHEMA_VERSION);
    assert_eq!(parsed, created.monitor);
}

#[tokio::test]
async fn shard_failures_fail_the_write() {
    let (store, admission) = admission();
    store.faults(|faults| {
        faults.shard_failures = vec!["disk full".to_string(), "node left".to_string()];
    });
    let err = admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect_err("partial write");
    match &err {
        AdmissionError::PartialWrite(reasons) => assert_eq!(reasons, "disk full; node left"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn unreadable_source_index_is_forbidden_before_any_mutation() {
    let (store, admission) = admission();
    store.faults(|faults| {
        faults.denied_indices.insert("payroll".to_string());
    });
    let mut monitor = plain_monitor("cpu");
    monitor.inputs = vec![
        MonitorInput::Search(SearchInput {
            indices: vec!["logs-*".to_string()],
            query: serde_json::json!({"size": 0}),
        }),
        MonitorInput::Search(SearchInput {
            indices: vec!["payroll".to_string(), "hr".to_string()],
            query: serde_json::json!({"size": 0}),
        }),
    ];
    let err = admission
        .admit(MonitorRequest::create(monitor))
        .await
        .expect_err("forbidden");
    match &err {
        AdmissionError::Forbidden { resource, .. } => assert_eq!(resource, "payroll,hr"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(Calls::of(&store.calls.probe), 2);
    assert_eq!(store.provisioning_calls(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn request_timeout_override_bounds_reads() {
    let (store, admission) = admission();
    seed_destination(store.inner(), "d1", "email").await;
    store.faults(|faults| faults.get_delay = Some(Duration::from_millis(200)));
    let err = admission
        .admit(
            MonitorRequest::create(sample_monitor("cpu", vec![destination_action("a", "d1")]))
                .with_timeout(Some(Duration::from_millis(10))),
        )
        .await
        .expect_err("timeout");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("did not complete"), "{err}");
}

#[tokio::test]
async fn settings_changes_apply_to_later_requests() {
    let (_store, admission) = admission();
    admission
        .admit(MonitorRequest::create(plain_monitor("cpu")))
        .await
        .expect("create");

    admission
        .settings()
        .update(|settings| settings.max_monitors = 1);
    let err = admission
        .admit(MonitorRequest::create(plain_monitor("mem")))
        .await
        .expect_err("quota lowered");
    assert!(matches!(
        err,
        AdmissionError::CapacityExceeded { max_monitors: 1 }
    ));
}
