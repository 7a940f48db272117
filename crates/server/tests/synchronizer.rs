//! Ordering and failure-handling tests for label synchronization.

use std::sync::Arc;

use texter_core::{
    DVec3, Label, LabelError, Lifecycle, LocalEntityCounter, Mutation, SessionId, WorldRef,
};
use texter_net::ServerMessage;
use texter_server::{CommitOutcome, SendType, SyncPolicy, Synchronizer, WorldSessions};
use texter_testkit::{is_add, FlakyStore, Journal, JournalEntry, RecordingTransport, StoreOp};

type TestSync = Synchronizer<FlakyStore, WorldSessions, RecordingTransport>;

const ALICE: SessionId = SessionId(1);
const BOB: SessionId = SessionId(2);
const CAROL: SessionId = SessionId(3);

struct Harness {
    journal: Journal,
    sync: TestSync,
    overworld: WorldRef,
    nether: WorldRef,
}

fn harness_with(policy: SyncPolicy) -> Harness {
    let journal = Journal::new();
    let mut sessions = WorldSessions::new();
    let overworld = sessions.load_world("world");
    let nether = sessions.load_world("nether");
    sessions.join(ALICE, overworld.id());
    sessions.join(BOB, nether.id());

    let sync = Synchronizer::new(
        journal.store(),
        sessions,
        journal.transport(),
        Arc::new(LocalEntityCounter::default()),
    )
    .with_policy(policy);

    Harness {
        journal,
        sync,
        overworld,
        nether,
    }
}

fn harness() -> Harness {
    harness_with(SyncPolicy::default())
}

impl Harness {
    fn spawn(&mut self) -> Label {
        let label = self.sync.create(
            self.overworld.clone(),
            DVec3::new(1.0, 2.0, 3.0),
            "Shop",
            "Open#daily",
        );
        self.journal.clear();
        label
    }

    /// Compact, ordered view of the journal.
    fn trace(&self) -> Vec<String> {
        self.journal
            .entries()
            .into_iter()
            .map(|entry| match entry {
                JournalEntry::Stored { op, entity_id, ok } => {
                    let op = match op {
                        StoreOp::Insert => "insert",
                        StoreOp::Upsert => "upsert",
                        StoreOp::Delete => "delete",
                    };
                    format!("{op} {entity_id} {}", if ok { "ok" } else { "err" })
                }
                JournalEntry::Delivered { session, message } => {
                    let kind = match message {
                        ServerMessage::AddEntity(_) => "add",
                        ServerMessage::RemoveEntity(_) => "remove",
                    };
                    format!("{kind} {} -> {session}", message.entity_id())
                }
            })
            .collect()
    }
}

#[test]
fn create_persists_before_announcing() {
    let mut h = harness();
    let label = h.sync.create(h.overworld.clone(), DVec3::ZERO, "Hi", "");

    assert_eq!(label.lifecycle(), Lifecycle::Active);
    assert!(!label.failed());
    assert_eq!(h.trace(), ["insert 1 ok", "add 1 -> session-1"]);
}

#[test]
fn failed_create_is_never_announced() {
    let mut h = harness();
    h.sync.store_mut().fail_writes(true);
    let mut label = h.sync.create(h.overworld.clone(), DVec3::ZERO, "Hi", "");

    assert!(label.failed());
    assert_eq!(label.lifecycle(), Lifecycle::Failed);
    assert_eq!(h.trace(), ["insert 1 err"]);

    h.sync.bind(&mut label).set_z(9);
    assert_eq!(h.journal.add_count(), 0);
    assert_eq!(label.z(), 0.0);

    h.sync.store_mut().fail_writes(false);
    h.journal.clear();
    h.sync.bind(&mut label).set_title("Later");
    assert_eq!(label.lifecycle(), Lifecycle::Active);
    assert!(label.failed());
    assert_eq!(h.trace(), ["upsert 1 ok", "add 1 -> session-1"]);
}

#[test]
fn coordinate_change_commits_then_broadcasts() {
    let mut h = harness();
    let mut label = h.spawn();

    let outcome = h.sync.mutate(&mut label, Mutation::Y(64.25)).unwrap();
    assert!(outcome.is_committed());
    assert_eq!(h.trace(), ["upsert 1 ok", "add 1 -> session-1"]);

    let record = h.sync.store().records().get(1).unwrap();
    assert_eq!(record.y, 64.25);
    match &h.journal.delivered_to(ALICE)[0] {
        ServerMessage::AddEntity(add) => assert_eq!(add.y, 64.3),
        other => panic!("expected add, got {other:?}"),
    }
}

#[test]
fn coordinate_rollback_restores_and_stays_silent() {
    let mut h = harness();
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    let outcome = h.sync.mutate(&mut label, Mutation::X(50.0)).unwrap();
    assert!(matches!(
        outcome,
        CommitOutcome::RolledBack(LabelError::PersistenceFailure { entity_id: 1, .. })
    ));
    assert_eq!(label.x(), 1.0);
    assert_eq!(h.trace(), ["upsert 1 err"]);
    assert_eq!(h.sync.store().records().get(1).unwrap().x, 1.0);
}

#[test]
fn y_rollback_restores_previous_value() {
    let mut h = harness();
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    h.sync.bind(&mut label).set_y(-12);

    assert_eq!(label.y(), 2.0);
    assert_eq!(h.trace(), ["upsert 1 err"]);
    assert_eq!(h.sync.store().records().get(1).unwrap().y, 2.0);
}

#[test]
fn position_commits_all_axes_together() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync.bind(&mut label).set_position(DVec3::new(-4.04, 80.0, 7.26));

    assert_eq!(label.position(), DVec3::new(-4.04, 80.0, 7.26));
    assert_eq!(h.trace(), ["upsert 1 ok", "add 1 -> session-1"]);
    let record = h.sync.store().records().get(1).unwrap();
    assert_eq!((record.x, record.y, record.z), (-4.04, 80.0, 7.26));
    match &h.journal.delivered_to(ALICE)[0] {
        ServerMessage::AddEntity(add) => assert_eq!((add.x, add.y, add.z), (-4.0, 80.0, 7.3)),
        other => panic!("expected add, got {other:?}"),
    }
}

#[test]
fn position_rollback_restores_every_axis() {
    let mut h = harness();
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    let outcome = h
        .sync
        .mutate(&mut label, Mutation::Position(DVec3::new(9.0, 9.0, 9.0)))
        .unwrap();

    assert!(matches!(outcome, CommitOutcome::RolledBack(_)));
    assert_eq!(label.position(), DVec3::new(1.0, 2.0, 3.0));
    assert_eq!(h.journal.add_count(), 0);
}

#[test]
fn repeated_title_with_marker_is_stable() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync.bind(&mut label).set_title("a#b").set_title("a#b");

    assert_eq!(label.title(), "a\nb");
    assert_eq!(h.sync.store().records().get(1).unwrap().title, "a\nb");
    let adds = h.journal.delivered_to(ALICE);
    assert_eq!(adds.len(), 2);
    assert_eq!(adds[0], adds[1]);
}

#[test]
fn oversized_text_is_rejected_at_stage() {
    let mut h = harness();
    let mut label = h.spawn();

    let err = h
        .sync
        .stage(&label, Mutation::Text("y".repeat(9000)))
        .unwrap_err();
    assert_eq!(err, LabelError::ValidationRejected { field: "text" });

    h.sync.bind(&mut label).set_title(&"z".repeat(9000));
    assert_eq!(label.title(), "Shop");
    assert!(h.journal.entries().is_empty());
}

#[test]
fn oversized_label_is_never_persisted() {
    let mut h = harness();
    let label = h
        .sync
        .create(h.overworld.clone(), DVec3::ZERO, &"t".repeat(9000), "");

    assert!(label.failed());
    assert_eq!(label.lifecycle(), Lifecycle::Failed);
    assert!(h.journal.entries().is_empty());
}

#[test]
fn best_effort_title_keeps_value_and_broadcasts() {
    let mut h = harness();
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    let outcome = h
        .sync
        .mutate(&mut label, Mutation::Title("Closed#Sorry".into()))
        .unwrap();
    assert!(matches!(outcome, CommitOutcome::Unpersisted(_)));
    assert_eq!(label.title(), "Closed\nSorry");
    assert_eq!(h.trace(), ["upsert 1 err", "add 1 -> session-1"]);

    match &h.journal.delivered_to(ALICE)[0] {
        ServerMessage::AddEntity(add) => {
            assert_eq!(add.nametag(), Some("Closed\nSorry\u{a7}r\u{a7}f\nOpen\ndaily"));
        }
        other => panic!("expected add, got {other:?}"),
    }
}

#[test]
fn configured_policy_overrides_default() {
    let policy = SyncPolicy::default()
        .with_failure_policy(texter_core::Field::Title, texter_server::FailurePolicy::Rollback);
    let mut h = harness_with(policy);
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    h.sync.bind(&mut label).set_title("Nope");
    assert_eq!(label.title(), "Shop");
    assert_eq!(h.journal.add_count(), 0);
}

#[test]
fn chained_setters_apply_in_order() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync
        .bind(&mut label)
        .set_x("12.5")
        .set_y(70u8)
        .set_title("A#B")
        .set_invisible(true);

    assert_eq!(label.position(), DVec3::new(12.5, 70.0, 3.0));
    assert_eq!(label.title(), "A\nB");
    assert!(label.is_invisible());
    assert_eq!(h.journal.add_count(), 4);
    assert!(h.sync.store().records().get(1).unwrap().invisible);
}

#[test]
fn non_numeric_coordinate_is_a_no_op() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync.bind(&mut label).set_x("north").set_y(f64::NAN).set_z(None::<i32>);

    assert_eq!(label.position(), DVec3::new(1.0, 2.0, 3.0));
    assert!(h.journal.entries().is_empty());
}

#[test]
fn stage_rejects_non_finite_values() {
    let h = harness();
    let label = Label::new(h.overworld.clone(), DVec3::ZERO, "", "", 9);

    let err = h.sync.stage(&label, Mutation::X(f64::INFINITY)).unwrap_err();
    assert_eq!(err, LabelError::ValidationRejected { field: "x" });
    let err = h
        .sync
        .stage(&label, Mutation::Position(DVec3::new(0.0, f64::NAN, 0.0)))
        .unwrap_err();
    assert_eq!(err, LabelError::ValidationRejected { field: "position" });
}

#[test]
fn stage_normalizes_text() {
    let h = harness();
    let label = Label::new(h.overworld.clone(), DVec3::ZERO, "", "", 9);

    let change = h.sync.stage(&label, Mutation::Text("a#b".into())).unwrap();
    assert_eq!(change.mutation(), &Mutation::Text("a\nb".into()));
    assert_eq!(change.policy(), texter_server::FailurePolicy::BestEffort);
}

#[test]
fn remove_deletes_before_delivering() {
    let mut h = harness();
    let mut label = h.spawn();

    assert!(h.sync.remove(&mut label));
    assert_eq!(h.trace(), ["delete 1 ok", "remove 1 -> session-1"]);
    assert_eq!(label.lifecycle(), Lifecycle::Removed);
    assert!(h.sync.store().records().get(1).is_none());

    let err = h.sync.stage(&label, Mutation::X(0.0)).unwrap_err();
    assert_eq!(err, LabelError::Removed(1));
}

#[test]
fn remove_reports_failed_delete() {
    let mut h = harness();
    let mut label = h.spawn();
    h.sync.store_mut().fail_deletes(true);

    assert!(!h.sync.remove(&mut label));
    assert_eq!(h.trace(), ["delete 1 err", "remove 1 -> session-1"]);
}

#[test]
fn world_move_removes_then_persists_then_adds() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync.bind(&mut label).set_world(h.nether.clone());

    assert_eq!(
        h.trace(),
        [
            "delete 1 ok",
            "remove 1 -> session-1",
            "upsert 1 ok",
            "add 1 -> session-2",
        ]
    );
    assert_eq!(label.world(), &h.nether);
    assert_eq!(label.lifecycle(), Lifecycle::Active);
    assert_eq!(h.sync.store().records().get(1).unwrap().world, "nether");
}

#[test]
fn world_move_clears_every_old_observer_first() {
    let mut h = harness();
    h.sync.observers_mut().join(CAROL, h.overworld.id());
    let mut label = h.spawn();

    h.sync.bind(&mut label).set_world(h.nether.clone());

    assert_eq!(
        h.trace(),
        [
            "delete 1 ok",
            "remove 1 -> session-1",
            "remove 1 -> session-3",
            "upsert 1 ok",
            "add 1 -> session-2",
        ]
    );
    assert!(h.journal.delivered_to(CAROL).iter().all(|m| !is_add(m)));
}

#[test]
fn failed_label_moves_without_a_stray_remove() {
    let mut h = harness();
    h.sync.store_mut().fail_writes(true);
    let mut label = h.sync.create(h.overworld.clone(), DVec3::ZERO, "Hi", "");
    h.sync.store_mut().fail_writes(false);
    h.journal.clear();

    h.sync.bind(&mut label).set_world(h.nether.clone());

    assert_eq!(h.trace(), ["delete 1 ok", "upsert 1 ok", "add 1 -> session-2"]);
    assert_eq!(label.lifecycle(), Lifecycle::Active);
    assert_eq!(h.journal.remove_count(), 0);
}

#[test]
fn world_rollback_rebroadcasts_to_old_world() {
    let mut h = harness();
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    let outcome = h
        .sync
        .mutate(&mut label, Mutation::World(h.nether.clone()))
        .unwrap();

    assert!(matches!(outcome, CommitOutcome::RolledBack(_)));
    assert_eq!(label.world(), &h.overworld);
    assert_eq!(label.lifecycle(), Lifecycle::Active);
    assert_eq!(
        h.trace(),
        [
            "delete 1 ok",
            "remove 1 -> session-1",
            "upsert 1 err",
            "add 1 -> session-1",
        ]
    );
    // The delete already went through; only memory was restored.
    assert!(h.sync.store().records().get(1).is_none());
}

#[test]
fn world_rollback_without_rebroadcast_leaves_label_removed() {
    let mut h = harness_with(SyncPolicy::default().with_rebroadcast_after_world_rollback(false));
    let mut label = h.spawn();
    h.sync.store_mut().fail_writes(true);

    h.sync.bind(&mut label).set_world(h.nether.clone());

    assert_eq!(label.world(), &h.overworld);
    assert_eq!(label.lifecycle(), Lifecycle::Removed);
    assert_eq!(h.journal.add_count(), 0);
    assert_eq!(h.journal.remove_count(), 1);
}

#[test]
fn entity_id_change_retires_old_identity() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync.bind(&mut label).set_entity_id(500);

    assert_eq!(label.entity_id(), 500);
    assert_eq!(
        h.trace(),
        [
            "delete 1 ok",
            "remove 1 -> session-1",
            "upsert 500 ok",
            "add 500 -> session-1",
        ]
    );
    assert!(h.sync.store().records().get(1).is_none());
    assert!(h.sync.store().records().get(500).is_some());
}

#[test]
fn unresolved_world_name_only_resends() {
    let mut h = harness();
    let mut label = h.spawn();

    let err = h.sync.relocate_by_name(&mut label, "the_end").unwrap_err();
    assert_eq!(err, LabelError::UnresolvedWorldReference("the_end".into()));
    assert_eq!(label.world(), &h.overworld);
    assert_eq!(h.trace(), ["add 1 -> session-1"]);

    h.journal.clear();
    h.sync.bind(&mut label).set_world_by_name("nether");
    assert_eq!(label.world(), &h.nether);
    assert_eq!(h.journal.delivered_to(BOB).len(), 1);
}

#[test]
fn unknown_send_code_delivers_nothing() {
    let mut h = harness();
    let label = h.spawn();

    assert!(!h.sync.send_code(&label, 7, &[ALICE, BOB]));
    assert!(h.journal.entries().is_empty());

    assert!(h.sync.send_code(&label, SendType::Add.code(), &[ALICE, BOB]));
    assert_eq!(h.trace(), ["add 1 -> session-1", "add 1 -> session-2"]);
}

#[test]
fn send_to_session_never_touches_storage() {
    let mut h = harness();
    let label = h.spawn();

    h.sync.send_to_session(&label, SendType::Remove, BOB);
    assert_eq!(h.trace(), ["remove 1 -> session-2"]);
    assert!(h.sync.store().records().get(1).is_some());
}

#[test]
fn broadcasts_read_observers_at_send_time() {
    let mut h = harness();
    let mut label = h.spawn();

    h.sync.observers_mut().join(BOB, h.overworld.id());
    h.sync.bind(&mut label).set_text("");

    assert_eq!(h.trace(), ["upsert 1 ok", "add 1 -> session-1", "add 1 -> session-2"]);
}
