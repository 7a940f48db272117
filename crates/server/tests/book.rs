//! Label registry and session membership.

use std::sync::Arc;

use texter_core::{DVec3, IdentityAllocator, LabelError, LocalEntityCounter, SessionId, WorldRef};
use texter_server::{LabelBook, Synchronizer, WorldSessions};
use texter_store::{LabelRecord, LabelStore};
use texter_testkit::{is_add, FlakyStore, Journal, RecordingTransport};

type TestBook = LabelBook<FlakyStore, WorldSessions, RecordingTransport>;

const ALICE: SessionId = SessionId(1);

fn book_over(journal: &Journal, store: FlakyStore) -> (TestBook, WorldRef, WorldRef) {
    let mut sessions = WorldSessions::new();
    let overworld = sessions.load_world("world");
    let nether = sessions.load_world("nether");
    let sync = Synchronizer::new(
        store,
        sessions,
        journal.transport(),
        Arc::new(LocalEntityCounter::default()),
    );
    (LabelBook::new(sync), overworld, nether)
}

fn book(journal: &Journal) -> (TestBook, WorldRef, WorldRef) {
    book_over(journal, journal.store())
}

#[test]
fn spawn_tracks_persisted_labels() {
    let journal = Journal::new();
    let (mut book, overworld, nether) = book(&journal);

    let a = book.spawn(overworld.clone(), DVec3::ZERO, "A", "").unwrap();
    let b = book.spawn(nether.clone(), DVec3::ONE, "B", "").unwrap();

    assert_eq!(book.len(), 2);
    assert_eq!(book.get(a).unwrap().title(), "A");
    assert_eq!(book.in_world(nether.id()).map(|l| l.entity_id()).collect::<Vec<_>>(), [b]);
}

#[test]
fn failed_spawn_is_not_tracked() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    book.sync_mut().store_mut().fail_writes(true);

    let err = book.spawn(overworld, DVec3::ZERO, "A", "").unwrap_err();
    assert!(matches!(err, LabelError::PersistenceFailure { entity_id: 1, .. }));
    assert!(book.is_empty());
}

#[test]
fn edit_follows_entity_id_changes() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    let id = book.spawn(overworld, DVec3::ZERO, "A", "").unwrap();

    let title = book
        .edit(id, |label| label.set_entity_id(42).set_title("B").title().to_string())
        .unwrap();

    assert_eq!(title, "B");
    assert!(book.get(id).is_none());
    assert_eq!(book.get(42).unwrap().title(), "B");
    assert!(book.edit(id, |_| ()).is_none());
}

#[test]
fn edit_refuses_an_id_held_by_another_label() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    let a = book.spawn(overworld.clone(), DVec3::ZERO, "A", "").unwrap();
    let b = book.spawn(overworld, DVec3::ONE, "B", "").unwrap();
    journal.clear();

    let kept = book
        .edit(a, |label| label.set_entity_id(b).set_title("A2").entity_id())
        .unwrap();

    assert_eq!(kept, a);
    assert_eq!(book.len(), 2);
    assert_eq!(book.get(a).unwrap().title(), "A2");
    assert_eq!(book.get(b).unwrap().title(), "B");
    let records = book.sync().store().records();
    assert_eq!(records.get(a).unwrap().title, "A2");
    assert_eq!(records.get(b).unwrap().title, "B");
    assert_eq!(journal.remove_count(), 0);
}

#[test]
fn ids_moved_to_are_not_handed_out_again() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    let a = book.spawn(overworld.clone(), DVec3::ZERO, "A", "").unwrap();

    book.edit(a, |label| {
        label.set_entity_id(a + 1);
    });
    let fresh = book.spawn(overworld, DVec3::ZERO, "B", "").unwrap();

    assert_eq!(fresh, a + 2);
    assert_eq!(book.len(), 2);
}

#[test]
fn edit_drops_removed_labels() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    let id = book.spawn(overworld, DVec3::ZERO, "A", "").unwrap();

    assert_eq!(book.edit(id, |label| label.remove()), Some(true));
    assert!(book.is_empty());
    assert!(book.sync().store().records().is_empty());
}

#[test]
fn remove_returns_the_label() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    let id = book.spawn(overworld, DVec3::ZERO, "A", "").unwrap();

    let label = book.remove(id).unwrap();
    assert_eq!(label.entity_id(), id);
    assert!(book.remove(id).is_none());
}

#[test]
fn join_sends_visible_labels_to_the_session_only() {
    let journal = Journal::new();
    let (mut book, overworld, nether) = book(&journal);
    let a = book.spawn(overworld.clone(), DVec3::ZERO, "A", "").unwrap();
    let b = book.spawn(nether.clone(), DVec3::ZERO, "B", "").unwrap();
    journal.clear();

    assert!(book.join(ALICE, &overworld));
    let seen = journal.delivered_to(ALICE);
    assert_eq!(seen.len(), 1);
    assert!(is_add(&seen[0]));
    assert_eq!(seen[0].entity_id(), a);

    journal.clear();
    assert!(book.join(ALICE, &nether));
    let seen = journal.delivered_to(ALICE);
    assert_eq!(seen.len(), 2);
    assert!(!is_add(&seen[0]));
    assert_eq!(seen[0].entity_id(), a);
    assert!(is_add(&seen[1]));
    assert_eq!(seen[1].entity_id(), b);
    assert!(journal.store_ops().is_empty());
}

#[test]
fn rejoining_the_same_world_sends_nothing() {
    let journal = Journal::new();
    let (mut book, overworld, _) = book(&journal);
    book.spawn(overworld.clone(), DVec3::ZERO, "A", "").unwrap();
    book.join(ALICE, &overworld);
    journal.clear();

    assert!(book.join(ALICE, &overworld));
    assert!(journal.deliveries().is_empty());
}

#[test]
fn move_session_resolves_names() {
    let journal = Journal::new();
    let (mut book, _, nether) = book(&journal);

    assert_eq!(book.move_session(ALICE, "nether").unwrap(), nether);
    assert_eq!(book.sync().observers().world_of(ALICE), Some(nether.id()));
    assert!(matches!(
        book.move_session(ALICE, "the_end"),
        Err(LabelError::UnresolvedWorldReference(_))
    ));
    assert_eq!(book.leave(ALICE), Some(nether.id()));
}

#[test]
fn restore_reloads_records_and_reserves_ids() {
    let journal = Journal::new();
    let mut store = journal.store();
    for (entity_id, world) in [(3, "world"), (9, "nether"), (12, "the_end")] {
        store
            .insert(&LabelRecord {
                entity_id,
                world: world.to_string(),
                x: 1.0,
                y: 2.0,
                z: 3.0,
                title: "Saved".to_string(),
                text: String::new(),
                invisible: entity_id == 9,
            })
            .unwrap();
    }
    journal.clear();

    let (mut book, overworld, _) = book_over(&journal, store);
    assert_eq!(book.restore().unwrap(), 2);
    assert!(book.get(12).is_none());
    assert!(book.get(9).unwrap().is_invisible());
    assert!(journal.deliveries().is_empty());

    assert_eq!(book.sync().ids().next_entity_id(), 13);
    let fresh = book.spawn(overworld, DVec3::ZERO, "New", "").unwrap();
    assert_eq!(fresh, 14);
}
