//! Ticket lifecycle through the public store API

use soundsup::tickets::{EmotionDistribution, TicketEvent};
use soundsup::{AudioUri, ConcertInfo, PendingId, PendingStatus, StoreError, Ticket, TicketStore};

fn adele() -> ConcertInfo {
    ConcertInfo::new("Adele").unwrap()
}

#[test]
fn test_scenario_upload_completes_ticket() {
    let store = TicketStore::new();
    let p1 = store.create_pending(adele(), AudioUri::new("file://a.m4a"));
    store.mark_processing(&p1).unwrap();

    let ticket = Ticket::new("T1", adele())
        .with_emotions(EmotionDistribution::from_weights([("Calm", 60.0), ("Joy", 40.0)]));
    store.complete(&p1, ticket).unwrap();

    assert!(store.pending().is_empty());
    let tickets = store.tickets();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].id, "T1");
    assert_eq!(tickets[0].dominant_emotion.as_deref(), Some("Calm"));
    assert!(!store.contains_pending(&p1));
}

#[test]
fn test_scenario_failed_upload_stays_until_removed() {
    let store = TicketStore::new();
    let p1 = store.create_pending(adele(), AudioUri::new("file://a.m4a"));
    store.mark_processing(&p1).unwrap();
    store.fail(&p1, "server busy").unwrap();

    let pending = store.pending_ticket(&p1).unwrap();
    assert_eq!(pending.status, PendingStatus::Failed);
    assert_eq!(pending.last_error.as_deref(), Some("server busy"));
    assert_eq!(store.tickets_len(), 0);

    assert!(store.remove(&p1));
    assert!(store.pending().is_empty());
}

#[test]
fn test_unknown_id_changes_nothing() {
    let store = TicketStore::new();
    let p1 = store.create_pending(adele(), AudioUri::new("file://a.m4a"));
    let ghost = PendingId::from("pending_ghost");

    assert_eq!(
        store.complete(&ghost, Ticket::new("T1", adele())),
        Err(StoreError::NotFound(ghost.clone()))
    );
    assert_eq!(
        store.fail(&ghost, "nope"),
        Err(StoreError::NotFound(ghost.clone()))
    );
    assert_eq!(store.mark_processing(&ghost), Err(StoreError::NotFound(ghost)));

    assert_eq!(store.pending_len(), 1);
    assert_eq!(store.pending_ticket(&p1).unwrap().status, PendingStatus::Pending);
    assert_eq!(store.tickets_len(), 0);
}

#[test]
fn test_remove_is_idempotent() {
    let store = TicketStore::new();
    let p1 = store.create_pending(adele(), AudioUri::new("file://a.m4a"));
    let p2 = store.create_pending(adele(), AudioUri::new("file://b.m4a"));

    assert!(store.remove(&p1));
    let after_first = store.pending();
    assert!(!store.remove(&p1));
    assert_eq!(store.pending(), after_first);
    assert_eq!(after_first[0].id, p2);
}

#[test]
fn test_complete_from_failed() {
    let store = TicketStore::new();
    let p1 = store.create_pending(adele(), AudioUri::new("file://a.m4a"));
    store.mark_processing(&p1).unwrap();
    store.fail(&p1, "timeout").unwrap();

    store.complete(&p1, Ticket::new("T1", adele())).unwrap();
    assert!(!store.contains_pending(&p1));
    assert!(store.contains_ticket("T1"));
}

#[test]
fn test_subscribers_see_every_transition() {
    let store = TicketStore::new();
    let sub = store.subscribe();

    let p1 = store.create_pending(adele(), AudioUri::new("file://a.m4a"));
    store.mark_processing(&p1).unwrap();
    store.complete(&p1, Ticket::new("T1", adele())).unwrap();

    let events = sub.drain();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], TicketEvent::PendingCreated(id) if *id == p1));
    assert!(matches!(
        &events[1],
        TicketEvent::StatusChanged { to: PendingStatus::Processing, .. }
    ));
    assert!(matches!(
        &events[2],
        TicketEvent::Completed { ticket_id, .. } if ticket_id == "T1"
    ));

    store.unsubscribe(sub.id());
    store.create_pending(adele(), AudioUri::new("file://b.m4a"));
    assert!(sub.try_recv().is_none());
}

#[test]
fn test_concurrent_uploads_complete_independently() {
    let store = TicketStore::new();
    let ids: Vec<_> = (0..8)
        .map(|i| store.create_pending(adele(), AudioUri::new(format!("file://{}.m4a", i))))
        .collect();

    std::thread::scope(|scope| {
        for (i, id) in ids.iter().enumerate() {
            let store = store.clone();
            scope.spawn(move || {
                store.mark_processing(id).unwrap();
                if i % 2 == 0 {
                    store.complete(id, Ticket::new(format!("T{}", i), adele())).unwrap();
                } else {
                    store.fail(id, "server busy").unwrap();
                }
            });
        }
    });

    assert_eq!(store.tickets_len(), 4);
    assert_eq!(store.pending_len(), 4);
    assert!(store.pending().iter().all(|p| p.status.is_failed()));
}
