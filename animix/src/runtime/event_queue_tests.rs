use super::entry_pool::EntryPool;
use super::event_queue::{AnimationStateEvent, EventQueue};
use super::track_entry::TrackEntry;
use crate::{Animation, Event};
use std::sync::Arc;

fn kinds(records: &[super::event_queue::QueuedEvent]) -> Vec<AnimationStateEvent> {
    records.iter().map(|r| r.event.clone()).collect()
}

fn deliver(queue: &mut EventQueue) -> Vec<super::event_queue::QueuedEvent> {
    std::iter::from_fn(|| queue.next_in_batch()).collect()
}

#[test]
fn records_keep_emission_order() {
    let mut pool = EntryPool::<()>::default();
    let id = pool.acquire(TrackEntry::new(0, Arc::new(Animation::empty()), false));

    let mut queue = EventQueue::default();
    queue.start(id);
    queue.event(id, Event::new(0.5, "step"));
    queue.complete(id);
    queue.interrupt(id);
    queue.end(id);
    queue.dispose(id);

    assert!(queue.begin_drain());
    let records = deliver(&mut queue);
    assert_eq!(
        kinds(&records),
        [
            AnimationStateEvent::Start,
            AnimationStateEvent::Event(Event::new(0.5, "step")),
            AnimationStateEvent::Complete,
            AnimationStateEvent::Interrupt,
            AnimationStateEvent::End,
            AnimationStateEvent::Dispose,
        ]
    );
    assert!(records.iter().all(|r| r.entry == id));
    queue.finish_drain();
}

#[test]
fn nested_drain_is_refused_and_new_records_wait() {
    let mut pool = EntryPool::<()>::default();
    let id = pool.acquire(TrackEntry::new(0, Arc::new(Animation::empty()), false));

    let mut queue = EventQueue::default();
    queue.start(id);
    assert!(queue.begin_drain());
    assert!(queue.is_draining());
    assert!(queue.next_in_batch().is_some());

    queue.end(id);
    assert!(!queue.begin_drain());
    assert!(queue.next_in_batch().is_none(), "records added mid-drain wait");
    queue.finish_drain();

    assert!(queue.begin_drain());
    assert_eq!(kinds(&deliver(&mut queue)), [AnimationStateEvent::End]);
    queue.finish_drain();
}

#[test]
fn clear_discards_pending_records() {
    let mut pool = EntryPool::<()>::default();
    let id = pool.acquire(TrackEntry::new(0, Arc::new(Animation::empty()), false));

    let mut queue = EventQueue::default();
    queue.start(id);
    queue.complete(id);
    let dropped = queue.clear();
    assert_eq!(
        kinds(&dropped),
        [AnimationStateEvent::Start, AnimationStateEvent::Complete]
    );
    assert_eq!(queue.records().count(), 0);
}

#[test]
fn clear_cuts_off_the_rest_of_a_running_drain() {
    let mut pool = EntryPool::<()>::default();
    let id = pool.acquire(TrackEntry::new(0, Arc::new(Animation::empty()), false));

    let mut queue = EventQueue::default();
    queue.start(id);
    queue.interrupt(id);
    queue.end(id);
    assert!(queue.begin_drain());
    assert!(queue.next_in_batch().is_some());

    let dropped = queue.clear();
    assert_eq!(
        kinds(&dropped),
        [AnimationStateEvent::Interrupt, AnimationStateEvent::End]
    );
    assert!(queue.next_in_batch().is_none());
    queue.finish_drain();
}
