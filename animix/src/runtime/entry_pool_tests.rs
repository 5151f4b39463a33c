use super::entry_pool::EntryPool;
use super::track_entry::TrackEntry;
use crate::Animation;
use std::sync::Arc;

fn entry(track_index: usize) -> TrackEntry<()> {
    TrackEntry::new(track_index, Arc::new(Animation::new("a", 1.0, Vec::new())), false)
}

#[test]
fn released_ids_stop_resolving() {
    let mut pool = EntryPool::default();
    let id = pool.acquire(entry(0));
    assert!(pool.get(id).is_some());

    assert!(pool.release(id));
    assert!(pool.get(id).is_none());
    assert!(pool.get_mut(id).is_none());
    assert!(!pool.release(id), "double release is a no-op");
}

#[test]
fn slots_are_reused_with_a_new_generation() {
    let mut pool = EntryPool::default();
    let first = pool.acquire(entry(0));
    pool.release(first);

    let second = pool.acquire(entry(1));
    assert_ne!(first, second);
    assert_eq!(pool.live(), 1);
    assert_eq!(pool.get(second).map(|e| e.track_index), Some(1));
    assert!(pool.get(first).is_none());
}

#[test]
fn reused_entries_carry_no_stale_state() {
    let mut pool = EntryPool::default();
    let first = pool.acquire(entry(0));
    let other = pool.acquire(entry(0));
    if let Some(e) = pool.get_mut(first) {
        e.timelines_first.extend([true, false, true]);
        e.next = Some(other);
        e.mixing_from = Some(other);
        e.event_threshold = 0.7;
    }
    pool.release(first);

    let reused = pool.acquire(entry(2));
    let e = pool.get(reused).expect("acquired");
    assert!(e.timelines_first.is_empty());
    assert!(e.next.is_none());
    assert!(e.mixing_from.is_none());
    assert_eq!(e.event_threshold, 0.0);
    assert_eq!(e.animation_last, -1.0);
    assert_eq!(e.track_last, -1.0);
}

#[test]
fn new_entries_default_track_end_by_loop() {
    let looped = TrackEntry::<()>::new(0, Arc::new(Animation::new("a", 2.0, Vec::new())), true);
    assert_eq!(looped.track_end, f32::MAX);
    assert_eq!(looped.animation_end, 2.0);

    let once = TrackEntry::<()>::new(0, Arc::new(Animation::new("a", 2.0, Vec::new())), false);
    assert_eq!(once.track_end, 2.0);
}

#[test]
fn animation_time_wraps_or_clamps() {
    let mut looped = TrackEntry::<()>::new(0, Arc::new(Animation::new("a", 1.0, Vec::new())), true);
    looped.track_time = 2.25;
    assert_eq!(looped.animation_time(), 0.25);
    assert!(looped.is_complete());

    let mut once = TrackEntry::<()>::new(0, Arc::new(Animation::new("a", 1.0, Vec::new())), false);
    once.track_time = 2.25;
    assert_eq!(once.animation_time(), 1.0);

    let mut empty = TrackEntry::<()>::new(0, Arc::new(Animation::empty()), true);
    empty.track_time = 3.0;
    assert_eq!(empty.animation_time(), 0.0);
}
