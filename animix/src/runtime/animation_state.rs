use super::entry_pool::{EntryId, EntryPool};
use super::event_queue::{AnimationStateEvent, EventQueue, QueuedEvent};
use super::track_entry::{TrackEntry, TrackEntryHandle, TrackEntrySnapshot};
use super::track_table::TrackTable;
use crate::error::check_mix_duration;
use crate::{Animation, AnimationSet, Error, Event, TimelineKind};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Clips available to an [`AnimationState`] and the crossfade durations between them.
pub struct AnimationStateData<P> {
    animations: Arc<AnimationSet<P>>,
    /// Mix duration used between clips with no explicit mix.
    pub default_mix: f32,
    mixes: HashMap<String, HashMap<String, f32>>,
}

impl<P> Clone for AnimationStateData<P> {
    fn clone(&self) -> Self {
        Self {
            animations: self.animations.clone(),
            default_mix: self.default_mix,
            mixes: self.mixes.clone(),
        }
    }
}

impl<P> fmt::Debug for AnimationStateData<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationStateData")
            .field("animations", &self.animations)
            .field("default_mix", &self.default_mix)
            .field("mixes", &self.mixes)
            .finish()
    }
}

impl<P> AnimationStateData<P> {
    pub fn new(animations: Arc<AnimationSet<P>>) -> Self {
        Self {
            animations,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn animations(&self) -> &Arc<AnimationSet<P>> {
        &self.animations
    }

    /// Sets the mix duration used when `to` replaces `from`.
    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        check_mix_duration(duration)?;
        for name in [from, to] {
            if self.animations.animation(name).is_none() {
                return Err(Error::UnknownAnimation {
                    name: name.to_string(),
                });
            }
        }
        self.mixes
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), duration);
        Ok(())
    }

    /// The crossfade duration from `from` to `to`, falling back to [`default_mix`](Self::default_mix).
    pub fn mix_duration(&self, from: &Animation<P>, to: &Animation<P>) -> f32 {
        self.mixes
            .get(&from.name)
            .and_then(|m| m.get(&to.name))
            .copied()
            .unwrap_or(self.default_mix)
    }
}

/// Receives track entry lifecycle notifications and custom events.
///
/// Notifications are delivered after the call that produced them has finished changing
/// tracks, so a listener may freely schedule or clear animations. Notifications produced that
/// way are delivered by the next drain, after the current batch.
pub trait AnimationStateListener<P> {
    /// The entry became the current entry of its track.
    fn start(&mut self, _state: &mut AnimationState<P>, _entry: &TrackEntrySnapshot) {}

    /// Another entry replaced this one as current. It may still be applied while mixing out.
    fn interrupt(&mut self, _state: &mut AnimationState<P>, _entry: &TrackEntrySnapshot) {}

    /// The entry is no longer current and will never be applied again.
    ///
    /// Entries that were queued and then discarded before becoming current only receive
    /// [`dispose`](Self::dispose).
    fn end(&mut self, _state: &mut AnimationState<P>, _entry: &TrackEntrySnapshot) {}

    /// The entry is about to be returned to the pool. Its handle is invalid afterwards.
    fn dispose(&mut self, _state: &mut AnimationState<P>, _entry: &TrackEntrySnapshot) {}

    /// The entry's animation completed a loop, or reached its end if not looping.
    fn complete(&mut self, _state: &mut AnimationState<P>, _entry: &TrackEntrySnapshot) {}

    /// The entry's animation fired a custom event.
    fn event(&mut self, _state: &mut AnimationState<P>, _entry: &TrackEntrySnapshot, _event: &Event) {
    }

    /// Routes a notification to the method above. Override to handle everything in one place.
    fn notify(
        &mut self,
        state: &mut AnimationState<P>,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    ) {
        match event {
            AnimationStateEvent::Start => self.start(state, entry),
            AnimationStateEvent::Interrupt => self.interrupt(state, entry),
            AnimationStateEvent::End => self.end(state, entry),
            AnimationStateEvent::Dispose => self.dispose(state, entry),
            AnimationStateEvent::Complete => self.complete(state, entry),
            AnimationStateEvent::Event(ev) => self.event(state, entry, ev),
        }
    }
}

/// Identifies a listener registered with [`AnimationState::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerSlot<P> = (ListenerId, Option<Box<dyn AnimationStateListener<P>>>);

/// Applies animations over time, queues animations for later playback and crossfades between
/// animations on the same track.
pub struct AnimationState<P> {
    data: AnimationStateData<P>,
    tracks: TrackTable,
    entries: EntryPool<P>,
    queue: EventQueue,
    events: Vec<Event>,
    listeners: Vec<ListenerSlot<P>>,
    next_listener_id: u64,
    property_ids: HashSet<u64>,
    animations_changed: bool,
    time_scale: f32,
    empty_animation: Arc<Animation<P>>,
}

impl<P> AnimationState<P> {
    pub fn new(data: AnimationStateData<P>) -> Self {
        Self {
            data,
            tracks: TrackTable::default(),
            entries: EntryPool::default(),
            queue: EventQueue::default(),
            events: Vec::new(),
            listeners: Vec::new(),
            next_listener_id: 0,
            property_ids: HashSet::new(),
            animations_changed: false,
            time_scale: 1.0,
            empty_animation: Arc::new(Animation::empty()),
        }
    }

    pub fn data(&self) -> &AnimationStateData<P> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData<P> {
        &mut self.data
    }

    /// Multiplier for the delta of every update. Defaults to 1.
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    /// The current entry of every track, in track order. Empty tracks yield `None`.
    pub fn tracks(&self) -> impl Iterator<Item = Option<TrackEntryHandle>> + '_ {
        (0..self.tracks.len()).map(|i| self.tracks.get(i).map(TrackEntryHandle::new))
    }

    /// The entry currently playing on a track.
    pub fn current(&self, track_index: usize) -> Option<TrackEntryHandle> {
        self.tracks.get(track_index).map(TrackEntryHandle::new)
    }

    pub fn track_entry(&self, handle: TrackEntryHandle) -> Option<&TrackEntry<P>> {
        self.entries.get(handle.id())
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Option<&mut TrackEntry<P>> {
        self.entries.get_mut(id)
    }

    /// Registers a listener notified for every entry, after the entry's own listener.
    pub fn add_listener<L: AnimationStateListener<P> + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Some(Box::new(listener))));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != len
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Discards notifications not yet delivered, including the rest of the batch being
    /// delivered when called from a listener. Useful from a listener that is about to set new
    /// animations and does not care about what was queued before.
    ///
    /// Entries whose `end` or `dispose` is discarded and that no track still refers to are
    /// returned to the pool without further notification.
    pub fn clear_listener_notifications(&mut self) {
        let dropped = self.queue.clear();
        let reachable = self.reachable_entries();
        for QueuedEvent { entry, event } in dropped {
            if !matches!(event, AnimationStateEvent::End | AnimationStateEvent::Dispose) {
                continue;
            }
            if !reachable.contains(&entry) && self.entries.release(entry) {
                log::trace!("released entry whose end notification was discarded");
            }
        }
    }

    /// Entries still referenced from a track: current entries, their queue and what they mix from.
    fn reachable_entries(&self) -> HashSet<EntryId> {
        let mut reachable = HashSet::new();
        let mut pending = self.tracks.current_entries().collect::<Vec<_>>();
        while let Some(id) = pending.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(entry) = self.entries.get(id) {
                pending.extend(entry.next);
                pending.extend(entry.mixing_from);
            }
        }
        reachable
    }

    /// Notifications queued but not yet delivered, oldest first.
    pub fn pending_notifications(
        &self,
    ) -> impl Iterator<Item = (TrackEntryHandle, &AnimationStateEvent)> + '_ {
        self.queue
            .records()
            .map(|r| (TrackEntryHandle::new(r.entry), &r.event))
    }

    /// True while notifications are being delivered to listeners.
    pub fn is_draining(&self) -> bool {
        self.queue.is_draining()
    }

    fn find_animation(&self, name: &str) -> Result<Arc<Animation<P>>, Error> {
        self.data.animations.animation(name).cloned().ok_or_else(|| {
            log::debug!("unknown animation '{name}'");
            Error::UnknownAnimation {
                name: name.to_string(),
            }
        })
    }

    /// Advances every track by `delta` seconds, promoting queued entries whose delay has
    /// passed and ending mixes and tracks that are done. Pose is not touched.
    pub fn update(&mut self, delta: f32) {
        if !delta.is_finite() || delta < 0.0 {
            log::debug!("ignoring update with invalid delta {delta}");
            return;
        }
        let delta = delta * self.time_scale;

        for track_index in 0..self.tracks.len() {
            let Some(current_id) = self.tracks.get(track_index) else {
                continue;
            };
            let Some(current) = self.entries.get_mut(current_id) else {
                self.tracks.set(track_index, None);
                continue;
            };

            current.animation_last = current.next_animation_last;
            current.track_last = current.next_track_last;

            let mut current_delta = delta * current.time_scale;
            if current.delay > 0.0 {
                current.delay -= current_delta;
                if current.delay > 0.0 {
                    continue;
                }
                current_delta = -current.delay;
                current.delay = 0.0;
            }

            let (next, mixing_from, track_last, track_end) = (
                current.next,
                current.mixing_from,
                current.track_last,
                current.track_end,
            );

            if let Some(next_id) = next {
                // The next entry starts once its delay has passed on this entry's track time.
                let next_time = track_last - self.entries.get(next_id).map_or(0.0, |n| n.delay);
                if next_time >= 0.0 {
                    if let Some(next) = self.entries.get_mut(next_id) {
                        next.delay = 0.0;
                        next.track_time = next_time + delta * next.time_scale;
                    }
                    if let Some(current) = self.entries.get_mut(current_id) {
                        current.track_time += current_delta;
                        current.next = None;
                    }
                    log::trace!("track {track_index}: queued entry became current");
                    self.set_current(track_index, next_id);
                    if let Some(next) = self.entries.get_mut(next_id) {
                        if next.mixing_from.is_some() {
                            next.mix_time += current_delta;
                        }
                    }
                    continue;
                }
            } else if track_last >= track_end {
                // Leaves the pose as last applied.
                log::trace!("track {track_index}: track end reached, clearing");
                self.tracks.set(track_index, None);
                self.queue.end(current_id);
                self.dispose_next(current_id);
                if let Some(from) = mixing_from {
                    if let Some(current) = self.entries.get_mut(current_id) {
                        current.mixing_from = None;
                    }
                    self.queue.end(from);
                }
                self.animations_changed = true;
                continue;
            }

            let Some(current) = self.entries.get_mut(current_id) else {
                continue;
            };
            current.track_time += current_delta;
            let Some(from_id) = mixing_from else {
                continue;
            };

            if current.mix_time >= current.mix_duration && current.mix_time > 0.0 {
                current.mixing_from = None;
                log::trace!("track {track_index}: mix finished");
                self.queue.end(from_id);
                self.animations_changed = true;
            } else {
                let from_delta = match self.entries.get_mut(from_id) {
                    Some(from) => {
                        from.animation_last = from.next_animation_last;
                        from.track_last = from.next_track_last;
                        let from_delta = delta * from.time_scale;
                        from.track_time += from_delta;
                        from_delta
                    }
                    None => 0.0,
                };
                if let Some(current) = self.entries.get_mut(current_id) {
                    current.mix_time += from_delta;
                }
            }
        }

        self.drain();
    }

    /// Poses `pose` with the current state of every track without advancing time, so several
    /// poses can be posed identically.
    pub fn apply(&mut self, pose: &mut P) {
        if self.animations_changed {
            self.compute_timelines_first();
        }

        for track_index in 0..self.tracks.len() {
            let Some(current_id) = self.tracks.get(track_index) else {
                continue;
            };
            let Some(current) = self.entries.get(current_id) else {
                continue;
            };
            if current.delay > 0.0 {
                continue;
            }

            let mut mix = current.alpha;
            if let Some(from_id) = current.mixing_from {
                mix = if current.mix_duration == 0.0 {
                    1.0
                } else {
                    (mix * current.mix_time / current.mix_duration).min(1.0)
                };
                self.apply_mixing_from(from_id, pose, mix);
            }

            let Some(current) = self.entries.get(current_id) else {
                continue;
            };
            let animation_last = current.animation_last;
            let animation_time = current.animation_time();
            let timelines = &current.animation.timelines;
            if mix == 1.0 {
                for timeline in timelines {
                    timeline.apply(
                        pose,
                        animation_last,
                        animation_time,
                        Some(&mut self.events),
                        1.0,
                        false,
                        false,
                    );
                }
            } else {
                for (i, timeline) in timelines.iter().enumerate() {
                    let first = current.timelines_first.get(i).copied().unwrap_or(false);
                    timeline.apply(
                        pose,
                        animation_last,
                        animation_time,
                        Some(&mut self.events),
                        mix,
                        first,
                        false,
                    );
                }
            }

            self.queue_events(current_id, animation_time);
            if let Some(current) = self.entries.get_mut(current_id) {
                current.next_animation_last = animation_time;
                current.next_track_last = current.track_time;
            }
        }

        self.drain();
    }

    fn apply_mixing_from(&mut self, entry_id: EntryId, pose: &mut P, mix: f32) {
        let Some(entry) = self.entries.get(entry_id) else {
            return;
        };
        let fire_events = mix < entry.event_threshold;
        let attachments = mix < entry.attachment_threshold;
        let draw_order = mix < entry.draw_order_threshold;

        let animation_last = entry.animation_last;
        let animation_time = entry.animation_time();
        let alpha_full = entry.alpha;
        let alpha_mix = entry.alpha * (1.0 - mix);

        for (i, timeline) in entry.animation.timelines.iter().enumerate() {
            let sink = if fire_events {
                Some(&mut self.events)
            } else {
                None
            };
            if entry.timelines_first.get(i).copied().unwrap_or(false) {
                timeline.apply(pose, animation_last, animation_time, sink, alpha_mix, true, true);
                continue;
            }
            match timeline.kind() {
                TimelineKind::Attachment if !attachments => continue,
                TimelineKind::DrawOrder if !draw_order => continue,
                _ => {}
            }
            timeline.apply(pose, animation_last, animation_time, sink, alpha_full, false, false);
        }

        self.queue_events(entry_id, animation_time);
        if let Some(entry) = self.entries.get_mut(entry_id) {
            entry.next_animation_last = animation_time;
            entry.next_track_last = entry.track_time;
        }
    }

    /// Queues the events fired by the last application of an entry, split around its
    /// complete notification: events from before the loop wrapped, complete, then the rest.
    fn queue_events(&mut self, entry_id: EntryId, animation_time: f32) {
        let Some(entry) = self.entries.get(entry_id) else {
            self.events.clear();
            return;
        };
        let animation_start = entry.animation_start;
        let animation_end = entry.animation_end;
        let duration = animation_end - animation_start;
        let track_last_wrapped = entry.track_last % duration;

        let complete = if entry.looped {
            track_last_wrapped > entry.track_time % duration
        } else {
            animation_time >= animation_end && entry.animation_last < animation_end
        };

        let split = self
            .events
            .iter()
            .position(|ev| ev.time < track_last_wrapped)
            .unwrap_or(self.events.len());
        let mut fired = self.events.drain(..);
        for event in fired.by_ref().take(split) {
            if event.time > animation_end {
                continue;
            }
            self.queue.event(entry_id, event);
        }
        if complete {
            self.queue.complete(entry_id);
        }
        for event in fired {
            if event.time < animation_start {
                continue;
            }
            self.queue.event(entry_id, event);
        }
    }

    /// Decides, per timeline, whether an entry is the first to touch the timeline's property
    /// this pass. The entry mixed out on the lowest track claims first, then the lowest
    /// track's current entry, then higher tracks in order.
    fn compute_timelines_first(&mut self) {
        self.animations_changed = false;
        self.property_ids.clear();

        let current_ids = self.tracks.current_entries().collect::<Vec<_>>();
        let mut current_ids = current_ids.into_iter();
        if let Some(first) = current_ids.next() {
            match self.entries.get(first).and_then(|e| e.mixing_from) {
                Some(from) => {
                    self.set_timelines_first(from);
                    self.check_timelines_first(first);
                }
                None => self.set_timelines_first(first),
            }
        }
        for id in current_ids {
            if let Some(from) = self.entries.get(id).and_then(|e| e.mixing_from) {
                self.check_timelines_first(from);
            }
            self.check_timelines_first(id);
        }
    }

    fn set_timelines_first(&mut self, id: EntryId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.timelines_first.clear();
        for timeline in &entry.animation.timelines {
            self.property_ids.insert(timeline.property_id());
            entry.timelines_first.push(true);
        }
    }

    fn check_timelines_first(&mut self, id: EntryId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.timelines_first.clear();
        for timeline in &entry.animation.timelines {
            let first = self.property_ids.insert(timeline.property_id());
            entry.timelines_first.push(first);
        }
    }

    /// Removes all animations from all tracks, leaving poses as last applied.
    pub fn clear_tracks(&mut self) {
        let current_ids = self.tracks.current_entries().collect::<Vec<_>>();
        for id in current_ids {
            self.clear_track_entry(id);
        }
        self.tracks.clear();
        self.drain();
    }

    /// Removes all animations from a track, leaving poses as last applied.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(current_id) = self.tracks.get(track_index) else {
            return;
        };
        self.clear_track_entry(current_id);
        self.drain();
    }

    fn clear_track_entry(&mut self, current_id: EntryId) {
        let Some(track_index) = self.entries.get(current_id).map(|e| e.track_index) else {
            return;
        };
        self.queue.end(current_id);
        self.dispose_next(current_id);
        if let Some(from) = self
            .entries
            .get_mut(current_id)
            .and_then(|e| e.mixing_from.take())
        {
            self.queue.end(from);
        }
        self.tracks.set(track_index, None);
        self.animations_changed = true;
    }

    /// Drops queued animations on every track and mixes each current animation out to the
    /// setup pose over the next apply.
    pub fn reset_tracks(&mut self) {
        let current_ids = self.tracks.current_entries().collect::<Vec<_>>();
        for id in current_ids {
            self.reset_track_entry(id);
        }
        self.drain();
    }

    /// Drops queued animations on a track and mixes its current animation out to the setup
    /// pose over the next apply.
    pub fn reset_track(&mut self, track_index: usize) {
        let Some(current_id) = self.tracks.get(track_index) else {
            return;
        };
        self.reset_track_entry(current_id);
        self.drain();
    }

    fn reset_track_entry(&mut self, current_id: EntryId) {
        let Some(track_index) = self.entries.get(current_id).map(|e| e.track_index) else {
            return;
        };
        self.dispose_next(current_id);
        let entry_id = self.new_entry(
            track_index,
            self.empty_animation.clone(),
            false,
            Some(current_id),
        );
        if let Some(entry) = self.entries.get_mut(entry_id) {
            entry.mix_duration = 0.0;
        }
        if let Some(current) = self.entries.get_mut(current_id) {
            current.track_time = 0.0;
        }
        self.set_current(track_index, entry_id);
    }

    fn dispose_next(&mut self, entry_id: EntryId) {
        let mut next = self.entries.get_mut(entry_id).and_then(|e| e.next.take());
        while let Some(id) = next {
            self.queue.dispose(id);
            next = self.entries.get_mut(id).and_then(|e| e.next.take());
        }
    }

    fn set_current(&mut self, track_index: usize, entry_id: EntryId) {
        let current = self.tracks.expand_to_index(track_index);
        self.tracks.set(track_index, Some(entry_id));
        self.queue.start(entry_id);

        if let Some(current_id) = current {
            let (from, mix_percent) = match self.entries.get_mut(current_id) {
                Some(current) => (current.mixing_from.take(), current.mix_percent()),
                None => (None, 1.0),
            };
            self.queue.interrupt(current_id);

            // Mix from whichever pose is closer: the interrupted entry, or what it was mixing
            // from if it had not yet mixed halfway in.
            let (partner, ended) = match from {
                Some(from) if mix_percent < 0.5 => (from, Some(current_id)),
                _ => (current_id, from),
            };
            if let Some(entry) = self.entries.get_mut(entry_id) {
                entry.mixing_from = Some(partner);
            }
            if let Some(ended) = ended {
                self.queue.end(ended);
            }
        }

        self.animations_changed = true;
    }

    /// Sets the current animation for a track, discarding queued animations. The previous
    /// current animation is mixed out unless it was never applied.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(animation_name)?;
        Ok(self.set_animation_with(track_index, animation, looped))
    }

    pub fn set_animation_with(
        &mut self,
        track_index: usize,
        animation: Arc<Animation<P>>,
        looped: bool,
    ) -> TrackEntryHandle {
        log::debug!("track {track_index}: set animation '{}'", animation.name);
        let mut current = self.tracks.expand_to_index(track_index);
        let mut mix_from = current;
        if let Some(current_id) = current {
            let never_applied = self
                .entries
                .get(current_id)
                .is_some_and(|e| e.next_track_last < 0.0);
            if never_applied {
                // Don't mix from an entry that was never applied; inherit what it mixed from.
                self.tracks.set(track_index, None);
                mix_from = self
                    .entries
                    .get_mut(current_id)
                    .and_then(|e| e.mixing_from.take());
                self.queue.interrupt(current_id);
                self.queue.end(current_id);
                self.dispose_next(current_id);
                current = None;
            } else {
                self.dispose_next(current_id);
            }
        }

        let entry_id = self.new_entry(track_index, animation, looped, mix_from);
        if current.is_none() {
            if let Some(entry) = self.entries.get_mut(entry_id) {
                entry.mixing_from = mix_from;
            }
        }
        self.set_current(track_index, entry_id);
        self.drain();
        TrackEntryHandle::new(entry_id)
    }

    /// Queues an animation to play after the current or last queued animation of a track.
    ///
    /// `delay` is measured from the start of the previous animation. A `delay <= 0` starts
    /// the animation when the previous one completes its current loop, minus the mix
    /// duration, plus the (negative) delay.
    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(animation_name)?;
        self.add_animation_with(track_index, animation, looped, delay)
    }

    pub fn add_animation_with(
        &mut self,
        track_index: usize,
        animation: Arc<Animation<P>>,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        if !delay.is_finite() {
            return Err(Error::InvalidValue {
                message: "delay must be finite".to_string(),
            });
        }
        log::debug!(
            "track {track_index}: add animation '{}' with delay {delay}",
            animation.name
        );

        let mut last = self.tracks.expand_to_index(track_index);
        while let Some(next) = last.and_then(|id| self.entries.get(id)).and_then(|e| e.next) {
            last = Some(next);
        }

        let entry_id = self.new_entry(track_index, animation, looped, last);
        let Some(last_id) = last else {
            if let Some(entry) = self.entries.get_mut(entry_id) {
                entry.delay = delay.max(0.0);
            }
            self.set_current(track_index, entry_id);
            self.drain();
            return Ok(TrackEntryHandle::new(entry_id));
        };

        let mut delay = delay;
        if delay <= 0.0 {
            let mix_duration = self.entries.get(entry_id).map_or(0.0, |e| e.mix_duration);
            delay = match self.entries.get(last_id) {
                Some(last) => {
                    let duration = last.animation_end - last.animation_start;
                    if duration != 0.0 {
                        delay + duration * (1.0 + (last.track_time / duration).trunc())
                            - mix_duration
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
        }
        if let Some(last) = self.entries.get_mut(last_id) {
            last.next = Some(entry_id);
        }
        if let Some(entry) = self.entries.get_mut(entry_id) {
            entry.delay = delay;
        }
        Ok(TrackEntryHandle::new(entry_id))
    }

    /// Acquires an entry, taking its mix duration from the entry it follows.
    fn new_entry(
        &mut self,
        track_index: usize,
        animation: Arc<Animation<P>>,
        looped: bool,
        last: Option<EntryId>,
    ) -> EntryId {
        let mix_duration = last
            .and_then(|id| self.entries.get(id))
            .map_or(0.0, |last| self.data.mix_duration(&last.animation, &animation));
        let mut entry = TrackEntry::new(track_index, animation, looped);
        entry.mix_duration = mix_duration;
        self.entries.acquire(entry)
    }

    /// Delivers queued notifications. Does nothing when called while already delivering.
    fn drain(&mut self) {
        if !self.queue.begin_drain() {
            log::trace!("drain requested while draining, deferred");
            return;
        }

        while let Some(QueuedEvent { entry, event }) = self.queue.next_in_batch() {
            let Some(snapshot) = self.entries.get(entry).map(|e| TrackEntrySnapshot::of(entry, e))
            else {
                continue;
            };
            match event {
                AnimationStateEvent::End => {
                    self.notify(entry, &snapshot, &AnimationStateEvent::End);
                    self.notify(entry, &snapshot, &AnimationStateEvent::Dispose);
                    self.entries.release(entry);
                }
                AnimationStateEvent::Dispose => {
                    self.notify(entry, &snapshot, &AnimationStateEvent::Dispose);
                    self.entries.release(entry);
                }
                event => self.notify(entry, &snapshot, &event),
            }
        }

        self.queue.finish_drain();
    }

    fn notify(&mut self, entry_id: EntryId, snapshot: &TrackEntrySnapshot, event: &AnimationStateEvent) {
        let listener = self.entries.get_mut(entry_id).and_then(|e| {
            e.listener_replaced = false;
            e.listener.take()
        });
        if let Some(mut listener) = listener {
            listener.notify(self, snapshot, event);
            // A listener that set or cleared its entry's listener keeps that change.
            if let Some(entry) = self.entries.get_mut(entry_id) {
                if !entry.listener_replaced {
                    entry.listener = Some(listener);
                }
            }
        }

        // Listeners added while notifying only see later notifications.
        let ids = self.listeners.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        for id in ids {
            let Some(mut listener) = self
                .listeners
                .iter_mut()
                .find(|(lid, _)| *lid == id)
                .and_then(|(_, l)| l.take())
            else {
                continue;
            };
            listener.notify(self, snapshot, event);
            if let Some((_, slot)) = self.listeners.iter_mut().find(|(lid, _)| *lid == id) {
                *slot = Some(listener);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn live_entries_for_tests(&self) -> usize {
        self.entries.live()
    }
}

impl<P> fmt::Display for AnimationState<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        for id in self.tracks.current_entries() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            if wrote {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
            wrote = true;
        }
        if !wrote {
            f.write_str("<none>")?;
        }
        Ok(())
    }
}
