use super::animation_state::{AnimationState, AnimationStateListener};
use super::entry_pool::EntryId;
use crate::Animation;
use std::fmt;
use std::sync::Arc;

/// Playback state of one scheduled animation on a track.
pub struct TrackEntry<P> {
    pub track_index: usize,
    pub animation: Arc<Animation<P>>,
    pub looped: bool,

    pub event_threshold: f32,
    pub attachment_threshold: f32,
    pub draw_order_threshold: f32,

    /// Seconds to postpone playing the animation. For the current entry it postpones
    /// incrementing the track time; for a queued entry it is the time from the start of the
    /// previous entry to when this one becomes current.
    pub delay: f32,
    pub track_time: f32,
    pub track_last: f32,
    pub next_track_last: f32,
    /// Track time at which the track is cleared when nothing is queued after this entry.
    pub track_end: f32,

    pub animation_start: f32,
    pub animation_end: f32,
    pub animation_last: f32,
    pub next_animation_last: f32,
    pub time_scale: f32,

    pub alpha: f32,
    pub mix_time: f32,
    pub mix_duration: f32,

    pub(crate) next: Option<EntryId>,
    pub(crate) mixing_from: Option<EntryId>,
    pub(crate) listener: Option<Box<dyn AnimationStateListener<P>>>,
    // Set when the listener is replaced or cleared through a handle.
    pub(crate) listener_replaced: bool,
    pub(crate) timelines_first: Vec<bool>,
}

impl<P> TrackEntry<P> {
    pub(crate) fn new(track_index: usize, animation: Arc<Animation<P>>, looped: bool) -> Self {
        let animation_end = animation.duration;
        Self {
            track_index,
            animation,
            looped,
            event_threshold: 0.0,
            attachment_threshold: 0.0,
            draw_order_threshold: 0.0,
            delay: 0.0,
            track_time: 0.0,
            track_last: -1.0,
            next_track_last: -1.0,
            track_end: if looped { f32::MAX } else { animation_end },
            animation_start: 0.0,
            animation_end,
            animation_last: -1.0,
            next_animation_last: -1.0,
            time_scale: 1.0,
            alpha: 1.0,
            mix_time: 0.0,
            mix_duration: 0.0,
            next: None,
            mixing_from: None,
            listener: None,
            listener_replaced: false,
            timelines_first: Vec::new(),
        }
    }

    /// Maps the track time into `[animation_start, animation_end]`.
    pub fn animation_time(&self) -> f32 {
        if self.looped {
            let duration = self.animation_end - self.animation_start;
            if duration == 0.0 {
                return self.animation_start;
            }
            return self.track_time % duration + self.animation_start;
        }
        (self.track_time + self.animation_start).min(self.animation_end)
    }

    /// True once at least one loop has been played.
    pub fn is_complete(&self) -> bool {
        self.track_time >= self.animation_end - self.animation_start
    }

    /// The entry queued to play after this one.
    pub fn next(&self) -> Option<TrackEntryHandle> {
        self.next.map(TrackEntryHandle::new)
    }

    /// The entry being mixed out while this one mixes in.
    pub fn mixing_from(&self) -> Option<TrackEntryHandle> {
        self.mixing_from.map(TrackEntryHandle::new)
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn mix_percent(&self) -> f32 {
        if self.mix_duration == 0.0 {
            1.0
        } else {
            self.mix_time / self.mix_duration
        }
    }
}

impl<P> fmt::Debug for TrackEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackEntry")
            .field("track_index", &self.track_index)
            .field("animation", &self.animation.name)
            .field("looped", &self.looped)
            .field("delay", &self.delay)
            .field("track_time", &self.track_time)
            .field("track_last", &self.track_last)
            .field("track_end", &self.track_end)
            .field("animation_start", &self.animation_start)
            .field("animation_end", &self.animation_end)
            .field("animation_last", &self.animation_last)
            .field("time_scale", &self.time_scale)
            .field("alpha", &self.alpha)
            .field("mix_time", &self.mix_time)
            .field("mix_duration", &self.mix_duration)
            .field("next", &self.next)
            .field("mixing_from", &self.mixing_from)
            .finish()
    }
}

impl<P> fmt::Display for TrackEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.animation.name)
    }
}

/// Refers to a [`TrackEntry`] owned by an [`AnimationState`].
///
/// A handle stops resolving once its entry has been disposed; setters on a stale handle do
/// nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackEntryHandle {
    id: EntryId,
}

impl TrackEntryHandle {
    pub(crate) fn new(id: EntryId) -> Self {
        Self { id }
    }

    pub(crate) fn id(&self) -> EntryId {
        self.id
    }

    fn with_entry_mut<P>(&self, state: &mut AnimationState<P>, f: impl FnOnce(&mut TrackEntry<P>)) {
        if let Some(entry) = state.entry_mut(self.id) {
            f(entry);
        }
    }

    pub fn is_alive<P>(&self, state: &AnimationState<P>) -> bool {
        state.track_entry(*self).is_some()
    }

    /// Replaces the entry's own listener. It is notified before the state's listeners. Safe to
    /// call from the entry's listener itself.
    pub fn set_listener<P, L: AnimationStateListener<P> + 'static>(
        &self,
        state: &mut AnimationState<P>,
        listener: L,
    ) {
        self.with_entry_mut(state, |entry| {
            entry.listener = Some(Box::new(listener));
            entry.listener_replaced = true;
        });
    }

    pub fn clear_listener<P>(&self, state: &mut AnimationState<P>) {
        self.with_entry_mut(state, |entry| {
            entry.listener = None;
            entry.listener_replaced = true;
        });
    }

    pub fn set_loop<P>(&self, state: &mut AnimationState<P>, looped: bool) {
        self.with_entry_mut(state, |entry| {
            entry.looped = looped;
        });
    }

    pub fn set_delay<P>(&self, state: &mut AnimationState<P>, delay: f32) {
        self.with_entry_mut(state, |entry| {
            entry.delay = delay;
        });
    }

    pub fn set_track_time<P>(&self, state: &mut AnimationState<P>, track_time: f32) {
        self.with_entry_mut(state, |entry| {
            entry.track_time = track_time;
        });
    }

    pub fn set_track_end<P>(&self, state: &mut AnimationState<P>, track_end: f32) {
        self.with_entry_mut(state, |entry| {
            entry.track_end = track_end;
        });
    }

    pub fn set_animation_start<P>(&self, state: &mut AnimationState<P>, animation_start: f32) {
        self.with_entry_mut(state, |entry| {
            entry.animation_start = animation_start;
        });
    }

    pub fn set_animation_end<P>(&self, state: &mut AnimationState<P>, animation_end: f32) {
        self.with_entry_mut(state, |entry| {
            entry.animation_end = animation_end;
        });
    }

    /// Also sets the staged value, so the change survives the next update.
    pub fn set_animation_last<P>(&self, state: &mut AnimationState<P>, animation_last: f32) {
        self.with_entry_mut(state, |entry| {
            entry.animation_last = animation_last;
            entry.next_animation_last = animation_last;
        });
    }

    pub fn set_time_scale<P>(&self, state: &mut AnimationState<P>, time_scale: f32) {
        self.with_entry_mut(state, |entry| {
            entry.time_scale = time_scale;
        });
    }

    pub fn set_alpha<P>(&self, state: &mut AnimationState<P>, alpha: f32) {
        self.with_entry_mut(state, |entry| {
            entry.alpha = alpha;
        });
    }

    pub fn set_event_threshold<P>(&self, state: &mut AnimationState<P>, threshold: f32) {
        self.with_entry_mut(state, |entry| {
            entry.event_threshold = threshold;
        });
    }

    pub fn set_attachment_threshold<P>(&self, state: &mut AnimationState<P>, threshold: f32) {
        self.with_entry_mut(state, |entry| {
            entry.attachment_threshold = threshold;
        });
    }

    pub fn set_draw_order_threshold<P>(&self, state: &mut AnimationState<P>, threshold: f32) {
        self.with_entry_mut(state, |entry| {
            entry.draw_order_threshold = threshold;
        });
    }

    pub fn set_mix_time<P>(&self, state: &mut AnimationState<P>, mix_time: f32) {
        self.with_entry_mut(state, |entry| {
            entry.mix_time = mix_time;
        });
    }

    /// Must be set before the next update to take effect for the whole mix.
    pub fn set_mix_duration<P>(&self, state: &mut AnimationState<P>, mix_duration: f32) {
        self.with_entry_mut(state, |entry| {
            entry.mix_duration = mix_duration;
        });
    }
}

/// What a listener is told about the entry a notification refers to.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackEntrySnapshot {
    pub handle: TrackEntryHandle,
    pub track_index: usize,
    pub animation_name: String,
    pub looped: bool,
    pub track_time: f32,
    pub animation_time: f32,
}

impl TrackEntrySnapshot {
    pub(crate) fn of<P>(id: EntryId, entry: &TrackEntry<P>) -> Self {
        Self {
            handle: TrackEntryHandle::new(id),
            track_index: entry.track_index,
            animation_name: entry.animation.name.clone(),
            looped: entry.looped,
            track_time: entry.track_time,
            animation_time: entry.animation_time(),
        }
    }
}
