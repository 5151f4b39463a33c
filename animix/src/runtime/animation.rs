use crate::{Event, PROPERTY_EVENT, TimelineKind, property_id};

/// One keyed property of an [`Animation`](crate::Animation), applied to a pose of type `P`.
///
/// The animation state never looks inside `P`; it only decides the arguments:
///
/// - `last_time`/`time`: the animation time range since the previous application. `last_time`
///   is `-1` the first time an entry is applied so keys at time 0 trigger.
/// - `events`: sink for fired [`Event`]s, or `None` when events are suppressed for an entry
///   being mixed out.
/// - `alpha`: weight of this timeline's value against the current pose.
/// - `setup_pose`: when `true` this entry is the first to touch the property this pass, so the
///   timeline should mix from the setup value instead of the current pose.
/// - `mixing_out`: the entry is being mixed out.
pub trait Timeline<P>: Send + Sync {
    fn property_id(&self) -> u64;

    fn kind(&self) -> TimelineKind {
        TimelineKind::Property
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        pose: &mut P,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        setup_pose: bool,
        mixing_out: bool,
    );
}

/// Fires custom events keyed on an animation's timeline.
#[derive(Clone, Debug, Default)]
pub struct EventTimeline {
    events: Vec<Event>,
}

impl EventTimeline {
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Pushes events keyed in `(last_time, time]`. A `last_time` past `time` means the
    /// animation looped: the tail of the previous loop fires first, then the head of this one.
    pub fn fire(&self, last_time: f32, time: f32, out: &mut Vec<Event>) {
        let Some(last_key) = self.events.last() else {
            return;
        };

        let mut last_time = last_time;
        if last_time > time {
            self.fire(last_time, f32::MAX, out);
            last_time = -1.0;
        } else if last_time >= last_key.time {
            return;
        }

        out.extend(
            self.events
                .iter()
                .skip_while(|ev| ev.time <= last_time)
                .take_while(|ev| ev.time <= time)
                .cloned(),
        );
    }
}

impl<P> Timeline<P> for EventTimeline {
    fn property_id(&self) -> u64 {
        property_id(PROPERTY_EVENT, 0)
    }

    fn kind(&self) -> TimelineKind {
        TimelineKind::Event
    }

    fn apply(
        &self,
        _pose: &mut P,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        _alpha: f32,
        _setup_pose: bool,
        _mixing_out: bool,
    ) {
        if let Some(out) = events {
            self.fire(last_time, time, out);
        }
    }
}
