use crate::{
    Animation, AnimationSet, AnimationState, AnimationStateData, AnimationStateListener, Event,
    EventTimeline, Timeline, TimelineKind, TrackEntrySnapshot,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

pub(super) fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct Call {
    pub timeline: String,
    pub last_time: f32,
    pub time: f32,
    pub alpha: f32,
    pub setup_pose: bool,
    pub mixing_out: bool,
    pub events: bool,
}

/// Property values keyed by property id. Properties start at a setup value of 0.
#[derive(Debug, Default)]
pub(super) struct TestPose {
    pub values: HashMap<u64, f32>,
    pub calls: Vec<Call>,
}

impl TestPose {
    pub fn value(&self, property: u64) -> f32 {
        self.values.get(&property).copied().unwrap_or(0.0)
    }

    pub fn calls_for(&self, timeline: &str) -> Vec<&Call> {
        self.calls.iter().filter(|c| c.timeline == timeline).collect()
    }
}

/// Keys a constant value on one property and records every application.
pub(super) struct ValueTimeline {
    pub name: String,
    pub property: u64,
    pub kind: TimelineKind,
    pub value: f32,
}

impl ValueTimeline {
    pub fn boxed(name: &str, property: u64, value: f32) -> Box<dyn Timeline<TestPose>> {
        Self::boxed_kind(name, property, TimelineKind::Property, value)
    }

    pub fn boxed_kind(
        name: &str,
        property: u64,
        kind: TimelineKind,
        value: f32,
    ) -> Box<dyn Timeline<TestPose>> {
        Box::new(Self {
            name: name.to_string(),
            property,
            kind,
            value,
        })
    }
}

impl Timeline<TestPose> for ValueTimeline {
    fn property_id(&self) -> u64 {
        self.property
    }

    fn kind(&self) -> TimelineKind {
        self.kind
    }

    fn apply(
        &self,
        pose: &mut TestPose,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        setup_pose: bool,
        mixing_out: bool,
    ) {
        pose.calls.push(Call {
            timeline: self.name.clone(),
            last_time,
            time,
            alpha,
            setup_pose,
            mixing_out,
            events: events.is_some(),
        });
        let base = if setup_pose { 0.0 } else { pose.value(self.property) };
        pose.values
            .insert(self.property, base + (self.value - base) * alpha);
    }
}

pub(super) fn events(keys: &[(f32, &str)]) -> Box<dyn Timeline<TestPose>> {
    Box::new(EventTimeline::new(
        keys.iter().map(|(time, name)| Event::new(*time, *name)).collect(),
    ))
}

pub(super) fn clip(
    name: &str,
    duration: f32,
    timelines: Vec<Box<dyn Timeline<TestPose>>>,
) -> Animation<TestPose> {
    Animation::new(name, duration, timelines)
}

pub(super) fn state_data(clips: Vec<Animation<TestPose>>) -> AnimationStateData<TestPose> {
    let mut set = AnimationSet::new();
    for clip in clips {
        set.add(clip);
    }
    AnimationStateData::new(Arc::new(set))
}

pub(super) type Rows = Rc<RefCell<Vec<String>>>;

/// Records every notification as "<kind> <animation>" (events as "event <animation> <name>").
pub(super) struct Recorder {
    pub prefix: &'static str,
    pub rows: Rows,
}

impl Recorder {
    fn push(&self, row: String) {
        self.rows.borrow_mut().push(format!("{}{row}", self.prefix));
    }
}

impl<P> AnimationStateListener<P> for Recorder {
    fn start(&mut self, _state: &mut AnimationState<P>, entry: &TrackEntrySnapshot) {
        self.push(format!("start {}", entry.animation_name));
    }

    fn interrupt(&mut self, _state: &mut AnimationState<P>, entry: &TrackEntrySnapshot) {
        self.push(format!("interrupt {}", entry.animation_name));
    }

    fn end(&mut self, _state: &mut AnimationState<P>, entry: &TrackEntrySnapshot) {
        self.push(format!("end {}", entry.animation_name));
    }

    fn dispose(&mut self, _state: &mut AnimationState<P>, entry: &TrackEntrySnapshot) {
        self.push(format!("dispose {}", entry.animation_name));
    }

    fn complete(&mut self, _state: &mut AnimationState<P>, entry: &TrackEntrySnapshot) {
        self.push(format!("complete {}", entry.animation_name));
    }

    fn event(&mut self, _state: &mut AnimationState<P>, entry: &TrackEntrySnapshot, event: &Event) {
        self.push(format!("event {} {}", entry.animation_name, event.name));
    }
}

/// Builds a state over `clips` with a recorder attached.
pub(super) fn recorded_state(clips: Vec<Animation<TestPose>>) -> (AnimationState<TestPose>, Rows) {
    recorded_state_with(state_data(clips))
}

pub(super) fn recorded_state_with(
    data: AnimationStateData<TestPose>,
) -> (AnimationState<TestPose>, Rows) {
    let mut state = AnimationState::new(data);
    let rows = Rows::default();
    state.add_listener(Recorder {
        prefix: "",
        rows: rows.clone(),
    });
    (state, rows)
}

pub(super) fn take_rows(rows: &Rows) -> Vec<String> {
    std::mem::take(&mut *rows.borrow_mut())
}
