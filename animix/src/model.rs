use crate::Timeline;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const PROPERTY_ROTATE: u64 = 1 << 0;
pub const PROPERTY_X: u64 = 1 << 1;
pub const PROPERTY_Y: u64 = 1 << 2;
pub const PROPERTY_SCALE_X: u64 = 1 << 3;
pub const PROPERTY_SCALE_Y: u64 = 1 << 4;
pub const PROPERTY_SHEAR_X: u64 = 1 << 5;
pub const PROPERTY_SHEAR_Y: u64 = 1 << 6;
pub const PROPERTY_RGB: u64 = 1 << 8;
pub const PROPERTY_ALPHA: u64 = 1 << 9;
pub const PROPERTY_ATTACHMENT: u64 = 1 << 11;
pub const PROPERTY_DEFORM: u64 = 1 << 12;
pub const PROPERTY_EVENT: u64 = 1 << 13;
pub const PROPERTY_DRAW_ORDER: u64 = 1 << 14;

/// Packs a property category and the index of the thing it targets (bone, slot, ...) into
/// the id used to decide which entry touches a property first.
pub fn property_id(property: u64, target: u32) -> u64 {
    (property << 32) | u64::from(target)
}

/// Category of a timeline, as far as mixing is concerned.
///
/// `Attachment` and `DrawOrder` timelines of an entry being mixed out are skipped once the mix
/// passes the entry's attachment/draw order threshold. `Event` timelines only fire while the
/// event sink is handed to them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TimelineKind {
    Property,
    Attachment,
    DrawOrder,
    Event,
}

/// A custom event key fired by an animation.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f32,
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
}

impl Event {
    pub fn new(time: f32, name: impl Into<String>) -> Self {
        Self {
            time,
            name: name.into(),
            int_value: 0,
            float_value: 0.0,
            string: String::new(),
        }
    }

    pub fn with_string(mut self, string: impl Into<String>) -> Self {
        self.string = string.into();
        self
    }
}

pub(crate) const EMPTY_ANIMATION_NAME: &str = "<empty>";

/// A named clip: a duration and the timelines that pose `P` over it.
pub struct Animation<P> {
    pub name: String,
    pub duration: f32,
    pub timelines: Vec<Box<dyn Timeline<P>>>,
}

impl<P> Animation<P> {
    pub fn new(name: impl Into<String>, duration: f32, timelines: Vec<Box<dyn Timeline<P>>>) -> Self {
        Self {
            name: name.into(),
            duration,
            timelines,
        }
    }

    /// The zero-duration clip with no timelines, used to mix tracks back to the setup pose.
    pub fn empty() -> Self {
        Self::new(EMPTY_ANIMATION_NAME, 0.0, Vec::new())
    }
}

impl<P> fmt::Debug for Animation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("name", &self.name)
            .field("duration", &self.duration)
            .field("timelines", &self.timelines.len())
            .finish()
    }
}

/// The clips an [`AnimationState`](crate::AnimationState) can schedule by name.
pub struct AnimationSet<P> {
    animations: Vec<Arc<Animation<P>>>,
    animation_index: HashMap<String, usize>,
}

impl<P> Default for AnimationSet<P> {
    fn default() -> Self {
        Self {
            animations: Vec::new(),
            animation_index: HashMap::new(),
        }
    }
}

impl<P> AnimationSet<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clip, replacing any clip already registered under the same name.
    pub fn add(&mut self, animation: Animation<P>) -> Arc<Animation<P>> {
        let animation = Arc::new(animation);
        match self.animation_index.get(&animation.name) {
            Some(&index) => self.animations[index] = animation.clone(),
            None => {
                self.animation_index
                    .insert(animation.name.clone(), self.animations.len());
                self.animations.push(animation.clone());
            }
        }
        animation
    }

    pub fn animation(&self, name: &str) -> Option<&Arc<Animation<P>>> {
        let index = *self.animation_index.get(name)?;
        self.animations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Animation<P>>> {
        self.animations.iter()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

impl<P> fmt::Debug for AnimationSet<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.animations.iter().map(|a| &a.name))
            .finish()
    }
}
