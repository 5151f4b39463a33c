mod animation;
mod animation_state;
mod entry_pool;
mod event_queue;
mod track_entry;
mod track_table;

pub use animation::*;
pub use animation_state::*;
pub use event_queue::AnimationStateEvent;
pub use track_entry::{TrackEntry, TrackEntryHandle, TrackEntrySnapshot};

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod entry_pool_tests;

#[cfg(test)]
mod event_queue_tests;
