use super::entry_pool::EntryId;
use crate::Event;
use std::collections::VecDeque;

/// A lifecycle or custom-event notification for a track entry.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStateEvent {
    Start,
    Interrupt,
    End,
    Dispose,
    Complete,
    Event(Event),
}

#[derive(Clone, Debug)]
pub(crate) struct QueuedEvent {
    pub(crate) entry: EntryId,
    pub(crate) event: AnimationStateEvent,
}

/// Notifications produced by an update, apply or scheduling call, held until the call has
/// finished mutating tracks.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    records: VecDeque<QueuedEvent>,
    // Undelivered records of the running drain. Records behind them wait for the next drain.
    batch_remaining: usize,
    draining: bool,
}

impl EventQueue {
    fn push(&mut self, entry: EntryId, event: AnimationStateEvent) {
        self.records.push_back(QueuedEvent { entry, event });
    }

    pub(crate) fn start(&mut self, entry: EntryId) {
        self.push(entry, AnimationStateEvent::Start);
    }

    pub(crate) fn event(&mut self, entry: EntryId, event: Event) {
        self.push(entry, AnimationStateEvent::Event(event));
    }

    pub(crate) fn complete(&mut self, entry: EntryId) {
        self.push(entry, AnimationStateEvent::Complete);
    }

    pub(crate) fn interrupt(&mut self, entry: EntryId) {
        self.push(entry, AnimationStateEvent::Interrupt);
    }

    pub(crate) fn end(&mut self, entry: EntryId) {
        self.push(entry, AnimationStateEvent::End);
    }

    pub(crate) fn dispose(&mut self, entry: EntryId) {
        self.push(entry, AnimationStateEvent::Dispose);
    }

    /// Starts delivering the records queued so far. Returns `false` if a drain is already
    /// running.
    pub(crate) fn begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        self.batch_remaining = self.records.len();
        true
    }

    /// The next record of the running drain, or `None` once the batch is delivered or cleared.
    pub(crate) fn next_in_batch(&mut self) -> Option<QueuedEvent> {
        if self.batch_remaining == 0 {
            return None;
        }
        self.batch_remaining -= 1;
        self.records.pop_front()
    }

    pub(crate) fn finish_drain(&mut self) {
        self.draining = false;
        self.batch_remaining = 0;
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining
    }

    /// Drops every undelivered record, including the rest of a running drain, and returns them.
    pub(crate) fn clear(&mut self) -> Vec<QueuedEvent> {
        self.batch_remaining = 0;
        self.records.drain(..).collect()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.records.iter()
    }
}
