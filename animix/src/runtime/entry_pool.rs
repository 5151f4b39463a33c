use super::track_entry::TrackEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct EntryId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct EntrySlot<P> {
    generation: u32,
    entry: Option<TrackEntry<P>>,
    // Keeps the timelines-first buffer of the last released entry for the next one.
    spare_flags: Vec<bool>,
}

/// Generational arena holding every live track entry. Released slots go on a free list and
/// are reused by later entries; an [`EntryId`] from before the release no longer resolves.
#[derive(Debug)]
pub(crate) struct EntryPool<P> {
    slots: Vec<EntrySlot<P>>,
    free_list: Vec<usize>,
}

impl<P> Default for EntryPool<P> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

impl<P> EntryPool<P> {
    pub(crate) fn acquire(&mut self, mut entry: TrackEntry<P>) -> EntryId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index];
            let mut flags = std::mem::take(&mut slot.spare_flags);
            flags.clear();
            entry.timelines_first = flags;
            slot.entry = Some(entry);
            EntryId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len();
            self.slots.push(EntrySlot {
                generation: 0,
                entry: Some(entry),
                spare_flags: Vec::new(),
            });
            EntryId {
                index,
                generation: 0,
            }
        }
    }

    /// Returns the entry's slot to the free list. Releasing a stale id does nothing.
    pub(crate) fn release(&mut self, id: EntryId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index) else {
            return false;
        };
        if slot.generation != id.generation {
            return false;
        }
        let Some(entry) = slot.entry.take() else {
            return false;
        };
        slot.spare_flags = entry.timelines_first;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        true
    }

    pub(crate) fn get(&self, id: EntryId) -> Option<&TrackEntry<P>> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut TrackEntry<P>> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Number of entries currently acquired.
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}
