use super::entry_pool::EntryId;

/// The current entry of every track, indexed by track. Grows to the highest track written;
/// unused lower tracks stay empty.
#[derive(Debug, Default)]
pub(crate) struct TrackTable {
    tracks: Vec<Option<EntryId>>,
}

impl TrackTable {
    pub(crate) fn len(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn get(&self, track_index: usize) -> Option<EntryId> {
        self.tracks.get(track_index).copied().flatten()
    }

    /// Makes `track_index` addressable and returns its current entry, if any.
    pub(crate) fn expand_to_index(&mut self, track_index: usize) -> Option<EntryId> {
        if track_index >= self.tracks.len() {
            self.tracks.resize(track_index + 1, None);
        }
        self.tracks[track_index]
    }

    pub(crate) fn set(&mut self, track_index: usize, entry: Option<EntryId>) {
        self.expand_to_index(track_index);
        self.tracks[track_index] = entry;
    }

    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Current entries in track order.
    pub(crate) fn current_entries(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.tracks.iter().filter_map(|t| *t)
    }
}
