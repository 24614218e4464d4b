//! List and highlight state owned by the browse manager.
//!
//! `ItemListModel` holds the ordered child list of the subscribed node plus a
//! per-row thumbnail slot. Every wholesale replace bumps a generation counter;
//! asynchronous thumbnail results carry the generation they were requested
//! under and are discarded when it no longer matches.

use crate::protocol::{BrowsableItem, ListSnapshot, RowSnapshot, Thumbnail};

/// Position outside the bounds of the current list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("position {position} is out of range for a list of {len} item(s)")]
pub struct OutOfRangeError {
    pub position: usize,
    pub len: usize,
}

/// Ordered child list of one subscribed node.
#[derive(Debug, Default)]
pub struct ItemListModel {
    node_id: Option<String>,
    items: Vec<BrowsableItem>,
    thumbnails: Vec<Option<Thumbnail>>,
    generation: u64,
}

impl ItemListModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a fresh child list, clears all attached thumbnails and bumps
    /// the generation counter. Returns the new generation token used to tag
    /// thumbnail fetches issued for this list.
    pub fn replace(&mut self, node_id: &str, items: Vec<BrowsableItem>) -> u64 {
        self.thumbnails = vec![None; items.len()];
        self.items = items;
        self.node_id = Some(node_id.to_string());
        self.generation += 1;
        self.generation
    }

    /// Stores a resolved thumbnail for one row. Returns `false` without
    /// mutating anything when the result is stale (older generation) or the
    /// position is out of bounds for the current list.
    pub fn attach_thumbnail(
        &mut self,
        generation: u64,
        position: usize,
        thumbnail: Thumbnail,
    ) -> bool {
        if generation != self.generation || position >= self.items.len() {
            return false;
        }
        self.thumbnails[position] = Some(thumbnail);
        true
    }

    /// Empties the list and bumps the generation so results issued for any
    /// earlier list can no longer attach. The counter never restarts; it is
    /// monotonic for the model's whole lifetime, across session teardowns.
    pub fn clear(&mut self) -> u64 {
        self.items.clear();
        self.thumbnails.clear();
        self.node_id = None;
        self.generation += 1;
        self.generation
    }

    pub fn get(&self, position: usize) -> Result<&BrowsableItem, OutOfRangeError> {
        self.items.get(position).ok_or(OutOfRangeError {
            position,
            len: self.items.len(),
        })
    }

    pub fn items(&self) -> &[BrowsableItem] {
        &self.items
    }

    pub fn thumbnail(&self, position: usize) -> Option<&Thumbnail> {
        self.thumbnails.get(position).and_then(Option::as_ref)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Builds the render signal for the view layer: one row per item with
    /// thumbnail presence and highlight state folded in.
    pub fn snapshot(&self, highlight: &PlaybackHighlight) -> ListSnapshot {
        let rows = self
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| RowSnapshot {
                title: item.title.clone(),
                subtitle: item.subtitle.clone(),
                browsable: item.browsable,
                has_thumbnail: self.thumbnails[position].is_some(),
                highlighted: highlight.is_highlighted(&item.id),
            })
            .collect();
        ListSnapshot {
            node_id: self.node_id.clone(),
            rows,
        }
    }
}

/// Identity of the currently loaded item and whether it is actively playing.
///
/// Updated only from playback-state events, independent of list generations.
#[derive(Debug, Default)]
pub struct PlaybackHighlight {
    current_id: Option<String>,
    is_playing: bool,
}

impl PlaybackHighlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the state unconditionally. Returns whether anything changed.
    pub fn update(&mut self, current_id: Option<String>, is_playing: bool) -> bool {
        let changed = self.current_id != current_id || self.is_playing != is_playing;
        self.current_id = current_id;
        self.is_playing = is_playing;
        changed
    }

    /// True iff `item_id` is the current item and playback is active.
    pub fn is_highlighted(&self, item_id: &str) -> bool {
        self.is_playing && self.current_id.as_deref() == Some(item_id)
    }

    /// Id of the playing item, or `None` when paused/stopped.
    pub fn playing_item_id(&self) -> Option<&str> {
        if self.is_playing {
            self.current_id.as_deref()
        } else {
            None
        }
    }
}
