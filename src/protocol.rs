//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the browse
//! manager, the thumbnail fetcher, the playback session, and the view layer.

use std::path::PathBuf;
use std::sync::Arc;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Browse(BrowseMessage),
    Playback(PlaybackMessage),
    Thumbnail(ThumbnailMessage),
}

/// One entry of a browsed content node.
///
/// Immutable once received from the content source; the only per-row state
/// that changes afterwards is the thumbnail slot kept in the list model.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowsableItem {
    /// Stable id, unique within the parent node.
    pub id: String,
    /// Primary display line.
    pub title: String,
    /// Secondary display line.
    pub subtitle: String,
    /// Resource the thumbnail is derived from, if any.
    pub locator: Option<PathBuf>,
    /// Whether the entry is itself a browsable sub-node rather than a
    /// playable leaf.
    pub browsable: bool,
}

/// Decoded RGBA thumbnail, sized for list rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixel data, `width * height * 4` bytes.
    pub pixels: Arc<[u8]>,
}

/// Browse-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum BrowseMessage {
    /// Re-target the single subscription to another content node.
    OpenNode(String),
    /// Return to the previously subscribed node, if any.
    NavigateBack,
    /// User selected the row at this position in the rendered list.
    SelectItem(usize),
    /// The content source delivered a fresh child list for a node.
    ChildrenLoaded {
        parent_id: String,
        items: Vec<BrowsableItem>,
    },
    /// The content source failed to deliver children for a node. The last
    /// known good list stays on screen.
    SubscriptionError { node_id: String, reason: String },
    /// Emitted after a subscription error leaves the displayed list stale.
    /// Hook for future retry logic; nothing consumes it today.
    SubscriptionStalled { node_id: String },
    /// Selection result for the parent coordinator, fired exactly once per
    /// `SelectItem`.
    ItemSelected {
        item: BrowsableItem,
        is_playing: bool,
    },
    /// Render signal: the list content or highlighting changed.
    ListChanged(ListSnapshot),
    /// Tear down the browse session and exit the manager loop.
    Shutdown,
}

/// Thumbnail-domain commands and notifications.
///
/// Results are tagged with the list generation and row position they were
/// requested for, so late arrivals against a replaced list can be discarded.
#[derive(Debug, Clone)]
pub enum ThumbnailMessage {
    Fetch {
        generation: u64,
        position: usize,
        locator: PathBuf,
    },
    Fetched {
        generation: u64,
        position: usize,
        thumbnail: Thumbnail,
    },
    FetchFailed {
        generation: u64,
        position: usize,
        reason: String,
    },
}

/// Playback-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    Play(String),
    Pause,
    Resume,
    Stop,
    /// Playback-state stream consumed by the highlight logic. Arrives
    /// independently of any list generation.
    NowPlayingChanged {
        item_id: Option<String>,
        is_playing: bool,
    },
}

/// Renderable view of the current list, published on every model change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSnapshot {
    /// Node the rows belong to, once known.
    pub node_id: Option<String>,
    pub rows: Vec<RowSnapshot>,
}

/// Renderable view of one list row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    pub title: String,
    pub subtitle: String,
    pub browsable: bool,
    pub has_thumbnail: bool,
    /// Whether this row is the currently playing item.
    pub highlighted: bool,
}
