//! Content-source collaborator: the subscription contract consumed by the
//! browse manager, plus a local-filesystem implementation of it.
//!
//! A source pushes `ChildrenLoaded`/`SubscriptionError` events onto the bus
//! it is handed at connect time; the browse manager never polls it.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::sync::broadcast::Sender;

use crate::metadata_tags;
use crate::protocol::{BrowsableItem, BrowseMessage, Message};

/// Node id browsed when the caller does not name one.
pub const ROOT_NODE_ID: &str = "root";

const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "ogg", "flac", "m4a"];

#[derive(Debug, thiserror::Error)]
pub enum MediaSourceError {
    #[error("media source is not connected")]
    NotConnected,
    #[error("none of the configured library folders exist")]
    NoLibraryFolders,
    #[error("unknown node id: {0}")]
    UnknownNode(String),
    #[error("failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Hierarchical content source keyed by opaque node ids.
pub trait MediaSource: Send {
    /// Connects the source and hands it the bus endpoint used to push
    /// subscription events. Failure is terminal for the session.
    fn connect(&mut self, events: Sender<Message>) -> Result<(), MediaSourceError>;

    /// Drops the bus endpoint and any subscription. Safe to call repeatedly.
    fn disconnect(&mut self);

    fn root_node(&self) -> String;

    /// Re-targets the single subscription to `node_id` and pushes an initial
    /// `ChildrenLoaded` (or `SubscriptionError`) onto the bus.
    fn subscribe(&mut self, node_id: &str) -> Result<(), MediaSourceError>;

    fn unsubscribe(&mut self, node_id: &str);
}

/// Media source backed by the configured library folders on local disk.
///
/// The root node lists the library folders; every other node id is the
/// absolute path of a directory below one of them. Item ids are path strings,
/// unique within their parent.
pub struct LocalMediaSource {
    folders: Vec<PathBuf>,
    events: Option<Sender<Message>>,
    subscription: Option<String>,
}

impl LocalMediaSource {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self {
            folders,
            events: None,
            subscription: None,
        }
    }

    fn node_is_known(&self, path: &Path) -> bool {
        // Canonicalize both sides so traversal segments in a node id cannot
        // reach directories outside the configured folders.
        let Ok(resolved) = path.canonicalize() else {
            return false;
        };
        if !resolved.is_dir() {
            return false;
        }
        self.folders.iter().any(|folder| {
            folder
                .canonicalize()
                .map(|folder| resolved.starts_with(&folder))
                .unwrap_or(false)
        })
    }

    fn load_children(&self, node_id: &str) -> Result<Vec<BrowsableItem>, MediaSourceError> {
        if node_id == ROOT_NODE_ID {
            return Ok(self
                .folders
                .iter()
                .filter(|folder| folder.is_dir())
                .map(|folder| folder_item(folder))
                .collect());
        }

        let path = Path::new(node_id);
        if !self.node_is_known(path) {
            return Err(MediaSourceError::UnknownNode(node_id.to_string()));
        }

        let entries = fs::read_dir(path).map_err(|err| MediaSourceError::Unreadable {
            path: node_id.to_string(),
            reason: err.to_string(),
        })?;

        let mut items = Vec::new();
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                items.push(folder_item(&entry_path));
            } else if is_audio_file(&entry_path) {
                items.push(track_item(&entry_path));
            }
        }

        // Folders before tracks, each group alphabetical, so repeated loads
        // of one node always render in the same order.
        items.sort_by(|a, b| {
            (!a.browsable, a.title.to_lowercase()).cmp(&(!b.browsable, b.title.to_lowercase()))
        });
        Ok(items)
    }

    fn push_children(&self, node_id: &str) {
        let Some(events) = &self.events else {
            return;
        };
        match self.load_children(node_id) {
            Ok(items) => {
                debug!("Loaded {} item(s) for node {}", items.len(), node_id);
                let _ = events.send(Message::Browse(BrowseMessage::ChildrenLoaded {
                    parent_id: node_id.to_string(),
                    items,
                }));
            }
            Err(err) => {
                warn!("Failed to load children for node {}: {}", node_id, err);
                let _ = events.send(Message::Browse(BrowseMessage::SubscriptionError {
                    node_id: node_id.to_string(),
                    reason: err.to_string(),
                }));
            }
        }
    }
}

impl MediaSource for LocalMediaSource {
    fn connect(&mut self, events: Sender<Message>) -> Result<(), MediaSourceError> {
        if !self.folders.iter().any(|folder| folder.is_dir()) {
            return Err(MediaSourceError::NoLibraryFolders);
        }
        self.events = Some(events);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.subscription = None;
        self.events = None;
    }

    fn root_node(&self) -> String {
        ROOT_NODE_ID.to_string()
    }

    fn subscribe(&mut self, node_id: &str) -> Result<(), MediaSourceError> {
        if self.events.is_none() {
            return Err(MediaSourceError::NotConnected);
        }
        self.subscription = Some(node_id.to_string());
        self.push_children(node_id);
        Ok(())
    }

    fn unsubscribe(&mut self, node_id: &str) {
        if self.subscription.as_deref() == Some(node_id) {
            self.subscription = None;
        }
    }
}

fn is_audio_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lowered = ext.to_lowercase();
            AUDIO_EXTENSIONS.iter().any(|known| *known == lowered)
        })
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn folder_item(path: &Path) -> BrowsableItem {
    BrowsableItem {
        id: path.to_string_lossy().into_owned(),
        title: display_name(path),
        subtitle: String::new(),
        locator: Some(path.to_path_buf()),
        browsable: true,
    }
}

fn track_item(path: &Path) -> BrowsableItem {
    let metadata = metadata_tags::read_display_metadata(path).unwrap_or_default();
    let title = if metadata.title.is_empty() {
        display_name(path)
    } else {
        metadata.title.clone()
    };
    BrowsableItem {
        id: path.to_string_lossy().into_owned(),
        title,
        subtitle: metadata_tags::format_subtitle(&metadata),
        locator: Some(path.to_path_buf()),
        browsable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_audio_file, LocalMediaSource, MediaSource, MediaSourceError, ROOT_NODE_ID};
    use crate::protocol::{BrowseMessage, Message};
    use std::fs;
    use std::path::Path;
    use tokio::sync::broadcast::{self, error::TryRecvError, Receiver};

    fn next_browse_message(receiver: &mut Receiver<Message>) -> BrowseMessage {
        loop {
            match receiver.try_recv() {
                Ok(Message::Browse(message)) => return message,
                Ok(_) => continue,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(err) => panic!("no browse message on the bus: {:?}", err),
            }
        }
    }

    #[test]
    fn test_connect_fails_without_any_existing_library_folder() {
        let (bus_sender, _) = broadcast::channel(16);
        let mut source = LocalMediaSource::new(vec!["/nonexistent/library".into()]);
        let result = source.connect(bus_sender);
        assert!(matches!(result, Err(MediaSourceError::NoLibraryFolders)));
    }

    #[test]
    fn test_subscribe_requires_connect() {
        let mut source = LocalMediaSource::new(vec![]);
        assert!(matches!(
            source.subscribe(ROOT_NODE_ID),
            Err(MediaSourceError::NotConnected)
        ));
    }

    #[test]
    fn test_root_node_lists_library_folders() {
        let library = tempfile::tempdir().expect("tempdir");
        let (bus_sender, mut receiver) = broadcast::channel(16);

        let mut source = LocalMediaSource::new(vec![library.path().to_path_buf()]);
        source.connect(bus_sender).expect("connect");
        source.subscribe(ROOT_NODE_ID).expect("subscribe");

        match next_browse_message(&mut receiver) {
            BrowseMessage::ChildrenLoaded { parent_id, items } => {
                assert_eq!(parent_id, ROOT_NODE_ID);
                assert_eq!(items.len(), 1);
                assert!(items[0].browsable);
                assert_eq!(items[0].id, library.path().to_string_lossy());
            }
            other => panic!("expected ChildrenLoaded, got {:?}", other),
        }
    }

    #[test]
    fn test_folder_node_lists_folders_before_tracks() {
        let library = tempfile::tempdir().expect("tempdir");
        fs::create_dir(library.path().join("zz-album")).expect("mkdir");
        fs::write(library.path().join("aa-track.mp3"), b"").expect("write");
        fs::write(library.path().join("notes.txt"), b"").expect("write");

        let (bus_sender, mut receiver) = broadcast::channel(16);
        let mut source = LocalMediaSource::new(vec![library.path().to_path_buf()]);
        source.connect(bus_sender).expect("connect");
        source
            .subscribe(&library.path().to_string_lossy())
            .expect("subscribe");

        match next_browse_message(&mut receiver) {
            BrowseMessage::ChildrenLoaded { items, .. } => {
                assert_eq!(items.len(), 2);
                assert!(items[0].browsable);
                assert_eq!(items[0].title, "zz-album");
                assert!(!items[1].browsable);
                // Untagged file falls back to its file stem.
                assert_eq!(items[1].title, "aa-track");
            }
            other => panic!("expected ChildrenLoaded, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_node_pushes_subscription_error() {
        let library = tempfile::tempdir().expect("tempdir");
        let (bus_sender, mut receiver) = broadcast::channel(16);
        let mut source = LocalMediaSource::new(vec![library.path().to_path_buf()]);
        source.connect(bus_sender).expect("connect");
        source.subscribe("/outside/the/library").expect("subscribe");

        match next_browse_message(&mut receiver) {
            BrowseMessage::SubscriptionError { node_id, .. } => {
                assert_eq!(node_id, "/outside/the/library");
            }
            other => panic!("expected SubscriptionError, got {:?}", other),
        }
    }

    #[test]
    fn test_node_escaping_the_library_via_traversal_is_rejected() {
        let library = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("tempdir");
        let escape = library
            .path()
            .join("..")
            .join(outside.path().file_name().expect("dir name"));

        let (bus_sender, mut receiver) = broadcast::channel(16);
        let mut source = LocalMediaSource::new(vec![library.path().to_path_buf()]);
        source.connect(bus_sender).expect("connect");
        source
            .subscribe(&escape.to_string_lossy())
            .expect("subscribe");

        match next_browse_message(&mut receiver) {
            BrowseMessage::SubscriptionError { node_id, .. } => {
                assert_eq!(node_id, escape.to_string_lossy());
            }
            other => panic!("expected SubscriptionError, got {:?}", other),
        }
    }

    #[test]
    fn test_is_audio_file_checks_extension_case_insensitively() {
        let library = tempfile::tempdir().expect("tempdir");
        let flac = library.path().join("song.FLAC");
        let text = library.path().join("song.txt");
        fs::write(&flac, b"").expect("write");
        fs::write(&text, b"").expect("write");

        assert!(is_audio_file(&flac));
        assert!(!is_audio_file(&text));
        assert!(!is_audio_file(Path::new("/missing/song.mp3")));
    }
}
