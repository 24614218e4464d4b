//! Browse orchestration: subscription lifecycle, list replacement, thumbnail
//! reconciliation, and playback highlighting.
//!
//! All model mutation happens on this manager's run loop. Thumbnail workers
//! and the content source only talk to it through bus messages, so late or
//! out-of-order completions are reconciled here via the generation tag and
//! never race the list they were requested for.

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::browse_model::{ItemListModel, PlaybackHighlight};
use crate::media_source::MediaSource;
use crate::protocol::{
    BrowsableItem, BrowseMessage, Message, PlaybackMessage, Thumbnail, ThumbnailMessage,
};

/// Connection lifecycle of the browse session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

pub struct BrowseManager {
    source: Box<dyn MediaSource>,
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    state: ConnectionState,
    subscribed_node: Option<String>,
    /// Nodes to return to on back navigation, innermost last.
    nav_stack: Vec<String>,
    list: ItemListModel,
    highlight: PlaybackHighlight,
}

impl BrowseManager {
    pub fn new(
        source: Box<dyn MediaSource>,
        bus_receiver: Receiver<Message>,
        bus_sender: Sender<Message>,
    ) -> Self {
        Self {
            source,
            bus_receiver,
            bus_sender,
            state: ConnectionState::Disconnected,
            subscribed_node: None,
            nav_stack: Vec::new(),
            list: ItemListModel::new(),
            highlight: PlaybackHighlight::new(),
        }
    }

    /// Connects the content source and subscribes to `node_id`, or to the
    /// source's root when none is given. Connection failure is terminal for
    /// this session: it is logged and the manager stays disconnected.
    pub fn start(&mut self, node_id: Option<String>) {
        if self.state != ConnectionState::Disconnected {
            warn!("Browse session already started");
            return;
        }
        self.state = ConnectionState::Connecting;
        match self.source.connect(self.bus_sender.clone()) {
            Ok(()) => {
                let node_id = node_id.unwrap_or_else(|| self.source.root_node());
                info!("Connected to media source, browsing node {}", node_id);
                self.subscribe_node(node_id);
            }
            Err(err) => {
                error!("Failed to connect to media source: {}", err);
                self.state = ConnectionState::Disconnected;
            }
        }
    }

    /// Tears the session down. Idempotent: calling it again once disconnected
    /// changes nothing.
    pub fn stop(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if let Some(node_id) = self.subscribed_node.take() {
            self.source.unsubscribe(&node_id);
        }
        self.source.disconnect();
        self.nav_stack.clear();
        // Clearing bumps the generation instead of resetting it, so workers
        // still in flight from this session cannot attach to the next one.
        self.list.clear();
        self.highlight = PlaybackHighlight::new();
        self.state = ConnectionState::Disconnected;
        info!("Browse session stopped");
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(message) => {
                    if !self.handle_message(message) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Browse manager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.stop();
    }

    /// Applies one bus message. Returns `false` when the loop should exit.
    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Browse(BrowseMessage::ChildrenLoaded { parent_id, items }) => {
                self.handle_children_loaded(parent_id, items);
            }
            Message::Browse(BrowseMessage::SubscriptionError { node_id, reason }) => {
                // Deliberately no recovery: the last known good list stays on
                // screen until a later delivery succeeds. The stalled
                // notification is the hook for future retry logic.
                warn!(
                    "Subscription error for node {}: {} (keeping last known list)",
                    node_id, reason
                );
                if self.subscribed_node.as_deref() == Some(node_id.as_str()) {
                    let _ = self
                        .bus_sender
                        .send(Message::Browse(BrowseMessage::SubscriptionStalled {
                            node_id,
                        }));
                }
            }
            Message::Browse(BrowseMessage::SelectItem(position)) => {
                self.handle_select_item(position);
            }
            Message::Browse(BrowseMessage::OpenNode(node_id)) => {
                self.handle_open_node(node_id);
            }
            Message::Browse(BrowseMessage::NavigateBack) => {
                self.handle_navigate_back();
            }
            Message::Browse(BrowseMessage::Shutdown) => return false,
            Message::Thumbnail(ThumbnailMessage::Fetched {
                generation,
                position,
                thumbnail,
            }) => {
                self.handle_thumbnail_fetched(generation, position, thumbnail);
            }
            Message::Thumbnail(ThumbnailMessage::FetchFailed {
                generation,
                position,
                reason,
            }) => {
                // Per-item failures are ignorable: the row keeps its
                // placeholder and no retry is issued.
                debug!(
                    "Ignoring failed thumbnail fetch for position {} (generation {}): {}",
                    position, generation, reason
                );
            }
            Message::Playback(PlaybackMessage::NowPlayingChanged {
                item_id,
                is_playing,
            }) => {
                if self.highlight.update(item_id, is_playing)
                    && self.state == ConnectionState::Subscribed
                {
                    self.publish_list_changed();
                }
            }
            _ => {}
        }
        true
    }

    fn handle_children_loaded(&mut self, parent_id: String, items: Vec<BrowsableItem>) {
        if self.state != ConnectionState::Subscribed
            || self.subscribed_node.as_deref() != Some(parent_id.as_str())
        {
            debug!(
                "Ignoring children delivery for node {} (not the subscribed node)",
                parent_id
            );
            return;
        }

        let generation = self.list.replace(&parent_id, items);
        debug!(
            "Replaced list for node {} with {} item(s), generation {}",
            parent_id,
            self.list.len(),
            generation
        );

        // Unordered fan-out, one request per row. Results come back tagged
        // with (generation, position) and are reconciled on this loop.
        for (position, item) in self.list.items().iter().enumerate() {
            if let Some(locator) = &item.locator {
                let _ = self
                    .bus_sender
                    .send(Message::Thumbnail(ThumbnailMessage::Fetch {
                        generation,
                        position,
                        locator: locator.clone(),
                    }));
            }
        }
        self.publish_list_changed();
    }

    fn handle_thumbnail_fetched(&mut self, generation: u64, position: usize, thumbnail: Thumbnail) {
        if self.state != ConnectionState::Subscribed {
            return;
        }
        if self.list.attach_thumbnail(generation, position, thumbnail) {
            self.publish_list_changed();
        } else {
            debug!(
                "Discarding stale thumbnail for position {} (generation {}, current {})",
                position,
                generation,
                self.list.generation()
            );
        }
    }

    fn handle_select_item(&mut self, position: usize) {
        if self.state != ConnectionState::Subscribed {
            warn!("Ignoring selection while not subscribed");
            return;
        }
        match self.list.get(position) {
            Ok(item) => {
                let is_playing = self.highlight.is_highlighted(&item.id);
                let _ = self
                    .bus_sender
                    .send(Message::Browse(BrowseMessage::ItemSelected {
                        item: item.clone(),
                        is_playing,
                    }));
            }
            Err(err) => warn!("Ignoring selection: {}", err),
        }
    }

    fn handle_open_node(&mut self, node_id: String) {
        if self.state != ConnectionState::Subscribed {
            warn!("Ignoring open request while not subscribed");
            return;
        }
        if self.subscribed_node.as_deref() == Some(node_id.as_str()) {
            debug!("Node {} is already open", node_id);
            return;
        }
        if let Some(current) = &self.subscribed_node {
            self.nav_stack.push(current.clone());
        }
        self.subscribe_node(node_id);
    }

    fn handle_navigate_back(&mut self) {
        if self.state != ConnectionState::Subscribed {
            warn!("Ignoring back navigation while not subscribed");
            return;
        }
        match self.nav_stack.pop() {
            Some(previous) => self.subscribe_node(previous),
            None => debug!("Already at the starting node"),
        }
    }

    /// Re-targets the single subscription. The previous node is unsubscribed
    /// first; the current list stays on screen until the new node's children
    /// arrive.
    fn subscribe_node(&mut self, node_id: String) {
        if let Some(previous) = self.subscribed_node.take() {
            if previous != node_id {
                self.source.unsubscribe(&previous);
            }
        }
        if let Err(err) = self.source.subscribe(&node_id) {
            warn!(
                "Failed to subscribe to node {}: {} (keeping last known list)",
                node_id, err
            );
            let _ = self
                .bus_sender
                .send(Message::Browse(BrowseMessage::SubscriptionStalled {
                    node_id: node_id.clone(),
                }));
        }
        // The target stays recorded even when the subscribe call failed, so a
        // later successful delivery for this node is still accepted.
        self.subscribed_node = Some(node_id);
        self.state = ConnectionState::Subscribed;
    }

    fn publish_list_changed(&self) {
        let _ = self
            .bus_sender
            .send(Message::Browse(BrowseMessage::ListChanged(
                self.list.snapshot(&self.highlight),
            )));
    }
}
