//! Console rendering of the browse screen.
//!
//! Consumes list snapshots and selection events from the bus and prints them.
//! It also plays the coordinator role for selections: a browsable selection
//! turns into an open request, a playable one into a play command.

use log::warn;
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::protocol::{BrowseMessage, ListSnapshot, Message, PlaybackMessage, RowSnapshot};

pub struct ConsoleView {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
}

impl ConsoleView {
    pub fn new(bus_receiver: Receiver<Message>, bus_sender: Sender<Message>) -> Self {
        Self {
            bus_receiver,
            bus_sender,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(Message::Browse(message)) => {
                    if !self.handle_message(message) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Console view lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn handle_message(&mut self, message: BrowseMessage) -> bool {
        match message {
            BrowseMessage::ListChanged(snapshot) => render_list(&snapshot),
            BrowseMessage::ItemSelected { item, is_playing } => {
                if item.browsable {
                    let _ = self
                        .bus_sender
                        .send(Message::Browse(BrowseMessage::OpenNode(item.id)));
                } else if is_playing {
                    println!("{} is already playing", item.title);
                } else {
                    println!("Playing {}", item.title);
                    let _ = self
                        .bus_sender
                        .send(Message::Playback(PlaybackMessage::Play(item.id)));
                }
            }
            BrowseMessage::SubscriptionStalled { node_id } => {
                println!("Content for {} is currently unavailable, showing the last known list", node_id);
            }
            BrowseMessage::Shutdown => return false,
            _ => {}
        }
        true
    }
}

fn render_list(snapshot: &ListSnapshot) {
    match snapshot.node_id.as_deref() {
        Some(node_id) => println!("\n-- {} --", node_id),
        None => println!("\n-- (no node) --"),
    }
    if snapshot.rows.is_empty() {
        println!("  (empty)");
        return;
    }
    for (index, row) in snapshot.rows.iter().enumerate() {
        println!("{}", format_row(index, row));
    }
}

/// One printed list row: index, highlight marker, title with a trailing slash
/// for browsable nodes, subtitle, and an art marker once the thumbnail landed.
fn format_row(index: usize, row: &RowSnapshot) -> String {
    let marker = if row.highlighted { ">" } else { " " };
    let mut line = format!("{} {:>3}. {}", marker, index, row.title);
    if row.browsable {
        line.push('/');
    }
    if !row.subtitle.is_empty() {
        line.push_str(" | ");
        line.push_str(&row.subtitle);
    }
    if row.has_thumbnail {
        line.push_str(" [art]");
    }
    line
}
