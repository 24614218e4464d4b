//! Stand-in for the playback service session.
//!
//! The real playback engine lives outside this crate; the browse screen only
//! needs the session's now-playing stream. This stub answers transport
//! commands by tracking which item is loaded and whether it is playing, and
//! publishes `NowPlayingChanged` events the highlight logic consumes.

use log::{debug, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::protocol::{Message, PlaybackMessage};

pub struct PlaybackSessionStub {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    current_id: Option<String>,
    is_playing: bool,
}

impl PlaybackSessionStub {
    pub fn new(bus_receiver: Receiver<Message>, bus_sender: Sender<Message>) -> Self {
        Self {
            bus_receiver,
            bus_sender,
            current_id: None,
            is_playing: false,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(Message::Playback(message)) => self.handle_message(message),
                Ok(Message::Browse(crate::protocol::BrowseMessage::Shutdown)) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Playback session lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn handle_message(&mut self, message: PlaybackMessage) {
        match message {
            PlaybackMessage::Play(item_id) => {
                debug!("Session now playing {}", item_id);
                self.current_id = Some(item_id);
                self.is_playing = true;
                self.publish_state();
            }
            PlaybackMessage::Pause => {
                if self.current_id.is_some() && self.is_playing {
                    self.is_playing = false;
                    self.publish_state();
                }
            }
            PlaybackMessage::Resume => {
                if self.current_id.is_some() && !self.is_playing {
                    self.is_playing = true;
                    self.publish_state();
                }
            }
            PlaybackMessage::Stop => {
                if self.current_id.is_some() || self.is_playing {
                    self.current_id = None;
                    self.is_playing = false;
                    self.publish_state();
                }
            }
            PlaybackMessage::NowPlayingChanged { .. } => {}
        }
    }

    fn publish_state(&self) {
        let _ = self
            .bus_sender
            .send(Message::Playback(PlaybackMessage::NowPlayingChanged {
                item_id: self.current_id.clone(),
                is_playing: self.is_playing,
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackSessionStub;
    use crate::protocol::{Message, PlaybackMessage};
    use tokio::sync::broadcast::{self, error::TryRecvError, Receiver};

    fn next_state(receiver: &mut Receiver<Message>) -> (Option<String>, bool) {
        loop {
            match receiver.try_recv() {
                Ok(Message::Playback(PlaybackMessage::NowPlayingChanged {
                    item_id,
                    is_playing,
                })) => return (item_id, is_playing),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(err) => panic!("no now-playing event on the bus: {:?}", err),
            }
        }
    }

    fn assert_no_state(receiver: &mut Receiver<Message>) {
        loop {
            match receiver.try_recv() {
                Ok(Message::Playback(PlaybackMessage::NowPlayingChanged { .. })) => {
                    panic!("unexpected now-playing event")
                }
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => return,
            }
        }
    }

    fn session() -> (PlaybackSessionStub, Receiver<Message>) {
        let (bus_sender, _) = broadcast::channel(64);
        let session = PlaybackSessionStub::new(bus_sender.subscribe(), bus_sender.clone());
        (session, bus_sender.subscribe())
    }

    #[test]
    fn test_play_then_pause_publishes_state_transitions() {
        let (mut session, mut receiver) = session();

        session.handle_message(PlaybackMessage::Play("trackX".to_string()));
        assert_eq!(next_state(&mut receiver), (Some("trackX".to_string()), true));

        session.handle_message(PlaybackMessage::Pause);
        assert_eq!(
            next_state(&mut receiver),
            (Some("trackX".to_string()), false)
        );

        session.handle_message(PlaybackMessage::Resume);
        assert_eq!(next_state(&mut receiver), (Some("trackX".to_string()), true));

        session.handle_message(PlaybackMessage::Stop);
        assert_eq!(next_state(&mut receiver), (None, false));
    }

    #[test]
    fn test_transport_without_loaded_item_is_silent() {
        let (mut session, mut receiver) = session();

        session.handle_message(PlaybackMessage::Pause);
        session.handle_message(PlaybackMessage::Resume);
        session.handle_message(PlaybackMessage::Stop);
        assert_no_state(&mut receiver);
    }
}
