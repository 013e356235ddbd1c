//! Events pushed to the browser client of the session.

use crossbeam::channel;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Ask the help pane to display a path relative to the help mount.
    ShowHelp(String),
    /// Ask the client to navigate to a session-relative URL.
    BrowseUrl(String),
}

impl ClientEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Fire-and-forget, ordered delivery of client events.
pub trait ClientEventSink: Send + Sync {
    fn enqueue(&self, event: ClientEvent);
}

/// In-process ordered queue of client events.
pub struct ClientEventQueue {
    tx: channel::Sender<ClientEvent>,
    rx: channel::Receiver<ClientEvent>,
}

impl ClientEventQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Remove and return every queued event, oldest first.
    pub fn drain(&self) -> Vec<ClientEvent> {
        self.rx.try_iter().collect()
    }

    pub fn receiver(&self) -> channel::Receiver<ClientEvent> {
        self.rx.clone()
    }
}

impl Default for ClientEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientEventSink for ClientEventQueue {
    fn enqueue(&self, event: ClientEvent) {
        debug!("enqueue client event {:?}", event);
        // The queue owns a receiver, so the send cannot fail.
        let _ = self.tx.send(event);
    }
}
