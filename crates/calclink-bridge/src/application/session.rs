//! Channels between the link poller and a chat relay.
//!
//! # Two directions, two shapes (for beginners)
//!
//! - **Inbound** (relay → calculator) is a bounded FIFO queue.  Every
//!   message matters and order matters, so nothing is overwritten; the
//!   poller drains the whole queue on each tick.
//!
//! - **Outbound** (calculator → relay) is a *latest-value slot*.  The poller
//!   publishes at most one question per check, and only the most recent one
//!   is worth relaying, so a new value simply replaces an unread old one.
//!
//! [`session_channels`] creates both and hands one end of each to the relay
//! ([`RelayHandle`]) and the other to the poller ([`PollerHandle`]).

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Published when the calculator stops answering.  Terminal for the relay.
pub const CONNECTION_LOST: &str = "Lost connection with TI84";

/// Outbound text asking the relay to purge its chat history.
pub const PURGE_CHATS: &str = "DELETE ALL CHATS";

/// Default inbound queue capacity.
pub const INBOUND_CAPACITY: usize = 64;

/// A message for the calculator, stored as program `title` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub title: String,
    pub text: String,
}

impl InboundMessage {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Single-value cell; publishing overwrites, taking clears.
#[derive(Debug, Clone, Default)]
pub struct OutboundSlot {
    inner: Arc<Mutex<Option<String>>>,
}

impl OutboundSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing anything not yet taken.
    pub fn publish(&self, value: impl Into<String>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.into());
    }

    /// Removes and returns the current value.
    pub fn take(&self) -> Option<String> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Returns a copy of the current value without clearing it.
    pub fn peek(&self) -> Option<String> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// How a relay should treat an outbound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayNotice {
    /// The poller has terminated; stop relaying.
    ConnectionLost,
    /// Purge the chat history.
    PurgeChats,
    /// Relay this text.
    Message(String),
}

/// Classifies an outbound value by the relay conventions.
pub fn classify_outbound(value: &str) -> RelayNotice {
    if value.trim() == CONNECTION_LOST {
        RelayNotice::ConnectionLost
    } else if value.trim().eq_ignore_ascii_case(PURGE_CHATS) {
        RelayNotice::PurgeChats
    } else {
        RelayNotice::Message(value.to_string())
    }
}

/// The poller stopped and dropped its end of the inbound queue.
#[derive(Debug, Error)]
#[error("session closed: the poller is no longer receiving messages")]
pub struct SessionClosed;

/// The relay's ends: inbound sender, outbound slot.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    inbound: mpsc::Sender<InboundMessage>,
    outbound: OutboundSlot,
}

impl RelayHandle {
    /// Queues a message, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] when the poller has gone away.
    pub async fn send(&self, message: InboundMessage) -> Result<(), SessionClosed> {
        self.inbound.send(message).await.map_err(|_| SessionClosed)
    }

    pub fn outbound(&self) -> &OutboundSlot {
        &self.outbound
    }
}

/// The poller's ends: inbound receiver, outbound slot.
#[derive(Debug)]
pub struct PollerHandle {
    inbound: mpsc::Receiver<InboundMessage>,
    outbound: OutboundSlot,
}

impl PollerHandle {
    /// Takes every queued message without waiting.
    pub fn drain_inbound(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        loop {
            match self.inbound.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }

    pub fn publish(&self, value: impl Into<String>) {
        self.outbound.publish(value);
    }

    pub fn outbound(&self) -> &OutboundSlot {
        &self.outbound
    }
}

/// Creates the channel pair for one relay session.
pub fn session_channels(capacity: usize) -> (RelayHandle, PollerHandle) {
    let (tx, rx) = mpsc::channel(capacity);
    let outbound = OutboundSlot::new();
    (
        RelayHandle {
            inbound: tx,
            outbound: outbound.clone(),
        },
        PollerHandle {
            inbound: rx,
            outbound,
        },
    )
}
