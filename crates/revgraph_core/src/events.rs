//! Load notifications delivered over channels.

use crate::commit_id::CommitId;
use crate::error::{RevError, Result};
use crate::session::{LoadStatus, SessionId};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

/// Notification about a load session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// Rows were appended to the session's view, in row order.
    CommitsAppended {
        /// The session that grew.
        session: SessionId,
        /// Ids of the new rows.
        ids: Vec<CommitId>,
    },
    /// The load finished, successfully or not.
    LoadCompleted {
        /// The finished session.
        session: SessionId,
        /// Final status.
        status: LoadStatus,
    },
    /// The load was canceled.
    LoadCanceled {
        /// The canceled session.
        session: SessionId,
    },
}

/// Fan-out of [`GraphEvent`]s to a bounded set of subscribers.
///
/// A subscriber that drops its receiver is forgotten at the next publish.
#[derive(Debug)]
pub struct EventBus {
    listeners: Vec<Sender<GraphEvent>>,
    max_listeners: usize,
}

impl EventBus {
    /// Creates a bus accepting at most `max_listeners` subscribers.
    pub fn new(max_listeners: usize) -> Self {
        Self {
            listeners: Vec::new(),
            max_listeners,
        }
    }

    /// Registers a new subscriber.
    ///
    /// # Errors
    ///
    /// `RevError::TooManyListeners` when the limit is reached.
    pub fn subscribe(&mut self) -> Result<Receiver<GraphEvent>> {
        if self.listeners.len() >= self.max_listeners {
            return Err(RevError::TooManyListeners {
                limit: self.max_listeners,
            });
        }
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        Ok(rx)
    }

    /// Sends `event` to every live subscriber.
    pub fn publish(&mut self, event: GraphEvent) {
        let before = self.listeners.len();
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
        if self.listeners.len() != before {
            debug!(
                dropped = before - self.listeners.len(),
                "pruned closed listeners"
            );
        }
    }

    /// Number of registered subscribers.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
