//! Live connection registry and WebSocket plumbing.
//!
//! The registry maps an authenticated username to at most one live
//! connection. A second connect for the same username supersedes the first
//! (last-connect-wins): the prior handle receives a best-effort Close frame
//! and its entry is replaced, never duplicated. Sends go through the
//! per-connection mpsc queue, so no registry shard lock is ever held across
//! socket I/O.

pub mod actor;
pub mod handler;
pub mod protocol;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

/// Sender half of a connection's outbound channel. Cloning this lets any
/// part of the system push frames to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Outcome of a targeted send. NotConnected is a normal, expected state for
/// offline recipients, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    NotConnected,
    SendFailed,
}

/// Registering a handle whose receive half is already gone is rejected.
#[derive(Debug, Error)]
#[error("connection handle is already closed")]
pub struct ClosedHandle;

#[derive(Clone)]
struct Entry {
    /// Monotonic registration token. Lets a superseded actor's cleanup
    /// distinguish its own entry from a newer one for the same username.
    epoch: u64,
    tx: ConnectionSender,
}

/// Process-wide table of live connections, at most one entry per username.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<DashMap<String, Entry>>,
    next_epoch: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection for `username`, superseding any prior
    /// entry. The prior handle is closed best-effort; failure to close it
    /// never aborts the registration. Returns the epoch token the owning
    /// actor must pass to `disconnect_epoch` on teardown.
    pub fn connect(&self, username: &str, tx: ConnectionSender) -> Result<u64, ClosedHandle> {
        if tx.is_closed() {
            return Err(ClosedHandle);
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let prior = self
            .entries
            .insert(username.to_string(), Entry { epoch, tx });

        if let Some(prior) = prior {
            close_entry(&prior, "superseded by a newer connection");
            tracing::info!(username, "prior connection superseded");
        }

        tracing::info!(username, "user connected");
        Ok(epoch)
    }

    /// Remove the entry for `username` if present, closing its handle
    /// best-effort. Idempotent: unknown usernames are a no-op.
    pub fn disconnect(&self, username: &str) {
        if let Some((_, entry)) = self.entries.remove(username) {
            close_entry(&entry, "disconnected");
            tracing::info!(username, "user disconnected");
        }
    }

    /// Like `disconnect`, but only removes the entry registered under
    /// `epoch`. A superseded actor calls this during cleanup so it cannot
    /// evict the connection that replaced it.
    pub fn disconnect_epoch(&self, username: &str, epoch: u64) {
        if let Some((_, entry)) = self
            .entries
            .remove_if(username, |_, entry| entry.epoch == epoch)
        {
            close_entry(&entry, "disconnected");
            tracing::info!(username, "user disconnected");
        }
    }

    /// True iff an entry exists and its handle is still open.
    /// A stale entry (closed handle) is lazily evicted.
    pub fn is_connected(&self, username: &str) -> bool {
        let open = match self.entries.get(username) {
            Some(entry) => !entry.tx.is_closed(),
            None => return false,
        };
        if !open {
            self.disconnect(username);
        }
        open
    }

    /// Push a frame to `username`'s connection. Eviction on failure: a
    /// handle that rejects the send is removed so later lookups see the
    /// user as offline.
    pub fn send(&self, username: &str, frame: Message) -> SendOutcome {
        let tx = match self.entries.get(username) {
            Some(entry) => entry.tx.clone(),
            None => return SendOutcome::NotConnected,
        };

        if tx.is_closed() {
            self.entries.remove_if(username, |_, entry| entry.tx.is_closed());
            return SendOutcome::NotConnected;
        }

        if tx.send(frame).is_err() {
            self.disconnect(username);
            return SendOutcome::SendFailed;
        }

        SendOutcome::Delivered
    }

    /// Number of live entries (stale entries included until evicted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn close_entry(entry: &Entry, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::NORMAL,
        reason: reason.into(),
    };
    // Best-effort: the actor may already be gone.
    let _ = entry.tx.send(Message::Close(Some(frame)));
}
