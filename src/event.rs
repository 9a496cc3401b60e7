//! Structured event stream emitted by the tree engines.
//!
//! Every mutation step (split, merge, borrow, ...) is recorded as an [`Event`]
//! so a renderer can replay what happened without reaching into the nodes.
//! Events are mirrored to `tracing` as they are recorded.

use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Insert,
    Delete,
    Split,
    Merge,
    Borrow,
    Error,
    Info,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Insert => "insert",
            EventKind::Delete => "delete",
            EventKind::Split => "split",
            EventKind::Merge => "merge",
            EventKind::Borrow => "borrow",
            EventKind::Error => "error",
            EventKind::Info => "info",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
    pub timestamp: SystemTime,
}

/// How many events an [`EventLog`] keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    Unbounded,
    /// Keep only the most recent `n` events, dropping the oldest
    Latest(usize),
}

/// Append-only event history with a retention policy
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<Event>,
    retention: Retention,
    /// Events ever recorded, including the ones dropped by retention
    recorded: usize,
}

impl EventLog {
    pub fn new(retention: Retention) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
            recorded: 0,
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn record(&mut self, kind: EventKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            EventKind::Error => tracing::warn!(%kind, "{message}"),
            EventKind::Split | EventKind::Merge | EventKind::Borrow => {
                tracing::debug!(%kind, "{message}")
            }
            _ => tracing::trace!(%kind, "{message}"),
        }

        self.entries.push_back(Event {
            kind,
            message,
            timestamp: SystemTime::now(),
        });
        self.recorded += 1;

        if let Retention::Latest(limit) = self.retention {
            while self.entries.len() > limit {
                self.entries.pop_front();
            }
        }
    }

    /// Retained events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    /// The `n` most recent events, oldest first
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &Event> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Position marker for [`EventLog::since`]
    pub fn mark(&self) -> usize {
        self.recorded
    }

    /// Events recorded after `mark` that are still retained
    pub fn since(&self, mark: usize) -> impl Iterator<Item = &Event> {
        self.latest(self.recorded.saturating_sub(mark))
    }

    pub fn last(&self) -> Option<&Event> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}
