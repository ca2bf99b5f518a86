//! The current diagram snapshot and its single-writer cell

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// An immutable rendered diagram. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramSnapshot {
    pub text: Arc<str>,
    /// 0 for the initial empty snapshot, +1 per publish.
    pub revision: u64,
    pub computed_at: DateTime<Utc>,
}

impl DiagramSnapshot {
    fn empty() -> Self {
        DiagramSnapshot {
            text: Arc::from(""),
            revision: 0,
            computed_at: Utc::now(),
        }
    }
}

/// Holds the current [`DiagramSnapshot`].
///
/// The cell is the only way to write the snapshot. Readers go through a
/// [`DiagramReader`] and always observe a complete snapshot, either the
/// previous one or the newly published one.
pub struct DiagramCell {
    tx: watch::Sender<Arc<DiagramSnapshot>>,
}

impl DiagramCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(DiagramSnapshot::empty()));
        DiagramCell { tx }
    }

    /// Replace the snapshot with `text` and return the published value.
    pub fn publish(&self, text: String) -> Arc<DiagramSnapshot> {
        let revision = self.tx.borrow().revision + 1;
        let next = Arc::new(DiagramSnapshot {
            text: Arc::from(text),
            revision,
            computed_at: Utc::now(),
        });
        self.tx.send_replace(Arc::clone(&next));
        next
    }

    pub fn current(&self) -> Arc<DiagramSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// A read-only handle that can be shared with other tasks.
    pub fn reader(&self) -> DiagramReader {
        DiagramReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for DiagramCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`DiagramCell`].
#[derive(Clone)]
pub struct DiagramReader {
    rx: watch::Receiver<Arc<DiagramSnapshot>>,
}

impl DiagramReader {
    pub fn current(&self) -> Arc<DiagramSnapshot> {
        Arc::clone(&self.rx.borrow())
    }
}
