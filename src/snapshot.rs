//! Persisted snapshot format.
//!
//! A snapshot is one JSON document with a single `DelayedEvents` field
//! holding the queue contents in send order:
//!
//! ```json
//! {"DelayedEvents":[{"Type":"SpendCoins","Data":"spendCoins"}]}
//! ```
//!
//! The store collaborator only ever sees the encoded string; all format
//! knowledge lives here. "Never saved" is represented by the store returning
//! no value at all and is distinct from a saved empty document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::EventRecord;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

#[derive(Serialize, Deserialize)]
struct SnapshotDoc {
    #[serde(rename = "DelayedEvents")]
    delayed_events: Vec<EventRecord>,
}

pub fn encode(events: &[EventRecord]) -> Result<String, SnapshotError> {
    let doc = SnapshotDoc {
        delayed_events: events.to_vec(),
    };
    serde_json::to_string(&doc).map_err(|e| SnapshotError::Encode(e.to_string()))
}

pub fn decode(raw: &str) -> Result<Vec<EventRecord>, SnapshotError> {
    let doc: SnapshotDoc =
        serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
    Ok(doc.delayed_events)
}
