use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a trackable occurrence.
///
/// Wire names are the case-sensitive variant names; the persisted snapshot
/// and the HTTP body both use them verbatim, so renaming a variant is a
/// breaking change for already-saved queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    LevelStart,
    LevelComplete,
    SpendCoins,
}

impl EventCategory {
    pub const ALL: [EventCategory; 3] = [
        EventCategory::LevelStart,
        EventCategory::LevelComplete,
        EventCategory::SpendCoins,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventCategory::LevelStart => "LevelStart",
            EventCategory::LevelComplete => "LevelComplete",
            EventCategory::SpendCoins => "SpendCoins",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One trackable occurrence: a category plus an opaque string payload.
///
/// Immutable after construction. Serializes with the `Type`/`Data` field
/// names shared by the snapshot format and the delivery endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Type")]
    category: EventCategory,

    #[serde(rename = "Data")]
    payload: String,
}

impl EventRecord {
    pub fn new(category: EventCategory, payload: impl Into<String>) -> Self {
        Self {
            category,
            payload: payload.into(),
        }
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}
