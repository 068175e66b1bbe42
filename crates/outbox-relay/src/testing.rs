//! Event body used by this crate's unit tests.

use outbox_core::event::EventBody;
use outbox_core::registry::EventRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Note {
    Written { text: String },
    Erased { reason: String },
}

impl EventBody for Note {
    const KINDS: &'static [&'static str] = &["Written", "Erased"];

    fn kind(&self) -> &'static str {
        match self {
            Self::Written { .. } => "Written",
            Self::Erased { .. } => "Erased",
        }
    }

    fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn decode(kind: &'static str, body: Value) -> Result<Self, serde_json::Error> {
        let note: Self = serde_json::from_value(body)?;
        if note.kind() == kind {
            Ok(note)
        } else {
            Err(serde::de::Error::custom(format!("body does not match kind {kind}")))
        }
    }
}

pub(crate) fn note_registry() -> EventRegistry<Note> {
    EventRegistry::new()
        .register("Written", "note_written")
        .register("Erased", "note_erased")
}
