//! The `_design/outbox` document holding the change-feed filters.

use outbox_core::event::EVENT_DOCUMENT_PREFIX;
use outbox_core::store::{ChangeFilter, PENDING_EVENTS_FIELD};
use serde_json::{Value, json};

/// Name of the design document, without the `_design/` prefix.
pub const DESIGN_NAME: &str = "outbox";

/// Full id of the design document.
pub const DESIGN_DOCUMENT_ID: &str = "_design/outbox";

/// The `filter` query parameter selecting `filter` on a changes feed.
#[must_use]
pub fn filter_path(filter: ChangeFilter) -> String {
    format!("{DESIGN_NAME}/{}", filter.name())
}

fn filter_source(filter: ChangeFilter) -> String {
    match filter {
        ChangeFilter::PendingEvents => format!(
            "function(doc, req) {{ var e = doc['{PENDING_EVENTS_FIELD}']; \
             return Array.isArray(e) && e.length > 0; }}"
        ),
        ChangeFilter::DomainEvents => format!(
            "function(doc, req) {{ return doc._id.indexOf('{EVENT_DOCUMENT_PREFIX}') === 0; }}"
        ),
    }
}

/// Body of the design document, without `_id` or `_rev`.
#[must_use]
pub fn design_document() -> Value {
    let filters = [ChangeFilter::PendingEvents, ChangeFilter::DomainEvents]
        .into_iter()
        .map(|filter| (filter.name().to_owned(), Value::String(filter_source(filter))))
        .collect::<serde_json::Map<_, _>>();
    json!({
        "language": "javascript",
        "filters": filters,
    })
}

/// Returns `true` if a stored design document already carries the current
/// filters.
#[must_use]
pub fn is_current(stored: &Value) -> bool {
    let expected = design_document();
    stored.get("filters") == expected.get("filters")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_path_uses_design_name() {
        assert_eq!(filter_path(ChangeFilter::PendingEvents), "outbox/pending_events");
        assert_eq!(filter_path(ChangeFilter::DomainEvents), "outbox/domain_events");
    }

    #[test]
    fn test_design_document_carries_both_filters() {
        let doc = design_document();

        let filters = doc["filters"].as_object().unwrap();
        assert_eq!(filters.len(), 2);
        assert!(filters["pending_events"].as_str().unwrap().contains("doc['events']"));
        assert!(filters["domain_events"].as_str().unwrap().contains("'domain_event:'"));
    }

    #[test]
    fn test_is_current_detects_stale_filters() {
        let mut stored = design_document();
        stored["_rev"] = Value::String("3-abc".to_owned());
        assert!(is_current(&stored));

        stored["filters"]["pending_events"] = Value::String("function(doc) { return true; }".to_owned());
        assert!(!is_current(&stored));
    }
}
