//! Response-shape normalization.
//!
//! The upstream list endpoints put their records under different keys
//! depending on version and pagination mode. Each [`ListShape`] recognises
//! one layout; a list of shapes is tried in order and the first match wins.

use serde_json::Value;

/// One way a list of records can be laid out in a response document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    /// A non-empty array under the given key.
    Field(&'static str),
    /// A key holding either an array or a single object.
    Singular(&'static str),
}

/// Layouts of the library items endpoint, in priority order.
pub const ITEM_LIST: &[ListShape] = &[
    ListShape::Field("items"),
    ListShape::Field("libraryItems"),
    ListShape::Field("results"),
    ListShape::Singular("book"),
];

/// Layouts of the library search endpoint, in priority order.
pub const SEARCH_RESULTS: &[ListShape] = &[
    ListShape::Field("items"),
    ListShape::Field("results"),
    ListShape::Field("book"),
];

impl ListShape {
    /// Pull the records out of `doc` if it has this layout.
    pub fn extract(&self, doc: &Value) -> Option<Vec<Value>> {
        match self {
            ListShape::Field(key) => match doc.get(*key) {
                Some(Value::Array(list)) if !list.is_empty() => Some(list.clone()),
                _ => None,
            },
            ListShape::Singular(key) => match doc.get(*key) {
                Some(Value::Array(list)) => Some(list.clone()),
                Some(obj @ Value::Object(_)) => Some(vec![obj.clone()]),
                _ => None,
            },
        }
    }
}

/// Records from the first shape that matches, or nothing.
pub fn extract_list(doc: &Value, shapes: &[ListShape]) -> Vec<Value> {
    shapes
        .iter()
        .find_map(|shape| shape.extract(doc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_non_empty_field_wins() {
        let doc = json!({"items": [], "libraryItems": [{"id": "a"}], "results": [{"id": "b"}]});
        assert_eq!(extract_list(&doc, ITEM_LIST), vec![json!({"id": "a"})]);

        let doc = json!({"results": [{"id": "b"}], "items": [{"id": "c"}]});
        assert_eq!(extract_list(&doc, ITEM_LIST), vec![json!({"id": "c"})]);
    }

    #[test]
    fn singular_book_is_last_resort() {
        let doc = json!({"book": {"id": "only"}});
        assert_eq!(extract_list(&doc, ITEM_LIST), vec![json!({"id": "only"})]);

        let doc = json!({"book": [{"id": "x"}, {"id": "y"}]});
        assert_eq!(extract_list(&doc, ITEM_LIST).len(), 2);

        let doc = json!({"results": [{"id": "r"}], "book": {"id": "ignored"}});
        assert_eq!(extract_list(&doc, ITEM_LIST), vec![json!({"id": "r"})]);
    }

    #[test]
    fn unknown_layouts_yield_nothing() {
        assert!(extract_list(&json!({"total": 0}), ITEM_LIST).is_empty());
        assert!(extract_list(&json!({"items": "nope"}), ITEM_LIST).is_empty());
        assert!(extract_list(&json!([1, 2]), ITEM_LIST).is_empty());
    }

    #[test]
    fn search_accepts_items_or_results() {
        let doc = json!({"results": [{"libraryItem": {"id": "a"}}]});
        assert_eq!(extract_list(&doc, SEARCH_RESULTS).len(), 1);

        let doc = json!({"book": [{"libraryItem": {"id": "a"}}], "authors": []});
        assert_eq!(extract_list(&doc, SEARCH_RESULTS).len(), 1);
    }
}
