//! Library and item models as served by the upstream media server.

use crate::formats::{EbookFormat, FALLBACK_EXTENSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of media a library holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Books (ebooks and audiobooks).
    Book,
    /// Podcasts.
    Podcast,
    /// Anything else.
    #[default]
    #[serde(other)]
    Other,
}

/// An upstream library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Upstream library id.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Media kind held by the library.
    #[serde(default, rename = "mediaType")]
    pub media_type: MediaType,
}

impl Library {
    /// Whether this library can hold ebooks.
    pub fn is_book(&self) -> bool {
        self.media_type == MediaType::Book
    }

    /// Parse a library record, skipping ones that are not usable.
    pub fn from_value(value: &Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(library) => Some(library),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed library record");
                None
            }
        }
    }
}

/// An upstream library item.
///
/// Items are kept as the raw JSON the upstream returned. Accessors read
/// through it and fall back to defaults for anything missing or of the wrong
/// type, so one odd record never fails a whole feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Value);

impl Item {
    /// Wrap a raw item record.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Unwrap a search hit, which nests the item under `libraryItem`.
    pub fn from_search_hit(hit: Value) -> Self {
        match hit {
            Value::Object(mut map) if map.contains_key("libraryItem") => {
                Self(map.remove("libraryItem").unwrap_or(Value::Null))
            }
            other => Self(other),
        }
    }

    /// Item id, if present.
    pub fn id(&self) -> Option<&str> {
        non_empty_str(&self.0, "/id")
    }

    /// Title: `media.metadata.title`, then `title`, then the id.
    pub fn title(&self) -> String {
        non_empty_str(&self.0, "/media/metadata/title")
            .or_else(|| non_empty_str(&self.0, "/title"))
            .or_else(|| self.id())
            .unwrap_or_default()
            .to_string()
    }

    /// Author names: `metadata.authors`, falling back to `metadata.authorName`.
    pub fn authors(&self) -> Vec<String> {
        if let Some(authors) = self.0.pointer("/media/metadata/authors") {
            let names = authors
                .as_array()
                .map(|list| list.iter().filter_map(author_name).collect())
                .unwrap_or_default();
            return names;
        }

        non_empty_str(&self.0, "/media/metadata/authorName")
            .map(|name| vec![name.to_string()])
            .unwrap_or_default()
    }

    /// Description, when non-empty.
    pub fn description(&self) -> Option<&str> {
        non_empty_str(&self.0, "/media/metadata/description")
    }

    /// Cover path on the upstream server.
    pub fn cover_path(&self) -> Option<&str> {
        non_empty_str(&self.0, "/media/cover/contentUrl")
            .or_else(|| non_empty_str(&self.0, "/media/coverPath"))
    }

    /// Whether the record carries ebook file details.
    ///
    /// Shallow list responses may omit them even when the item has a file.
    pub fn has_ebook_file(&self) -> bool {
        self.0.pointer("/media/ebookFile").is_some_and(truthy)
    }

    /// Whether the item can be offered for download.
    pub fn is_acquirable(&self) -> bool {
        self.has_ebook_file() || self.ebook_format().is_some()
    }

    /// Format name the upstream reports for the ebook.
    fn ebook_format(&self) -> Option<&str> {
        non_empty_str(&self.0, "/media/ebookFile/ebookFormat")
            .or_else(|| non_empty_str(&self.0, "/media/ebookFormat"))
    }

    /// File extension for the acquisition filename, without the dot.
    pub fn extension(&self) -> String {
        let ext = non_empty_str(&self.0, "/media/ebookFile/metadata/ext")
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty());
        if let Some(ext) = ext {
            return ext;
        }

        self.ebook_format()
            .and_then(EbookFormat::from_extension)
            .map(|format| format.extension())
            .unwrap_or(FALLBACK_EXTENSION)
            .to_string()
    }
}

fn non_empty_str<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn author_name(author: &Value) -> Option<String> {
    let name = match author {
        Value::String(name) => name.clone(),
        Value::Object(map) => match map.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => author.to_string(),
        },
        Value::Null => return None,
        other => other.to_string(),
    };
    (!name.trim().is_empty()).then_some(name)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn library_media_type_parsing() {
        let lib = Library::from_value(&json!({"id": "l1", "name": "Books", "mediaType": "book"}))
            .unwrap();
        assert!(lib.is_book());

        let lib = Library::from_value(&json!({"id": "l2", "mediaType": "comics"})).unwrap();
        assert_eq!(lib.media_type, MediaType::Other);
        assert_eq!(lib.name, "");

        assert!(Library::from_value(&json!({"name": "no id"})).is_none());
    }

    #[test]
    fn title_fallback_chain() {
        let item = Item::new(json!({"id": "i1", "media": {"metadata": {"title": "Dune"}}}));
        assert_eq!(item.title(), "Dune");

        let item = Item::new(json!({"id": "i1", "title": "Top Level"}));
        assert_eq!(item.title(), "Top Level");

        let item = Item::new(json!({"id": "i1", "media": {"metadata": {"title": ""}}}));
        assert_eq!(item.title(), "i1");
    }

    #[test]
    fn authors_prefer_plural_field() {
        let item = Item::new(json!({"media": {"metadata": {
            "authors": [{"name": "Frank Herbert"}, "Brian Herbert", {"id": 3}],
            "authorName": "ignored"
        }}}));
        assert_eq!(
            item.authors(),
            vec!["Frank Herbert", "Brian Herbert", r#"{"id":3}"#]
        );

        let item = Item::new(json!({"media": {"metadata": {"authorName": "Ursula K. Le Guin"}}}));
        assert_eq!(item.authors(), vec!["Ursula K. Le Guin"]);

        let item = Item::new(json!({"media": {}}));
        assert!(item.authors().is_empty());
    }

    #[test]
    fn acquirability() {
        let with_file = Item::new(json!({"media": {"ebookFile": {"metadata": {"ext": ".EPUB"}}}}));
        assert!(with_file.has_ebook_file());
        assert!(with_file.is_acquirable());
        assert_eq!(with_file.extension(), "epub");

        let with_format = Item::new(json!({"media": {"ebookFormat": "pdf"}}));
        assert!(!with_format.has_ebook_file());
        assert!(with_format.is_acquirable());
        assert_eq!(with_format.extension(), "pdf");

        let audiobook = Item::new(json!({"media": {"ebookFile": null, "audioFiles": [1]}}));
        assert!(!audiobook.is_acquirable());
        assert_eq!(audiobook.extension(), "bin");
    }

    #[test]
    fn nested_ebook_format_is_mapped() {
        let item = Item::new(json!({"media": {"ebookFile": {"ebookFormat": "AZW3"}}}));
        assert_eq!(item.extension(), "azw3");

        let item = Item::new(json!({"media": {"ebookFile": {"ebookFormat": "fb2"}}}));
        assert_eq!(item.extension(), "bin");
    }

    #[test]
    fn cover_path_sources() {
        let item = Item::new(json!({"media": {"cover": {"contentUrl": "/c.jpg"}, "coverPath": "/p.jpg"}}));
        assert_eq!(item.cover_path(), Some("/c.jpg"));

        let item = Item::new(json!({"media": {"coverPath": "/p.jpg"}}));
        assert_eq!(item.cover_path(), Some("/p.jpg"));
    }

    #[test]
    fn search_hit_unwrapping() {
        let item = Item::from_search_hit(json!({"libraryItem": {"id": "x"}, "matchKey": "title"}));
        assert_eq!(item.id(), Some("x"));

        let item = Item::from_search_hit(json!({"id": "y"}));
        assert_eq!(item.id(), Some("y"));
    }

    #[test]
    fn wrong_types_degrade_to_defaults() {
        let item = Item::new(json!({"id": 5, "media": {"metadata": {"title": 9, "authors": "x"}}}));
        assert_eq!(item.id(), None);
        assert_eq!(item.title(), "");
        assert!(item.authors().is_empty());
        assert_eq!(item.description(), None);
    }
}
