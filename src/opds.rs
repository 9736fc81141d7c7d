//! OPDS catalog generation.

use crate::formats::{mime_for_extension, sanitize_filename};
use crate::library::Item;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// OPDS catalog content type, without the `kind` parameter.
pub const OPDS_MIME: &str = "application/atom+xml;profile=opds-catalog";

/// OpenSearch description content type.
pub const OPENSEARCH_MIME: &str = "application/opensearchdescription+xml";

/// Path of the catalog root.
pub const ROOT_PATH: &str = "/opds";

/// Path of the OpenSearch description.
pub const OPENSEARCH_PATH: &str = "/opds/search.xml";

/// Path of the search feed.
pub const SEARCH_PATH: &str = "/opds/search";

const REL_ACQUISITION: &str = "http://opds-spec.org/acquisition";
const REL_IMAGE: &str = "http://opds-spec.org/image";
const REL_THUMBNAIL: &str = "http://opds-spec.org/image/thumbnail";
const COVER_MIME: &str = "image/jpeg";

/// Whether a feed lists other feeds or downloadable publications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Entries point at other feeds.
    Navigation,
    /// Entries point at content.
    Acquisition,
}

impl FeedKind {
    /// The `kind` parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Navigation => "navigation",
            FeedKind::Acquisition => "acquisition",
        }
    }

    /// Full content type for a feed of this kind.
    pub fn content_type(&self) -> String {
        format!("{};kind={}", OPDS_MIME, self.as_str())
    }
}

/// OPDS feed link.
#[derive(Debug, Clone)]
pub struct Link {
    /// Link relation type (e.g., "self", "subsection", "acquisition").
    pub rel: String,
    /// URL of the linked resource.
    pub href: String,
    /// MIME type of the linked resource.
    pub link_type: String,
}

impl Link {
    fn new(rel: impl Into<String>, href: impl Into<String>, link_type: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            link_type: link_type.into(),
        }
    }
}

/// OPDS feed entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Unique identifier for the entry.
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Authors list.
    pub authors: Vec<String>,
    /// Short summary text.
    pub summary: Option<String>,
    /// Links associated with this entry.
    pub links: Vec<Link>,
}

/// OPDS feed builder.
///
/// Entries are written in the order they are added.
pub struct FeedBuilder {
    id: String,
    title: String,
    updated: DateTime<Utc>,
    links: Vec<Link>,
    entries: Vec<Entry>,
}

impl FeedBuilder {
    /// Start a feed whose id is its own URL.
    pub fn new(title: impl Into<String>, self_href: impl Into<String>, kind: FeedKind) -> Self {
        let self_href = self_href.into();
        Self {
            id: self_href.clone(),
            title: title.into(),
            updated: Utc::now(),
            links: vec![Link::new("self", self_href, kind.content_type())],
            entries: Vec::new(),
        }
    }

    /// Add a start link back to the catalog root.
    pub fn start_link(mut self) -> Self {
        self.links.push(Link::new(
            "start",
            ROOT_PATH,
            FeedKind::Navigation.content_type(),
        ));
        self
    }

    /// Advertise search, both as an OpenSearch description and as a
    /// templated feed URL.
    pub fn search_links(mut self) -> Self {
        self.links.push(Link::new("search", OPENSEARCH_PATH, OPENSEARCH_MIME));
        self.links.push(Link::new(
            "search",
            format!("{}?q={{searchTerms}}", SEARCH_PATH),
            FeedKind::Acquisition.content_type(),
        ));
        self
    }

    /// Add an entry pointing at an acquisition feed.
    pub fn navigation_entry(mut self, title: impl Into<String>, href: impl Into<String>) -> Self {
        let href = href.into();
        self.entries.push(Entry {
            id: href.clone(),
            title: title.into(),
            updated: Utc::now(),
            authors: Vec::new(),
            summary: None,
            links: vec![Link::new(
                "subsection",
                href,
                FeedKind::Acquisition.content_type(),
            )],
        });
        self
    }

    /// Add the entry pointing at the OpenSearch description.
    pub fn search_entry(mut self, title: impl Into<String>) -> Self {
        self.entries.push(Entry {
            id: OPENSEARCH_PATH.to_string(),
            title: title.into(),
            updated: Utc::now(),
            authors: Vec::new(),
            summary: None,
            links: vec![Link::new("search", OPENSEARCH_PATH, OPENSEARCH_MIME)],
        });
        self
    }

    /// Add a downloadable book. `upstream_base` prefixes cover paths.
    ///
    /// Items without an id are skipped.
    pub fn book_entry(mut self, item: &Item, upstream_base: &str) -> Self {
        let Some(id) = item.id() else {
            tracing::debug!("Skipping item without id");
            return self;
        };
        let title = item.title();
        let mut links = Vec::new();

        if let Some(cover) = item.cover_path() {
            let href = format!("{}{}", upstream_base.trim_end_matches('/'), cover);
            links.push(Link::new(REL_IMAGE, href.clone(), COVER_MIME));
            links.push(Link::new(REL_THUMBNAIL, href, COVER_MIME));
        }

        let ext = item.extension();
        let mut stem = sanitize_filename(&title);
        if stem.is_empty() {
            stem = sanitize_filename(id);
        }
        let filename = format!("{}.{}", stem, ext);
        links.push(Link::new(
            REL_ACQUISITION,
            acquisition_href(id, &filename),
            mime_for_extension(&ext),
        ));

        self.entries.push(Entry {
            id: format!("urn:opds-bridge:item:{}", id),
            title,
            updated: Utc::now(),
            authors: item.authors(),
            summary: item.description().map(str::to_string),
            links,
        });
        self
    }

    /// Add `previous`/`next` links around `page`.
    ///
    /// `has_next` comes from the caller; the upstream gives no total count.
    pub fn pagination_links(
        mut self,
        base_path: &str,
        page: u32,
        limit: u32,
        has_next: bool,
    ) -> Self {
        let link = |rel: &str, p: u32| {
            Link::new(
                rel,
                format!("{}?page={}&limit={}", base_path, p, limit),
                FeedKind::Acquisition.content_type(),
            )
        };
        if page > 1 {
            self.links.push(link("previous", page - 1));
        }
        if let Some(next) = page.checked_add(1).filter(|_| has_next) {
            self.links.push(link("next", next));
        }
        self
    }

    /// Number of entries added so far.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Build the XML feed.
    pub fn build(self) -> String {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        // XML declaration - writing to Vec can't fail
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));

        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", "http://www.w3.org/2005/Atom"));
        feed.push_attribute(("xmlns:opds", "http://opds-spec.org/2010/catalog"));
        let _ = writer.write_event(Event::Start(feed));

        write_text_element(&mut writer, "id", &self.id);
        write_text_element(&mut writer, "title", &self.title);
        write_text_element(&mut writer, "updated", &timestamp(&self.updated));

        for link in &self.links {
            write_link(&mut writer, link);
        }

        for entry in &self.entries {
            write_entry(&mut writer, entry);
        }

        let _ = writer.write_event(Event::End(BytesEnd::new("feed")));

        String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
    }
}

/// Gateway URL that downloads an item under the given filename.
pub fn acquisition_href(item_id: &str, filename: &str) -> String {
    format!(
        "/acquire/{}/{}",
        urlencoding::encode(item_id),
        urlencoding::encode(filename)
    )
}

/// ISO-8601 UTC with a `Z` suffix.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Write a simple text element.
fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

/// Write a link element.
fn write_link<W: std::io::Write>(writer: &mut Writer<W>, link: &Link) {
    let mut elem = BytesStart::new("link");
    elem.push_attribute(("rel", link.rel.as_str()));
    elem.push_attribute(("href", link.href.as_str()));
    elem.push_attribute(("type", link.link_type.as_str()));
    let _ = writer.write_event(Event::Empty(elem));
}

/// Write an entry element.
fn write_entry<W: std::io::Write>(writer: &mut Writer<W>, entry: &Entry) {
    let _ = writer.write_event(Event::Start(BytesStart::new("entry")));

    write_text_element(writer, "id", &entry.id);
    write_text_element(writer, "title", &entry.title);
    write_text_element(writer, "updated", &timestamp(&entry.updated));

    for author in &entry.authors {
        let _ = writer.write_event(Event::Start(BytesStart::new("author")));
        write_text_element(writer, "name", author);
        let _ = writer.write_event(Event::End(BytesEnd::new("author")));
    }

    for link in &entry.links {
        write_link(writer, link);
    }

    if let Some(summary) = &entry.summary {
        let mut elem = BytesStart::new("summary");
        elem.push_attribute(("type", "text"));
        let _ = writer.write_event(Event::Start(elem));
        let _ = writer.write_event(Event::Text(BytesText::new(summary)));
        let _ = writer.write_event(Event::End(BytesEnd::new("summary")));
    }

    let _ = writer.write_event(Event::End(BytesEnd::new("entry")));
}

/// Generate OpenSearch description XML.
pub fn generate_opensearch(title: &str) -> String {
    let title = escape(title);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OpenSearchDescription xmlns="http://a9.com/-/spec/opensearch/1.1/">
  <ShortName>{}</ShortName>
  <Description>Search the {} catalog</Description>
  <InputEncoding>UTF-8</InputEncoding>
  <OutputEncoding>UTF-8</OutputEncoding>
  <Url type="{}" template="{}?q={{searchTerms}}"/>
</OpenSearchDescription>"#,
        title,
        title,
        FeedKind::Acquisition.content_type(),
        SEARCH_PATH
    )
}
