use serde::{Deserialize, Serialize};

/// Fallback MIME type for anything outside the known ebook formats.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fallback extension when an item carries no usable format information.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Ebook formats the gateway knows how to label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EbookFormat {
    /// EPUB format (Electronic Publication).
    Epub,
    /// PDF format (Portable Document Format).
    Pdf,
    /// MOBI format (Mobipocket eBook).
    Mobi,
    /// AZW3 format (Kindle Format 8).
    Azw3,
    /// CBZ format (Comic Book ZIP archive).
    Cbz,
    /// CBR format (Comic Book RAR archive).
    Cbr,
}

impl EbookFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            EbookFormat::Epub => "application/epub+zip",
            EbookFormat::Pdf => "application/pdf",
            EbookFormat::Mobi => "application/x-mobipocket-ebook",
            EbookFormat::Azw3 => "application/x-mobi8-ebook",
            EbookFormat::Cbz => "application/x-cbz",
            EbookFormat::Cbr => "application/x-cbr",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            EbookFormat::Epub => "epub",
            EbookFormat::Pdf => "pdf",
            EbookFormat::Mobi => "mobi",
            EbookFormat::Azw3 => "azw3",
            EbookFormat::Cbz => "cbz",
            EbookFormat::Cbr => "cbr",
        }
    }

    /// Try to detect format from a file extension or upstream format name.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "epub" => Some(EbookFormat::Epub),
            "pdf" => Some(EbookFormat::Pdf),
            "mobi" => Some(EbookFormat::Mobi),
            "azw3" => Some(EbookFormat::Azw3),
            "cbz" => Some(EbookFormat::Cbz),
            "cbr" => Some(EbookFormat::Cbr),
            _ => None,
        }
    }
}

/// MIME type for an extension, `application/octet-stream` when unknown.
pub fn mime_for_extension(ext: &str) -> &'static str {
    EbookFormat::from_extension(ext)
        .map(|f| f.mime_type())
        .unwrap_or(OCTET_STREAM)
}

/// Make a title safe to use as a download filename.
///
/// Characters that are illegal on common filesystems become spaces, then runs
/// of whitespace collapse to a single space.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c => c,
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
