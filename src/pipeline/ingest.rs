//! Markdown ingestion: read the source file, fix its canonical bytes, and
//! collect local image references in document order.
//!
//! ## Canonical bytes
//!
//! The upload endpoint takes a declared `size` next to the content. The text
//! is validated as UTF-8 once and the declared size is the length of exactly
//! those bytes (a BOM, if present, is kept and counted).
//!
//! ## What counts as an image reference
//!
//! Inline image syntax only: `![alt](path)`, `![alt](path "title")` and
//! `![alt](<path with spaces>)`. Anything the importer renders as code is not
//! a reference: fenced blocks (closed only by a run of the same character at
//! least as long as the opener), indented code blocks and inline code spans.
//!
//! Remote (`http(s)://`, `//`) and `data:` targets stay in the list as
//! [`ImageSource::Remote`]. The importer fetches them into image blocks of
//! its own, so they hold their position in the block sequence but have no
//! local bytes to upload.

use crate::error::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static RE_INLINE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*(?:<([^>]+)>|([^)\s]+))(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)"#)
        .unwrap()
});

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(?:[-*+]|\d{1,9}[.)])(?:[ \t]|$)").unwrap());

/// Where the bytes of a referenced image live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Resolved against the markdown file's directory.
    Local(PathBuf),
    /// Fetched by the importer; nothing to upload.
    Remote,
}

/// One image referenced by the markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// The target exactly as written in the markdown.
    pub target: String,
    pub source: ImageSource,
}

impl ImageReference {
    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            ImageSource::Local(path) => Some(path),
            ImageSource::Remote => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, ImageSource::Local(_))
    }
}

/// A parsed source document.
#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    pub source: PathBuf,
    /// Canonical UTF-8 bytes; exactly what gets uploaded.
    pub content: Vec<u8>,
    /// Image references in order of appearance, remote ones included.
    pub images: Vec<ImageReference>,
}

impl MarkdownDocument {
    /// Size declared to the upload endpoint.
    pub fn declared_size(&self) -> u64 {
        self.content.len() as u64
    }

    /// File stem of the source, used as the default title.
    pub fn default_title(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    }

    pub fn local_image_count(&self) -> usize {
        self.images.iter().filter(|i| i.is_local()).count()
    }
}

/// Reads markdown files into [`MarkdownDocument`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownIngester;

impl MarkdownIngester {
    pub fn new() -> Self {
        Self
    }

    /// Read `path`, canonicalise its bytes and extract image references.
    pub async fn parse(&self, path: &Path) -> Result<MarkdownDocument, MigrationError> {
        let raw = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => MigrationError::SourceNotFound {
                path: path.to_path_buf(),
            },
            ErrorKind::PermissionDenied => MigrationError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => MigrationError::SourceRead {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let text = String::from_utf8(raw).map_err(|e| MigrationError::NotUtf8 {
            path: path.to_path_buf(),
            offset: e.utf8_error().valid_up_to(),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let images = extract_image_references(&text, base_dir);
        let document = MarkdownDocument {
            source: path.to_path_buf(),
            content: text.into_bytes(),
            images,
        };
        debug!(
            "Parsed {}: {} bytes, {} image references ({} local)",
            path.display(),
            document.content.len(),
            document.images.len(),
            document.local_image_count()
        );
        Ok(document)
    }
}

/// An open fenced code block.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
}

impl Fence {
    /// `line` opens a fence when it starts with three or more backticks or
    /// tildes after at most `max_indent` spaces.
    fn open(line: &str, max_indent: usize) -> Option<Fence> {
        let rest = line.trim_start_matches(' ');
        if line.len() - rest.len() > max_indent {
            return None;
        }
        let marker = *rest.as_bytes().first()?;
        if marker != b'`' && marker != b'~' {
            return None;
        }
        let len = run_length(rest.as_bytes(), marker);
        if len < 3 {
            return None;
        }
        // A backtick info string cannot itself contain backticks.
        if marker == b'`' && rest[len..].contains('`') {
            return None;
        }
        Some(Fence { marker, len })
    }

    fn closed_by(&self, line: &str) -> bool {
        let rest = line.trim_start();
        let len = run_length(rest.as_bytes(), self.marker);
        len >= self.len && rest[len..].trim().is_empty()
    }
}

fn run_length(bytes: &[u8], marker: u8) -> usize {
    bytes.iter().take_while(|&&b| b == marker).count()
}

fn is_indented(line: &str) -> bool {
    line.starts_with('\t') || line.starts_with("    ")
}

/// Blank out inline code spans so their contents are never matched.
/// A span opens on a run of backticks and closes on the next run of the
/// same length; an unmatched run is literal text.
fn mask_code_spans(line: &str) -> Cow<'_, str> {
    if !line.contains('`') {
        return Cow::Borrowed(line);
    }
    let bytes = line.as_bytes();
    let mut masked = String::with_capacity(line.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open = run_length(&bytes[i..], b'`');
        let mut j = i + open;
        let mut close = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let run = run_length(&bytes[j..], b'`');
                if run == open {
                    close = Some(j + run);
                    break;
                }
                j += run;
            } else {
                j += 1;
            }
        }
        match close {
            Some(end) => {
                masked.push_str(&line[copied..i]);
                masked.extend(std::iter::repeat(' ').take(end - i));
                copied = end;
                i = end;
            }
            None => i += open,
        }
    }

    masked.push_str(&line[copied..]);
    Cow::Owned(masked)
}

/// Collect image references from `text` in order, resolving local targets
/// against `base_dir`.
pub fn extract_image_references(text: &str, base_dir: &Path) -> Vec<ImageReference> {
    let mut refs = Vec::new();
    let mut fence: Option<Fence> = None;
    let mut prev_blank = true;
    let mut in_indented_code = false;
    let mut in_list = false;

    for line in text.lines() {
        if let Some(open) = fence {
            if open.closed_by(line) {
                fence = None;
            }
            prev_blank = false;
            continue;
        }
        if line.trim().is_empty() {
            prev_blank = true;
            continue;
        }

        // Indented lines continue a list item or a paragraph; otherwise,
        // after a blank line, they are code.
        if is_indented(line) && !in_list && (prev_blank || in_indented_code) {
            in_indented_code = true;
            prev_blank = false;
            continue;
        }
        in_indented_code = false;

        let max_indent = if in_list { usize::MAX } else { 3 };
        if let Some(open) = Fence::open(line, max_indent) {
            fence = Some(open);
            prev_blank = false;
            continue;
        }

        if !is_indented(line) {
            if RE_LIST_ITEM.is_match(line) {
                in_list = true;
            } else if prev_blank {
                in_list = false;
            }
        }
        prev_blank = false;

        let visible = mask_code_spans(line);
        for caps in RE_INLINE_IMAGE.captures_iter(&visible) {
            let Some(target) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let target = target.as_str().trim();
            let source = if is_remote(target) {
                warn!("Remote image reference {target} is left to the importer");
                ImageSource::Remote
            } else {
                ImageSource::Local(base_dir.join(target.replace("%20", " ")))
            };
            refs.push(ImageReference {
                target: target.to_string(),
                source,
            });
        }
    }

    refs
}

fn is_remote(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("data:")
        || lower.starts_with("//")
}
