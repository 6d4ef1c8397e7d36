// src/services/paths.rs

//! Translation of upstream CMS URLs into canonical output paths.
//!
//! The CMS serves every page through an `.aspx` handler and exposes folder
//! listings through a `RootFolder` query parameter. Output paths replace both
//! with plain directory paths.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Extensions of documents that are archived rather than crawled.
pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "xls", "xlsx", "doc", "docx", "ppt", "pptx", "db", "txt", "log", "xlsm", "tmp", "msg",
];

/// Query parameter used by the CMS for folder listings.
const ROOT_FOLDER: &str = "RootFolder";

static FILE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+\.[A-Za-z0-9]{1,4}$").expect("valid regex"));

/// What a translated `.aspx` suffix is replaced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMarker {
    /// `/index.html`
    IndexHtml,
    /// `/`
    TrailingSlash,
    /// nothing
    Bare,
}

impl IndexMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexMarker::IndexHtml => "/index.html",
            IndexMarker::TrailingSlash => "/",
            IndexMarker::Bare => "",
        }
    }
}

/// Rewrite CMS page handler suffixes into an output path.
///
/// The rewrites are applied in order, so the specific handlers win over the
/// generic `.aspx` suffix.
pub fn dedotnet(path: &str, marker: IndexMarker) -> String {
    let replacement = marker.as_str();
    path.replace("/Pages/Default.aspx", replacement)
        .replace("/Pages/default.aspx", replacement)
        .replace("/Forms/AllItems.aspx", replacement)
        .replace(".aspx", replacement)
}

/// Whether a URL goes through the folder-listing indirection.
pub fn is_forms_url(url: &str) -> bool {
    url.contains(ROOT_FOLDER)
}

/// Resolve a folder-listing URL to the folder it lists.
///
/// Absolute URLs keep their scheme and host; relative ones become a bare
/// path. URLs without a `RootFolder` parameter are returned unchanged.
pub fn fix_forms_url(url: &str) -> String {
    let (parsed, absolute) = match Url::parse(url) {
        Ok(parsed) => (parsed, true),
        Err(_) => match Url::parse("http://relative.invalid").and_then(|base| base.join(url)) {
            Ok(parsed) => (parsed, false),
            Err(_) => return url.to_string(),
        },
    };

    let Some(folder) = root_folder(&parsed) else {
        return url.to_string();
    };
    let folder = strip_query(&folder);

    match parsed.host_str() {
        Some(host) if absolute => {
            let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
            format!("{}://{}{}{}", parsed.scheme(), host, port, folder)
        }
        _ => folder.to_string(),
    }
}

/// Decoded value of the `RootFolder` query parameter of an href.
pub fn decode_root_folder(href: &str) -> Option<String> {
    let query = href.split_once('?').map(|(_, q)| q)?;
    let query = query.split('#').next().unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == ROOT_FOLDER)
        .map(|(_, v)| v.into_owned())
}

/// Output path of a listing row link.
pub fn row_link_path(href: &str) -> String {
    if is_forms_url(href) {
        if let Some(folder) = decode_root_folder(href) {
            return folder;
        }
    }
    unquote(href)
}

/// Percent-decode a path, keeping the input when it is not valid UTF-8.
pub fn unquote(path: &str) -> String {
    urlencoding::decode(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Whether the last path segment ends in a short extension.
pub fn has_file_extension(path: &str) -> bool {
    FILE_EXTENSION.is_match(path)
}

/// Lower-cased extension of the final path segment, if any.
pub fn file_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a path names one of the archived document types.
pub fn is_document_path(path: &str) -> bool {
    file_extension(path).is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

fn root_folder(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == ROOT_FOLDER)
        .map(|(_, v)| v.into_owned())
}

fn strip_query(s: &str) -> &str {
    s.split(['?', '#']).next().unwrap_or(s)
}
