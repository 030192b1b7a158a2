//! Plain-text extraction for `.txt`, `.pdf` and `.docx` documents.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::traits::DocumentReader;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "pdf", "docx"];

/// Reads documents from the local filesystem, dispatching on file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileReader;

impl FileReader {
    pub fn new() -> Self { Self }
}

impl DocumentReader for FileReader {
    fn read(&self, path: &Path) -> Result<String> {
        match extension_of(path).as_deref() {
            Some("txt") => read_text(path),
            Some("pdf") => read_pdf(path),
            Some("docx") => read_docx(path),
            other => Err(Error::UnsupportedFormat {
                extension: other.map_or_else(|| "<none>".to_string(), |e| format!(".{e}")),
            }),
        }
    }
}

/// Stable document name: the file basename.
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::read(path, e))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

fn read_pdf(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path).map_err(|e| Error::read(path, e.to_string()))
}

fn read_docx(path: &Path) -> Result<String> {
    let file = fs::File::open(path).map_err(|e| Error::read(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::read(path, e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::read(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::read(path, e))?;
    Ok(docx_xml_to_text(&xml))
}

// valid literals; compiled once
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>.*?</w:p>").expect("paragraph regex"));

static RUN_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("run text regex"));

/// Join the `<w:t>` runs of each `<w:p>` paragraph; paragraphs are separated by `\n`.
pub fn docx_xml_to_text(xml: &str) -> String {
    PARAGRAPH_RE
        .find_iter(xml)
        .map(|p| {
            RUN_TEXT_RE
                .captures_iter(p.as_str())
                .filter_map(|c| c.get(1))
                .map(|m| unescape_xml(m.as_str()))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Supported documents under `root`, recursively, sorted. A file path is returned as-is.
pub fn list_documents(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| extension_of(p).is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str())))
        .collect();
    files.sort();
    files
}
