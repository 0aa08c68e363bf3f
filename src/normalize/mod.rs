//! Turns fetched content items into plain text.
//!
//! HTML pages go through a tag-stripping cleanup; binary attachments are
//! dispatched to a format-specific extractor by file extension. Extraction
//! failures never abort a run: the failed attachment degrades to a
//! placeholder string and ingestion continues.


use anyhow::{Context, Result};
use pulldown_cmark::{Event, Parser, TagEnd};
use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;
use scraper::{Html, Selector};
use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::confluence::{ContentItem, ItemBody};
use crate::index::DocMetadata;

/// Plain-text rendition of one source document, metadata carried through
/// unchanged.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub text: String,
    pub metadata: DocMetadata,
}

/// Normalize a fetched item to plain text.
///
/// Never fails: attachment parse errors are folded into the text as a
/// placeholder so provenance survives even when content does not.
#[inline]
pub fn normalize(item: ContentItem) -> NormalizedDocument {
    let text = match item.body {
        ItemBody::Html(html) => clean_html(&html),
        ItemBody::Binary(bytes) => extract_attachment_text(&item.metadata.source, &bytes),
    };

    NormalizedDocument {
        text,
        metadata: item.metadata,
    }
}

/// Strip an HTML document down to its visible text.
///
/// Script, style, head, and title content is dropped entirely; remaining
/// text nodes are emitted one per line with surrounding whitespace trimmed
/// and blank lines removed. Deterministic and idempotent over the same
/// input.
#[inline]
pub fn clean_html(html: &str) -> String {
    let mut document = Html::parse_document(html);
    remove_invisible_elements(&mut document);

    document
        .root_element()
        .text()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_invisible_elements(document: &mut Html) {
    let invisible_selector =
        Selector::parse("script, style, head, title, noscript").expect("valid selector");

    // Collect node IDs first to avoid borrowing the tree while mutating it.
    let invisible_node_ids: Vec<_> = document
        .select(&invisible_selector)
        .map(|element| element.id())
        .collect();

    for node_id in invisible_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}

/// Extract plain text from an attachment's raw bytes.
///
/// The format is chosen by file extension. On any failure the returned
/// string is a bracketed placeholder naming the file and the reason, so
/// the caller can index it like any other text.
#[inline]
pub fn extract_attachment_text(filename: &str, bytes: &[u8]) -> String {
    match try_extract(filename, bytes) {
        Ok(text) => text,
        Err(error) => {
            warn!("Failed to parse attachment {}: {:#}", filename, error);
            format!("[Error parsing {}: {:#}]", filename, error)
        }
    }
}

fn try_extract(filename: &str, bytes: &[u8]) -> Result<String> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    debug!(
        "Extracting text from {} ({} bytes, .{})",
        filename,
        bytes.len(),
        extension
    );

    match extension.as_str() {
        "pdf" => pdf_extract::extract_text_from_mem(bytes)
            .context("Failed to extract text from PDF"),
        "docx" => extract_docx_text(bytes),
        "md" | "markdown" => Ok(extract_markdown_text(&String::from_utf8_lossy(bytes))),
        "html" | "htm" => Ok(clean_html(&String::from_utf8_lossy(bytes))),
        "txt" | "csv" | "log" | "json" | "yaml" | "yml" | "xml" => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => {
            // No extractor for this format; accept it only if it already
            // is valid text.
            let text = std::str::from_utf8(bytes)
                .with_context(|| format!("Unsupported attachment format: .{}", extension))?;
            Ok(text.to_string())
        }
    }
}

/// Pull the text runs (`w:t` elements) out of a DOCX document body.
fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).context("Failed to open DOCX archive")?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX archive has no document body")?
        .read_to_string(&mut document_xml)
        .context("Failed to read DOCX document body")?;

    let mut reader = Reader::from_str(&document_xml);
    reader.config_mut().trim_text(false);

    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(element)) => {
                let name = element.name();
                if name.as_ref() == b"w:t" {
                    in_text_run = true;
                } else if name.as_ref() == b"w:p" && !text.is_empty() {
                    text.push('\n');
                }
            }
            Ok(XmlEvent::End(element)) => {
                if element.name().as_ref() == b"w:t" {
                    in_text_run = false;
                }
            }
            Ok(XmlEvent::Text(content)) => {
                if in_text_run {
                    let unescaped = content
                        .unescape()
                        .context("Failed to decode DOCX text run")?;
                    text.push_str(&unescaped);
                }
            }
            Ok(XmlEvent::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(error).context("Failed to parse DOCX document XML"),
        }
    }

    Ok(text)
}

/// Render Markdown down to its plain text content.
fn extract_markdown_text(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut text = String::new();

    for event in parser {
        match event {
            Event::Text(content) | Event::Code(content) => text.push_str(&content),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => text.push('\n'),
            _ => {}
        }
    }

    text.trim().to_string()
}
