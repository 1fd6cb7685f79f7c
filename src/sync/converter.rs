//! Transcript to markdown conversion

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::manifest::{ItemMetadata, RenderOptions};

/// Turns a cached source transcript into a markdown document
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, source: &str, metadata: &ItemMetadata, options: &RenderOptions) -> Result<String>;
}

/// Converts TTML transcripts (or plain text) into readable markdown
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownConverter;

/// One transcript paragraph with its optional start offset
#[derive(Debug, PartialEq)]
struct Paragraph {
    begin: Option<f64>,
    text: String,
}

/// Parse `12.5s`, `01:02.5` or `00:01:02.500` into seconds
fn parse_clock(value: &str) -> Option<f64> {
    if let Some(secs) = value.strip_suffix('s') {
        return secs.parse().ok();
    }
    value
        .split(':')
        .try_fold(0.0, |acc: f64, part| part.parse::<f64>().ok().map(|n| acc * 60.0 + n))
}

fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

fn begin_offset(start: &BytesStart) -> Option<f64> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"begin")
        .and_then(|attr| attr.unescape_value().ok().and_then(|value| parse_clock(&value)))
}

fn flush(paragraphs: &mut Vec<Paragraph>, current: Option<(Option<f64>, String)>) {
    let Some((begin, raw)) = current else { return };
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        paragraphs.push(Paragraph { begin, text });
    }
}

/// Text of every `<p>` element, namespaced or not, with its `begin` offset
fn ttml_paragraphs(source: &str) -> Result<Vec<Paragraph>> {
    let mut reader = Reader::from_str(source);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<(Option<f64>, String)> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("Malformed transcript XML at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"p" => {
                flush(&mut paragraphs, current.take());
                current = Some((begin_offset(&e), String::new()));
            }
            Event::End(e) if e.local_name().as_ref() == b"p" => {
                flush(&mut paragraphs, current.take());
            }
            Event::Empty(e) if e.local_name().as_ref() == b"br" => {
                if let Some((_, text)) = current.as_mut() {
                    text.push(' ');
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = current.as_mut() {
                    match t.unescape() {
                        Ok(content) => text.push_str(&content),
                        // Entities XML does not define (e.g. &nbsp;) are kept verbatim
                        Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    flush(&mut paragraphs, current.take());
    Ok(paragraphs)
}

fn text_paragraphs(source: &str) -> Vec<Paragraph> {
    source
        .split("\n\n")
        .map(|block| block.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .map(|text| Paragraph { begin: None, text })
        .collect()
}

impl DocumentConverter for MarkdownConverter {
    fn convert(&self, source: &str, metadata: &ItemMetadata, options: &RenderOptions) -> Result<String> {
        let paragraphs = if source.trim_start().starts_with('<') {
            ttml_paragraphs(source)?
        } else {
            text_paragraphs(source)
        };
        if paragraphs.is_empty() {
            bail!("Transcript contains no text");
        }

        let title = metadata.episode_title.as_deref().unwrap_or("Untitled episode");
        let mut doc = format!("# {}\n\n", title);

        let byline: Vec<String> = [
            metadata.show_title.as_ref().map(|s| format!("**{}**", s)),
            metadata.publisher_title.clone(),
            metadata.publish_date.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !byline.is_empty() {
            doc.push_str(&byline.join(" · "));
            doc.push_str("\n\n");
        }

        if options.include_description
            && let Some(description) = metadata.episode_description.as_deref().map(str::trim)
            && !description.is_empty()
        {
            doc.push_str(&format!("> {}\n\n", description.replace('\n', "\n> ")));
        }

        doc.push_str("---\n\n");

        for paragraph in &paragraphs {
            match paragraph.begin {
                Some(begin) if options.timestamps => {
                    doc.push_str(&format!("[{}] {}\n\n", format_clock(begin), paragraph.text));
                }
                _ => {
                    doc.push_str(&paragraph.text);
                    doc.push_str("\n\n");
                }
            }
        }

        Ok(doc.trim_end().to_string() + "\n")
    }
}
