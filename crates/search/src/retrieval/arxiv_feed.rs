//! arXiv Atom feed parsing
//!
//! Yields one `Option<PaperRecord>` per `<entry>`: `None` for entries that
//! lack a title or summary. A hard XML error ends parsing; entries read
//! before the error are kept.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// A well-formed paper entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRecord {
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub link: Option<String>,
    pub published: Option<String>,
}

impl PaperRecord {
    /// Render as an attributed block
    pub fn render(&self) -> String {
        let mut out = format!("Title: {}", self.title);
        if !self.authors.is_empty() {
            out.push_str("\nAuthors: ");
            out.push_str(&self.authors.join(", "));
        }
        if let Some(published) = &self.published {
            out.push_str("\nPublished: ");
            out.push_str(published);
        }
        if let Some(link) = &self.link {
            out.push_str("\nLink: ");
            out.push_str(link);
        }
        out.push_str("\nSummary: ");
        out.push_str(&self.summary);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Summary,
    AuthorName,
    Id,
    Published,
}

#[derive(Default)]
struct EntryBuilder {
    title: Option<String>,
    summary: Option<String>,
    authors: Vec<String>,
    link: Option<String>,
    id: Option<String>,
    published: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, value: String) {
        if value.is_empty() {
            return;
        }
        match field {
            Field::Title => self.title = Some(value),
            Field::Summary => self.summary = Some(value),
            Field::AuthorName => self.authors.push(value),
            Field::Id => self.id = Some(value),
            Field::Published => self.published = Some(value),
        }
    }

    fn finish(self) -> Option<PaperRecord> {
        Some(PaperRecord {
            title: self.title?,
            summary: self.summary?,
            authors: self.authors,
            link: self.link.or(self.id),
            published: self.published,
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();
    match WHITESPACE.get_or_init(|| Regex::new(r"\s+").ok()) {
        Some(re) => re.replace_all(text.trim(), " ").into_owned(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn field_for(name: &[u8], in_author: bool) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"summary" => Some(Field::Summary),
        b"name" if in_author => Some(Field::AuthorName),
        b"id" => Some(Field::Id),
        b"published" => Some(Field::Published),
        _ => None,
    }
}

// The HTML abstract page is the link with rel="alternate" (or no rel)
fn alternate_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().ok()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href,
        _ => None,
    }
}

/// Parse an Atom feed into per-entry optional records
pub fn parse_feed(xml: &str) -> Vec<Option<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut in_author = false;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => {
                        entry = Some(EntryBuilder::default());
                        in_author = false;
                        field = None;
                    }
                    b"author" if entry.is_some() => in_author = true,
                    b"link" => {
                        if let Some(builder) = entry.as_mut() {
                            if builder.link.is_none() {
                                builder.link = alternate_href(e);
                            }
                        }
                    }
                    other if entry.is_some() => {
                        field = field_for(other, in_author);
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(builder) = entry.as_mut() {
                    if e.local_name().as_ref() == b"link" && builder.link.is_none() {
                        builder.link = alternate_href(e);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if field.is_some() {
                    match e.unescape() {
                        Ok(value) => text.push_str(&value),
                        Err(err) => {
                            warn!(error = %err, "Undecodable text in arXiv entry");
                            field = None;
                        }
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => {
                        if let Some(builder) = entry.take() {
                            records.push(builder.finish());
                        }
                        field = None;
                    }
                    b"author" => in_author = false,
                    other => {
                        if let (Some(current), Some(builder)) = (field, entry.as_mut()) {
                            if field_for(other, in_author) == Some(current) {
                                builder.set(current, collapse_whitespace(&text));
                                field = None;
                                text.clear();
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(
                    error = %e,
                    position = reader.buffer_position(),
                    entries = records.len(),
                    "arXiv feed is malformed, keeping entries parsed so far"
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    records
}
