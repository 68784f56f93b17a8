//! Renders evidence into the context block handed to answer generation.
use std::sync::LazyLock;

use regex::Regex;

use crate::remote::{NO_DATE, StructuredRecord};
use crate::retriever::{Evidence, Passage};

/// Context used when retrieval found nothing.
pub const NO_EVIDENCE_SENTINEL: &str = "no evidence found for this request";

pub const MAX_RECORDS: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());

static RECORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\*\*(\d+)\. (.*)\*\*\n- Author: (.*)\n- Year: (.*)\n- Description: (?s:.*?)\n- Link: (.*)$",
    )
    .unwrap()
});

/// Render evidence in ranked order. Empty evidence renders the sentinel.
pub fn assemble(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return NO_EVIDENCE_SENTINEL.to_string();
    }

    let records: Vec<&StructuredRecord> = evidence
        .iter()
        .filter_map(|e| match e {
            Evidence::Record(r) => Some(r),
            Evidence::Passage(_) => None,
        })
        .collect();
    let passages: Vec<&Passage> = evidence
        .iter()
        .filter_map(|e| match e {
            Evidence::Passage(p) => Some(p),
            Evidence::Record(_) => None,
        })
        .collect();

    let mut blocks = Vec::new();
    if !records.is_empty() {
        blocks.push(render_records(&records));
    }
    if !passages.is_empty() {
        blocks.push(render_passages(&passages));
    }
    blocks.join("\n\n")
}

fn render_records(records: &[&StructuredRecord]) -> String {
    records
        .iter()
        .take(MAX_RECORDS)
        .enumerate()
        .map(|(i, r)| render_record(i + 1, r))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One record in the fixed template.
pub fn render_record(position: usize, record: &StructuredRecord) -> String {
    format!(
        "**{position}. {title}**\n- Author: {author}\n- Year: {year}\n- Description: {description}\n- Link: {url}",
        title = one_line(&record.title),
        author = one_line(&record.author),
        year = extract_year(&record.publish_date),
        description = truncate_chars(&one_line(&record.description), MAX_DESCRIPTION_CHARS),
        url = one_line(&record.url),
    )
}

/// Passages grouped under a header per collection, groups in retrieval order.
fn render_passages(passages: &[&Passage]) -> String {
    let mut groups: Vec<(&str, &str, Vec<String>)> = Vec::new();
    for p in passages {
        let rendered = format!("File: {}\n{}", p.chunk.document_id, p.chunk.text);
        match groups.last_mut() {
            Some((collection, _, items)) if *collection == p.collection => items.push(rendered),
            _ => groups.push((p.collection.as_str(), p.label.as_str(), vec![rendered])),
        }
    }

    groups
        .into_iter()
        .map(|(_, label, items)| format!("Passages from {label}:\n{}", items.join("\n\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First four-digit year in a publication date, or the date placeholder.
pub fn extract_year(publish_date: &str) -> String {
    YEAR_RE
        .find(publish_date)
        .map_or_else(|| NO_DATE.to_string(), |m| m.as_str().to_string())
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Fields recovered from a rendered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRecord {
    pub position: usize,
    pub title: String,
    pub author: String,
    pub year: String,
    pub link: String,
}

/// Parse records rendered by [`assemble`], in the order they appear.
pub fn parse_records(text: &str) -> Vec<RenderedRecord> {
    RECORD_RE
        .captures_iter(text)
        .filter_map(|caps| {
            Some(RenderedRecord {
                position: caps[1].parse().ok()?,
                title: caps[2].to_string(),
                author: caps[3].to_string(),
                year: caps[4].to_string(),
                link: caps[5].to_string(),
            })
        })
        .collect()
}
