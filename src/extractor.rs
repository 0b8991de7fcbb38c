//! HTML to article text.
//!
//! The primary path scores paragraph-like blocks and credits their score to
//! the enclosing containers, decaying with distance, then keeps the best
//! container after a link-density penalty. Pages where that misfires (search
//! result pages, listicles) fall back to text of the whole document.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Node, Selector};

use crate::cleaner::{self, MIN_WORDS};

/// Wrap width for full-page conversion. Wide enough that paragraphs stay on
/// one line.
const FALLBACK_WIDTH: usize = 1000;

/// Elements that may hold a paragraph of running text. Containers only count
/// when they have no block-level children of their own.
const PARAGRAPH_SELECTOR: &str = "p, pre, td, blockquote, div, section, article, main";

/// Upper bound on paragraphs scored per page.
const MAX_PARAGRAPHS: usize = 20_000;

const MIN_PARAGRAPH_CHARS: usize = 25;

/// Ancestor levels credited with a paragraph's score.
const CREDITED_LEVELS: usize = 3;

/// Matched against whole class/id tokens, or a token prefix followed by `-`
/// or `_` (`sidebar-left`, `ads_top`).
const BOILERPLATE_MARKERS: [&str; 16] = [
    "nav",
    "navbar",
    "menu",
    "sidebar",
    "footer",
    "header",
    "banner",
    "cookie",
    "cookies",
    "consent",
    "ad",
    "ads",
    "advert",
    "promo",
    "subscribe",
    "newsletter",
];
const SKIP_TAGS: [&str; 11] = [
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
    "iframe",
];

const BLOCK_TAGS: [&str; 22] = [
    "p",
    "div",
    "br",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "tr",
    "td",
    "th",
    "article",
    "section",
    "main",
    "blockquote",
    "pre",
    "figcaption",
    "dt",
    "dd",
    "table",
];

/// Extracts cleaned article text from a raw HTML page.
pub fn extract(html: &str) -> String {
    let primary = main_content(html).unwrap_or_default();
    let text = if cleaner::word_count(&primary) < MIN_WORDS {
        log::debug!("main content too thin, falling back to full page text");
        full_page_text(html)
    } else {
        primary
    };
    cleaner::clean(&text)
}


/// Text of the best-scoring content container, if any scored above zero.
pub fn main_content(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(PARAGRAPH_SELECTOR).ok()?;

    let mut candidates = HashMap::new();
    for paragraph in document.select(&selector).take(MAX_PARAGRAPHS) {
        if !is_paragraph_like(&paragraph) || is_excluded(&paragraph) {
            continue;
        }
        let chars = text_chars(&paragraph);
        if chars < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let commas: usize = paragraph.text().map(|t| t.matches(',').count()).sum();
        let content = 1.0 + commas as f64 + (chars as f64 / 100.0).min(3.0);

        let ancestors = paragraph
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(CREDITED_LEVELS);
        for (level, ancestor) in ancestors.enumerate() {
            let divider = match level {
                0 => 1.0,
                1 => 2.0,
                n => n as f64 * 3.0,
            };
            let entry = candidates
                .entry(ancestor.id())
                .or_insert_with(|| (ancestor, tag_weight(ancestor.value().name())));
            entry.1 += content / divider;
        }
    }

    let (element, _) = candidates
        .into_values()
        .map(|(element, score)| (element, score * (1.0 - link_density(&element))))
        .filter(|(_, score)| *score > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    let text = block_text(&element);
    (!text.is_empty()).then_some(text)
}

/// Markup of the whole page stripped to text.
pub fn full_page_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), FALLBACK_WIDTH) {
        Ok(text) => normalize_lines(&text),
        Err(e) => {
            log::debug!("html2text failed, using raw document text: {:#}", e);
            let document = Html::parse_document(html);
            block_text(&document.root_element())
        }
    }
}

fn is_boilerplate_token(token: &str) -> bool {
    BOILERPLATE_MARKERS.iter().any(|marker| {
        token == *marker
            || token
                .strip_prefix(*marker)
                .is_some_and(|rest| rest.starts_with(['-', '_']))
    })
}

fn is_boilerplate_container(element: &ElementRef) -> bool {
    let el = element.value();
    el.attr("class")
        .into_iter()
        .chain(el.attr("id"))
        .flat_map(str::split_whitespace)
        .any(|token| is_boilerplate_token(&token.to_ascii_lowercase()))
}

fn is_skipped(element: &ElementRef) -> bool {
    SKIP_TAGS.contains(&element.value().name()) || is_boilerplate_container(element)
}

/// A paragraph sitting in skipped markup or a boilerplate container anywhere
/// up the tree never counts.
fn is_excluded(paragraph: &ElementRef) -> bool {
    is_skipped(paragraph)
        || paragraph
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| is_skipped(&ancestor))
}

fn is_paragraph_like(element: &ElementRef) -> bool {
    match element.value().name() {
        "p" | "pre" | "td" | "blockquote" => true,
        _ => !element
            .children()
            .filter_map(ElementRef::wrap)
            .any(|child| BLOCK_TAGS.contains(&child.value().name())),
    }
}

fn tag_weight(tag: &str) -> f64 {
    match tag {
        "article" => 10.0,
        "main" => 8.0,
        "div" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "ul" | "ol" | "li" | "dl" | "dd" | "dt" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

fn text_chars(element: &ElementRef) -> usize {
    element.text().map(|t| t.trim().chars().count()).sum()
}

fn link_text_chars(element: &ElementRef) -> usize {
    let Ok(selector) = Selector::parse("a") else {
        return 0;
    };
    element.select(&selector).map(|a| text_chars(&a)).sum()
}

fn link_density(element: &ElementRef) -> f64 {
    let text = text_chars(element);
    if text == 0 {
        return 1.0;
    }
    link_text_chars(element) as f64 / text as f64
}

/// Newline-separated text blocks of `element`, noisy subtrees skipped.
pub fn block_text(element: &ElementRef) -> String {
    let mut buf = String::new();
    collect_text(element, &mut buf);
    normalize_lines(&buf)
}

fn collect_text(element: &ElementRef, buf: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buf.push_str(text),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_skipped(&child_ref) {
                    continue;
                }
                let is_block = BLOCK_TAGS.contains(&el.name());
                if is_block {
                    buf.push('\n');
                }
                collect_text(&child_ref, buf);
                if is_block {
                    buf.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapses whitespace inside each line and drops blank lines.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
