//! Minimal HTML element lookup.
//!
//! Good enough for the server-rendered fragments the site returns: elements
//! are matched by tag, class and id, and their content runs to the matching
//! close tag of the same name. Comments and `script`/`style` bodies are
//! never scanned for tags.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(/?)([a-zA-Z][a-zA-Z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("TAG_RE should compile")
});
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("ATTR_RE should compile")
});
const RAW_TEXT: &str =
    r"(?is)<!--.*?(?:-->|\z)|<script\b[^>]*>.*?(?:</script\s*>|\z)|<style\b[^>]*>.*?(?:</style\s*>|\z)";

static SKIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RAW_TEXT).expect("SKIP_RE should compile"));
static STRIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{RAW_TEXT}|<[^>]*>")).expect("STRIP_RE should compile")
});
static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("NUMERIC_ENTITY_RE should compile")
});

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

fn group<'h>(caps: &Captures<'h>, index: usize) -> &'h str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// `tag`, `.class`, `#id`, `tag.class` or `tag#id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector<'s> {
    tag: Option<&'s str>,
    class: Option<&'s str>,
    id: Option<&'s str>,
}

impl<'s> Selector<'s> {
    pub fn parse(selector: &'s str) -> Self {
        let (tag, rest) = match selector.find(['.', '#']) {
            Some(pos) => (&selector[..pos], &selector[pos..]),
            None => (selector, ""),
        };

        Self {
            tag: (!tag.is_empty()).then_some(tag),
            class: rest.strip_prefix('.'),
            id: rest.strip_prefix('#'),
        }
    }

    fn matches(&self, tag: &Tag<'_>) -> bool {
        self.tag.is_none_or(|t| tag.name.eq_ignore_ascii_case(t))
            && self.class.is_none_or(|c| tag.has_class(c))
            && self.id.is_none_or(|id| tag.attr("id").as_deref() == Some(id))
    }
}

/// An opening tag: name plus raw attribute text
#[derive(Debug, Clone, Copy)]
pub struct Tag<'a> {
    name: &'a str,
    attrs: &'a str,
}

impl<'a> Tag<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Attribute value with entities decoded
    pub fn attr(&self, name: &str) -> Option<String> {
        ATTR_RE.captures_iter(self.attrs).find_map(|caps| {
            if !group(&caps, 1).eq_ignore_ascii_case(name) {
                return None;
            }
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some(decode_entities(value))
        })
    }

    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|item| item == class))
    }

    fn is_self_closing(&self) -> bool {
        self.attrs.trim_end().ends_with('/')
            || VOID_TAGS.iter().any(|v| self.name.eq_ignore_ascii_case(v))
    }
}

/// An element: its opening tag and the markup up to the matching close tag
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    tag: Tag<'a>,
    inner: &'a str,
    outer: &'a str,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'a str {
        self.tag.name()
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.tag.attr(name)
    }

    pub fn classes(&self) -> Vec<String> {
        self.tag.classes()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.tag.has_class(class)
    }

    pub fn inner_html(&self) -> &'a str {
        self.inner
    }

    /// The element itself, opening tag included
    pub fn outer_html(&self) -> &'a str {
        self.outer
    }

    /// Text content with tags removed and entities decoded, line breaks kept
    pub fn text(&self) -> String {
        decode_entities(&STRIP_RE.replace_all(self.inner, ""))
    }

    /// Text content on a single line with whitespace runs collapsed
    pub fn clean_text(&self) -> String {
        collapse_whitespace(&self.text())
    }

    /// First descendant matching `selector`
    pub fn find(&self, selector: &str) -> Option<Element<'a>> {
        find(self.inner, selector)
    }

    /// Every descendant matching `selector`, in document order
    pub fn find_all(&self, selector: &str) -> Vec<Element<'a>> {
        find_all(self.inner, selector)
    }
}

/// Every element of `html` whose opening tag satisfies `predicate`, in document order
pub fn select<'a, F>(html: &'a str, mut predicate: F) -> Vec<Element<'a>>
where
    F: FnMut(&Tag<'a>) -> bool,
{
    let mut elements = Vec::new();

    for (offset, caps) in scan_tags(html) {
        if !group(&caps, 1).is_empty() {
            continue;
        }
        let Some(whole) = caps.get(0).map(|m| offset + m.start()..offset + m.end()) else {
            continue;
        };

        let tag = Tag {
            name: group(&caps, 2),
            attrs: group(&caps, 3),
        };
        if !predicate(&tag) {
            continue;
        }

        let (inner, outer_end) = if tag.is_self_closing() {
            ("", whole.end)
        } else {
            let (inner_end, close_end) = close_tag_bounds(html, tag.name, whole.end);
            (&html[whole.end..inner_end], close_end)
        };

        elements.push(Element {
            tag,
            inner,
            outer: &html[whole.start..outer_end],
        });
    }

    elements
}

/// First element of `html` matching `selector`
pub fn find<'a>(html: &'a str, selector: &str) -> Option<Element<'a>> {
    find_all(html, selector).into_iter().next()
}

/// Every element of `html` matching `selector`, in document order
pub fn find_all<'a>(html: &'a str, selector: &str) -> Vec<Element<'a>> {
    let selector = Selector::parse(selector);
    select(html, |tag| selector.matches(tag))
}

/// Tag matches between comments and `script`/`style` bodies, each with the
/// offset of the segment it was found in
fn scan_tags(html: &str) -> impl Iterator<Item = (usize, Captures<'_>)> {
    let mut segments: Vec<Range<usize>> = Vec::new();
    let mut start = 0;
    for skipped in SKIP_RE.find_iter(html) {
        segments.push(start..skipped.start());
        start = skipped.end();
    }
    segments.push(start..html.len());

    segments.into_iter().flat_map(move |segment| {
        let offset = segment.start;
        TAG_RE
            .captures_iter(&html[segment])
            .map(move |caps| (offset, caps))
    })
}

/// End of the content and end of the matching close tag, or the end of `html`
fn close_tag_bounds(html: &str, name: &str, content_start: usize) -> (usize, usize) {
    let mut depth = 1usize;

    for (offset, caps) in scan_tags(&html[content_start..]) {
        if !group(&caps, 2).eq_ignore_ascii_case(name) {
            continue;
        }
        let Some(whole) = caps.get(0) else {
            continue;
        };

        if !group(&caps, 1).is_empty() {
            depth -= 1;
            if depth == 0 {
                let start = content_start + offset;
                return (start + whole.start(), start + whole.end());
            }
        } else if !group(&caps, 3).trim_end().ends_with('/') {
            depth += 1;
        }
    }

    (html.len(), html.len())
}

/// Decode the named entities the site emits plus numeric references
pub fn decode_entities(s: &str) -> String {
    let named = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");

    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse().ok(),
            (None, None) => None,
        };
        code.and_then(char::from_u32)
            .map_or_else(|| group(caps, 0).to_string(), |c| c.to_string())
    });

    numeric.replace("&amp;", "&")
}

/// Collapse every whitespace run into one space and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
