//! Link token scanning
//!
//! A token is `[[name:ref]]`. Whether it is a link at all is decided later by
//! looking `name` up in the registry; this module only finds candidates and
//! classifies the `ref`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[(?<name>[A-Za-z0-9_]+):(?<reference>[^\[\]\s]+)\]\]").unwrap()
});

/// The `ref` part of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'t> {
    /// `id:42`, storage form of a slug-based type
    Stored(i64),
    /// Anything else: a slug, or a numeric id of an id-based type
    Plain(&'t str),
    /// `id:` followed by something other than digits
    Malformed,
}

impl<'t> Reference<'t> {
    fn parse(raw: &'t str) -> Self {
        match raw.strip_prefix("id:") {
            Some(id) => match parse_id(id) {
                Some(id) => Reference::Stored(id),
                None => Reference::Malformed,
            },
            None => Reference::Plain(raw),
        }
    }

    /// Numeric value of a plain ref, as used by id-based types
    pub fn plain_id(&self) -> Option<i64> {
        match self {
            Reference::Plain(raw) => parse_id(raw),
            _ => None,
        }
    }
}

/// A candidate token found in text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken<'t> {
    /// Byte range of the whole `[[...]]` in the scanned text
    pub range: Range<usize>,
    pub name: &'t str,
    pub raw_ref: &'t str,
    pub reference: Reference<'t>,
}

/// Find all candidate tokens, left to right, non-overlapping
pub fn scan(text: &str) -> impl Iterator<Item = LinkToken<'_>> {
    TOKEN_RE.captures_iter(text).map(|caps| {
        let whole = caps.get(0).expect("group 0 always matches");
        let raw_ref = caps.name("reference").map_or("", |m| m.as_str());
        LinkToken {
            range: whole.range(),
            name: caps.name("name").map_or("", |m| m.as_str()),
            raw_ref,
            reference: Reference::parse(raw_ref),
        }
    })
}

/// Rebuild `text`, substituting tokens for which `replace` returns `Some`
///
/// Tokens mapped to `None` and all text between tokens are copied verbatim.
pub fn rewrite<F>(text: &str, replace: F) -> String
where
    F: FnMut(&LinkToken<'_>) -> Option<String>,
{
    rewrite_with(text, |output, span| output.push_str(span), replace)
}

/// [`rewrite`] with control over how untouched text is copied
///
/// `copy` receives every span that is not a substituted token, including
/// tokens mapped to `None`.
pub fn rewrite_with<C, F>(text: &str, mut copy: C, mut replace: F) -> String
where
    C: FnMut(&mut String, &str),
    F: FnMut(&LinkToken<'_>) -> Option<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for token in scan(text) {
        if let Some(replacement) = replace(&token) {
            copy(&mut output, &text[last..token.range.start]);
            output.push_str(&replacement);
            last = token.range.end;
        }
    }

    copy(&mut output, &text[last..]);
    output
}

/// Ids are positive decimal integers without sign or padding tricks
fn parse_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
