//! Text codec for object metadata sidecars.
//!
//! Sidecars hold one `key=value` pair per line in the classic properties
//! format: ISO-8859-1 text, `#`/`!` comments, backslash escapes and
//! line continuations. Anything outside printable ASCII is written as a
//! `\uXXXX` escape, so rendered files are plain ASCII.

use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, fmt::Write as _};

/// Metadata stored alongside an object: content hash, content type and any
/// user supplied headers.
pub type Properties = BTreeMap<String, String>;

/// A sidecar that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line where the offending entry starts.
    pub line: usize,
    pub reason: String,
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Decode raw sidecar bytes; every byte maps to the code point of equal value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parse sidecar text into a property map. Later duplicates win.
pub fn parse(text: &str) -> Result<Properties, ParseError> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = normalized.split('\n').enumerate();
    let mut props = Properties::new();

    while let Some((index, raw)) = lines.next() {
        let line_no = index + 1;
        let trimmed = raw.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_owned();
        while has_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        props.insert(unescape(key, line_no)?, unescape(value, line_no)?);
    }

    Ok(props)
}

/// Render a property map, preceded by an empty comment and a timestamp
/// comment. Keys are written in sorted order.
pub fn render(props: &Properties, written_at: DateTime<Utc>) -> String {
    let mut out = String::from("#\n#");
    out.push_str(&written_at.format("%a %b %d %H:%M:%S UTC %Y").to_string());
    out.push('\n');
    for (key, value) in props {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

/// An odd number of trailing backslashes joins the next physical line.
fn has_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or blank.
fn split_entry(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut value_start = line.len();
    let mut has_separator = false;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if !escaped && (c == '=' || c == ':') {
            key_end = i;
            value_start = i + c.len_utf8();
            has_separator = true;
            break;
        }
        if !escaped && is_blank(c) {
            key_end = i;
            value_start = i + c.len_utf8();
            break;
        }
        escaped = c == '\\' && !escaped;
    }

    let mut rest = &line[value_start..];
    loop {
        let Some(c) = rest.chars().next() else { break };
        if is_blank(c) {
            rest = &rest[c.len_utf8()..];
        } else if !has_separator && (c == '=' || c == ':') {
            has_separator = true;
            rest = &rest[c.len_utf8()..];
        } else {
            break;
        }
    }

    (&line[..key_end], rest)
}

fn unescape(raw: &str, line: usize) -> Result<String, ParseError> {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut buf = [0u16; 2];
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        let decoded = if c == '\\' {
            match chars.next() {
                // a dangling backslash at end of input is dropped
                None => break,
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let well_formed =
                        hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit());
                    let unit = well_formed
                        .then(|| u16::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .ok_or_else(|| ParseError {
                            line,
                            reason: format!("malformed \\uxxxx encoding `\\u{}`", hex),
                        })?;
                    units.push(unit);
                    continue;
                }
                Some('t') => '\t',
                Some('r') => '\r',
                Some('n') => '\n',
                Some('f') => '\x0c',
                Some(other) => other,
            }
        } else {
            c
        };
        units.extend_from_slice(decoded.encode_utf16(&mut buf));
    }

    Ok(String::from_utf16_lossy(&units))
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    let mut buf = [0u16; 2];
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if i == 0 || is_key => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if !(' '..='~').contains(&c) => {
                for unit in c.encode_utf16(&mut buf) {
                    let _ = write!(out, "\\u{:04X}", unit);
                }
            }
            c => out.push(c),
        }
    }
}
