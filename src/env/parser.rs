//! Line parser for `.env` files.
//!
//! Each line is trimmed; blank lines and `#` comments are skipped and an
//! optional `export ` prefix is stripped. The rest splits on the first
//! unescaped `=`. Values may be bare, `'single'` (literal), `"double"`
//! (backslash escapes) or `` `backtick` `` (literal, for shell
//! metacharacters).

use std::collections::HashMap;
use std::path::Path;

use super::{Entry, QuoteStyle, SourceLine, Warning};
use crate::errors::{Error, Result};
use crate::reference::is_ref;

/// Output of [`parse`]: entries in first-seen order plus non-fatal warnings.
#[derive(Debug, Default)]
pub struct Parsed {
    pub entries: Vec<Entry>,
    pub warnings: Vec<Warning>,
    /// Every physical line, in file order, for write-back
    pub lines: Vec<SourceLine>,
}

/// Parse file contents. `path` is only used for diagnostics.
///
/// Duplicate keys keep the position of their first occurrence and take the
/// value of the last one, with a warning for each shadowed line.
pub fn parse(bytes: &[u8], path: Option<&Path>) -> Result<Parsed> {
    let text = decode(bytes, path)?;
    let mut parsed = Parsed::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (i, source) in text.split_inclusive('\n').enumerate() {
        let line_no = i + 1;
        let line = source.trim();
        if line.is_empty() || line.starts_with('#') {
            parsed.lines.push(SourceLine::Text(source.to_string()));
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let Some(eq) = find_separator(line) else {
            return Err(Error::parse(path, line_no, "expected KEY=VALUE"));
        };
        let key = line[..eq].trim();
        if key.is_empty() {
            return Err(Error::parse(path, line_no, "empty key"));
        }

        let value = parse_value(&line[eq + 1..])
            .map_err(|message| Error::parse(path, line_no, message))?;
        if let Some(message) = value.warning {
            parsed.warnings.push(Warning { path: path.map(Path::to_path_buf), line: line_no, message });
        }

        parsed.lines.push(SourceLine::Binding { key: key.to_string(), text: source.to_string() });

        let entry = Entry {
            key: key.to_string(),
            is_ref: is_ref(&value.value),
            value: value.value,
            raw: value.raw,
            quote: value.quote,
            escaped_dollars: value.escaped_dollars,
            line: line_no,
            secret: false,
        };

        match seen.get(key) {
            Some(&idx) => {
                let first_line = parsed.entries[idx].line;
                parsed.warnings.push(Warning {
                    path: path.map(Path::to_path_buf),
                    line: line_no,
                    message: format!("duplicate key '{}' overrides line {}", key, first_line),
                });
                parsed.entries[idx] = Entry { line: first_line, ..entry };
            }
            None => {
                seen.insert(key.to_string(), parsed.entries.len());
                parsed.entries.push(entry);
            }
        }
    }

    Ok(parsed)
}

/// Reject input that is not UTF-8, naming the first bad line.
fn decode<'a>(bytes: &'a [u8], path: Option<&Path>) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| {
        let line = bytes[..e.valid_up_to()].iter().filter(|b| **b == b'\n').count() + 1;
        Error::parse(path, line, "invalid UTF-8")
    })
}

/// Byte offset of the first `=` not preceded by a backslash.
fn find_separator(line: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '=' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}

struct ParsedValue {
    value: String,
    raw: String,
    quote: QuoteStyle,
    escaped_dollars: Vec<usize>,
    warning: Option<String>,
}

fn parse_value(rest: &str) -> std::result::Result<ParsedValue, String> {
    let trimmed = rest.trim_start();
    let quote = match trimmed.chars().next() {
        Some('\'') => QuoteStyle::Single,
        Some('"') => QuoteStyle::Double,
        Some('`') => QuoteStyle::Backtick,
        _ => return Ok(parse_unquoted(rest)),
    };

    let delim = trimmed.as_bytes()[0] as char;
    let body = &trimmed[1..];
    let close = find_closing(body, delim, quote == QuoteStyle::Double)
        .ok_or_else(|| format!("unterminated {} quote", quote_name(quote)))?;

    let inner = &body[..close];
    let (value, escaped_dollars) = match quote {
        QuoteStyle::Double => unescape_double(inner),
        _ => (inner.to_string(), Vec::new()),
    };

    let trailing = body[close + 1..].trim();
    let warning = if trailing.is_empty() || trailing.starts_with('#') {
        None
    } else {
        Some(format!("ignoring characters after closing quote: '{}'", trailing))
    };

    Ok(ParsedValue {
        value,
        raw: trimmed[..close + 2].to_string(),
        quote,
        escaped_dollars,
        warning,
    })
}

fn parse_unquoted(rest: &str) -> ParsedValue {
    let mut end = rest.len();
    let mut prev_ws = false;
    for (i, c) in rest.char_indices() {
        if c == '#' && prev_ws {
            end = i;
            break;
        }
        prev_ws = c.is_whitespace();
    }
    let value = rest[..end].trim().to_string();
    ParsedValue {
        raw: value.clone(),
        value,
        quote: QuoteStyle::None,
        escaped_dollars: Vec::new(),
        warning: None,
    }
}

fn find_closing(body: &str, delim: char, escapes: bool) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escapes && c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        if c == delim && !escaped {
            return Some(i);
        }
        escaped = false;
    }
    None
}

/// Process double-quote escapes. Also returns the offsets in the output of
/// every `$` that was written as `\$`.
fn unescape_double(inner: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(inner.len());
    let mut escaped_dollars = Vec::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('$') => {
                escaped_dollars.push(out.len());
                out.push('$');
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    (out, escaped_dollars)
}

fn quote_name(quote: QuoteStyle) -> &'static str {
    match quote {
        QuoteStyle::Single => "single",
        QuoteStyle::Double => "double",
        QuoteStyle::Backtick => "backtick",
        QuoteStyle::None => "bare",
    }
}
