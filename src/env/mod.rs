//! # Layered Env
//!
//! An [`Env`] is an ordered key → [`Entry`] mapping for one `.env` file or the
//! result of merging several of them. Order is insertion order and is
//! significant: it drives output, re-serialization and the order in which
//! references are resolved.
//!
//! ```text
//! .env ──┐
//! .env.<profile> ──┼──> Env::merge ──> interpolate ──> resolve
//! .env.local ──┘
//! ```

pub mod interpolate;
pub mod layers;
pub mod parser;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::reference::{is_ref, REF_PREFIX};

pub use interpolate::{interpolate, Cycle};
pub use layers::{load_layers, LayerPaths};
pub use parser::{parse, Parsed};

/// How a value was quoted in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    #[default]
    None,
    Single,
    Double,
    Backtick,
}

/// One variable binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// Value after quote processing.
    pub value: String,
    /// Value text exactly as written, used when writing the file back.
    pub raw: String,
    pub quote: QuoteStyle,
    /// Offsets in `value` of `$` signs written as `\$`. They never start a
    /// placeholder.
    pub escaped_dollars: Vec<usize>,
    /// True iff `value` starts with `ref://`.
    pub is_ref: bool,
    /// 1-based line in the origin file, 0 for entries added by [`Env::set`].
    pub line: usize,
    /// Set by the resolver when the value came from a secret backend.
    pub secret: bool,
}

impl Entry {
    /// Build an entry from an already-decoded value, choosing quoting for write-back.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let (raw, quote) = encode_value(&value);
        Self {
            key: key.into(),
            is_ref: is_ref(&value),
            value,
            raw,
            quote,
            escaped_dollars: Vec::new(),
            line: 0,
            secret: false,
        }
    }

    /// The parsed reference path, or the key itself when the reference is malformed.
    pub fn ref_path_or_key(&self) -> &str {
        match self.value.strip_prefix(REF_PREFIX).and_then(|rest| rest.split_once('/')) {
            Some((backend, path)) if !backend.is_empty() && !path.is_empty() => path,
            _ => &self.key,
        }
    }

    fn serialize_line(&self) -> String {
        format!("{}={}", self.key, self.raw)
    }
}

/// One physical line of a loaded file, line ending included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLine {
    /// Blank line or comment
    Text(String),
    /// A binding of `key`, as written
    Binding { key: String, text: String },
}

/// Non-fatal diagnostic produced while loading a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub path: Option<PathBuf>,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}: {}", path.display(), self.line, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

/// Ordered mapping of keys to entries.
#[derive(Debug, Clone, Default)]
pub struct Env {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    warnings: Vec<Warning>,
    // Source file lines; empty for merged or in-memory Envs.
    lines: Vec<SourceLine>,
    // Keys changed by `set` since loading.
    modified: HashSet<String>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse env file contents that did not come from disk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_parsed(parse(bytes, None)?)
    }

    /// Load a required file. A missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::io(e, format!("Failed to read env file: {}", path.display())))?;
        let env = Self::from_parsed(parse(&bytes, Some(path))?)?;
        tracing::debug!(path = %path.display(), entries = env.len(), "Loaded env file");
        Ok(env)
    }

    /// Load an optional file. A missing file yields an empty Env.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Optional env file not present");
            return Ok(Self::new());
        }
        Self::load(path)
    }

    fn from_parsed(parsed: Parsed) -> Result<Self> {
        let mut env = Self::new();
        for entry in parsed.entries {
            env.upsert(entry);
        }
        env.warnings = parsed.warnings;
        env.lines = parsed.lines;
        Ok(env)
    }

    /// Combine layers left to right. A key keeps the position where it was
    /// first seen; later layers only replace its value. Keys new to a later
    /// layer are appended in that layer's order.
    pub fn merge(layers: &[&Env]) -> Env {
        let mut merged = Env::new();
        for layer in layers {
            for entry in &layer.entries {
                merged.upsert(entry.clone());
            }
            merged.warnings.extend(layer.warnings.iter().cloned());
        }
        merged
    }

    /// Insert or replace an entry, keeping the original position on replace.
    fn upsert(&mut self, entry: Entry) {
        match self.index.get(&entry.key) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.key.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Update a value in place, or append a new key at the end.
    pub fn set(&mut self, key: &str, value: &str) {
        self.modified.insert(key.to_string());
        match self.index.get(key) {
            Some(&i) => {
                let line = self.entries[i].line;
                self.entries[i] = Entry { line, ..Entry::new(key, value) };
            }
            None => self.upsert(Entry::new(key, value)),
        }
    }

    /// Remove a key, returning its entry.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let i = self.index.remove(key)?;
        let entry = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(entry)
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|e| e.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// All entries in order.
    pub fn all(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries whose value is a reference, in order.
    pub fn refs(&self) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.is_ref).collect()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Warnings gathered from every loaded layer.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Any entry that was written as a reference.
    pub fn has_refs(&self) -> bool {
        self.entries.iter().any(|e| e.is_ref)
    }

    /// Any value containing `ref://`, including values that only became a
    /// reference through interpolation.
    pub fn has_any_refs(&self) -> bool {
        self.entries.iter().any(|e| e.value.contains(REF_PREFIX))
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Serialize for write-back.
    ///
    /// Comments, blank lines and bindings of keys not changed through
    /// [`Env::set`] are emitted exactly as read. A changed key is rewritten
    /// as `KEY=raw` at its first line (keeping an `export ` prefix) and its
    /// duplicate lines are dropped. Removed keys are dropped. Keys with no
    /// source line are appended in order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut emitted: HashSet<&str> = HashSet::new();

        for line in &self.lines {
            match line {
                SourceLine::Text(text) => push_verbatim(&mut out, text),
                SourceLine::Binding { key, text } => {
                    let Some(entry) = self.get(key) else { continue };
                    let first = emitted.insert(entry.key.as_str());
                    if !self.modified.contains(key) {
                        push_verbatim(&mut out, text);
                    } else if first {
                        let export = if text.trim_start().starts_with("export ") { "export " } else { "" };
                        push_generated(&mut out, &format!("{}{}", export, entry.serialize_line()));
                    }
                }
            }
        }

        for entry in self.entries.iter().filter(|e| !emitted.contains(e.key.as_str())) {
            push_generated(&mut out, &entry.serialize_line());
        }
        out
    }

    /// Write the Env back to `path`. See [`Env::render`] for what is kept.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.render())
            .map_err(|e| Error::io(e, format!("Failed to write env file: {}", path.display())))?;
        tracing::debug!(path = %path.display(), entries = self.len(), "Wrote env file");
        Ok(())
    }
}

fn push_verbatim(out: &mut String, text: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(text);
}

fn push_generated(out: &mut String, line: &str) {
    push_verbatim(out, line);
    out.push('\n');
}

/// Choose the written form of a value: double-quoted when it contains
/// whitespace or would otherwise be misread, bare otherwise.
fn encode_value(value: &str) -> (String, QuoteStyle) {
    let needs_quotes = value.chars().any(char::is_whitespace)
        || value.starts_with(['"', '\'', '`'])
        || value.contains(" #");
    if !needs_quotes {
        return (value.to_string(), QuoteStyle::None);
    }

    let mut raw = String::with_capacity(value.len() + 2);
    raw.push('"');
    for c in value.chars() {
        match c {
            '"' => raw.push_str("\\\""),
            '\\' => raw.push_str("\\\\"),
            '\n' => raw.push_str("\\n"),
            '\r' => raw.push_str("\\r"),
            '\t' => raw.push_str("\\t"),
            c => raw.push(c),
        }
    }
    raw.push('"');
    (raw, QuoteStyle::Double)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn env(text: &str) -> Env {
        Env::from_bytes(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_merge_precedence() {
        let base = env("HOST=prod\nPORT=5432\n");
        let local = env("HOST=localhost\n");

        let merged = Env::merge(&[&base, &local]);
        assert_eq!(merged.value("HOST"), Some("localhost"));
        assert_eq!(merged.value("PORT"), Some("5432"));
    }

    #[test]
    fn test_merge_keeps_first_seen_position() {
        let base = env("A=1\nB=2\nC=3\n");
        let profile = env("D=4\nB=20\n");
        let local = env("E=5\nA=10\n");

        let merged = Env::merge(&[&base, &profile, &local]);
        assert_eq!(merged.keys(), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(merged.value("A"), Some("10"));
        assert_eq!(merged.value("B"), Some("20"));
    }

    #[test]
    fn test_merge_collects_warnings() {
        let base = env("A=1\nA=2\n");
        let local = env("B=1\nB=2\n");
        let merged = Env::merge(&[&base, &local]);
        assert_eq!(merged.warnings().len(), 2);
    }

    #[test]
    fn test_set_preserves_position() {
        let mut env = env("A=1\nB=2\nC=3\n");
        env.set("B", "two");
        env.set("D", "4");
        assert_eq!(env.keys(), vec!["A", "B", "C", "D"]);
        assert_eq!(env.value("B"), Some("two"));
        assert_eq!(env.get("B").unwrap().line, 2);
        assert_eq!(env.get("D").unwrap().line, 0);
    }

    #[test]
    fn test_set_recomputes_ref_flag() {
        let mut env = env("DB=ref://vault/db\n");
        assert!(env.get("DB").unwrap().is_ref);
        env.set("DB", "plain");
        assert!(!env.get("DB").unwrap().is_ref);
        env.set("DB", "ref://vault/db2");
        assert!(env.get("DB").unwrap().is_ref);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut env = env("A=1\nB=2\nC=3\n");
        assert!(env.remove("A").is_some());
        assert_eq!(env.value("C"), Some("3"));
        env.set("B", "x");
        assert_eq!(env.keys(), vec!["B", "C"]);
    }

    #[test]
    fn test_refs_and_keys() {
        let env = env("A=1\nSECRET=ref://keychain/api\nB=2\n");
        let refs: Vec<&str> = env.refs().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(refs, vec!["SECRET"]);
        assert!(env.has_refs());
    }

    #[test]
    fn test_has_any_refs_sees_embedded_refs() {
        let env = env("A=prefix-ref://vault/x\n");
        assert!(!env.has_refs());
        assert!(env.has_any_refs());
    }

    #[test]
    fn test_write_preserves_untouched_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "A='single quoted'\nB=\"x\\ty\"\nC=`raw $x`\n").unwrap();

        let mut env = Env::load(&path).unwrap();
        env.set("D", "with space");
        env.write(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "A='single quoted'\nB=\"x\\ty\"\nC=`raw $x`\nD=\"with space\"\n");
    }

    #[test]
    fn test_load_missing_required_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Env::load(dir.path().join(".env"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_load_optional_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env::load_optional(dir.path().join(".env.local")).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_ref_path_or_key() {
        let env = env("A=ref://vault/db/password\nB=ref://broken\n");
        assert_eq!(env.get("A").unwrap().ref_path_or_key(), "db/password");
        assert_eq!(env.get("B").unwrap().ref_path_or_key(), "B");
    }

    #[test]
    fn test_write_keeps_comments_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let original = "# database settings\nexport DB_HOST=db # primary\n\nPORT = 5432\n";
        std::fs::write(&path, original).unwrap();

        let mut env = Env::load(&path).unwrap();
        env.set("NEW", "x");
        env.write(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{}NEW=x\n", original));
    }

    #[test]
    fn test_render_rewrites_only_changed_keys() {
        let mut env = env("# top\nexport A=1 # keep\nB = 2\nA=3\n\n# end");
        env.set("A", "changed");
        assert_eq!(env.render(), "# top\nexport A=changed\nB = 2\n\n# end");

        env.remove("B");
        env.set("C", "new");
        assert_eq!(env.render(), "# top\nexport A=changed\n\n# end\nC=new\n");
    }

    #[test]
    fn test_render_unchanged_file_is_identical() {
        let text = "A=1\r\n# c\r\nA=2\nB='x' # y";
        assert_eq!(env(text).render(), text);
    }

    proptest! {
        #[test]
        fn prop_render_then_parse_roundtrips(
            pairs in prop::collection::vec(
                ("[A-Z_][A-Z0-9_]{0,8}", "[ -~\t\n]{0,16}"),
                0..8,
            )
        ) {
            let mut env = Env::new();
            for (key, value) in &pairs {
                env.set(key, value);
            }

            let reparsed = Env::from_bytes(env.render().as_bytes()).unwrap();
            prop_assert_eq!(reparsed.keys(), env.keys());
            for entry in env.all() {
                prop_assert_eq!(reparsed.value(&entry.key), Some(entry.value.as_str()));
            }
        }
    }
}
