//! `${KEY}` substitution over a merged [`Env`].
//!
//! Substitution is a single pass in Env order. Each value sees the current
//! values of the whole merged Env, so a profile or local override is visible
//! when interpolating an entry defined earlier in the base file. A placeholder
//! whose target still holds unresolved placeholders is copied as-is, so chained
//! placeholders resolve only when the target comes first. Unknown keys are left
//! as literal text. Reference entries, single-quoted and backtick-quoted values
//! are never rewritten, and a `$` written as `\$` never starts a placeholder.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Entry, Env, QuoteStyle};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

/// A dependency cycle between placeholders, e.g. `A -> B -> A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub keys: Vec<String>,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join(" -> "))
    }
}

/// Substitute placeholders in place and report any dependency cycles found.
pub fn interpolate(env: &mut Env) -> Vec<Cycle> {
    let cycles = find_cycles(env);
    for cycle in &cycles {
        tracing::warn!(cycle = %cycle, "Interpolation cycle detected; placeholders left unresolved");
    }

    for i in 0..env.len() {
        let entry = &env.all()[i];
        if !expands(entry) || !entry.value.contains("${") {
            continue;
        }
        let (value, escaped_dollars) = substitute(entry, env);
        let entry = &mut env.entries_mut()[i];
        entry.value = value;
        entry.escaped_dollars = escaped_dollars;
    }

    cycles
}

/// Whether `entry` takes part in interpolation at all.
fn expands(entry: &Entry) -> bool {
    !entry.is_ref && !matches!(entry.quote, QuoteStyle::Single | QuoteStyle::Backtick)
}

/// Placeholder names in `entry` that are not escaped.
fn active_placeholders(entry: &Entry) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(&entry.value)
        .filter(|caps| caps.get(0).is_some_and(|m| !entry.escaped_dollars.contains(&m.start())))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Substituted value plus the escaped-`$` offsets moved to match it.
fn substitute(entry: &Entry, env: &Env) -> (String, Vec<usize>) {
    let value = entry.value.as_str();
    let mut out = String::with_capacity(value.len());
    let mut escaped = Vec::new();
    let mut copied = 0;

    for caps in PLACEHOLDER.captures_iter(value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
        if entry.escaped_dollars.contains(&whole.start()) {
            continue;
        }
        let Some(current) = env.value(name.as_str()) else { continue };
        copy_span(entry, copied, whole.start(), &mut out, &mut escaped);
        out.push_str(current);
        copied = whole.end();
    }
    copy_span(entry, copied, value.len(), &mut out, &mut escaped);
    (out, escaped)
}

/// Append `entry.value[start..end]`, carrying escaped-`$` offsets along.
fn copy_span(entry: &Entry, start: usize, end: usize, out: &mut String, escaped: &mut Vec<usize>) {
    for &offset in entry.escaped_dollars.iter().filter(|o| (start..end).contains(*o)) {
        escaped.push(out.len() + offset - start);
    }
    out.push_str(&entry.value[start..end]);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycles(env: &Env) -> Vec<Cycle> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles = Vec::new();

    for entry in env.all() {
        visit(env, &entry.key, &mut marks, &mut stack, &mut cycles);
    }
    cycles
}

fn visit<'a>(
    env: &'a Env,
    key: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Cycle>,
) {
    match marks.get(key) {
        Some(Mark::Done) => return,
        Some(Mark::Visiting) => {
            if let Some(start) = stack.iter().position(|k| *k == key) {
                let mut keys: Vec<String> = stack[start..].iter().map(|k| k.to_string()).collect();
                keys.push(key.to_string());
                cycles.push(Cycle { keys });
            }
            return;
        }
        None => {}
    }

    let Some(entry) = env.get(key) else { return };
    if !expands(entry) {
        marks.insert(key, Mark::Done);
        return;
    }

    marks.insert(key, Mark::Visiting);
    stack.push(key);
    for dep in active_placeholders(entry) {
        if let Some(target) = env.get(dep) {
            visit(env, &target.key, marks, stack, cycles);
        }
    }
    stack.pop();
    marks.insert(key, Mark::Done);
}
