//! Shared output formatting utilities for CLI commands
//!
//! Resolved values go to stdout in one of the supported formats. Warnings and
//! per-key errors go to stderr through [`report_warning`] and [`report_error`].

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::env::Entry;

/// Placeholder printed instead of secret values and reference text.
pub const MASK: &str = "********";

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `KEY=value` lines, quoted where needed
    Env,
    Json,
    Yaml,
    Table,
}

impl OutputFormat {
    /// Parse output format from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "env" | "dotenv" => Ok(OutputFormat::Env),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            _ => anyhow::bail!(
                "Unsupported output format: '{}'. Use 'env', 'json', 'yaml', or 'table'.",
                s
            ),
        }
    }
}

/// Key/value pairs that serialize as a map in their given order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedPairs(pub Vec<(String, String)>);

impl OrderedPairs {
    pub fn from_entries(entries: &[Entry]) -> Self {
        Self(entries.iter().map(|e| (e.key.clone(), e.value.clone())).collect())
    }
}

impl Serialize for OrderedPairs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Render pairs in `format`.
pub fn render_pairs(pairs: &OrderedPairs, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Env => Ok(pairs
            .0
            .iter()
            .map(|(key, value)| format!("{}={}\n", key, Entry::new(key.as_str(), value.as_str()).raw))
            .collect()),
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(pairs).context("Failed to serialize to JSON")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Yaml => serde_yaml::to_string(pairs).context("Failed to serialize to YAML"),
        OutputFormat::Table => {
            let width = pairs.0.iter().map(|(k, _)| k.len()).max().unwrap_or(3).max(3);
            let mut out = format!("{:<width$}  {}\n", "KEY", "VALUE", width = width);
            out.push_str(&format!("{}\n", "-".repeat(width + 7)));
            for (key, value) in &pairs.0 {
                out.push_str(&format!("{:<width$}  {}\n", key, value, width = width));
            }
            Ok(out)
        }
    }
}

/// Print pairs to stdout in the named format
pub fn print_pairs(pairs: &OrderedPairs, format: &str) -> Result<()> {
    let format = OutputFormat::from_str(format)?;
    print!("{}", render_pairs(pairs, format)?);
    Ok(())
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    print!("{}", yaml);
    Ok(())
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    println!("{}", header.trim_end());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    println!("{}", "-".repeat(total_width.saturating_sub(1)));
}

/// Diagnostic line on stderr
pub fn report_warning(message: impl std::fmt::Display) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

/// Error line on stderr
pub fn report_error(message: impl std::fmt::Display) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

/// Success line on stdout
pub fn report_success(message: impl std::fmt::Display) {
    println!("{}", message.to_string().green());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> OrderedPairs {
        OrderedPairs(vec![
            ("ZED".to_string(), "last letter".to_string()),
            ("ALPHA".to_string(), "1".to_string()),
        ])
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("env").unwrap(), OutputFormat::Env);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("yaml").unwrap(), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_str("table").unwrap(), OutputFormat::Table);
        assert!(OutputFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_env_format_quotes_when_needed() {
        let out = render_pairs(&pairs(), OutputFormat::Env).unwrap();
        assert_eq!(out, "ZED=\"last letter\"\nALPHA=1\n");
    }

    #[test]
    fn test_json_keeps_order() {
        let out = render_pairs(&pairs(), OutputFormat::Json).unwrap();
        let zed = out.find("ZED").unwrap();
        let alpha = out.find("ALPHA").unwrap();
        assert!(zed < alpha);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["ALPHA"], "1");
    }

    #[test]
    fn test_yaml_output() {
        let out = render_pairs(&pairs(), OutputFormat::Yaml).unwrap();
        assert!(out.starts_with("ZED: last letter\n"));
    }

    #[test]
    fn test_table_output() {
        let out = render_pairs(&pairs(), OutputFormat::Table).unwrap();
        assert!(out.starts_with("KEY    VALUE\n"));
        assert!(out.contains("ALPHA  1\n"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hello", 3), "...");
    }
}
