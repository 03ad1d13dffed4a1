//! Project commands: resolve, get, list, status, validate, diff, set.

use anyhow::{Context, Result};
use serde::Serialize;

use super::context::ProjectContext;
use super::output::{
    print_json, print_pairs, print_table_header, print_yaml, report_error, report_success,
    truncate, OrderedPairs, MASK,
};
use crate::env::{Entry, Env};
use crate::reference::{RefUri, REF_PREFIX};

/// Resolve every reference and print the merged environment.
pub async fn resolve(ctx: &ProjectContext, output: &str, strict: bool) -> Result<()> {
    let env = ctx.load_env()?;
    let mut registry = ctx.registry().await?;
    let result = ctx.resolve(&env, &registry).await;
    registry.close()?;

    let entries = if strict || ctx.config.strict {
        result.into_strict()?
    } else {
        result.entries
    };

    print_pairs(&OrderedPairs::from_entries(&entries), output)
}

/// Print the resolved value of a single key.
pub async fn get(ctx: &ProjectContext, key: &str) -> Result<()> {
    let env = ctx.load_env()?;
    let entry = env
        .get(key)
        .with_context(|| format!("Key '{}' is not defined in the merged environment", key))?;

    if !entry.is_ref {
        println!("{}", entry.value);
        return Ok(());
    }

    let mut single = Env::new();
    single.set(&entry.key, &entry.value);

    let mut registry = ctx.registry().await?;
    let result = ctx.resolve(&single, &registry).await;
    registry.close()?;

    let entries = result.into_strict()?;
    if let Some(entry) = entries.first() {
        println!("{}", entry.value);
    }
    Ok(())
}

/// One row of `envref list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRow {
    pub key: String,
    pub value: String,
    pub kind: &'static str,
}

fn displayed_value(entry: &Entry, show_secrets: bool) -> String {
    if !show_secrets && (entry.is_ref || entry.value.contains(REF_PREFIX)) {
        MASK.to_string()
    } else {
        entry.value.clone()
    }
}

/// Rows for the unresolved merged environment. Without `show_secrets`, any
/// value that is or contains a reference is masked.
pub fn list_rows(env: &Env, show_secrets: bool) -> Vec<ListRow> {
    env.all()
        .iter()
        .map(|entry| ListRow {
            key: entry.key.clone(),
            value: displayed_value(entry, show_secrets),
            kind: if entry.is_ref { "ref" } else { "plain" },
        })
        .collect()
}

/// List keys of the merged environment without resolving references.
pub fn list(ctx: &ProjectContext, output: &str, show_secrets: bool) -> Result<()> {
    let env = ctx.load_env()?;
    let rows = list_rows(&env, show_secrets);

    match output {
        "table" => print_rows_table(&rows),
        "json" => print_json(&rows)?,
        "yaml" => print_yaml(&rows)?,
        other => {
            let pairs = OrderedPairs(rows.into_iter().map(|r| (r.key, r.value)).collect());
            print_pairs(&pairs, other)?
        }
    }
    Ok(())
}

fn print_rows_table(rows: &[ListRow]) {
    if rows.is_empty() {
        println!("No variables defined");
        return;
    }

    print_table_header(&[("Key", 30), ("Value", 40), ("Kind", 6)]);
    for row in rows {
        println!("{:<30} {:<40} {:<6}", truncate(&row.key, 30), truncate(&row.value, 40), row.kind);
    }
}

/// Summary printed by `envref status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub project: String,
    pub config: String,
    pub profile: Option<String>,
    pub layers: Vec<LayerStatus>,
    pub backends: Vec<BackendStatus>,
    pub entries: usize,
    pub references: usize,
    pub warnings: usize,
}

#[derive(Debug, Serialize)]
pub struct LayerStatus {
    pub kind: &'static str,
    pub path: String,
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub fn status_report(ctx: &ProjectContext, env: &Env) -> StatusReport {
    let paths = ctx.layer_paths();
    let mut layers = vec![LayerStatus {
        kind: "base",
        path: paths.base.display().to_string(),
        present: paths.base.is_file(),
    }];
    for (kind, path) in [("profile", &paths.profile), ("local", &paths.local)] {
        if let Some(path) = path {
            layers.push(LayerStatus {
                kind,
                path: path.display().to_string(),
                present: path.is_file(),
            });
        }
    }

    StatusReport {
        project: ctx.project().to_string(),
        config: ctx.config_path.display().to_string(),
        profile: ctx.profile.clone(),
        layers,
        backends: ctx
            .config
            .backends
            .iter()
            .map(|b| BackendStatus { name: b.name.clone(), kind: b.kind.clone() })
            .collect(),
        entries: env.len(),
        references: env.refs().len(),
        warnings: env.warnings().len(),
    }
}

/// Show project, layers and backends.
pub fn status(ctx: &ProjectContext, output: &str) -> Result<()> {
    let env = ctx.load_env()?;
    let report = status_report(ctx, &env);

    match output {
        "json" => print_json(&report)?,
        "yaml" => print_yaml(&report)?,
        _ => {
            println!("Project:  {}", report.project);
            println!("Config:   {}", report.config);
            println!("Profile:  {}", report.profile.as_deref().unwrap_or("(none)"));
            println!();
            println!("Layers:");
            for layer in &report.layers {
                let marker = if layer.present { "✓" } else { "-" };
                println!("  {} {:<8} {}", marker, layer.kind, layer.path);
            }
            println!();
            println!("Backends:");
            if report.backends.is_empty() {
                println!("  (none)");
            }
            for backend in &report.backends {
                println!("  {:<16} {}", backend.name, backend.kind);
            }
            println!();
            println!(
                "{} variables, {} references, {} warnings",
                report.entries, report.references, report.warnings
            );
        }
    }
    Ok(())
}

/// Problems `validate` can find without contacting any backend.
pub fn static_problems(ctx: &ProjectContext, env: &Env) -> Vec<String> {
    let mut problems = Vec::new();
    for entry in env.refs() {
        match RefUri::parse(&entry.value) {
            Ok(uri) => {
                if !ctx.config.backends.iter().any(|b| b.name == uri.backend) {
                    problems.push(format!(
                        "{}: backend '{}' is not configured",
                        entry.key, uri.backend
                    ));
                }
            }
            Err(e) => problems.push(format!("{}: {}", entry.key, e)),
        }
    }
    problems
}

/// Check configuration, env files and references. With `check_backends`,
/// every reference is also resolved.
pub async fn validate(ctx: &ProjectContext, check_backends: bool) -> Result<()> {
    let env = ctx.load_env()?;

    let problems = static_problems(ctx, &env);
    if !problems.is_empty() {
        for problem in &problems {
            report_error(problem);
        }
        anyhow::bail!("Validation failed: {} problem(s)", problems.len());
    }

    if check_backends {
        let mut registry = ctx.registry().await?;
        let result = ctx.resolve(&env, &registry).await;
        registry.close()?;
        if !result.resolved() {
            anyhow::bail!(
                "Validation failed: {} reference(s) could not be resolved",
                result.errors.len()
            );
        }
    }

    report_success(format!(
        "✓ {} variables, {} references OK",
        env.len(),
        env.refs().len()
    ));
    Ok(())
}

/// How a key differs between two environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub key: String,
    pub change: Change,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// Keys that differ from `left` to `right`: left's order first, then keys
/// only in `right`.
pub fn diff_envs(left: &Env, right: &Env, show_secrets: bool) -> Vec<DiffEntry> {
    let mut diff = Vec::new();

    for entry in left.all() {
        match right.get(&entry.key) {
            None => diff.push(DiffEntry {
                key: entry.key.clone(),
                change: Change::Removed,
                left: Some(displayed_value(entry, show_secrets)),
                right: None,
            }),
            Some(other) if other.value != entry.value => diff.push(DiffEntry {
                key: entry.key.clone(),
                change: Change::Changed,
                left: Some(displayed_value(entry, show_secrets)),
                right: Some(displayed_value(other, show_secrets)),
            }),
            Some(_) => {}
        }
    }

    for entry in right.all().iter().filter(|e| !left.contains_key(&e.key)) {
        diff.push(DiffEntry {
            key: entry.key.clone(),
            change: Change::Added,
            left: None,
            right: Some(displayed_value(entry, show_secrets)),
        });
    }
    diff
}

/// Compare the merged environment of two profiles. `None` means no profile.
pub fn diff(
    ctx: &ProjectContext,
    left: Option<&str>,
    right: Option<&str>,
    output: &str,
    show_secrets: bool,
) -> Result<()> {
    let left_env = ctx.with_profile(left).load_env()?;
    let right_env = ctx.with_profile(right).load_env()?;
    let diff = diff_envs(&left_env, &right_env, show_secrets);

    match output {
        "json" => print_json(&diff)?,
        "yaml" => print_yaml(&diff)?,
        _ => {
            if diff.is_empty() {
                println!("No differences");
            }
            for entry in &diff {
                match entry.change {
                    Change::Added => {
                        println!("+ {}={}", entry.key, entry.right.as_deref().unwrap_or_default())
                    }
                    Change::Removed => {
                        println!("- {}={}", entry.key, entry.left.as_deref().unwrap_or_default())
                    }
                    Change::Changed => println!(
                        "~ {}: {} -> {}",
                        entry.key,
                        entry.left.as_deref().unwrap_or_default(),
                        entry.right.as_deref().unwrap_or_default()
                    ),
                }
            }
        }
    }
    Ok(())
}

fn validate_env_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('=') || key.chars().any(char::is_whitespace) {
        anyhow::bail!("Invalid variable name '{}'", key);
    }
    Ok(())
}

/// Set `key` in the base file, or the local override file with `local`.
pub fn set(ctx: &ProjectContext, key: &str, value: &str, local: bool) -> Result<()> {
    validate_env_key(key)?;

    let path = if local {
        ctx.root.join(&ctx.config.local_file)
    } else {
        ctx.root.join(&ctx.config.env_file)
    };
    let mut env = if local { Env::load_optional(&path)? } else { Env::load(&path)? };

    env.set(key, value);
    env.write(&path)?;

    report_success(format!("Set {} in {}", key, path.display()));
    Ok(())
}
