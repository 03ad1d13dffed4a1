//! End-to-end tests for the resolution engine
//!
//! Drives layer loading, merging, interpolation, resolution and rotation
//! through the public API with real files and the in-memory backend.

use envref::cli::commands::list_rows;
use envref::cli::output::MASK;
use envref::config::ProjectConfig;
use envref::env::{interpolate, load_layers, Env, LayerPaths};
use envref::secrets::{
    history, rotate, HistoryEntry, MemorySecretBackend, NamespacedBackend, SecretBackend,
    SecretBackendRegistry,
};
use envref::{resolve, resolve_with_profile, ResolveError};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_test::traced_test;

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn staging_layers(dir: &Path) -> LayerPaths {
    LayerPaths::for_project(&ProjectConfig::new("myapp"), dir, Some("staging"))
}

fn registry_with(secrets: &[(&str, &str)]) -> SecretBackendRegistry {
    let mut registry = SecretBackendRegistry::new();
    let store = MemorySecretBackend::with_secrets(secrets.iter().copied());
    registry.register("store", Arc::new(store)).unwrap();
    registry
}

#[test]
fn test_merge_precedence_across_layers() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".env", "A=base\nB=base\nC=base\n");
    write(dir.path(), ".env.staging", "B=staging\nD=staging\n");
    write(dir.path(), ".env.local", "C=local\nB=local\n");

    let env = load_layers(&staging_layers(dir.path())).unwrap();

    assert_eq!(env.keys(), vec!["A", "B", "C", "D"]);
    assert_eq!(env.value("A"), Some("base"));
    assert_eq!(env.value("B"), Some("local"));
    assert_eq!(env.value("C"), Some("local"));
    assert_eq!(env.value("D"), Some("staging"));
}

#[test]
fn test_literal_values_survive_interpolation() {
    let mut env = Env::from_bytes(
        b"NOT_EXPANDED=real\nSINGLE='${NOT_EXPANDED}'\nESCAPED=\"\\${NOT_EXPANDED}\"\nPLAIN=${NOT_EXPANDED}\n",
    )
    .unwrap();
    interpolate(&mut env);

    assert_eq!(env.value("SINGLE"), Some("${NOT_EXPANDED}"));
    assert_eq!(env.value("ESCAPED"), Some("${NOT_EXPANDED}"));
    assert_eq!(env.value("PLAIN"), Some("real"));
}

#[test]
fn test_set_preserves_order() {
    let mut env = Env::from_bytes(b"FIRST=1\nSECOND=2\nTHIRD=3\n").unwrap();
    env.set("SECOND", "two");
    env.set("FOURTH", "4");

    assert_eq!(env.keys(), vec!["FIRST", "SECOND", "THIRD", "FOURTH"]);
    assert_eq!(env.value("SECOND"), Some("two"));
}

#[test]
fn test_write_then_parse_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".env");
    let original = "PLAIN=value\nQUOTED=\"hello world\"\nSINGLE='${NOT_EXPANDED}'\nSECRET=ref://vault/db/password\n";
    std::fs::write(&path, original).unwrap();

    let mut env = Env::load(&path).unwrap();
    env.set("GREETING", "hi there");
    env.write(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with(original));
    assert!(written.ends_with("GREETING=\"hi there\"\n"));

    let reloaded = Env::load(&path).unwrap();
    for entry in env.all() {
        assert_eq!(reloaded.value(&entry.key), Some(entry.value.as_str()));
    }
    assert!(reloaded.get("SECRET").unwrap().is_ref);
}

#[test]
fn test_interpolation_sees_profile_overrides() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".env", "DB_HOST=prod-db\nDB_URL=postgres://${DB_HOST}:5432/app\n");
    write(dir.path(), ".env.staging", "DB_HOST=staging-db\n");

    let mut env = load_layers(&staging_layers(dir.path())).unwrap();
    let cycles = interpolate(&mut env);

    assert!(cycles.is_empty());
    assert_eq!(env.value("DB_URL"), Some("postgres://staging-db:5432/app"));
}

#[tokio::test]
async fn test_strict_suppresses_partial_output() {
    let env = Env::from_bytes(b"HOST=localhost\nTOKEN=ref://store/token\nMISSING=ref://store/missing\n")
        .unwrap();
    let registry = registry_with(&[("myapp/token", "t0k3n")]);

    // Non-strict: full partial result, failed key keeps its reference
    let result = resolve(&env, &registry, "myapp").await;
    assert_eq!(result.entries.len(), 3);
    assert_eq!(result.value("TOKEN"), Some("t0k3n"));
    assert_eq!(result.value("MISSING"), Some("ref://store/missing"));
    assert_eq!(result.failed_keys(), vec!["MISSING"]);
    assert!(matches!(result.errors[0].error, ResolveError::NotFound { .. }));

    // Strict: nothing but the summary error
    let err = resolve(&env, &registry, "myapp").await.into_strict().unwrap_err();
    assert!(err.is_strict());
    assert_eq!(
        err.to_string(),
        "strict mode: 1 reference(s) failed to resolve: MISSING"
    );
}

#[tokio::test]
async fn test_profile_then_project_fallback() {
    let env = Env::from_bytes(b"API_KEY=ref://store/api_key\nDB_PASS=ref://store/db_pass\n").unwrap();
    let registry = registry_with(&[
        ("myapp/staging/api_key", "staging-key"),
        ("myapp/api_key", "project-key"),
        ("myapp/db_pass", "project-pass"),
        ("otherapp/db_pass", "wrong-project"),
    ]);

    let result = resolve_with_profile(&env, &registry, "myapp", Some("staging")).await;
    assert!(result.resolved());
    assert_eq!(result.value("API_KEY"), Some("staging-key"));
    assert_eq!(result.value("DB_PASS"), Some("project-pass"));

    let without_profile = resolve(&env, &registry, "myapp").await;
    assert_eq!(without_profile.value("API_KEY"), Some("project-key"));
}

#[tokio::test]
async fn test_rotation_history_ordering() {
    let store: Arc<dyn SecretBackend> = Arc::new(MemorySecretBackend::new());
    let scoped = NamespacedBackend::new(store.clone(), "myapp");

    scoped.set("API_KEY", "v0").await.unwrap();
    rotate(&scoped, "API_KEY", "v1", 2).await.unwrap();
    rotate(&scoped, "API_KEY", "v2", 2).await.unwrap();
    rotate(&scoped, "API_KEY", "v3", 2).await.unwrap();

    assert_eq!(scoped.get("API_KEY").await.unwrap(), "v3");
    assert_eq!(
        history(&scoped, "API_KEY").await.unwrap(),
        vec![
            HistoryEntry { slot: 1, value: "v2".to_string() },
            HistoryEntry { slot: 2, value: "v1".to_string() },
        ]
    );

    // History lives inside the project namespace and nothing beyond keep survives
    let mut raw = store.list().await.unwrap();
    raw.sort();
    assert_eq!(
        raw,
        vec!["myapp/API_KEY", "myapp/API_KEY.__history.1", "myapp/API_KEY.__history.2"]
    );
}

#[test]
fn test_listing_masks_reference_text() {
    let mut env = Env::from_bytes(
        b"HOST=db.internal\nDB_PASS=ref://vault/prod/db/password\nDSN=postgres://app:${DB_PASS}@db\n",
    )
    .unwrap();
    interpolate(&mut env);

    let rows = list_rows(&env, false);
    let rendered: String = rows.iter().map(|r| format!("{}={}\n", r.key, r.value)).collect();

    assert!(!rendered.contains("ref://"));
    assert!(!rendered.contains("prod/db/password"));
    assert_eq!(rows[1].value, MASK);
    assert_eq!(rows[2].value, MASK);
    assert_eq!(rows[0].value, "db.internal");
}

#[test]
#[traced_test]
fn test_missing_profile_file_is_logged() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".env", "A=1\n");

    let env = load_layers(&staging_layers(dir.path())).unwrap();

    assert_eq!(env.value("A"), Some("1"));
    assert_eq!(env.warnings().len(), 1);
    assert!(logs_contain("Profile env file not found"));
}

#[tokio::test]
#[traced_test]
async fn test_resolution_never_logs_secret_values() {
    let env = Env::from_bytes(b"TOKEN=ref://store/token\n").unwrap();
    let registry = registry_with(&[("myapp/token", "super-secret-value")]);

    let result = resolve(&env, &registry, "myapp").await;
    assert_eq!(result.value("TOKEN"), Some("super-secret-value"));
    assert!(logs_contain("Resolution complete"));
    assert!(!logs_contain("super-secret-value"));
}
