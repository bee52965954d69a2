//! Integration tests for variables file loading.

use std::fs;
use std::path::PathBuf;

use ephem_vars::{load, EnvOverrides, VarsError};
use tempfile::tempdir;

const YAML: &str = r#"
environment: feature-42
project: shop
aws:
  region: eu-west-1
  profile: sandbox
repository:
  url: https://example.com/org/infra.git
  ref: release-1
  path: envs/disposable
state:
  lock_table: shop-locks
artifacts:
  - source: build/*.zip
    prefix: lambdas
tags:
  team: payments
variables:
  instance_type: t3.micro
  name_prefix: "{{ project }}-{{ environment }}"
"#;

fn overrides(items: &[(&str, &str)]) -> EnvOverrides {
    EnvOverrides::from_vars(
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>(),
    )
}

/// Test a complete YAML file end to end.
#[test]
fn test_load_yaml_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vars.yaml");
    fs::write(&path, YAML).unwrap();

    let loaded = load(&path, &EnvOverrides::default()).unwrap();
    let vars = loaded.vars;

    assert_eq!(vars.environment, "feature-42");
    assert_eq!(vars.aws.profile.as_deref(), Some("sandbox"));
    assert_eq!(vars.repository.git_ref, "release-1");
    assert_eq!(vars.repository.path, PathBuf::from("envs/disposable"));
    assert_eq!(vars.state.lock_table, "shop-locks");
    assert_eq!(vars.state.key_prefix, "environments");
    assert_eq!(vars.artifacts.len(), 1);
    assert_eq!(vars.tags.get("team").map(String::as_str), Some("payments"));
    assert_eq!(vars.variables["name_prefix"], "{{ project }}-{{ environment }}");
    assert!(loaded.warnings.is_empty());
}

/// Test that the same content loads identically from JSON and TOML.
#[test]
fn test_load_json_and_toml() {
    let dir = tempdir().unwrap();

    let json_path = dir.path().join("vars.json");
    fs::write(
        &json_path,
        r#"{
            "environment": "dev",
            "project": "shop",
            "aws": { "region": "us-east-1" },
            "repository": { "url": "git@example.com:infra.git" }
        }"#,
    )
    .unwrap();

    let toml_path = dir.path().join("vars.toml");
    fs::write(
        &toml_path,
        r#"
environment = "dev"
project = "shop"

[aws]
region = "us-east-1"

[repository]
url = "git@example.com:infra.git"
"#,
    )
    .unwrap();

    let a = load(&json_path, &EnvOverrides::default()).unwrap();
    let b = load(&toml_path, &EnvOverrides::default()).unwrap();
    assert_eq!(a.vars, b.vars);
    // No variables section
    assert_eq!(a.warnings.len(), 1);
}

/// Test that environment overrides win over file values.
#[test]
fn test_overrides_take_precedence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vars.yml");
    fs::write(&path, YAML).unwrap();

    let loaded = load(
        &path,
        &overrides(&[
            ("EPHEM_ENVIRONMENT", "feature-43"),
            ("EPHEM_REGION", "us-west-2"),
            ("EPHEM_REPO_REF", "main"),
            ("EPHEM_VAR_INSTANCE_TYPE", "t3.large"),
        ]),
    )
    .unwrap();

    assert_eq!(loaded.vars.environment, "feature-43");
    assert_eq!(loaded.vars.aws.region, "us-west-2");
    assert_eq!(loaded.vars.repository.git_ref, "main");
    assert_eq!(loaded.vars.variables["instance_type"], "t3.large");
}

/// Test that an override is validated like file content.
#[test]
fn test_invalid_override_fails_schema() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vars.yaml");
    fs::write(&path, YAML).unwrap();

    let err = load(&path, &overrides(&[("EPHEM_ENVIRONMENT", "Not Valid")])).unwrap_err();
    match err {
        VarsError::SchemaViolation { violations, .. } => {
            assert!(violations.iter().any(|v| v.starts_with("/environment")));
        }
        other => panic!("unexpected error: {}", other),
    }
}

/// Test semantic validation after schema validation.
#[test]
fn test_semantic_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vars.yaml");
    fs::write(&path, YAML.replace("envs/disposable", "../escape")).unwrap();

    let err = load(&path, &EnvOverrides::default()).unwrap_err();
    assert!(matches!(err, VarsError::ValidationFailed(_)));
    assert!(err.to_string().contains("must not leave the repository"));
}

#[test]
fn test_missing_and_unsupported_files() {
    let dir = tempdir().unwrap();

    let missing = load(dir.path().join("nope.yaml"), &EnvOverrides::default()).unwrap_err();
    assert!(matches!(missing, VarsError::NotFound(_)));

    let tfvars = dir.path().join("vars.tfvars");
    fs::write(&tfvars, "a = 1").unwrap();
    let unsupported = load(&tfvars, &EnvOverrides::default()).unwrap_err();
    assert!(matches!(unsupported, VarsError::UnsupportedFormat(_)));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    let invalid = load(&broken, &EnvOverrides::default()).unwrap_err();
    assert!(matches!(invalid, VarsError::InvalidFormat { .. }));
}
