//! Environment variable overrides and stashing.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{VarsError, VarsResult};

/// Prefix shared by all ephem environment variables.
pub const ENV_PREFIX: &str = "EPHEM_";

/// Prefix of variables forwarded into the `variables` section.
pub const VAR_PREFIX: &str = "EPHEM_VAR_";

/// Static AWS credentials that would shadow a named profile.
pub const AWS_STATIC_CREDENTIALS: &[&str] =
    &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_SESSION_TOKEN"];

/// Overrides collected from `EPHEM_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub environment: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub repo_ref: Option<String>,
    pub workdir: Option<String>,
    pub variables: BTreeMap<String, String>,
}

impl EnvOverrides {
    /// Collect overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Collect overrides from arbitrary key/value pairs.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides = Self::default();

        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(VAR_PREFIX) {
                if !name.is_empty() {
                    overrides.variables.insert(name.to_lowercase(), value);
                }
                continue;
            }
            match key.as_str() {
                "EPHEM_ENVIRONMENT" => overrides.environment = Some(value),
                "EPHEM_REGION" => overrides.region = Some(value),
                "EPHEM_PROFILE" => overrides.profile = Some(value),
                "EPHEM_REPO_REF" => overrides.repo_ref = Some(value),
                "EPHEM_WORKDIR" => overrides.workdir = Some(value),
                _ => {}
            }
        }

        overrides
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the overrides onto a raw variables document.
    pub fn apply(&self, doc: &mut Value) -> VarsResult<()> {
        let root = doc.as_object_mut().ok_or_else(|| VarsError::InvalidOverride {
            key: ENV_PREFIX.to_string(),
            message: "variables document is not a mapping".to_string(),
        })?;

        if let Some(env) = &self.environment {
            debug!("Overriding environment from EPHEM_ENVIRONMENT");
            root.insert("environment".to_string(), Value::String(env.clone()));
        }
        if let Some(workdir) = &self.workdir {
            root.insert("workdir".to_string(), Value::String(workdir.clone()));
        }
        if let Some(region) = &self.region {
            section(root, "aws")?.insert("region".to_string(), Value::String(region.clone()));
        }
        if let Some(profile) = &self.profile {
            section(root, "aws")?.insert("profile".to_string(), Value::String(profile.clone()));
        }
        if let Some(git_ref) = &self.repo_ref {
            section(root, "repository")?.insert("ref".to_string(), Value::String(git_ref.clone()));
        }
        if !self.variables.is_empty() {
            let vars = section(root, "variables")?;
            for (name, value) in &self.variables {
                debug!("Overriding variable '{}' from environment", name);
                vars.insert(name.clone(), Value::String(value.clone()));
            }
        }

        Ok(())
    }
}

/// Get or create a nested mapping under `key`.
fn section<'a>(root: &'a mut Map<String, Value>, key: &str) -> VarsResult<&'a mut Map<String, Value>> {
    root.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| VarsError::InvalidOverride {
            key: key.to_string(),
            message: format!("'{}' must be a mapping", key),
        })
}

/// Temporarily modified process environment.
///
/// Every variable touched through the stash is put back to its previous
/// value (or removed again) when the stash is dropped.
#[derive(Debug, Default)]
pub struct EnvStash {
    saved: Vec<(String, Option<String>)>,
}

impl EnvStash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash the static AWS credentials so a named profile takes effect.
    pub fn for_profile(profile: Option<&str>) -> Self {
        let mut stash = Self::new();
        if let Some(profile) = profile {
            for key in AWS_STATIC_CREDENTIALS {
                stash.remove(key);
            }
            stash.set("AWS_PROFILE", profile);
        }
        stash
    }

    fn remember(&mut self, key: &str) {
        if self.saved.iter().all(|(k, _)| k != key) {
            self.saved.push((key.to_string(), std::env::var(key).ok()));
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.remember(key);
        std::env::set_var(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.remember(key);
        std::env::remove_var(key);
    }

    /// Names of the variables currently stashed.
    pub fn keys(&self) -> Vec<&str> {
        self.saved.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn restore(self) {
        drop(self);
    }
}

impl Drop for EnvStash {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(&key, v),
                None => std::env::remove_var(&key),
            }
        }
    }
}
