//! Semantic validation of a variables file.
//!
//! Covers the rules a JSON schema cannot express comfortably: S3 bucket
//! naming, safe repository paths and AWS tag limits.

use std::path::Component;

use regex::Regex;

use crate::models::VariablesFile;

/// Maximum number of user tags; AWS allows 50 per resource and ephem adds
/// its own standard tags on top.
pub const MAX_USER_TAGS: usize = 47;

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validator for loaded variables files.
pub struct VarsValidator;

impl VarsValidator {
    /// Run every semantic check.
    pub fn validate(vars: &VariablesFile) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(bucket) = &vars.state.bucket {
            result.merge(Self::validate_bucket_name(bucket));
        }
        result.merge(Self::validate_repository(vars));
        result.merge(Self::validate_artifacts(vars));
        result.merge(Self::validate_tags(vars));

        if vars.variables.is_empty() {
            result.add_warning("No Terraform variables defined; only computed values will be passed");
        }

        result
    }

    /// S3 bucket naming rules.
    pub fn validate_bucket_name(name: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        let pattern = Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex");

        if !pattern.is_match(name) {
            result.add_error(format!(
                "State bucket '{}' must be 3-63 characters of lowercase letters, digits, '.' or '-'",
                name
            ));
        }
        if name.contains("..") {
            result.add_error(format!("State bucket '{}' must not contain '..'", name));
        }
        if name.starts_with("xn--") {
            result.add_error(format!("State bucket '{}' must not start with 'xn--'", name));
        }

        result
    }

    fn validate_repository(vars: &VariablesFile) -> ValidationResult {
        let mut result = ValidationResult::new();
        let path = &vars.repository.path;

        if path.is_absolute() {
            result.add_error(format!(
                "repository.path '{}' must be relative to the repository root",
                path.display()
            ));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            result.add_error(format!(
                "repository.path '{}' must not leave the repository",
                path.display()
            ));
        }
        if vars.repository.url.trim().is_empty() {
            result.add_error("repository.url cannot be empty");
        }

        result
    }

    fn validate_artifacts(vars: &VariablesFile) -> ValidationResult {
        let mut result = ValidationResult::new();

        for (index, artifact) in vars.artifacts.iter().enumerate() {
            if artifact.source.trim().is_empty() {
                result.add_error(format!("artifacts[{}].source cannot be empty", index));
            }
            if let Some(prefix) = &artifact.prefix {
                if prefix.starts_with('/') || prefix.split('/').any(|p| p == "..") {
                    result.add_error(format!(
                        "artifacts[{}].prefix '{}' must be a relative key prefix",
                        index, prefix
                    ));
                }
            }
        }

        result
    }

    fn validate_tags(vars: &VariablesFile) -> ValidationResult {
        let mut result = ValidationResult::new();

        if vars.tags.len() > MAX_USER_TAGS {
            result.add_error(format!(
                "At most {} tags are allowed, found {}",
                MAX_USER_TAGS,
                vars.tags.len()
            ));
        }

        for key in vars.tags.keys() {
            if key.to_lowercase().starts_with("aws:") {
                result.add_error(format!("Tag key '{}' uses the reserved 'aws:' prefix", key));
            }
            if key.is_empty() || key.len() > 128 {
                result.add_error(format!("Tag key '{}' must be 1-128 characters", key));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactSpec;
    use serde_json::json;
    use std::path::PathBuf;

    fn vars() -> VariablesFile {
        serde_json::from_value(json!({
            "environment": "dev",
            "project": "shop",
            "aws": { "region": "eu-west-1" },
            "repository": { "url": "https://example.com/infra.git" },
            "variables": { "size": "small" }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_file() {
        let result = VarsValidator::validate(&vars());
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_variables_warns() {
        let mut v = vars();
        v.variables.clear();
        let result = VarsValidator::validate(&v);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_bucket_names() {
        assert!(VarsValidator::validate_bucket_name("ephem-state-123456789012-eu-west-1").valid);
        assert!(!VarsValidator::validate_bucket_name("ab").valid);
        assert!(!VarsValidator::validate_bucket_name("Upper-Case").valid);
        assert!(!VarsValidator::validate_bucket_name("a..b").valid);
        assert!(!VarsValidator::validate_bucket_name("xn--bucket").valid);
    }

    #[test]
    fn test_repository_path_must_stay_inside() {
        let mut v = vars();
        v.repository.path = PathBuf::from("../outside");
        assert!(!VarsValidator::validate(&v).valid);

        v.repository.path = PathBuf::from("/abs");
        assert!(!VarsValidator::validate(&v).valid);

        v.repository.path = PathBuf::from("envs/disposable");
        assert!(VarsValidator::validate(&v).valid);
    }

    #[test]
    fn test_artifacts_and_tags() {
        let mut v = vars();
        v.artifacts.push(ArtifactSpec {
            source: " ".to_string(),
            prefix: Some("../up".to_string()),
        });
        v.tags.insert("aws:owner".to_string(), "me".to_string());

        let result = VarsValidator::validate(&v);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_tag_limit_leaves_room_for_standard_tags() {
        let mut v = vars();
        for i in 0..MAX_USER_TAGS {
            v.tags.insert(format!("team-{}", i), "x".to_string());
        }
        assert!(VarsValidator::validate(&v).valid);

        v.tags.insert("one-more".to_string(), "x".to_string());
        let result = VarsValidator::validate(&v);
        assert!(!result.valid);
        assert!(result.errors[0].contains("At most 47 tags"));
    }
}
