//! JSON-schema validation.

use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::debug;

use crate::error::{VarsError, VarsResult};

/// Schema for the variables file itself.
const VARIABLES_SCHEMA: &str = include_str!("../schemas/variables.schema.json");

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value ("" for the root)
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A compiled JSON schema.
pub struct SchemaValidator {
    name: String,
    compiled: JSONSchema,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").field("name", &self.name).finish()
    }
}

impl SchemaValidator {
    /// The built-in schema for variables files.
    pub fn variables_file() -> VarsResult<Self> {
        let schema: Value = serde_json::from_str(VARIABLES_SCHEMA)?;
        Self::from_value("variables file", &schema)
    }

    /// Compile a schema from a JSON document.
    pub fn from_value(name: impl Into<String>, schema: &Value) -> VarsResult<Self> {
        let name = name.into();
        let compiled = JSONSchema::compile(schema).map_err(|e| VarsError::InvalidSchema {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { name, compiled })
    }

    /// Load and compile a schema file.
    pub fn from_file(path: impl AsRef<Path>) -> VarsResult<Self> {
        let path = path.as_ref();
        debug!("Loading schema from {:?}", path);
        let content = fs::read_to_string(path)?;
        let schema: Value = serde_json::from_str(&content).map_err(|e| VarsError::InvalidSchema {
            name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(path.display().to_string(), &schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collect every violation of the schema.
    pub fn violations(&self, instance: &Value) -> Vec<SchemaViolation> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| SchemaViolation {
                    path: e.instance_path.to_string(),
                    message: e.to_string(),
                })
                .collect(),
        }
    }

    /// Validate, turning violations into an error.
    pub fn validate(&self, instance: &Value) -> VarsResult<()> {
        let violations = self.violations(instance);
        if violations.is_empty() {
            debug!("Document conforms to schema {}", self.name);
            return Ok(());
        }
        Err(VarsError::SchemaViolation {
            schema: self.name.clone(),
            violations: violations.iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "environment": "feature-42",
            "project": "shop",
            "aws": { "region": "eu-west-1" },
            "repository": { "url": "https://example.com/infra.git" }
        })
    }

    #[test]
    fn test_minimal_document_is_valid() {
        let validator = SchemaValidator::variables_file().unwrap();
        assert!(validator.violations(&minimal()).is_empty());
    }

    #[test]
    fn test_missing_required_key() {
        let validator = SchemaValidator::variables_file().unwrap();
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("repository");

        let violations = validator.violations(&doc);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("repository"));
    }

    #[test]
    fn test_bad_names_and_unknown_keys() {
        let validator = SchemaValidator::variables_file().unwrap();
        let mut doc = minimal();
        doc["environment"] = json!("Feature_42");
        doc["aws"]["region"] = json!("europe");
        doc["surprise"] = json!(true);

        let violations = validator.violations(&doc);
        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"/environment"));
        assert!(paths.contains(&"/aws/region"));
        assert!(paths.contains(&""));

        let err = validator.validate(&doc).unwrap_err();
        assert!(err.to_string().contains("Schema validation failed"));
    }

    #[test]
    fn test_custom_schema() {
        let schema = json!({
            "type": "object",
            "required": ["instance_type"],
            "properties": { "instance_type": { "enum": ["t3.micro", "t3.small"] } }
        });
        let validator = SchemaValidator::from_value("module", &schema).unwrap();

        assert!(validator.validate(&json!({ "instance_type": "t3.micro" })).is_ok());
        assert_eq!(validator.violations(&json!({ "instance_type": "m5.large" })).len(), 1);
    }

    #[test]
    fn test_invalid_schema_is_reported() {
        let schema = json!({ "type": "not-a-type" });
        let err = SchemaValidator::from_value("broken", &schema).unwrap_err();
        assert!(matches!(err, VarsError::InvalidSchema { .. }));
    }
}
