//! Placeholder rendering for variable values.

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{VarsError, VarsResult};

/// Renderer for `{{ name }}` placeholders.
pub struct VarRenderer {
    variable_pattern: Regex,
    context: BTreeMap<String, String>,
}

impl VarRenderer {
    /// Create a renderer over the given placeholder values.
    pub fn new(context: BTreeMap<String, String>) -> Self {
        Self {
            // Match {{ variable_name }} with optional inner whitespace
            variable_pattern: Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap(),
            context,
        }
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Render a single string. `location` names the value in error messages.
    pub fn render_str(&self, input: &str, location: &str) -> VarsResult<String> {
        if let Some(unknown) = self
            .variable_pattern
            .captures_iter(input)
            .map(|c| c[1].to_string())
            .find(|name| !self.context.contains_key(name))
        {
            return Err(VarsError::UnknownPlaceholder {
                placeholder: unknown,
                location: location.to_string(),
            });
        }

        Ok(self
            .variable_pattern
            .replace_all(input, |caps: &Captures| {
                self.context.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }

    /// Render every string inside a JSON value, recursing into arrays and
    /// objects. Keys are left untouched.
    pub fn render_value(&self, value: &Value, location: &str) -> VarsResult<Value> {
        match value {
            Value::String(s) => Ok(Value::String(self.render_str(s, location)?)),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.render_value(item, &format!("{}[{}]", location, i)))
                .collect::<VarsResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    rendered.insert(
                        key.clone(),
                        self.render_value(item, &format!("{}.{}", location, key))?,
                    );
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// Render the values of a string map.
    pub fn render_map(
        &self,
        map: &BTreeMap<String, String>,
        location: &str,
    ) -> VarsResult<BTreeMap<String, String>> {
        map.iter()
            .map(|(k, v)| Ok((k.clone(), self.render_str(v, &format!("{}.{}", location, k))?)))
            .collect()
    }
}
