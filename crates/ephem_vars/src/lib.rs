//! # ephem_vars
//!
//! Loading and validation of the variables file that describes one
//! disposable environment.
//!
//! Loading is a fixed sequence:
//!
//! 1. read the file (`.json`, `.yaml`/`.yml` or `.toml`),
//! 2. apply `EPHEM_*` environment overrides,
//! 3. validate against the built-in JSON schema,
//! 4. deserialize into [`VariablesFile`],
//! 5. run the semantic checks of [`VarsValidator`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use ephem_vars::{load, EnvOverrides};
//!
//! let loaded = load("envs/feature-42.yaml", &EnvOverrides::from_env()).unwrap();
//! for warning in &loaded.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//! println!("environment {}", loaded.vars.environment);
//! ```

pub mod env;
pub mod error;
pub mod models;
pub mod reader;
pub mod schema;
pub mod template;
pub mod validator;

use std::path::Path;

use tracing::{debug, info};

pub use env::{EnvOverrides, EnvStash, AWS_STATIC_CREDENTIALS};
pub use error::{VarsError, VarsResult};
pub use models::*;
pub use reader::{VarsFormat, VarsReader};
pub use schema::{SchemaValidator, SchemaViolation};
pub use template::VarRenderer;
pub use validator::{ValidationResult, VarsValidator};

/// A variables file that passed every check.
#[derive(Debug, Clone)]
pub struct LoadedVars {
    pub vars: VariablesFile,
    pub warnings: Vec<String>,
}

/// Read, override, and validate a variables file.
pub fn load(path: impl AsRef<Path>, overrides: &EnvOverrides) -> VarsResult<LoadedVars> {
    let path = path.as_ref();
    info!("Loading variables file {:?}", path);

    let mut doc = VarsReader::read_value(path)?;
    if !overrides.is_empty() {
        debug!("Applying environment overrides");
        overrides.apply(&mut doc)?;
    }

    SchemaValidator::variables_file()?.validate(&doc)?;

    let vars: VariablesFile = serde_json::from_value(doc)?;
    let result = VarsValidator::validate(&vars);
    if !result.valid {
        return Err(VarsError::ValidationFailed(result.errors));
    }

    Ok(LoadedVars {
        vars,
        warnings: result.warnings,
    })
}
