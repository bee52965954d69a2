//! Resolution of local artifacts to stage next to the remote state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use ephem_vars::ArtifactSpec;

use crate::error::{CoreError, CoreResult};

/// A local file and the object key it is staged under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Name exposed to Terraform in `artifact_uris`
    pub name: String,
    pub path: PathBuf,
    pub key: String,
}

/// Expand artifact entries into concrete files.
///
/// A `source` is either a directory (every file below it, keeping relative
/// paths), a single file, or a glob pattern. Relative sources resolve
/// against `base_dir`, the directory of the variables file.
pub fn resolve(
    specs: &[ArtifactSpec],
    base_dir: &Path,
    key_prefix: &str,
) -> CoreResult<Vec<StagedFile>> {
    let mut files: BTreeMap<String, StagedFile> = BTreeMap::new();

    for spec in specs {
        let source = base_dir.join(&spec.source);
        let prefix = match spec.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("{}{}/", key_prefix, p),
            _ => key_prefix.to_string(),
        };

        let matched = if source.is_dir() {
            walk_dir(&source)
        } else if source.is_file() {
            vec![(file_name(&source), source.clone())]
        } else {
            expand_glob(&spec.source, &source)?
        };

        if matched.is_empty() {
            return Err(CoreError::ArtifactNotFound(spec.source.clone()));
        }

        for (relative, path) in matched {
            let name = match spec.prefix.as_deref().map(|p| p.trim_matches('/')) {
                Some(p) if !p.is_empty() => format!("{}/{}", p, relative),
                _ => relative.clone(),
            };
            let key = format!("{}{}", prefix, relative);
            if let Some(existing) = files.get(&name) {
                if existing.path == path {
                    continue;
                }
                return Err(CoreError::ArtifactConflict {
                    name,
                    first: existing.path.clone(),
                    second: path,
                });
            }
            debug!("Artifact {:?} -> {}", path, key);
            files.insert(name.clone(), StagedFile { name, path, key });
        }
    }

    Ok(files.into_values().collect())
}

fn walk_dir(root: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            (to_key_path(relative), entry.path().to_path_buf())
        })
        .collect()
}

fn expand_glob(pattern: &str, full_pattern: &Path) -> CoreResult<Vec<(String, PathBuf)>> {
    let invalid = |message: String| CoreError::InvalidArtifactPattern {
        pattern: pattern.to_string(),
        message,
    };
    let entries = glob::glob(&full_pattern.to_string_lossy()).map_err(|e| invalid(e.to_string()))?;

    let mut matched = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| invalid(e.to_string()))?;
        if path.is_file() {
            matched.push((file_name(&path), path));
        }
    }
    Ok(matched)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Object keys always use forward slashes.
fn to_key_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
