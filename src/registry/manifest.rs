use crate::registry::context::Diagnostics;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What is known to be on disk for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonManifest {
    pub name: String,
    #[serde(default)]
    pub documents: Vec<String>,
}

impl PersonManifest {
    pub fn contains(&self, filename: &str) -> bool {
        self.documents.iter().any(|d| d == filename)
    }
}

/// Absent file or malformed JSON both mean "no prior manifest".
pub fn load_manifest(path: &Path, diag: &mut Diagnostics) -> Option<PersonManifest> {
    if !path.exists() {
        return None;
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            diag.warn(format!("could not read manifest {}: {err}", path.display()));
            return None;
        }
    };
    match serde_json::from_str::<PersonManifest>(&raw) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            diag.warn(format!(
                "could not parse manifest {}: {err}; treating as absent",
                path.display()
            ));
            None
        }
    }
}

pub fn save_manifest(path: &Path, manifest: &PersonManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(manifest)?;
    fs::write(path, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
