use crate::registry::context::Diagnostics;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub source_document: String,
    pub raw_text: String,
    /// `None` only when `raw_text` carries an analysis error.
    pub structured: Option<Value>,
}

/// person key -> document filename -> record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResults {
    persons: BTreeMap<String, BTreeMap<String, AnalysisRecord>>,
}

impl AnalysisResults {
    pub fn insert(&mut self, person_key: &str, entry: &str, record: AnalysisRecord) {
        self.persons
            .entry(person_key.to_string())
            .or_default()
            .insert(entry.to_string(), record);
    }

    pub fn person(&self, key: &str) -> Option<&BTreeMap<String, AnalysisRecord>> {
        self.persons.get(key)
    }

    pub fn record_count(&self) -> usize {
        self.persons.values().map(BTreeMap::len).sum()
    }

    /// Persons present in `newer` replace their previous entries wholesale.
    pub fn absorb(&mut self, newer: AnalysisResults) {
        self.persons.extend(newer.persons);
    }
}

pub fn load_results(path: &Path, diag: &mut Diagnostics) -> AnalysisResults {
    if !path.exists() {
        return AnalysisResults::default();
    }
    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str::<AnalysisResults>(&raw).map_err(Into::into));
    match parsed {
        Ok(results) => results,
        Err(err) => {
            diag.warn(format!(
                "could not read previous results {}: {err}; starting fresh",
                path.display()
            ));
            AnalysisResults::default()
        }
    }
}

/// Write through a temp file in the same directory, then rename over the target.
pub fn save_results(path: &Path, results: &AnalysisResults) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let data = serde_json::to_string_pretty(results)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(data.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
