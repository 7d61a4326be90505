use crate::registry::config::CrawlerConfig;
use crate::registry::model::Document;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RegistryPaths {
    pub output_root: PathBuf,
    pub registry_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub run_log: PathBuf,
    pub results_file: PathBuf,
}

impl RegistryPaths {
    pub fn person_dir(&self, key: &str) -> PathBuf {
        self.registry_dir.join(key)
    }

    pub fn manifest_path(&self, key: &str) -> PathBuf {
        self.person_dir(key).join(format!("{key}.json"))
    }

    pub fn document_path(&self, key: &str, document: &Document) -> PathBuf {
        self.person_dir(key).join(document.filename())
    }

    pub fn combined_stem(key: &str) -> String {
        format!("{key}_combined_analysis")
    }
}

/// `document_1_2021.pdf` -> `document_1_2021_analysis.txt` / `.json`.
pub fn analysis_artifact_paths(pdf_path: &Path) -> (PathBuf, PathBuf) {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let dir = pdf_path.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{stem}_analysis.txt")),
        dir.join(format!("{stem}_analysis.json")),
    )
}

pub fn combined_artifact_paths(person_dir: &Path, key: &str) -> (PathBuf, PathBuf) {
    let stem = RegistryPaths::combined_stem(key);
    (
        person_dir.join(format!("{stem}.txt")),
        person_dir.join(format!("{stem}.json")),
    )
}

pub fn resolve_paths(cfg: &CrawlerConfig, results_override: Option<&str>) -> RegistryPaths {
    let output_root = PathBuf::from(&cfg.source.output_root);
    let registry_dir = output_root.join(&cfg.source.registry_name);
    let results_file = results_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| cfg.analysis.results_file.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| registry_dir.join("analysis_results.json"));

    RegistryPaths {
        debug_dir: output_root.join("debug"),
        run_log: registry_dir.join("crawl_log.jsonl"),
        registry_dir,
        output_root,
        results_file,
    }
}
