use anyhow::Result;
use std::env;
use std::fs;
use std::path::Path;

use crate::commands::{CommandReport, open_context};
use crate::registry::analysis::{list_person_keys, resolve_api_key};
use crate::registry::config::resolve_config_path;

include!(concat!(env!("OUT_DIR"), "/ced_env_allowlist.rs"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskCounts {
    pub persons: usize,
    pub manifests: usize,
    pub pdfs: usize,
    pub analysis_artifacts: usize,
}

pub fn count_person_dir(dir: &Path, key: &str, counts: &mut DiskCounts) -> Result<()> {
    counts.persons += 1;
    let manifest_name = format!("{key}.json");
    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == manifest_name {
            counts.manifests += 1;
        } else if name.ends_with("_analysis.txt") || name.ends_with("_analysis.json") {
            counts.analysis_artifacts += 1;
        } else if name.starts_with("document_") && name.ends_with(".pdf") {
            counts.pdfs += 1;
        }
    }
    Ok(())
}

pub fn set_overrides() -> Vec<&'static str> {
    GENERATED_CED_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let ctx = open_context("status", None)?;
    let mut report = CommandReport::new("status");

    match resolve_config_path() {
        Some(path) => report.detail(format!(
            "config_file={} exists={}",
            path.display(),
            path.exists()
        )),
        None => report.detail("config_file=none"),
    }
    report.detail(format!("page_url={}", ctx.config.source.page_url));
    report.detail(format!("output_root={}", ctx.paths.output_root.display()));
    report.detail(format!("registry_dir={}", ctx.paths.registry_dir.display()));
    report.detail(format!("run_log={}", ctx.paths.run_log.display()));

    let mut counts = DiskCounts::default();
    for key in list_person_keys(&ctx.paths)? {
        count_person_dir(&ctx.paths.person_dir(&key), &key, &mut counts)?;
    }
    report.detail(format!("persons={}", counts.persons));
    report.detail(format!("manifests={}", counts.manifests));
    report.detail(format!("pdfs={}", counts.pdfs));
    report.detail(format!("analysis_artifacts={}", counts.analysis_artifacts));

    report.detail(format!(
        "results_file={} exists={}",
        ctx.paths.results_file.display(),
        ctx.paths.results_file.exists()
    ));
    report.detail(format!("model={}", ctx.config.analysis.model));
    report.detail(format!("api_key_present={}", resolve_api_key().is_some()));
    report.detail(format!("env_overrides={}", set_overrides().join(",")));

    if !ctx.paths.registry_dir.exists() {
        report.issue("registry directory missing; run `ced-crawler crawl` first");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{DiskCounts, GENERATED_CED_ENV_ALLOWLIST, count_person_dir};
    use std::fs;

    #[test]
    fn allowlist_covers_config_overrides() {
        assert!(GENERATED_CED_ENV_ALLOWLIST.contains(&"CED_PAGE_URL"));
        assert!(GENERATED_CED_ENV_ALLOWLIST.contains(&"CED_DELAY_MAX_MS"));
    }

    #[test]
    fn person_dir_counts_by_artifact_kind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        for name in [
            "A.json",
            "document_1_2021.pdf",
            "document_2_2022.pdf",
            "document_1_2021_analysis.txt",
            "document_1_2021_analysis.json",
        ] {
            fs::write(tmp.path().join(name), b"x").expect("write");
        }
        let mut counts = DiskCounts::default();
        count_person_dir(tmp.path(), "A", &mut counts).expect("count");
        assert_eq!(
            counts,
            DiskCounts {
                persons: 1,
                manifests: 1,
                pdfs: 2,
                analysis_artifacts: 2,
            }
        );
    }
}
