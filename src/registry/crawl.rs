use crate::registry::context::RunContext;
use crate::registry::extract::extract_persons;
use crate::registry::fetch::{Fetcher, Pacer};
use crate::registry::manifest::{load_manifest, save_manifest};
use crate::registry::model::Person;
use crate::registry::sync::{SyncDecision, merge_manifest, plan_person, select_documents};
use anyhow::{Context, Result, anyhow};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub latest_only: bool,
    pub skip_existing: bool,
    pub person: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub persons_listed: usize,
    pub persons_processed: usize,
    pub persons_failed: usize,
    pub persons_without_documents: usize,
    pub skipped_empty_names: usize,
    pub downloaded: usize,
    pub already_satisfied: usize,
    pub download_failures: usize,
    pub used_fallback: bool,
}

#[derive(Debug, Default)]
struct PersonStats {
    downloaded: usize,
    already_satisfied: usize,
    download_failures: usize,
    without_documents: bool,
}

fn write_debug_file(dir: &Path, name: &str, content: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "saved html snippet");
    Ok(())
}

fn crawl_person(
    ctx: &mut RunContext,
    fetcher: &dyn Fetcher,
    pacer: &dyn Pacer,
    person: &Person,
    opts: &CrawlOptions,
) -> Result<PersonStats> {
    let mut stats = PersonStats::default();
    if person.documents.is_empty() {
        ctx.diagnostics
            .warn(format!("no PDF links found for {}", person.name));
        stats.without_documents = true;
        return Ok(stats);
    }

    let person_dir = ctx.paths.person_dir(&person.key);
    fs::create_dir_all(&person_dir)
        .with_context(|| format!("failed to create {}", person_dir.display()))?;

    let manifest_path = ctx.paths.manifest_path(&person.key);
    let previous = load_manifest(&manifest_path, &mut ctx.diagnostics);

    let selected = select_documents(&person.documents, opts.latest_only);
    let plan = plan_person(&person_dir, previous.as_ref(), selected, opts.skip_existing);

    let mut confirmed = BTreeSet::new();
    for planned in plan {
        let filename = planned.document.filename();
        match planned.decision {
            SyncDecision::InManifest => {
                ctx.diagnostics.info(format!(
                    "skipping already documented file {filename} for {}",
                    person.name
                ));
            }
            SyncDecision::OnDisk => {
                ctx.diagnostics
                    .info(format!("skipping existing file {filename} for {}", person.name));
            }
            SyncDecision::Fetch => {}
        }
        if planned.decision.is_satisfied() {
            stats.already_satisfied += 1;
            confirmed.insert(filename);
            continue;
        }

        match fetcher.fetch_binary(&planned.document.source_url) {
            Ok(bytes) => {
                let path = ctx.paths.document_path(&person.key, &planned.document);
                fs::write(&path, &bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                ctx.diagnostics
                    .info(format!("downloaded {filename} for {}", person.name));
                stats.downloaded += 1;
                confirmed.insert(filename);
            }
            Err(err) => {
                ctx.diagnostics.error(format!(
                    "failed to download {} [{}]: {err}",
                    planned.document.source_url,
                    err.code().as_str()
                ));
                stats.download_failures += 1;
            }
        }
        pacer.pause();
    }

    let manifest = merge_manifest(&person.name, previous.as_ref(), &person.documents, &confirmed);
    save_manifest(&manifest_path, &manifest)?;
    ctx.diagnostics
        .info(format!("created/updated manifest for {}", person.name));
    Ok(stats)
}

pub fn run_crawl(
    ctx: &mut RunContext,
    fetcher: &dyn Fetcher,
    pacer: &dyn Pacer,
    opts: &CrawlOptions,
) -> Result<CrawlSummary> {
    let page_url = ctx.config.source.page_url.clone();
    ctx.diagnostics.info(format!("fetching registry page {page_url}"));

    let html = match fetcher.fetch_page(&page_url) {
        Ok(html) => html,
        Err(err) => {
            ctx.diagnostics
                .error(format!("failed to fetch the page {page_url}: {err}"));
            return Err(anyhow!("registry page unavailable [{}]: {err}", err.code().as_str()));
        }
    };

    let debug_dump = ctx.config.source.debug_dump;
    let debug_dir = ctx.paths.debug_dir.clone();
    if debug_dump && let Err(err) = write_debug_file(&debug_dir, "full_page.html", &html) {
        ctx.diagnostics.warn(format!("debug dump failed: {err:#}"));
    }

    let extraction = extract_persons(&html, &page_url, &mut ctx.diagnostics);
    if extraction.used_fallback && debug_dump {
        for (i, fragment) in extraction.container_fragments.iter().enumerate() {
            if let Err(err) = write_debug_file(&debug_dir, &format!("container_{i}.html"), fragment)
            {
                ctx.diagnostics.warn(format!("debug dump failed: {err:#}"));
            }
        }
    }

    let mut summary = CrawlSummary {
        persons_listed: extraction.persons.len(),
        skipped_empty_names: extraction.skipped_empty,
        used_fallback: extraction.used_fallback,
        ..CrawlSummary::default()
    };

    let persons: Vec<&Person> = extraction
        .persons
        .iter()
        .filter(|p| opts.person.as_deref().is_none_or(|key| p.key == key))
        .collect();
    if let Some(key) = opts.person.as_deref()
        && persons.is_empty()
    {
        ctx.diagnostics
            .warn(format!("no listed person matches key `{key}`"));
    }

    for person in persons {
        match crawl_person(ctx, fetcher, pacer, person, opts) {
            Ok(stats) => {
                if stats.without_documents {
                    summary.persons_without_documents += 1;
                } else {
                    summary.persons_processed += 1;
                }
                summary.downloaded += stats.downloaded;
                summary.already_satisfied += stats.already_satisfied;
                summary.download_failures += stats.download_failures;
            }
            Err(err) => {
                summary.persons_failed += 1;
                ctx.diagnostics
                    .error(format!("error processing person '{}': {err:#}", person.name));
            }
        }
    }

    ctx.diagnostics.info("crawl pass completed");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{CrawlOptions, run_crawl};
    use crate::error::CrawlError;
    use crate::registry::config::CrawlerConfig;
    use crate::registry::context::RunContext;
    use crate::registry::fetch::{Fetcher, Pacer, Throttle};
    use crate::registry::manifest::PersonManifest;
    use crate::registry::paths::resolve_paths;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::path::Path;

    const PAGE: &str = r#"<html><body><div class="texte_contenuStructure"><div><ul>
<li>L<ul>
  <li>Legault, François<ul>
    <li><a href="/docs/31.pdf" data-id-document="31">Sommaire 2023-2024</a></li>
    <li><a href="/docs/22.pdf" data-id-document="22">Sommaire 2022-2023</a></li>
  </ul></li>
  <li>LeBel, Sonia<ul>
    <li><a href="/docs/40.pdf" data-id-document="40">Sommaire 2023</a></li>
  </ul></li>
</ul></li>
</ul></div></div></body></html>"#;

    struct FakeFetcher {
        page: Option<String>,
        failing: Vec<&'static str>,
        binary_calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(page: &str) -> Self {
            Self {
                page: Some(page.to_string()),
                failing: Vec::new(),
                binary_calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.binary_calls.borrow().len()
        }
    }

    impl Fetcher for FakeFetcher {
        fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
            self.page.clone().ok_or_else(|| CrawlError::HttpStatus {
                url: url.to_string(),
                status: 503,
            })
        }

        fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
            self.binary_calls.borrow_mut().push(url.to_string());
            if self.failing.iter().any(|f| url.ends_with(f)) {
                return Err(CrawlError::Network {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            Ok(format!("%PDF-1.4 {url}").into_bytes())
        }
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: Cell<usize>,
    }

    impl Pacer for CountingPacer {
        fn pause(&self) {
            self.pauses.set(self.pauses.get() + 1);
        }
    }

    fn context(root: &Path) -> RunContext {
        let mut cfg = CrawlerConfig::default();
        cfg.source.page_url = "https://registry.test/liste".to_string();
        cfg.source.output_root = root.display().to_string();
        cfg.source.registry_name = "reg".to_string();
        let paths = resolve_paths(&cfg, None);
        RunContext::new(cfg, paths, "crawl")
    }

    fn read_manifest(root: &Path, key: &str) -> PersonManifest {
        let raw = fs::read_to_string(root.join("reg").join(key).join(format!("{key}.json")))
            .expect("manifest exists");
        serde_json::from_str(&raw).expect("manifest json")
    }

    #[test]
    fn second_skip_existing_run_fetches_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new(PAGE);
        let pacer = CountingPacer::default();
        let opts = CrawlOptions {
            skip_existing: true,
            ..CrawlOptions::default()
        };

        let first = run_crawl(&mut context(tmp.path()), &fetcher, &pacer, &opts)
            .expect("first run");
        assert_eq!(first.downloaded, 3);
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(pacer.pauses.get(), 3);

        let second = run_crawl(&mut context(tmp.path()), &fetcher, &pacer, &opts)
            .expect("second run");
        assert_eq!(fetcher.calls(), 3, "no new fetches on the second run");
        assert_eq!(pacer.pauses.get(), 3, "satisfied documents are not delayed");
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.already_satisfied, 3);

        let manifest = read_manifest(tmp.path(), "Legault,_François");
        assert_eq!(manifest.name, "Legault, François");
        assert_eq!(
            manifest.documents,
            ["document_31_2023-2024.pdf", "document_22_2022-2023.pdf"]
        );
    }

    #[test]
    fn latest_only_downloads_first_document_per_person() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new(PAGE);
        let opts = CrawlOptions {
            latest_only: true,
            ..CrawlOptions::default()
        };
        let summary = run_crawl(&mut context(tmp.path()), &fetcher, &Throttle::new(0, 0), &opts)
            .expect("run");

        assert_eq!(summary.downloaded, 2);
        let calls = fetcher.binary_calls.borrow();
        assert_eq!(
            *calls,
            ["https://registry.test/docs/31.pdf", "https://registry.test/docs/40.pdf"]
        );
    }

    #[test]
    fn failed_download_does_not_stop_the_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut fetcher = FakeFetcher::new(PAGE);
        fetcher.failing = vec!["/docs/31.pdf"];
        let pacer = CountingPacer::default();
        let summary = run_crawl(
            &mut context(tmp.path()),
            &fetcher,
            &pacer,
            &CrawlOptions::default(),
        )
        .expect("run");

        assert_eq!(pacer.pauses.get(), 3, "failed attempts are delayed too");
        assert_eq!(summary.download_failures, 1);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.persons_processed, 2);
        let manifest = read_manifest(tmp.path(), "Legault,_François");
        assert_eq!(manifest.documents, ["document_22_2022-2023.pdf"]);
    }

    #[test]
    fn person_filter_limits_the_pass() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher::new(PAGE);
        let opts = CrawlOptions {
            person: Some("LeBel,_Sonia".to_string()),
            ..CrawlOptions::default()
        };
        let summary = run_crawl(&mut context(tmp.path()), &fetcher, &Throttle::new(0, 0), &opts)
            .expect("run");

        assert_eq!(summary.persons_listed, 2);
        assert_eq!(summary.persons_processed, 1);
        assert!(tmp.path().join("reg/LeBel,_Sonia/document_40_2023.pdf").exists());
        assert!(!tmp.path().join("reg/Legault,_François").exists());
    }

    #[test]
    fn unreachable_root_page_ends_the_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let fetcher = FakeFetcher {
            page: None,
            failing: Vec::new(),
            binary_calls: Default::default(),
        };
        let err = run_crawl(
            &mut context(tmp.path()),
            &fetcher,
            &Throttle::new(0, 0),
            &CrawlOptions::default(),
        )
        .expect_err("root failure is fatal");
        assert!(err.to_string().contains("E102_HTTP_STATUS"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn debug_dump_saves_page_and_containers_on_fallback() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let page = r#"<html><body>
<div class="texte_contenuStructure"><section>moved</section></div>
<main><ul><li>H<ul>
  <li>Hébert, Anne<ul><li><a href="/docs/3.pdf" data-id-document="3">2023</a></li></ul></li>
</ul></li></ul></main></body></html>"#;
        let fetcher = FakeFetcher::new(page);
        let mut ctx = context(tmp.path());
        ctx.config.source.debug_dump = true;

        let summary = run_crawl(
            &mut ctx,
            &fetcher,
            &Throttle::new(0, 0),
            &CrawlOptions::default(),
        )
        .expect("run");

        assert!(summary.used_fallback);
        assert_eq!(summary.downloaded, 1);
        let debug_dir = tmp.path().join("debug");
        let full_page = fs::read_to_string(debug_dir.join("full_page.html")).expect("full page");
        assert!(full_page.contains("Hébert, Anne"));
        let container = fs::read_to_string(debug_dir.join("container_0.html")).expect("container");
        assert!(container.contains("moved"));
        assert!(!debug_dir.join("container_1.html").exists());
    }

    #[test]
    fn corrupt_manifest_triggers_full_refetch() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("reg/LeBel,_Sonia");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("LeBel,_Sonia.json"), "not json").expect("write");

        let fetcher = FakeFetcher::new(PAGE);
        let opts = CrawlOptions {
            skip_existing: true,
            person: Some("LeBel,_Sonia".to_string()),
            ..CrawlOptions::default()
        };
        let mut ctx = context(tmp.path());
        run_crawl(&mut ctx, &fetcher, &Throttle::new(0, 0), &opts).expect("run");

        assert_eq!(fetcher.calls(), 1);
        assert!(
            ctx.diagnostics
                .entries()
                .iter()
                .any(|d| d.message.contains("could not parse manifest"))
        );
        assert_eq!(
            read_manifest(tmp.path(), "LeBel,_Sonia").documents,
            ["document_40_2023.pdf"]
        );
    }
}
