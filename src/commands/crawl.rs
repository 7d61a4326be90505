use anyhow::Result;

use crate::commands::{CommandReport, open_context};
use crate::registry::crawl::{CrawlOptions, run_crawl};
use crate::registry::fetch::{HttpFetcher, Throttle};

pub fn run(opts: &CrawlOptions) -> Result<CommandReport> {
    let mut ctx = open_context("crawl", None)?;
    let mut report = CommandReport::new("crawl");

    let fetcher = HttpFetcher::from_config(&ctx.config.fetch)?;
    let throttle = Throttle::from_config(&ctx.config.fetch);
    let summary = run_crawl(&mut ctx, &fetcher, &throttle, opts)?;

    report.detail(format!("page_url={}", ctx.config.source.page_url));
    report.detail(format!("registry_dir={}", ctx.paths.registry_dir.display()));
    report.detail(format!("fallback_selector={}", summary.used_fallback));
    report.detail(format!("persons_listed={}", summary.persons_listed));
    report.detail(format!("persons_processed={}", summary.persons_processed));
    report.detail(format!(
        "persons_without_documents={}",
        summary.persons_without_documents
    ));
    report.detail(format!("persons_failed={}", summary.persons_failed));
    report.detail(format!("skipped_empty_names={}", summary.skipped_empty_names));
    report.detail(format!("downloaded={}", summary.downloaded));
    report.detail(format!("already_satisfied={}", summary.already_satisfied));
    report.detail(format!("download_failures={}", summary.download_failures));
    report.absorb_diagnostics(&ctx.diagnostics);

    Ok(report)
}
