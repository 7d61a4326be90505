use anyhow::Result;

use crate::commands::{CommandReport, analyze, crawl};
use crate::registry::analysis::AnalyzeOptions;
use crate::registry::crawl::CrawlOptions;

/// Download pass followed by an analysis pass over what is on disk.
pub fn run(
    crawl_opts: &CrawlOptions,
    analyze_opts: &AnalyzeOptions,
    results_file: Option<&str>,
) -> Result<CommandReport> {
    let mut report = CommandReport::new("run");
    report.merge(crawl::run(crawl_opts)?);
    report.merge(analyze::run(analyze_opts, results_file)?);
    Ok(report)
}
