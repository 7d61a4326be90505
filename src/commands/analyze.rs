use anyhow::Result;

use crate::commands::{CommandReport, open_context};
use crate::registry::analysis::{
    API_KEY_VAR, AnalyzeOptions, GeminiAnalyzer, resolve_api_key, run_analysis,
};
use crate::registry::results::{load_results, save_results};

pub fn run(opts: &AnalyzeOptions, results_file: Option<&str>) -> Result<CommandReport> {
    let mut ctx = open_context("analyze", results_file)?;
    let mut report = CommandReport::new("analyze");

    let api_key = resolve_api_key();
    if api_key.is_none() {
        ctx.diagnostics.warn(format!(
            "{API_KEY_VAR} is not set; each document will be recorded with an error result"
        ));
    }
    let analyzer = GeminiAnalyzer::from_config(&ctx.config.analysis, api_key)?;
    let (summary, results) = run_analysis(&mut ctx, &analyzer, opts)?;

    let results_path = ctx.paths.results_file.clone();
    let mut aggregate = load_results(&results_path, &mut ctx.diagnostics);
    aggregate.absorb(results);
    save_results(&results_path, &aggregate)?;
    ctx.diagnostics
        .info(format!("analysis results saved to {}", results_path.display()));

    report.detail(format!("model={}", ctx.config.analysis.model));
    report.detail(format!("persons={}", summary.persons));
    report.detail(format!("persons_failed={}", summary.persons_failed));
    report.detail(format!("analyzed={}", summary.analyzed));
    report.detail(format!("reused={}", summary.reused));
    report.detail(format!("failed={}", summary.failed));
    report.detail(format!("combined={}", summary.combined));
    report.detail(format!("results_file={}", results_path.display()));
    report.detail(format!("results_records={}", aggregate.record_count()));
    if let Some(key) = opts.person.as_deref()
        && let Some(records) = aggregate.person(key)
    {
        report.detail(format!("person_records={}", records.len()));
    }
    report.absorb_diagnostics(&ctx.diagnostics);

    Ok(report)
}
