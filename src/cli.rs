use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::logging;
use crate::registry::analysis::AnalyzeOptions;
use crate::registry::crawl::CrawlOptions;

#[derive(Parser, Debug)]
#[command(
    name = "ced-crawler",
    version,
    about = "Mirror the CED-QC declaration registry and extract disclosures with Gemini"
)]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct SelectionArgs {
    /// Only the first (latest) document of each person
    #[arg(long)]
    latest_only: bool,

    /// Restrict to one person by folder key (e.g. "Jean_Dupont_Tremblay")
    #[arg(long, value_name = "KEY")]
    person: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct AnalysisFlags {
    /// Reuse existing analysis artifacts instead of calling the model again
    #[arg(long)]
    skip_analyzed: bool,

    /// Also send all of a person's PDFs in one request for a cross-filing comparison
    #[arg(long)]
    compare_all: bool,

    /// Replace the built-in extraction prompt
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Where to write the aggregate results JSON
    #[arg(long, value_name = "PATH")]
    results_file: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Skip documents already on disk or recorded in the person's manifest
    #[arg(long)]
    skip_existing: bool,
}

#[derive(Args, Debug, Clone)]
struct AnalyzeArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    #[command(flatten)]
    analysis: AnalysisFlags,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Skip documents already on disk or recorded in the person's manifest
    #[arg(long)]
    skip_existing: bool,

    #[command(flatten)]
    analysis: AnalysisFlags,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download declarations only
    Crawl(CrawlArgs),
    /// Analyze already downloaded declarations only
    Analyze(AnalyzeArgs),
    /// Download, then analyze
    Run(RunArgs),
    /// Show configuration and what is on disk
    Status,
}

fn crawl_options(selection: &SelectionArgs, skip_existing: bool) -> CrawlOptions {
    CrawlOptions {
        latest_only: selection.latest_only,
        skip_existing,
        person: selection.person.clone(),
    }
}

fn analyze_options(selection: &SelectionArgs, flags: &AnalysisFlags) -> AnalyzeOptions {
    AnalyzeOptions {
        latest_only: selection.latest_only,
        skip_analyzed: flags.skip_analyzed,
        compare_all: flags.compare_all,
        person: selection.person.clone(),
        prompt: flags.prompt.clone(),
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match &cli.command {
        Command::Crawl(args) => {
            commands::crawl::run(&crawl_options(&args.selection, args.skip_existing))?
        }
        Command::Analyze(args) => commands::analyze::run(
            &analyze_options(&args.selection, &args.analysis),
            args.analysis.results_file.as_deref(),
        )?,
        Command::Run(args) => commands::run::run(
            &crawl_options(&args.selection, args.skip_existing),
            &analyze_options(&args.selection, &args.analysis),
            args.analysis.results_file.as_deref(),
        )?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)
}
