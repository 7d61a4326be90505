pub mod analyze;
pub mod crawl;
pub mod run;
pub mod status;

use anyhow::Result;
use serde::Serialize;

use crate::registry::config::load_config;
use crate::registry::context::{Diagnostics, Level, RunContext};
use crate::registry::paths::resolve_paths;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }

    /// Warnings and errors from the run become issues; info stays in the log.
    pub fn absorb_diagnostics(&mut self, diagnostics: &Diagnostics) {
        self.detail(format!(
            "warnings={} errors={}",
            diagnostics.count(Level::Warn),
            diagnostics.count(Level::Error)
        ));
        for entry in diagnostics.entries() {
            if entry.level != Level::Info {
                self.issue(format!("{}: {}", entry.level.as_str(), entry.message));
            }
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{} ok={}\n", self.command, self.ok);
        for detail in &self.details {
            out.push_str(&format!("  {detail}\n"));
        }
        for issue in &self.issues {
            out.push_str(&format!("  issue: {issue}\n"));
        }
        out
    }
}

pub fn open_context(phase: &str, results_override: Option<&str>) -> Result<RunContext> {
    let config = load_config()?;
    let paths = resolve_paths(&config, results_override);
    Ok(RunContext::new(config, paths, phase))
}

#[cfg(test)]
mod tests {
    use super::CommandReport;
    use crate::registry::context::Diagnostics;

    #[test]
    fn diagnostics_warnings_become_issues() {
        let mut diag = Diagnostics::new("crawl");
        diag.info("found 2 persons");
        diag.warn("empty name found, skipping this entry");

        let mut report = CommandReport::new("crawl");
        report.absorb_diagnostics(&diag);
        assert!(!report.ok);
        assert_eq!(report.details, ["warnings=1 errors=0"]);
        assert_eq!(
            report.issues,
            ["warn: empty name found, skipping this entry"]
        );
    }

    #[test]
    fn merge_combines_status() {
        let mut crawl = CommandReport::new("run");
        crawl.detail("downloaded=2");
        let mut analyze = CommandReport::new("analyze");
        analyze.issue("error: quota");
        crawl.merge(analyze);

        assert!(!crawl.ok);
        let text = crawl.render_text();
        assert_eq!(crawl.details, ["downloaded=2"]);
        assert!(text.starts_with("run ok=false"));
        assert!(text.contains("  downloaded=2"));
        assert!(text.contains("  issue: error: quota"));
    }
}
