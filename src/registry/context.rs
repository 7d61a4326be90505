use crate::registry::audit;
use crate::registry::config::CrawlerConfig;
use crate::registry::paths::RegistryPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// Collects what happened during a run. Every entry is mirrored to `tracing`
/// and, when a run log is attached, appended to it.
#[derive(Debug, Default)]
pub struct Diagnostics {
    phase: String,
    entries: Vec<Diagnostic>,
    run_log: Option<std::path::PathBuf>,
}

impl Diagnostics {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            entries: Vec::new(),
            run_log: None,
        }
    }

    pub fn with_run_log(mut self, path: std::path::PathBuf) -> Self {
        self.run_log = Some(path);
        self
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(phase = %self.phase, "{message}");
        self.record(Level::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(phase = %self.phase, "{message}");
        self.record(Level::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(phase = %self.phase, "{message}");
        self.record(Level::Error, message);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|d| d.level == level).count()
    }

    fn record(&mut self, level: Level, message: String) {
        if let Some(path) = &self.run_log
            && let Err(err) = audit::append_event(path, &self.phase, level.as_str(), &message)
        {
            tracing::debug!(error = %err, "run log append failed");
        }
        self.entries.push(Diagnostic { level, message });
    }
}

pub struct RunContext {
    pub config: CrawlerConfig,
    pub paths: RegistryPaths,
    pub diagnostics: Diagnostics,
}

impl RunContext {
    pub fn new(config: CrawlerConfig, paths: RegistryPaths, phase: &str) -> Self {
        let diagnostics = Diagnostics::new(phase).with_run_log(paths.run_log.clone());
        Self {
            config,
            paths,
            diagnostics,
        }
    }
}
