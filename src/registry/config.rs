use crate::error::CrawlError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_PAGE_URL: &str = "https://www.ced-qc.ca/fr/registres-publics/sommaires-des-declarations-des-interets-personnels/22-membres-du-conseil-executif-et-deputes";
pub const DEFAULT_REGISTRY_NAME: &str = "sommaires-des-declarations-des-interets-personnels";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub page_url: String,
    pub registry_name: String,
    pub output_root: String,
    #[serde(default)]
    pub debug_dump: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            page_url: DEFAULT_PAGE_URL.to_string(),
            registry_name: DEFAULT_REGISTRY_NAME.to_string(),
            output_root: "output".to_string(),
            debug_dump: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            backoff_base_ms: 500,
            delay_min_ms: 1_000,
            delay_max_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub results_file: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 180,
            max_retries: 1,
            backoff_base_ms: 2_000,
            results_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrawlerConfig {
    pub source: SourceConfig,
    pub fetch: FetchConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialCrawlerConfig {
    source: Option<SourceConfig>,
    fetch: Option<FetchConfig>,
    analysis: Option<AnalysisConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn invalid(message: &str) -> anyhow::Error {
    CrawlError::InvalidConfig(message.to_string()).into()
}

pub fn validate(cfg: &CrawlerConfig) -> Result<()> {
    if cfg.source.page_url.trim().is_empty() {
        return Err(invalid("page url: cannot be empty"));
    }
    if cfg.source.registry_name.trim().is_empty() {
        return Err(invalid("registry name: cannot be empty"));
    }
    if cfg.source.registry_name.contains(['/', '\\']) {
        return Err(invalid("registry name: must be a single directory name"));
    }
    if cfg.fetch.timeout_secs == 0 {
        return Err(invalid("fetch timeout: must be >= 1 second"));
    }
    if cfg.fetch.delay_min_ms > cfg.fetch.delay_max_ms {
        return Err(invalid("politeness delay: require delay_min_ms <= delay_max_ms"));
    }
    if cfg.analysis.timeout_secs == 0 {
        return Err(invalid("analysis timeout: must be >= 1 second"));
    }
    if cfg.analysis.model.trim().is_empty() {
        return Err(invalid("analysis model: cannot be empty"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("CED_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let base = dirs::config_dir()?;
    Some(base.join("ced-crawler").join("config.toml"))
}

fn merge_file_config(base: &mut CrawlerConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse crawler config {}: {err}", path.display()))
}

fn merge_toml(base: &mut CrawlerConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialCrawlerConfig = toml::from_str(raw)?;
    if let Some(source) = parsed.source {
        base.source = source;
    }
    if let Some(fetch) = parsed.fetch {
        base.fetch = fetch;
    }
    if let Some(analysis) = parsed.analysis {
        base.analysis = analysis;
    }
    Ok(())
}

pub fn load_config() -> Result<CrawlerConfig> {
    let mut cfg = CrawlerConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.source.page_url = env_or_string("CED_PAGE_URL", &cfg.source.page_url);
    cfg.source.registry_name = env_or_string("CED_REGISTRY_NAME", &cfg.source.registry_name);
    cfg.source.output_root = env_or_string("CED_OUTPUT_DIR", &cfg.source.output_root);
    cfg.source.debug_dump = env_or_bool("CED_DEBUG_DUMP", cfg.source.debug_dump);

    cfg.fetch.timeout_secs = env_or_u64("CED_FETCH_TIMEOUT_SECS", cfg.fetch.timeout_secs);
    cfg.fetch.max_retries = env_or_u32("CED_FETCH_MAX_RETRIES", cfg.fetch.max_retries);
    cfg.fetch.backoff_base_ms = env_or_u64("CED_FETCH_BACKOFF_MS", cfg.fetch.backoff_base_ms);
    cfg.fetch.delay_min_ms = env_or_u64("CED_DELAY_MIN_MS", cfg.fetch.delay_min_ms);
    cfg.fetch.delay_max_ms = env_or_u64("CED_DELAY_MAX_MS", cfg.fetch.delay_max_ms);

    cfg.analysis.model = env_or_string("CED_GEMINI_MODEL", &cfg.analysis.model);
    cfg.analysis.base_url = env_or_string("CED_GEMINI_BASE_URL", &cfg.analysis.base_url);
    cfg.analysis.timeout_secs =
        env_or_u64("CED_ANALYSIS_TIMEOUT_SECS", cfg.analysis.timeout_secs);
    cfg.analysis.max_retries = env_or_u32("CED_ANALYSIS_MAX_RETRIES", cfg.analysis.max_retries);
    cfg.analysis.backoff_base_ms =
        env_or_u64("CED_ANALYSIS_BACKOFF_MS", cfg.analysis.backoff_base_ms);
    cfg.analysis.results_file =
        env_optional_string("CED_RESULTS_FILE", cfg.analysis.results_file.take());

    validate(&cfg)?;
    Ok(cfg)
}
