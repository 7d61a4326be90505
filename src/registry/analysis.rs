use crate::error::CrawlError;
use crate::registry::config::AnalysisConfig;
use crate::registry::context::{Diagnostics, RunContext};
use crate::registry::fetch::RetryPolicy;
use crate::registry::manifest::load_manifest;
use crate::registry::paths::{RegistryPaths, analysis_artifact_paths, combined_artifact_paths};
use crate::registry::prompt::{DEFAULT_EXTRACTION_PROMPT, compare_prompt};
use crate::registry::results::{AnalysisRecord, AnalysisResults};
use crate::registry::structured::extract_structured;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
const API_KEY_ALIASES: [&str; 2] = [API_KEY_VAR, "GOOGLE_API_KEY"];
const ERROR_PREFIX: &str = "ERROR[";

#[derive(Debug, Clone)]
pub struct PdfBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub trait Analyzer {
    fn label(&self) -> &str;
    fn analyze(&self, pdfs: &[PdfBlob], prompt: &str) -> Result<String, CrawlError>;
}

pub struct GeminiAnalyzer {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

pub fn resolve_api_key() -> Option<String> {
    API_KEY_ALIASES.iter().find_map(|var| env_non_empty(var))
}

pub fn build_payload(pdfs: &[PdfBlob], prompt: &str) -> Value {
    let mut parts: Vec<Value> = pdfs
        .iter()
        .map(|pdf| {
            json!({
                "inline_data": {
                    "mime_type": "application/pdf",
                    "data": BASE64.encode(&pdf.bytes),
                }
            })
        })
        .collect();
    parts.push(json!({ "text": prompt }));
    json!({ "contents": [{ "parts": parts }] })
}

pub fn extract_gemini_text(json: &Value) -> Option<String> {
    let parts = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(Value::as_array)?;
    let text = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

impl GeminiAnalyzer {
    pub fn from_config(cfg: &AnalysisConfig, api_key: Option<String>) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|err| CrawlError::Network {
                url: cfg.base_url.clone(),
                message: format!("failed to build http client: {err}"),
            })?;
        Ok(Self {
            api_key,
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::new(cfg.max_retries, cfg.backoff_base_ms),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn call_once(&self, url: &str, api_key: &str, payload: &Value) -> Result<String, CrawlError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(payload)
            .send()
            .map_err(|err| CrawlError::Network {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let json: Value = response
            .json()
            .map_err(|err| CrawlError::AiResponse(format!("invalid json body: {err}")))?;
        if let Some(text) = extract_gemini_text(&json) {
            return Ok(text);
        }
        let reason = json
            .get("promptFeedback")
            .and_then(|v| v.get("blockReason"))
            .and_then(Value::as_str)
            .map(|r| format!("prompt blocked: {r}"))
            .unwrap_or_else(|| "gemini response missing text content".to_string());
        Err(CrawlError::AiResponse(reason))
    }
}

impl Analyzer for GeminiAnalyzer {
    fn label(&self) -> &str {
        &self.model
    }

    fn analyze(&self, pdfs: &[PdfBlob], prompt: &str) -> Result<String, CrawlError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CrawlError::MissingCredential { var: API_KEY_VAR });
        };
        let url = self.endpoint();
        let payload = build_payload(pdfs, prompt);
        self.retry
            .run(&url, || self.call_once(&url, api_key, &payload))
    }
}

pub fn error_text(err: &CrawlError) -> String {
    format!("{ERROR_PREFIX}{}]: {err}", err.code().as_str())
}

pub fn is_error_text(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}

/// Never fails: analyzer errors come back as an `ERROR[...]` string.
pub fn request_text(analyzer: &dyn Analyzer, pdfs: &[PdfBlob], prompt: &str) -> String {
    match analyzer.analyze(pdfs, prompt) {
        Ok(text) => text,
        Err(err) => error_text(&err),
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub latest_only: bool,
    pub skip_analyzed: bool,
    pub compare_all: bool,
    pub person: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisSummary {
    pub persons: usize,
    pub persons_failed: usize,
    pub analyzed: usize,
    pub reused: usize,
    pub failed: usize,
    pub combined: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Analyzed,
    Reused,
    Failed,
}

fn write_artifacts(txt_path: &Path, json_path: &Path, raw: &str, structured: &Value) -> Result<()> {
    fs::write(txt_path, raw).with_context(|| format!("failed to write {}", txt_path.display()))?;
    let data = serde_json::to_string_pretty(structured)?;
    fs::write(json_path, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    Ok(())
}

/// Rebuild a record from artifacts left by an earlier pass.
fn load_existing(txt_path: &Path, json_path: &Path, source: &str) -> Result<AnalysisRecord> {
    let raw = if txt_path.exists() {
        Some(
            fs::read_to_string(txt_path)
                .with_context(|| format!("failed to read {}", txt_path.display()))?,
        )
    } else {
        None
    };
    let structured = if json_path.exists() {
        let data = fs::read_to_string(json_path)
            .with_context(|| format!("failed to read {}", json_path.display()))?;
        serde_json::from_str::<Value>(&data).ok()
    } else {
        None
    };

    let (raw_text, structured) = match (raw, structured) {
        (Some(raw), Some(structured)) => (raw, structured),
        (Some(raw), None) => {
            let structured = extract_structured(&raw);
            (raw, structured)
        }
        (None, Some(structured)) => {
            let raw = structured
                .get("full_text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| structured.to_string());
            (raw, structured)
        }
        (None, None) => anyhow::bail!("no analysis artifacts for {source}"),
    };
    Ok(AnalysisRecord {
        source_document: source.to_string(),
        raw_text,
        structured: Some(structured),
    })
}

fn analyze_blobs(
    ctx: &mut RunContext,
    analyzer: &dyn Analyzer,
    artifacts: (PathBuf, PathBuf),
    source: &str,
    pdf_paths: &[PathBuf],
    prompt: &str,
    skip_analyzed: bool,
) -> Result<(AnalysisRecord, Outcome)> {
    let (txt_path, json_path) = artifacts;
    if skip_analyzed && (txt_path.exists() || json_path.exists()) {
        match load_existing(&txt_path, &json_path, source) {
            Ok(record) => {
                ctx.diagnostics
                    .info(format!("skipping already analyzed {source}"));
                return Ok((record, Outcome::Reused));
            }
            Err(err) => ctx.diagnostics.warn(format!(
                "existing analysis for {source} is unusable ({err:#}); analyzing again"
            )),
        }
    }

    let mut blobs = Vec::with_capacity(pdf_paths.len());
    for path in pdf_paths {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        blobs.push(PdfBlob {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            bytes,
        });
    }

    let names: Vec<&str> = blobs.iter().map(|b| b.name.as_str()).collect();
    ctx.diagnostics.info(format!(
        "analyzing {source} with {} ({})",
        analyzer.label(),
        names.join(", ")
    ));
    let raw_text = request_text(analyzer, &blobs, prompt);
    if is_error_text(&raw_text) {
        ctx.diagnostics
            .error(format!("analysis failed for {source}: {raw_text}"));
        let record = AnalysisRecord {
            source_document: source.to_string(),
            raw_text,
            structured: None,
        };
        return Ok((record, Outcome::Failed));
    }

    let structured = extract_structured(&raw_text);
    write_artifacts(&txt_path, &json_path, &raw_text, &structured)?;
    let record = AnalysisRecord {
        source_document: source.to_string(),
        raw_text,
        structured: Some(structured),
    };
    Ok((record, Outcome::Analyzed))
}

fn tally(summary: &mut AnalysisSummary, outcome: Outcome) {
    match outcome {
        Outcome::Analyzed => summary.analyzed += 1,
        Outcome::Reused => summary.reused += 1,
        Outcome::Failed => summary.failed += 1,
    }
}

/// PDFs for a person, manifest order first, then any others found on disk.
pub fn person_documents(
    paths: &RegistryPaths,
    key: &str,
    diag: &mut Diagnostics,
) -> Result<Vec<String>> {
    let person_dir = paths.person_dir(key);
    let mut ordered: Vec<String> = load_manifest(&paths.manifest_path(key), diag)
        .map(|m| m.documents)
        .unwrap_or_default()
        .into_iter()
        .filter(|f| person_dir.join(f).is_file())
        .collect();

    let mut on_disk: Vec<String> = fs::read_dir(&person_dir)
        .with_context(|| format!("failed to read {}", person_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("document_") && name.ends_with(".pdf"))
        .filter(|name| !ordered.contains(name))
        .collect();
    on_disk.sort();
    ordered.extend(on_disk);
    Ok(ordered)
}

pub fn list_person_keys(paths: &RegistryPaths) -> Result<Vec<String>> {
    if !paths.registry_dir.exists() {
        return Ok(Vec::new());
    }
    let mut keys: Vec<String> = fs::read_dir(&paths.registry_dir)
        .with_context(|| format!("failed to read {}", paths.registry_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    keys.sort();
    Ok(keys)
}

fn analyze_person(
    ctx: &mut RunContext,
    analyzer: &dyn Analyzer,
    key: &str,
    opts: &AnalyzeOptions,
    prompt: &str,
    results: &mut AnalysisResults,
    summary: &mut AnalysisSummary,
) -> Result<()> {
    let person_dir = ctx.paths.person_dir(key);
    let mut documents = person_documents(&ctx.paths, key, &mut ctx.diagnostics)?;
    if opts.latest_only {
        documents.truncate(1);
    }
    if documents.is_empty() {
        ctx.diagnostics
            .warn(format!("no downloaded documents for {key}"));
        return Ok(());
    }

    for filename in &documents {
        let pdf_path = person_dir.join(filename);
        match analyze_blobs(
            ctx,
            analyzer,
            analysis_artifact_paths(&pdf_path),
            filename,
            std::slice::from_ref(&pdf_path),
            prompt,
            opts.skip_analyzed,
        ) {
            Ok((record, outcome)) => {
                tally(summary, outcome);
                results.insert(key, filename, record);
            }
            Err(err) => {
                summary.failed += 1;
                ctx.diagnostics
                    .error(format!("error analyzing {filename} for {key}: {err:#}"));
            }
        }
    }

    if opts.compare_all {
        let pdf_paths: Vec<PathBuf> = documents.iter().map(|f| person_dir.join(f)).collect();
        let (record, outcome) = analyze_blobs(
            ctx,
            analyzer,
            combined_artifact_paths(&person_dir, key),
            &documents.join(", "),
            &pdf_paths,
            &compare_prompt(prompt),
            opts.skip_analyzed,
        )?;
        tally(summary, outcome);
        if outcome != Outcome::Failed {
            summary.combined += 1;
        }
        results.insert(key, &RegistryPaths::combined_stem(key), record);
    }
    Ok(())
}

pub fn run_analysis(
    ctx: &mut RunContext,
    analyzer: &dyn Analyzer,
    opts: &AnalyzeOptions,
) -> Result<(AnalysisSummary, AnalysisResults)> {
    let prompt = opts
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT)
        .to_string();

    let mut keys = list_person_keys(&ctx.paths)?;
    if let Some(wanted) = opts.person.as_deref() {
        keys.retain(|k| k == wanted);
        if keys.is_empty() {
            ctx.diagnostics
                .warn(format!("no downloaded person matches key `{wanted}`"));
        }
    }

    let mut summary = AnalysisSummary::default();
    let mut results = AnalysisResults::default();
    for key in keys {
        summary.persons += 1;
        if let Err(err) =
            analyze_person(ctx, analyzer, &key, opts, &prompt, &mut results, &mut summary)
        {
            summary.persons_failed += 1;
            ctx.diagnostics
                .error(format!("error analyzing person '{key}': {err:#}"));
        }
    }

    ctx.diagnostics.info("analysis pass completed");
    Ok((summary, results))
}
