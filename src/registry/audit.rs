use crate::registry::util::now_epoch_secs;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at: String,
    pub at_epoch_secs: u64,
    pub phase: String,
    pub level: String,
    pub message: String,
}

pub fn append_event(log_path: &Path, phase: &str, level: &str, message: &str) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let event = AuditEvent {
        at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        at_epoch_secs: now_epoch_secs()?,
        phase: phase.to_string(),
        level: level.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
