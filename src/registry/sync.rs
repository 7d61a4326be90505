use crate::registry::manifest::PersonManifest;
use crate::registry::model::Document;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Fetch,
    OnDisk,
    InManifest,
}

impl SyncDecision {
    pub fn is_satisfied(self) -> bool {
        !matches!(self, SyncDecision::Fetch)
    }
}

#[derive(Debug, Clone)]
pub struct PlannedDocument {
    pub document: Document,
    pub decision: SyncDecision,
}

/// The listing's first document is the latest one.
pub fn select_documents(documents: &[Document], latest_only: bool) -> &[Document] {
    if latest_only {
        &documents[..documents.len().min(1)]
    } else {
        documents
    }
}

pub fn plan_person(
    person_dir: &Path,
    manifest: Option<&PersonManifest>,
    documents: &[Document],
    skip_existing: bool,
) -> Vec<PlannedDocument> {
    documents
        .iter()
        .map(|document| {
            let filename = document.filename();
            let decision = if !skip_existing {
                SyncDecision::Fetch
            } else if manifest.is_some_and(|m| m.contains(&filename)) {
                SyncDecision::InManifest
            } else if person_dir.join(&filename).exists() {
                SyncDecision::OnDisk
            } else {
                SyncDecision::Fetch
            };
            PlannedDocument {
                document: document.clone(),
                decision,
            }
        })
        .collect()
}

/// Filenames confirmed this pass plus earlier ones still listed, in listing order.
pub fn merge_manifest(
    name: &str,
    previous: Option<&PersonManifest>,
    listing: &[Document],
    confirmed: &BTreeSet<String>,
) -> PersonManifest {
    let mut documents = Vec::new();
    for document in listing {
        let filename = document.filename();
        if documents.contains(&filename) {
            continue;
        }
        if confirmed.contains(&filename) || previous.is_some_and(|m| m.contains(&filename)) {
            documents.push(filename);
        }
    }
    PersonManifest {
        name: name.to_string(),
        documents,
    }
}
