use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub year_label: String,
    pub source_url: String,
}

impl Document {
    /// Storage key. Same id and year always land in the same file.
    pub fn filename(&self) -> String {
        format!("document_{}_{}.pdf", self.id, self.year_label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub key: String,
    pub documents: Vec<Document>,
}

impl Person {
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        let name = name.into();
        let key = sanitize_name(&name);
        Self {
            name,
            key,
            documents,
        }
    }
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}(?:-\d{4})?").expect("static regex"))
}

/// Folder-safe key for a displayed name: parentheses dropped, whitespace runs
/// collapsed, spaces turned into underscores. Accents are kept.
pub fn sanitize_name(name: &str) -> String {
    let without_parens: String = name.chars().filter(|c| *c != '(' && *c != ')').collect();
    whitespace_re()
        .replace_all(&without_parens, " ")
        .replace(' ', "_")
}

pub fn extract_year(text: &str) -> String {
    year_re()
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Document, Person, extract_year, sanitize_name};

    #[test]
    fn sanitize_strips_parens_and_collapses_spaces() {
        assert_eq!(sanitize_name("Jean (Dupont)  Tremblay"), "Jean_Dupont_Tremblay");
    }

    #[test]
    fn sanitize_keeps_accents_and_hyphens() {
        assert_eq!(sanitize_name("Hélène Lévesque-Côté"), "Hélène_Lévesque-Côté");
        assert_eq!(sanitize_name("Marc\t\nBoucher"), "Marc_Boucher");
    }

    #[test]
    fn year_extraction_handles_ranges_singles_and_missing() {
        assert_eq!(extract_year("2021-2022"), "2021-2022");
        assert_eq!(extract_year("Declaration 2020"), "2020");
        assert_eq!(extract_year("Sommaire annuel"), "unknown");
        assert_eq!(extract_year("Sommaire 2019-2020 (mis à jour)"), "2019-2020");
    }

    #[test]
    fn filename_is_derived_from_id_and_year() {
        let doc = Document {
            id: "842".to_string(),
            year_label: "2021-2022".to_string(),
            source_url: "https://example.test/a.pdf".to_string(),
        };
        assert_eq!(doc.filename(), "document_842_2021-2022.pdf");

        let moved = Document {
            source_url: "https://mirror.test/other.pdf".to_string(),
            ..doc.clone()
        };
        assert_eq!(moved.filename(), doc.filename());
    }

    #[test]
    fn person_key_is_stable() {
        let a = Person::new("Sonia (LeBel)", Vec::new());
        let b = Person::new("Sonia (LeBel)", Vec::new());
        assert_eq!(a.key, "Sonia_LeBel");
        assert_eq!(a.key, b.key);
    }
}
