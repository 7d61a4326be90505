//! Parsing of the registry listing: letter categories holding person items,
//! each person item holding a nested list of declaration links.

use crate::registry::context::Diagnostics;
use crate::registry::model::{Document, Person, UNKNOWN, extract_year};
use crate::registry::util::truncate_with_ellipsis;
use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

const CONTAINER_SELECTOR: &str = "div.texte_contenuStructure";
const PERSON_SELECTOR: &str = "div.texte_contenuStructure > div > ul > li > ul > li";
const CATEGORY_SELECTOR: &str = "div.texte_contenuStructure > div > ul > li";
const FALLBACK_PERSON_SELECTOR: &str = "ul > li > ul > li";
const DOCUMENT_ID_ATTR: &str = "data-id-document";
const DEBUG_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub persons: Vec<Person>,
    pub used_fallback: bool,
    pub skipped_empty: usize,
    /// Markup of each listing container, captured only when the fallback ran.
    pub container_fragments: Vec<String>,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn trimmed_text(element: &ElementRef<'_>) -> String {
    element.text().map(str::trim).collect::<String>()
}

/// Text before the first nested list: bare text nodes plus `span`/`br` children.
fn reconstruct_name(item: &ElementRef<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();
    for child in item.children() {
        match child.value() {
            Node::Element(el) if el.name() == "ul" => break,
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(el) if matches!(el.name(), "span" | "br") => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let text = trimmed_text(&child_el);
                    if !text.is_empty() {
                        parts.push(text);
                    }
                }
            }
            _ => {}
        }
    }
    parts.join(" ").trim().to_string()
}

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

fn parse_documents(
    item: &ElementRef<'_>,
    name: &str,
    base: Option<&Url>,
    diag: &mut Diagnostics,
) -> Vec<Document> {
    let Some(sub_list) = item.select(&selector("ul")).next() else {
        return Vec::new();
    };

    let mut documents = Vec::new();
    for anchor in sub_list.select(&selector("a")) {
        let Some(href) = anchor.value().attr("href").filter(|h| !h.trim().is_empty()) else {
            diag.warn(format!("no href found in link for {name}"));
            continue;
        };
        let id = anchor
            .value()
            .attr(DOCUMENT_ID_ATTR)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();
        documents.push(Document {
            id,
            year_label: extract_year(&trimmed_text(&anchor)),
            source_url: resolve_href(base, href),
        });
    }
    documents
}

pub fn extract_persons(html: &str, base_url: &str, diag: &mut Diagnostics) -> Extraction {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let containers: Vec<ElementRef<'_>> = document.select(&selector(CONTAINER_SELECTOR)).collect();
    let categories = document.select(&selector(CATEGORY_SELECTOR)).count();
    tracing::debug!(
        containers = containers.len(),
        categories,
        "listing structure analysed"
    );

    let mut items: Vec<ElementRef<'_>> = document.select(&selector(PERSON_SELECTOR)).collect();
    let mut out = Extraction::default();
    diag.info(format!("found {} persons to process", items.len()));

    if items.is_empty() {
        out.used_fallback = true;
        out.container_fragments = containers.iter().map(|c| c.html()).collect();
        items = document
            .select(&selector(FALLBACK_PERSON_SELECTOR))
            .collect();
        diag.warn(format!(
            "primary person selector matched nothing; fallback selector `{FALLBACK_PERSON_SELECTOR}` found {} items",
            items.len()
        ));
    }

    for item in items {
        tracing::debug!(
            snippet = %truncate_with_ellipsis(&item.html(), DEBUG_SNIPPET_CHARS),
            "processing person element"
        );
        let name = reconstruct_name(&item);
        if name.is_empty() {
            diag.warn("empty name found, skipping this entry");
            out.skipped_empty += 1;
            continue;
        }
        let documents = parse_documents(&item, &name, base.as_ref(), diag);
        out.persons.push(Person::new(name, documents));
    }

    out
}
