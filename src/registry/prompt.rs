use serde_json::{Value, json};

pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Tu analyses le sommaire d'une déclaration des intérêts personnels d'un membre de l'Assemblée nationale du Québec.
Extrais toutes les informations financières du document et réponds uniquement avec un bloc ```json contenant un objet de la forme suivante :
{
  "declarant": "nom complet du déclarant",
  "declaration_year": "année ou période couverte",
  "positions": ["fonctions occupées"],
  "real_estate": [{"description": "...", "location": "...", "use": "..."}],
  "business_interests": [{"entity": "...", "nature": "...", "share": "..."}],
  "financial_holdings": [{"issuer": "...", "type": "..."}],
  "liabilities": [{"creditor": "...", "nature": "..."}],
  "income_sources": [{"source": "...", "nature": "..."}],
  "other_interests": ["autres intérêts, dons ou avantages déclarés"]
}
Utilise une liste vide lorsqu'une section ne contient rien. N'invente aucune donnée."#;

pub const COMPARE_SUFFIX: &str = r#"

Plusieurs déclarations de la même personne sont jointes, de la plus récente à la plus ancienne.
Produis l'objet ci-dessus pour la déclaration la plus récente et ajoute une clé "changes" : une liste
d'objets {"section": "...", "change": "ajout | retrait | modification", "details": "..."} décrivant
l'évolution des intérêts d'une déclaration à l'autre."#;

pub fn compare_prompt(base: &str) -> String {
    format!("{base}{COMPARE_SUFFIX}")
}

/// Shape returned when the model's answer holds no parseable object.
pub fn fallback_template(raw: &str) -> Value {
    json!({
        "declarant": null,
        "declaration_year": null,
        "positions": [],
        "real_estate": [],
        "business_interests": [],
        "financial_holdings": [],
        "liabilities": [],
        "income_sources": [],
        "other_interests": [],
        "full_text": raw,
    })
}
