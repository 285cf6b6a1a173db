#[cfg(test)]
#[path = "optimade_filter_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_derive::Deserialize;
use serde_derive::Serialize;

static FORMULA_TOKEN: Lazy<Regex> =
    Lazy::new(|| return Regex::new(r"([A-Z][a-z]?)(\d*)").unwrap());

/// What a structure search is based on. Exactly one source is used: a raw
/// filter wins over elements, which win over a formula.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureQuery {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub elements: Option<Vec<String>>,
    #[serde(default)]
    pub formula: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Raw(String),
    Elements(Vec<String>),
    Formula(String),
}

impl StructureQuery {
    pub fn kind(&self) -> Option<QueryKind> {
        if let Some(filter) = self.filter.as_ref().filter(|f| return !f.trim().is_empty()) {
            return Some(QueryKind::Raw(filter.to_string()));
        }

        if let Some(elements) = self.elements.as_ref().filter(|e| return !e.is_empty()) {
            return Some(QueryKind::Elements(elements.clone()));
        }

        if let Some(formula) = self.formula.as_ref().filter(|f| return !f.trim().is_empty()) {
            return Some(QueryKind::Formula(formula.trim().to_string()));
        }

        return None;
    }
}

impl QueryKind {
    pub fn filter(&self) -> String {
        match self {
            QueryKind::Raw(filter) => return filter.to_string(),
            QueryKind::Elements(elements) => return create_elements_filter(elements),
            QueryKind::Formula(formula) => return create_formula_filter(formula),
        }
    }
}

/// Filter matching structures made of exactly the given elements.
pub fn create_elements_filter(elements: &[String]) -> String {
    let quoted = elements
        .iter()
        .map(|el| return format!("\"{el}\""))
        .collect::<Vec<String>>();

    if quoted.len() > 1 {
        return format!(
            "elements HAS ALL {} AND elements LENGTH {}",
            quoted.join(","),
            quoted.len()
        );
    }

    return format!(
        "elements HAS {} AND elements LENGTH 1",
        quoted.first().cloned().unwrap_or_default()
    );
}

/// Canonical reduced formula: element symbols sorted alphabetically, unit
/// counts omitted. `NaCoO2` and `Na1Co1O2` both become `CoNaO2`.
pub fn sanitize_formula(formula: &str) -> String {
    let mut pairs = FORMULA_TOKEN
        .captures_iter(formula)
        .map(|cap| {
            let element = cap[1].to_string();
            let count = match &cap[2] {
                "" | "1" => "".to_string(),
                count => count.to_string(),
            };
            return (element, count);
        })
        .collect::<Vec<(String, String)>>();

    pairs.sort_by(|a, b| return a.0.cmp(&b.0));

    return pairs
        .into_iter()
        .map(|(element, count)| return format!("{element}{count}"))
        .collect::<Vec<String>>()
        .join("");
}

pub fn create_formula_filter(formula: &str) -> String {
    return format!("chemical_formula_reduced=\"{}\"", sanitize_formula(formula));
}
