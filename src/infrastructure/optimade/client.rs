#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::collections::HashMap;
use std::time::Duration;

use nalgebra::Vector3;
use serde_derive::Deserialize;
use serde_json::Value;

use super::Database;
use super::QueryError;
use crate::domain::models::Lattice;
use crate::domain::models::Site;
use crate::domain::models::Structure;
use crate::domain::services::QueryKind;
use crate::domain::services::StructureQuery;

/// Upper bound on structures collected across result pages.
pub const MAX_STRUCTURES: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Default, Debug, Clone, Deserialize)]
struct Species {
    name: String,
    #[serde(default)]
    chemical_symbols: Vec<String>,
}

#[derive(Default, Debug, Clone, Deserialize)]
struct Attributes {
    #[serde(default)]
    elements: Vec<String>,
    #[serde(default)]
    chemical_formula_reduced: Option<String>,
    #[serde(default)]
    space_group_symbol_hermann_mauguin: Option<String>,
    #[serde(default)]
    lattice_vectors: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    cartesian_site_positions: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    species_at_sites: Option<Vec<String>>,
    #[serde(default)]
    species: Option<Vec<Species>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Default, Debug, Clone, Deserialize)]
struct Links {
    #[serde(default)]
    next: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct StructuresResponse {
    #[serde(default)]
    data: Vec<Entry>,
    #[serde(default)]
    links: Links,
}

// `links.next` is either a URL string or a link object with an `href`.
fn next_link(links: &Links) -> Option<String> {
    match &links.next {
        Value::String(url) if !url.is_empty() => return Some(url.to_string()),
        Value::Object(obj) => {
            return obj
                .get("href")
                .and_then(|href| return href.as_str())
                .map(|href| return href.to_string());
        }
        _ => return None,
    }
}

fn to_vector(values: &[Option<f64>]) -> Option<Vector3<f64>> {
    if values.len() != 3 {
        return None;
    }

    return Some(Vector3::new(values[0]?, values[1]?, values[2]?));
}

fn to_structure(entry: Entry, database: Database) -> Structure {
    let attrs = entry.attributes;

    let lattice = attrs.lattice_vectors.as_ref().and_then(|vectors| {
        if vectors.len() != 3 {
            return None;
        }
        let rows = vectors
            .iter()
            .map(|row| return to_vector(row))
            .collect::<Option<Vec<Vector3<f64>>>>()?;
        let res = Lattice::from_vectors([
            [rows[0].x, rows[0].y, rows[0].z],
            [rows[1].x, rows[1].y, rows[1].z],
            [rows[2].x, rows[2].y, rows[2].z],
        ]);
        if let Err(err) = &res {
            tracing::debug!(id = %entry.id, err = ?err, "Skipping invalid lattice");
        }
        return res.ok();
    });

    let symbols: HashMap<String, String> = attrs
        .species
        .unwrap_or_default()
        .into_iter()
        .filter(|species| return species.chemical_symbols.len() == 1)
        .map(|species| return (species.name, species.chemical_symbols[0].to_string()))
        .collect();

    let mut sites = vec![];
    if let (Some(positions), Some(species)) =
        (attrs.cartesian_site_positions, attrs.species_at_sites)
    {
        for (position, name) in positions.iter().zip(species.iter()) {
            if let Some(cartesian) = to_vector(position) {
                sites.push(Site {
                    element: symbols.get(name).unwrap_or(name).to_string(),
                    cartesian,
                });
            }
        }
    }

    return Structure {
        id: entry.id,
        database: database.to_string(),
        elements: attrs.elements,
        lattice,
        sites,
        reported_formula: attrs.chemical_formula_reduced,
        reported_space_group: attrs.space_group_symbol_hermann_mauguin,
    };
}

pub struct OptimadeClient {
    database: Database,
    url: String,
}

impl OptimadeClient {
    pub fn new(database: Database) -> OptimadeClient {
        return OptimadeClient {
            database,
            url: database.endpoint().to_string(),
        };
    }

    /// Client for a database served from a non-default endpoint.
    pub fn with_endpoint(database: Database, url: &str) -> OptimadeClient {
        return OptimadeClient {
            database,
            url: url.to_string(),
        };
    }

    /// Resolves the query to a filter, rejecting combinations the database
    /// cannot serve.
    pub fn filter_for(&self, query: &StructureQuery) -> Result<String, QueryError> {
        let kind = query.kind().ok_or(QueryError::MissingQuery)?;
        if let QueryKind::Formula(_) = kind {
            if !self.database.supports_formula_search() {
                return Err(QueryError::FormulaUnsupported);
            }
        }

        return Ok(kind.filter());
    }

    async fn fetch_page(
        &self,
        client: &reqwest::Client,
        req: reqwest::RequestBuilder,
    ) -> Result<StructuresResponse, QueryError> {
        let req = req.timeout(REQUEST_TIMEOUT).build()?;
        let url = req.url().to_string();
        let res = client.execute(req).await?;

        if !res.status().is_success() {
            tracing::error!(url = %url, status = res.status().as_u16(), "OPTIMADE request failed");
            return Err(QueryError::Status {
                url,
                status: res.status().as_u16(),
            });
        }

        return Ok(res.json::<StructuresResponse>().await?);
    }

    /// Fetches structures matching the query, following pagination links
    /// until [`MAX_STRUCTURES`] entries are collected.
    pub async fn search(&self, query: &StructureQuery) -> Result<Vec<Structure>, QueryError> {
        let filter = self.filter_for(query)?;
        tracing::info!(database = %self.database, filter = %filter, "Querying OPTIMADE");

        let client = reqwest::Client::new();
        let mut page = self
            .fetch_page(
                &client,
                client
                    .get(format!("{}/v1/structures", self.url.trim_end_matches('/')))
                    .query(&[("filter", filter.as_str())]),
            )
            .await?;

        let mut structures = vec![];
        loop {
            for entry in page.data.into_iter() {
                if structures.len() >= MAX_STRUCTURES {
                    break;
                }
                structures.push(to_structure(entry, self.database));
            }

            let next = match next_link(&page.links) {
                Some(next) if structures.len() < MAX_STRUCTURES => next,
                _ => break,
            };
            page = self.fetch_page(&client, client.get(next)).await?;
        }

        if structures.is_empty() {
            return Err(QueryError::NoStructures {
                filter,
                database: self.database.to_string(),
            });
        }

        tracing::info!(count = structures.len(), "OPTIMADE query complete");
        return Ok(structures);
    }
}
