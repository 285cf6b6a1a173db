#[cfg(test)]
#[path = "export_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use serde_derive::Serialize;
use tokio::fs;

use crate::domain::models::Structure;
use crate::domain::services::to_cif;

/// What a structure search reports back for each hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    pub id: String,
    pub formula: String,
    pub space_group: String,
    pub cif_path: Option<String>,
    #[serde(skip)]
    pub cif: Option<String>,
}

pub fn summary_table(structures: &[Structure]) -> String {
    let mut lines = vec![format!(
        "{:<24} {:<16} {:<14} {:>5}",
        "ID", "FORMULA", "SPACE GROUP", "SITES"
    )];
    for structure in structures {
        lines.push(format!(
            "{:<24} {:<16} {:<14} {:>5}",
            structure.qualified_id(),
            structure.reduced_formula(),
            structure.space_group().unwrap_or("unknown"),
            structure.sites.len()
        ));
    }

    return lines.join("\n");
}

/// Writes one CIF per structure into `dir`. Structures without a usable
/// lattice are reported without a file.
pub async fn write_cifs(structures: &[Structure], dir: &path::Path) -> Result<Vec<StructureSummary>> {
    fs::create_dir_all(dir).await?;

    let mut summaries = vec![];
    for structure in structures {
        let (cif, cif_path) = match to_cif(structure) {
            Ok(cif) => {
                let cif_path = dir.join(structure.cif_file_name());
                fs::write(&cif_path, &cif).await?;
                (Some(cif), Some(cif_path.to_string_lossy().to_string()))
            }
            Err(err) => {
                tracing::warn!(id = %structure.qualified_id(), err = ?err, "Cannot write CIF");
                (None, None)
            }
        };

        summaries.push(StructureSummary {
            id: structure.qualified_id(),
            formula: structure.reduced_formula(),
            space_group: structure.space_group().unwrap_or("unknown").to_string(),
            cif_path,
            cif,
        });
    }

    return Ok(summaries);
}
