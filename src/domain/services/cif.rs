#[cfg(test)]
#[path = "cif_test.rs"]
mod tests;

use std::collections::HashMap;

use anyhow::bail;
use anyhow::Result;

use crate::domain::models::Structure;

/// Renders a structure as a P1 CIF listing every site of the cell. The space
/// group reported by the database is kept as a comment only.
pub fn to_cif(structure: &Structure) -> Result<String> {
    let lattice = match &structure.lattice {
        Some(lattice) => lattice,
        None => bail!(format!(
            "Structure {} has no lattice vectors and cannot be written as CIF",
            structure.qualified_id()
        )),
    };

    let params = lattice.parameters();
    let mut lines = vec![
        format!(
            "# Generated by guillemot from {} entry {}",
            structure.database, structure.id
        ),
    ];
    if let Some(space_group) = structure.space_group() {
        lines.push(format!("# Reported space group: {space_group}"));
    }

    lines.push(format!("data_{}", structure.qualified_id()));
    lines.push("".to_string());
    lines.push(format!("_chemical_formula_sum '{}'", structure.cell_formula()));
    lines.push(format!("_cell_length_a {:.6}", params.a));
    lines.push(format!("_cell_length_b {:.6}", params.b));
    lines.push(format!("_cell_length_c {:.6}", params.c));
    lines.push(format!("_cell_angle_alpha {:.6}", params.alpha));
    lines.push(format!("_cell_angle_beta {:.6}", params.beta));
    lines.push(format!("_cell_angle_gamma {:.6}", params.gamma));
    lines.push(format!("_cell_volume {:.6}", lattice.volume()));
    lines.push("_symmetry_space_group_name_H-M 'P 1'".to_string());
    lines.push("_symmetry_Int_Tables_number 1".to_string());
    lines.push("".to_string());
    lines.push("loop_".to_string());
    lines.push("_symmetry_equiv_pos_as_xyz".to_string());
    lines.push("'x, y, z'".to_string());
    lines.push("".to_string());
    lines.push("loop_".to_string());
    lines.push("_atom_site_type_symbol".to_string());
    lines.push("_atom_site_label".to_string());
    lines.push("_atom_site_occupancy".to_string());
    lines.push("_atom_site_fract_x".to_string());
    lines.push("_atom_site_fract_y".to_string());
    lines.push("_atom_site_fract_z".to_string());

    let mut label_counts: HashMap<String, usize> = HashMap::new();
    for (element, frac) in structure.fractional_sites() {
        let count = label_counts.entry(element.to_string()).or_insert(0);
        *count += 1;
        lines.push(format!(
            "{element} {element}{count} 1.0 {:.6} {:.6} {:.6}",
            frac.x, frac.y, frac.z
        ));
    }

    return Ok(lines.join("\n") + "\n");
}
