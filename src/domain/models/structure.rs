#[cfg(test)]
#[path = "structure_test.rs"]
mod tests;

use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Result;
use nalgebra::Matrix3;
use nalgebra::Vector3;

/// Unit cell with the lattice vectors stored as matrix columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Lattice {
    pub matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

/// Cell lengths in Å and angles in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Lattice {
    pub fn from_vectors(vectors: [[f64; 3]; 3]) -> Result<Lattice> {
        let matrix = Matrix3::from_columns(&[
            Vector3::from(vectors[0]),
            Vector3::from(vectors[1]),
            Vector3::from(vectors[2]),
        ]);
        if matrix.determinant().abs() < 1e-6 {
            bail!("Lattice has zero or near-zero volume");
        }

        let inverse = match matrix.try_inverse() {
            Some(inverse) => inverse,
            None => bail!("Lattice is not invertible"),
        };

        return Ok(Lattice { matrix, inverse });
    }

    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        return self.inverse * cart;
    }

    pub fn volume(&self) -> f64 {
        return self.matrix.determinant().abs();
    }

    pub fn parameters(&self) -> LatticeParameters {
        let va = self.matrix.column(0);
        let vb = self.matrix.column(1);
        let vc = self.matrix.column(2);
        let a = va.norm();
        let b = vb.norm();
        let c = vc.norm();

        return LatticeParameters {
            a,
            b,
            c,
            alpha: (vb.dot(&vc) / (b * c)).acos().to_degrees(),
            beta: (va.dot(&vc) / (a * c)).acos().to_degrees(),
            gamma: (va.dot(&vb) / (a * b)).acos().to_degrees(),
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    pub element: String,
    pub cartesian: Vector3<f64>,
}

/// A structure entry fetched from a materials database.
#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
    pub id: String,
    pub database: String,
    pub elements: Vec<String>,
    pub lattice: Option<Lattice>,
    pub sites: Vec<Site>,
    pub reported_formula: Option<String>,
    pub reported_space_group: Option<String>,
}

impl Structure {
    /// Identifier qualified by database, e.g. `cod-1000041`. Identifiers that
    /// already carry the prefix (`mp-149`) are kept as they are.
    pub fn qualified_id(&self) -> String {
        if self.id.starts_with(&format!("{}-", self.database)) {
            return self.id.to_string();
        }

        return format!("{}-{}", self.database, self.id);
    }

    pub fn cif_file_name(&self) -> String {
        return format!("{}.cif", self.qualified_id());
    }

    fn site_counts(&self) -> BTreeMap<&str, u64> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for site in self.sites.iter() {
            *counts.entry(site.element.as_str()).or_insert(0) += 1;
        }

        return counts;
    }

    /// Reduced formula computed from the site list, falling back to the
    /// formula reported by the database when no sites are available.
    pub fn reduced_formula(&self) -> String {
        if self.sites.is_empty() {
            return self.reported_formula.clone().unwrap_or_default();
        }

        let counts = self.site_counts();
        let divisor = counts.values().fold(0, |acc, count| return gcd(acc, *count));

        return counts
            .iter()
            .map(|(element, count)| {
                let reduced = count / divisor.max(1);
                if reduced == 1 {
                    return element.to_string();
                }
                return format!("{element}{reduced}");
            })
            .collect::<Vec<String>>()
            .join("");
    }

    /// Element counts of the whole cell in CIF notation, e.g. `Cl4 Na4`.
    pub fn cell_formula(&self) -> String {
        if self.sites.is_empty() {
            return self.reported_formula.clone().unwrap_or_default();
        }

        return self
            .site_counts()
            .iter()
            .map(|(element, count)| {
                if *count == 1 {
                    return element.to_string();
                }
                return format!("{element}{count}");
            })
            .collect::<Vec<String>>()
            .join(" ");
    }

    pub fn space_group(&self) -> Option<&str> {
        return self.reported_space_group.as_deref();
    }

    pub fn fractional_sites(&self) -> Vec<(String, Vector3<f64>)> {
        let lattice = match &self.lattice {
            Some(lattice) => lattice,
            None => return vec![],
        };

        return self
            .sites
            .iter()
            .map(|site| {
                return (site.element.to_string(), lattice.to_fractional(&site.cartesian));
            })
            .collect();
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        return a;
    }

    return gcd(b, a % b);
}
