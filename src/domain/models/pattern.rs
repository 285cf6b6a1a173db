#[cfg(test)]
#[path = "pattern_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

fn parse_row(line: &str, line_no: usize, columns: usize) -> Result<Vec<f64>> {
    let values = line
        .split_whitespace()
        .map(|val| {
            return val
                .parse::<f64>()
                .with_context(|| return format!("line {line_no}: '{val}' is not a number"));
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() < columns {
        bail!(format!(
            "line {line_no}: expected {columns} columns, found {}",
            values.len()
        ));
    }

    return Ok(values);
}

/// Observed and calculated intensities sampled on a common 2θ grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffractionPattern {
    pub two_theta: Vec<f64>,
    pub observed: Vec<f64>,
    pub calculated: Vec<f64>,
}

impl DiffractionPattern {
    /// Parses a headerless whitespace-delimited `x yobs ycalc` table.
    pub fn parse(text: &str) -> Result<DiffractionPattern> {
        let mut pattern = DiffractionPattern::default();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = parse_row(line, idx + 1, 3)?;
            pattern.two_theta.push(row[0]);
            pattern.observed.push(row[1]);
            pattern.calculated.push(row[2]);
        }

        if pattern.is_empty() {
            bail!("Refinement output table contains no data");
        }

        return Ok(pattern);
    }

    pub fn len(&self) -> usize {
        return self.two_theta.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.two_theta.is_empty();
    }

    pub fn residual(&self, idx: usize) -> f64 {
        return self.observed[idx] - self.calculated[idx];
    }

    pub fn x_bounds(&self) -> (f64, f64) {
        return min_max(self.two_theta.iter().copied());
    }

    /// Index of the sample closest to the given angle.
    pub fn nearest_index(&self, two_theta: f64) -> usize {
        let mut best = 0;
        for (idx, x) in self.two_theta.iter().enumerate() {
            if (x - two_theta).abs() < (self.two_theta[best] - two_theta).abs() {
                best = idx;
            }
        }

        return best;
    }

    pub fn indices_within(&self, lo: f64, hi: f64) -> Vec<usize> {
        return self
            .two_theta
            .iter()
            .enumerate()
            .filter(|(_, x)| return **x >= lo && **x <= hi)
            .map(|(idx, _)| return idx)
            .collect();
    }

    pub fn argmax_observed(&self) -> usize {
        return argmax(self.observed.iter().copied());
    }

    pub fn argmax_abs_residual(&self) -> usize {
        return argmax((0..self.len()).map(|idx| return self.residual(idx).abs()));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reflection {
    pub h: i64,
    pub k: i64,
    pub l: i64,
    pub multiplicity: f64,
    pub d_spacing: f64,
    pub two_theta: f64,
    pub intensity: f64,
}

impl Reflection {
    pub fn miller_label(&self) -> String {
        return format!("({},{},{})", self.h, self.k, self.l);
    }
}

/// Reflection list sorted by 2θ.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReflectionTable {
    pub reflections: Vec<Reflection>,
}

impl ReflectionTable {
    /// Parses a headerless `h k l M d 2θ I` table. Lines starting with `#` are
    /// comments.
    pub fn parse(text: &str) -> Result<ReflectionTable> {
        let mut reflections = vec![];
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let row = parse_row(trimmed, idx + 1, 7)?;
            reflections.push(Reflection {
                h: row[0] as i64,
                k: row[1] as i64,
                l: row[2] as i64,
                multiplicity: row[3],
                d_spacing: row[4],
                two_theta: row[5],
                intensity: row[6],
            });
        }

        reflections.sort_by(|a, b| return a.two_theta.total_cmp(&b.two_theta));

        return Ok(ReflectionTable { reflections });
    }

    /// Intensities scaled so the strongest reflection is 1.
    pub fn normalized_intensities(&self) -> Vec<f64> {
        let max = self
            .reflections
            .iter()
            .map(|r| return r.intensity)
            .fold(f64::NEG_INFINITY, f64::max);

        return self
            .reflections
            .iter()
            .map(|r| {
                if max > 0.0 {
                    return r.intensity / max;
                }
                return 0.0;
            })
            .collect();
    }
}

pub fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    return values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), val| {
        return (lo.min(val), hi.max(val));
    });
}

fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (idx, val) in values.enumerate() {
        if val > best {
            best = val;
            best_idx = idx;
        }
    }

    return best_idx;
}
