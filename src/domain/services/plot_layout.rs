#[cfg(test)]
#[path = "plot_layout_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;

use crate::domain::models::min_max;
use crate::domain::models::DiffractionPattern;
use crate::domain::models::ReflectionTable;

/// Half width in degrees of the peak and residual zoom windows.
pub const ZOOM_HALF_WIDTH: f64 = 3.0;

const AUTO_MARGIN: f64 = 0.05;
const TICK_BASE: f64 = 0.0005;
const TICK_HEIGHT: f64 = 0.1;
const LABEL_OFFSET: f64 = 0.05;
const LABEL_HEADROOM: f64 = 0.1;
const LABEL_MIN_SPACING: f64 = 0.02;
const WINDOW_HEADROOM: f64 = 1.1;

/// A region of the pattern to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelSpec {
    pub title: String,
    pub x_range: Option<(f64, f64)>,
}

impl PanelSpec {
    pub fn full(title: &str) -> PanelSpec {
        return PanelSpec {
            title: title.to_string(),
            x_range: None,
        };
    }

    pub fn window(title: &str, lo: f64, hi: f64) -> PanelSpec {
        return PanelSpec {
            title: title.to_string(),
            x_range: Some((lo, hi)),
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReflectionTick {
    pub two_theta: f64,
    pub bottom: f64,
    pub top: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickLabel {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Everything needed to draw one main axis and its residual axis.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelLayout {
    pub title: String,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub residual_range: (f64, f64),
    pub indices: Vec<usize>,
    pub ticks: Vec<ReflectionTick>,
    pub labels: Vec<TickLabel>,
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let span = hi - lo;
    if span <= 0.0 || !span.is_finite() {
        let pad = if lo.abs() > 0.0 { lo.abs() * AUTO_MARGIN } else { 1.0 };
        return (lo - pad, hi + pad);
    }

    return (lo - span * AUTO_MARGIN, hi + span * AUTO_MARGIN);
}

/// Four automatically chosen regions: the full pattern, the strongest
/// observed peak, the largest absolute residual and the top third of the
/// angle range.
pub fn regions_of_interest(pattern: &DiffractionPattern) -> Vec<PanelSpec> {
    let (x_min, x_max) = pattern.x_bounds();
    // A pattern sampled at a single angle has no width to zoom into.
    let widen = |lo: f64, hi: f64| -> (f64, f64) {
        if hi > lo {
            return (lo, hi);
        }
        return padded(x_min, x_max);
    };
    let clamp = |center: f64| -> (f64, f64) {
        return widen(
            (center - ZOOM_HALF_WIDTH).max(x_min),
            (center + ZOOM_HALF_WIDTH).min(x_max),
        );
    };

    let peak = pattern.two_theta[pattern.argmax_observed()];
    let (peak_lo, peak_hi) = clamp(peak);

    let residual = pattern.two_theta[pattern.argmax_abs_residual()];
    let (residual_lo, residual_hi) = clamp(residual);

    let high_lo = x_max - (x_max - x_min) / 3.0;
    let (high_window_lo, high_window_hi) = widen(high_lo, x_max);

    return vec![
        PanelSpec::full("Full range"),
        PanelSpec::window(&format!("Max peak at 2θ = {peak:.2}°"), peak_lo, peak_hi),
        PanelSpec::window(
            &format!("Max residual at 2θ = {residual:.2}°"),
            residual_lo,
            residual_hi,
        ),
        PanelSpec::window(
            &format!("High angle {high_lo:.2}-{x_max:.2}°"),
            high_window_lo,
            high_window_hi,
        ),
    ];
}

pub fn layout_panel(
    pattern: &DiffractionPattern,
    reflections: Option<&ReflectionTable>,
    spec: &PanelSpec,
) -> Result<PanelLayout> {
    if pattern.is_empty() {
        bail!("Cannot plot an empty pattern");
    }

    let (x_range, indices) = match spec.x_range {
        Some((lo, hi)) => {
            if lo >= hi {
                bail!(format!("Invalid x range {lo}..{hi}: lower bound must be below upper bound"));
            }
            let indices = pattern.indices_within(lo, hi);
            if indices.is_empty() {
                bail!(format!("No data points within x range {lo}..{hi}"));
            }
            ((lo, hi), indices)
        }
        None => {
            let (lo, hi) = pattern.x_bounds();
            let x_range = if hi > lo { (lo, hi) } else { padded(lo, hi) };
            (x_range, (0..pattern.len()).collect::<Vec<usize>>())
        }
    };

    let intensities = indices
        .iter()
        .flat_map(|idx| return [pattern.observed[*idx], pattern.calculated[*idx]]);
    let (y_lo, y_hi) = min_max(intensities);

    let mut y_range = match spec.x_range {
        Some(_) => (0.0, y_hi * WINDOW_HEADROOM),
        None => padded(y_lo, y_hi),
    };
    let span = y_range.1 - y_range.0;

    let mut ticks = vec![];
    let mut labels: Vec<TickLabel> = vec![];
    if let Some(table) = reflections {
        let tick_base = y_range.0 + TICK_BASE * span;
        let min_label_dx = LABEL_MIN_SPACING * (x_range.1 - x_range.0);
        let mut last_label_x: Option<f64> = None;

        for (reflection, intensity) in table
            .reflections
            .iter()
            .zip(table.normalized_intensities())
        {
            let tt = reflection.two_theta;
            if tt < x_range.0 || tt > x_range.1 {
                continue;
            }

            ticks.push(ReflectionTick {
                two_theta: tt,
                bottom: tick_base,
                top: tick_base + intensity * TICK_HEIGHT * span,
            });

            let label_x = match last_label_x {
                Some(last) if tt - last < min_label_dx => last + min_label_dx,
                _ => tt,
            };
            let nearest = pattern.nearest_index(tt);
            let y_peak = pattern.observed[nearest].max(pattern.calculated[nearest]);
            labels.push(TickLabel {
                x: label_x,
                y: y_peak + LABEL_OFFSET * span,
                text: reflection.miller_label(),
            });
            last_label_x = Some(label_x);
        }

        let max_label_y = labels
            .iter()
            .map(|label| return label.y)
            .fold(f64::NEG_INFINITY, f64::max);
        if spec.x_range.is_none() && !labels.is_empty() {
            y_range.1 = y_range.1.max(max_label_y + LABEL_HEADROOM * span);
        }
    }

    let residuals = indices.iter().map(|idx| return pattern.residual(*idx));
    let (r_lo, r_hi) = min_max(residuals.chain([0.0]));

    return Ok(PanelLayout {
        title: spec.title.to_string(),
        x_range,
        y_range,
        residual_range: padded(r_lo, r_hi),
        indices,
        ticks,
        labels,
    });
}
