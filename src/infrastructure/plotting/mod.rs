#[cfg(test)]
#[path = "plotting_test.rs"]
mod tests;

use std::path;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use tokio::fs;
use tokio::task;

use crate::domain::models::DiffractionPattern;
use crate::domain::models::PlotResultsOutput;
use crate::domain::models::ReflectionTable;
use crate::domain::services::load_local_image;
use crate::domain::services::plot_layout::layout_panel;
use crate::domain::services::plot_layout::regions_of_interest;
use crate::domain::services::plot_layout::PanelLayout;
use crate::domain::services::plot_layout::PanelSpec;

const SINGLE_PANEL_SIZE: (u32, u32) = (1000, 750);
const PANEL_WIDTH: u32 = 700;
const PANEL_HEIGHT: u32 = 900;
const FONT: &str = "sans-serif";

fn plot_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    return anyhow!("Failed to render plot: {err}");
}

async fn load_inputs(
    output_file: &str,
    hkl_file: Option<&str>,
) -> Result<(DiffractionPattern, Option<ReflectionTable>)> {
    let text = fs::read_to_string(output_file)
        .await
        .with_context(|| return format!("Failed to read refinement output {output_file}"))?;
    let pattern = DiffractionPattern::parse(&text)
        .with_context(|| return format!("Failed to parse refinement output {output_file}"))?;

    let reflections = match hkl_file {
        Some(hkl_file) => {
            let text = fs::read_to_string(hkl_file)
                .await
                .with_context(|| return format!("Failed to read reflection list {hkl_file}"))?;
            Some(
                ReflectionTable::parse(&text)
                    .with_context(|| return format!("Failed to parse reflection list {hkl_file}"))?,
            )
        }
        None => None,
    };

    return Ok((pattern, reflections));
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    pattern: &DiffractionPattern,
    layout: &PanelLayout,
) -> Result<()> {
    let height = area.dim_in_pixel().1;
    let (upper, lower) = area.split_vertically(height * 3 / 4);
    let (x0, x1) = layout.x_range;
    let (y0, y1) = layout.y_range;

    let mut builder = ChartBuilder::on(&upper);
    builder
        .margin(10)
        .x_label_area_size(20)
        .y_label_area_size(60);
    if !layout.title.is_empty() {
        builder.caption(&layout.title, (FONT, 18));
    }
    let mut chart = builder
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .y_desc("Intensity")
        .draw()
        .map_err(plot_err)?;

    let visible = move || {
        return layout.indices.iter().map(move |idx| {
            return (
                pattern.two_theta[*idx],
                pattern.observed[*idx],
                pattern.calculated[*idx],
            );
        });
    };

    chart
        .draw_series(visible().map(|(x, obs, _)| return Circle::new((x, obs), 1, BLACK.filled())))
        .map_err(plot_err)?
        .label("Observed")
        .legend(|(x, y)| return Circle::new((x + 10, y), 2, BLACK.filled()));
    chart
        .draw_series(LineSeries::new(visible().map(|(x, _, calc)| return (x, calc)), &RED))
        .map_err(plot_err)?
        .label("Calculated")
        .legend(|(x, y)| return PathElement::new(vec![(x, y), (x + 20, y)], RED));

    if !layout.ticks.is_empty() {
        chart
            .draw_series(layout.ticks.iter().map(|tick| {
                return PathElement::new(
                    vec![(tick.two_theta, tick.bottom), (tick.two_theta, tick.top)],
                    BLUE,
                );
            }))
            .map_err(plot_err)?
            .label("hkl ticks")
            .legend(|(x, y)| return PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        let label_style = (FONT, 11)
            .into_font()
            .transform(FontTransform::Rotate270)
            .color(&BLUE);
        chart
            .draw_series(layout.labels.iter().map(|label| {
                return Text::new(label.text.to_string(), (label.x, label.y), label_style.clone());
            }))
            .map_err(plot_err)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    let (r0, r1) = layout.residual_range;
    let mut residual = ChartBuilder::on(&lower)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, r0..r1)
        .map_err(plot_err)?;
    residual
        .configure_mesh()
        .disable_mesh()
        .x_desc("2θ (°)")
        .y_desc("Obs-Calc")
        .draw()
        .map_err(plot_err)?;
    residual
        .draw_series(LineSeries::new(vec![(x0, 0.0), (x1, 0.0)], &BLACK.mix(0.4)))
        .map_err(plot_err)?;
    residual
        .draw_series(LineSeries::new(
            visible().map(|(x, obs, calc)| return (x, obs - calc)),
            &GREEN,
        ))
        .map_err(plot_err)?;

    return Ok(());
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    pattern: &DiffractionPattern,
    panels: &[PanelLayout],
) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;
    let columns = root.split_evenly((1, panels.len()));
    for (area, layout) in columns.iter().zip(panels.iter()) {
        draw_panel(area, pattern, layout)?;
    }
    root.present().map_err(plot_err)?;

    return Ok(());
}

/// Renders the panels side by side, each with a main axis above its residual
/// axis. `.svg` paths produce SVG, anything else PNG.
pub fn render(save_path: &path::Path, pattern: &DiffractionPattern, panels: &[PanelLayout]) -> Result<()> {
    let size = if panels.len() <= 1 {
        SINGLE_PANEL_SIZE
    } else {
        (PANEL_WIDTH * panels.len() as u32, PANEL_HEIGHT)
    };

    let is_svg = save_path
        .extension()
        .map(|ext| return ext.to_string_lossy().to_lowercase() == "svg")
        .unwrap_or(false);
    if is_svg {
        return draw(SVGBackend::new(save_path, size).into_drawing_area(), pattern, panels);
    }

    return draw(BitMapBackend::new(save_path, size).into_drawing_area(), pattern, panels);
}

async fn render_to_file(
    save_path: &str,
    pattern: DiffractionPattern,
    panels: Vec<PanelLayout>,
) -> Result<PlotResultsOutput> {
    let target = path::PathBuf::from(save_path);
    if let Some(parent) = target.parent().filter(|p| return !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    task::spawn_blocking(move || return render(&target, &pattern, &panels)).await??;
    tracing::info!(save_path, "Saved refinement plot");

    return Ok(PlotResultsOutput {
        output_filepath: save_path.to_string(),
        output_image: load_local_image(save_path).await,
    });
}

/// Plots observed, calculated and residual curves, with reflection ticks when
/// a reflection list is given. `x_range` zooms both axes into a window.
pub async fn plot_refinement_results(
    output_file: &str,
    save_path: &str,
    hkl_file: Option<&str>,
    x_range: Option<(f64, f64)>,
) -> Result<PlotResultsOutput> {
    let (pattern, reflections) = load_inputs(output_file, hkl_file).await?;
    let spec = match x_range {
        Some((lo, hi)) => PanelSpec::window("", lo, hi),
        None => PanelSpec::full(""),
    };
    let layout = layout_panel(&pattern, reflections.as_ref(), &spec)?;

    return render_to_file(save_path, pattern, vec![layout]).await;
}

/// Plots the full pattern next to three automatically chosen zoom regions.
pub async fn plot_refinement_multi_panel(
    output_file: &str,
    save_path: &str,
    hkl_file: Option<&str>,
) -> Result<PlotResultsOutput> {
    let (pattern, reflections) = load_inputs(output_file, hkl_file).await?;
    let layouts = regions_of_interest(&pattern)
        .iter()
        .map(|spec| return layout_panel(&pattern, reflections.as_ref(), spec))
        .collect::<Result<Vec<PanelLayout>>>()?;

    return render_to_file(save_path, pattern, layouts).await;
}
