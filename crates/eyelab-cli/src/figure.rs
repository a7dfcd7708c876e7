use anyhow::Result;
use eyelab_lib::plot::{Color as FigureColor, Figure, Series};
use plotters::prelude::*;
use std::path::Path;

fn rgb(color: FigureColor) -> RGBColor {
    let (r, g, b) = color.rgb();
    RGBColor(r, g, b)
}

/// Render a calibration figure to a PNG the size of its canvas. Figure
/// coordinates are pixels with the origin top-left.
pub fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let width = fig.width.max(1.0) as u32;
    let height = fig.height.max(1.0) as u32;
    let backend = BitMapBackend::new(path, (width, height));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    // text-free, so no system font is required
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0.0..fig.width, fig.height..0.0)?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    rgb(line.style.color).stroke_width(line.style.width.max(1.0) as u32),
                ))?;
            }
            Series::Circle(circle) => {
                chart.draw_series(std::iter::once(Circle::new(
                    (circle.center[0], circle.center[1]),
                    circle.radius as i32,
                    rgb(circle.style.color).stroke_width(circle.style.width.max(1.0) as u32),
                )))?;
            }
        }
    }
    root.present()?;
    Ok(())
}
