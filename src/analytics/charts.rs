//! Static Chart Renderer
//! Writes PNG charts for the market analysis with plotters.

use plotters::prelude::*;
use std::fmt::Display;
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

use super::market_analyzer::{AnalyticsError, CorrelationMatrix, ScatterData};

const CHART_SIZE: (u32, u32) = (1200, 800);
const FONT: &str = "sans-serif";

/// One histogram bar covering `[start, end)`; the last bin also holds the maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Split finite `values` into `bins` equal-width bins.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if max > min {
        (max - min) / bins as f64
    } else {
        1.0
    };

    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// Diverging blue-white-red scale for a correlation in [-1, 1]; NaN is grey.
pub fn heat_color(r: f64) -> RGBColor {
    if r.is_nan() {
        return RGBColor(200, 200, 200);
    }
    let r = r.clamp(-1.0, 1.0);
    let fade = |t: f64| (255.0 * (1.0 - t)).round() as u8;
    if r >= 0.0 {
        RGBColor(255, fade(r), fade(r))
    } else {
        RGBColor(fade(-r), fade(-r), 255)
    }
}

pub fn price_histogram(values: &[f64], bins: usize, path: &Path) -> Result<(), AnalyticsError> {
    let bins = histogram_bins(values, bins);
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Err(AnalyticsError::Chart("no prices to plot".into()));
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0);
    prepare(path)?;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Distribution of Sale Prices", (FONT, 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(first.start..last.end, 0usize..max_count + 1)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc("Sale Price")
        .y_desc("Count")
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.start, 0), (b.end, b.count)], BLUE.mix(0.6).filled())
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    debug!(path = %path.display(), "Wrote price histogram");
    Ok(())
}

/// One box per neighborhood, in the given order.
pub fn neighborhood_boxplot(
    groups: &[(String, Vec<f64>)],
    path: &Path,
) -> Result<(), AnalyticsError> {
    let groups: Vec<&(String, Vec<f64>)> = groups.iter().filter(|(_, v)| !v.is_empty()).collect();
    if groups.is_empty() {
        return Err(AnalyticsError::Chart("no neighborhoods to plot".into()));
    }
    let all = groups.iter().flat_map(|(_, v)| v.iter().copied());
    let y_range = padded_range(all);
    let y_range = y_range.start as f32..y_range.end as f32;
    prepare(path)?;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Neighborhood Price Comparison", (FONT, 28))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d((0..groups.len() as u32).into_segmented(), y_range)
        .map_err(render_error)?;

    let label = |key: &SegmentValue<u32>| match key {
        SegmentValue::CenterOf(i) => groups
            .get(*i as usize)
            .map(|(name, _)| name.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .x_labels(groups.len())
        .x_label_formatter(&label)
        .x_desc("Neighborhood")
        .y_desc("Sale Price")
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(groups.iter().enumerate().map(|(i, (_, values))| {
            Boxplot::new_vertical(
                SegmentValue::CenterOf(i as u32),
                &Quartiles::new(values.as_slice()),
            )
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    debug!(path = %path.display(), neighborhoods = groups.len(), "Wrote neighborhood boxplot");
    Ok(())
}

pub fn correlation_heatmap(matrix: &CorrelationMatrix, path: &Path) -> Result<(), AnalyticsError> {
    let n = matrix.variables.len() as u32;
    if n == 0 {
        return Err(AnalyticsError::Chart("no variables to correlate".into()));
    }
    prepare(path)?;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation Heatmap", (FONT, 28))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(120)
        .build_cartesian_2d((0..n).into_segmented(), (0..n).into_segmented())
        .map_err(render_error)?;

    let label = |key: &SegmentValue<u32>| match key {
        SegmentValue::CenterOf(i) => matrix
            .variables
            .get(*i as usize)
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n as usize)
        .y_labels(n as usize)
        .x_label_formatter(&label)
        .y_label_formatter(&label)
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(matrix.values.iter().enumerate().flat_map(|(i, row)| {
            row.iter().enumerate().map(move |(j, r)| {
                let (x, y) = (i as u32, j as u32);
                Rectangle::new(
                    [
                        (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                        (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                    ],
                    heat_color(*r).filled(),
                )
            })
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    debug!(path = %path.display(), variables = n, "Wrote correlation heatmap");
    Ok(())
}

/// Scatter coloured by neighborhood, with the least-squares line in black.
pub fn scatter_with_trend(data: &ScatterData, title: &str, path: &Path) -> Result<(), AnalyticsError> {
    if data.points.is_empty() {
        return Err(AnalyticsError::Chart(format!("no points for {title}")));
    }
    let x_range = padded_range(data.points.iter().map(|p| p.x));
    let y_range = padded_range(data.points.iter().map(|p| p.y));
    prepare(path)?;

    let mut neighborhoods: Vec<&str> = Vec::new();
    for point in &data.points {
        if !neighborhoods.contains(&point.neighborhood.as_str()) {
            neighborhoods.push(&point.neighborhood);
        }
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(data.x_label.as_str())
        .y_desc(data.y_label.as_str())
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(data.points.iter().map(|p| {
            let idx = neighborhoods
                .iter()
                .position(|n| *n == p.neighborhood)
                .unwrap_or(0);
            Circle::new((p.x, p.y), 3, Palette99::pick(idx).filled())
        }))
        .map_err(render_error)?;

    if let Some((slope, intercept)) = data.trend {
        let line = [x_range.start, x_range.end].map(|x| (x, slope * x + intercept));
        chart
            .draw_series(LineSeries::new(line, &BLACK))
            .map_err(render_error)?;
    }

    root.present().map_err(render_error)?;
    debug!(path = %path.display(), points = data.points.len(), "Wrote scatter plot");
    Ok(())
}

fn prepare(path: &Path) -> Result<(), AnalyticsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        return 0.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad)..(max + pad)
}

fn render_error<E: Display>(err: E) -> AnalyticsError {
    AnalyticsError::Chart(err.to_string())
}
