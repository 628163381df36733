//! Cutoff trend charts.
//!
//! Each entity is drawn as one line over every school year in the dataset.
//! Years an entity has no cutoff for leave a gap in its line. Axis text
//! needs the `ttf` feature; without it only lines, markers and grid are drawn.

use crate::models::CutoffRecord;
use crate::normalizer::years;
use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 700,
            title: "Admission cutoff trends by year".to_string(),
        }
    }
}

// Without a font backend plotters panics on any text draw.
const DRAW_TEXT: bool = cfg!(feature = "ttf");

fn render_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("Chart rendering failed: {}", e)
}

/// Cutoffs of one entity aligned to `all_years`, `None` where missing.
fn aligned_series(records: &[CutoffRecord], entity: &str, all_years: &[String]) -> Vec<Option<f64>> {
    all_years
        .iter()
        .map(|year| {
            records
                .iter()
                .find(|r| r.entity == entity && &r.year == year)
                .map(|r| r.cutoff)
        })
        .collect()
}

/// Split an aligned series into runs of consecutive years.
fn segments(series: &[Option<f64>]) -> Vec<Vec<(u32, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (i, value) in series.iter().enumerate() {
        match value {
            Some(y) => current.push((i as u32, *y)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Plot the cutoff history of `entities` to a PNG file and return its absolute path.
pub fn plot_admission_trends(
    records: &[CutoffRecord],
    entities: &[String],
    path: &Path,
    options: &ChartOptions,
) -> Result<PathBuf> {
    let all_years = years(records);
    let series: Vec<(&String, Vec<Option<f64>>)> = entities
        .iter()
        .map(|entity| (entity, aligned_series(records, entity, &all_years)))
        .filter(|(_, values)| values.iter().any(Option::is_some))
        .collect();

    if series.is_empty() {
        return Err(anyhow!("No cutoff data found for: {}", entities.join(", ")));
    }

    let values = series.iter().flat_map(|(_, values)| values.iter().flatten());
    let (y_min, y_max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    {
        let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let (x_label_area, y_label_area) = if DRAW_TEXT { (50, 70) } else { (0, 0) };
        let mut builder = ChartBuilder::on(&root);
        builder.margin(15).x_label_area_size(x_label_area).y_label_area_size(y_label_area);
        if DRAW_TEXT {
            builder.caption(&options.title, ("sans-serif", 28));
        }
        let mut chart = builder
            .build_cartesian_2d((0u32..all_years.len() as u32).into_segmented(), (y_min - 1.0)..(y_max + 1.0))
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_labels(all_years.len())
            .x_label_formatter(&|x: &SegmentValue<u32>| match x {
                SegmentValue::CenterOf(i) => all_years.get(*i as usize).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .y_label_formatter(&|y: &f64| format!("{:.2}", y))
            .x_desc("School year")
            .y_desc("Cutoff score")
            .draw()
            .map_err(render_error)?;

        for (i, (entity, values)) in series.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();

            for run in segments(values) {
                chart
                    .draw_series(LineSeries::new(
                        run.into_iter().map(|(x, y)| (SegmentValue::CenterOf(x), y)),
                        color.stroke_width(2),
                    ))
                    .map_err(render_error)?;
            }

            chart
                .draw_series(values.iter().enumerate().filter_map(|(x, y)| {
                    y.map(|y| Circle::new((SegmentValue::CenterOf(x as u32), y), 4, color.filled()))
                }))
                .map_err(render_error)?
                .label(entity.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        if DRAW_TEXT {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_error)?;
        }

        root.present().map_err(render_error)?;
    }

    fs::canonicalize(path).with_context(|| format!("Chart was not written: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: &str, entity: &str, cutoff: f64) -> CutoffRecord {
        CutoffRecord {
            year: year.to_string(),
            school: entity.to_string(),
            entity: entity.to_string(),
            cutoff,
            quota: None,
            note: None,
        }
    }

    #[test]
    fn missing_years_split_lines() {
        let runs = segments(&[Some(1.0), None, Some(2.0), Some(3.0)]);
        assert_eq!(runs, vec![vec![(0, 1.0)], vec![(2, 2.0), (3, 3.0)]]);
        assert!(segments(&[None, None]).is_empty());
    }

    #[test]
    fn series_aligns_to_all_years() {
        let records = vec![
            record("2021-2022", "A", 20.0),
            record("2023-2024", "A", 22.0),
            record("2022-2023", "B", 18.0),
        ];
        let all_years = years(&records);
        assert_eq!(aligned_series(&records, "A", &all_years), vec![Some(20.0), None, Some(22.0)]);
    }

    #[test]
    fn writes_png_for_known_entities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("trend.png");
        let records = vec![
            record("2021-2022", "A", 20.0),
            record("2022-2023", "A", 21.5),
            record("2022-2023", "B", 18.0),
        ];

        let written = plot_admission_trends(
            &records,
            &["A".to_string(), "B".to_string(), "Unknown".to_string()],
            &path,
            &ChartOptions::default(),
        )
        .unwrap();
        assert!(written.is_absolute());
        assert!(fs::metadata(&written).unwrap().len() > 0);
    }

    #[test]
    fn unknown_entities_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("2021-2022", "A", 20.0)];
        let result = plot_admission_trends(
            &records,
            &["Nope".to_string()],
            &dir.path().join("x.png"),
            &ChartOptions::default(),
        );
        assert!(result.is_err());
        assert!(!dir.path().join("x.png").exists());
    }
}
