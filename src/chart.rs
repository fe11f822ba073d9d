//! Plot data preparation.
//!
//! Everything here turns a [`TableView`] into plain numbers; drawing lives in
//! `ui::plot`. Rows whose needed cells are null or non-numeric are skipped.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::data::model::{TableView, Value};
use crate::data::stats::is_numeric_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    #[default]
    Scatter,
    ErrorBar,
    Histogram,
    Density,
}

impl PlotKind {
    pub const ALL: [PlotKind; 4] = [
        PlotKind::Scatter,
        PlotKind::ErrorBar,
        PlotKind::Histogram,
        PlotKind::Density,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PlotKind::Scatter => "Scatter",
            PlotKind::ErrorBar => "Error bars",
            PlotKind::Histogram => "Histogram",
            PlotKind::Density => "2D density",
        }
    }

    /// Whether the kind plots one column against another.
    pub fn needs_y(self) -> bool {
        !matches!(self, PlotKind::Histogram)
    }
}

fn numeric(view: &TableView, column: &str) -> Result<Vec<Option<f64>>> {
    let Some(col) = view.column_index(column) else {
        bail!("Column '{column}' does not exist");
    };
    if !is_numeric_column(view, col) {
        bail!("Column '{column}' is not numeric");
    }
    Ok(view
        .column_values(col)
        .map(|v| v.as_f64().filter(|f| f.is_finite()))
        .collect())
}

// ---------------------------------------------------------------------------
// Scatter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    /// The colour-by value, `None` for the single uncoloured series.
    pub key: Option<Value>,
    pub points: Vec<[f64; 2]>,
}

/// One series per distinct `color_by` value (in sorted value order), or a
/// single series without a colour column.
pub fn scatter_series(
    view: &TableView,
    x: &str,
    y: &str,
    color_by: Option<&str>,
) -> Result<Vec<ScatterSeries>> {
    let xs = numeric(view, x)?;
    let ys = numeric(view, y)?;
    let color_col = match color_by {
        Some(c) => match view.column_index(c) {
            Some(i) => Some(i),
            None => bail!("Column '{c}' does not exist"),
        },
        None => None,
    };

    let mut groups: BTreeMap<Option<Value>, Vec<[f64; 2]>> = BTreeMap::new();
    for (row, (px, py)) in xs.iter().zip(&ys).enumerate() {
        let (Some(px), Some(py)) = (px, py) else {
            continue;
        };
        let key = color_col.map(|c| view.value(row, c).clone());
        groups.entry(key).or_default().push([*px, *py]);
    }
    Ok(groups
        .into_iter()
        .map(|(key, points)| ScatterSeries { key, points })
        .collect())
}

// ---------------------------------------------------------------------------
// Error bars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPoint {
    pub x: f64,
    pub y: f64,
    pub x_err: Option<f64>,
    pub y_err: Option<f64>,
}

/// Points with symmetric error bars; a null error cell draws no bar for
/// that point.
pub fn error_points(
    view: &TableView,
    x: &str,
    y: &str,
    x_err: Option<&str>,
    y_err: Option<&str>,
) -> Result<Vec<ErrorPoint>> {
    let xs = numeric(view, x)?;
    let ys = numeric(view, y)?;
    let x_errs = x_err.map(|c| numeric(view, c)).transpose()?;
    let y_errs = y_err.map(|c| numeric(view, c)).transpose()?;

    let err_at = |errs: &Option<Vec<Option<f64>>>, row: usize| {
        errs.as_ref().and_then(|e| e[row]).map(f64::abs)
    };
    Ok(xs
        .iter()
        .zip(&ys)
        .enumerate()
        .filter_map(|(row, (px, py))| {
            Some(ErrorPoint {
                x: (*px)?,
                y: (*py)?,
                x_err: err_at(&x_errs, row),
                y_err: err_at(&y_errs, row),
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` ascending edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    pub fn centers(&self) -> impl Iterator<Item = f64> + '_ {
        self.edges.windows(2).map(|w| (w[0] + w[1]) / 2.0)
    }
}

/// Equal-width edges over the data range. A degenerate range is widened to
/// `value ± 0.5`.
fn edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let width = (hi - lo) / bins as f64;
    (0..=bins).map(|i| lo + width * i as f64).collect()
}

/// Bin index for `v`; the last bin is closed on the right.
fn bin_of(edges: &[f64], v: f64) -> usize {
    let bins = edges.len() - 1;
    let (lo, hi) = (edges[0], edges[bins]);
    let i = ((v - lo) / (hi - lo) * bins as f64).floor() as usize;
    i.min(bins - 1)
}

fn range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

pub fn histogram(view: &TableView, column: &str, bins: usize) -> Result<Histogram> {
    if bins == 0 {
        bail!("Histogram needs at least one bin");
    }
    let values: Vec<f64> = numeric(view, column)?.into_iter().flatten().collect();
    if values.is_empty() {
        bail!("Column '{column}' has no numeric values");
    }
    let (lo, hi) = range(&values);
    let edges = edges(lo, hi, bins);
    let mut counts = vec![0; bins];
    for v in values {
        counts[bin_of(&edges, v)] += 1;
    }
    Ok(Histogram { edges, counts })
}

// ---------------------------------------------------------------------------
// 2D density
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    /// `counts[ix][iy]`
    pub counts: Vec<Vec<usize>>,
}

impl DensityGrid {
    pub fn max_count(&self) -> usize {
        self.counts
            .iter()
            .flat_map(|col| col.iter().copied())
            .max()
            .unwrap_or(0)
    }
}

pub fn density(view: &TableView, x: &str, y: &str, bins: usize) -> Result<DensityGrid> {
    if bins == 0 {
        bail!("Density plot needs at least one bin");
    }
    let points: Vec<(f64, f64)> = numeric(view, x)?
        .into_iter()
        .zip(numeric(view, y)?)
        .filter_map(|(px, py)| Some((px?, py?)))
        .collect();
    if points.is_empty() {
        bail!("No rows with numeric '{x}' and '{y}'");
    }
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let (x_lo, x_hi) = range(&xs);
    let (y_lo, y_hi) = range(&ys);
    let x_edges = edges(x_lo, x_hi, bins);
    let y_edges = edges(y_lo, y_hi, bins);

    let mut counts = vec![vec![0; bins]; bins];
    for (px, py) in points {
        counts[bin_of(&x_edges, px)][bin_of(&y_edges, py)] += 1;
    }
    Ok(DensityGrid {
        x_edges,
        y_edges,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::model::Dataset;

    fn view() -> TableView {
        let ds = Dataset::from_rows(
            vec!["x".into(), "y".into(), "err".into(), "band".into()],
            vec![
                vec![Value::Integer(0), Value::Float(0.0), Value::Float(-0.1), Value::String("g".into())],
                vec![Value::Integer(1), Value::Float(2.0), Value::Null, Value::String("r".into())],
                vec![Value::Integer(2), Value::Null, Value::Float(0.3), Value::String("g".into())],
                vec![Value::Integer(3), Value::Float(6.0), Value::Float(0.4), Value::Null],
                vec![Value::Integer(4), Value::Float(8.0), Value::Float(0.5), Value::String("g".into())],
            ],
        )
        .unwrap();
        TableView::full(Arc::new(ds))
    }

    #[test]
    fn scatter_groups_by_colour_value() {
        let series = scatter_series(&view(), "x", "y", Some("band")).unwrap();
        let keys: Vec<Option<Value>> = series.iter().map(|s| s.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                Some(Value::Null),
                Some(Value::String("g".into())),
                Some(Value::String("r".into())),
            ]
        );
        assert_eq!(series[1].points, vec![[0.0, 0.0], [4.0, 8.0]]);

        let single = scatter_series(&view(), "x", "y", None).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].points.len(), 4);
    }

    #[test]
    fn non_numeric_axes_are_rejected() {
        assert!(scatter_series(&view(), "band", "y", None).is_err());
        assert!(scatter_series(&view(), "x", "missing", None).is_err());
        assert!(scatter_series(&view(), "x", "y", Some("missing")).is_err());
    }

    #[test]
    fn error_bars_are_absolute_and_optional() {
        let pts = error_points(&view(), "x", "y", None, Some("err")).unwrap();
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0].y_err, Some(0.1));
        assert_eq!(pts[1].y_err, None);
        assert!(pts.iter().all(|p| p.x_err.is_none()));
    }

    #[test]
    fn histogram_includes_the_maximum() {
        let h = histogram(&view(), "x", 4).unwrap();
        assert_eq!(h.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
        assert_eq!(h.bin_width(), 1.0);
        assert_eq!(h.centers().next(), Some(0.5));
        assert!(histogram(&view(), "x", 0).is_err());
    }

    #[test]
    fn constant_column_gets_a_unit_range() {
        let ds = Dataset::new(vec!["c".into()], vec![vec![Value::Integer(3); 3]]).unwrap();
        let h = histogram(&TableView::full(Arc::new(ds)), "c", 2).unwrap();
        assert_eq!(h.edges, vec![2.5, 3.0, 3.5]);
        assert_eq!(h.counts, vec![0, 3]);
    }

    #[test]
    fn density_counts_every_complete_row() {
        let grid = density(&view(), "x", "y", 2).unwrap();
        let total: usize = grid.counts.iter().flatten().sum();
        assert_eq!(total, 4);
        assert_eq!(grid.counts[0][0], 2);
        assert_eq!(grid.counts[1][1], 2);
        assert_eq!(grid.max_count(), 2);
    }
}
