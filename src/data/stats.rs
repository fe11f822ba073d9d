use std::collections::BTreeMap;

use anyhow::{Result, bail};

use super::model::{TableView, Value};

// ---------------------------------------------------------------------------
// Per-column summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

/// Summary of a single column, shaped after its contents.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSummary {
    Numeric {
        column: String,
        count: usize,
        nulls: usize,
        min: f64,
        max: f64,
        mean: f64,
        std: f64,
        quartiles: Quartiles,
    },
    Categorical {
        column: String,
        count: usize,
        nulls: usize,
        unique: usize,
        most_common: Option<(Value, usize)>,
    },
}

/// A column is numeric when every non-null cell is an integer or float and
/// there is at least one.
pub fn is_numeric_column(view: &TableView, col: usize) -> bool {
    let mut any = false;
    for v in view.column_values(col) {
        if v.is_null() {
            continue;
        }
        if !v.is_numeric() {
            return false;
        }
        any = true;
    }
    any
}

/// Names of the numeric columns, in column order.
pub fn numeric_columns(view: &TableView) -> Vec<String> {
    view.column_names()
        .iter()
        .enumerate()
        .filter(|(i, _)| is_numeric_column(view, *i))
        .map(|(_, n)| n.clone())
        .collect()
}

pub fn column_summary(view: &TableView, column: &str) -> Result<ColumnSummary> {
    let Some(col) = view.column_index(column) else {
        bail!("Column '{column}' does not exist");
    };
    let nulls = view.column_values(col).filter(|v| v.is_null()).count();
    let count = view.n_rows() - nulls;

    if is_numeric_column(view, col) {
        let mut values: Vec<f64> = view.column_values(col).filter_map(finite).collect();
        values.sort_by(f64::total_cmp);
        let mean = mean(&values);
        return Ok(ColumnSummary::Numeric {
            column: column.to_string(),
            count,
            nulls,
            min: values.first().copied().unwrap_or(f64::NAN),
            max: values.last().copied().unwrap_or(f64::NAN),
            mean,
            std: sample_std(&values, mean),
            quartiles: quartiles(&values),
        });
    }

    let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
    for v in view.column_values(col).filter(|v| !v.is_null()) {
        *counts.entry(v).or_default() += 1;
    }
    // ties go to the smallest value
    let most_common = counts
        .iter()
        .fold(None::<(&Value, usize)>, |best, (v, n)| match best {
            Some((_, b)) if b >= *n => best,
            _ => Some((*v, *n)),
        })
        .map(|(v, n)| (v.clone(), n));
    Ok(ColumnSummary::Categorical {
        column: column.to_string(),
        count,
        nulls,
        unique: counts.len(),
        most_common,
    })
}

fn finite(v: &Value) -> Option<f64> {
    v.as_f64().filter(|f| !f.is_nan())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1).
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Linear-interpolated quantile of sorted data.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn quartiles(sorted: &[f64]) -> Quartiles {
    Quartiles {
        q1: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        q3: quantile(sorted, 0.75),
    }
}

// ---------------------------------------------------------------------------
// Distribution shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub quartiles: Quartiles,
    pub max: f64,
    /// Adjusted Fisher-Pearson skewness.
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
}

pub fn distribution(view: &TableView, column: &str) -> Result<Distribution> {
    let Some(col) = view.column_index(column) else {
        bail!("Column '{column}' does not exist");
    };
    if !is_numeric_column(view, col) {
        bail!("Column '{column}' is not numeric");
    }
    let mut values: Vec<f64> = view.column_values(col).filter_map(finite).collect();
    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    let m = mean(&values);
    let std = sample_std(&values, m);

    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;

    let skewness = if values.len() < 3 || m2 == 0.0 {
        f64::NAN
    } else {
        let g1 = m3 / m2.powf(1.5);
        (n * (n - 1.0)).sqrt() / (n - 2.0) * g1
    };
    let kurtosis = if values.len() < 4 || m2 == 0.0 {
        f64::NAN
    } else {
        let g2 = m4 / (m2 * m2) - 3.0;
        ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
    };

    Ok(Distribution {
        count: values.len(),
        mean: m,
        std,
        min: values.first().copied().unwrap_or(f64::NAN),
        quartiles: quartiles(&values),
        max: values.last().copied().unwrap_or(f64::NAN),
        skewness,
        kurtosis,
    })
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Pearson correlation matrix over the given numeric columns (all numeric
/// columns when `columns` is empty). Each pair uses the rows where both
/// values are present.
pub fn correlation_matrix(view: &TableView, columns: &[String]) -> Result<CorrelationMatrix> {
    let columns = if columns.is_empty() {
        numeric_columns(view)
    } else {
        for c in columns {
            let Some(i) = view.column_index(c) else {
                bail!("Column '{c}' does not exist");
            };
            if !is_numeric_column(view, i) {
                bail!("Column '{c}' is not numeric");
            }
        }
        columns.to_vec()
    };
    if columns.is_empty() {
        bail!("No numeric columns to correlate");
    }

    let data: Vec<Vec<Option<f64>>> = columns
        .iter()
        .filter_map(|c| view.numeric_column(c))
        .collect();
    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&data[i], &data[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix { columns, values })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::model::Dataset;

    fn view() -> TableView {
        let ds = Dataset::new(
            vec!["x".into(), "y".into(), "band".into()],
            vec![
                vec![
                    Value::Integer(1),
                    Value::Integer(2),
                    Value::Integer(3),
                    Value::Integer(4),
                    Value::Null,
                ],
                vec![
                    Value::Float(2.0),
                    Value::Float(4.0),
                    Value::Float(6.0),
                    Value::Float(8.0),
                    Value::Float(10.0),
                ],
                ["g", "r", "g", "i", "r"]
                    .iter()
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            ],
        )
        .unwrap();
        TableView::full(Arc::new(ds))
    }

    #[test]
    fn numeric_summary() {
        let ColumnSummary::Numeric {
            count,
            nulls,
            min,
            max,
            mean,
            std,
            quartiles,
            ..
        } = column_summary(&view(), "x").unwrap()
        else {
            panic!("x should be numeric");
        };
        assert_eq!((count, nulls), (4, 1));
        assert_eq!((min, max, mean), (1.0, 4.0, 2.5));
        assert!((std - 1.290_994_448_7).abs() < 1e-9);
        assert_eq!(quartiles.median, 2.5);
        assert_eq!(quartiles.q1, 1.75);
        assert_eq!(quartiles.q3, 3.25);
    }

    #[test]
    fn categorical_summary_picks_smallest_mode() {
        let summary = column_summary(&view(), "band").unwrap();
        assert_eq!(
            summary,
            ColumnSummary::Categorical {
                column: "band".into(),
                count: 5,
                nulls: 0,
                unique: 3,
                most_common: Some((Value::String("g".into()), 2)),
            }
        );
    }

    #[test]
    fn unknown_column_is_an_error() {
        assert!(column_summary(&view(), "nope").is_err());
        assert!(distribution(&view(), "band").is_err());
    }

    #[test]
    fn correlation_of_linear_columns_is_one() {
        let m = correlation_matrix(&view(), &[]).unwrap();
        assert_eq!(m.columns, vec!["x", "y"]);
        assert!((m.values[0][1] - 1.0).abs() < 1e-12);
        assert!(correlation_matrix(&view(), &["band".to_string()]).is_err());
    }

    #[test]
    fn symmetric_distribution_has_zero_skew() {
        let d = distribution(&view(), "y").unwrap();
        assert_eq!(d.count, 5);
        assert!(d.skewness.abs() < 1e-12);
        assert!((d.kurtosis - (-1.2)).abs() < 1e-9);
    }
}
