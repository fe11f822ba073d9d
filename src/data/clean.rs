use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::model::{Dataset, TableView, Value};
use super::stats::{is_numeric_column, quantile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    #[default]
    Mean,
    Median,
    Mode,
    Constant,
}

/// What the clean dialog asks for. Steps run in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    /// Drop every row holding at least one null.
    pub drop_na: bool,
    /// Fill nulls: numeric columns by `fill_method`, text columns with "".
    pub fill_na: bool,
    pub fill_method: FillMethod,
    /// Used by [`FillMethod::Constant`] for every column.
    pub fill_value: f64,
    pub drop_duplicates: bool,
    /// Parse text columns as numbers; unparsable cells become null.
    pub convert_numeric: bool,
    pub round_decimals: Option<u32>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            drop_na: false,
            fill_na: false,
            fill_method: FillMethod::Mean,
            fill_value: 0.0,
            drop_duplicates: false,
            convert_numeric: false,
            round_decimals: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_before: usize,
    pub rows_after: usize,
}

impl CleanReport {
    pub fn message(&self) -> String {
        format!(
            "Cleaning finished: {} rows before, {} rows after",
            self.rows_before, self.rows_after
        )
    }
}

/// Produce a cleaned copy of `dataset`.
pub fn clean(dataset: &Dataset, options: &CleanOptions) -> Result<(Dataset, CleanReport)> {
    let rows_before = dataset.n_rows();
    let mut current = dataset.clone();

    if options.drop_na {
        let keep: Vec<usize> = (0..current.n_rows())
            .filter(|&r| (0..current.n_cols()).all(|c| !current.value(r, c).is_null()))
            .collect();
        current = current.take_rows(&keep);
    }

    if options.fill_na {
        current = fill_nulls(current, options)?;
    }

    if options.drop_duplicates {
        let keep: Vec<usize> = {
            let mut seen: HashSet<Vec<&Value>> = HashSet::new();
            (0..current.n_rows())
                .filter(|&r| {
                    let row: Vec<&Value> =
                        (0..current.n_cols()).map(|c| current.value(r, c)).collect();
                    seen.insert(row)
                })
                .collect()
        };
        current = current.take_rows(&keep);
    }

    if options.convert_numeric {
        let (names, columns) = current.into_parts();
        let columns = columns.into_iter().map(convert_column).collect();
        current = Dataset::new(names, columns)?;
    }

    if let Some(decimals) = options.round_decimals {
        let factor = 10f64.powi(decimals as i32);
        let (names, columns) = current.into_parts();
        let columns = columns
            .into_iter()
            .map(|col| {
                col.into_iter()
                    .map(|v| match v {
                        Value::Float(f) => Value::Float((f * factor).round() / factor),
                        other => other,
                    })
                    .collect()
            })
            .collect();
        current = Dataset::new(names, columns)?;
    }

    let report = CleanReport {
        rows_before,
        rows_after: current.n_rows(),
    };
    Ok((current, report))
}

fn fill_nulls(dataset: Dataset, options: &CleanOptions) -> Result<Dataset> {
    let view = TableView::full(Arc::new(dataset.clone()));
    let numeric: Vec<bool> = (0..dataset.n_cols())
        .map(|c| is_numeric_column(&view, c))
        .collect();
    let (names, columns) = dataset.into_parts();
    let mut filled = Vec::with_capacity(columns.len());
    for (col, is_numeric) in columns.into_iter().zip(numeric) {
        let replacement = if options.fill_method == FillMethod::Constant {
            Some(Value::Float(options.fill_value))
        } else if is_numeric {
            numeric_fill(&col, options.fill_method)
        } else {
            Some(Value::String(String::new()))
        };
        filled.push(match replacement {
            Some(r) => col
                .into_iter()
                .map(|v| if v.is_null() { r.clone() } else { v })
                .collect(),
            None => col,
        });
    }
    Dataset::new(names, filled)
}

fn numeric_fill(column: &[Value], method: FillMethod) -> Option<Value> {
    let mut values: Vec<f64> = column
        .iter()
        .filter_map(|v| v.as_f64().filter(|f| !f.is_nan()))
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let fill = match method {
        FillMethod::Mean => values.iter().sum::<f64>() / values.len() as f64,
        FillMethod::Median => quantile(&values, 0.5),
        FillMethod::Mode => {
            let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
            for v in &values {
                counts.entry(v.to_bits()).or_insert((*v, 0)).1 += 1;
            }
            // smallest value wins a tie; `values` is sorted so first max is it
            let mut best = (values[0], 0);
            for v in &values {
                let n = counts[&v.to_bits()].1;
                if n > best.1 {
                    best = (*v, n);
                }
            }
            best.0
        }
        FillMethod::Constant => return None,
    };
    Some(Value::Float(fill))
}

fn convert_column(column: Vec<Value>) -> Vec<Value> {
    if !column.iter().any(|v| matches!(v, Value::String(_))) {
        return column;
    }
    column
        .into_iter()
        .map(|v| match v {
            Value::String(s) => match Value::infer(&s) {
                n @ (Value::Integer(_) | Value::Float(_)) => n,
                _ => Value::Null,
            },
            other => other,
        })
        .collect()
}

/// Drop rows where every cell is null, then add a boolean `{col}_outlier`
/// column per numeric column, true outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
/// Returns the new dataset and how many empty rows were dropped.
pub fn flag_outliers(dataset: &Dataset) -> Result<(Dataset, usize)> {
    let keep: Vec<usize> = (0..dataset.n_rows())
        .filter(|&r| (0..dataset.n_cols()).any(|c| !dataset.value(r, c).is_null()))
        .collect();
    let dropped = dataset.n_rows() - keep.len();
    let trimmed = dataset.take_rows(&keep);

    let view = TableView::full(Arc::new(trimmed.clone()));
    let mut flags = Vec::new();
    for (c, name) in trimmed.column_names().iter().enumerate() {
        if !is_numeric_column(&view, c) || name.ends_with("_outlier") {
            continue;
        }
        let mut values: Vec<f64> = view
            .column_values(c)
            .filter_map(|v| v.as_f64().filter(|f| !f.is_nan()))
            .collect();
        values.sort_by(f64::total_cmp);
        let q1 = quantile(&values, 0.25);
        let q3 = quantile(&values, 0.75);
        let iqr = q3 - q1;
        let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let column: Vec<Value> = view
            .column_values(c)
            .map(|v| Value::Bool(v.as_f64().is_some_and(|f| f < lo || f > hi)))
            .collect();
        flags.push((format!("{name}_outlier"), column));
    }

    let (mut names, mut columns) = trimmed.into_parts();
    for (name, column) in flags {
        match names.iter().position(|n| *n == name) {
            Some(i) => columns[i] = column,
            None => {
                names.push(name);
                columns.push(column);
            }
        }
    }
    Ok((Dataset::new(names, columns)?, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ds() -> Dataset {
        Dataset::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Integer(1), Value::String("x".into())],
                vec![Value::Null, Value::String("y".into())],
                vec![Value::Integer(1), Value::String("x".into())],
                vec![Value::Integer(4), Value::Null],
                vec![Value::Float(2.345), Value::String("12".into())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn drop_na_removes_rows_with_any_null() {
        let opts = CleanOptions {
            drop_na: true,
            ..Default::default()
        };
        let (out, report) = clean(&ds(), &opts).unwrap();
        assert_eq!(report, CleanReport { rows_before: 5, rows_after: 3 });
        assert!(out.column("a").unwrap().iter().all(|v| !v.is_null()));
    }

    #[test]
    fn fill_with_mean_and_empty_text() {
        let opts = CleanOptions {
            fill_na: true,
            ..Default::default()
        };
        let (out, _) = clean(&ds(), &opts).unwrap();
        let a = out.column("a").unwrap();
        let mean = (1.0 + 1.0 + 4.0 + 2.345) / 4.0;
        assert!((a[1].as_f64().unwrap() - mean).abs() < 1e-12);
        assert_eq!(out.column("b").unwrap()[3], Value::String(String::new()));
    }

    #[test]
    fn fill_with_mode() {
        let opts = CleanOptions {
            fill_na: true,
            fill_method: FillMethod::Mode,
            ..Default::default()
        };
        let (out, _) = clean(&ds(), &opts).unwrap();
        assert_eq!(out.column("a").unwrap()[1], Value::Float(1.0));
    }

    #[test]
    fn duplicates_and_rounding() {
        let opts = CleanOptions {
            drop_duplicates: true,
            round_decimals: Some(1),
            ..Default::default()
        };
        let (out, report) = clean(&ds(), &opts).unwrap();
        assert_eq!(report.rows_after, 4);
        assert_eq!(out.column("a").unwrap()[3], Value::Float(2.3));
    }

    #[test]
    fn convert_numeric_nulls_unparsable_text() {
        let opts = CleanOptions {
            convert_numeric: true,
            ..Default::default()
        };
        let (out, _) = clean(&ds(), &opts).unwrap();
        let b = out.column("b").unwrap();
        assert_eq!(b[0], Value::Null);
        assert_eq!(b[4], Value::Integer(12));
    }

    #[test]
    fn outliers_are_flagged() {
        let mut rows: Vec<Vec<Value>> = (0..10).map(|i| vec![Value::Integer(i)]).collect();
        rows.push(vec![Value::Integer(1000)]);
        rows.push(vec![Value::Null]);
        let data = Dataset::from_rows(vec!["v".into()], rows).unwrap();
        let (out, dropped) = flag_outliers(&data).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(out.column_names(), &["v".to_string(), "v_outlier".to_string()]);
        let flags = out.column("v_outlier").unwrap();
        assert_eq!(flags[10], Value::Bool(true));
        assert!(flags[..10].iter().all(|f| *f == Value::Bool(false)));
    }
}
