use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// A single table cell.
/// Using `BTreeMap` / `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, ""),
        }
    }
}

impl Value {
    /// Try to interpret the value as an `f64` for numeric work (stats, plots).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "text",
        }
    }

    /// Guess the type of a raw text cell.
    pub fn infer(s: &str) -> Value {
        let s = s.trim();
        if s.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        match s {
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => Value::String(s.to_string()),
        }
    }

    /// Format for the preview table, like `{:.6g}`.
    pub fn display_short(&self) -> String {
        match self {
            Value::Float(v) if v.is_nan() => String::new(),
            Value::Float(v) => {
                let abs = v.abs();
                if abs != 0.0 && !(1e-4..1e6).contains(&abs) {
                    format!("{v:.5e}")
                } else {
                    let s = format!("{v:.6}");
                    let s = s.trim_end_matches('0').trim_end_matches('.');
                    s.to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// Column-oriented table: unique, insertion-ordered column names, each column
/// holding the same number of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    column_names: Vec<String>,
    columns: Vec<Vec<Value>>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from named columns.
    pub fn new(column_names: Vec<String>, columns: Vec<Vec<Value>>) -> Result<Self> {
        if column_names.len() != columns.len() {
            bail!(
                "{} column names given for {} columns",
                column_names.len(),
                columns.len()
            );
        }
        let mut seen = HashSet::new();
        for name in &column_names {
            if !seen.insert(name.as_str()) {
                bail!("Duplicate column name '{name}'");
            }
        }
        let n_rows = columns.first().map_or(0, Vec::len);
        for (name, col) in column_names.iter().zip(&columns) {
            if col.len() != n_rows {
                bail!(
                    "Column '{name}' has {} rows, expected {n_rows}",
                    col.len()
                );
            }
        }
        Ok(Dataset {
            column_names,
            columns,
            n_rows,
        })
    }

    /// Build a dataset from row-major records.
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let n_cols = column_names.len();
        let mut columns: Vec<Vec<Value>> = (0..n_cols)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                bail!("Row {i} has {} values, expected {n_cols}", row.len());
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Dataset::new(column_names, columns)
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        &self.columns[col][row]
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.column_names.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Copy the given rows (all columns, in the given order) into a new dataset.
    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|col| rows.iter().map(|&r| col[r].clone()).collect())
            .collect();
        Dataset {
            column_names: self.column_names.clone(),
            columns,
            n_rows: rows.len(),
        }
    }

    /// Consume into names and columns, for rebuilding after cleaning.
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.column_names, self.columns)
    }
}

// ---------------------------------------------------------------------------
// TableView – what the table preview, stats and plots read
// ---------------------------------------------------------------------------

/// A read-only view over a shared [`Dataset`]: either every row, or the rows
/// selected by a filter. Columns are always the dataset's columns.
#[derive(Debug, Clone)]
pub struct TableView {
    dataset: Arc<Dataset>,
    rows: Option<Arc<[usize]>>,
}

impl TableView {
    /// View over every row.
    pub fn full(dataset: Arc<Dataset>) -> Self {
        TableView {
            dataset,
            rows: None,
        }
    }

    /// View over the selected source rows.
    pub fn filtered(dataset: Arc<Dataset>, rows: Vec<usize>) -> Self {
        TableView {
            dataset,
            rows: Some(rows.into()),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.rows.is_some()
    }

    pub fn source(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn column_names(&self) -> &[String] {
        self.dataset.column_names()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.dataset.column_index(name)
    }

    pub fn n_rows(&self) -> usize {
        match &self.rows {
            Some(rows) => rows.len(),
            None => self.dataset.n_rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Source row index of the `row`-th row of this view.
    pub fn source_row(&self, row: usize) -> usize {
        match &self.rows {
            Some(rows) => rows[row],
            None => row,
        }
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        self.dataset.value(self.source_row(row), col)
    }

    /// Iterate the values of one column in view order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &Value> + '_ {
        (0..self.n_rows()).map(move |r| self.value(r, col))
    }

    /// Numeric values of a column (`None` for nulls and non-numbers).
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let col = self.column_index(name)?;
        Some(
            self.column_values(col)
                .map(|v| v.as_f64().filter(|f| !f.is_nan()))
                .collect(),
        )
    }
}

impl PartialEq for TableView {
    fn eq(&self, other: &Self) -> bool {
        self.column_names() == other.column_names()
            && self.n_rows() == other.n_rows()
            && (0..self.column_names().len()).all(|c| {
                self.column_values(c)
                    .zip(other.column_values(c))
                    .all(|(a, b)| a == b)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
                vec![
                    Value::String("x".into()),
                    Value::Null,
                    Value::String("z".into()),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_and_ragged_columns() {
        assert!(Dataset::new(vec!["a".into(), "a".into()], vec![vec![], vec![]]).is_err());
        assert!(
            Dataset::new(
                vec!["a".into(), "b".into()],
                vec![vec![Value::Null], vec![]]
            )
            .is_err()
        );
    }

    #[test]
    fn from_rows_transposes() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Integer(1), Value::Bool(true)],
                vec![Value::Integer(2), Value::Bool(false)],
            ],
        )
        .unwrap();
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.column("b").unwrap()[1], Value::Bool(false));
    }

    #[test]
    fn filtered_view_keeps_columns() {
        let ds = Arc::new(sample());
        let view = TableView::filtered(ds.clone(), vec![0, 2]);
        assert_eq!(view.column_names(), ds.column_names());
        assert_eq!(view.n_rows(), 2);
        assert_eq!(view.value(1, 0), &Value::Integer(3));
        assert_eq!(view.value(1, 1), &Value::String("z".into()));
    }

    #[test]
    fn full_view_equals_its_dataset() {
        let ds = Arc::new(sample());
        let a = TableView::full(ds.clone());
        let b = TableView::filtered(ds, vec![0, 1, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn infer_cell_types() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer(" 42 "), Value::Integer(42));
        assert_eq!(Value::infer("1.5e3"), Value::Float(1500.0));
        assert_eq!(Value::infer("True"), Value::Bool(true));
        assert_eq!(Value::infer("g-band"), Value::String("g-band".into()));
    }

    #[test]
    fn short_display_trims_zeros() {
        assert_eq!(Value::Float(2.5).display_short(), "2.5");
        assert_eq!(Value::Float(3.0).display_short(), "3");
        assert_eq!(Value::Float(f64::NAN).display_short(), "");
    }
}
