use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value as JsonValue};

use super::model::{TableView, Value};

/// Write the view as CSV with a header row. Nulls become empty fields.
pub fn export_csv(view: &TableView, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(view.column_names())?;
    for row in 0..view.n_rows() {
        let record = (0..view.column_names().len()).map(|c| match view.value(row, c) {
            v if v.is_null() => String::new(),
            v => v.to_string(),
        });
        writer.write_record(record)?;
    }
    writer.flush()?;
    log::info!("Exported {} rows to {}", view.n_rows(), path.display());
    Ok(())
}

/// Write the view as a JSON array of records, keys in column order.
pub fn export_json(view: &TableView, path: &Path) -> Result<()> {
    let records: Vec<JsonValue> = (0..view.n_rows())
        .map(|row| {
            let obj: Map<String, JsonValue> = view
                .column_names()
                .iter()
                .enumerate()
                .map(|(c, name)| (name.clone(), value_to_json(view.value(row, c))))
                .collect();
            JsonValue::Object(obj)
        })
        .collect();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &records)?;
    log::info!("Exported {} rows to {}", view.n_rows(), path.display());
    Ok(())
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::from(*i),
        // NaN and infinities have no JSON form
        Value::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::String(s) => JsonValue::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::loader::load_file;
    use crate::data::model::Dataset;

    fn view() -> TableView {
        let ds = Dataset::from_rows(
            vec!["MJD".into(), "Col A".into(), "band".into()],
            vec![
                vec![Value::Integer(51000), Value::Float(1.5), Value::String("g".into())],
                vec![Value::Integer(52500), Value::Null, Value::String("r, i".into())],
                vec![Value::Integer(60100), Value::Float(f64::NAN), Value::String("i".into())],
            ],
        )
        .unwrap();
        TableView::filtered(Arc::new(ds), vec![0, 1])
    }

    #[test]
    fn csv_export_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_csv(&view(), &path).unwrap();
        let back = load_file(&path).unwrap();
        assert_eq!(back.column_names(), view().column_names());
        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.value(1, 2), &Value::String("r, i".into()));
        assert!(back.value(1, 1).is_null());
    }

    #[test]
    fn json_export_keeps_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        export_json(&view(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.find("MJD").unwrap() < text.find("Col A").unwrap());
        let back = load_file(&path).unwrap();
        assert_eq!(back.column("MJD").unwrap(), &[Value::Integer(51000), Value::Integer(52500)]);
        assert_eq!(back.value(1, 1), &Value::Null);
    }
}
