use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{Data, Reader, open_workbook_auto};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, Value};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.tsv` / `.txt` / `.dat` – delimited text, delimiter sniffed
///   from the header line (tab, comma, pipe, semicolon, else whitespace)
/// * `.xlsx` / `.xls` / `.xlsm` / `.ods` – first worksheet, first row is the header
/// * `.json` – records (`[{...}, ...]`) or column-oriented (`{"col": {...}}`)
/// * `.parquet` – flat columns
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "tsv" | "txt" | "dat" => load_delimited(path),
        "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => load_excel(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        dataset.n_rows(),
        dataset.n_cols(),
        path.display()
    );
    Ok(dataset)
}

/// Trim header names, name blank ones, and suffix duplicates `.1`, `.2`, …
fn clean_headers<I: IntoIterator<Item = String>>(raw: I) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, h)| {
            let base = match h.trim() {
                "" => format!("Unnamed: {i}"),
                t => t.to_string(),
            };
            let n = seen.entry(base.clone()).or_insert(0);
            let name = if *n == 0 {
                base.clone()
            } else {
                format!("{base}.{n}")
            };
            *n += 1;
            name
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Byte(u8),
    Whitespace,
}

/// Pick the delimiter from the header line.
fn sniff_delimiter(header: &str) -> Delimiter {
    [b'\t', b',', b'|', b';']
        .into_iter()
        .find(|&d| header.as_bytes().contains(&d))
        .map_or(Delimiter::Whitespace, Delimiter::Byte)
}

fn load_delimited(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading text file")?;
    parse_delimited(&text)
}

pub(crate) fn parse_delimited(text: &str) -> Result<Dataset> {
    let Some(header_line) = text.lines().find(|l| !l.trim().is_empty()) else {
        bail!("File is empty");
    };

    let (headers, records): (Vec<String>, Vec<Vec<String>>) = match sniff_delimiter(header_line)
    {
        Delimiter::Whitespace => {
            let mut lines = text.lines().filter(|l| !l.trim().is_empty());
            let headers = lines
                .next()
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            let records = lines
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .collect();
            (headers, records)
        }
        Delimiter::Byte(d) => {
            let mut reader = csv::ReaderBuilder::new()
                .delimiter(d)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(text.as_bytes());
            let headers = reader
                .headers()
                .context("reading header row")?
                .iter()
                .map(str::to_string)
                .collect();
            let mut records = Vec::new();
            for (row_no, result) in reader.records().enumerate() {
                let record = result.with_context(|| format!("row {row_no}"))?;
                if record.iter().all(str::is_empty) {
                    continue;
                }
                records.push(record.iter().map(str::to_string).collect());
            }
            (headers, records)
        }
    };

    let headers = clean_headers(headers);
    let mut rows = Vec::with_capacity(records.len());
    for (row_no, record) in records.into_iter().enumerate() {
        if record.len() != headers.len() {
            log::warn!(
                "Skipping row {row_no}: {} fields, expected {}",
                record.len(),
                headers.len()
            );
            continue;
        }
        rows.push(record.iter().map(|s| Value::infer(s)).collect());
    }
    Dataset::from_rows(headers, rows)
}

// ---------------------------------------------------------------------------
// Excel loader
// ---------------------------------------------------------------------------

fn load_excel(path: &Path) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("Workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Dataset::new(Vec::new(), Vec::new());
    };
    let headers = clean_headers(header_row.iter().map(|c| c.to_string()));
    let records: Vec<Vec<Value>> = rows
        .filter(|r| r.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|r| {
            let mut row: Vec<Value> = r.iter().map(excel_to_value).collect();
            row.resize(headers.len(), Value::Null);
            row
        })
        .collect();
    Dataset::from_rows(headers, records)
}

fn excel_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Integer(*i),
        Data::Float(f) => Value::Float(*f),
        Data::String(s) => Value::infer(s),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(d) => Value::Float(d.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Accepted layouts (the `df.to_json()` defaults):
///
/// ```json
/// [{"MJD": 51000, "mag": 17.2}, {"MJD": 52500, "mag": 17.9}]
/// {"MJD": {"0": 51000, "1": 52500}, "mag": {"0": 17.2, "1": 17.9}}
/// {"MJD": [51000, 52500], "mag": [17.2, 17.9]}
/// ```
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

pub(crate) fn parse_json(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    match root {
        JsonValue::Array(records) => json_records(&records),
        JsonValue::Object(columns) => json_columns(&columns),
        _ => bail!("Expected a JSON array of records or an object of columns"),
    }
}

fn json_records(records: &[JsonValue]) -> Result<Dataset> {
    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }
    let rows = records
        .iter()
        .map(|rec| {
            names
                .iter()
                .map(|n| rec.get(n).map_or(Value::Null, json_to_value))
                .collect()
        })
        .collect();
    Dataset::from_rows(names, rows)
}

fn json_columns(columns: &serde_json::Map<String, JsonValue>) -> Result<Dataset> {
    let mut names = Vec::with_capacity(columns.len());
    let mut data = Vec::with_capacity(columns.len());
    for (name, col) in columns {
        let values: Vec<Value> = match col {
            JsonValue::Array(items) => items.iter().map(json_to_value).collect(),
            JsonValue::Object(cells) => {
                let mut indexed: Vec<(Option<u64>, &String, &JsonValue)> = cells
                    .iter()
                    .map(|(k, v)| (k.parse::<u64>().ok(), k, v))
                    .collect();
                indexed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
                indexed.into_iter().map(|(_, _, v)| json_to_value(v)).collect()
            }
            _ => bail!("Column '{name}' is neither an array nor an object"),
        };
        names.push(name.clone());
        data.push(values);
    }
    Dataset::new(names, data)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet table. Integer and float columns keep their kind,
/// booleans and strings map directly, anything else (dates, decimals, …)
/// is rendered to text.
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (i, column) in columns.iter_mut().enumerate() {
            let array = batch.column(i);
            extend_from_arrow(column, array)
                .with_context(|| format!("reading column '{}'", names[i]))?;
        }
    }
    Dataset::new(names, columns)
}

fn extend_from_arrow(out: &mut Vec<Value>, col: &Arc<dyn Array>) -> Result<()> {
    match col.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let ints = cast(col, &DataType::Int64)?;
            let ints = ints.as_primitive::<Int64Type>();
            out.extend(ints.iter().map(|v| v.map_or(Value::Null, Value::Integer)));
        }
        DataType::UInt64 | DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let floats = cast(col, &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            out.extend(floats.iter().map(|v| v.map_or(Value::Null, Value::Float)));
        }
        DataType::Boolean => {
            out.extend(
                col.as_boolean()
                    .iter()
                    .map(|v| v.map_or(Value::Null, Value::Bool)),
            );
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let strings = cast(col, &DataType::Utf8)?;
            out.extend(
                strings
                    .as_string::<i32>()
                    .iter()
                    .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string()))),
            );
        }
        _ => {
            let formatter = ArrayFormatter::try_new(col.as_ref(), &FormatOptions::default())?;
            out.extend((0..col.len()).map(|row| {
                if col.is_null(row) {
                    Value::Null
                } else {
                    Value::String(formatter.value(row).to_string())
                }
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn sniffs_delimiters() {
        assert_eq!(sniff_delimiter("a,b,c"), Delimiter::Byte(b','));
        assert_eq!(sniff_delimiter("a\tb"), Delimiter::Byte(b'\t'));
        assert_eq!(sniff_delimiter("a|b"), Delimiter::Byte(b'|'));
        assert_eq!(sniff_delimiter("MJD   mag  err"), Delimiter::Whitespace);
    }

    #[test]
    fn parses_csv_with_spaces_in_names() {
        let ds = parse_delimited("MJD, Col A ,band\n51000,1.5,g\n52500,,r\n").unwrap();
        assert_eq!(ds.column_names(), &["MJD", "Col A", "band"]);
        assert_eq!(ds.column("Col A").unwrap(), &[Value::Float(1.5), Value::Null]);
        assert_eq!(ds.column("MJD").unwrap()[1], Value::Integer(52500));
    }

    #[test]
    fn whitespace_tables_and_bad_rows() {
        let ds = parse_delimited("x   y\n1   2\n3 4 5\n\n6\t7\n").unwrap();
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.column("y").unwrap(), &[Value::Integer(2), Value::Integer(7)]);
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let ds = parse_delimited("a,a,,a\n1,2,3,4\n").unwrap();
        assert_eq!(ds.column_names(), &["a", "a.1", "Unnamed: 2", "a.2"]);
    }

    #[test]
    fn json_records_keep_key_order() {
        let ds = parse_json(r#"[{"z": 1, "a": "x"}, {"z": 2, "b": true}]"#).unwrap();
        assert_eq!(ds.column_names(), &["z", "a", "b"]);
        assert_eq!(ds.column("b").unwrap(), &[Value::Null, Value::Bool(true)]);
    }

    #[test]
    fn json_columns_orient() {
        let ds = parse_json(r#"{"MJD": {"1": 52500, "0": 51000, "10": 60100}, "f": [1.5, 2.5, null]}"#)
            .unwrap();
        assert_eq!(
            ds.column("MJD").unwrap(),
            &[Value::Integer(51000), Value::Integer(52500), Value::Integer(60100)]
        );
        assert_eq!(ds.column("f").unwrap()[2], Value::Null);
    }

    #[test]
    fn loads_from_disk_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(file, "name\tvalue").unwrap();
        writeln!(file, "a\t1").unwrap();
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.n_rows(), 1);

        let other = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        assert!(load_file(other.path()).is_err());
    }
}
