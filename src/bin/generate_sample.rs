//! Writes `sample_observations.csv` and `sample_observations.parquet`: a
//! synthetic photometry table with a few awkward column names to try the
//! filter on, e.g. `MJD > 52000 and Col A < 10 and band == 'g'`.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const ROWS: usize = 2_000;
const BANDS: [&str; 3] = ["g", "r", "i"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Observations {
    mjd: Vec<f64>,
    band: Vec<&'static str>,
    mag: Vec<f64>,
    mag_err: Vec<f64>,
    col_a: Vec<Option<f64>>,
    field_id: Vec<i64>,
}

fn generate(rng: &mut SimpleRng) -> Observations {
    let mut obs = Observations {
        mjd: Vec::with_capacity(ROWS),
        band: Vec::with_capacity(ROWS),
        mag: Vec::with_capacity(ROWS),
        mag_err: Vec::with_capacity(ROWS),
        col_a: Vec::with_capacity(ROWS),
        field_id: Vec::with_capacity(ROWS),
    };
    for i in 0..ROWS {
        let mjd = 51_000.0 + rng.next_f64() * 9_500.0;
        let band = BANDS[i % BANDS.len()];
        // a slow sinusoidal variable plus noise
        let base = 17.5 + 0.4 * (mjd / 180.0).sin() + 0.2 * (i % BANDS.len()) as f64;
        let err = 0.02 + rng.next_f64() * 0.08;
        obs.mjd.push((mjd * 1e4).round() / 1e4);
        obs.band.push(band);
        obs.mag.push(rng.gauss(base, err));
        obs.mag_err.push(err);
        // every 25th row has no value
        obs.col_a.push((i % 25 != 0).then(|| rng.gauss(10.0, 3.0)));
        obs.field_id.push(100 + (i % 7) as i64);
    }
    obs
}

fn write_csv(obs: &Observations, path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(["MJD", "band", "mag", "mag err", "Col A", "field-id"])?;
    for i in 0..obs.mjd.len() {
        writer.write_record([
            obs.mjd[i].to_string(),
            obs.band[i].to_string(),
            format!("{:.4}", obs.mag[i]),
            format!("{:.4}", obs.mag_err[i]),
            obs.col_a[i].map(|v| format!("{v:.3}")).unwrap_or_default(),
            obs.field_id[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(obs: &Observations, path: &str) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("MJD", DataType::Float64, false),
        Field::new("band", DataType::Utf8, false),
        Field::new("mag", DataType::Float64, false),
        Field::new("mag err", DataType::Float64, false),
        Field::new("Col A", DataType::Float64, true),
        Field::new("field-id", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(obs.mjd.clone())),
        Arc::new(StringArray::from(obs.band.clone())),
        Arc::new(Float64Array::from(obs.mag.clone())),
        Arc::new(Float64Array::from(obs.mag_err.clone())),
        Arc::new(Float64Array::from(obs.col_a.clone())),
        Arc::new(Int64Array::from(obs.field_id.clone())),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let obs = generate(&mut rng);

    let csv_path = "sample_observations.csv";
    let parquet_path = "sample_observations.parquet";
    write_csv(&obs, csv_path)?;
    write_parquet(&obs, parquet_path)?;

    println!("Wrote {ROWS} observations to {csv_path} and {parquet_path}");
    Ok(())
}
