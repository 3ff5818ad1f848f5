//! Writes a small synthetic battery fleet for trying out the loader.
//!
//! ```text
//! generate_sample [OUTPUT_DIR]   (default: sample_batteries)
//! ```

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use battery_lifetime::data::format::mat::write_columns;

const CYCLES: usize = 168;

/// Deterministic SplitMix64 stream, so the generated fleet is reproducible.
struct FleetRng(u64);

impl FleetRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Normal sample via Box-Muller.
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// Synthetic history of one unit.
struct UnitHistory {
    cycle: Vec<f64>,
    capacity: Vec<f64>,
    impedance: Vec<f64>,
    temperature: Vec<f64>,
}

/// Exponential capacity fade with measurement noise; impedance grows as capacity fades.
fn simulate(initial_capacity: f64, fade_rate: f64, rng: &mut FleetRng) -> UnitHistory {
    let mut history = UnitHistory {
        cycle: Vec::with_capacity(CYCLES),
        capacity: Vec::with_capacity(CYCLES),
        impedance: Vec::with_capacity(CYCLES),
        temperature: Vec::with_capacity(CYCLES),
    };

    for k in 0..CYCLES {
        let fade = (-fade_rate * k as f64).exp();
        let capacity = (initial_capacity * fade + rng.gauss(0.0, 0.004)).max(0.05);
        history.cycle.push((k + 1) as f64);
        history.capacity.push(capacity);
        history.impedance.push(0.07 + 0.05 * (1.0 - fade) + rng.gauss(0.0, 0.001));
        history.temperature.push(rng.gauss(24.0, 0.5));
    }
    history
}

fn write_mat(path: &Path, h: &UnitHistory) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_columns(
        std::io::BufWriter::new(file),
        &[
            ("cycle", h.cycle.as_slice()),
            ("capacity", h.capacity.as_slice()),
            ("impedance", h.impedance.as_slice()),
            ("temperature", h.temperature.as_slice()),
        ],
    )
    .with_context(|| format!("writing {}", path.display()))
}

fn write_parquet(path: &Path, h: &UnitHistory) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("cycle", DataType::Int64, false),
        Field::new("capacity", DataType::Float64, false),
        Field::new("temperature", DataType::Float64, false),
    ]));

    let cycles: Vec<i64> = h.cycle.iter().map(|&c| c as i64).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(cycles)),
            Arc::new(Float64Array::from(h.capacity.clone())),
            Arc::new(Float64Array::from(h.temperature.clone())),
        ],
    )
    .context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_csv(path: &Path, h: &UnitHistory) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["cycle", "capacity", "impedance"])?;
    for i in 0..h.cycle.len() {
        writer.write_record([
            h.cycle[i].to_string(),
            h.capacity[i].to_string(),
            h.impedance[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let output_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_batteries".to_string());
    let output_dir = Path::new(&output_dir);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut rng = FleetRng(42);

    // (unit id, initial capacity, fade rate per cycle, file format)
    let fleet = [
        ("B0005", 1.86, 0.0028, "mat"),
        ("B0006", 2.04, 0.0035, "mat"),
        ("B0007", 1.89, 0.0022, "mat"),
        ("B0018", 1.86, 0.0030, "mat"),
        ("B0025", 1.85, 0.0026, "parquet"),
        // Fades too slowly to reach 70% within the observed cycles: censored.
        ("B0026", 1.82, 0.0009, "csv"),
    ];

    for &(id, initial, rate, format) in &fleet {
        let history = simulate(initial, rate, &mut rng);
        let path = output_dir.join(format!("{id}.{format}"));

        match format {
            "parquet" => write_parquet(&path, &history)?,
            "csv" => write_csv(&path, &history)?,
            _ => write_mat(&path, &history)?,
        }
        log::info!("Wrote {} ({} cycles)", path.display(), history.cycle.len());
    }

    println!(
        "Wrote {} battery units ({CYCLES} cycles each) to {}",
        fleet.len(),
        output_dir.display()
    );
    Ok(())
}
