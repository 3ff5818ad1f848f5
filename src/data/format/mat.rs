use std::fs::File;
use std::io::{self, BufReader, Write};

use anyhow::{Context, Result, anyhow, bail};
use matfile::{MatFile, NumericData};

use super::{CycleColumns, CycleSource};
use crate::data::model::CycleRecord;

/// MATLAB Level 5 `.mat` container with one numeric vector per field:
///
/// * `cycle`       – cycle numbers (required)
/// * `capacity`    – capacity per cycle (required, same length)
/// * `impedance`   – optional, same length
/// * `temperature` – optional, same length
///
/// Any numeric class is accepted and widened to `f64`. Version 7.3 (HDF5)
/// files are not Level 5 containers and fail to parse.
pub struct MatSource;

impl CycleSource for MatSource {
    fn name(&self) -> &'static str {
        "mat"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mat"]
    }

    fn read_cycles(&self, file: File) -> Result<Vec<CycleRecord>> {
        let mat = MatFile::parse(BufReader::new(file))
            .map_err(|e| anyhow!("parsing MAT container: {e:?}"))?;

        let columns = CycleColumns {
            cycle: required_vector(&mat, "cycle")?,
            capacity: required_vector(&mat, "capacity")?,
            impedance: optional_vector(&mat, "impedance")?,
            temperature: optional_vector(&mat, "temperature")?,
        };
        columns.into_records()
    }
}

fn required_vector(mat: &MatFile, name: &str) -> Result<Vec<f64>> {
    let array = mat
        .find_by_name(name)
        .with_context(|| format!("MAT file has no '{name}' variable"))?;
    vector_values(array, name)
}

fn optional_vector(mat: &MatFile, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    match mat.find_by_name(name) {
        Some(array) => Ok(Some(vector_values(array, name)?.into_iter().map(Some).collect())),
        None => Ok(None),
    }
}

fn vector_values(array: &matfile::Array, name: &str) -> Result<Vec<f64>> {
    let non_singleton = array.size().iter().filter(|&&d| d > 1).count();
    if non_singleton > 1 {
        bail!(
            "variable '{name}' is a {:?} matrix, expected a vector",
            array.size()
        );
    }

    let values = match array.data() {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        _ => bail!("variable '{name}' uses an unsupported numeric class"),
    };
    Ok(values)
}

// ---------------------------------------------------------------------------
// Level 5 writer
// ---------------------------------------------------------------------------

const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_DOUBLE_CLASS: u32 = 6;

/// Write `variables` as uncompressed little-endian double column vectors.
///
/// Produces the layout [`MatSource`] reads; used for generated sample fleets.
pub fn write_columns<W: Write>(mut out: W, variables: &[(&str, &[f64])]) -> io::Result<()> {
    let mut header = [b' '; 128];
    let text = b"MATLAB 5.0 MAT-file, Platform: battery-lifetime";
    header[..text.len()].copy_from_slice(text);
    header[116..124].fill(0);
    header[124..126].copy_from_slice(&0x0100u16.to_le_bytes());
    header[126..128].copy_from_slice(b"IM");
    out.write_all(&header)?;

    for (name, values) in variables {
        let rows = i32::try_from(values.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "vector too long"))?;

        let mut body = Vec::new();
        push_element(
            &mut body,
            MI_UINT32,
            &[MX_DOUBLE_CLASS.to_le_bytes(), 0u32.to_le_bytes()].concat(),
        );
        push_element(
            &mut body,
            MI_INT32,
            &[rows.to_le_bytes(), 1i32.to_le_bytes()].concat(),
        );
        push_element(&mut body, MI_INT8, name.as_bytes());
        let real: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        push_element(&mut body, MI_DOUBLE, &real);

        let mut matrix = Vec::with_capacity(body.len() + 8);
        push_element(&mut matrix, MI_MATRIX, &body);
        out.write_all(&matrix)?;
    }

    out.flush()
}

/// Tag + payload, zero-padded to an 8-byte boundary.
fn push_element(buf: &mut Vec<u8>, data_type: u32, data: &[u8]) {
    buf.extend_from_slice(&data_type.to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
    let pad = (8 - data.len() % 8) % 8;
    buf.resize(buf.len() + pad, 0);
}
