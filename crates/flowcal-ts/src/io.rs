//! Hourly frames on disk.
//!
//! Wide layout: one `time` column (`yyyy-mm-dd hh:mm`) and one `f64` column
//! per key. Missing values are written as nulls and read back as `NaN`.

use std::{
    collections::HashSet,
    fmt::Display,
    fs::{self, File},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::{ParquetReader, ParquetWriter};

use crate::frame::HourlyFrame;
use crate::time::{parse_timestamp, HourRange};

pub const TIME_COLUMN: &str = "time";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn to_dataframe<K: Ord + Clone + Display>(frame: &HourlyFrame<K>) -> Result<DataFrame> {
    let times: Vec<String> = frame
        .range()
        .hours()
        .map(|ts| ts.format(TIME_FORMAT).to_string())
        .collect();
    let mut series = vec![Series::new(TIME_COLUMN, times)];
    for (key, values) in frame.columns() {
        let values: Vec<Option<f64>> = values
            .iter()
            .map(|v| (!v.is_nan()).then_some(*v))
            .collect();
        series.push(Series::new(&key.to_string(), values));
    }
    DataFrame::new(series).context("building hourly frame")
}

/// Inverse of [`to_dataframe`]. The hour index spans the earliest to the
/// latest timestamp; hours without a row are `NaN`.
pub fn from_dataframe(df: &DataFrame) -> Result<HourlyFrame<String>> {
    let time = df
        .column(TIME_COLUMN)
        .with_context(|| format!("missing '{TIME_COLUMN}' column"))?
        .cast(&DataType::Utf8)
        .context("casting time column to text")?;
    let stamps = time
        .utf8()?
        .into_iter()
        .enumerate()
        .map(|(row, text)| {
            let text = text.ok_or_else(|| anyhow!("row {row}: empty timestamp"))?;
            Ok(parse_timestamp(text)?)
        })
        .collect::<Result<Vec<_>>>()?;
    let (Some(first), Some(last)) = (stamps.iter().min(), stamps.iter().max()) else {
        bail!("frame has no rows");
    };
    let range = HourRange::new(*first, *last)?;

    let mut frame = HourlyFrame::new(range);
    for name in df.get_column_names() {
        if name == TIME_COLUMN {
            continue;
        }
        let values = df
            .column(name)?
            .cast(&DataType::Float64)
            .with_context(|| format!("casting column '{name}' to Float64"))?;
        let mut seen = HashSet::new();
        let column = frame.column_mut(name.to_string());
        for (ts, value) in stamps.iter().zip(values.f64()?.into_iter()) {
            let Some(row) = range.position(ts) else {
                continue;
            };
            if !seen.insert(row) {
                tracing::warn!(column = name, hour = %ts, "duplicate row ignored");
                continue;
            }
            column[row] = value.unwrap_or(f64::NAN);
        }
    }
    Ok(frame)
}

pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = extension_of(path);
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            let reader = ParquetReader::new(&mut file);
            reader.finish().context("reading Parquet file")
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => {
            let reader = CsvReader::new(&mut file);
            reader.has_header(true).finish().context("reading CSV file")
        }
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv or .parquet",
            extension
        )),
    }
}

pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match extension_of(path).as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetWriter::new(&mut file)
            .finish(df)
            .map(|_| ())
            .context("writing Parquet file"),
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => CsvWriter::new(&mut file)
            .finish(df)
            .context("writing CSV file"),
        _ => Err(anyhow!(
            "unsupported output extension for {}; use .csv or .parquet",
            path.display()
        )),
    }
}

pub fn write_hourly<K: Ord + Clone + Display>(frame: &HourlyFrame<K>, path: &Path) -> Result<()> {
    let mut df = to_dataframe(frame)?;
    write_frame(&mut df, path)
}

pub fn read_hourly(path: &Path) -> Result<HourlyFrame<String>> {
    let df = read_frame(path)?;
    from_dataframe(&df).with_context(|| format!("reading hourly frame {}", path.display()))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}
