//! Loading division snapshots from files.
//!
//! Two formats are accepted, optionally gzip-compressed:
//! - JSON: an array of division records, boundary polygons included
//! - CSV: one row per division with an integer-scaled bbox, no polygons

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::models::{Division, DivisionLevel, ScaledBbox};

/// Load a snapshot, picking the format from the file extension.
pub fn load_snapshot(path: &Path) -> Result<Vec<Division>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .trim_end_matches(".gz");

    if name.ends_with(".json") {
        load_json(path)
    } else if name.ends_with(".csv") {
        load_csv(path)
    } else {
        bail!("Unrecognized snapshot format: {}", path.display())
    }
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open snapshot {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Load a JSON array of division records
pub fn load_json(path: &Path) -> Result<Vec<Division>> {
    info!("Loading division snapshot from {}", path.display());

    let reader = open_maybe_gz(path)?;
    let divisions: Vec<Division> =
        serde_json::from_reader(reader).context("Failed to parse division snapshot")?;

    let with_geometry = divisions.iter().filter(|d| d.geometry.is_some()).count();
    info!(
        "Loaded {} divisions ({} with boundary polygons)",
        divisions.len(),
        with_geometry
    );
    Ok(divisions)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    code: String,
    name: String,
    name_en: Option<String>,
    level: String,
    parent_code: Option<String>,
    province_code: Option<String>,
    city_code: Option<String>,
    min_lat: Option<i64>,
    max_lat: Option<i64>,
    min_lon: Option<i64>,
    max_lon: Option<i64>,
}

impl CsvRow {
    fn into_division(self) -> Result<Division, String> {
        let level: DivisionLevel = self.level.parse()?;

        let bbox = match (self.min_lat, self.max_lat, self.min_lon, self.max_lon) {
            (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon)) => {
                Some(ScaledBbox::new(min_lat, max_lat, min_lon, max_lon))
            }
            _ => None,
        };

        let mut division = Division::new(&self.code, &self.name, level);
        division.name_en = self.name_en.unwrap_or_default();
        division.parent_code = self.parent_code.filter(|c| !c.is_empty());
        division.province_code = self.province_code.filter(|c| !c.is_empty());
        division.city_code = self.city_code.filter(|c| !c.is_empty());
        division.bbox = bbox;
        Ok(division)
    }
}

/// Load a bbox-only CSV snapshot.
///
/// Rows with an unknown level are skipped with a warning.
pub fn load_csv(path: &Path) -> Result<Vec<Division>> {
    info!("Loading division CSV from {}", path.display());

    let reader = open_maybe_gz(path)?;
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut divisions = Vec::new();
    for (line, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("Bad CSV row {}", line + 2))?;
        let code = row.code.clone();
        match row.into_division() {
            Ok(division) => divisions.push(division),
            Err(e) => warn!("Skipping division {}: {}", code, e),
        }
    }

    info!("Loaded {} divisions", divisions.len());
    Ok(divisions)
}
