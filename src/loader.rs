// 📂 Loaders - Boundary GeoJSON and tabular attribute sources
//
// The boundary reader preserves every feature property, including mangled
// upstream export names, and resolves canonical fields through the schema
// layer. Attribute sources are polymorphic over file format.

use crate::error::BoundaryError;
use crate::model::{AdminLevel, AttributeRecord, BoundaryRecord, Measure};
use crate::schema::{self, resolve_join_key};
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use geojson::GeoJson;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// GeoJSON carries no CRS member; RFC 7946 fixes it to WGS84
pub const WGS84: &str = "EPSG:4326";

// ============================================================================
// BOUNDARY DATASET
// ============================================================================

/// BoundaryDataset - loaded boundary collection plus what the reader learned
/// about the source (CRS, which join-key column was actually present)
#[derive(Debug, Clone)]
pub struct BoundaryDataset {
    pub records: Vec<BoundaryRecord>,
    pub crs: String,
    pub join_key_column: String,
    pub source: PathBuf,
}

/// Load a boundary dataset from GeoJSON
///
/// The join key column is resolved through the alias priority list; its
/// absence is a fatal schema mismatch. Features without polygonal geometry
/// are rejected rather than silently skipped.
pub fn read_boundaries(path: &Path, level: AdminLevel) -> Result<BoundaryDataset> {
    debug!(?path, "reading boundary geojson");

    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading boundary file {}", path.display()))?;
    let geojson: GeoJson = contents
        .parse()
        .with_context(|| format!("parsing GeoJSON from {}", path.display()))?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(anyhow!("bare geometry has no attributes to reconcile"))
        }
    };

    // Column set over the whole dataset, then one resolution for all rows
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for feature in &features {
        if let Some(props) = &feature.properties {
            columns.extend(props.keys().cloned());
        }
    }

    let join_key_column = resolve_join_key(&columns)?;
    let parent_column = schema::parent_name_resolver().resolve(&columns);

    let mut records = Vec::with_capacity(features.len());

    for feature in features {
        let geometry = feature
            .geometry
            .ok_or_else(|| anyhow!("feature without geometry in {}", path.display()))?;
        let geometry = geo::Geometry::<f64>::try_from(geometry.value)
            .context("converting GeoJSON geometry")?;

        match &geometry {
            geo::Geometry::Polygon(_) | geo::Geometry::MultiPolygon(_) => {}
            other => {
                return Err(BoundaryError::UnsupportedGeometry(format!("{other:?}")).into());
            }
        }

        let props = feature.properties.unwrap_or_default();

        let entity_id = string_prop(&props, &join_key_column).unwrap_or_default();
        if entity_id.is_empty() {
            warn!(column = %join_key_column, "feature has no join key value");
        }

        let name_en = string_prop(&props, "name_en").unwrap_or_default();
        let mut record = BoundaryRecord::new(entity_id, name_en, level, geometry);

        if let Some(name_ar) = string_prop(&props, "name_ar") {
            record = record.with_name_ar(name_ar);
        }
        if let Some(col) = &parent_column {
            if let Some(parent) = string_prop(&props, col) {
                record = record.with_parent(parent);
            }
        }

        // Preserve everything else, mangled names included
        for (key, value) in props {
            if key == join_key_column || key == "name_en" || key == "name_ar" {
                continue;
            }
            if parent_column.as_deref() == Some(key.as_str()) {
                continue;
            }
            record.extra.insert(key, measure_from_json(&value));
        }

        records.push(record);
    }

    debug!(count = records.len(), "loaded boundary records");

    Ok(BoundaryDataset {
        records,
        crs: WGS84.to_string(),
        join_key_column,
        source: path.to_path_buf(),
    })
}

fn string_prop(props: &geojson::JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn measure_from_json(value: &serde_json::Value) -> Measure {
    match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) => Measure::Number(f),
            None => Measure::Text(n.to_string()),
        },
        serde_json::Value::String(s) if s.trim().is_empty() => Measure::Missing,
        serde_json::Value::String(s) => Measure::Text(s.clone()),
        serde_json::Value::Bool(b) => Measure::Text(b.to_string()),
        serde_json::Value::Null => Measure::Missing,
        other => Measure::Text(other.to_string()),
    }
}

// ============================================================================
// ATTRIBUTE SOURCES
// ============================================================================

/// AttributeSource - one tabular file format
///
/// The only required capability is loading rows keyed by entity_id; the
/// join key column inside the table goes through the same alias resolution
/// as boundary datasets.
pub trait AttributeSource {
    fn load(&self, path: &Path) -> Result<Vec<AttributeRecord>>;

    /// Human-readable format name for display
    fn format_name(&self) -> &str;
}

/// Pick an attribute source by file extension
pub fn detect_source(path: &Path) -> Result<Box<dyn AttributeSource>, BoundaryError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => Ok(Box::new(CsvSource)),
        "xlsx" | "xls" => Ok(Box::new(ExcelSource)),
        other => Err(BoundaryError::UnsupportedFormat(other.to_string())),
    }
}

/// Convenience: detect the format and load in one call
pub fn read_attributes(path: &Path) -> Result<Vec<AttributeRecord>> {
    let source = detect_source(path)?;
    debug!(?path, format = source.format_name(), "reading attributes");
    source.load(path)
}

// ============================================================================
// CSV SOURCE
// ============================================================================

pub struct CsvSource;

impl AttributeSource for CsvSource {
    fn load(&self, path: &Path) -> Result<Vec<AttributeRecord>> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening CSV {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .context("reading CSV headers")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let columns: BTreeSet<String> = headers.iter().cloned().collect();
        let join_key = resolve_join_key(&columns)?;

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.with_context(|| format!("CSV record at line {}", line + 2))?;

            let mut record = AttributeRecord::new("");
            for (header, cell) in headers.iter().zip(row.iter()) {
                if header == &join_key {
                    record.entity_id = cell.trim().to_string();
                } else {
                    record.measures.insert(header.clone(), Measure::from_cell(cell));
                }
            }
            records.push(record);
        }

        Ok(records)
    }

    fn format_name(&self) -> &str {
        "CSV"
    }
}

// ============================================================================
// EXCEL SOURCE
// ============================================================================

pub struct ExcelSource;

impl AttributeSource for ExcelSource {
    fn load(&self, path: &Path) -> Result<Vec<AttributeRecord>> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("opening workbook {}", path.display()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let first_sheet = sheet_names
            .first()
            .ok_or_else(|| anyhow!("workbook {} has no sheets", path.display()))?
            .clone();

        let range = workbook
            .worksheet_range(&first_sheet)
            .with_context(|| format!("reading sheet '{first_sheet}'"))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or_else(|| anyhow!("sheet '{first_sheet}' is empty"))?
            .iter()
            .map(cell_to_string)
            .collect();
        let columns: BTreeSet<String> = headers.iter().cloned().collect();
        let join_key = resolve_join_key(&columns)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = AttributeRecord::new("");
            for (header, cell) in headers.iter().zip(row.iter()) {
                if header == &join_key {
                    record.entity_id = cell_to_string(cell);
                } else {
                    record.measures.insert(header.clone(), cell_to_measure(cell));
                }
            }
            records.push(record);
        }

        Ok(records)
    }

    fn format_name(&self) -> &str {
        "Excel"
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => format!("{other}"),
    }
}

fn cell_to_measure(cell: &Data) -> Measure {
    match cell {
        Data::Float(f) => Measure::Number(*f),
        Data::Int(i) => Measure::Number(*i as f64),
        Data::Empty => Measure::Missing,
        Data::String(s) => Measure::from_cell(s),
        Data::Bool(b) => Measure::Text(b.to_string()),
        other => Measure::from_cell(&format!("{other}")),
    }
}

// ============================================================================
// TESTS
// ============================================================================
