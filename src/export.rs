// 💾 Exporters - GeoJSON, Shapefile and CSV output
//
// Missing measures survive export wherever the format has nullable fields:
// GeoJSON writes `null`, CSV writes an empty cell, DBF writes a null value.
// Canonical column names are used on the way out so a re-import resolves
// them without the alias list.

use crate::model::{Measure, ReconciledRecord};
use crate::schema;
use anyhow::{anyhow, Context, Result};
use geojson::{Feature, FeatureCollection, JsonObject};
use shapefile::dbase::{FieldName, FieldValue, Record as DbfRecord, TableWriterBuilder};
use shapefile::{Point as ShpPoint, Polygon as ShpPolygon, PolygonRing};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

// ============================================================================
// GEOJSON
// ============================================================================

/// Export reconciled records to GeoJSON
///
/// Round-trip guarantee: reloading with the boundary reader preserves
/// entity_id, names and every measure value; Missing comes back as Missing.
pub fn write_geojson(records: &[ReconciledRecord], path: &Path) -> Result<()> {
    let features = records.iter().map(feature_from_record).collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let json = serde_json::to_string_pretty(&collection).context("serializing GeoJSON")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;

    debug!(?path, count = records.len(), "wrote geojson");
    Ok(())
}

fn feature_from_record(record: &ReconciledRecord) -> Feature {
    let mut props = JsonObject::new();

    props.insert(
        schema::JOIN_KEY.to_string(),
        serde_json::Value::String(record.boundary.entity_id.clone()),
    );
    props.insert(
        "name_en".to_string(),
        serde_json::Value::String(record.boundary.name_en.clone()),
    );
    if let Some(name_ar) = &record.boundary.name_ar {
        props.insert(
            "name_ar".to_string(),
            serde_json::Value::String(name_ar.clone()),
        );
    }
    if let Some(parent) = &record.boundary.parent_name {
        props.insert(
            schema::PARENT_NAME.to_string(),
            serde_json::Value::String(parent.clone()),
        );
    }

    for (name, measure) in &record.boundary.extra {
        props.insert(name.clone(), measure_to_json(measure));
    }
    // Joined measures win over boundary-side columns of the same name
    for (name, measure) in &record.measures {
        props.insert(name.clone(), measure_to_json(measure));
    }

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            &record.boundary.geometry,
        ))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn measure_to_json(measure: &Measure) -> serde_json::Value {
    match measure {
        Measure::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Measure::Text(s) => serde_json::Value::String(s.clone()),
        Measure::Missing => serde_json::Value::Null,
    }
}

// ============================================================================
// DBF FIELD NAMES
// ============================================================================

/// Truncate column names to the DBF 10-byte limit without collision
///
/// Non-alphanumeric characters become `_`; a colliding truncation gets a
/// numeric suffix carved out of its tail, so the result is deterministic
/// for a given input order.
pub fn dbf_field_names(names: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        let mut candidate: String = sanitized.chars().take(10).collect();
        let mut counter = 1usize;
        while !seen.insert(candidate.clone()) {
            let suffix = counter.to_string();
            let keep = 10usize.saturating_sub(suffix.len());
            candidate = sanitized.chars().take(keep).collect::<String>() + &suffix;
            counter += 1;
        }
        out.push(candidate);
    }

    out
}

// ============================================================================
// SHAPEFILE
// ============================================================================

/// Export reconciled records to a Shapefile (.shp/.shx/.dbf triple)
///
/// Measure columns are numeric when no record holds text in them,
/// character otherwise; Missing exports as a DBF null either way.
pub fn write_shapefile(records: &[ReconciledRecord], path: &Path) -> Result<()> {
    // Stable column order: canonical fields, then measures sorted by name
    let measure_names: Vec<String> = records
        .iter()
        .flat_map(|r| r.measures.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut columns: Vec<String> = vec![
        "entity_id".to_string(),
        "name_en".to_string(),
        "name_ar".to_string(),
        "parent".to_string(),
    ];
    columns.extend(measure_names.iter().cloned());
    let field_names = dbf_field_names(&columns);

    let numeric: Vec<bool> = measure_names
        .iter()
        .map(|name| {
            !records
                .iter()
                .any(|r| matches!(r.measures.get(name), Some(Measure::Text(_))))
        })
        .collect();

    let mut builder = TableWriterBuilder::new();
    for (i, field) in field_names.iter().enumerate() {
        let field_name = FieldName::try_from(field.as_str())
            .map_err(|e| anyhow!("invalid DBF field name '{field}': {e:?}"))?;
        builder = if i < 4 {
            builder.add_character_field(field_name, 80)
        } else if numeric[i - 4] {
            builder.add_numeric_field(field_name, 20, 6)
        } else {
            builder.add_character_field(field_name, 100)
        };
    }

    let mut writer = shapefile::Writer::from_path(path, builder)
        .with_context(|| format!("creating shapefile {}", path.display()))?;

    for record in records {
        let shape = polygonal_shape(&record.boundary.geometry)?;

        let mut row = DbfRecord::default();
        row.insert(
            field_names[0].clone(),
            FieldValue::Character(Some(record.boundary.entity_id.clone())),
        );
        row.insert(
            field_names[1].clone(),
            FieldValue::Character(Some(record.boundary.name_en.clone())),
        );
        row.insert(
            field_names[2].clone(),
            FieldValue::Character(record.boundary.name_ar.clone()),
        );
        row.insert(
            field_names[3].clone(),
            FieldValue::Character(record.boundary.parent_name.clone()),
        );

        for (i, name) in measure_names.iter().enumerate() {
            let value = record.measures.get(name).unwrap_or(&Measure::Missing);
            let field_value = if numeric[i] {
                FieldValue::Numeric(value.as_number())
            } else {
                FieldValue::Character(match value {
                    Measure::Text(s) => Some(s.clone()),
                    Measure::Number(n) => Some(n.to_string()),
                    Measure::Missing => None,
                })
            };
            row.insert(field_names[4 + i].clone(), field_value);
        }

        writer
            .write_shape_and_record(&shape, &row)
            .context("writing shapefile record")?;
    }

    debug!(?path, count = records.len(), "wrote shapefile");
    Ok(())
}

fn polygonal_shape(geometry: &geo::Geometry<f64>) -> Result<ShpPolygon> {
    let polygons: Vec<&geo::Polygon<f64>> = match geometry {
        geo::Geometry::Polygon(p) => vec![p],
        geo::Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        other => {
            return Err(anyhow!(
                "cannot export non-polygonal geometry to shapefile: {other:?}"
            ))
        }
    };

    let mut rings = Vec::new();
    for polygon in polygons {
        rings.push(PolygonRing::Outer(ring_points(polygon.exterior())));
        for interior in polygon.interiors() {
            rings.push(PolygonRing::Inner(ring_points(interior)));
        }
    }

    Ok(ShpPolygon::with_rings(rings))
}

fn ring_points(ring: &geo::LineString<f64>) -> Vec<ShpPoint> {
    ring.coords().map(|c| ShpPoint::new(c.x, c.y)).collect()
}

// ============================================================================
// CSV
// ============================================================================

/// Export attributes (geometry dropped) to CSV; Missing becomes an empty cell
pub fn write_attributes_csv(records: &[ReconciledRecord], path: &Path) -> Result<()> {
    let measure_names: Vec<String> = records
        .iter()
        .flat_map(|r| r.measures.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec![
        schema::JOIN_KEY.to_string(),
        "name_en".to_string(),
        "name_ar".to_string(),
        schema::PARENT_NAME.to_string(),
    ];
    header.extend(measure_names.iter().cloned());
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.boundary.entity_id.clone(),
            record.boundary.name_en.clone(),
            record.boundary.name_ar.clone().unwrap_or_default(),
            record.boundary.parent_name.clone().unwrap_or_default(),
        ];
        for name in &measure_names {
            row.push(match record.measures.get(name) {
                Some(Measure::Number(n)) => n.to_string(),
                Some(Measure::Text(s)) => s.clone(),
                Some(Measure::Missing) | None => String::new(),
            });
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    debug!(?path, count = records.len(), "wrote attribute csv");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
